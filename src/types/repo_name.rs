// ABOUTME: DNS-compatible repository name validation.
// ABOUTME: Repo names become container and routing identifiers, so RFC 1123 rules apply.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoNameError {
    #[error("repo name cannot be empty")]
    Empty,

    #[error("repo name exceeds maximum length of 63 characters")]
    TooLong,

    #[error("repo name cannot start with a hyphen")]
    StartsWithHyphen,

    #[error("repo name cannot end with a hyphen")]
    EndsWithHyphen,

    #[error("repo name must be lowercase")]
    NotLowercase,

    #[error("invalid character in repo name: '{0}'")]
    InvalidChar(char),
}

/// Unique identifier for one repository participating in the merged topology.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepoName(String);

impl RepoName {
    pub fn new(value: &str) -> Result<Self, RepoNameError> {
        if value.is_empty() {
            return Err(RepoNameError::Empty);
        }

        if value.len() > 63 {
            return Err(RepoNameError::TooLong);
        }

        if value.starts_with('-') {
            return Err(RepoNameError::StartsWithHyphen);
        }

        if value.ends_with('-') {
            return Err(RepoNameError::EndsWithHyphen);
        }

        for c in value.chars() {
            if c.is_ascii_uppercase() {
                return Err(RepoNameError::NotLowercase);
            }
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
                return Err(RepoNameError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_names() {
        assert!(RepoName::new("api").is_ok());
        assert!(RepoName::new("my-app-2").is_ok());
    }

    #[test]
    fn rejects_invalid_names() {
        assert!(matches!(RepoName::new(""), Err(RepoNameError::Empty)));
        assert!(matches!(
            RepoName::new("-api"),
            Err(RepoNameError::StartsWithHyphen)
        ));
        assert!(matches!(
            RepoName::new("api-"),
            Err(RepoNameError::EndsWithHyphen)
        ));
        assert!(matches!(
            RepoName::new("Api"),
            Err(RepoNameError::NotLowercase)
        ));
        assert!(matches!(
            RepoName::new("my_app"),
            Err(RepoNameError::InvalidChar('_'))
        ));
        assert!(matches!(
            RepoName::new(&"a".repeat(64)),
            Err(RepoNameError::TooLong)
        ));
    }
}
