// ABOUTME: Validated domain names used as routing keys in the merged topology.
// ABOUTME: Rejects empty values and unresolved placeholder markers.

use std::fmt;
use thiserror::Error;

/// Reserved marker prefix: values carrying it are unset-for-production-purposes.
pub const PLACEHOLDER_MARKER: &str = "CHANGEME";

#[derive(Debug, Error)]
pub enum DomainNameError {
    #[error("domain cannot be empty")]
    Empty,

    #[error("domain '{0}' still carries the {PLACEHOLDER_MARKER} placeholder")]
    Placeholder(String),

    #[error("invalid character in domain: '{0}'")]
    InvalidChar(char),
}

/// An externally visible routing key. Domains are never silently reassigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomainName(String);

impl DomainName {
    pub fn new(value: &str) -> Result<Self, DomainNameError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(DomainNameError::Empty);
        }

        if value.starts_with(PLACEHOLDER_MARKER) {
            return Err(DomainNameError::Placeholder(value.to_string()));
        }

        for c in value.chars() {
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' && c != '.' {
                return Err(DomainNameError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_hostnames() {
        assert!(DomainName::new("api.example.com").is_ok());
        assert!(DomainName::new("staging-api.example.com").is_ok());
    }

    #[test]
    fn rejects_empty_and_placeholder() {
        assert!(matches!(DomainName::new("  "), Err(DomainNameError::Empty)));
        assert!(matches!(
            DomainName::new("CHANGEME.example.com"),
            Err(DomainNameError::Placeholder(_))
        ));
    }

    #[test]
    fn rejects_uppercase() {
        assert!(matches!(
            DomainName::new("Api.example.com"),
            Err(DomainNameError::InvalidChar('A'))
        ));
    }
}
