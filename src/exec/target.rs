// ABOUTME: Remote target descriptor: local host marker or SSH coordinates.
// ABOUTME: Parses formats like "local", "host", "user@host", "user@host:port".

use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TargetParseError {
    #[error("target address cannot be empty")]
    Empty,

    #[error("invalid port in target address: {0}")]
    InvalidPort(String),

    #[error("hostname cannot be empty")]
    EmptyHost,
}

/// A physical or virtual host that will run deployed services.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// The current host; commands run as local subprocesses.
    Local,
    /// An SSH-reachable host.
    Ssh {
        host: String,
        port: u16,
        user: String,
        key_path: Option<PathBuf>,
    },
}

impl Target {
    /// Parse `local` or `[user@]host[:port]`. The user defaults to `deploy`.
    pub fn parse(s: &str) -> Result<Self, TargetParseError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TargetParseError::Empty);
        }

        if s == "local" {
            return Ok(Target::Local);
        }

        let (user, rest) = match s.find('@') {
            Some(at) => (&s[..at], &s[at + 1..]),
            None => ("deploy", s),
        };

        let (host, port) = match rest.rfind(':') {
            Some(colon) => {
                let port_str = &rest[colon + 1..];
                let port = port_str
                    .parse::<u16>()
                    .map_err(|_| TargetParseError::InvalidPort(port_str.to_string()))?;
                (&rest[..colon], port)
            }
            None => (rest, 22),
        };

        if host.is_empty() {
            return Err(TargetParseError::EmptyHost);
        }

        Ok(Target::Ssh {
            host: host.to_string(),
            port,
            user: user.to_string(),
            key_path: None,
        })
    }

    /// Stable key identifying the physical target, used to serialize the
    /// rollout critical section per target.
    pub fn key(&self) -> String {
        match self {
            Target::Local => "local".to_string(),
            Target::Ssh { host, port, .. } => format!("{}:{}", host, port),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Target::Local)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Local => write!(f, "local"),
            Target::Ssh { host, port, user, .. } => write!(f, "{}@{}:{}", user, host, port),
        }
    }
}

impl<'de> Deserialize<'de> for Target {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Target::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_local_marker() {
        assert_eq!(Target::parse("local").unwrap(), Target::Local);
    }

    #[test]
    fn parses_full_address() {
        let target = Target::parse("deploy@web1.example.com:2222").unwrap();
        assert_eq!(
            target,
            Target::Ssh {
                host: "web1.example.com".to_string(),
                port: 2222,
                user: "deploy".to_string(),
                key_path: None,
            }
        );
    }

    #[test]
    fn defaults_user_and_port() {
        let target = Target::parse("web1.example.com").unwrap();
        match target {
            Target::Ssh { host, port, user, .. } => {
                assert_eq!(host, "web1.example.com");
                assert_eq!(port, 22);
                assert_eq!(user, "deploy");
            }
            Target::Local => panic!("expected ssh target"),
        }
    }

    #[test]
    fn rejects_bad_port() {
        assert!(matches!(
            Target::parse("web1:notaport"),
            Err(TargetParseError::InvalidPort(_))
        ));
    }

    #[test]
    fn key_is_stable_per_physical_host() {
        let a = Target::parse("alice@web1:22").unwrap();
        let b = Target::parse("bob@web1:22").unwrap();
        assert_eq!(a.key(), b.key());
    }
}
