// ABOUTME: Secret store contract used by the secrets readiness stage.
// ABOUTME: Stores are assumed write-only; no read-back capability exists.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret store unavailable: {0}")]
    Unavailable(String),

    #[error("secret store rejected '{name}': {reason}")]
    Rejected { name: String, reason: String },
}

/// Result of checking which secrets a store already holds.
#[derive(Debug, Clone, Default)]
pub struct SecretCheck {
    pub present: Vec<String>,
    pub missing: Vec<String>,
}

/// A deployment secret backend. Implementations wrap an external store's CLI
/// or API; the wire format is the store's concern, not ours.
pub trait SecretStore: Send + Sync {
    fn name(&self) -> &str;

    /// Which of the named secrets exist in the store.
    fn check_secrets(&self, names: &[String]) -> Result<SecretCheck, SecretError>;

    /// Upload one secret. Write-only: success means the store accepted it,
    /// not that the value can ever be read back.
    fn upload_secret(&self, name: &str, value: &str) -> Result<(), SecretError>;
}

/// In-memory store for tests and dry runs. Holds names only, honoring the
/// write-only contract.
#[derive(Debug, Default)]
pub struct MemoryStore {
    names: parking_lot::Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secrets(names: &[&str]) -> Self {
        Self {
            names: parking_lot::Mutex::new(names.iter().map(|s| s.to_string()).collect()),
        }
    }
}

impl SecretStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn check_secrets(&self, names: &[String]) -> Result<SecretCheck, SecretError> {
        let held = self.names.lock();
        let mut check = SecretCheck::default();
        for name in names {
            if held.contains(name) {
                check.present.push(name.clone());
            } else {
                check.missing.push(name.clone());
            }
        }
        Ok(check)
    }

    fn upload_secret(&self, name: &str, _value: &str) -> Result<(), SecretError> {
        let mut held = self.names.lock();
        if !held.contains(&name.to_string()) {
            held.push(name.to_string());
        }
        Ok(())
    }
}
