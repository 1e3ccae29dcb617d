// ABOUTME: Validated domain types shared across the orchestrator.
// ABOUTME: Exports repo names, domains, and service keys.

mod domain;
mod repo_name;
mod service_key;

pub use domain::{DomainName, DomainNameError, PLACEHOLDER_MARKER};
pub use repo_name::{RepoName, RepoNameError};
pub use service_key::ServiceKey;
