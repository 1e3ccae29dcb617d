// ABOUTME: Composite (repo, environment) key identifying one deployable service.
// ABOUTME: Used as container name, lock key, and report context.

use std::fmt;

use super::RepoName;

/// One (repo, environment) pair materialized for deployment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceKey {
    repo: RepoName,
    environment: String,
}

impl ServiceKey {
    pub fn new(repo: RepoName, environment: impl Into<String>) -> Self {
        Self {
            repo,
            environment: environment.into(),
        }
    }

    pub fn repo(&self) -> &RepoName {
        &self.repo
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Container-safe name for this service: `repo-environment`.
    pub fn container_name(&self) -> String {
        format!("{}-{}", self.repo, self.environment)
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.repo, self.environment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_repo_and_environment() {
        let key = ServiceKey::new(RepoName::new("api").unwrap(), "staging");
        assert_eq!(key.to_string(), "api/staging");
        assert_eq!(key.container_name(), "api-staging");
    }
}
