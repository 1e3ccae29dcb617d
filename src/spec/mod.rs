// ABOUTME: EnvironmentSpec store: loads and validates one repo's flotilla.yml.
// ABOUTME: Pure data with no side effects beyond parsing; re-read on every run.

mod environment;

pub use environment::EnvironmentConfig;

use std::path::{Path, PathBuf};

use nonempty::NonEmpty;
use serde::Deserialize;
use serde::de::{MapAccess, Visitor};
use thiserror::Error;

use crate::types::RepoName;

pub const SPEC_FILENAME: &str = "flotilla.yml";
pub const SPEC_FILENAME_ALT: &str = "flotilla.yaml";
pub const SPEC_FILENAME_DIR: &str = ".flotilla/config.yml";

#[derive(Debug, Error)]
pub enum SpecError {
    #[error(
        "no deployment spec found in {0} (tried {SPEC_FILENAME}, {SPEC_FILENAME_ALT}, {SPEC_FILENAME_DIR})"
    )]
    Missing(PathBuf),

    #[error("invalid deployment spec: {0}")]
    Invalid(String),

    #[error("unresolved placeholder in {field}: '{value}'")]
    Placeholder { field: String, value: String },

    #[error("spec file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_yaml::Error> for SpecError {
    fn from(err: serde_yaml::Error) -> Self {
        SpecError::Invalid(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SpecError>;

/// One repository's per-environment deployment declaration.
///
/// Immutable after load. The environment list preserves file order, which the
/// merger relies on for deterministic port assignment.
#[derive(Debug, Clone)]
pub struct EnvironmentSpec {
    pub name: RepoName,
    pub environments: NonEmpty<(String, EnvironmentConfig)>,
}

#[derive(Debug, Deserialize)]
struct RawSpec {
    name: String,
    #[serde(deserialize_with = "deserialize_ordered_environments")]
    environments: Vec<(String, environment::RawEnvironment)>,
}

impl EnvironmentSpec {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let raw: RawSpec = serde_yaml::from_str(yaml)?;
        Self::validate(raw)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Find and load the spec in a repository checkout, trying legacy file
    /// name aliases in preference order.
    pub fn discover(root: &Path) -> Result<Self> {
        let candidates = [
            root.join(SPEC_FILENAME),
            root.join(SPEC_FILENAME_ALT),
            root.join(SPEC_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(SpecError::Missing(root.to_path_buf()))
    }

    /// The canonical spec path for a repository, the implied target for
    /// subsequent writes when no spec exists yet.
    pub fn canonical_path(root: &Path) -> PathBuf {
        root.join(SPEC_FILENAME)
    }

    pub fn environment(&self, name: &str) -> Option<&EnvironmentConfig> {
        self.environments
            .iter()
            .find(|(env, _)| env == name)
            .map(|(_, config)| config)
    }

    fn validate(raw: RawSpec) -> Result<Self> {
        let name = RepoName::new(&raw.name)
            .map_err(|e| SpecError::Invalid(format!("name: {}", e)))?;

        let environments = raw
            .environments
            .into_iter()
            .map(|(env_name, raw_env)| {
                let config = raw_env.validate(&env_name)?;
                Ok((env_name, config))
            })
            .collect::<Result<Vec<_>>>()?;

        let environments = NonEmpty::from_vec(environments).ok_or_else(|| {
            SpecError::Invalid("at least one environment is required".to_string())
        })?;

        if !environments.iter().any(|(_, c)| c.domain.is_some()) {
            return Err(SpecError::Invalid(
                "at least one environment must declare a domain".to_string(),
            ));
        }

        Ok(Self { name, environments })
    }
}

/// Write a starter spec file. Fails if one already exists unless forced.
pub fn init_spec(root: &Path, name: Option<&str>, force: bool) -> Result<PathBuf> {
    let path = EnvironmentSpec::canonical_path(root);

    if path.exists() && !force {
        return Err(SpecError::AlreadyExists(path));
    }

    let repo_name = match name {
        Some(n) => RepoName::new(n)
            .map_err(|e| SpecError::Invalid(format!("name: {}", e)))?
            .to_string(),
        None => "my-app".to_string(),
    };

    let yaml = format!(
        r#"name: {repo_name}
environments:
  staging:
    domain: staging.{repo_name}.example.com
    health_check: /health
    server: deploy@staging.example.com
  production:
    domain: {repo_name}.example.com
    health_check: /health
    server: deploy@web1.example.com
"#
    );
    std::fs::write(&path, yaml)?;

    Ok(path)
}

/// Deserialize the environments mapping into a Vec that preserves file order.
fn deserialize_ordered_environments<'de, D>(
    deserializer: D,
) -> std::result::Result<Vec<(String, environment::RawEnvironment)>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct OrderedMapVisitor;

    impl<'de> Visitor<'de> for OrderedMapVisitor {
        type Value = Vec<(String, environment::RawEnvironment)>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a mapping of environment name to environment config")
        }

        fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut entries = Vec::new();
            while let Some((key, value)) =
                map.next_entry::<String, environment::RawEnvironment>()?
            {
                entries.push((key, value));
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(OrderedMapVisitor)
}
