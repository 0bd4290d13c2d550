//! Environment-driven pipeline settings.

use std::path::PathBuf;

use crate::process::{ProcessRegistry, ProcessResult};

/// Alternate process table.
pub const PROCESS_CONFIG_VAR: &str = "PTX_PROCESS_CONFIG";
/// Artist identity, checked before `USERNAME` and `USER`.
pub const USER_VAR: &str = "PTX_USER";

const UNKNOWN_USER: &str = "UNKNOWN";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Process table to load instead of the built-in one
    pub process_config: Option<PathBuf>,
    /// Upper-cased artist identity
    pub user: String,
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let user = [USER_VAR, "USERNAME", "USER"]
            .into_iter()
            .find_map(|key| non_empty(key))
            .map(|u| u.trim().to_uppercase())
            .unwrap_or_else(|| UNKNOWN_USER.to_string());

        Self {
            process_config: non_empty(PROCESS_CONFIG_VAR).map(PathBuf::from),
            user,
        }
    }

    /// The configured process table, or the built-in one.
    pub fn process_registry(&self) -> ProcessResult<ProcessRegistry> {
        match &self.process_config {
            Some(path) => {
                log::info!("Loading process table from {}", path.display());
                ProcessRegistry::load(path)
            }
            None => ProcessRegistry::builtin(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            process_config: None,
            user: UNKNOWN_USER.to_string(),
        }
    }
}

/// Upper-cased identity of the current artist.
pub fn current_user() -> String {
    PipelineConfig::from_env().user
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_user_precedence() {
        let config = PipelineConfig::from_lookup(lookup(&[("USER", "bob"), ("USERNAME", "jdoe")]));
        assert_eq!(config.user, "JDOE");

        let config = PipelineConfig::from_lookup(lookup(&[("USER", "bob"), ("PTX_USER", "ci-bot")]));
        assert_eq!(config.user, "CI-BOT");

        let config = PipelineConfig::from_lookup(lookup(&[("USERNAME", "  ")]));
        assert_eq!(config.user, "UNKNOWN");
    }

    #[test]
    fn test_process_table_override() {
        let config = PipelineConfig::from_lookup(lookup(&[]));
        assert!(config.process_registry().is_ok());

        let dir = tempdir().unwrap();
        let path = dir.path().join("processes.json");
        std::fs::write(&path, r#"{"exporters": {"abc": "alembic_exporter"}}"#).unwrap();

        let config = PipelineConfig::from_lookup(lookup(&[("PTX_PROCESS_CONFIG", path.to_str().unwrap())]));
        let processes = config.process_registry().unwrap();
        assert!(processes.resolve("proxies", "abc").is_err());

        let config = PipelineConfig::from_lookup(lookup(&[("PTX_PROCESS_CONFIG", "/nonexistent/table.json")]));
        assert!(config.process_registry().is_err());
    }
}
