//! Tokens, hosts, and workspace directories
//!
//! Settings come from the environment first, then from
//! `~/.config/armada/config.toml`. Everything has a workable default except
//! the credentials, which stay optional until an operation actually needs
//! them.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{Error, Result};

const ENV_GITHUB_TOKEN: &str = "ARMADA_GITHUB_TOKEN";
const ENV_GITHUB_API_URL: &str = "ARMADA_GITHUB_API_URL";
const ENV_CATALOG_HOST: &str = "ARMADA_CATALOG_HOST";
const ENV_CATALOG_TOKEN: &str = "ARMADA_CATALOG_TOKEN";
const ENV_WORKSPACE: &str = "ARMADA_WORKSPACE";

const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

#[derive(Debug, Clone)]
pub struct Config {
    pub github_api_url: String,
    pub github_token: Option<String>,
    pub catalog_host: Option<String>,
    pub catalog_token: Option<String>,
    /// Root for everything armada writes: sessions and clones.
    pub workspace_dir: PathBuf,
}

/// `config.toml` contents; every field optional.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    github_token: Option<String>,
    github_api_url: Option<String>,
    catalog_host: Option<String>,
    catalog_token: Option<String>,
    workspace: Option<PathBuf>,
}

impl Config {
    /// Resolve configuration from env, config file, and defaults, in that
    /// order. `workspace_override` (the `--workspace` flag) wins over all.
    pub fn load(workspace_override: Option<PathBuf>) -> Result<Self> {
        let file = Self::read_file()?;

        let workspace_dir = workspace_override
            .or_else(|| std::env::var_os(ENV_WORKSPACE).map(PathBuf::from))
            .or(file.workspace)
            .or_else(|| dirs::home_dir().map(|home| home.join(".armada")))
            .ok_or_else(|| Error::Config("cannot determine a home directory".to_string()))?;

        Ok(Self {
            github_api_url: env_var(ENV_GITHUB_API_URL)
                .or(file.github_api_url)
                .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string()),
            github_token: env_var(ENV_GITHUB_TOKEN).or(file.github_token),
            catalog_host: env_var(ENV_CATALOG_HOST).or(file.catalog_host),
            catalog_token: env_var(ENV_CATALOG_TOKEN).or(file.catalog_token),
            workspace_dir,
        })
    }

    fn read_file() -> Result<FileConfig> {
        let Some(path) = dirs::config_dir().map(|dir| dir.join("armada").join("config.toml"))
        else {
            return Ok(FileConfig::default());
        };
        if !path.exists() {
            return Ok(FileConfig::default());
        }
        let content = std::fs::read_to_string(&path)?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Where session files live.
    pub fn sessions_dir(&self) -> PathBuf {
        self.workspace_dir.join("sessions")
    }

    /// Where repositories are cloned.
    pub fn clones_dir(&self) -> PathBuf {
        self.workspace_dir.join("clones")
    }

    /// The token, or an actionable error for operations that need one.
    pub fn require_github_token(&self) -> anyhow::Result<&str> {
        self.github_token.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "no GitHub token configured; set {ENV_GITHUB_TOKEN} or add github_token to config.toml"
            )
        })
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            github_api_url: DEFAULT_GITHUB_API_URL.to_string(),
            github_token: None,
            catalog_host: None,
            catalog_token: None,
            workspace_dir: PathBuf::from("/tmp/armada-test"),
        }
    }

    #[test]
    fn workspace_subdirectories() {
        let config = test_config();
        assert_eq!(
            config.sessions_dir(),
            PathBuf::from("/tmp/armada-test/sessions")
        );
        assert_eq!(config.clones_dir(), PathBuf::from("/tmp/armada-test/clones"));
    }

    #[test]
    fn missing_github_token_is_an_actionable_error() {
        let config = test_config();
        let err = config.require_github_token().unwrap_err();
        assert!(err.to_string().contains(ENV_GITHUB_TOKEN));
    }

    #[test]
    fn file_config_parses_partial_tables() {
        let file: FileConfig = toml::from_str("github_token = \"tok\"").unwrap();
        assert_eq!(file.github_token.as_deref(), Some("tok"));
        assert!(file.catalog_host.is_none());
    }
}
