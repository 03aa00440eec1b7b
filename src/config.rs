// Configuration: environment variables layered over the JSON file written
// by `shbin auth`. Everything is resolved once in `main` and passed down
// explicitly.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::UsageError;

pub const ENV_TOKEN: &str = "SHBIN_GITHUB_TOKEN";
pub const ENV_REPO: &str = "SHBIN_REPO";
pub const ENV_NAMESPACE: &str = "SHBIN_NAMESPACE";
pub const ENV_COPY_URL: &str = "SHBIN_COPY_URL";
pub const ENV_USER: &str = "SHBIN_USER";
pub const ENV_API_URL: &str = "SHBIN_API_URL";
pub const ENV_WEB_URL: &str = "SHBIN_WEB_URL";
pub const ENV_WORKFLOW: &str = "SHBIN_WORKFLOW";
pub const ENV_CLIENT_ID: &str = "SHBIN_CLIENT_ID";
pub const ENV_CONFIG: &str = "SHBIN_CONFIG";

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_WEB_URL: &str = "https://github.com";
pub const DEFAULT_WORKFLOW: &str = "shbin-run.yml";

/// Contents of `config.json`. Unknown keys survive a rewrite.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct StoredConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Resolved settings for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub token: String,
    pub repo: String,
    pub api_url: String,
    pub web_url: String,
    pub workflow: String,
    pub copy_url: bool,
    /// Forced identity; skips the `/user` lookup when set.
    pub user: Option<String>,
}

impl Settings {
    /// Layer `env` over `stored`. Fails before any network call when the
    /// token or repository is missing from both.
    pub fn resolve(env: impl Fn(&str) -> Option<String>, stored: &StoredConfig) -> Result<Self, UsageError> {
        let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        let token = non_empty(ENV_TOKEN).or_else(|| stored.token.clone());
        let repo = non_empty(ENV_REPO).or_else(|| stored.repo.clone());

        let (token, repo) = match (token, repo) {
            (Some(token), Some(repo)) => (token, repo),
            (token, _) => {
                let missing = if token.is_none() { ENV_TOKEN } else { ENV_REPO };
                return Err(UsageError::new(format!(
                    "Ensure {ENV_TOKEN} and {ENV_REPO} environment variables are correctly set, \
                     or run `shbin auth`. (missing {missing})"
                )));
            }
        };

        Ok(Settings {
            token,
            repo,
            api_url: non_empty(ENV_API_URL).unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            web_url: non_empty(ENV_WEB_URL).unwrap_or_else(|| DEFAULT_WEB_URL.to_string()),
            workflow: non_empty(ENV_WORKFLOW).unwrap_or_else(|| DEFAULT_WORKFLOW.to_string()),
            copy_url: copy_enabled(env(ENV_COPY_URL).as_deref()),
            user: non_empty(ENV_USER),
        })
    }

    /// Resolve from the process environment and the config file.
    pub fn load() -> Result<Self> {
        let stored = load_config(&config_path()?)?;
        Ok(Settings::resolve(|key| std::env::var(key).ok(), &stored)?)
    }
}

/// `SHBIN_COPY_URL` disables copying with `0`, `false` or `no`.
pub fn copy_enabled(value: Option<&str>) -> bool {
    !matches!(
        value.map(|v| v.trim().to_lowercase()).as_deref(),
        Some("0") | Some("false") | Some("no")
    )
}

/// `SHBIN_CONFIG`, else `<config dir>/shbin/config.json`.
pub fn config_path() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(ENV_CONFIG) {
        return Ok(PathBuf::from(path));
    }
    let dir = dirs::config_dir().context("Could not determine the user config directory")?;
    Ok(dir.join("shbin").join("config.json"))
}

/// Missing or unreadable files yield an empty config.
pub fn load_config(path: &Path) -> Result<StoredConfig> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(StoredConfig::default()),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
    };
    match serde_json::from_str(&raw) {
        Ok(config) => Ok(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring malformed config file");
            Ok(StoredConfig::default())
        }
    }
}

/// Write the config next to its final location, then move it into place.
pub fn save_config(path: &Path, config: &StoredConfig) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create a temporary file in {}", dir.display()))?;
    serde_json::to_writer_pretty(&mut tmp, config).context("Failed to serialize config")?;
    tmp.write_all(b"\n")?;
    tmp.persist(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Store a fresh token and repository, keeping any other keys.
pub fn store_credentials(path: &Path, token: &str, repo: &str) -> Result<()> {
    let mut config = load_config(path)?;
    config.token = Some(token.to_string());
    config.repo = Some(repo.to_string());
    save_config(path, &config)
}
