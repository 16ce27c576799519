use crate::workspace::WorkspacePaths;
use keeper_core::{KeeperError, KeeperResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

pub const CONFIG_VERSION: u32 = 1;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    pub version: u32,
    /// Server used when neither `--server` nor a stored session names one.
    #[serde(default)]
    pub server: String,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            server: String::new(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl WorkspaceConfig {
    pub fn with_server(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            ..Self::default()
        }
    }

    /// Replaces the default server and reports whether it changed.
    pub fn set_server(&mut self, server: &str) -> bool {
        let server = server.trim().trim_end_matches('/');
        if self.server == server {
            return false;
        }
        self.server = server.to_string();
        true
    }

    pub fn ensure_defaults(&mut self) {
        if self.version == 0 {
            self.version = CONFIG_VERSION;
        }

        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = DEFAULT_TIMEOUT_SECS;
        }

        self.server = self.server.trim().trim_end_matches('/').to_string();
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

pub fn load_config(paths: &WorkspacePaths) -> KeeperResult<WorkspaceConfig> {
    let contents = fs::read_to_string(&paths.config_path).map_err(|err| {
        KeeperError::storage(format!(
            "failed to read workspace config '{}': {}",
            paths.config_path.display(),
            err
        ))
    })?;

    let mut config: WorkspaceConfig = toml::from_str(&contents).map_err(|err| {
        KeeperError::usage(format!(
            "failed to parse workspace config '{}': {}",
            paths.config_path.display(),
            err
        ))
    })?;
    config.ensure_defaults();
    Ok(config)
}

pub fn save_config(paths: &WorkspacePaths, config: &WorkspaceConfig) -> KeeperResult<()> {
    let serialized = toml::to_string_pretty(config)
        .map_err(|err| KeeperError::storage(format!("failed to encode config.toml: {err}")))?;

    fs::write(&paths.config_path, serialized).map_err(|err| {
        KeeperError::storage(format!(
            "failed to write workspace config '{}': {}",
            paths.config_path.display(),
            err
        ))
    })
}

/// Picks the server for a command: explicit override first, then the one
/// remembered with the session, then the workspace default.
pub fn resolve_server(
    config: &WorkspaceConfig,
    server_override: Option<&str>,
    stored_server: Option<&str>,
) -> KeeperResult<String> {
    let candidate = server_override
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .or_else(|| stored_server.map(str::trim).filter(|value| !value.is_empty()))
        .unwrap_or(config.server.as_str());

    let server = candidate.trim_end_matches('/');
    if server.is_empty() {
        return Err(KeeperError::usage(
            "no server configured; pass --server or run `keeper init --server <url>`",
        ));
    }

    Ok(server.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_resolution_prefers_override_then_session() {
        let config = WorkspaceConfig::with_server("https://default.example.com");

        assert_eq!(
            resolve_server(&config, Some("https://cli.example.com/"), Some("https://s"))
                .expect("override"),
            "https://cli.example.com"
        );
        assert_eq!(
            resolve_server(&config, None, Some("https://stored.example.com")).expect("stored"),
            "https://stored.example.com"
        );
        assert_eq!(
            resolve_server(&config, Some(" "), Some("")).expect("default"),
            "https://default.example.com"
        );
        assert!(resolve_server(&WorkspaceConfig::default(), None, None).is_err());
    }

    #[test]
    fn set_server_normalizes_and_reports_changes() {
        let mut config = WorkspaceConfig::with_server("https://host");

        assert!(!config.set_server(" https://host/ "));
        assert!(config.set_server("https://other/"));
        assert_eq!(config.server, "https://other");
    }

    #[test]
    fn missing_timeout_falls_back_to_default() {
        let mut config: WorkspaceConfig =
            toml::from_str("version = 1\nserver = \"https://h/\"\n").expect("parse");
        config.ensure_defaults();
        assert_eq!(config.request_timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.server, "https://h");
    }
}
