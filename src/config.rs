use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct EvnaConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub retrieval: RetrievalConfig,
    pub sync: SyncConfig,
    pub projects: ProjectsConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
    /// Active-tier messages older than this are moved into the archive.
    pub active_ttl_hours: i64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_limit: usize,
    /// Upper bound on any caller-supplied `limit`.
    pub max_limit: usize,
    /// Share of `limit` requested from the active tier.
    pub active_ratio: f64,
    /// Minimum active-tier request size.
    pub active_floor: usize,
    /// Lookback window when the caller gives no `since`.
    pub lookback_days: i64,
    /// Historical tier is asked for `limit * historical_overfetch` results.
    pub historical_overfetch: usize,
    pub default_threshold: f64,
    /// Other-client messages kept in a mid-turn client-aware query.
    pub cross_client_tail: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SyncConfig {
    pub enabled: bool,
    pub debounce_ms: u64,
    /// Sync target passed to the sync script.
    pub daemon_type: String,
    pub watch_dir: String,
    /// Only files with this suffix count as writes.
    pub extension: String,
    pub script: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ProjectsConfig {
    /// Canonical project name → alternative spellings.
    pub aliases: HashMap<String, Vec<String>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_evna_dir()
            .join("evna.db")
            .to_string_lossy()
            .into_owned();
        Self {
            db_path,
            active_ttl_hours: 72,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 100,
            active_ratio: 0.3,
            active_floor: 3,
            lookback_days: 7,
            historical_overfetch: 2,
            default_threshold: 0.0,
            cross_client_tail: 0,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        let dir = default_evna_dir();
        Self {
            enabled: true,
            debounce_ms: 5000,
            daemon_type: "daily".into(),
            watch_dir: dir.join("daily").to_string_lossy().into_owned(),
            extension: ".md".into(),
            script: dir.join("bin").join("sync.sh").to_string_lossy().into_owned(),
            timeout_secs: 30,
        }
    }
}

impl RetrievalConfig {
    /// `requested` or the default, capped at `max_limit`.
    pub fn clamp_limit(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default_limit).min(self.max_limit)
    }
}

/// Returns `~/.evna/`
pub fn default_evna_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".evna")
}

/// Returns the default config file path: `~/.evna/config.toml`
pub fn default_config_path() -> PathBuf {
    default_evna_dir().join("config.toml")
}

impl EvnaConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            EvnaConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (EVNA_DB, EVNA_LOG_LEVEL,
    /// EVNA_SYNC_ENABLED, EVNA_WATCH_DIR).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("EVNA_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("EVNA_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("EVNA_SYNC_ENABLED") {
            self.sync.enabled =
                !matches!(val.to_lowercase().as_str(), "0" | "false" | "no" | "off");
        }
        if let Ok(val) = std::env::var("EVNA_WATCH_DIR") {
            self.sync.watch_dir = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EvnaConfig::default();
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.retrieval.active_ratio, 0.3);
        assert_eq!(config.retrieval.active_floor, 3);
        assert_eq!(config.retrieval.lookback_days, 7);
        assert_eq!(config.retrieval.historical_overfetch, 2);
        assert!(config.sync.enabled);
        assert_eq!(config.sync.debounce_ms, 5000);
        assert_eq!(config.sync.extension, ".md");
        assert!(config.storage.db_path.ends_with("evna.db"));
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[server]
log_level = "debug"

[storage]
db_path = "/tmp/test.db"

[sync]
enabled = false
debounce_ms = 250
daemon_type = "dispatch"

[projects.aliases]
evna = ["evna-next", "evna_mcp"]
"#;
        let config: EvnaConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.storage.db_path, "/tmp/test.db");
        assert!(!config.sync.enabled);
        assert_eq!(config.sync.debounce_ms, 250);
        assert_eq!(config.sync.daemon_type, "dispatch");
        assert_eq!(config.projects.aliases["evna"].len(), 2);
        // defaults still apply for unset fields
        assert_eq!(config.storage.active_ttl_hours, 72);
        assert_eq!(config.retrieval.default_limit, 10);
        assert_eq!(config.sync.extension, ".md");
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = EvnaConfig::default();
        std::env::set_var("EVNA_DB", "/tmp/override.db");
        std::env::set_var("EVNA_LOG_LEVEL", "trace");
        std::env::set_var("EVNA_SYNC_ENABLED", "false");
        std::env::set_var("EVNA_WATCH_DIR", "/tmp/notes");

        config.apply_env_overrides();

        assert_eq!(config.storage.db_path, "/tmp/override.db");
        assert_eq!(config.server.log_level, "trace");
        assert!(!config.sync.enabled);
        assert_eq!(config.sync.watch_dir, "/tmp/notes");

        // Clean up
        std::env::remove_var("EVNA_DB");
        std::env::remove_var("EVNA_LOG_LEVEL");
        std::env::remove_var("EVNA_SYNC_ENABLED");
        std::env::remove_var("EVNA_WATCH_DIR");
    }

    #[test]
    fn clamp_limit_applies_default_and_cap() {
        let retrieval = RetrievalConfig::default();
        assert_eq!(retrieval.clamp_limit(None), 10);
        assert_eq!(retrieval.clamp_limit(Some(25)), 25);
        assert_eq!(retrieval.clamp_limit(Some(usize::MAX)), 100);
    }

    #[test]
    fn expand_tilde_leaves_absolute_paths() {
        assert_eq!(expand_tilde("/var/evna.db"), PathBuf::from("/var/evna.db"));
    }
}
