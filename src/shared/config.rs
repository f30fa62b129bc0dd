use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub autosave: AutosaveConfig,
    pub finalize: FinalizeConfig,
    pub sync: SyncConfig,
    pub retention: RetentionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutosaveConfig {
    /// Quiescent period before buffered edits are flushed, in milliseconds.
    pub debounce_ms: u64,
    pub max_retry: u32,
    pub retry_base_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeConfig {
    pub max_retry: u32,
    pub retry_base_ms: u64,
    pub network_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub auto_sync: bool,
    /// Reconcile cadence while connected, in seconds.
    pub foreground_interval: u64,
    /// Reconcile cadence for offline-capable standalone sessions, in seconds.
    pub background_interval: u64,
    pub batch_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// How long finalized, fully-synced records stay before local GC, in days.
    pub keep_finalized_days: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: default_database_url(),
                max_connections: 5,
                connection_timeout: 30,
            },
            autosave: AutosaveConfig {
                debounce_ms: 2000,
                max_retry: 3,
                retry_base_ms: 1000,
            },
            finalize: FinalizeConfig {
                max_retry: 3,
                retry_base_ms: 1000,
                network_timeout: 30,
            },
            sync: SyncConfig {
                auto_sync: true,
                foreground_interval: 30,
                background_interval: 300, // 5 minutes
                batch_size: 100,
            },
            retention: RetentionConfig {
                keep_finalized_days: 30,
            },
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("DEALER_DOCS_DATABASE_URL") {
            if !v.trim().is_empty() {
                cfg.database.url = v;
            }
        }
        if let Ok(v) = std::env::var("DEALER_DOCS_AUTOSAVE_DEBOUNCE_MS") {
            if let Some(value) = parse_u64(&v) {
                cfg.autosave.debounce_ms = value.max(1);
            }
        }
        if let Ok(v) = std::env::var("DEALER_DOCS_AUTO_SYNC") {
            cfg.sync.auto_sync = parse_bool(&v, cfg.sync.auto_sync);
        }
        if let Ok(v) = std::env::var("DEALER_DOCS_SYNC_FOREGROUND_INTERVAL") {
            if let Some(value) = parse_u64(&v) {
                cfg.sync.foreground_interval = value.max(1);
            }
        }
        if let Ok(v) = std::env::var("DEALER_DOCS_SYNC_BACKGROUND_INTERVAL") {
            if let Some(value) = parse_u64(&v) {
                cfg.sync.background_interval = value.max(1);
            }
        }
        if let Ok(v) = std::env::var("DEALER_DOCS_KEEP_FINALIZED_DAYS") {
            if let Some(value) = parse_u64(&v) {
                cfg.retention.keep_finalized_days = value.max(1);
            }
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }
        if self.autosave.debounce_ms == 0 {
            return Err("Autosave debounce_ms must be greater than 0".to_string());
        }
        if self.autosave.max_retry == 0 {
            return Err("Autosave max_retry must be greater than 0".to_string());
        }
        if self.finalize.max_retry == 0 {
            return Err("Finalize max_retry must be greater than 0".to_string());
        }
        if self.sync.foreground_interval == 0 || self.sync.background_interval == 0 {
            return Err("Sync intervals must be greater than 0".to_string());
        }
        if self.retention.keep_finalized_days == 0 {
            return Err("Retention keep_finalized_days must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.autosave.debounce_ms)
    }

    pub fn retention_window(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention.keep_finalized_days as i64)
    }
}

/// Platform-appropriate sqlite location for standalone operation:
/// `{data_dir}/dealer-docs/drafts.db`, falling back to a relative path when
/// no platform dir can be resolved.
fn default_database_url() -> String {
    let base = data_dir().unwrap_or_else(|| PathBuf::from("./data"));
    format!("sqlite:{}", base.join("drafts.db").display())
}

fn data_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    let base = dirs::data_local_dir();

    #[cfg(not(target_os = "macos"))]
    let base = dirs::data_dir();

    base.map(|dir| dir.join("dealer-docs"))
}

/// Platform documents directory used by the standalone artifact store.
pub fn documents_dir() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join("documents"))
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_debounce_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.autosave.debounce_ms = 0;
        assert!(cfg.validate().is_err());
    }
}
