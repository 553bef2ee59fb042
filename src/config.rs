//! Configuration loading for the sync engine.
//!
//! The config file is a single JSON object; key names follow the
//! deployed config format. Missing or invalid required values are a
//! fatal startup condition handled in `main`.

use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Directory snapshot files are written to
    #[serde(rename = "backup-folder")]
    pub backup_folder: PathBuf,

    /// Seconds between lesson refresh cycles
    #[serde(rename = "raspUpdateInterval")]
    pub rasp_update_interval: u64,

    /// Seconds between group roster refresh cycles
    #[serde(rename = "groupsUpdateInterval")]
    pub groups_update_interval: u64,

    /// Seconds between automatic backups
    #[serde(rename = "autoBackupInterval")]
    pub auto_backup_interval: u64,

    /// Upstream session credential, sent as a cookie header
    #[serde(rename = "authToken")]
    pub auth_token: String,

    /// Path of the sqlite database file
    #[serde(rename = "database", default = "default_database")]
    pub database: PathBuf,

    /// Address the HTTP API listens on
    #[serde(rename = "bind-address", default = "default_bind_address")]
    pub bind_address: String,

    /// Upstream base URL
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    /// Education space the schedule is requested for
    #[serde(rename = "educationSpaceId", default = "default_education_space")]
    pub education_space: u32,
}

fn default_database() -> PathBuf {
    PathBuf::from("rasp.db")
}

fn default_bind_address() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_base_url() -> String {
    "https://edu.donstu.ru".to_string()
}

fn default_education_space() -> u32 {
    4
}

impl AppConfig {
    /// Loads the configuration from a JSON file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let config: AppConfig = serde_json::from_str(
            r#"{
                "backup-folder": "/var/lib/rasp/backups",
                "raspUpdateInterval": 900,
                "groupsUpdateInterval": 86400,
                "autoBackupInterval": 3600,
                "authToken": "secret"
            }"#,
        )
        .unwrap();

        assert_eq!(config.rasp_update_interval, 900);
        assert_eq!(config.bind_address, "0.0.0.0:8000");
        assert_eq!(config.base_url, "https://edu.donstu.ru");
        assert_eq!(config.education_space, 4);
    }

    #[test]
    fn test_missing_required_key_is_an_error() {
        let result = serde_json::from_str::<AppConfig>(r#"{"authToken": "secret"}"#);
        assert!(result.is_err());
    }
}
