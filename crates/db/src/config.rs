// crates/db/src/config.rs
//! Settings file loading.
//!
//! Connections are configured from one YAML file:
//!
//! ```yaml
//! clickhouse:
//!   logs:   { url: "http://ch-logs:8123", database: dns_logs, user: report }
//!   scores: { url: "http://ch-scores:8123", database: scores, user: report }
//! mysql:
//!   dsn: "mysql://report:secret@db/pool"
//! graph_service:
//!   url: "https://graphs.example.net"
//! ```
//!
//! `POOLSTATS_CONFIG` selects the file (default `poolstats.yaml`).

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{DbError, DbResult};

pub const CONFIG_ENV: &str = "POOLSTATS_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "poolstats.yaml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub clickhouse: ClickHouseSettings,
    #[serde(default)]
    pub mysql: MysqlSettings,
    #[serde(default)]
    pub graph_service: GraphServiceSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClickHouseSettings {
    #[serde(default)]
    pub logs: ConnSettings,
    #[serde(default)]
    pub scores: ConnSettings,
}

/// One ClickHouse HTTP connection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnSettings {
    pub url: String,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MysqlSettings {
    #[serde(default)]
    pub dsn: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphServiceSettings {
    #[serde(default)]
    pub url: Option<String>,
}

impl Settings {
    pub fn load(path: &Path) -> DbResult<Self> {
        let raw = fs::read_to_string(path).map_err(|source| DbError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| DbError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from the path named by `POOLSTATS_CONFIG`, falling back to
    /// `poolstats.yaml` in the working directory.
    pub fn from_env() -> DbResult<Self> {
        let path = std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let yaml = r#"
clickhouse:
  logs: { url: "http://ch:8123", database: dns_logs, user: report, password: hunter2 }
  scores: { url: "http://ch:8124", database: scores, user: report }
mysql:
  dsn: "mysql://report:secret@db/pool"
graph_service:
  url: "https://graphs.example.net"
"#;
        let settings: Settings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.clickhouse.logs.url, "http://ch:8123");
        assert_eq!(settings.clickhouse.logs.password.as_deref(), Some("hunter2"));
        assert_eq!(settings.clickhouse.scores.database, "scores");
        assert_eq!(settings.mysql.dsn, "mysql://report:secret@db/pool");
        assert_eq!(
            settings.graph_service.url.as_deref(),
            Some("https://graphs.example.net")
        );
    }

    #[test]
    fn missing_sections_default() {
        let settings: Settings = serde_yaml::from_str("mysql: { dsn: \"mysql://x\" }").unwrap();
        assert!(settings.clickhouse.logs.url.is_empty());
        assert!(settings.graph_service.url.is_none());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Settings::load(Path::new("/nonexistent/poolstats.yaml")).unwrap_err();
        assert!(matches!(err, DbError::ConfigRead { .. }));
    }
}
