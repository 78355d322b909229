// crates/db/src/lib.rs
//! Query layer for the pool reporting API: the ClickHouse analytic
//! connections ("logs" and "scores") and the MySQL pool database that
//! holds server/zone/monitor metadata.

use std::path::PathBuf;

use thiserror::Error;

pub mod answers;
pub mod clickhouse;
pub mod config;
pub mod logscores;
pub mod models;
mod queries;
pub mod usercc;

pub use clickhouse::{ClickHouse, ClickHouseConn};
pub use config::{ConnSettings, Settings};
pub use models::{
    IpVersion, LogScore, Monitor, Server, ServerScoreRow, Zone, ZoneServerCount, ZoneStat,
};
pub use queries::zones::{ServerZoneStat, ZoneStatsRow};
pub use queries::Database;
pub use usercc::CountryShare;

/// Errors from the query layer. Upstream query failures are mapped to
/// HTTP responses by the server crate; nothing here panics.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("could not read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("config is missing a value for {0}")]
    ConfigMissing(&'static str),

    #[error("database error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("clickhouse request failed: {0}")]
    ClickHouseTransport(#[from] reqwest::Error),

    #[error("clickhouse error ({status}): {message}")]
    ClickHouse { status: u16, message: String },
}

pub type DbResult<T> = Result<T, DbError>;
