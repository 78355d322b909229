// crates/server/src/state.rs
//! Application state for the Axum server.

use std::time::Instant;

use poolstats_core::AliasTable;
use poolstats_db::{ClickHouse, Database, Settings};

/// Shared application state accessible from all route handlers.
///
/// Everything here is either a connection handle or immutable request-scoped
/// input; no per-request state lives in it, so handlers never synchronize.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// Pool metadata database (servers, zones, monitors).
    pub db: Database,
    /// The two analytic connections (query logs and monitoring scores).
    pub ch: ClickHouse,
    /// Outbound client for the graph rendering service.
    pub http: reqwest::Client,
    /// Base URL of the graph rendering service, when configured.
    pub graph_service_url: Option<String>,
    /// Breakdown keys whose reference data uses a different name.
    pub aliases: AliasTable,
}

impl AppState {
    pub fn new(db: Database, ch: ClickHouse, settings: &Settings) -> Self {
        Self {
            start_time: Instant::now(),
            db,
            ch,
            http: reqwest::Client::new(),
            graph_service_url: settings.graph_service.url.clone(),
            aliases: country_aliases(),
        }
    }
}

/// The query-log country tags follow the ccTLD convention while the zone
/// data uses ISO-political naming; the table maps one onto the other.
pub fn country_aliases() -> AliasTable {
    AliasTable::from_pairs([("gb", "uk")])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gb_resolves_to_uk() {
        let aliases = country_aliases();
        assert_eq!(aliases.resolve("gb"), "uk");
        assert_eq!(aliases.resolve("de"), "de");
    }
}
