// crates/db/src/models.rs
//! Row types shared across the query layer.

use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// IP version, stored lowercase in both databases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            IpVersion::V4 => "v4",
            IpVersion::V6 => "v6",
        }
    }

    /// The DNS answer record type served to this version.
    pub fn qtype(&self) -> &'static str {
        match self {
            IpVersion::V4 => "A",
            IpVersion::V6 => "AAAA",
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Server {
    pub id: u32,
    pub ip: String,
    pub ip_version: IpVersion,
    pub netspeed: u32,
    pub deletion_on: Option<NaiveDateTime>,
}

impl Server {
    /// True when the server was scheduled for deletion more than `days`
    /// days ago. Such servers answer 404, not stale data.
    pub fn deletion_age_exceeds(&self, days: i64) -> bool {
        match self.deletion_on {
            Some(t) => t < Utc::now().naive_utc() - chrono::Duration::days(days),
            None => false,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Zone {
    pub id: u32,
    pub name: String,
}

/// One day of registered/active counts for a zone and IP version.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ZoneServerCount {
    pub ip_version: IpVersion,
    pub date: NaiveDate,
    pub count_active: u32,
    pub count_registered: u32,
    pub netspeed_active: u32,
}

/// A zone's share of pool capacity, percent per IP version.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneStat {
    pub cc: String,
    pub v4: f64,
    pub v6: f64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Monitor {
    pub id: u32,
    #[sqlx(rename = "type")]
    pub monitor_type: String,
    pub name: String,
    pub location: String,
    pub tls_name: Option<String>,
    pub ip_version: Option<IpVersion>,
    pub status: String,
}

impl Monitor {
    /// Short human name: the explicit name, else the first label of the
    /// tls name, else location and id.
    pub fn display_name(&self) -> String {
        display_name(self.id, &self.name, self.tls_name.as_deref(), &self.location)
    }
}

/// Current score of one monitor for one server.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ServerScoreRow {
    pub id: u32,
    pub name: String,
    pub tls_name: Option<String>,
    pub location: String,
    #[sqlx(rename = "type")]
    pub monitor_type: String,
    pub status: String,
    pub score_ts: Option<NaiveDateTime>,
    pub score_raw: f64,
}

impl ServerScoreRow {
    pub fn display_name(&self) -> String {
        display_name(self.id, &self.name, self.tls_name.as_deref(), &self.location)
    }
}

fn display_name(id: u32, name: &str, tls_name: Option<&str>, location: &str) -> String {
    if !name.is_empty() {
        return name.to_string();
    }
    if let Some(tls) = tls_name {
        if !tls.is_empty() {
            return tls.split('.').next().unwrap_or(tls).to_string();
        }
    }
    if !location.is_empty() {
        return format!("{location} ({id})");
    }
    id.to_string()
}

/// One score measurement. `ts` is epoch seconds; `rtt` is microseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogScore {
    pub id: u64,
    #[serde(default)]
    pub monitor_id: Option<u32>,
    pub server_id: u32,
    pub ts: i64,
    pub score: f64,
    pub step: f64,
    #[serde(default)]
    pub offset: Option<f64>,
    #[serde(default)]
    pub rtt: Option<i64>,
    #[serde(default)]
    pub leap: Option<u8>,
    #[serde(default)]
    pub warning: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl LogScore {
    /// Round-trip time in milliseconds, when measured.
    pub fn rtt_ms(&self) -> Option<f64> {
        self.rtt.map(|us| us as f64 / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_prefers_explicit_name() {
        let m = Monitor {
            id: 7,
            monitor_type: "monitor".into(),
            name: "Amsterdam".into(),
            location: "nl".into(),
            tls_name: Some("ams1.mon.example.net".into()),
            ip_version: Some(IpVersion::V4),
            status: "active".into(),
        };
        assert_eq!(m.display_name(), "Amsterdam");
    }

    #[test]
    fn display_name_falls_back_to_tls_label_then_location() {
        let mut m = Monitor {
            id: 7,
            monitor_type: "monitor".into(),
            name: String::new(),
            location: "nl".into(),
            tls_name: Some("ams1.mon.example.net".into()),
            ip_version: None,
            status: "active".into(),
        };
        assert_eq!(m.display_name(), "ams1");

        m.tls_name = None;
        assert_eq!(m.display_name(), "nl (7)");

        m.location = String::new();
        assert_eq!(m.display_name(), "7");
    }

    #[test]
    fn qtype_follows_ip_version() {
        assert_eq!(IpVersion::V4.qtype(), "A");
        assert_eq!(IpVersion::V6.qtype(), "AAAA");
    }

    #[test]
    fn rtt_is_reported_in_milliseconds() {
        let ls = LogScore {
            id: 1,
            monitor_id: Some(2),
            server_id: 3,
            ts: 0,
            score: 20.0,
            step: 1.0,
            offset: None,
            rtt: Some(12_500),
            leap: None,
            warning: None,
            error: None,
        };
        assert_eq!(ls.rtt_ms(), Some(12.5));
    }
}
