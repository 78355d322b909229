// crates/db/src/usercc.rs
//! Country share of global DNS query volume.

use std::collections::BTreeMap;

use poolstats_core::points;
use serde::Serialize;
use serde_json::Value;

use crate::clickhouse::{row_count, row_str};
use crate::{ClickHouse, DbResult};

/// One country's share of the day's query volume, percent per IP version.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryShare {
    pub cc: String,
    pub ipv4: f64,
    pub ipv6: f64,
}

#[derive(Debug, Default, Clone, Copy)]
struct VersionCounts {
    v4: u64,
    v6: u64,
}

impl VersionCounts {
    fn set(&mut self, qtype: &str, count: u64) {
        match qtype {
            "A" => self.v4 = count,
            "AAAA" => self.v6 = count,
            _ => {}
        }
    }
}

impl ClickHouse {
    /// Per-country share of the most recent day's query volume.
    pub async fn user_country_data(&self) -> DbResult<Vec<CountryShare>> {
        let rows = self
            .logs
            .query_rows(
                "SELECT max(dt) AS d, UserCC, Qtype, sum(queries) AS queries \
                 FROM by_usercc_1d \
                 WHERE dt > now() - INTERVAL 4 DAY \
                 GROUP BY ROLLUP(Qtype, UserCC) \
                 ORDER BY UserCC, Qtype",
                &[],
            )
            .await?;
        Ok(country_shares(&rows))
    }
}

/// Fold the per-day rollup into shares for the most recent day.
///
/// Detail rows carry a country and a query type; the per-qtype subtotal
/// rows (country rolled up) are that day's totals; the fully rolled-up
/// row spans the whole window and is skipped.
fn country_shares(raw: &[Value]) -> Vec<CountryShare> {
    // Day keys are the wire strings; ISO format keeps BTreeMap ordering
    // chronological.
    let mut per_day: BTreeMap<String, BTreeMap<String, VersionCounts>> = BTreeMap::new();
    let mut totals: BTreeMap<String, VersionCounts> = BTreeMap::new();

    for row in raw {
        let day = row_str(row, "d");
        let cc = row_str(row, "UserCC");
        let qtype = row_str(row, "Qtype");
        let Some(count) = row_count(row, "queries") else {
            tracing::warn!(row = %row, "could not parse count, dropping row");
            continue;
        };

        if !cc.is_empty() {
            per_day
                .entry(day.to_string())
                .or_default()
                .entry(cc.to_string())
                .or_default()
                .set(qtype, count);
        } else if !qtype.is_empty() {
            totals.entry(day.to_string()).or_default().set(qtype, count);
        }
        // country and qtype both rolled up: the window-wide total, unused
    }

    let Some((day, countries)) = per_day
        .iter()
        .rev()
        .find(|(day, _)| totals.contains_key(*day))
    else {
        return Vec::new();
    };
    let total = totals[day];

    let mut shares: Vec<CountryShare> = countries
        .iter()
        .map(|(cc, counts)| CountryShare {
            cc: cc.clone(),
            ipv4: points(100.0, total.v4, counts.v4),
            ipv6: points(100.0, total.v6, counts.v6),
        })
        .collect();

    shares.sort_by(|a, b| b.ipv4.total_cmp(&a.ipv4));
    shares
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn shares_for_most_recent_day() {
        let raw = vec![
            json!({"d": "2025-07-30", "UserCC": "", "Qtype": "", "queries": 2000}),
            json!({"d": "2025-07-30", "UserCC": "", "Qtype": "A", "queries": 1000}),
            json!({"d": "2025-07-30", "UserCC": "", "Qtype": "AAAA", "queries": 400}),
            json!({"d": "2025-07-30", "UserCC": "de", "Qtype": "A", "queries": 250}),
            json!({"d": "2025-07-30", "UserCC": "de", "Qtype": "AAAA", "queries": 100}),
            json!({"d": "2025-07-30", "UserCC": "se", "Qtype": "A", "queries": 500}),
        ];

        let shares = country_shares(&raw);

        assert_eq!(shares.len(), 2);
        // Sorted by descending IPv4 share.
        assert_eq!(shares[0].cc, "se");
        assert_eq!(shares[0].ipv4, 50.0);
        assert_eq!(shares[1].cc, "de");
        assert_eq!(shares[1].ipv4, 25.0);
        // The v6 share is measured against the v6 total.
        assert_eq!(shares[1].ipv6, 25.0);
    }

    #[test]
    fn missing_v6_total_does_not_blow_up() {
        let raw = vec![
            json!({"d": "2025-07-30", "UserCC": "", "Qtype": "A", "queries": 1000}),
            json!({"d": "2025-07-30", "UserCC": "de", "Qtype": "A", "queries": 250}),
            json!({"d": "2025-07-30", "UserCC": "de", "Qtype": "AAAA", "queries": 100}),
        ];

        let shares = country_shares(&raw);

        assert_eq!(shares.len(), 1);
        assert!(shares[0].ipv6.is_finite());
    }

    #[test]
    fn empty_result_set() {
        assert!(country_shares(&[]).is_empty());
    }
}
