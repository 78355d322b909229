// crates/db/src/queries/zones.rs
//! Zone lookups and capacity statistics.

use poolstats_core::points;
use sqlx::FromRow;

use crate::models::{IpVersion, Zone, ZoneServerCount, ZoneStat};
use crate::queries::Database;
use crate::DbResult;

/// Latest active netspeed for one zone and IP version. The root zone
/// (`.`) carries the pool-wide totals.
#[derive(Debug, Clone, FromRow)]
pub struct ZoneStatsRow {
    pub name: String,
    pub ip_version: IpVersion,
    pub netspeed_active: u64,
}

/// Latest active netspeed of the zones one server belongs to, for the
/// server's own IP version.
#[derive(Debug, Clone, FromRow)]
pub struct ServerZoneStat {
    pub zone_name: String,
    pub netspeed_active: u64,
}

impl Database {
    pub async fn get_zone_by_name(&self, name: &str) -> DbResult<Option<Zone>> {
        let zone = sqlx::query_as::<_, Zone>("SELECT id, name FROM zones WHERE name = ?")
            .bind(name)
            .fetch_optional(self.pool())
            .await?;
        Ok(zone)
    }

    /// Full count history for a zone, ascending by date with the IP
    /// versions interleaved per day.
    pub async fn get_zone_counts(&self, zone_id: u32) -> DbResult<Vec<ZoneServerCount>> {
        let counts = sqlx::query_as::<_, ZoneServerCount>(
            "SELECT ip_version, date, count_active, count_registered, netspeed_active \
             FROM zone_server_counts \
             WHERE zone_id = ? \
             ORDER BY date, ip_version",
        )
        .bind(zone_id)
        .fetch_all(self.pool())
        .await?;
        Ok(counts)
    }

    /// Latest per-zone netspeed for every zone and IP version.
    pub async fn get_zone_stats_data(&self) -> DbResult<Vec<ZoneStatsRow>> {
        let rows = sqlx::query_as::<_, ZoneStatsRow>(
            "SELECT z.name, c.ip_version, \
                    CAST(c.netspeed_active AS UNSIGNED) AS netspeed_active \
             FROM zones z \
             JOIN zone_server_counts c ON c.zone_id = z.id \
             WHERE c.date = (SELECT MAX(date) FROM zone_server_counts \
                             WHERE zone_id = z.id AND ip_version = c.ip_version)",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Latest netspeed of the zones `ip` belongs to, matched to the
    /// server's IP version. The reference data for per-country netspeed
    /// points.
    pub async fn get_server_zone_stats(&self, ip: &str) -> DbResult<Vec<ServerZoneStat>> {
        let rows = sqlx::query_as::<_, ServerZoneStat>(
            "SELECT z.name AS zone_name, \
                    CAST(c.netspeed_active AS UNSIGNED) AS netspeed_active \
             FROM servers s \
             JOIN server_zones sz ON sz.server_id = s.id \
             JOIN zones z ON z.id = sz.zone_id \
             JOIN zone_server_counts c ON c.zone_id = z.id AND c.ip_version = s.ip_version \
             WHERE s.ip = ? \
               AND c.date = (SELECT MAX(date) FROM zone_server_counts \
                             WHERE zone_id = z.id AND ip_version = s.ip_version)",
        )
        .bind(ip)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Every zone's share of pool capacity, percent per IP version.
    pub async fn zone_stats(&self) -> DbResult<Vec<ZoneStat>> {
        Ok(fold_zone_stats(&self.get_zone_stats_data().await?))
    }
}

fn fold_zone_stats(rows: &[ZoneStatsRow]) -> Vec<ZoneStat> {
    let mut total4 = 0u64;
    let mut total6 = 0u64;
    let mut zones: Vec<(String, u64, u64)> = Vec::new();

    for row in rows {
        if row.name == "." {
            match row.ip_version {
                IpVersion::V4 => total4 = row.netspeed_active,
                IpVersion::V6 => total6 = row.netspeed_active,
            }
            continue;
        }
        let entry = match zones.iter_mut().find(|(name, _, _)| *name == row.name) {
            Some(entry) => entry,
            None => {
                zones.push((row.name.clone(), 0, 0));
                zones.last_mut().unwrap()
            }
        };
        match row.ip_version {
            IpVersion::V4 => entry.1 = row.netspeed_active,
            IpVersion::V6 => entry.2 = row.netspeed_active,
        }
    }

    let mut stats: Vec<ZoneStat> = zones
        .into_iter()
        .map(|(name, v4, v6)| ZoneStat {
            cc: name,
            v4: points(100.0, total4, v4),
            v6: points(100.0, total6, v6),
        })
        .collect();
    stats.sort_by(|a, b| a.cc.cmp(&b.cc));
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, ip_version: IpVersion, netspeed_active: u64) -> ZoneStatsRow {
        ZoneStatsRow {
            name: name.into(),
            ip_version,
            netspeed_active,
        }
    }

    #[test]
    fn shares_relative_to_root_zone() {
        let rows = vec![
            row(".", IpVersion::V4, 1000),
            row(".", IpVersion::V6, 200),
            row("de", IpVersion::V4, 250),
            row("de", IpVersion::V6, 100),
            row("se", IpVersion::V4, 100),
        ];

        let stats = fold_zone_stats(&rows);

        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].cc, "de");
        assert_eq!(stats[0].v4, 25.0);
        assert_eq!(stats[0].v6, 50.0);
        assert_eq!(stats[1].cc, "se");
        assert_eq!(stats[1].v4, 10.0);
        assert_eq!(stats[1].v6, 0.0);
    }

    #[test]
    fn zero_totals_stay_finite() {
        let rows = vec![row("de", IpVersion::V4, 250)];
        let stats = fold_zone_stats(&rows);
        assert!(stats[0].v4.is_finite());
        assert!(stats[0].v6.is_finite());
    }
}
