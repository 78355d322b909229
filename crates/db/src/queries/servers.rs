// crates/db/src/queries/servers.rs
//! Server lookups.

use crate::models::Server;
use crate::queries::Database;
use crate::DbResult;

/// Servers scheduled for deletion longer ago than this are gone for good;
/// their URLs should 404 rather than serve stale data.
const DELETED_SERVER_CUTOFF_DAYS: i64 = 720;

impl Database {
    pub async fn get_server_by_id(&self, id: u32) -> DbResult<Option<Server>> {
        let server = sqlx::query_as::<_, Server>(
            "SELECT id, ip, ip_version, netspeed, deletion_on FROM servers WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(server)
    }

    pub async fn get_server_by_ip(&self, ip: &str) -> DbResult<Option<Server>> {
        let server = sqlx::query_as::<_, Server>(
            "SELECT id, ip, ip_version, netspeed, deletion_on FROM servers WHERE ip = ?",
        )
        .bind(ip)
        .fetch_optional(self.pool())
        .await?;
        Ok(server)
    }

    /// The advertised netspeed for a server IP; `None` when the server
    /// doesn't exist.
    pub async fn get_server_netspeed(&self, ip: &str) -> DbResult<Option<u32>> {
        let netspeed: Option<(u32,)> =
            sqlx::query_as("SELECT netspeed FROM servers WHERE ip = ?")
                .bind(ip)
                .fetch_optional(self.pool())
                .await?;
        Ok(netspeed.map(|(n,)| n))
    }

    /// Find a server by numeric id or by IP address. Unknown servers and
    /// servers deleted beyond the cutoff come back as `None`; the HTTP
    /// layer turns that into a 404, not an error.
    pub async fn find_server(&self, server_param: &str) -> DbResult<Option<Server>> {
        let server = match server_param.parse::<u32>() {
            Ok(id) if id > 0 => self.get_server_by_id(id).await?,
            _ => match server_param.parse::<std::net::IpAddr>() {
                Ok(ip) => self.get_server_by_ip(&ip.to_string()).await?,
                Err(_) => None,
            },
        };
        Ok(server.filter(|s| !s.deletion_age_exceeds(DELETED_SERVER_CUTOFF_DAYS)))
    }
}
