// crates/db/src/queries/mod.rs
//! MySQL pool-database queries.

pub mod monitors;
pub mod servers;
pub mod zones;

use std::time::Duration;

use sqlx::mysql::{MySqlPool, MySqlPoolOptions};

use crate::DbResult;

/// Handle to the pool metadata database (servers, zones, monitors).
#[derive(Debug, Clone)]
pub struct Database {
    pool: MySqlPool,
}

impl Database {
    pub async fn connect(dsn: &str) -> DbResult<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(8)
            .acquire_timeout(Duration::from_secs(5))
            .connect(dsn)
            .await?;
        Ok(Self { pool })
    }

    /// Create a handle without establishing a connection; the first query
    /// connects. Lets the server come up while the database is still
    /// starting.
    pub fn connect_lazy(dsn: &str) -> DbResult<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(8)
            .acquire_timeout(Duration::from_secs(5))
            .connect_lazy(dsn)?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    pub async fn ping(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
