use sqlx::{MySqlPool, mysql::MySqlPoolOptions};
use std::time::Duration;

/// Connects lazily: the pool opens connections on first use, so an
/// unreachable database never blocks startup.
pub fn create_pool(database_url: &str) -> Result<MySqlPool, sqlx::Error> {
    MySqlPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .connect_lazy(database_url)
}
