//! Database connection management using sqlx

use crate::config::DatabaseConfig;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

pub type DbPool = MySqlPool;

const MAX_CONNECTIONS: u32 = 5;

/// Connection options for either a URL or discrete host settings.
pub fn connect_options(config: &DatabaseConfig) -> Result<MySqlConnectOptions, sqlx::Error> {
    match config {
        DatabaseConfig::Url(url) => MySqlConnectOptions::from_str(url),
        DatabaseConfig::Parts { host, port, database, user, password } => {
            Ok(MySqlConnectOptions::new()
                .host(host)
                .port(*port)
                .database(database)
                .username(user)
                .password(password))
        }
    }
}

/// Initialize the connection pool and check it with a trivial query.
pub async fn init_pool(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    let pool = MySqlPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(Duration::from_secs(30))
        .connect_with(connect_options(config)?)
        .await?;

    sqlx::query("SELECT 1").execute(&pool).await?;
    info!("Connected to {}", config.describe());

    Ok(pool)
}
