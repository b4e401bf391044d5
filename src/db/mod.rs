//! MySQL access
//!
//! Connection pool setup and the sqlx-backed executor for the sales schema.

pub mod connection;
pub mod executor;

pub use connection::{connect_options, init_pool, DbPool};
pub use executor::MySqlExecutor;
