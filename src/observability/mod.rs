//! Observability: per-question query log

pub mod logger;

pub use logger::{QueryLogEntry, QueryLogger, QueryRoute};
