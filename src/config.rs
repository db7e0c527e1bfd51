//! Process configuration from environment variables.
//!
//! DESIGN
//! ======
//! Every knob has a default so the server starts with no environment at
//! all: without `DATABASE_URL` documents live in memory for the lifetime
//! of the process. Unparseable values fall back to the default.

use std::time::Duration;

use crate::services::persistence::WriterConfig;
use crate::services::sync::SyncConfig;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_SAVE_DEBOUNCE_MS: u64 = 500;
const DEFAULT_RENDER_SETTLE_MS: u64 = 50;
const DEFAULT_WRITER_QUEUE_CAPACITY: usize = 64;

/// Read `key` and parse it, falling back to `default` when unset or invalid.
pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    /// Postgres URL; `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub save_debounce: Duration,
    pub render_settle: Duration,
    pub writer_queue_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: None,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            save_debounce: Duration::from_millis(DEFAULT_SAVE_DEBOUNCE_MS),
            render_settle: Duration::from_millis(DEFAULT_RENDER_SETTLE_MS),
            writer_queue_capacity: DEFAULT_WRITER_QUEUE_CAPACITY,
        }
    }
}

impl AppConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT", DEFAULT_PORT),
            database_url: std::env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty()),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            save_debounce: Duration::from_millis(env_parse("SAVE_DEBOUNCE_MS", DEFAULT_SAVE_DEBOUNCE_MS)),
            render_settle: Duration::from_millis(env_parse("RENDER_SETTLE_MS", DEFAULT_RENDER_SETTLE_MS)),
            writer_queue_capacity: env_parse("WRITER_QUEUE_CAPACITY", DEFAULT_WRITER_QUEUE_CAPACITY).max(1),
        }
    }

    /// Per-session synchronization settings.
    #[must_use]
    pub fn sync(&self) -> SyncConfig {
        SyncConfig {
            writer: WriterConfig { debounce: self.save_debounce, queue_capacity: self.writer_queue_capacity },
            render_settle: self.render_settle,
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
