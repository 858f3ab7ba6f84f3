//! Server configuration, read from the environment (and `.env` via dotenvy).

use anyhow::{Context, Result};
use scan_client::{ScanConfig, DEFAULT_SCAN_API_URL};
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_USER_ID: &str = "demo-user-1";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_DATABASE_URL: &str = "sqlite:watchlist.db";

/// Where watchlist items live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// Process memory only; lost on restart.
    Memory,
    Sqlite(String),
}

impl StorageBackend {
    pub fn from_url(url: &str) -> Self {
        match url.trim() {
            "memory" | "mem" => StorageBackend::Memory,
            other => StorageBackend::Sqlite(other.to_string()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StorageBackend::Memory => "memory",
            StorageBackend::Sqlite(_) => "sqlite",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub scan: ScanConfig,
    pub storage: StorageBackend,
    pub default_user_id: String,
    /// Allowed CORS origins; `*` allows any.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], 3000).into(),
            scan: ScanConfig::default(),
            storage: StorageBackend::Sqlite(DEFAULT_DATABASE_URL.to_string()),
            default_user_id: DEFAULT_USER_ID.to_string(),
            cors_origins: vec!["*".to_string()],
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = non_empty("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .context("BIND_ADDR must be a socket address such as 0.0.0.0:3000")?;

        let timeout_secs = match non_empty("SCAN_API_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .context("SCAN_API_TIMEOUT_SECS must be a whole number of seconds")?,
            None => 30,
        };

        let scan = ScanConfig {
            base_url: non_empty("SCAN_API_URL").unwrap_or_else(|| DEFAULT_SCAN_API_URL.to_string()),
            timeout: Duration::from_secs(timeout_secs),
        };

        let storage = StorageBackend::from_url(
            &non_empty("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
        );

        let default_user_id =
            non_empty("DEFAULT_USER_ID").unwrap_or_else(|| DEFAULT_USER_ID.to_string());

        let cors_origins = non_empty("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| vec!["*".to_string()]);

        Ok(Self {
            bind_addr,
            scan,
            storage,
            default_user_id,
            cors_origins,
        })
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
