use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

use crate::ledger::{LedgerSettings, DEFAULT_CREATION_FEE_WEI};

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_JOURNAL_PATH: &str = "ticketchain.journal";
const DEFAULT_TRANSFER_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_LOCK_WAIT_MS: u64 = 2_000;
const DEFAULT_CONFLICT_RETRIES: u32 = 3;

pub struct Config {
    pub port: u16,
    pub journal_path: PathBuf,
    /// Exact event-creation fee, in wei.
    pub creation_fee: u64,
    pub transfer_timeout: Duration,
    pub lock_wait: Duration,
    /// How many times the handler layer retries a lost lock race.
    pub conflict_retries: u32,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env_parsed("PORT", DEFAULT_PORT),
            journal_path: env::var("LEDGER_JOURNAL")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_JOURNAL_PATH)),
            creation_fee: env_parsed("CREATION_FEE_WEI", DEFAULT_CREATION_FEE_WEI),
            transfer_timeout: Duration::from_millis(env_parsed(
                "TRANSFER_TIMEOUT_MS",
                DEFAULT_TRANSFER_TIMEOUT_MS,
            )),
            lock_wait: Duration::from_millis(env_parsed("LOCK_WAIT_MS", DEFAULT_LOCK_WAIT_MS)),
            conflict_retries: env_parsed("CONFLICT_RETRIES", DEFAULT_CONFLICT_RETRIES),
        }
    }

    pub fn ledger_settings(&self) -> LedgerSettings {
        LedgerSettings {
            journal_path: self.journal_path.clone(),
            creation_fee: self.creation_fee,
            transfer_timeout: self.transfer_timeout,
            lock_wait: self.lock_wait,
        }
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, raw = %raw, "unparseable value, using default");
                default
            }
        },
        Err(_) => default,
    }
}
