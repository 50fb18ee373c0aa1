//! Runtime configuration for the ledger store.

use std::env;
use std::path::PathBuf;
use tracing::{info, warn};

/// Tunables for validation and local persistence
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    pub max_description_length: usize,
    pub max_name_length: usize,
    pub max_amount: f64,
    /// Where the last-known snapshot lives; `None` disables the cache
    pub snapshot_path: Option<PathBuf>,
    /// Show the cached snapshot before the remote fetch completes
    pub seed_from_snapshot: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_description_length: 256,
            max_name_length: 64,
            max_amount: 1_000_000.0,
            snapshot_path: Self::default_snapshot_path(),
            seed_from_snapshot: true,
        }
    }
}

impl LedgerConfig {
    /// Defaults overridden by `LEDGER_SNAPSHOT_PATH`, `LEDGER_MAX_AMOUNT`
    /// and `LEDGER_SEED_FROM_SNAPSHOT`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = env::var("LEDGER_SNAPSHOT_PATH") {
            let path = path.trim();
            if path.is_empty() || path == "none" {
                info!("Snapshot cache disabled via LEDGER_SNAPSHOT_PATH");
                config.snapshot_path = None;
            } else {
                config.snapshot_path = Some(PathBuf::from(path));
            }
        }

        if let Ok(value) = env::var("LEDGER_MAX_AMOUNT") {
            match value.trim().parse::<f64>() {
                Ok(max) if max.is_finite() && max > 0.0 => config.max_amount = max,
                _ => warn!("Ignoring invalid LEDGER_MAX_AMOUNT '{}'", value),
            }
        }

        if let Ok(value) = env::var("LEDGER_SEED_FROM_SNAPSHOT") {
            match parse_flag(&value) {
                Some(flag) => config.seed_from_snapshot = flag,
                None => warn!("Ignoring invalid LEDGER_SEED_FROM_SNAPSHOT '{}'", value),
            }
        }

        config
    }

    /// `<platform data dir>/ledger-store/snapshot.json`
    pub fn default_snapshot_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("ledger-store").join("snapshot.json"))
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
