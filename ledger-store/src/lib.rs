//! # Ledger Store
//!
//! A local, observable copy of one user's transactions and categories, kept
//! consistent with a remote authoritative store.
//!
//! - Writes are applied optimistically and confirmed or rolled back once the
//!   remote store answers ([`domain::SyncService`])
//! - Every change goes through a pure reducer, so the balance is always the
//!   signed sum of the current transactions ([`domain::reduce`])
//! - Month and date-range views are derived on demand ([`domain::query`])
//! - Startup loads both collections concurrently and falls back to a cached
//!   snapshot, flagged as stale, when the remote store is unreachable
//!
//! [`Ledger`] bundles all of this behind one handle for the UI layer.

pub mod config;
pub mod domain;
pub mod error;
pub mod storage;

pub use config::LedgerConfig;
pub use domain::{BootstrapReport, EntityKind, Ledger, LedgerAction, LedgerState, LoadOutcome};
pub use error::{LedgerError, LedgerResult, RemoteError, ValidationError};

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Install the global `tracing` subscriber. Honours `RUST_LOG`, defaulting to
/// `info`. Safe to call more than once.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        if fmt().with_env_filter(filter).try_init().is_err() {
            tracing::debug!("A tracing subscriber was already installed");
        }
    });
}
