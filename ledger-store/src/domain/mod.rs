//! # Domain Module
//!
//! Everything the ledger knows about its own state:
//!
//! - **reducer**: `LedgerState`, the closed `LedgerAction` set and `reduce`
//! - **state_store**: the observable holder that dispatches actions
//! - **sync_service**: optimistic writes with confirm-or-rollback
//! - **id_queue**: per-identifier serialisation of in-flight writes
//! - **query**: read-only views derived from the current state
//! - **bootstrap_service**: initial load, resync and snapshot fallback
//! - **ledger**: the handle handed to the UI layer
//!
//! Nothing outside this module mutates a `LedgerState`.

pub mod bootstrap_service;
pub mod id_queue;
pub mod ledger;
pub mod query;
pub mod reducer;
pub mod state_store;
pub mod sync_service;
pub mod validation;

pub use bootstrap_service::*;
pub use id_queue::{IdQueue, IdTicket};
pub use ledger::Ledger;
pub use query::*;
pub use reducer::*;
pub use state_store::StateStore;
pub use sync_service::*;

use std::fmt;

/// The two entity collections kept in sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Transaction,
    Category,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Transaction => "transaction",
            EntityKind::Category => "category",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
