//! # Storage Module
//!
//! Everything that crosses the boundary of the in-memory ledger.
//!
//! ## Key Responsibilities
//!
//! - **Remote Store**: the authoritative list/create/update/delete capability
//!   for transactions and categories, consumed through [`RemoteStore`]
//! - **Snapshot Cache**: the last-known copy of the ledger, shown while the
//!   remote store loads or when it cannot be reached
//!
//! ## Implementations
//!
//! - **JSON File**: [`JsonFileSnapshotStore`] writes the snapshot atomically
//!   via a temporary file and rename
//! - **In Memory**: `InMemoryRemoteStore` and `InMemorySnapshotStore` for
//!   tests, behind the `testing` feature; the remote one can fail, delay or
//!   hold requests

pub mod json_snapshot;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod traits;

pub use json_snapshot::JsonFileSnapshotStore;
#[cfg(any(test, feature = "testing"))]
pub use memory::{InMemoryRemoteStore, InMemorySnapshotStore, RemoteCall, RemoteOperation};
pub use traits::{LedgerSnapshot, RemoteStore, SnapshotStore};
