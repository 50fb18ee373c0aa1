//! # Storage Traits
//!
//! Capabilities the ledger consumes but does not implement: the remote
//! authoritative store and the local last-known snapshot. The domain layer
//! only talks to these traits, so transports and file formats can be swapped
//! without touching the sync logic.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{Category, CategoryDraft, CategoryPatch, Transaction, TransactionDraft, TransactionPatch};

use crate::error::RemoteError;

/// The remote authoritative store
///
/// Implementations translate their own failures into the three outcomes the
/// ledger distinguishes: transport, authorization and rejected payload.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Every transaction of the signed-in user
    async fn list_transactions(&self) -> Result<Vec<Transaction>, RemoteError>;

    /// Create a transaction and return it with its store-assigned id
    async fn create_transaction(&self, draft: TransactionDraft) -> Result<Transaction, RemoteError>;

    /// Apply a partial update; the response is the authoritative, possibly
    /// normalised, transaction
    async fn update_transaction(&self, id: &str, patch: TransactionPatch) -> Result<Transaction, RemoteError>;

    async fn delete_transaction(&self, id: &str) -> Result<(), RemoteError>;

    async fn list_categories(&self) -> Result<Vec<Category>, RemoteError>;

    async fn create_category(&self, draft: CategoryDraft) -> Result<Category, RemoteError>;

    async fn update_category(&self, id: &str, patch: CategoryPatch) -> Result<Category, RemoteError>;

    async fn delete_category(&self, id: &str) -> Result<(), RemoteError>;
}

/// Last-known copy of the ledger, used only to avoid a blank screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub saved_at: DateTime<Utc>,
    pub transactions: Vec<Transaction>,
    pub categories: Vec<Category>,
}

/// Local persistence for [`LedgerSnapshot`]
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// `Ok(None)` when no snapshot has been saved yet
    async fn load(&self) -> Result<Option<LedgerSnapshot>>;

    async fn save(&self, snapshot: &LedgerSnapshot) -> Result<()>;
}
