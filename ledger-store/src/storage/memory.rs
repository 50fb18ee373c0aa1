//! In-memory implementations of the storage traits.
//!
//! [`InMemoryRemoteStore`] behaves like a small authoritative server: it
//! assigns ids, normalises text fields and can be told to fail, slow down or
//! hold requests so the optimistic paths of the ledger can be exercised.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{Category, CategoryDraft, CategoryPatch, Transaction, TransactionDraft, TransactionPatch};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

use super::traits::{LedgerSnapshot, RemoteStore, SnapshotStore};
use crate::error::RemoteError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOperation {
    ListTransactions,
    CreateTransaction,
    UpdateTransaction,
    DeleteTransaction,
    ListCategories,
    CreateCategory,
    UpdateCategory,
    DeleteCategory,
}

/// One request as the store received it
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCall {
    pub operation: RemoteOperation,
    pub id: Option<String>,
}

struct RemoteData {
    transactions: Vec<Transaction>,
    categories: Vec<Category>,
    next_id: u64,
    failures: HashMap<RemoteOperation, VecDeque<RemoteError>>,
    delays: HashMap<RemoteOperation, VecDeque<Duration>>,
    calls: Vec<RemoteCall>,
}

pub struct InMemoryRemoteStore {
    data: Mutex<RemoteData>,
    paused: watch::Sender<bool>,
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        let (paused, _receiver) = watch::channel(false);
        Self {
            data: Mutex::new(RemoteData {
                transactions: Vec::new(),
                categories: Vec::new(),
                next_id: 1,
                failures: HashMap::new(),
                delays: HashMap::new(),
                calls: Vec::new(),
            }),
            paused,
        }
    }

    pub fn with_transactions(self, transactions: Vec<Transaction>) -> Self {
        self.data().transactions = transactions;
        self
    }

    pub fn with_categories(self, categories: Vec<Category>) -> Self {
        self.data().categories = categories;
        self
    }

    /// Numeric part of the next assigned id ("t100", "c100", ...)
    pub fn with_next_id(self, next_id: u64) -> Self {
        self.data().next_id = next_id;
        self
    }

    /// Make the next call of `operation` fail with `error`
    pub fn fail_next(&self, operation: RemoteOperation, error: RemoteError) {
        self.data().failures.entry(operation).or_default().push_back(error);
    }

    /// Make the next call of `operation` take at least `delay`
    pub fn delay_next(&self, operation: RemoteOperation, delay: Duration) {
        self.data().delays.entry(operation).or_default().push_back(delay);
    }

    /// Hold every request until [`Self::resume`]
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.data().transactions.clone()
    }

    pub fn categories(&self) -> Vec<Category> {
        self.data().categories.clone()
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.data().calls.clone()
    }

    fn data(&self) -> MutexGuard<'_, RemoteData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the call, then apply any scheduled delay, pause or failure
    async fn begin(&self, operation: RemoteOperation, id: Option<&str>) -> Result<(), RemoteError> {
        let (failure, delay) = {
            let mut data = self.data();
            data.calls.push(RemoteCall {
                operation,
                id: id.map(str::to_string),
            });
            let failure = data.failures.get_mut(&operation).and_then(VecDeque::pop_front);
            let delay = data.delays.get_mut(&operation).and_then(VecDeque::pop_front);
            (failure, delay)
        };
        debug!(?operation, ?id, "Remote request received");

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut paused = self.paused.subscribe();
        // Err only if the sender is gone, which cannot happen while self lives
        let _ = paused.wait_for(|paused| !*paused).await;

        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn assign_id(data: &mut RemoteData, prefix: &str) -> String {
        let id = format!("{}{}", prefix, data.next_id);
        data.next_id += 1;
        id
    }
}

impl Default for InMemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Servers trim free text; an all-blank description is stored as none
fn normalise_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn list_transactions(&self) -> Result<Vec<Transaction>, RemoteError> {
        self.begin(RemoteOperation::ListTransactions, None).await?;
        Ok(self.transactions())
    }

    async fn create_transaction(&self, draft: TransactionDraft) -> Result<Transaction, RemoteError> {
        self.begin(RemoteOperation::CreateTransaction, None).await?;
        if draft.amount < 0.0 || !draft.amount.is_finite() {
            return Err(RemoteError::Rejected("amount must be a non-negative number".to_string()));
        }

        let mut data = self.data();
        let id = Self::assign_id(&mut data, "t");
        let mut transaction = Transaction::from_draft(id, &draft);
        transaction.description = normalise_description(transaction.description);
        data.transactions.push(transaction.clone());
        Ok(transaction)
    }

    async fn update_transaction(&self, id: &str, patch: TransactionPatch) -> Result<Transaction, RemoteError> {
        self.begin(RemoteOperation::UpdateTransaction, Some(id)).await?;

        let mut data = self.data();
        let transaction = data
            .transactions
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        transaction.apply_patch(&patch);
        transaction.description = normalise_description(transaction.description.take());
        Ok(transaction.clone())
    }

    async fn delete_transaction(&self, id: &str) -> Result<(), RemoteError> {
        self.begin(RemoteOperation::DeleteTransaction, Some(id)).await?;

        let mut data = self.data();
        let before = data.transactions.len();
        data.transactions.retain(|t| t.id != id);
        if data.transactions.len() == before {
            return Err(RemoteError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, RemoteError> {
        self.begin(RemoteOperation::ListCategories, None).await?;
        Ok(self.categories())
    }

    async fn create_category(&self, draft: CategoryDraft) -> Result<Category, RemoteError> {
        self.begin(RemoteOperation::CreateCategory, None).await?;

        let mut data = self.data();
        let id = Self::assign_id(&mut data, "c");
        let mut category = Category::from_draft(id, &draft);
        category.name = category.name.trim().to_string();
        data.categories.push(category.clone());
        Ok(category)
    }

    async fn update_category(&self, id: &str, patch: CategoryPatch) -> Result<Category, RemoteError> {
        self.begin(RemoteOperation::UpdateCategory, Some(id)).await?;

        let mut data = self.data();
        let category = data
            .categories
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        category.apply_patch(&patch);
        category.name = category.name.trim().to_string();
        Ok(category.clone())
    }

    async fn delete_category(&self, id: &str) -> Result<(), RemoteError> {
        self.begin(RemoteOperation::DeleteCategory, Some(id)).await?;

        let mut data = self.data();
        let before = data.categories.len();
        data.categories.retain(|c| c.id != id);
        if data.categories.len() == before {
            return Err(RemoteError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

/// Snapshot held in memory; can be told to refuse writes
#[derive(Default)]
pub struct InMemorySnapshotStore {
    snapshot: Mutex<Option<LedgerSnapshot>>,
    fail_saves: Mutex<bool>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: LedgerSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
            fail_saves: Mutex::new(false),
        }
    }

    pub fn set_fail_saves(&self, fail: bool) {
        *self.fail_saves.lock().unwrap_or_else(PoisonError::into_inner) = fail;
    }

    pub fn current(&self) -> Option<LedgerSnapshot> {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn load(&self) -> Result<Option<LedgerSnapshot>> {
        Ok(self.current())
    }

    async fn save(&self, snapshot: &LedgerSnapshot) -> Result<()> {
        if *self.fail_saves.lock().unwrap_or_else(PoisonError::into_inner) {
            return Err(anyhow!("snapshot storage is read-only"));
        }
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = Some(snapshot.clone());
        Ok(())
    }
}
