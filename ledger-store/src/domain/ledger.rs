use chrono::NaiveDate;
use shared::{Category, CategoryDraft, CategoryPatch, Transaction, TransactionDraft, TransactionPatch};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use super::bootstrap_service::{BootstrapReport, BootstrapService};
use super::query::{self, BalanceRow, CategoryTotal, MonthSummary};
use super::reducer::LedgerState;
use super::state_store::StateStore;
use super::sync_service::SyncService;
use crate::config::LedgerConfig;
use crate::error::LedgerResult;
use crate::storage::{JsonFileSnapshotStore, RemoteStore, SnapshotStore};

/// The ledger as the UI sees it: current state, optimistic writes and
/// queries. Cloning yields another handle onto the same state.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<StateStore>,
    sync: SyncService,
    bootstrap: BootstrapService,
}

impl Ledger {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        snapshots: Option<Arc<dyn SnapshotStore>>,
        config: LedgerConfig,
    ) -> Self {
        let config = Arc::new(config);
        let store = Arc::new(StateStore::default());
        Self {
            sync: SyncService::new(store.clone(), remote.clone(), config.clone()),
            bootstrap: BootstrapService::new(store.clone(), remote, snapshots, config),
            store,
        }
    }

    /// Snapshot cache at `config.snapshot_path`, if any
    pub fn from_config(remote: Arc<dyn RemoteStore>, config: LedgerConfig) -> Self {
        let snapshots = config.snapshot_path.as_ref().map(|path| {
            info!("Using snapshot cache at {}", path.display());
            Arc::new(JsonFileSnapshotStore::new(path)) as Arc<dyn SnapshotStore>
        });
        Self::new(remote, snapshots, config)
    }

    /// Initial load; see [`BootstrapService::bootstrap`]
    pub async fn start(&self) -> BootstrapReport {
        self.bootstrap.bootstrap().await
    }

    pub async fn resync(&self) -> LedgerResult<()> {
        self.bootstrap.resync().await
    }

    pub async fn save_snapshot(&self) -> anyhow::Result<bool> {
        self.bootstrap.save_snapshot().await
    }

    pub fn state(&self) -> Arc<LedgerState> {
        self.store.snapshot()
    }

    /// Notified with the new state after every change
    pub fn subscribe(&self) -> watch::Receiver<Arc<LedgerState>> {
        self.store.subscribe()
    }

    pub fn pending_operations(&self) -> usize {
        self.sync.pending_operations()
    }

    // Writes

    pub async fn add_transaction(&self, draft: TransactionDraft) -> LedgerResult<Transaction> {
        self.sync.add::<Transaction>(draft).await
    }

    pub async fn update_transaction(&self, id: &str, patch: TransactionPatch) -> LedgerResult<Transaction> {
        self.sync.update::<Transaction>(id, patch).await
    }

    pub async fn remove_transaction(&self, id: &str) -> LedgerResult<()> {
        self.sync.remove::<Transaction>(id).await
    }

    pub async fn add_category(&self, draft: CategoryDraft) -> LedgerResult<Category> {
        self.sync.add::<Category>(draft).await
    }

    pub async fn update_category(&self, id: &str, patch: CategoryPatch) -> LedgerResult<Category> {
        self.sync.update::<Category>(id, patch).await
    }

    pub async fn remove_category(&self, id: &str) -> LedgerResult<()> {
        self.sync.remove::<Category>(id).await
    }

    // Queries

    pub fn transactions_by_month(&self, month: u32, year: i32) -> Vec<Transaction> {
        query::by_month(&self.state(), month, year)
    }

    pub fn transactions_by_date_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<Transaction> {
        query::by_date_range(&self.state(), start, end)
    }

    pub fn running_balances(&self) -> Vec<BalanceRow> {
        query::running_balances(&self.state())
    }

    pub fn month_summary(&self, month: u32, year: i32) -> MonthSummary {
        query::month_summary(&self.state(), month, year)
    }

    pub fn category_totals(&self, start: NaiveDate, end: NaiveDate) -> Vec<CategoryTotal> {
        query::category_totals(&self.state(), start, end)
    }
}
