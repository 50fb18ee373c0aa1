//! Startup loading and full resync.
//!
//! The two collections are fetched concurrently and each one is dispatched
//! as soon as it resolves, so neither waits on the other. When a fetch fails
//! the last-known snapshot stands in for that collection and the state is
//! marked stale; when both succeed the stale flag is cleared and a fresh
//! snapshot is written.

use chrono::{DateTime, Utc};
use shared::{is_temporary_id, Category, Transaction};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::reducer::LedgerAction;
use super::state_store::StateStore;
use super::EntityKind;
use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult, RemoteError};
use crate::storage::{LedgerSnapshot, RemoteStore, SnapshotStore};

/// Where one collection's data came from
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Remote { count: usize },
    /// The remote fetch failed and the snapshot's copy is shown instead
    Snapshot { count: usize, cause: RemoteError },
    /// The remote fetch failed and there was nothing to fall back on
    Failed(RemoteError),
}

impl LoadOutcome {
    pub fn error(&self) -> Option<&RemoteError> {
        match self {
            LoadOutcome::Remote { .. } => None,
            LoadOutcome::Snapshot { cause, .. } => Some(cause),
            LoadOutcome::Failed(error) => Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapReport {
    pub transactions: LoadOutcome,
    pub categories: LoadOutcome,
    /// When the snapshot in use was written, if one was found
    pub snapshot_saved_at: Option<DateTime<Utc>>,
}

impl BootstrapReport {
    /// Both collections came from the remote store
    pub fn is_complete(&self) -> bool {
        matches!(self.transactions, LoadOutcome::Remote { .. })
            && matches!(self.categories, LoadOutcome::Remote { .. })
    }

    /// Some of the shown data came from the snapshot
    pub fn is_stale(&self) -> bool {
        matches!(self.transactions, LoadOutcome::Snapshot { .. })
            || matches!(self.categories, LoadOutcome::Snapshot { .. })
    }

    /// The error to surface to the user, if any. A snapshot fallback is
    /// reported as [`LedgerError::StaleBootstrap`].
    pub fn error(&self) -> Option<LedgerError> {
        let cause = self
            .transactions
            .error()
            .or_else(|| self.categories.error())?
            .clone();

        match (self.is_stale(), self.snapshot_saved_at) {
            (true, Some(saved_at)) => Some(LedgerError::StaleBootstrap { saved_at, cause }),
            _ => Some(LedgerError::Remote(cause)),
        }
    }

    pub fn requires_reauth(&self) -> bool {
        self.error().is_some_and(|error| error.requires_reauth())
    }
}

/// Snapshot data for one collection and whether it is already on screen
struct Fallback<T> {
    items: Vec<T>,
    seeded: bool,
}

#[derive(Clone)]
pub struct BootstrapService {
    store: Arc<StateStore>,
    remote: Arc<dyn RemoteStore>,
    snapshots: Option<Arc<dyn SnapshotStore>>,
    config: Arc<LedgerConfig>,
}

impl BootstrapService {
    pub fn new(
        store: Arc<StateStore>,
        remote: Arc<dyn RemoteStore>,
        snapshots: Option<Arc<dyn SnapshotStore>>,
        config: Arc<LedgerConfig>,
    ) -> Self {
        Self {
            store,
            remote,
            snapshots,
            config,
        }
    }

    /// Populate the state at session start
    pub async fn bootstrap(&self) -> BootstrapReport {
        let snapshot = self.load_snapshot().await;
        let seeded = self.config.seed_from_snapshot && snapshot.is_some();

        if let Some(snapshot) = snapshot.as_ref().filter(|_| seeded) {
            info!(
                "Showing snapshot from {} while the remote store loads",
                snapshot.saved_at
            );
            self.store
                .dispatch(LedgerAction::TransactionsReplaced(snapshot.transactions.clone()));
            self.store
                .dispatch(LedgerAction::CategoriesReplaced(snapshot.categories.clone()));
            self.store.dispatch(LedgerAction::StaleMarked(true));
        }

        let snapshot_saved_at = snapshot.as_ref().map(|s| s.saved_at);
        let fallback = snapshot.map(|s| {
            (
                Fallback { items: s.transactions, seeded },
                Fallback { items: s.categories, seeded },
            )
        });
        self.refresh(fallback, snapshot_saved_at).await
    }

    /// Replace both collections with the remote store's current contents.
    /// On failure the local data is kept as it is and the error returned.
    pub async fn resync(&self) -> LedgerResult<()> {
        match self.refresh(None, None).await.error() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn refresh(
        &self,
        fallback: Option<(Fallback<Transaction>, Fallback<Category>)>,
        snapshot_saved_at: Option<DateTime<Utc>>,
    ) -> BootstrapReport {
        let (transaction_fallback, category_fallback) = fallback.unzip();
        let (transactions, categories) = tokio::join!(
            self.load_collection(
                EntityKind::Transaction,
                self.remote.list_transactions(),
                transaction_fallback,
                LedgerAction::TransactionsReplaced,
            ),
            self.load_collection(
                EntityKind::Category,
                self.remote.list_categories(),
                category_fallback,
                LedgerAction::CategoriesReplaced,
            ),
        );

        let report = BootstrapReport {
            transactions,
            categories,
            snapshot_saved_at,
        };
        self.finish(&report).await;
        report
    }

    /// Write the current confirmed data as the new snapshot. Stale state
    /// and entities still waiting for confirmation are never written.
    /// Returns whether a snapshot was written.
    pub async fn save_snapshot(&self) -> anyhow::Result<bool> {
        let Some(snapshots) = &self.snapshots else {
            return Ok(false);
        };

        let state = self.store.snapshot();
        if state.is_stale() {
            debug!("Skipping snapshot: state is stale");
            return Ok(false);
        }

        let snapshot = LedgerSnapshot {
            saved_at: Utc::now(),
            transactions: state
                .transactions()
                .iter()
                .filter(|t| !is_temporary_id(&t.id))
                .cloned()
                .collect(),
            categories: state
                .categories()
                .iter()
                .filter(|c| !is_temporary_id(&c.id))
                .cloned()
                .collect(),
        };
        snapshots.save(&snapshot).await?;
        Ok(true)
    }

    async fn load_snapshot(&self) -> Option<LedgerSnapshot> {
        let snapshots = self.snapshots.as_ref()?;
        match snapshots.load().await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!("Ignoring unreadable snapshot: {:#}", error);
                None
            }
        }
    }

    async fn load_collection<T, F>(
        &self,
        kind: EntityKind,
        fetch: F,
        fallback: Option<Fallback<T>>,
        replace: fn(Vec<T>) -> LedgerAction,
    ) -> LoadOutcome
    where
        F: Future<Output = Result<Vec<T>, RemoteError>>,
    {
        match fetch.await {
            Ok(items) => {
                let count = items.len();
                info!("Loaded {} {} records from the remote store", count, kind);
                self.store.dispatch(replace(items));
                LoadOutcome::Remote { count }
            }
            Err(error) => match fallback {
                Some(fallback) => {
                    warn!("Loading {} records failed, using snapshot: {}", kind, error);
                    let count = fallback.items.len();
                    if !fallback.seeded {
                        self.store.dispatch(replace(fallback.items));
                    }
                    LoadOutcome::Snapshot { count, cause: error }
                }
                None => {
                    warn!("Loading {} records failed: {}", kind, error);
                    LoadOutcome::Failed(error)
                }
            },
        }
    }

    async fn finish(&self, report: &BootstrapReport) {
        if report.is_complete() {
            self.store.dispatch(LedgerAction::StaleMarked(false));
            if let Err(error) = self.save_snapshot().await {
                warn!("Failed to save snapshot: {:#}", error);
            }
        } else if report.is_stale() {
            self.store.dispatch(LedgerAction::StaleMarked(true));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemoryRemoteStore, InMemorySnapshotStore, JsonFileSnapshotStore, RemoteOperation};
    use chrono::{NaiveDate, TimeZone};
    use shared::EntryType;
    use std::time::Duration;
    use tempfile::TempDir;

    fn transaction(id: &str, amount: f64) -> Transaction {
        Transaction {
            id: id.to_string(),
            entry_type: EntryType::Income,
            amount,
            category_id: None,
            date: NaiveDate::from_ymd_opt(2025, 8, 1).unwrap(),
            description: None,
        }
    }

    fn category(id: &str, name: &str) -> Category {
        Category {
            id: id.to_string(),
            name: name.to_string(),
            entry_type: EntryType::Income,
            color: "#123456".to_string(),
        }
    }

    fn saved_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap()
    }

    fn old_snapshot() -> LedgerSnapshot {
        LedgerSnapshot {
            saved_at: saved_at(),
            transactions: vec![transaction("old", 5.0)],
            categories: vec![category("c-old", "Old")],
        }
    }

    fn populated_remote() -> InMemoryRemoteStore {
        InMemoryRemoteStore::new()
            .with_transactions(vec![transaction("t1", 10.0), transaction("t2", 20.0)])
            .with_categories(vec![category("c1", "Allowance")])
    }

    fn create_test_service(
        remote: InMemoryRemoteStore,
        snapshots: Option<Arc<InMemorySnapshotStore>>,
        config: LedgerConfig,
    ) -> (BootstrapService, Arc<InMemoryRemoteStore>) {
        let remote = Arc::new(remote);
        let service = BootstrapService::new(
            Arc::new(StateStore::default()),
            remote.clone(),
            snapshots.map(|s| s as Arc<dyn SnapshotStore>),
            Arc::new(config),
        );
        (service, remote)
    }

    #[tokio::test]
    async fn test_bootstrap_loads_both_collections_and_saves_snapshot() {
        let snapshots = Arc::new(InMemorySnapshotStore::new());
        let (service, _remote) = create_test_service(populated_remote(), Some(snapshots.clone()), LedgerConfig::default());

        let report = service.bootstrap().await;

        assert!(report.is_complete());
        assert_eq!(report.transactions, LoadOutcome::Remote { count: 2 });
        assert!(report.error().is_none());

        let state = service.store.snapshot();
        assert_eq!(state.transactions().len(), 2);
        assert_eq!(state.categories().len(), 1);
        assert_eq!(state.balance(), 30.0);
        assert!(!state.is_stale());

        let saved = snapshots.current().unwrap();
        assert_eq!(saved.transactions, state.transactions());
        assert_eq!(saved.categories, state.categories());
    }

    #[tokio::test]
    async fn test_failed_fetch_falls_back_to_snapshot_and_marks_stale() {
        let snapshots = Arc::new(InMemorySnapshotStore::with_snapshot(old_snapshot()));
        let (service, remote) = create_test_service(populated_remote(), Some(snapshots.clone()), LedgerConfig::default());
        remote.fail_next(
            RemoteOperation::ListTransactions,
            RemoteError::Transport("timeout".to_string()),
        );

        let report = service.bootstrap().await;

        assert!(report.is_stale());
        assert_eq!(report.categories, LoadOutcome::Remote { count: 1 });
        assert!(matches!(
            report.error(),
            Some(LedgerError::StaleBootstrap { saved_at: at, cause: RemoteError::Transport(_) }) if at == saved_at()
        ));

        let state = service.store.snapshot();
        assert!(state.is_stale());
        assert_eq!(state.transaction("old").map(|t| t.amount), Some(5.0));
        assert_eq!(state.categories(), &[category("c1", "Allowance")]);
        // A stale state must not overwrite the snapshot it came from
        assert_eq!(snapshots.current().unwrap(), old_snapshot());
    }

    #[tokio::test]
    async fn test_fallback_without_seeding() {
        let snapshots = Arc::new(InMemorySnapshotStore::with_snapshot(old_snapshot()));
        let config = LedgerConfig {
            seed_from_snapshot: false,
            ..LedgerConfig::default()
        };
        let (service, remote) = create_test_service(populated_remote(), Some(snapshots), config);
        remote.fail_next(RemoteOperation::ListCategories, RemoteError::AuthExpired);

        let report = service.bootstrap().await;

        assert!(report.requires_reauth());
        let state = service.store.snapshot();
        assert!(state.is_stale());
        assert_eq!(state.transactions().len(), 2);
        assert_eq!(state.categories(), &[category("c-old", "Old")]);
    }

    #[tokio::test]
    async fn test_failed_fetch_without_snapshot_reports_remote_error() {
        let (service, remote) = create_test_service(populated_remote(), None, LedgerConfig::default());
        remote.fail_next(
            RemoteOperation::ListTransactions,
            RemoteError::Transport("offline".to_string()),
        );

        let report = service.bootstrap().await;

        assert!(matches!(report.transactions, LoadOutcome::Failed(_)));
        assert!(!report.is_stale());
        assert!(matches!(report.error(), Some(LedgerError::Remote(RemoteError::Transport(_)))));

        let state = service.store.snapshot();
        assert!(state.transactions().is_empty());
        assert_eq!(state.categories().len(), 1);
        assert!(!state.is_stale());
    }

    #[tokio::test]
    async fn test_snapshot_is_shown_before_remote_resolves() {
        let snapshots = Arc::new(InMemorySnapshotStore::with_snapshot(old_snapshot()));
        let (service, remote) = create_test_service(populated_remote(), Some(snapshots), LedgerConfig::default());
        remote.pause();

        let mut receiver = service.store.subscribe();
        let running = {
            let service = service.clone();
            tokio::spawn(async move { service.bootstrap().await })
        };
        tokio::time::timeout(
            Duration::from_secs(2),
            receiver.wait_for(|state| state.is_stale() && state.transaction("old").is_some()),
        )
        .await
        .unwrap()
        .unwrap();

        remote.resume();
        let report = running.await.unwrap();

        assert!(report.is_complete());
        let state = service.store.snapshot();
        assert!(!state.is_stale());
        assert!(state.transaction("old").is_none());
        assert_eq!(state.transactions().len(), 2);
    }

    #[tokio::test]
    async fn test_collections_are_dispatched_independently() {
        let (service, remote) = create_test_service(populated_remote(), None, LedgerConfig::default());
        remote.delay_next(RemoteOperation::ListTransactions, Duration::from_millis(200));

        let mut receiver = service.store.subscribe();
        let running = {
            let service = service.clone();
            tokio::spawn(async move { service.bootstrap().await })
        };
        tokio::time::timeout(
            Duration::from_secs(2),
            receiver.wait_for(|state| !state.categories().is_empty()),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(service.store.snapshot().transactions().is_empty());

        assert!(running.await.unwrap().is_complete());
        assert_eq!(service.store.snapshot().transactions().len(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_save_failure_is_not_fatal() {
        let snapshots = Arc::new(InMemorySnapshotStore::new());
        snapshots.set_fail_saves(true);
        let (service, _remote) = create_test_service(populated_remote(), Some(snapshots.clone()), LedgerConfig::default());

        let report = service.bootstrap().await;

        assert!(report.is_complete());
        assert!(snapshots.current().is_none());
        assert!(service.save_snapshot().await.is_err());
    }

    #[tokio::test]
    async fn test_snapshot_skips_unconfirmed_entities() {
        let snapshots = Arc::new(InMemorySnapshotStore::new());
        let (service, _remote) = create_test_service(populated_remote(), Some(snapshots.clone()), LedgerConfig::default());
        service.bootstrap().await;

        let pending = transaction(&shared::generate_temporary_id("transaction"), 1.0);
        service.store.dispatch(LedgerAction::TransactionAdded(pending));

        assert!(service.save_snapshot().await.unwrap());
        assert_eq!(snapshots.current().unwrap().transactions.len(), 2);
    }

    #[tokio::test]
    async fn test_resync_replaces_or_keeps_local_data() {
        let (service, remote) = create_test_service(populated_remote(), None, LedgerConfig::default());
        service.bootstrap().await;
        service
            .store
            .dispatch(LedgerAction::TransactionRemoved("t1".to_string()));

        service.resync().await.unwrap();
        assert_eq!(service.store.snapshot().transactions().len(), 2);

        remote.fail_next(RemoteOperation::ListTransactions, RemoteError::AuthExpired);
        service
            .store
            .dispatch(LedgerAction::TransactionRemoved("t2".to_string()));
        let error = service.resync().await.unwrap_err();

        assert!(error.requires_reauth());
        let state = service.store.snapshot();
        assert_eq!(state.transactions().len(), 1);
        assert_eq!(state.categories().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_file_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("snapshot.json");
        std::fs::write(&path, "not json").unwrap();

        let remote = Arc::new(populated_remote());
        let service = BootstrapService::new(
            Arc::new(StateStore::default()),
            remote,
            Some(Arc::new(JsonFileSnapshotStore::new(&path))),
            Arc::new(LedgerConfig::default()),
        );

        let report = service.bootstrap().await;

        assert!(report.is_complete());
        let rewritten = JsonFileSnapshotStore::new(&path).load().await.unwrap().unwrap();
        assert_eq!(rewritten.transactions.len(), 2);
    }
}
