//! Optimistic writes against the remote store.
//!
//! Every write follows the same three steps, whatever the entity:
//!
//! 1. **apply**: validate locally, then dispatch the optimistic action so
//!    the UI reflects the change at once
//! 2. **confirm**: on remote success, dispatch the authoritative entity in
//!    place of the optimistic one
//! 3. **compensate**: on remote failure, dispatch the inverse action and
//!    return the [`RemoteError`] to the caller
//!
//! Writes to one id are serialised through an [`IdQueue`]. Once the
//! optimistic step is applied the remote request runs on its own task, so a
//! caller that stops waiting never leaves an optimistic mutation behind.

use async_trait::async_trait;
use shared::{
    generate_temporary_id, Category, CategoryDraft, CategoryPatch, Transaction, TransactionDraft,
    TransactionPatch,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::id_queue::{IdQueue, IdTicket};
use super::reducer::{LedgerAction, LedgerState};
use super::state_store::StateStore;
use super::validation::{
    validate_category_draft, validate_category_patch, validate_transaction_draft,
    validate_transaction_patch,
};
use super::EntityKind;
use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult, RemoteError, ValidationError};
use crate::storage::RemoteStore;

/// An entity kind the sync pipeline can write
#[async_trait]
pub trait SyncedEntity: Clone + Send + Sync + 'static {
    type Draft: Clone + Send + Sync + 'static;
    type Patch: Clone + Send + Sync + 'static;

    const KIND: EntityKind;

    fn entity_id(&self) -> &str;

    /// Local entity for a draft not yet confirmed by the store
    fn build(id: String, draft: &Self::Draft) -> Self;

    /// Patch that restores every field of `self`
    fn snapshot_patch(&self) -> Self::Patch;

    fn validate_draft(draft: &Self::Draft, config: &LedgerConfig) -> Result<(), ValidationError>;

    fn validate_patch(patch: &Self::Patch, config: &LedgerConfig) -> Result<(), ValidationError>;

    fn find(state: &LedgerState, id: &str) -> Option<Self>;

    fn added(entity: Self) -> LedgerAction;

    fn replaced(old_id: String, entity: Self) -> LedgerAction;

    fn updated(id: String, patch: Self::Patch) -> LedgerAction;

    fn removed(id: String) -> LedgerAction;

    async fn create_remote(remote: &dyn RemoteStore, draft: Self::Draft) -> Result<Self, RemoteError>;

    async fn update_remote(remote: &dyn RemoteStore, id: &str, patch: Self::Patch) -> Result<Self, RemoteError>;

    async fn delete_remote(remote: &dyn RemoteStore, id: &str) -> Result<(), RemoteError>;
}

#[async_trait]
impl SyncedEntity for Transaction {
    type Draft = TransactionDraft;
    type Patch = TransactionPatch;

    const KIND: EntityKind = EntityKind::Transaction;

    fn entity_id(&self) -> &str {
        &self.id
    }

    fn build(id: String, draft: &TransactionDraft) -> Self {
        Transaction::from_draft(id, draft)
    }

    fn snapshot_patch(&self) -> TransactionPatch {
        self.to_patch()
    }

    fn validate_draft(draft: &TransactionDraft, config: &LedgerConfig) -> Result<(), ValidationError> {
        validate_transaction_draft(draft, config)
    }

    fn validate_patch(patch: &TransactionPatch, config: &LedgerConfig) -> Result<(), ValidationError> {
        validate_transaction_patch(patch, config)
    }

    fn find(state: &LedgerState, id: &str) -> Option<Self> {
        state.transaction(id).cloned()
    }

    fn added(entity: Self) -> LedgerAction {
        LedgerAction::TransactionAdded(entity)
    }

    fn replaced(old_id: String, entity: Self) -> LedgerAction {
        LedgerAction::TransactionReplaced {
            old_id,
            transaction: entity,
        }
    }

    fn updated(id: String, patch: TransactionPatch) -> LedgerAction {
        LedgerAction::TransactionUpdated { id, patch }
    }

    fn removed(id: String) -> LedgerAction {
        LedgerAction::TransactionRemoved(id)
    }

    async fn create_remote(remote: &dyn RemoteStore, draft: TransactionDraft) -> Result<Self, RemoteError> {
        remote.create_transaction(draft).await
    }

    async fn update_remote(remote: &dyn RemoteStore, id: &str, patch: TransactionPatch) -> Result<Self, RemoteError> {
        remote.update_transaction(id, patch).await
    }

    async fn delete_remote(remote: &dyn RemoteStore, id: &str) -> Result<(), RemoteError> {
        remote.delete_transaction(id).await
    }
}

#[async_trait]
impl SyncedEntity for Category {
    type Draft = CategoryDraft;
    type Patch = CategoryPatch;

    const KIND: EntityKind = EntityKind::Category;

    fn entity_id(&self) -> &str {
        &self.id
    }

    fn build(id: String, draft: &CategoryDraft) -> Self {
        Category::from_draft(id, draft)
    }

    fn snapshot_patch(&self) -> CategoryPatch {
        self.to_patch()
    }

    fn validate_draft(draft: &CategoryDraft, config: &LedgerConfig) -> Result<(), ValidationError> {
        validate_category_draft(draft, config)
    }

    fn validate_patch(patch: &CategoryPatch, config: &LedgerConfig) -> Result<(), ValidationError> {
        validate_category_patch(patch, config)
    }

    fn find(state: &LedgerState, id: &str) -> Option<Self> {
        state.category(id).cloned()
    }

    fn added(entity: Self) -> LedgerAction {
        LedgerAction::CategoryAdded(entity)
    }

    fn replaced(old_id: String, entity: Self) -> LedgerAction {
        LedgerAction::CategoryReplaced {
            old_id,
            category: entity,
        }
    }

    fn updated(id: String, patch: CategoryPatch) -> LedgerAction {
        LedgerAction::CategoryUpdated { id, patch }
    }

    fn removed(id: String) -> LedgerAction {
        LedgerAction::CategoryRemoved(id)
    }

    async fn create_remote(remote: &dyn RemoteStore, draft: CategoryDraft) -> Result<Self, RemoteError> {
        remote.create_category(draft).await
    }

    async fn update_remote(remote: &dyn RemoteStore, id: &str, patch: CategoryPatch) -> Result<Self, RemoteError> {
        remote.update_category(id, patch).await
    }

    async fn delete_remote(remote: &dyn RemoteStore, id: &str) -> Result<(), RemoteError> {
        remote.delete_category(id).await
    }
}

/// Wraps every write capability of the remote store with optimistic
/// apply / confirm / compensate semantics
#[derive(Clone)]
pub struct SyncService {
    store: Arc<StateStore>,
    remote: Arc<dyn RemoteStore>,
    config: Arc<LedgerConfig>,
    queue: IdQueue,
    /// Temporary id -> id confirmed by the store
    aliases: Arc<Mutex<HashMap<String, String>>>,
}

impl SyncService {
    pub fn new(store: Arc<StateStore>, remote: Arc<dyn RemoteStore>, config: Arc<LedgerConfig>) -> Self {
        Self {
            store,
            remote,
            config,
            queue: IdQueue::new(),
            aliases: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Insert under a temporary id, then swap in the store's entity
    pub async fn add<E: SyncedEntity>(&self, draft: E::Draft) -> LedgerResult<E> {
        E::validate_draft(&draft, &self.config)?;

        let temp_id = generate_temporary_id(E::KIND.as_str());
        let ticket = self.queue.acquire(&temp_id).await;
        self.store.dispatch(E::added(E::build(temp_id.clone(), &draft)));
        debug!(kind = %E::KIND, %temp_id, "Optimistically added");

        let service = self.clone();
        let task = tokio::spawn(async move {
            let result = match E::create_remote(service.remote.as_ref(), draft).await {
                Ok(confirmed) => {
                    service.record_alias(&temp_id, confirmed.entity_id());
                    if E::find(&service.store.snapshot(), &temp_id).is_some() {
                        info!("Reconciled {} {} as {}", E::KIND, temp_id, confirmed.entity_id());
                        service.store.dispatch(E::replaced(temp_id.clone(), confirmed.clone()));
                    } else {
                        info!(
                            "Discarding confirmation of {} {}: no longer in the ledger",
                            E::KIND,
                            temp_id
                        );
                    }
                    Ok(confirmed)
                }
                Err(error) => {
                    warn!("Creating {} {} failed, rolling back: {}", E::KIND, temp_id, error);
                    service.store.dispatch(E::removed(temp_id.clone()));
                    Err(LedgerError::Remote(error))
                }
            };
            // The alias lives while writers are queued on the temporary id
            if ticket.release() {
                service.forget_alias(&temp_id);
            }
            result
        });

        finish(task).await
    }

    /// Merge the patch locally, then reconcile with the store's response
    pub async fn update<E: SyncedEntity>(&self, id: &str, patch: E::Patch) -> LedgerResult<E> {
        E::validate_patch(&patch, &self.config)?;

        let ticket = self.acquire(id).await;
        let id = ticket.id().to_string();
        let previous = self.require::<E>(&id)?;
        self.store.dispatch(E::updated(id.clone(), patch.clone()));
        debug!(kind = %E::KIND, %id, "Optimistically updated");

        let service = self.clone();
        let task = tokio::spawn(async move {
            let _ticket = ticket;
            match E::update_remote(service.remote.as_ref(), &id, patch).await {
                Ok(confirmed) => {
                    if E::find(&service.store.snapshot(), &id).is_some() {
                        debug!(kind = %E::KIND, %id, "Update confirmed");
                        service.store.dispatch(E::replaced(id, confirmed.clone()));
                    } else {
                        info!("Discarding update of {} {}: no longer in the ledger", E::KIND, id);
                    }
                    Ok(confirmed)
                }
                Err(error) => {
                    warn!("Updating {} {} failed, restoring previous values: {}", E::KIND, id, error);
                    service.store.dispatch(E::updated(id, previous.snapshot_patch()));
                    Err(LedgerError::Remote(error))
                }
            }
        });

        finish(task).await
    }

    /// Remove locally, then restore the captured entity if the store refuses
    pub async fn remove<E: SyncedEntity>(&self, id: &str) -> LedgerResult<()> {
        let ticket = self.acquire(id).await;
        let id = ticket.id().to_string();
        let captured = self.require::<E>(&id)?;
        self.store.dispatch(E::removed(id.clone()));
        debug!(kind = %E::KIND, %id, "Optimistically removed");

        let service = self.clone();
        let task = tokio::spawn(async move {
            let _ticket = ticket;
            match E::delete_remote(service.remote.as_ref(), &id).await {
                Ok(()) => {
                    info!("Deleted {} {}", E::KIND, id);
                    Ok(())
                }
                Err(error) => {
                    warn!("Deleting {} {} failed, restoring it: {}", E::KIND, id, error);
                    service.store.dispatch(E::added(captured));
                    Err(LedgerError::Remote(error))
                }
            }
        });

        finish(task).await
    }

    /// Number of ids with a write in flight or queued
    pub fn pending_operations(&self) -> usize {
        self.queue.active()
    }

    /// Wait for the id's queue, following it to the confirmed id if the
    /// entity was reconciled while we waited
    async fn acquire(&self, id: &str) -> IdTicket {
        let mut ticket = self.queue.acquire(id).await;
        while let Some(confirmed) = self.alias_of(ticket.id()) {
            let temp_id = ticket.id().to_string();
            if ticket.release() {
                self.forget_alias(&temp_id);
            }
            ticket = self.queue.acquire(&confirmed).await;
        }
        ticket
    }

    fn require<E: SyncedEntity>(&self, id: &str) -> Result<E, ValidationError> {
        E::find(&self.store.snapshot(), id).ok_or_else(|| ValidationError::UnknownId {
            kind: E::KIND,
            id: id.to_string(),
        })
    }

    fn record_alias(&self, temp_id: &str, confirmed_id: &str) {
        if temp_id != confirmed_id {
            self.aliases
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(temp_id.to_string(), confirmed_id.to_string());
        }
    }

    fn forget_alias(&self, temp_id: &str) {
        self.aliases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(temp_id);
    }

    fn alias_of(&self, id: &str) -> Option<String> {
        self.aliases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }
}

async fn finish<T>(task: JoinHandle<LedgerResult<T>>) -> LedgerResult<T> {
    task.await
        .map_err(|error| LedgerError::Internal(format!("sync task did not complete: {}", error)))?
}
