//! Observable holder of the current [`LedgerState`].
//!
//! Dispatch runs the reducer under the channel's write lock, so two
//! dispatches never interleave and every observer sees whole transitions.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

use super::reducer::{reduce, LedgerAction, LedgerState};

pub struct StateStore {
    sender: watch::Sender<Arc<LedgerState>>,
}

impl StateStore {
    pub fn new(initial: LedgerState) -> Self {
        let (sender, _receiver) = watch::channel(Arc::new(initial));
        Self { sender }
    }

    /// Apply one action and publish the resulting state
    pub fn dispatch(&self, action: LedgerAction) -> Arc<LedgerState> {
        let name = action.name();
        let mut published = None;
        self.sender.send_modify(|state| {
            let next = Arc::new(reduce(state, action));
            published = Some(next.clone());
            *state = next;
        });
        let state = published.unwrap_or_else(|| self.snapshot());
        debug!(
            action = name,
            transactions = state.transactions().len(),
            categories = state.categories().len(),
            balance = state.balance(),
            "Dispatched ledger action"
        );
        state
    }

    /// The current state; cheap to clone and safe to keep
    pub fn snapshot(&self) -> Arc<LedgerState> {
        self.sender.borrow().clone()
    }

    /// Receiver notified after every dispatch
    pub fn subscribe(&self) -> watch::Receiver<Arc<LedgerState>> {
        self.sender.subscribe()
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new(LedgerState::default())
    }
}
