//! Ledger state and its transition function.
//!
//! [`reduce`] is the only way a [`LedgerState`] changes. It is pure: it
//! takes the current state and one [`LedgerAction`], and returns the next
//! state without touching the original. Every action is total; an action
//! naming an id that does not exist yields a state equal to its input.
//!
//! The balance is recomputed from the full transaction list after every
//! transaction action and is never adjusted incrementally.

use shared::{compute_balance, Category, CategoryPatch, Transaction, TransactionPatch};
use tracing::warn;

/// The local copy of one user's ledger
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerState {
    transactions: Vec<Transaction>,
    categories: Vec<Category>,
    balance: f64,
    stale: bool,
}

impl LedgerState {
    /// Transactions in insertion order
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Income minus expenses over [`Self::transactions`]
    pub fn balance(&self) -> f64 {
        self.balance
    }

    /// True while some of the data came from a cached snapshot
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn transaction(&self, id: &str) -> Option<&Transaction> {
        self.transactions.iter().find(|t| t.id == id)
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// Category a transaction resolves to; `None` means uncategorised
    pub fn category_of(&self, transaction: &Transaction) -> Option<&Category> {
        transaction
            .category_id
            .as_deref()
            .and_then(|id| self.category(id))
    }
}

/// Closed set of state transitions
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerAction {
    TransactionsReplaced(Vec<Transaction>),
    TransactionAdded(Transaction),
    /// Swap the entry at `old_id` for `transaction` (reconciliation)
    TransactionReplaced {
        old_id: String,
        transaction: Transaction,
    },
    TransactionUpdated {
        id: String,
        patch: TransactionPatch,
    },
    TransactionRemoved(String),
    CategoriesReplaced(Vec<Category>),
    CategoryAdded(Category),
    CategoryReplaced {
        old_id: String,
        category: Category,
    },
    CategoryUpdated {
        id: String,
        patch: CategoryPatch,
    },
    CategoryRemoved(String),
    /// Flag the state as (not) possibly out of date
    StaleMarked(bool),
}

impl LedgerAction {
    pub fn name(&self) -> &'static str {
        match self {
            LedgerAction::TransactionsReplaced(_) => "TransactionsReplaced",
            LedgerAction::TransactionAdded(_) => "TransactionAdded",
            LedgerAction::TransactionReplaced { .. } => "TransactionReplaced",
            LedgerAction::TransactionUpdated { .. } => "TransactionUpdated",
            LedgerAction::TransactionRemoved(_) => "TransactionRemoved",
            LedgerAction::CategoriesReplaced(_) => "CategoriesReplaced",
            LedgerAction::CategoryAdded(_) => "CategoryAdded",
            LedgerAction::CategoryReplaced { .. } => "CategoryReplaced",
            LedgerAction::CategoryUpdated { .. } => "CategoryUpdated",
            LedgerAction::CategoryRemoved(_) => "CategoryRemoved",
            LedgerAction::StaleMarked(_) => "StaleMarked",
        }
    }
}

/// Compute the state that follows `state` once `action` is applied
pub fn reduce(state: &LedgerState, action: LedgerAction) -> LedgerState {
    let mut next = state.clone();

    match action {
        LedgerAction::TransactionsReplaced(transactions) => {
            next.transactions = dedup_by_id(transactions, |t| &t.id);
            refresh_balance(&mut next);
            warn_category_mismatches(&next, None);
        }
        LedgerAction::TransactionAdded(transaction) => {
            if next.transaction(&transaction.id).is_some() {
                return next;
            }
            let id = transaction.id.clone();
            next.transactions.push(transaction);
            refresh_balance(&mut next);
            warn_category_mismatches(&next, Some(&id));
        }
        LedgerAction::TransactionReplaced { old_id, transaction } => {
            let id = transaction.id.clone();
            if !replace_entry(&mut next.transactions, &old_id, transaction, |t| &t.id) {
                return next;
            }
            refresh_balance(&mut next);
            warn_category_mismatches(&next, Some(&id));
        }
        LedgerAction::TransactionUpdated { id, patch } => {
            let Some(transaction) = next.transactions.iter_mut().find(|t| t.id == id) else {
                return next;
            };
            transaction.apply_patch(&patch);
            refresh_balance(&mut next);
            warn_category_mismatches(&next, Some(&id));
        }
        LedgerAction::TransactionRemoved(id) => {
            let before = next.transactions.len();
            next.transactions.retain(|t| t.id != id);
            if next.transactions.len() != before {
                refresh_balance(&mut next);
            }
        }
        LedgerAction::CategoriesReplaced(categories) => {
            next.categories = dedup_by_id(categories, |c| &c.id);
            warn_category_mismatches(&next, None);
        }
        LedgerAction::CategoryAdded(category) => {
            if next.category(&category.id).is_none() {
                next.categories.push(category);
            }
        }
        LedgerAction::CategoryReplaced { old_id, category } => {
            replace_entry(&mut next.categories, &old_id, category, |c| &c.id);
        }
        LedgerAction::CategoryUpdated { id, patch } => {
            let Some(category) = next.categories.iter_mut().find(|c| c.id == id) else {
                return next;
            };
            let type_changed = patch.entry_type.is_some_and(|t| t != category.entry_type);
            category.apply_patch(&patch);
            if type_changed {
                warn_category_mismatches(&next, None);
            }
        }
        LedgerAction::CategoryRemoved(id) => {
            next.categories.retain(|c| c.id != id);
        }
        LedgerAction::StaleMarked(stale) => {
            next.stale = stale;
        }
    }

    next
}

/// Transactions whose category exists but carries the other entry type
pub fn category_mismatches(state: &LedgerState) -> Vec<&Transaction> {
    state
        .transactions
        .iter()
        .filter(|t| {
            state
                .category_of(t)
                .is_some_and(|category| category.entry_type != t.entry_type)
        })
        .collect()
}

fn refresh_balance(state: &mut LedgerState) {
    state.balance = compute_balance(&state.transactions);
}

/// Tolerated, but surfaced. `only` narrows the check to one transaction.
fn warn_category_mismatches(state: &LedgerState, only: Option<&str>) {
    for transaction in category_mismatches(state) {
        if only.is_some_and(|id| id != transaction.id) {
            continue;
        }
        if let Some(category) = state.category_of(transaction) {
            warn!(
                transaction_id = %transaction.id,
                category_id = %category.id,
                "{} transaction references {} category '{}'",
                transaction.entry_type,
                category.entry_type,
                category.name
            );
        }
    }
}

/// Keep the position of the first occurrence of each id, the value of the last
fn dedup_by_id<T>(items: Vec<T>, id: impl Fn(&T) -> &String) -> Vec<T> {
    let mut unique: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        match unique.iter().position(|existing| id(existing) == id(&item)) {
            Some(index) => unique[index] = item,
            None => unique.push(item),
        }
    }
    unique
}

/// Replace the entry with `old_id` by `entry`, keeping its position.
/// An existing entry that already carries the new id is overwritten and the
/// old one dropped, so ids stay unique. Returns false if `old_id` is absent.
fn replace_entry<T>(items: &mut Vec<T>, old_id: &str, entry: T, id: impl Fn(&T) -> &String) -> bool {
    let Some(old_index) = items.iter().position(|item| id(item) == old_id) else {
        return false;
    };

    let new_id = id(&entry).clone();
    let duplicate = items
        .iter()
        .enumerate()
        .position(|(index, item)| index != old_index && *id(item) == new_id);

    match duplicate {
        Some(dup_index) => {
            items[dup_index] = entry;
            items.remove(old_index);
        }
        None => items[old_index] = entry,
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use shared::EntryType;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn tx(id: &str, entry_type: EntryType, amount: f64) -> Transaction {
        Transaction {
            id: id.to_string(),
            entry_type,
            amount,
            category_id: None,
            date: date("2025-08-01"),
            description: None,
        }
    }

    fn category(id: &str, entry_type: EntryType) -> Category {
        Category {
            id: id.to_string(),
            name: format!("Category {}", id),
            entry_type,
            color: "#336699".to_string(),
        }
    }

    fn seeded() -> LedgerState {
        let state = reduce(
            &LedgerState::default(),
            LedgerAction::TransactionsReplaced(vec![
                tx("t1", EntryType::Income, 100.0),
                tx("t2", EntryType::Expense, 40.0),
            ]),
        );
        reduce(
            &state,
            LedgerAction::CategoriesReplaced(vec![
                category("c1", EntryType::Expense),
                category("c2", EntryType::Income),
            ]),
        )
    }

    #[test]
    fn test_empty_state() {
        let state = LedgerState::default();
        assert!(state.transactions().is_empty());
        assert!(state.categories().is_empty());
        assert_eq!(state.balance(), 0.0);
        assert!(!state.is_stale());
    }

    #[test]
    fn test_transactions_replaced_recomputes_balance() {
        let state = seeded();
        assert_eq!(state.transactions().len(), 2);
        assert_eq!(state.balance(), 60.0);
    }

    #[test]
    fn test_transactions_replaced_is_idempotent() {
        let list = vec![
            tx("t1", EntryType::Income, 10.0),
            tx("t2", EntryType::Expense, 3.0),
        ];
        let once = reduce(&LedgerState::default(), LedgerAction::TransactionsReplaced(list.clone()));
        let twice = reduce(&once, LedgerAction::TransactionsReplaced(list));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_transactions_replaced_drops_duplicate_ids() {
        let state = reduce(
            &LedgerState::default(),
            LedgerAction::TransactionsReplaced(vec![
                tx("t1", EntryType::Income, 10.0),
                tx("t2", EntryType::Income, 5.0),
                tx("t1", EntryType::Income, 20.0),
            ]),
        );
        assert_eq!(state.transactions().len(), 2);
        assert_eq!(state.transactions()[0].id, "t1");
        assert_eq!(state.transactions()[0].amount, 20.0);
        assert_eq!(state.balance(), 25.0);
    }

    #[test]
    fn test_transaction_added_appends() {
        let state = reduce(&seeded(), LedgerAction::TransactionAdded(tx("t3", EntryType::Expense, 10.0)));
        assert_eq!(state.transactions().last().unwrap().id, "t3");
        assert_eq!(state.balance(), 50.0);
    }

    #[test]
    fn test_transaction_added_with_existing_id_is_noop() {
        let state = seeded();
        let next = reduce(&state, LedgerAction::TransactionAdded(tx("t1", EntryType::Expense, 999.0)));
        assert_eq!(next, state);
    }

    #[test]
    fn test_transaction_replaced_swaps_in_place() {
        let state = reduce(
            &seeded(),
            LedgerAction::TransactionReplaced {
                old_id: "t1".to_string(),
                transaction: tx("t100", EntryType::Income, 120.0),
            },
        );
        let ids: Vec<&str> = state.transactions().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t100", "t2"]);
        assert_eq!(state.balance(), 80.0);
    }

    #[test]
    fn test_transaction_replaced_never_duplicates_ids() {
        let state = reduce(
            &seeded(),
            LedgerAction::TransactionReplaced {
                old_id: "t1".to_string(),
                transaction: tx("t2", EntryType::Expense, 15.0),
            },
        );
        assert_eq!(state.transactions().len(), 1);
        assert_eq!(state.transactions()[0].amount, 15.0);
        assert_eq!(state.balance(), -15.0);
    }

    #[test]
    fn test_transaction_updated_merges_fields() {
        let state = reduce(
            &seeded(),
            LedgerAction::TransactionUpdated {
                id: "t2".to_string(),
                patch: TransactionPatch {
                    amount: Some(70.0),
                    description: Some(Some("Rent".to_string())),
                    ..Default::default()
                },
            },
        );
        let updated = state.transaction("t2").unwrap();
        assert_eq!(updated.amount, 70.0);
        assert_eq!(updated.description.as_deref(), Some("Rent"));
        assert_eq!(updated.entry_type, EntryType::Expense);
        assert_eq!(state.balance(), 30.0);
    }

    #[test]
    fn test_transaction_removed_recomputes_balance() {
        let state = reduce(&seeded(), LedgerAction::TransactionRemoved("t1".to_string()));
        assert_eq!(state.transactions().len(), 1);
        assert_eq!(state.balance(), -40.0);
    }

    #[test]
    fn test_actions_on_missing_id_leave_state_unchanged() {
        let state = seeded();
        let missing = "does-not-exist".to_string();

        let actions = vec![
            LedgerAction::TransactionUpdated {
                id: missing.clone(),
                patch: TransactionPatch {
                    amount: Some(1.0),
                    ..Default::default()
                },
            },
            LedgerAction::TransactionRemoved(missing.clone()),
            LedgerAction::TransactionReplaced {
                old_id: missing.clone(),
                transaction: tx("t9", EntryType::Income, 1.0),
            },
            LedgerAction::CategoryUpdated {
                id: missing.clone(),
                patch: CategoryPatch {
                    name: Some("x".to_string()),
                    ..Default::default()
                },
            },
            LedgerAction::CategoryRemoved(missing.clone()),
            LedgerAction::CategoryReplaced {
                old_id: missing,
                category: category("c9", EntryType::Income),
            },
        ];

        for action in actions {
            let name = action.name();
            assert_eq!(reduce(&state, action), state, "{} changed state", name);
        }
    }

    #[test]
    fn test_reduce_does_not_touch_input_state() {
        let state = seeded();
        let copy = state.clone();
        let _ = reduce(&state, LedgerAction::TransactionRemoved("t1".to_string()));
        assert_eq!(state, copy);
    }

    #[test]
    fn test_category_actions_leave_balance_alone() {
        let state = seeded();
        let next = reduce(&state, LedgerAction::CategoryAdded(category("c3", EntryType::Income)));
        assert_eq!(next.categories().len(), 3);
        assert_eq!(next.balance(), state.balance());

        let next = reduce(
            &next,
            LedgerAction::CategoryUpdated {
                id: "c3".to_string(),
                patch: CategoryPatch {
                    color: Some("#000000".to_string()),
                    ..Default::default()
                },
            },
        );
        assert_eq!(next.category("c3").unwrap().color, "#000000");

        let next = reduce(
            &next,
            LedgerAction::CategoryReplaced {
                old_id: "c3".to_string(),
                category: category("c300", EntryType::Income),
            },
        );
        assert!(next.category("c3").is_none());
        assert!(next.category("c300").is_some());

        let next = reduce(&next, LedgerAction::CategoryRemoved("c300".to_string()));
        assert_eq!(next.categories().len(), 2);
    }

    #[test]
    fn test_category_mismatch_is_tolerated() {
        let state = seeded();
        let mismatched = Transaction {
            category_id: Some("c1".to_string()),
            ..tx("t3", EntryType::Income, 5.0)
        };
        let next = reduce(&state, LedgerAction::TransactionAdded(mismatched));

        assert!(next.transaction("t3").is_some());
        let mismatches = category_mismatches(&next);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].id, "t3");
    }

    #[test]
    fn test_unknown_category_is_uncategorised_not_mismatch() {
        let orphan = Transaction {
            category_id: Some("gone".to_string()),
            ..tx("t3", EntryType::Income, 5.0)
        };
        let state = reduce(&seeded(), LedgerAction::TransactionAdded(orphan));
        assert!(state.category_of(state.transaction("t3").unwrap()).is_none());
        assert!(category_mismatches(&state).is_empty());
    }

    #[test]
    fn test_stale_marked() {
        let state = reduce(&seeded(), LedgerAction::StaleMarked(true));
        assert!(state.is_stale());
        let state = reduce(&state, LedgerAction::StaleMarked(false));
        assert!(!state.is_stale());
    }
}
