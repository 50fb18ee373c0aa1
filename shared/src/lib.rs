use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Prefix carried by every client-assigned identifier.
pub const TEMPORARY_ID_PREFIX: &str = "pending";

/// Direction of money movement; the sign of an amount is implied by it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// Money added
    Income,
    /// Money spent
    Expense,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Income => "income",
            EntryType::Expense => "expense",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single ledger entry.
///
/// `id` is assigned by the remote store. Between optimistic creation and
/// reconciliation it holds a temporary id (see [`generate_temporary_id`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    /// Non-negative magnitude
    pub amount: f64,
    /// Category reference; unresolved ids are treated as uncategorised
    pub category_id: Option<String>,
    /// Calendar date (ISO-8601, no time zone)
    pub date: NaiveDate,
    pub description: Option<String>,
}

/// Fields needed to create a transaction; the id comes from the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionDraft {
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub amount: f64,
    pub category_id: Option<String>,
    pub date: NaiveDate,
    pub description: Option<String>,
}

/// Partial update of a transaction. `None` leaves a field untouched; the
/// nested options on `category_id` and `description` allow clearing them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionPatch {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub entry_type: Option<EntryType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
}

impl Transaction {
    pub fn from_draft(id: String, draft: &TransactionDraft) -> Self {
        Self {
            id,
            entry_type: draft.entry_type,
            amount: draft.amount,
            category_id: draft.category_id.clone(),
            date: draft.date,
            description: draft.description.clone(),
        }
    }

    /// Amount with the sign implied by the entry type
    pub fn signed_amount(&self) -> f64 {
        match self.entry_type {
            EntryType::Income => self.amount,
            EntryType::Expense => -self.amount,
        }
    }

    /// Merge the fields present in `patch` into this transaction
    pub fn apply_patch(&mut self, patch: &TransactionPatch) {
        if let Some(entry_type) = patch.entry_type {
            self.entry_type = entry_type;
        }
        if let Some(amount) = patch.amount {
            self.amount = amount;
        }
        if let Some(category_id) = &patch.category_id {
            self.category_id = category_id.clone();
        }
        if let Some(date) = patch.date {
            self.date = date;
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
    }

    /// A patch that, applied to any transaction, restores every field of this one
    pub fn to_patch(&self) -> TransactionPatch {
        TransactionPatch {
            entry_type: Some(self.entry_type),
            amount: Some(self.amount),
            category_id: Some(self.category_id.clone()),
            date: Some(self.date),
            description: Some(self.description.clone()),
        }
    }
}

impl TransactionPatch {
    pub fn is_empty(&self) -> bool {
        self.entry_type.is_none()
            && self.amount.is_none()
            && self.category_id.is_none()
            && self.date.is_none()
            && self.description.is_none()
    }
}

/// Grouping for transactions, typed like the transactions it may hold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    /// Presentation hint, opaque to the ledger
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDraft {
    pub name: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub color: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub entry_type: Option<EntryType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Category {
    pub fn from_draft(id: String, draft: &CategoryDraft) -> Self {
        Self {
            id,
            name: draft.name.clone(),
            entry_type: draft.entry_type,
            color: draft.color.clone(),
        }
    }

    pub fn apply_patch(&mut self, patch: &CategoryPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(entry_type) = patch.entry_type {
            self.entry_type = entry_type;
        }
        if let Some(color) = &patch.color {
            self.color = color.clone();
        }
    }

    pub fn to_patch(&self) -> CategoryPatch {
        CategoryPatch {
            name: Some(self.name.clone()),
            entry_type: Some(self.entry_type),
            color: Some(self.color.clone()),
        }
    }
}

impl CategoryPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.entry_type.is_none() && self.color.is_none()
    }
}

/// Sum of income amounts minus sum of expense amounts
pub fn compute_balance(transactions: &[Transaction]) -> f64 {
    transactions.iter().map(Transaction::signed_amount).sum()
}

/// Generate a client-side id in the format "pending::<kind>::<uuid>"
pub fn generate_temporary_id(kind: &str) -> String {
    format!("{}::{}::{}", TEMPORARY_ID_PREFIX, kind, Uuid::new_v4())
}

/// True for ids produced by [`generate_temporary_id`]
pub fn is_temporary_id(id: &str) -> bool {
    let parts: Vec<&str> = id.split("::").collect();
    parts.len() == 3 && parts[0] == TEMPORARY_ID_PREFIX && Uuid::parse_str(parts[2]).is_ok()
}

/// Reasons an amount is refused at the boundary
#[derive(Debug, Clone, PartialEq)]
pub enum AmountError {
    Unparseable(String),
    NotFinite,
    Negative,
}

impl fmt::Display for AmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmountError::Unparseable(input) => write!(f, "'{}' is not a number", input),
            AmountError::NotFinite => write!(f, "Amount must be a finite number"),
            AmountError::Negative => write!(f, "Amount must not be negative"),
        }
    }
}

impl std::error::Error for AmountError {}

/// Check that an amount is a finite, non-negative magnitude
pub fn check_amount(amount: f64) -> Result<f64, AmountError> {
    if !amount.is_finite() {
        return Err(AmountError::NotFinite);
    }
    if amount < 0.0 {
        return Err(AmountError::Negative);
    }
    Ok(amount)
}

/// Parse user input such as "$1,250.50" into a non-negative amount
pub fn parse_amount(input: &str) -> Result<f64, AmountError> {
    let cleaned = input.trim().replace(['$', ',', ' '], "");
    if cleaned.is_empty() {
        return Err(AmountError::Unparseable(input.to_string()));
    }
    let amount = cleaned
        .parse::<f64>()
        .map_err(|_| AmountError::Unparseable(input.to_string()))?;
    check_amount(amount)
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn test_compute_balance_matches_income_minus_expense() {
        let sequences = vec![
            vec![],
            vec![tx("a", EntryType::Income, 100.0)],
            vec![tx("a", EntryType::Expense, 50.0)],
            vec![
                tx("a", EntryType::Income, 100.0),
                tx("b", EntryType::Expense, 30.0),
                tx("c", EntryType::Income, 12.5),
                tx("d", EntryType::Expense, 0.0),
            ],
        ];

        for transactions in sequences {
            let income: f64 = transactions
                .iter()
                .filter(|t| t.entry_type == EntryType::Income)
                .map(|t| t.amount)
                .sum();
            let expense: f64 = transactions
                .iter()
                .filter(|t| t.entry_type == EntryType::Expense)
                .map(|t| t.amount)
                .sum();
            assert_eq!(compute_balance(&transactions), income - expense);
        }
    }

    #[test]
    fn test_temporary_ids() {
        let id = generate_temporary_id("transaction");
        assert!(id.starts_with("pending::transaction::"));
        assert!(is_temporary_id(&id));
        assert_ne!(id, generate_temporary_id("transaction"));

        assert!(!is_temporary_id("t100"));
        assert!(!is_temporary_id("pending::transaction"));
        assert!(!is_temporary_id("pending::transaction::not-a-uuid"));
    }

    #[test]
    fn test_apply_patch_only_touches_present_fields() {
        let mut transaction = Transaction {
            description: Some("Groceries".to_string()),
            category_id: Some("c1".to_string()),
            ..tx("t1", EntryType::Expense, 20.0)
        };

        transaction.apply_patch(&TransactionPatch {
            amount: Some(25.0),
            description: Some(None),
            ..Default::default()
        });

        assert_eq!(transaction.amount, 25.0);
        assert_eq!(transaction.description, None);
        assert_eq!(transaction.category_id.as_deref(), Some("c1"));
        assert_eq!(transaction.entry_type, EntryType::Expense);
    }

    #[test]
    fn test_to_patch_restores_original() {
        let original = Transaction {
            description: Some("Rent".to_string()),
            ..tx("t1", EntryType::Expense, 900.0)
        };
        let mut changed = original.clone();
        changed.apply_patch(&TransactionPatch {
            entry_type: Some(EntryType::Income),
            amount: Some(1.0),
            category_id: Some(Some("c9".to_string())),
            date: Some(date("2030-01-01")),
            description: Some(None),
        });
        assert_ne!(changed, original);

        changed.apply_patch(&original.to_patch());
        assert_eq!(changed, original);
    }

    #[test]
    fn test_patch_is_empty() {
        assert!(TransactionPatch::default().is_empty());
        assert!(!TransactionPatch { amount: Some(1.0), ..Default::default() }.is_empty());
        assert!(CategoryPatch::default().is_empty());
        assert!(!CategoryPatch { color: Some("#fff".to_string()), ..Default::default() }.is_empty());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("50").unwrap(), 50.0);
        assert_eq!(parse_amount(" $1,250.50 ").unwrap(), 1250.5);
        assert_eq!(parse_amount("0").unwrap(), 0.0);
        assert_eq!(parse_amount("-5"), Err(AmountError::Negative));
        assert!(matches!(parse_amount("abc"), Err(AmountError::Unparseable(_))));
        assert!(matches!(parse_amount(""), Err(AmountError::Unparseable(_))));
        assert_eq!(parse_amount("inf"), Err(AmountError::NotFinite));
    }

    #[test]
    fn test_transaction_wire_shape() {
        let transaction = Transaction {
            category_id: Some("c1".to_string()),
            ..tx("t100", EntryType::Expense, 50.0)
        };
        let json = serde_json::to_value(&transaction).unwrap();
        assert_eq!(json["type"], "expense");
        assert_eq!(json["date"], "2025-08-01");
        assert_eq!(json["category_id"], "c1");

        let parsed: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, transaction);
    }
}
