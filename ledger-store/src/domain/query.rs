//! Read-only views over a [`LedgerState`].
//!
//! Every function here derives a fresh sequence from the state it is given
//! and never mutates it. Dates are calendar dates, so a transaction belongs
//! to the month printed on it regardless of the viewer's time zone.
//!
//! Ordering is date ascending; transactions sharing a date keep the order in
//! which they were inserted into the ledger.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use shared::{EntryType, Transaction};
use std::collections::HashMap;

use super::reducer::LedgerState;

/// A transaction together with the balance right after it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceRow {
    pub transaction: Transaction,
    pub balance: f64,
}

/// Income and expense totals for one calendar month
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthSummary {
    pub month: u32,
    pub year: i32,
    pub income: f64,
    pub expense: f64,
    pub net: f64,
    pub transaction_count: usize,
}

/// Signed total for one category; `category_id` is `None` for transactions
/// without a resolvable category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category_id: Option<String>,
    pub name: String,
    pub total: f64,
    pub transaction_count: usize,
}

pub const UNCATEGORISED: &str = "Uncategorised";

/// Transactions dated within the given calendar month
pub fn by_month(state: &LedgerState, month: u32, year: i32) -> Vec<Transaction> {
    if !(1..=12).contains(&month) {
        return Vec::new();
    }
    sorted(
        state
            .transactions()
            .iter()
            .filter(|t| t.date.month() == month && t.date.year() == year),
    )
}

/// Transactions dated from `start` through `end`, both inclusive.
/// An inverted range is empty rather than an error.
pub fn by_date_range(state: &LedgerState, start: NaiveDate, end: NaiveDate) -> Vec<Transaction> {
    if start > end {
        return Vec::new();
    }
    sorted(
        state
            .transactions()
            .iter()
            .filter(|t| t.date >= start && t.date <= end),
    )
}

/// All transactions with the running balance after each one
pub fn running_balances(state: &LedgerState) -> Vec<BalanceRow> {
    let mut balance = 0.0;
    sorted(state.transactions().iter())
        .into_iter()
        .map(|transaction| {
            balance += transaction.signed_amount();
            BalanceRow { transaction, balance }
        })
        .collect()
}

pub fn month_summary(state: &LedgerState, month: u32, year: i32) -> MonthSummary {
    let mut summary = MonthSummary {
        month,
        year,
        ..Default::default()
    };

    for transaction in by_month(state, month, year) {
        match transaction.entry_type {
            EntryType::Income => summary.income += transaction.amount,
            EntryType::Expense => summary.expense += transaction.amount,
        }
        summary.transaction_count += 1;
    }
    summary.net = summary.income - summary.expense;
    summary
}

/// Signed totals per category over an inclusive date range, in order of
/// first appearance. References to missing categories count as uncategorised.
pub fn category_totals(state: &LedgerState, start: NaiveDate, end: NaiveDate) -> Vec<CategoryTotal> {
    let mut totals: Vec<CategoryTotal> = Vec::new();
    let mut positions: HashMap<Option<String>, usize> = HashMap::new();

    for transaction in by_date_range(state, start, end) {
        let category = state.category_of(&transaction);
        let key = category.map(|c| c.id.clone());
        let position = *positions.entry(key.clone()).or_insert_with(|| {
            totals.push(CategoryTotal {
                category_id: key,
                name: category
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| UNCATEGORISED.to_string()),
                total: 0.0,
                transaction_count: 0,
            });
            totals.len() - 1
        });

        let entry = &mut totals[position];
        entry.total += transaction.signed_amount();
        entry.transaction_count += 1;
    }

    totals
}

/// Stable sort keeps insertion order among equal dates
fn sorted<'a>(transactions: impl Iterator<Item = &'a Transaction>) -> Vec<Transaction> {
    let mut result: Vec<Transaction> = transactions.cloned().collect();
    result.sort_by_key(|t| t.date);
    result
}
