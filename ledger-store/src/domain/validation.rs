//! Pre-flight checks run before any optimistic mutation or remote call.
//!
//! Category-type mismatches are deliberately not checked here; the reducer
//! tolerates them and logs a warning.

use shared::{check_amount, CategoryDraft, CategoryPatch, TransactionDraft, TransactionPatch};

use crate::config::LedgerConfig;
use crate::error::ValidationError;

pub fn validate_transaction_draft(draft: &TransactionDraft, config: &LedgerConfig) -> Result<(), ValidationError> {
    validate_amount(draft.amount, config)?;
    validate_description(draft.description.as_deref(), config)
}

pub fn validate_transaction_patch(patch: &TransactionPatch, config: &LedgerConfig) -> Result<(), ValidationError> {
    if patch.is_empty() {
        return Err(ValidationError::EmptyPatch);
    }
    if let Some(amount) = patch.amount {
        validate_amount(amount, config)?;
    }
    if let Some(description) = &patch.description {
        validate_description(description.as_deref(), config)?;
    }
    Ok(())
}

pub fn validate_category_draft(draft: &CategoryDraft, config: &LedgerConfig) -> Result<(), ValidationError> {
    validate_name(&draft.name, config)
}

pub fn validate_category_patch(patch: &CategoryPatch, config: &LedgerConfig) -> Result<(), ValidationError> {
    if patch.is_empty() {
        return Err(ValidationError::EmptyPatch);
    }
    if let Some(name) = &patch.name {
        validate_name(name, config)?;
    }
    Ok(())
}

fn validate_amount(amount: f64, config: &LedgerConfig) -> Result<(), ValidationError> {
    let amount = check_amount(amount)?;
    if amount > config.max_amount {
        return Err(ValidationError::AmountTooLarge(config.max_amount));
    }
    Ok(())
}

fn validate_description(description: Option<&str>, config: &LedgerConfig) -> Result<(), ValidationError> {
    let length = description.map(|d| d.trim().chars().count()).unwrap_or(0);
    if length > config.max_description_length {
        return Err(ValidationError::DescriptionTooLong(length));
    }
    Ok(())
}

fn validate_name(name: &str, config: &LedgerConfig) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    let length = trimmed.chars().count();
    if length > config.max_name_length {
        return Err(ValidationError::NameTooLong(length));
    }
    Ok(())
}
