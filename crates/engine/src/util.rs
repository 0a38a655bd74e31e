//! Internal helpers for model validation and conversion.
//!
//! These utilities are **not** part of the public API. They centralize
//! validation and mapping logic so the engine enforces consistent invariants.

use std::collections::BTreeSet;

use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::{Currency, EngineError, Money, ResultEngine};

/// Parse a UUID from storage and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value).map_err(|_| EngineError::Storage(format!("invalid {label} id: {value}")))
}

/// Parse a currency code stored in the DB into a strongly typed `Currency`.
pub(crate) fn model_currency(value: &str) -> ResultEngine<Currency> {
    Currency::try_from(value)
        .map_err(|_| EngineError::Storage(format!("invalid stored currency: {value}")))
}

/// Rebuild a `Money` from a stored minor-unit column.
pub(crate) fn model_money(value: i64, label: &str) -> ResultEngine<Money> {
    Money::new(value).map_err(|_| EngineError::Storage(format!("{label} out of range: {value}")))
}

pub(crate) fn to_json_text<T: Serialize>(value: &T) -> ResultEngine<String> {
    serde_json::to_string(value).map_err(|err| EngineError::Storage(err.to_string()))
}

pub(crate) fn from_json_text<T: DeserializeOwned>(value: &str, label: &str) -> ResultEngine<T> {
    serde_json::from_str(value)
        .map_err(|err| EngineError::Storage(format!("invalid stored {label}: {err}")))
}

pub(crate) fn normalize_required_name(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::Validation(format!("{label} must not be empty")));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Trim, lower-case and de-duplicate tags. Empty tags are dropped.
pub(crate) fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Validate and normalize an e-mail address of the form `local@domain.tld`.
pub(crate) fn normalize_email(value: &str) -> ResultEngine<String> {
    let email = value.trim().to_lowercase();
    let invalid = || EngineError::Validation(format!("invalid email: {value:?}"));

    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(invalid());
    }
    Ok(email)
}

/// Amounts on transactions, budgets and goals are magnitudes: strictly positive.
pub(crate) fn ensure_positive(amount: Money, label: &str) -> ResultEngine<()> {
    if !amount.is_positive() {
        return Err(EngineError::Validation(format!("{label} must be > 0")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_normalized() {
        assert_eq!(
            normalize_email("  Alice@Example.COM ").unwrap(),
            "alice@example.com"
        );
        for bad in ["", "alice", "alice@", "@example.com", "a@b", "a@b..c", "a b@c.d", "a@b@c.d"] {
            assert!(normalize_email(bad).unwrap_err().is_validation(), "{bad}");
        }
    }

    #[test]
    fn tags_are_trimmed_lowercased_and_unique() {
        assert_eq!(
            normalize_tags([" Trip ", "trip", "", "Work"]),
            vec!["trip".to_string(), "work".to_string()]
        );
    }
}
