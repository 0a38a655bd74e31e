//! Closed category taxonomy.
//!
//! Every transaction carries exactly one [`Category`], and the category must
//! belong to the subset allowed for the transaction's [`TransactionType`].
//! Unknown names and type mismatches are rejected with
//! [`EngineError::InvalidCategory`] when the transaction is created.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine, TransactionType};

/// Version of the built-in taxonomy. Configuration pins the version it was
/// written against; start-up fails when the two disagree.
pub const TAXONOMY_VERSION: u32 = 1;

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    // income
    Salary,
    Freelance,
    Investment,
    Business,
    OtherIncome,
    // expense
    Food,
    Transport,
    Housing,
    Utilities,
    Healthcare,
    Entertainment,
    Shopping,
    Education,
    Savings,
    OtherExpense,
    // transfer
    Transfer,
}

const INCOME: &[Category] = &[
    Category::Salary,
    Category::Freelance,
    Category::Investment,
    Category::Business,
    Category::OtherIncome,
];

const EXPENSE: &[Category] = &[
    Category::Food,
    Category::Transport,
    Category::Housing,
    Category::Utilities,
    Category::Healthcare,
    Category::Entertainment,
    Category::Shopping,
    Category::Education,
    Category::Savings,
    Category::OtherExpense,
];

const TRANSFER: &[Category] = &[Category::Transfer];

impl Category {
    pub const ALL: [Category; 16] = [
        Category::Salary,
        Category::Freelance,
        Category::Investment,
        Category::Business,
        Category::OtherIncome,
        Category::Food,
        Category::Transport,
        Category::Housing,
        Category::Utilities,
        Category::Healthcare,
        Category::Entertainment,
        Category::Shopping,
        Category::Education,
        Category::Savings,
        Category::OtherExpense,
        Category::Transfer,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Salary => "salary",
            Self::Freelance => "freelance",
            Self::Investment => "investment",
            Self::Business => "business",
            Self::OtherIncome => "other_income",
            Self::Food => "food",
            Self::Transport => "transport",
            Self::Housing => "housing",
            Self::Utilities => "utilities",
            Self::Healthcare => "healthcare",
            Self::Entertainment => "entertainment",
            Self::Shopping => "shopping",
            Self::Education => "education",
            Self::Savings => "savings",
            Self::OtherExpense => "other_expense",
            Self::Transfer => "transfer",
        }
    }

    /// Categories valid for `kind`.
    #[must_use]
    pub const fn for_type(kind: TransactionType) -> &'static [Category] {
        match kind {
            TransactionType::Income => INCOME,
            TransactionType::Expense => EXPENSE,
            TransactionType::Transfer => TRANSFER,
        }
    }

    /// Fallback category when nothing more specific applies.
    #[must_use]
    pub const fn default_for(kind: TransactionType) -> Category {
        match kind {
            TransactionType::Income => Category::OtherIncome,
            TransactionType::Expense => Category::OtherExpense,
            TransactionType::Transfer => Category::Transfer,
        }
    }

    #[must_use]
    pub fn is_expense(self) -> bool {
        EXPENSE.contains(&self)
    }
}

/// `true` when `category` may be used on a transaction of type `kind`.
#[must_use]
pub fn validate(kind: TransactionType, category: Category) -> bool {
    Category::for_type(kind).contains(&category)
}

/// Like [`validate`], but returns a typed error naming both sides.
pub fn ensure_valid(kind: TransactionType, category: Category) -> ResultEngine<()> {
    if validate(kind, category) {
        Ok(())
    } else {
        Err(EngineError::InvalidCategory(format!(
            "{category} is not a valid {kind} category"
        )))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Category {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let name = value.trim().to_ascii_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == name)
            .ok_or_else(|| EngineError::InvalidCategory(format!("unknown category: {value}")))
    }
}

impl std::str::FromStr for Category {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::try_from(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_category_belongs_to_exactly_one_type() {
        for category in Category::ALL {
            let owners = [
                TransactionType::Income,
                TransactionType::Expense,
                TransactionType::Transfer,
            ]
            .into_iter()
            .filter(|kind| validate(*kind, category))
            .count();
            assert_eq!(owners, 1, "{category}");
        }
    }

    #[test]
    fn salary_is_income_only() {
        assert!(validate(TransactionType::Income, Category::Salary));
        assert!(!validate(TransactionType::Expense, Category::Salary));
        assert_eq!(
            ensure_valid(TransactionType::Expense, Category::Salary),
            Err(EngineError::InvalidCategory(
                "salary is not a valid expense category".to_string()
            ))
        );
    }

    #[test]
    fn parse_rejects_unknown_names() {
        assert_eq!(Category::try_from(" Food ").unwrap(), Category::Food);
        assert_eq!(
            "other_income".parse::<Category>().unwrap(),
            Category::OtherIncome
        );
        assert!(matches!(
            Category::try_from("groceries"),
            Err(EngineError::InvalidCategory(_))
        ));
    }

    #[test]
    fn defaults_are_valid_for_their_type() {
        for kind in [
            TransactionType::Income,
            TransactionType::Expense,
            TransactionType::Transfer,
        ] {
            assert!(validate(kind, Category::default_for(kind)));
        }
    }
}
