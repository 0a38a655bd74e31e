//! Rule-based categorization.
//!
//! Rules are tried tier by tier; the first match wins:
//!
//! 1. merchant rules: the normalized description *starts with* the merchant
//! 2. keyword rules: the normalized description *contains* the keyword as a
//!    whole word sequence
//! 3. amount heuristics on the magnitude
//! 4. the default category of the transaction type
//!
//! Inside a tier rules are ordered by priority (higher first), then by longer
//! pattern, then by pattern text, so the result never depends on insertion
//! order. Every [`Categorization`] names the rule that produced it.

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::{Category, EngineError, Money, ResultEngine, TransactionType, categories};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleTier {
    Merchant,
    Keyword,
    Amount,
    Default,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub id: String,
    pub tier: RuleTier,
    /// Normalized, see [`normalize`].
    pub pattern: String,
    pub category: Category,
    pub priority: i32,
}

impl CategoryRule {
    pub fn merchant(id: impl Into<String>, pattern: &str, category: Category) -> ResultEngine<Self> {
        Self::build(id.into(), RuleTier::Merchant, pattern, category)
    }

    pub fn keyword(id: impl Into<String>, pattern: &str, category: Category) -> ResultEngine<Self> {
        Self::build(id.into(), RuleTier::Keyword, pattern, category)
    }

    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    fn build(id: String, tier: RuleTier, pattern: &str, category: Category) -> ResultEngine<Self> {
        let pattern = normalize(pattern);
        if pattern.is_empty() {
            return Err(EngineError::Validation(format!(
                "rule {id}: pattern must contain letters or digits"
            )));
        }
        Ok(Self {
            id,
            tier,
            pattern,
            category,
            priority: 0,
        })
    }

    fn matches(&self, normalized: &str) -> bool {
        match self.tier {
            RuleTier::Merchant => {
                normalized == self.pattern
                    || normalized
                        .strip_prefix(self.pattern.as_str())
                        .is_some_and(|rest| rest.starts_with(' '))
            }
            RuleTier::Keyword => format!(" {normalized} ").contains(&format!(" {} ", self.pattern)),
            RuleTier::Amount | RuleTier::Default => false,
        }
    }
}

/// Magnitude range `[min, max)` for one transaction type.
#[derive(Clone, Debug, PartialEq, Eq)]
struct AmountRule {
    id: &'static str,
    kind: TransactionType,
    min: i64,
    max: Option<i64>,
    category: Category,
}

impl AmountRule {
    fn matches(&self, kind: TransactionType, magnitude: i64) -> bool {
        self.kind == kind && magnitude >= self.min && self.max.is_none_or(|max| magnitude < max)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Categorization {
    pub category: Category,
    pub transaction_type: TransactionType,
    pub tier: RuleTier,
    /// `None` for the per-type default.
    pub rule_id: Option<String>,
    pub pattern: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Categorizer {
    merchants: Vec<CategoryRule>,
    keywords: Vec<CategoryRule>,
    amounts: Vec<AmountRule>,
}

const MERCHANTS: &[(&str, Category)] = &[
    ("whole foods", Category::Food),
    ("trader joe", Category::Food),
    ("safeway", Category::Food),
    ("kroger", Category::Food),
    ("mcdonald", Category::Food),
    ("starbucks", Category::Food),
    ("uber eats", Category::Food),
    ("uber", Category::Transport),
    ("lyft", Category::Transport),
    ("shell", Category::Transport),
    ("chevron", Category::Transport),
    ("netflix", Category::Entertainment),
    ("spotify", Category::Entertainment),
    ("amazon", Category::Shopping),
    ("target", Category::Shopping),
    ("walmart", Category::Shopping),
    ("comcast", Category::Utilities),
    ("cvs", Category::Healthcare),
    ("walgreens", Category::Healthcare),
    ("coursera", Category::Education),
    ("udemy", Category::Education),
    ("upwork", Category::Freelance),
    ("fiverr", Category::Freelance),
];

const KEYWORDS: &[(&str, Category)] = &[
    ("grocery", Category::Food),
    ("restaurant", Category::Food),
    ("fuel", Category::Transport),
    ("parking", Category::Transport),
    ("rent", Category::Housing),
    ("mortgage", Category::Housing),
    ("electric", Category::Utilities),
    ("water", Category::Utilities),
    ("pharmacy", Category::Healthcare),
    ("hospital", Category::Healthcare),
    ("tuition", Category::Education),
    ("payroll", Category::Salary),
    ("salary", Category::Salary),
    ("direct dep", Category::Salary),
    ("invoice", Category::Freelance),
    ("dividend", Category::Investment),
    ("interest", Category::Investment),
    ("transfer to savings", Category::Savings),
];

impl Default for Categorizer {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Categorizer {
    /// The built-in rule set.
    #[must_use]
    pub fn builtin() -> Self {
        let rule = |tier: RuleTier, (pattern, category): &(&str, Category)| CategoryRule {
            id: format!(
                "{}:{}",
                match tier {
                    RuleTier::Merchant => "merchant",
                    _ => "keyword",
                },
                pattern.replace(' ', "-")
            ),
            tier,
            pattern: normalize(pattern),
            category: *category,
            priority: 0,
        };
        let mut categorizer = Self {
            merchants: MERCHANTS.iter().map(|m| rule(RuleTier::Merchant, m)).collect(),
            keywords: KEYWORDS.iter().map(|k| rule(RuleTier::Keyword, k)).collect(),
            amounts: vec![
                AmountRule {
                    id: "amount:large-income",
                    kind: TransactionType::Income,
                    min: 100_000,
                    max: None,
                    category: Category::Salary,
                },
                AmountRule {
                    id: "amount:large-expense",
                    kind: TransactionType::Expense,
                    min: 100_000,
                    max: None,
                    category: Category::Housing,
                },
                AmountRule {
                    id: "amount:small-expense",
                    kind: TransactionType::Expense,
                    min: 1,
                    max: Some(1_500),
                    category: Category::Food,
                },
            ],
        };
        categorizer.sort();
        categorizer
    }

    /// Adds rules to the built-in set (merchant or keyword tier).
    pub fn with_rules<I>(mut self, rules: I) -> ResultEngine<Self>
    where
        I: IntoIterator<Item = CategoryRule>,
    {
        for rule in rules {
            match rule.tier {
                RuleTier::Merchant => self.merchants.push(rule),
                RuleTier::Keyword => self.keywords.push(rule),
                RuleTier::Amount | RuleTier::Default => {
                    return Err(EngineError::Validation(format!(
                        "rule {}: only merchant and keyword rules can be added",
                        rule.id
                    )));
                }
            }
        }
        self.sort();
        Ok(self)
    }

    fn sort(&mut self) {
        let order = |a: &CategoryRule, b: &CategoryRule| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.pattern.len().cmp(&a.pattern.len()))
                .then_with(|| a.pattern.cmp(&b.pattern))
                .then_with(|| a.id.cmp(&b.id))
        };
        self.merchants.sort_by(order);
        self.keywords.sort_by(order);
    }

    /// Categorizes a signed amount: negative is an expense, anything else income.
    #[must_use]
    pub fn categorize(&self, description: &str, amount: Money) -> Categorization {
        let kind = if amount.is_negative() {
            TransactionType::Expense
        } else {
            TransactionType::Income
        };
        self.categorize_as(kind, description, amount)
    }

    /// Categorizes for a known transaction type. Rules whose category is not
    /// valid for `kind` are skipped.
    #[must_use]
    pub fn categorize_as(
        &self,
        kind: TransactionType,
        description: &str,
        amount: Money,
    ) -> Categorization {
        let normalized = normalize(description);
        let fitting = |rule: &&CategoryRule| categories::validate(kind, rule.category);

        let by_text = self
            .merchants
            .iter()
            .chain(self.keywords.iter())
            .filter(fitting)
            .find(|rule| rule.matches(&normalized));

        let result = if let Some(rule) = by_text {
            Categorization {
                category: rule.category,
                transaction_type: kind,
                tier: rule.tier,
                rule_id: Some(rule.id.clone()),
                pattern: Some(rule.pattern.clone()),
            }
        } else if let Some(rule) = self
            .amounts
            .iter()
            .find(|rule| rule.matches(kind, amount.abs().minor()))
        {
            Categorization {
                category: rule.category,
                transaction_type: kind,
                tier: RuleTier::Amount,
                rule_id: Some(rule.id.to_string()),
                pattern: None,
            }
        } else {
            Categorization {
                category: Category::default_for(kind),
                transaction_type: kind,
                tier: RuleTier::Default,
                rule_id: None,
                pattern: None,
            }
        };

        tracing::debug!(
            description = %normalized,
            tier = ?result.tier,
            rule = result.rule_id.as_deref().unwrap_or("default"),
            category = %result.category,
            "categorized"
        );
        result
    }
}

/// NFKC, lower-case, every run of non-alphanumerics collapsed to one space.
#[must_use]
pub fn normalize(text: &str) -> String {
    let folded: String = text
        .nfkc()
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}
