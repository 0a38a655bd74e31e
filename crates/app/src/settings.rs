//! Handles settings for the application. Configuration is written in
//! `settings.toml` and can be overridden with `TALLY__<SECTION>__<KEY>`
//! environment variables.
//!
//! ```toml
//! [app]
//! level = "debug"
//!
//! [database]
//! sqlite = "tally.db"
//!
//! [ledger]
//! currency = "EUR"
//! lock_timeout_ms = 2000
//!
//! [categories]
//! taxonomy_version = 1
//! rules = [{ pattern = "corner bakery", category = "food", priority = 10 }]
//! ```
use std::time::Duration;

use config::{Config, Environment, File};
use engine::{AnomalySettings, Category, CategoryRule, Currency, EngineSettings, TAXONOMY_VERSION};
use serde::Deserialize;

use crate::error::{AppError, Result};

const DEFAULT_CONFIG_PATH: &str = "settings";

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct App {
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    /// Throwaway ledger, gone when the process exits.
    Memory,
    Sqlite(String),
}

impl Default for Database {
    fn default() -> Self {
        Database::Sqlite("tally.db".to_string())
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Ledger {
    pub currency: String,
    pub lock_timeout_ms: u64,
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            currency: Currency::default().code().to_string(),
            lock_timeout_ms: 2_000,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Rule {
    pub pattern: String,
    pub category: String,
    #[serde(default)]
    pub priority: i32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Categories {
    pub taxonomy_version: u32,
    pub rules: Vec<Rule>,
}

impl Default for Categories {
    fn default() -> Self {
        Self {
            taxonomy_version: TAXONOMY_VERSION,
            rules: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Anomaly {
    pub window_periods: u32,
    pub period_days: u32,
    pub z_threshold: f64,
    pub min_relative_deviation: f64,
}

impl Default for Anomaly {
    fn default() -> Self {
        let defaults = AnomalySettings::default();
        Self {
            window_periods: defaults.window_periods,
            period_days: defaults.period_days,
            z_threshold: defaults.z_threshold,
            min_relative_deviation: defaults.min_relative_deviation,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: App,
    pub database: Database,
    pub ledger: Ledger,
    pub categories: Categories,
    pub anomaly: Anomaly,
}

impl Settings {
    pub fn new(path: Option<&str>) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name(path.unwrap_or(DEFAULT_CONFIG_PATH)).required(path.is_some()))
            .add_source(Environment::with_prefix("TALLY").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Engine parameters. Fails when the configured taxonomy is not the one
    /// compiled into the engine.
    pub fn engine(&self) -> Result<EngineSettings> {
        if self.categories.taxonomy_version != TAXONOMY_VERSION {
            return Err(AppError::Invalid(format!(
                "configured taxonomy version {} does not match engine taxonomy version {TAXONOMY_VERSION}",
                self.categories.taxonomy_version
            )));
        }

        let rules = self
            .categories
            .rules
            .iter()
            .enumerate()
            .map(|(idx, rule)| -> Result<CategoryRule> {
                let category = Category::try_from(rule.category.as_str())?;
                Ok(CategoryRule::keyword(format!("config:{idx}"), &rule.pattern, category)?
                    .priority(rule.priority))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(EngineSettings {
            lock_timeout: Duration::from_millis(self.ledger.lock_timeout_ms),
            default_currency: Currency::try_from(self.ledger.currency.as_str())?,
            anomaly: AnomalySettings {
                window_periods: self.anomaly.window_periods,
                period_days: self.anomaly.period_days,
                z_threshold: self.anomaly.z_threshold,
                min_relative_deviation: self.anomaly.min_relative_deviation,
            },
            rules,
        })
    }
}
