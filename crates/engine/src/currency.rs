use serde::{Deserialize, Serialize};

use crate::EngineError;

/// ISO currency code carried by accounts and their money values.
///
/// ## Minor units
///
/// The engine stores monetary values as an `i64` number of **minor units** (see `Money`).
/// `minor_units()` returns how many decimal digits are used when converting between:
/// - major units (human input/output, e.g. `10.50 USD`)
/// - minor units (stored integers, e.g. `1050`)
///
/// Example: USD has 2 minor units, so `10.50 USD` ⇄ `1050`; JPY has none, so
/// `500 JPY` ⇄ `500`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Usd,
    Eur,
    Gbp,
    Jpy,
    Cad,
    Aud,
}

impl Currency {
    pub const ALL: [Currency; 6] = [
        Currency::Usd,
        Currency::Eur,
        Currency::Gbp,
        Currency::Jpy,
        Currency::Cad,
        Currency::Aud,
    ];

    /// Canonical currency code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Jpy => "JPY",
            Currency::Cad => "CAD",
            Currency::Aud => "AUD",
        }
    }

    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Currency::Usd => "$",
            Currency::Eur => "€",
            Currency::Gbp => "£",
            Currency::Jpy => "¥",
            Currency::Cad => "C$",
            Currency::Aud => "A$",
        }
    }

    /// Number of fraction digits used when formatting/parsing amounts.
    #[must_use]
    pub const fn minor_units(self) -> u8 {
        match self {
            Currency::Jpy => 0,
            _ => 2,
        }
    }

    /// `10^minor_units`, the number of minor units in one major unit.
    #[must_use]
    pub const fn scale(self) -> i64 {
        10_i64.pow(self.minor_units() as u32)
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

impl TryFrom<&str> for Currency {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let code = value.trim().to_ascii_uppercase();
        Currency::ALL
            .into_iter()
            .find(|c| c.code() == code)
            .ok_or_else(|| EngineError::Validation(format!("unsupported currency: {code}")))
    }
}

impl core::str::FromStr for Currency {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::try_from(s)
    }
}
