use std::{fmt, ops::Neg, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Currency, EngineError, ResultEngine};

/// Signed money amount represented as **integer minor units**.
///
/// Use this type for **all** monetary values in the engine (balances, budget
/// limits, transaction amounts, goal targets) to avoid floating-point drift.
///
/// The value is signed:
/// - positive = income / increase
/// - negative = expense / decrease
///
/// Magnitudes are bounded by [`Money::MAX_MINOR`]; every arithmetic operation
/// is checked and fails with [`EngineError::Overflow`] instead of wrapping.
///
/// # Examples
///
/// ```rust
/// use engine::{Currency, Money};
///
/// let amount = Money::new(12_34).unwrap();
/// assert_eq!(amount.minor(), 1234);
/// assert_eq!(amount.format(Currency::Usd), "USD 12.34");
/// ```
///
/// Parsing from user input honours the currency precision:
///
/// ```rust
/// use engine::{Currency, Money};
///
/// assert_eq!(Money::parse("10,5", Currency::Eur).unwrap().minor(), 1050);
/// assert_eq!(Money::parse("500", Currency::Jpy).unwrap().minor(), 500);
/// assert!(Money::parse("12.345", Currency::Usd).is_err());
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "i64", into = "i64")]
#[repr(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Largest representable magnitude, in minor units (10^15).
    pub const MAX_MINOR: i64 = 1_000_000_000_000_000;

    /// Creates a new amount from integer minor units.
    pub fn new(minor: i64) -> ResultEngine<Self> {
        if minor.unsigned_abs() > Self::MAX_MINOR as u64 {
            return Err(EngineError::Overflow(format!(
                "{minor} exceeds the representable magnitude"
            )));
        }
        Ok(Self(minor))
    }

    /// Returns the raw value in minor units.
    #[must_use]
    pub const fn minor(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    #[must_use]
    pub const fn abs(self) -> Money {
        Money(self.0.abs())
    }

    pub fn checked_add(self, rhs: Money) -> ResultEngine<Money> {
        self.0
            .checked_add(rhs.0)
            .ok_or_else(|| EngineError::Overflow(format!("{self} + {rhs}")))
            .and_then(Money::new)
    }

    pub fn checked_sub(self, rhs: Money) -> ResultEngine<Money> {
        self.0
            .checked_sub(rhs.0)
            .ok_or_else(|| EngineError::Overflow(format!("{self} - {rhs}")))
            .and_then(Money::new)
    }

    /// Multiplies by `numerator / denominator`, rounding half away from zero.
    ///
    /// Used for percentage thresholds, e.g. `limit.mul_ratio(75, 100)`.
    pub fn mul_ratio(self, numerator: i64, denominator: i64) -> ResultEngine<Money> {
        if denominator == 0 {
            return Err(EngineError::Validation(
                "ratio denominator must not be 0".to_string(),
            ));
        }
        let product = i128::from(self.0) * i128::from(numerator);
        let den = i128::from(denominator);
        let quotient = product / den;
        let remainder = product % den;
        // Round half away from zero.
        let rounded = if remainder.abs() * 2 >= den.abs() {
            if (product < 0) != (den < 0) {
                quotient - 1
            } else {
                quotient + 1
            }
        } else {
            quotient
        };
        let value = i64::try_from(rounded)
            .map_err(|_| EngineError::Overflow(format!("{self} * {numerator}/{denominator}")))?;
        Money::new(value)
    }

    /// Share of `self` in `whole`, in basis points (1/100 of a percent),
    /// truncated toward zero. `None` when `whole` is zero.
    #[must_use]
    pub fn ratio_bps(self, whole: Money) -> Option<i64> {
        if whole.is_zero() {
            return None;
        }
        let bps = i128::from(self.0) * 10_000 / i128::from(whole.0);
        i64::try_from(bps).ok()
    }

    /// Sums an iterator of amounts, failing on the first overflow.
    pub fn sum<I>(amounts: I) -> ResultEngine<Money>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |acc, amount| acc.checked_add(amount))
    }

    /// Parses a decimal string in major units of `currency`.
    ///
    /// Accepts `.` or `,` as decimal separator and an optional leading `+`/`-`.
    /// Rejects more fraction digits than the currency precision allows.
    pub fn parse(s: &str, currency: Currency) -> ResultEngine<Money> {
        let invalid = || EngineError::Validation(format!("invalid amount: {s:?}"));

        let trimmed = s.trim();
        let (negative, rest) = match trimmed.strip_prefix('-') {
            Some(stripped) => (true, stripped),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let rest = rest.trim().replace(',', ".");
        if rest.is_empty() {
            return Err(invalid());
        }

        let (whole, frac) = match rest.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (rest.as_str(), ""),
        };
        if whole.is_empty()
            || !whole.chars().all(|c| c.is_ascii_digit())
            || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }
        let precision = usize::from(currency.minor_units());
        if frac.len() > precision {
            return Err(EngineError::Validation(format!(
                "too many decimals for {currency}: {s:?}"
            )));
        }

        let overflow = || EngineError::Overflow(format!("amount too large: {s:?}"));
        let whole: i64 = whole.parse().map_err(|_| overflow())?;
        let frac_minor: i64 = if frac.is_empty() {
            0
        } else {
            let padded = format!("{frac:0<precision$}");
            padded.parse().map_err(|_| invalid())?
        };
        let total = whole
            .checked_mul(currency.scale())
            .and_then(|v| v.checked_add(frac_minor))
            .ok_or_else(overflow)?;

        Money::new(if negative { -total } else { total })
    }

    /// Formats the amount with the currency code and precision,
    /// e.g. `USD -54.23` or `JPY 500`.
    #[must_use]
    pub fn format(self, currency: Currency) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let precision = usize::from(currency.minor_units());
        if precision == 0 {
            return format!("{} {sign}{abs}", currency.code());
        }
        let scale = currency.scale().unsigned_abs();
        let major = abs / scale;
        let minor = abs % scale;
        format!("{} {sign}{major}.{minor:0precision$}", currency.code())
    }
}

/// Raw signed minor units. The precision depends on the currency, so
/// user-facing text goes through [`Money::format`].
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Self::Output {
        // The bound is symmetric, so negation never leaves the valid range.
        Money(-self.0)
    }
}

impl TryFrom<i64> for Money {
    type Error = EngineError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Money::new(value)
    }
}

impl From<Money> for i64 {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl FromStr for Money {
    type Err = EngineError;

    /// Parses using the default currency precision (2 decimals).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::parse(s, Currency::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(minor: i64) -> Money {
        Money::new(minor).unwrap()
    }

    #[test]
    fn format_uses_currency_precision() {
        assert_eq!(m(0).format(Currency::Usd), "USD 0.00");
        assert_eq!(m(1).format(Currency::Eur), "EUR 0.01");
        assert_eq!(m(-5423).format(Currency::Usd), "USD -54.23");
        assert_eq!(m(500).format(Currency::Jpy), "JPY 500");
        assert_eq!(m(-1050).to_string(), "-1050");
    }

    #[test]
    fn parse_accepts_dot_or_comma() {
        assert_eq!("10".parse::<Money>().unwrap().minor(), 1000);
        assert_eq!("10.5".parse::<Money>().unwrap().minor(), 1050);
        assert_eq!("10,50".parse::<Money>().unwrap().minor(), 1050);
        assert_eq!("-0.01".parse::<Money>().unwrap().minor(), -1);
        assert_eq!("+1.00".parse::<Money>().unwrap().minor(), 100);
        assert_eq!("  2.30 ".parse::<Money>().unwrap().minor(), 230);
    }

    #[test]
    fn parse_rejects_garbage_and_extra_decimals() {
        assert!("12.345".parse::<Money>().is_err());
        assert!(Money::parse("1.5", Currency::Jpy).is_err());
        assert!("".parse::<Money>().is_err());
        assert!("abc".parse::<Money>().is_err());
        assert!("1.2.3".parse::<Money>().is_err());
        assert!("NaN".parse::<Money>().is_err());
    }

    #[test]
    fn arithmetic_is_bounded() {
        let max = m(Money::MAX_MINOR);
        assert!(matches!(
            max.checked_add(m(1)),
            Err(EngineError::Overflow(_))
        ));
        assert!(matches!(
            (-max).checked_sub(m(1)),
            Err(EngineError::Overflow(_))
        ));
        assert!(matches!(
            Money::new(Money::MAX_MINOR + 1),
            Err(EngineError::Overflow(_))
        ));
        assert!(matches!(
            "99999999999999999999".parse::<Money>(),
            Err(EngineError::Overflow(_))
        ));
        assert_eq!(m(10).checked_sub(m(25)).unwrap(), m(-15));
    }

    #[test]
    fn mul_ratio_rounds_half_away_from_zero() {
        assert_eq!(m(10_000).mul_ratio(75, 100).unwrap(), m(7_500));
        assert_eq!(m(5).mul_ratio(1, 2).unwrap(), m(3));
        assert_eq!(m(-5).mul_ratio(1, 2).unwrap(), m(-3));
        assert_eq!(m(4).mul_ratio(1, 3).unwrap(), m(1));
        assert!(m(1).mul_ratio(1, 0).unwrap_err().is_validation());
        assert!(matches!(
            m(Money::MAX_MINOR).mul_ratio(2, 1),
            Err(EngineError::Overflow(_))
        ));
    }

    #[test]
    fn ratio_and_sum() {
        assert_eq!(m(5_100).ratio_bps(m(10_000)), Some(5_100));
        assert_eq!(m(1).ratio_bps(Money::ZERO), None);
        assert_eq!(Money::sum([m(1), m(2), m(-4)]).unwrap(), m(-1));
        assert!(Money::sum([m(Money::MAX_MINOR), m(1)]).is_err());
    }
}
