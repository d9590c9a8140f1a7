use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Number of fractional digits kept for every normalized transaction amount.
pub const AMOUNT_DIGITS: u32 = 2;

#[derive(Debug, Error)]
pub enum ParseAmountError {
    #[error("Amount is empty")]
    Empty,

    /// Unable to parse decimal string.
    #[error("Unable to parse decimal string")]
    Decimal(#[from] rust_decimal::Error),
}

/// Signed monetary amount backed by a `Decimal`.
///
/// Serialized as a JSON number for presentation. Arithmetic never goes through floating point.
#[derive(Copy, Clone, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Amount(#[serde(with = "rust_decimal::serde::float")] Decimal);

macro_rules! impl_math_ops {
    ($name:ident) => {
        impl ::std::ops::Add for $name {
            type Output = Self;

            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl ::std::ops::AddAssign for $name {
            fn add_assign(&mut self, rhs: Self) {
                self.0 += rhs.0;
            }
        }

        impl ::std::ops::Neg for $name {
            type Output = Self;

            fn neg(self) -> Self::Output {
                Self(-self.0)
            }
        }

        impl ::std::ops::Sub for $name {
            type Output = Self;

            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }
    };
}

impl_math_ops!(Amount);

impl Amount {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Round to the fixed normalized precision.
    ///
    /// Midpoints round away from zero, the way bank statements print them.
    pub fn normalized(self) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(AMOUNT_DIGITS, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Convert into another currency with the given rate. `None` on overflow.
    pub fn checked_convert(self, rate: Decimal) -> Option<Self> {
        self.0.checked_mul(rate).map(Self)
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn abs(self) -> Self {
        Self(self.0.abs())
    }

    pub fn to_decimal(self) -> Decimal {
        self.0
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, amount| acc + amount)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

/// Parses bank-export style amounts: `"-1 234,56"`, `"1234.5"`, `"+12"`.
impl FromStr for Amount {
    type Err = ParseAmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '\u{a0}' && *c != '+')
            .collect();
        if cleaned.is_empty() {
            return Err(ParseAmountError::Empty);
        }

        // A lone comma is a decimal separator.
        let cleaned = if !cleaned.contains('.') && cleaned.matches(',').count() == 1 {
            cleaned.replace(',', ".")
        } else {
            cleaned
        };

        Ok(Self(cleaned.parse()?))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let precision = AMOUNT_DIGITS as usize;
        let amount = self.normalized().0;

        write!(f, "{amount:.precision$}")
    }
}
