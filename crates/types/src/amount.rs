//! Arbitrary-precision balance arithmetic.
//!
//! Balances are signed big integers so that no sequence of deposits can
//! overflow or lose precision. On every external surface (log records,
//! snapshot files, API responses) an amount travels as a decimal string.

use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub};
use std::str::FromStr;

use num_bigint::BigInt;
use serde::de::{self, Deserialize, Deserializer, Visitor};
use serde::ser::{Serialize, Serializer};

/// An arbitrary-precision signed amount of ledger units.
///
/// Wraps [`num_bigint::BigInt`] and serializes as a decimal string
/// (`"12345"`, `"-7"`), never as a JSON number, so that values beyond
/// `i64`/`f64` range survive transit intact.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Amount(BigInt);

impl Amount {
    /// The zero amount.
    #[must_use]
    pub fn zero() -> Self {
        Self(BigInt::from(0))
    }

    /// Whether this amount is strictly positive.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.0 > BigInt::from(0)
    }

    /// Whether this amount is strictly negative.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.0 < BigInt::from(0)
    }
}

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Self(BigInt::from(value))
    }
}

impl FromStr for Amount {
    type Err = num_bigint::ParseBigIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(BigInt::from_str(s)?))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl AddAssign<&Amount> for Amount {
    fn add_assign(&mut self, rhs: &Amount) {
        self.0 += &rhs.0;
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0 - rhs.0)
    }
}

impl Neg for Amount {
    type Output = Amount;

    fn neg(self) -> Amount {
        Amount(-self.0)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AmountVisitor;

        impl Visitor<'_> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal integer string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
                v.parse()
                    .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
            }

            // Tolerate plain JSON integers written by older tooling.
            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
                Ok(Amount::from(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
                Ok(Amount(BigInt::from(v)))
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

/// The balance state of an account.
///
/// The issuer account is `Unlimited`: its stored numeric balance is
/// meaningless, arithmetic against it is a structural no-op, and queries
/// report the sentinel rather than a number. Every other account holds
/// `Funds`, which must never go negative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Balance {
    /// The issuer sentinel. Never participates in arithmetic.
    Unlimited,
    /// A concrete, non-negative amount.
    Funds(Amount),
}

impl Balance {
    /// A zero `Funds` balance.
    #[must_use]
    pub fn zero() -> Self {
        Balance::Funds(Amount::zero())
    }

    /// Whether this is the unlimited sentinel.
    #[must_use]
    pub fn is_unlimited(&self) -> bool {
        matches!(self, Balance::Unlimited)
    }

    /// Add `amount` (possibly negative) to a `Funds` balance.
    ///
    /// Unlimited balances are left untouched, upholding the invariant
    /// that the issuer never undergoes ordinary arithmetic.
    pub fn credit(&mut self, amount: &Amount) {
        if let Balance::Funds(funds) = self {
            *funds += amount;
        }
    }

    /// Whether a debit of `amount` would be covered.
    ///
    /// Unlimited balances cover any amount.
    #[must_use]
    pub fn covers(&self, amount: &Amount) -> bool {
        match self {
            Balance::Unlimited => true,
            Balance::Funds(funds) => funds >= amount,
        }
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Balance::Unlimited => f.write_str("unlimited"),
            Balance::Funds(amount) => write!(f, "{amount}"),
        }
    }
}
