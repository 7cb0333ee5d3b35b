// src/dec.rs
//! Fixed-point decimal with 18 fractional digits.
//!
//! A `Dec` is stored as a signed big integer of atoms (`value * 10^18`), so a
//! price multiplied by a gas quantity is exact and only the final division
//! rounds. Division rounds half to even.

use num_bigint::{BigInt, BigUint};
use num_integer::Integer;
use num_traits::{Signed, Zero};
use once_cell::sync::Lazy;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;
use thiserror::Error;

/// Number of fractional digits carried by every `Dec`.
pub const PRECISION: usize = 18;

static ONE_ATOMS: Lazy<BigInt> = Lazy::new(|| BigInt::from(10u64).pow(PRECISION as u32));

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid decimal {input:?}: {reason}")]
pub struct ParseDecError {
    input: String,
    reason: &'static str,
}

#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Dec(BigInt);

impl Dec {
    pub fn zero() -> Self {
        Dec(BigInt::zero())
    }

    pub fn from_atoms(atoms: BigInt) -> Self {
        Dec(atoms)
    }

    pub fn atoms(&self) -> &BigInt {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_negative()
    }

    /// `self * numerator / denominator`, multiplying before dividing.
    /// Returns `None` when `denominator` is zero.
    pub fn checked_mul_frac(&self, numerator: u128, denominator: u128) -> Option<Dec> {
        if denominator == 0 {
            return None;
        }
        let product = &self.0 * BigInt::from(numerator);
        Some(Dec(div_round_half_even(&product, &BigInt::from(denominator))))
    }

    /// Smallest integer `>= self * n`. Negative products floor at zero.
    pub fn mul_int_ceil(&self, n: u64) -> BigUint {
        let product = &self.0 * BigInt::from(n);
        product
            .div_ceil(&ONE_ATOMS)
            .to_biguint()
            .unwrap_or_default()
    }
}

/// Integer division of `n / d` (d > 0) rounding half to even.
fn div_round_half_even(n: &BigInt, d: &BigInt) -> BigInt {
    let (q, r) = n.abs().div_rem(d);
    let twice_r = r * 2u32;
    let rounded = match twice_r.cmp(d) {
        Ordering::Less => q,
        Ordering::Greater => q + 1u32,
        Ordering::Equal => {
            if q.is_odd() {
                q + 1u32
            } else {
                q
            }
        }
    };
    if n.is_negative() {
        -rounded
    } else {
        rounded
    }
}

impl Add for Dec {
    type Output = Dec;

    fn add(self, rhs: Dec) -> Dec {
        Dec(self.0 + rhs.0)
    }
}

impl Sub for Dec {
    type Output = Dec;

    fn sub(self, rhs: Dec) -> Dec {
        Dec(self.0 - rhs.0)
    }
}

impl<'a> Add<&'a Dec> for &'a Dec {
    type Output = Dec;

    fn add(self, rhs: &'a Dec) -> Dec {
        Dec(&self.0 + &rhs.0)
    }
}

impl<'a> Sub<&'a Dec> for &'a Dec {
    type Output = Dec;

    fn sub(self, rhs: &'a Dec) -> Dec {
        Dec(&self.0 - &rhs.0)
    }
}

impl fmt::Display for Dec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (int_part, frac_part) = self.0.abs().div_rem(&ONE_ATOMS);
        let sign = if self.0.is_negative() { "-" } else { "" };
        write!(
            f,
            "{}{}.{:0>width$}",
            sign,
            int_part,
            frac_part.to_string(),
            width = PRECISION
        )
    }
}

impl fmt::Debug for Dec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dec({})", self)
    }
}

impl FromStr for Dec {
    type Err = ParseDecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason| ParseDecError {
            input: s.to_string(),
            reason,
        };

        let (negative, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (int_part, frac_part) = match body.split_once('.') {
            Some((i, f)) => {
                if f.is_empty() {
                    return Err(err("empty fractional part"));
                }
                (i, f)
            }
            None => (body, ""),
        };
        if int_part.is_empty() {
            return Err(err("empty integer part"));
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(err("non-digit character"));
        }
        if frac_part.len() > PRECISION {
            return Err(err("more than 18 fractional digits"));
        }

        let mut digits = String::with_capacity(int_part.len() + PRECISION);
        digits.push_str(int_part);
        digits.push_str(frac_part);
        digits.extend(std::iter::repeat('0').take(PRECISION - frac_part.len()));

        let atoms = BigInt::parse_bytes(digits.as_bytes(), 10).ok_or_else(|| err("unparsable"))?;
        Ok(Dec(if negative { -atoms } else { atoms }))
    }
}

impl Serialize for Dec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Dec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
