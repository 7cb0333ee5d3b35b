// src/coins.rs
// Integer coins (declared fees) and decimal coins (gas price vectors)

use crate::dec::Dec;
use num_bigint::BigUint;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoinError {
    #[error("invalid denom {0:?}")]
    InvalidDenom(String),
    #[error("duplicate denom {0:?}")]
    DuplicateDenom(String),
    #[error("invalid coin {0:?}")]
    InvalidCoin(String),
}

/// Denoms are 3..=128 chars, start with a letter, then letters, digits or `/:._-`.
pub fn validate_denom(denom: &str) -> Result<(), CoinError> {
    let mut chars = denom.chars();
    let first_ok = chars.next().map(|c| c.is_ascii_alphabetic()).unwrap_or(false);
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || "/:._-".contains(c));
    if first_ok && rest_ok && (3..=128).contains(&denom.len()) {
        Ok(())
    } else {
        Err(CoinError::InvalidDenom(denom.to_string()))
    }
}

/// Splits `"12.5atom"` into `("12.5", "atom")`.
fn split_amount_denom(s: &str) -> Result<(&str, &str), CoinError> {
    let s = s.trim();
    let idx = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .ok_or_else(|| CoinError::InvalidCoin(s.to_string()))?;
    if idx == 0 {
        return Err(CoinError::InvalidCoin(s.to_string()));
    }
    Ok(s.split_at(idx))
}

fn ensure_unique<'a>(denoms: impl Iterator<Item = &'a str>) -> Result<(), CoinError> {
    let mut seen = HashSet::new();
    for denom in denoms {
        if !seen.insert(denom) {
            return Err(CoinError::DuplicateDenom(denom.to_string()));
        }
    }
    Ok(())
}

mod amount_string {
    use super::*;

    pub fn serialize<S: Serializer>(amount: &BigUint, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(amount)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BigUint, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse::<BigUint>().map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    #[serde(with = "amount_string")]
    pub amount: BigUint,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: impl Into<BigUint>) -> Self {
        Self {
            denom: denom.into(),
            amount: amount.into(),
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

impl FromStr for Coin {
    type Err = CoinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (amount, denom) = split_amount_denom(s)?;
        validate_denom(denom)?;
        let amount = amount
            .parse::<BigUint>()
            .map_err(|_| CoinError::InvalidCoin(s.to_string()))?;
        Ok(Coin::new(denom, amount))
    }
}

/// Ordered set of integer coins; denoms are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Coin>", into = "Vec<Coin>")]
pub struct Coins(Vec<Coin>);

impl Coins {
    pub fn new(coins: Vec<Coin>) -> Result<Self, CoinError> {
        for coin in &coins {
            validate_denom(&coin.denom)?;
        }
        ensure_unique(coins.iter().map(|c| c.denom.as_str()))?;
        Ok(Coins(coins))
    }

    pub fn empty() -> Self {
        Coins(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Coin> {
        self.0.iter()
    }

    pub fn amount_of(&self, denom: &str) -> Option<&BigUint> {
        self.0.iter().find(|c| c.denom == denom).map(|c| &c.amount)
    }
}

impl TryFrom<Vec<Coin>> for Coins {
    type Error = CoinError;

    fn try_from(coins: Vec<Coin>) -> Result<Self, Self::Error> {
        Coins::new(coins)
    }
}

impl From<Coins> for Vec<Coin> {
    fn from(coins: Coins) -> Self {
        coins.0
    }
}

impl From<Coin> for Coins {
    fn from(coin: Coin) -> Self {
        Coins(vec![coin])
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

impl FromStr for Coins {
    type Err = CoinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Ok(Coins::empty());
        }
        let coins = s
            .split(',')
            .map(Coin::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Coins::new(coins)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecCoin {
    pub denom: String,
    pub amount: Dec,
}

impl DecCoin {
    pub fn new(denom: impl Into<String>, amount: Dec) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }
}

impl fmt::Display for DecCoin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

impl FromStr for DecCoin {
    type Err = CoinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (amount, denom) = split_amount_denom(s)?;
        validate_denom(denom)?;
        let amount = amount
            .parse::<Dec>()
            .map_err(|_| CoinError::InvalidCoin(s.to_string()))?;
        Ok(DecCoin::new(denom, amount))
    }
}

/// Ordered decimal coins with unique denoms. Order is significant: it is the
/// search order of the fee gate and must match the tier's initial price.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<DecCoin>", into = "Vec<DecCoin>")]
pub struct DecCoins(Vec<DecCoin>);

/// Current per-unit gas price of a tier.
pub type GasPriceVector = DecCoins;

impl DecCoins {
    pub fn new(coins: Vec<DecCoin>) -> Result<Self, CoinError> {
        for coin in &coins {
            validate_denom(&coin.denom)?;
        }
        ensure_unique(coins.iter().map(|c| c.denom.as_str()))?;
        Ok(DecCoins(coins))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DecCoin> {
        self.0.iter()
    }

    pub fn denoms(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|c| c.denom.as_str())
    }

    pub fn amount_of(&self, denom: &str) -> Option<&Dec> {
        self.0.iter().find(|c| c.denom == denom).map(|c| &c.amount)
    }

    /// Same denoms in the same order.
    pub fn same_shape(&self, other: &DecCoins) -> bool {
        self.len() == other.len() && self.denoms().eq(other.denoms())
    }

    pub fn is_all_zero(&self) -> bool {
        self.0.iter().all(|c| c.amount.is_zero())
    }

    pub fn has_negative(&self) -> bool {
        self.0.iter().any(|c| c.amount.is_negative())
    }
}

impl TryFrom<Vec<DecCoin>> for DecCoins {
    type Error = CoinError;

    fn try_from(coins: Vec<DecCoin>) -> Result<Self, Self::Error> {
        DecCoins::new(coins)
    }
}

impl From<DecCoins> for Vec<DecCoin> {
    fn from(coins: DecCoins) -> Self {
        coins.0
    }
}

impl fmt::Display for DecCoins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

impl FromStr for DecCoins {
    type Err = CoinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return DecCoins::new(Vec::new());
        }
        let coins = s
            .split(',')
            .map(DecCoin::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        DecCoins::new(coins)
    }
}
