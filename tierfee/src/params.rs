// src/params.rs
// Per-tier fee market configuration

use crate::coins::{DecCoin, DecCoins};
use crate::dec::Dec;
use crate::error::{Result, TierFeeError};
use serde::{Deserialize, Serialize};

/// Denom used by the default (free) tier.
pub const DEFAULT_DENOM: &str = "stake";

/// Configuration of one priority tier. A tier's identity is its index in
/// [`Params::tiers`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierParams {
    /// Scheduling score handed back for every transaction admitted in this tier.
    pub priority: i64,

    /// Price seeded at activation and whenever the tier is reset. Also fixes
    /// the denoms (and their order) of the tier's gas price vector.
    pub initial_gas_price: DecCoins,

    /// Per-block gas set point. Zero freezes the tier.
    pub parent_gas_target: u64,

    /// Damping factor for the per-block adjustment. Zero freezes the tier.
    pub change_denominator: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_gas_price: Option<DecCoins>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_gas_price: Option<DecCoins>,
}

impl TierParams {
    pub fn new(priority: i64, initial_gas_price: DecCoins) -> Self {
        Self {
            priority,
            initial_gas_price,
            parent_gas_target: 0,
            change_denominator: 0,
            min_gas_price: None,
            max_gas_price: None,
        }
    }

    pub fn with_target(mut self, parent_gas_target: u64, change_denominator: u64) -> Self {
        self.parent_gas_target = parent_gas_target;
        self.change_denominator = change_denominator;
        self
    }

    pub fn with_min_gas_price(mut self, min: DecCoins) -> Self {
        self.min_gas_price = Some(min);
        self
    }

    pub fn with_max_gas_price(mut self, max: DecCoins) -> Self {
        self.max_gas_price = Some(max);
        self
    }

    /// True when load never moves this tier's price.
    pub fn is_frozen(&self) -> bool {
        self.parent_gas_target == 0 || self.change_denominator == 0
    }

    pub fn validate(&self) -> Result<()> {
        if self.initial_gas_price.is_empty() {
            return Err(invalid("initial_gas_price must not be empty"));
        }
        if self.initial_gas_price.has_negative() {
            return Err(invalid(format!(
                "initial_gas_price {} contains a negative amount",
                self.initial_gas_price
            )));
        }

        for (name, bound) in [
            ("min_gas_price", &self.min_gas_price),
            ("max_gas_price", &self.max_gas_price),
        ] {
            if let Some(bound) = bound {
                if !bound.same_shape(&self.initial_gas_price) {
                    return Err(invalid(format!(
                        "{} {} must list the denoms of initial_gas_price {} in the same order",
                        name, bound, self.initial_gas_price
                    )));
                }
                if bound.has_negative() {
                    return Err(invalid(format!("{} {} contains a negative amount", name, bound)));
                }
            }
        }

        if let (Some(min), Some(max)) = (&self.min_gas_price, &self.max_gas_price) {
            for (lo, hi) in min.iter().zip(max.iter()) {
                if lo.amount > hi.amount {
                    return Err(invalid(format!(
                        "min_gas_price {} exceeds max_gas_price {} for denom {}",
                        lo.amount, hi.amount, lo.denom
                    )));
                }
            }
        }

        // frozen tiers sit at initial_gas_price forever, so it must respect the bounds
        for coin in self.initial_gas_price.iter() {
            let below = self
                .min_gas_price
                .as_ref()
                .and_then(|m| m.amount_of(&coin.denom))
                .map_or(false, |min| coin.amount < *min);
            let above = self
                .max_gas_price
                .as_ref()
                .and_then(|m| m.amount_of(&coin.denom))
                .map_or(false, |max| coin.amount > *max);
            if below || above {
                return Err(invalid(format!(
                    "initial_gas_price {} for denom {} lies outside [min_gas_price, max_gas_price]",
                    coin.amount, coin.denom
                )));
            }
        }

        Ok(())
    }
}

/// Ordered tier configuration. Reordering tiers is a breaking change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    pub tiers: Vec<TierParams>,
}

impl Params {
    pub fn new(tiers: Vec<TierParams>) -> Self {
        Self { tiers }
    }

    pub fn tier(&self, index: u32) -> Option<&TierParams> {
        self.tiers.get(index as usize)
    }

    pub fn num_tiers(&self) -> usize {
        self.tiers.len()
    }

    pub fn validate(&self) -> Result<()> {
        if self.tiers.is_empty() {
            return Err(invalid("at least one tier is required"));
        }
        for (index, tier) in self.tiers.iter().enumerate() {
            tier.validate().map_err(|e| match e {
                TierFeeError::InvalidParams(msg) => invalid(format!("tier {}: {}", index, msg)),
                other => other,
            })?;
        }
        Ok(())
    }
}

impl Default for Params {
    /// A single free tier.
    fn default() -> Self {
        let free = DecCoins::new(vec![DecCoin::new(DEFAULT_DENOM, Dec::zero())])
            .unwrap_or_default();
        Params::new(vec![TierParams::new(0, free)])
    }
}

fn invalid(msg: impl Into<String>) -> TierFeeError {
    TierFeeError::InvalidParams(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coins(s: &str) -> DecCoins {
        s.parse().unwrap()
    }

    fn tier() -> TierParams {
        TierParams::new(10, coins("0.000001atom,0.5stake")).with_target(10_000_000, 8)
    }

    #[test]
    fn test_default_params_are_valid() {
        let params = Params::default();
        assert!(params.validate().is_ok());
        assert!(params.tiers[0].is_frozen());
        assert!(params.tiers[0].initial_gas_price.is_all_zero());
    }

    #[test]
    fn test_empty_initial_price_rejected() {
        let params = Params::new(vec![TierParams::new(1, DecCoins::default())]);
        assert!(matches!(params.validate(), Err(TierFeeError::InvalidParams(_))));
    }

    #[test]
    fn test_negative_initial_price_rejected() {
        let mut t = tier();
        t.initial_gas_price = serde_json::from_str(r#"[{"denom":"atom","amount":"-1"}]"#).unwrap();
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_bounds_must_match_shape() {
        let t = tier().with_min_gas_price(coins("0.1stake,0.0000001atom"));
        let err = t.validate().unwrap_err();
        assert!(err.to_string().contains("min_gas_price"));

        let t = tier().with_max_gas_price(coins("1atom"));
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_min_above_max_rejected() {
        let t = tier()
            .with_min_gas_price(coins("0.00001atom,0.1stake"))
            .with_max_gas_price(coins("0.000001atom,1stake"));
        let err = t.validate().unwrap_err();
        assert!(err.to_string().contains("denom atom"));

        let ok = tier()
            .with_min_gas_price(coins("0.000001atom,0.1stake"))
            .with_max_gas_price(coins("0.000001atom,1stake"));
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_initial_price_must_respect_bounds() {
        let t = tier().with_min_gas_price(coins("0.00001atom,0.1stake"));
        assert!(t.validate().unwrap_err().to_string().contains("outside"));
        let t = tier().with_max_gas_price(coins("0.000001atom,0.4stake"));
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_error_names_tier_index() {
        let params = Params::new(vec![tier(), TierParams::new(0, DecCoins::default())]);
        let err = params.validate().unwrap_err();
        assert!(err.to_string().contains("tier 1"));
    }

    #[test]
    fn test_json_shape() {
        let params = Params::new(vec![tier()]);
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["tiers"][0]["priority"], 10);
        assert_eq!(json["tiers"][0]["change_denominator"], 8);
        assert!(json["tiers"][0].get("min_gas_price").is_none());
        let back: Params = serde_json::from_value(json).unwrap();
        assert_eq!(back, params);
    }
}
