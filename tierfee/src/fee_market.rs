// src/fee_market.rs
// Dynamic fee market (EIP-1559 style), one gas price vector per tier

use crate::coins::{DecCoin, DecCoins, GasPriceVector};
use crate::dec::Dec;
use crate::error::{Result, TierFeeError};
use crate::params::{Params, TierParams};
use log::debug;

/// Move one price toward the tier's set point.
///
/// `delta = old * |G - T| / T / D`, added when the parent block ran above
/// target and subtracted when it ran below. A zero target or denominator
/// freezes the price.
pub fn adjust_price(old: &Dec, parent_gas_used: u64, target: u64, denominator: u64) -> Dec {
    if target == 0 || denominator == 0 || parent_gas_used == target {
        return old.clone();
    }

    let divisor = target as u128 * denominator as u128;
    if parent_gas_used > target {
        let gas_delta = (parent_gas_used - target) as u128;
        match old.checked_mul_frac(gas_delta, divisor) {
            Some(delta) => old + &delta,
            None => old.clone(),
        }
    } else {
        let gas_delta = (target - parent_gas_used) as u128;
        match old.checked_mul_frac(gas_delta, divisor) {
            Some(delta) => old - &delta,
            None => old.clone(),
        }
    }
}

/// Clamp into `[min, max]` when bounds are set, then floor at zero.
pub fn clamp_price(price: Dec, min: Option<&Dec>, max: Option<&Dec>) -> Dec {
    let mut price = price;
    if let Some(min) = min {
        if price < *min {
            price = min.clone();
        }
    }
    if let Some(max) = max {
        if price > *max {
            price = max.clone();
        }
    }
    if price.is_negative() {
        price = Dec::zero();
    }
    price
}

/// Next gas price vector of one tier. The vector keeps the denoms and order
/// of the tier's `initial_gas_price`; zero entries are retained.
///
/// A current vector of any other shape means the stored state is corrupt.
pub fn next_gas_price(
    current: &GasPriceVector,
    tier: &TierParams,
    parent_gas_used: u64,
) -> Result<GasPriceVector> {
    if !current.same_shape(&tier.initial_gas_price) {
        return Err(TierFeeError::StateCorruption(format!(
            "gas price {} does not match the denoms of initial_gas_price {}",
            current, tier.initial_gas_price
        )));
    }

    let min = tier.min_gas_price.as_ref();
    let max = tier.max_gas_price.as_ref();

    let next = current
        .iter()
        .map(|coin| {
            let adjusted = adjust_price(
                &coin.amount,
                parent_gas_used,
                tier.parent_gas_target,
                tier.change_denominator,
            );
            let clamped = clamp_price(
                adjusted,
                min.and_then(|m| m.amount_of(&coin.denom)),
                max.and_then(|m| m.amount_of(&coin.denom)),
            );
            DecCoin::new(coin.denom.clone(), clamped)
        })
        .collect::<Vec<_>>();

    DecCoins::new(next).map_err(|e| TierFeeError::StateCorruption(e.to_string()))
}

/// Run the engine over every tier.
///
/// `current[i]` is the stored vector of tier `i`, `None` when absent (the
/// tier then starts from its `initial_gas_price`). Without a parent gas
/// reading (cold start) every tier is seeded with its `initial_gas_price`
/// and the formula is skipped; repeating a cold start is a no-op.
pub fn update_gas_prices(
    params: &Params,
    current: &[Option<GasPriceVector>],
    parent_gas_used: Option<u64>,
) -> Result<Vec<GasPriceVector>> {
    let parent_gas_used = match parent_gas_used {
        Some(gas) => gas,
        None => {
            debug!("cold start: seeding {} tier(s) from initial_gas_price", params.num_tiers());
            return Ok(params
                .tiers
                .iter()
                .map(|t| t.initial_gas_price.clone())
                .collect());
        }
    };

    params
        .tiers
        .iter()
        .enumerate()
        .map(|(i, tier)| {
            let old = current
                .get(i)
                .and_then(|p| p.as_ref())
                .unwrap_or(&tier.initial_gas_price);
            let next = next_gas_price(old, tier, parent_gas_used)
                .map_err(|e| match e {
                    TierFeeError::StateCorruption(msg) => {
                        TierFeeError::StateCorruption(format!("tier {}: {}", i, msg))
                    }
                    other => other,
                })?;
            debug!(
                "tier {} gas price {} -> {} (parent gas {}, target {})",
                i, old, next, parent_gas_used, tier.parent_gas_target
            );
            Ok(next)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Dec {
        s.parse().unwrap()
    }

    fn coins(s: &str) -> DecCoins {
        s.parse().unwrap()
    }

    fn atom_tier() -> TierParams {
        TierParams::new(10, coins("0.000001atom")).with_target(10_000_000, 8)
    }

    #[test]
    fn test_fee_rises_above_target() {
        let next = adjust_price(&dec("0.000001"), 20_000_000, 10_000_000, 8);
        assert_eq!(next, dec("0.000001125"));
    }

    #[test]
    fn test_fee_falls_below_target() {
        let next = adjust_price(&dec("0.000001"), 5_000_000, 10_000_000, 8);
        assert_eq!(next, dec("0.0000009375"));
    }

    #[test]
    fn test_fixed_point_and_frozen() {
        let p = dec("0.000001");
        assert_eq!(adjust_price(&p, 10_000_000, 10_000_000, 8), p);
        assert_eq!(adjust_price(&p, 99_000_000, 10_000_000, 0), p);
        assert_eq!(adjust_price(&p, 99_000_000, 0, 8), p);
    }

    #[test]
    fn test_empty_block_with_denominator_one_drops_to_zero() {
        // G = 0, D = 1: delta == old, price reaches zero but stays in the vector
        let tier = TierParams::new(1, coins("0.5atom,0.25stake")).with_target(1_000, 1);
        let next = next_gas_price(&tier.initial_gas_price, &tier, 0).unwrap();
        assert_eq!(next, coins("0atom,0stake"));
        assert_eq!(next.len(), 2);
    }

    #[test]
    fn test_clamping() {
        assert_eq!(clamp_price(dec("5"), Some(&dec("1")), Some(&dec("3"))), dec("3"));
        assert_eq!(clamp_price(dec("0.5"), Some(&dec("1")), Some(&dec("3"))), dec("1"));
        assert_eq!(clamp_price(dec("-0.5"), None, None), Dec::zero());
        assert_eq!(clamp_price(dec("2"), None, None), dec("2"));
    }

    #[test]
    fn test_bounds_apply_per_denom() {
        let tier = TierParams::new(1, coins("1atom,1stake"))
            .with_target(100, 2)
            .with_min_gas_price(coins("0atom,0.9stake"))
            .with_max_gas_price(coins("1.1atom,10stake"));
        // G = 300: delta = old * 200 / 100 / 2 = old
        let up = next_gas_price(&tier.initial_gas_price, &tier, 300).unwrap();
        assert_eq!(up, coins("1.1atom,2stake"));
        // G = 0: delta = old / 2
        let down = next_gas_price(&tier.initial_gas_price, &tier, 0).unwrap();
        assert_eq!(down, coins("0.5atom,0.9stake"));
    }

    #[test]
    fn test_shape_mismatch_is_state_corruption() {
        let err = next_gas_price(&coins("0.1stake"), &atom_tier(), 1).unwrap_err();
        assert!(matches!(err, TierFeeError::StateCorruption(_)));

        let params = Params::new(vec![atom_tier()]);
        let err = update_gas_prices(&params, &[Some(coins("0.1atom,0.1stake"))], Some(5))
            .unwrap_err();
        assert!(err.to_string().contains("tier 0"));
    }

    #[test]
    fn test_cold_start_ignores_stored_prices() {
        let params = Params::new(vec![atom_tier()]);
        let seeded = update_gas_prices(&params, &[Some(coins("9atom"))], None).unwrap();
        assert_eq!(seeded, vec![coins("0.000001atom")]);
    }

    #[test]
    fn test_missing_tier_starts_from_initial() {
        let params = Params::new(vec![atom_tier(), atom_tier()]);
        let next = update_gas_prices(&params, &[Some(coins("0.000002atom"))], Some(20_000_000))
            .unwrap();
        assert_eq!(next[0], coins("0.00000225atom"));
        assert_eq!(next[1], coins("0.000001125atom"));
    }
}
