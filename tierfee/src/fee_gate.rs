// src/fee_gate.rs
// Per-transaction fee check: effective gas price and priority for a tier

use crate::coins::{Coin, Coins, GasPriceVector};
use crate::error::{Result, TierFeeError};
use crate::params::Params;
use crate::tx::{declared_tier, FeeTx};
use log::debug;

/// Outcome of an accepted fee check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeCheck {
    /// Single-denom fee the transaction is charged; empty for a free tier.
    pub effective_gas_price: Coins,
    pub priority: i64,
    pub tier: u32,
}

/// `ceil(price * gas_limit)` for every denom of the price vector, in order.
pub fn required_fees(price: &GasPriceVector, gas_limit: u64) -> Result<Coins> {
    let coins = price
        .iter()
        .map(|c| Coin::new(c.denom.clone(), c.amount.mul_int_ceil(gas_limit)))
        .collect();
    Coins::new(coins).map_err(|e| TierFeeError::StateCorruption(e.to_string()))
}

/// Match a declared fee against a price vector. The first denom of `price`
/// that the fee covers on its own wins; denoms are never combined.
pub fn check_fee(price: &GasPriceVector, priority: i64, declared: &Coins, gas_limit: u64) -> Result<(Coins, i64)> {
    if price.is_all_zero() {
        return Ok((Coins::empty(), priority));
    }

    let required = required_fees(price, gas_limit)?;
    let honored = required.iter().find(|req| {
        declared
            .amount_of(&req.denom)
            .map_or(false, |paid| *paid >= req.amount)
    });

    match honored {
        Some(coin) => Ok((Coins::from(coin.clone()), priority)),
        None => Err(TierFeeError::InsufficientFee {
            provided: declared.clone(),
            required,
        }),
    }
}

/// Full gate for one transaction. `price_of` returns the stored gas price of
/// a tier, `None` when the tier has not been priced yet.
pub fn check_tx_fee<T, F>(tx: &T, params: &Params, price_of: F) -> Result<FeeCheck>
where
    T: FeeTx + ?Sized,
    F: FnOnce(u32) -> Result<Option<GasPriceVector>>,
{
    let fee = tx
        .fee()
        .ok_or_else(|| TierFeeError::MalformedTx("transaction carries no fee".into()))?;
    let gas_limit = tx
        .gas_limit()
        .ok_or_else(|| TierFeeError::MalformedTx("transaction carries no gas limit".into()))?;
    let tier = declared_tier(tx)?;

    let tier_params = params.tier(tier).ok_or(TierFeeError::InvalidTier {
        tier,
        num_tiers: params.num_tiers(),
    })?;

    let price = match price_of(tier)? {
        Some(price) => price,
        None => tier_params.initial_gas_price.clone(),
    };

    match check_fee(&price, tier_params.priority, fee, gas_limit) {
        Ok((effective_gas_price, priority)) => {
            debug!(
                "fee gate: tier {} gas {} accepted, effective {} priority {}",
                tier, gas_limit, effective_gas_price, priority
            );
            Ok(FeeCheck {
                effective_gas_price,
                priority,
                tier,
            })
        }
        Err(e) => {
            debug!("fee gate: tier {} gas {} rejected: {}", tier, gas_limit, e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coins::DecCoins;
    use crate::params::TierParams;
    use crate::tx::StdTx;

    fn prices(s: &str) -> DecCoins {
        s.parse().unwrap()
    }

    fn fee(s: &str) -> Coins {
        s.parse().unwrap()
    }

    fn params() -> Params {
        Params::new(vec![
            TierParams::new(10, prices("0.000001atom")).with_target(10_000_000, 8),
            TierParams::new(50, prices("0atom,0stake")),
        ])
    }

    #[test]
    fn test_accepts_rounded_up_fee() {
        let (effective, priority) = check_fee(&prices("0.000001125atom"), 10, &fee("1atom"), 200_000).unwrap();
        assert_eq!(effective, fee("1atom"));
        assert_eq!(priority, 10);
    }

    #[test]
    fn test_rejects_short_fee_with_both_amounts() {
        let err = check_fee(&prices("0.00001atom"), 10, &fee("1atom"), 200_000).unwrap_err();
        assert_eq!(
            err,
            TierFeeError::InsufficientFee {
                provided: fee("1atom"),
                required: fee("2atom"),
            }
        );
    }

    #[test]
    fn test_first_sufficient_denom_in_price_order() {
        let price = prices("0.01stake,0.001atom");
        // stake requires 10, atom requires 1; both are covered, stake comes first
        let (effective, _) = check_fee(&price, 1, &fee("1atom,10stake"), 1_000).unwrap();
        assert_eq!(effective, fee("10stake"));
        // stake short, atom covers it alone
        let (effective, _) = check_fee(&price, 1, &fee("1atom,9stake"), 1_000).unwrap();
        assert_eq!(effective, fee("1atom"));
    }

    #[test]
    fn test_denoms_are_not_combined() {
        let price = prices("0.01stake,0.01atom");
        let err = check_fee(&price, 1, &fee("5atom,5stake"), 1_000).unwrap_err();
        assert!(matches!(err, TierFeeError::InsufficientFee { .. }));
    }

    #[test]
    fn test_zero_price_tier_is_free() {
        let tx = StdTx::new(Coins::empty(), 1_000_000).with_tier(1);
        let check = check_tx_fee(&tx, &params(), |_| Ok(None)).unwrap();
        assert!(check.effective_gas_price.is_empty());
        assert_eq!(check.priority, 50);
        assert_eq!(check.tier, 1);
    }

    #[test]
    fn test_invalid_tier() {
        let tx = StdTx::new(fee("1atom"), 1).with_tier(3);
        let err = check_tx_fee(&tx, &params(), |_| Ok(None)).unwrap_err();
        assert_eq!(err, TierFeeError::InvalidTier { tier: 3, num_tiers: 2 });
    }

    #[test]
    fn test_malformed_without_fee_or_gas() {
        let no_fee = StdTx {
            fee: None,
            gas_limit: Some(1),
            extension_options: vec![],
        };
        assert!(matches!(
            check_tx_fee(&no_fee, &params(), |_| Ok(None)),
            Err(TierFeeError::MalformedTx(_))
        ));
        let no_gas = StdTx {
            fee: Some(fee("1atom")),
            gas_limit: None,
            extension_options: vec![],
        };
        assert!(matches!(
            check_tx_fee(&no_gas, &params(), |_| Ok(None)),
            Err(TierFeeError::MalformedTx(_))
        ));
    }

    #[test]
    fn test_uses_stored_price_over_initial() {
        let tx = StdTx::new(fee("1atom"), 200_000);
        let err = check_tx_fee(&tx, &params(), |tier| {
            assert_eq!(tier, 0);
            Ok(Some(prices("0.00001atom")))
        })
        .unwrap_err();
        assert!(matches!(err, TierFeeError::InsufficientFee { .. }));

        // initial price 0.000001 * 200_000 = 0.2 -> 1
        let ok = check_tx_fee(&tx, &params(), |_| Ok(None)).unwrap();
        assert_eq!(ok.effective_gas_price, fee("1atom"));
    }
}
