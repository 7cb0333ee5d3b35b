// src/query.rs
// Read-only query handlers; responses mirror the stored types one to one

use crate::coins::GasPriceVector;
use crate::error::{Result, TierFeeError};
use crate::keeper::Keeper;
use crate::params::Params;
use crate::storage::KvStore;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParamsResponse {
    pub params: Params,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryGasPricesResponse {
    pub gas_prices: Vec<GasPriceVector>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryGasPriceResponse {
    pub gas_price: GasPriceVector,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryBlockGasUsedResponse {
    pub block_gas_used: u64,
}

impl<S: KvStore> Keeper<S> {
    pub fn query_params(&self) -> Result<QueryParamsResponse> {
        Ok(QueryParamsResponse {
            params: self.get_params()?,
        })
    }

    /// One vector per tier in index order; unpriced tiers report their
    /// `initial_gas_price`.
    pub fn query_gas_prices(&self) -> Result<QueryGasPricesResponse> {
        Ok(QueryGasPricesResponse {
            gas_prices: self.get_all_gas_prices()?,
        })
    }

    pub fn query_gas_price(&self, tier: u32) -> Result<QueryGasPriceResponse> {
        let params = self.get_params()?;
        let tier_params = params.tier(tier).ok_or(TierFeeError::InvalidTier {
            tier,
            num_tiers: params.num_tiers(),
        })?;
        let gas_price = self
            .get_gas_price(tier)?
            .unwrap_or_else(|| tier_params.initial_gas_price.clone());
        Ok(QueryGasPriceResponse { gas_price })
    }

    /// Fails with `NotFound` until the first EndBlock has run.
    pub fn query_block_gas_used(&self) -> Result<QueryBlockGasUsedResponse> {
        let block_gas_used = self
            .get_parent_gas_used()?
            .ok_or_else(|| TierFeeError::NotFound("no block gas usage recorded yet".into()))?;
        Ok(QueryBlockGasUsedResponse { block_gas_used })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coins::DecCoins;
    use crate::genesis::GenesisState;
    use crate::keeper::BlockGasMeter;
    use crate::params::TierParams;
    use crate::storage::MemStore;

    fn prices(s: &str) -> DecCoins {
        s.parse().unwrap()
    }

    fn keeper() -> Keeper<MemStore> {
        let params = Params::new(vec![
            TierParams::new(10, prices("0.000001atom")).with_target(10_000_000, 8),
            TierParams::new(20, prices("0.2stake")),
        ]);
        let mut k = Keeper::new(MemStore::new());
        k.init_genesis(&GenesisState::new(params, None, vec![])).unwrap();
        k
    }

    #[test]
    fn test_block_gas_used_not_found_before_first_end_block() {
        let mut k = keeper();
        assert!(matches!(k.query_block_gas_used(), Err(TierFeeError::NotFound(_))));

        k.begin_block(1).unwrap();
        k.end_block(&BlockGasMeter::with_consumed(20_000_000)).unwrap();
        assert_eq!(k.query_block_gas_used().unwrap().block_gas_used, 20_000_000);
    }

    #[test]
    fn test_gas_prices_in_tier_order() {
        let mut k = keeper();
        k.begin_block(1).unwrap();
        k.end_block(&BlockGasMeter::with_consumed(20_000_000)).unwrap();
        k.begin_block(2).unwrap();

        let resp = k.query_gas_prices().unwrap();
        assert_eq!(resp.gas_prices, vec![prices("0.000001125atom"), prices("0.2stake")]);
        assert_eq!(k.query_gas_price(0).unwrap().gas_price, prices("0.000001125atom"));
    }

    #[test]
    fn test_gas_price_out_of_range() {
        let k = keeper();
        assert_eq!(
            k.query_gas_price(2).unwrap_err(),
            TierFeeError::InvalidTier { tier: 2, num_tiers: 2 }
        );
    }

    #[test]
    fn test_params_response_json() {
        let k = keeper();
        let json = serde_json::to_value(k.query_params().unwrap()).unwrap();
        assert_eq!(json["params"]["tiers"][1]["priority"], 20);
    }
}
