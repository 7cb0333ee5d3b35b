// src/genesis.rs
// Genesis import/export of the tiered fee module

use crate::coins::GasPriceVector;
use crate::error::{Result, TierFeeError};
use crate::keeper::Keeper;
use crate::params::Params;
use crate::storage::KvStore;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    pub params: Params,

    /// Gas consumed by the last block before genesis, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_gas_used: Option<u64>,

    /// One vector per tier, in tier-index order. Trailing tiers may be
    /// omitted; they start from their `initial_gas_price`.
    #[serde(default)]
    pub gas_prices: Vec<GasPriceVector>,
}

impl Default for GenesisState {
    fn default() -> Self {
        Self {
            params: Params::default(),
            parent_gas_used: None,
            gas_prices: Vec::new(),
        }
    }
}

impl GenesisState {
    pub fn new(params: Params, parent_gas_used: Option<u64>, gas_prices: Vec<GasPriceVector>) -> Self {
        Self {
            params,
            parent_gas_used,
            gas_prices,
        }
    }

    /// Parameters must validate; every supplied vector must have the shape
    /// of its tier and carry no negative amount. Clamps are not checked here:
    /// the next BeginBlock applies them.
    pub fn validate(&self) -> Result<()> {
        self.params.validate()?;

        if self.gas_prices.len() > self.params.num_tiers() {
            return Err(TierFeeError::InvalidParams(format!(
                "genesis lists {} gas price(s) for {} tier(s)",
                self.gas_prices.len(),
                self.params.num_tiers()
            )));
        }

        for (tier, (price, tp)) in self.gas_prices.iter().zip(self.params.tiers.iter()).enumerate() {
            if !price.same_shape(&tp.initial_gas_price) {
                return Err(TierFeeError::InvalidParams(format!(
                    "tier {}: genesis gas price {} does not match the denoms of initial_gas_price {}",
                    tier, price, tp.initial_gas_price
                )));
            }
            if price.has_negative() {
                return Err(TierFeeError::InvalidParams(format!(
                    "tier {}: genesis gas price {} contains a negative amount",
                    tier, price
                )));
            }
        }
        Ok(())
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        use anyhow::Context;
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("reading genesis file {}", path.display()))?;
        let genesis = serde_json::from_str(&json)
            .with_context(|| format!("parsing genesis file {}", path.display()))?;
        Ok(genesis)
    }
}

impl<S: KvStore> Keeper<S> {
    /// Install a genesis state. Every tier ends up with a stored vector.
    pub fn init_genesis(&mut self, genesis: &GenesisState) -> Result<()> {
        self.ensure_between_blocks()?;
        genesis.validate()?;

        self.set_params(genesis.params.clone())?;

        let state = self.state();
        for tier in state.stored_tiers()? {
            state.delete_gas_price(tier)?;
        }
        match genesis.parent_gas_used {
            Some(gas) => state.set_parent_gas_used(gas)?,
            None => state.clear_parent_gas_used()?,
        }
        for (tier, tp) in genesis.params.tiers.iter().enumerate() {
            let price = genesis.gas_prices.get(tier).unwrap_or(&tp.initial_gas_price);
            state.set_gas_price(tier as u32, price)?;
        }

        info!(
            "tieredfee genesis imported: {} tier(s), parent gas {:?}",
            genesis.params.num_tiers(),
            genesis.parent_gas_used
        );
        Ok(())
    }

    pub fn export_genesis(&self) -> Result<GenesisState> {
        let params = self.get_params()?;
        let state = self.state();
        let genesis = GenesisState {
            parent_gas_used: state.get_parent_gas_used()?,
            gas_prices: state.get_all_gas_prices(&params)?,
            params,
        };
        info!(
            "tieredfee genesis exported at phase {:?}: {} tier(s)",
            self.phase(),
            genesis.params.num_tiers()
        );
        Ok(genesis)
    }
}
