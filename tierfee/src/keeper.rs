// src/keeper.rs
// Tiered fee module keeper: parameter store, block lifecycle hooks and the
// transaction fee gate entry point

use crate::coins::{Coins, GasPriceVector};
use crate::error::{Result, TierFeeError};
use crate::fee_gate::{self, FeeCheck};
use crate::fee_market;
use crate::params::Params;
use crate::state::{FeeState, STORE_KEY};
use crate::storage::{get_json, put_json, KvStore, PrefixStore};
use crate::tx::FeeTx;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

/// Parameter subspace owned by the module.
pub const PARAMS_SUBSPACE: &[u8] = b"params/tieredfee/";
pub const PARAMS_KEY: &[u8] = b"Params";

/// Where the keeper stands within the current block.
///
/// `Fresh -> begin_block -> Priced -> end_block -> Closed`; a `Closed` block
/// is the next block's `Fresh`. Fee checks are only served while `Priced`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockPhase {
    Fresh,
    Priced,
    Closed,
}

/// Host gas meter for the block being executed.
pub trait GasMeter {
    fn gas_consumed(&self) -> u64;
}

/// Counting gas meter for hosts without their own.
#[derive(Debug, Clone, Default)]
pub struct BlockGasMeter {
    consumed: u64,
}

impl BlockGasMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_consumed(consumed: u64) -> Self {
        Self { consumed }
    }

    pub fn consume(&mut self, amount: u64) {
        self.consumed = self.consumed.saturating_add(amount);
    }
}

impl GasMeter for BlockGasMeter {
    fn gas_consumed(&self) -> u64 {
        self.consumed
    }
}

/// Validator set change returned from EndBlock. The fee module never
/// produces any; the type exists for the host contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorUpdate {
    pub pub_key: Vec<u8>,
    pub power: i64,
}

pub struct Keeper<S> {
    store: S,
    phase: BlockPhase,
    height: u64,
}

impl<S: KvStore> Keeper<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            phase: BlockPhase::Fresh,
            height: 0,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn phase(&self) -> BlockPhase {
        self.phase
    }

    /// Height passed to the last BeginBlock (0 before the first one).
    pub fn height(&self) -> u64 {
        self.height
    }

    pub(crate) fn state(&self) -> FeeState<PrefixStore<&S>> {
        FeeState::new(PrefixStore::new(&self.store, STORE_KEY))
    }

    fn subspace(&self) -> PrefixStore<&S> {
        PrefixStore::new(&self.store, PARAMS_SUBSPACE)
    }

    pub(crate) fn ensure_between_blocks(&self) -> Result<()> {
        if self.phase == BlockPhase::Priced {
            return Err(TierFeeError::InvalidPhase {
                expected: BlockPhase::Closed,
                actual: self.phase,
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Parameter store
    // -----------------------------------------------------------------------

    pub fn get_params(&self) -> Result<Params> {
        get_json(&self.subspace(), PARAMS_KEY)?
            .ok_or_else(|| TierFeeError::NotFound("tieredfee params have not been set".into()))
    }

    /// Replace the whole tier configuration. Existing prices are not clamped
    /// here; the next BeginBlock does that. Stored vectors of tiers that no
    /// longer exist, or whose denoms changed, are dropped so those tiers
    /// restart from `initial_gas_price`.
    pub fn set_params(&mut self, params: Params) -> Result<()> {
        self.ensure_between_blocks()?;
        if let Err(e) = params.validate() {
            warn!("rejected tieredfee params update: {}", e);
            return Err(e);
        }

        put_json(&self.subspace(), PARAMS_KEY, &params)?;

        let state = self.state();
        for tier in state.stored_tiers()? {
            match params.tier(tier) {
                None => {
                    debug!("dropping gas price of removed tier {}", tier);
                    state.delete_gas_price(tier)?;
                }
                Some(tp) => {
                    let reshaped = state
                        .get_gas_price(tier)?
                        .map_or(false, |p| !p.same_shape(&tp.initial_gas_price));
                    if reshaped {
                        debug!("resetting gas price of tier {} after denom change", tier);
                        state.delete_gas_price(tier)?;
                    }
                }
            }
        }

        info!("tieredfee params updated: {} tier(s)", params.num_tiers());
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Persistent state passthroughs
    // -----------------------------------------------------------------------

    pub fn get_parent_gas_used(&self) -> Result<Option<u64>> {
        self.state().get_parent_gas_used()
    }

    pub fn get_gas_price(&self, tier: u32) -> Result<Option<GasPriceVector>> {
        self.state().get_gas_price(tier)
    }

    pub fn get_all_gas_prices(&self) -> Result<Vec<GasPriceVector>> {
        let params = self.get_params()?;
        self.state().get_all_gas_prices(&params)
    }

    // -----------------------------------------------------------------------
    // Lifecycle hooks
    // -----------------------------------------------------------------------

    /// Reprice every tier from the parent block's gas usage.
    pub fn begin_block(&mut self, height: u64) -> Result<()> {
        if self.phase == BlockPhase::Priced {
            return Err(TierFeeError::InvalidPhase {
                expected: BlockPhase::Fresh,
                actual: self.phase,
            });
        }

        let params = self.get_params()?;
        let state = self.state();
        let parent_gas_used = state.get_parent_gas_used()?;
        let current = (0..params.num_tiers() as u32)
            .map(|tier| state.get_gas_price(tier))
            .collect::<Result<Vec<_>>>()?;

        let next = match fee_market::update_gas_prices(&params, &current, parent_gas_used) {
            Ok(next) => next,
            Err(e) => {
                error!("tieredfee begin_block at height {} halted: {}", height, e);
                return Err(e);
            }
        };
        for (tier, price) in next.iter().enumerate() {
            state.set_gas_price(tier as u32, price)?;
        }

        debug!(
            "tieredfee begin_block height {} parent gas {:?}: {} tier(s) priced",
            height,
            parent_gas_used,
            next.len()
        );
        self.height = height;
        self.phase = BlockPhase::Priced;
        Ok(())
    }

    /// Record this block's gas consumption for the next BeginBlock.
    pub fn end_block(&mut self, meter: &dyn GasMeter) -> Result<Vec<ValidatorUpdate>> {
        if self.phase != BlockPhase::Priced {
            return Err(TierFeeError::InvalidPhase {
                expected: BlockPhase::Priced,
                actual: self.phase,
            });
        }

        let gas = meter.gas_consumed();
        self.state().set_parent_gas_used(gas)?;
        debug!("tieredfee end_block height {} gas used {}", self.height, gas);

        self.phase = BlockPhase::Closed;
        Ok(Vec::new())
    }

    // -----------------------------------------------------------------------
    // Fee gate
    // -----------------------------------------------------------------------

    /// Effective gas price and priority for `tx`, or why it is rejected.
    pub fn check_tx_fee<T: FeeTx + ?Sized>(&self, tx: &T) -> Result<(Coins, i64)> {
        let check = self.check_tx_fee_detailed(tx)?;
        Ok((check.effective_gas_price, check.priority))
    }

    /// Same as [`Keeper::check_tx_fee`] but also reports the resolved tier.
    pub fn check_tx_fee_detailed<T: FeeTx + ?Sized>(&self, tx: &T) -> Result<FeeCheck> {
        if self.phase != BlockPhase::Priced {
            return Err(TierFeeError::InvalidPhase {
                expected: BlockPhase::Priced,
                actual: self.phase,
            });
        }
        let params = self.get_params()?;
        let state = self.state();
        fee_gate::check_tx_fee(tx, &params, |tier| state.get_gas_price(tier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coins::DecCoins;
    use crate::params::TierParams;
    use crate::storage::MemStore;
    use crate::tx::StdTx;

    fn prices(s: &str) -> DecCoins {
        s.parse().unwrap()
    }

    fn keeper() -> Keeper<MemStore> {
        let mut k = Keeper::new(MemStore::new());
        let params = Params::new(vec![
            TierParams::new(10, prices("0.000001atom")).with_target(10_000_000, 8),
            TierParams::new(20, prices("0.00001atom,0.5stake")).with_target(5_000_000, 4),
        ]);
        k.set_params(params).unwrap();
        k
    }

    #[test]
    fn test_params_missing_is_not_found() {
        let k = Keeper::new(MemStore::new());
        assert!(matches!(k.get_params(), Err(TierFeeError::NotFound(_))));
    }

    #[test]
    fn test_invalid_params_rejected_and_not_stored() {
        let mut k = keeper();
        let before = k.get_params().unwrap();
        let bad = Params::new(vec![TierParams::new(1, DecCoins::default())]);
        assert!(matches!(k.set_params(bad), Err(TierFeeError::InvalidParams(_))));
        assert_eq!(k.get_params().unwrap(), before);
    }

    #[test]
    fn test_lifecycle_order_enforced() {
        let mut k = keeper();
        let tx = StdTx::new("1atom".parse().unwrap(), 100);

        assert!(matches!(k.check_tx_fee(&tx), Err(TierFeeError::InvalidPhase { .. })));
        assert!(matches!(
            k.end_block(&BlockGasMeter::new()),
            Err(TierFeeError::InvalidPhase { .. })
        ));

        k.begin_block(1).unwrap();
        assert_eq!(k.phase(), BlockPhase::Priced);
        assert!(k.begin_block(1).is_err());
        assert!(k.set_params(Params::default()).is_err());
        assert!(k.check_tx_fee(&tx).is_ok());

        let updates = k.end_block(&BlockGasMeter::with_consumed(7)).unwrap();
        assert!(updates.is_empty());
        assert_eq!(k.phase(), BlockPhase::Closed);
        assert_eq!(k.get_parent_gas_used().unwrap(), Some(7));

        k.begin_block(2).unwrap();
        assert_eq!(k.height(), 2);
    }

    #[test]
    fn test_end_block_records_metered_gas() {
        let mut k = keeper();
        k.begin_block(1).unwrap();

        let mut meter = BlockGasMeter::new();
        for gas in [200_000, 1_500_000, u64::MAX] {
            meter.consume(gas);
        }
        k.end_block(&meter).unwrap();
        assert_eq!(k.get_parent_gas_used().unwrap(), Some(u64::MAX));
    }

    #[test]
    fn test_set_params_prunes_removed_and_reshaped_tiers() {
        let mut k = keeper();
        k.begin_block(1).unwrap();
        k.end_block(&BlockGasMeter::with_consumed(1)).unwrap();
        assert_eq!(k.state().stored_tiers().unwrap(), vec![0, 1]);

        // tier 0 changes denoms, tier 1 disappears
        let params = Params::new(vec![TierParams::new(10, prices("0.1stake")).with_target(1, 1)]);
        k.set_params(params).unwrap();
        assert!(k.state().stored_tiers().unwrap().is_empty());

        k.begin_block(2).unwrap();
        assert_eq!(k.get_all_gas_prices().unwrap(), vec![prices("0.1stake")]);
    }

    #[test]
    fn test_set_params_keeps_compatible_prices() {
        let mut k = keeper();
        k.begin_block(1).unwrap();
        k.end_block(&BlockGasMeter::with_consumed(20_000_000)).unwrap();
        k.begin_block(2).unwrap();
        k.end_block(&BlockGasMeter::with_consumed(10_000_000)).unwrap();
        let before = k.get_gas_price(0).unwrap();

        let mut params = k.get_params().unwrap();
        params.tiers[0].priority = 99;
        k.set_params(params).unwrap();
        assert_eq!(k.get_gas_price(0).unwrap(), before);
    }

    #[test]
    fn test_corrupt_vector_halts_begin_block() {
        let mut k = keeper();
        k.begin_block(1).unwrap();
        k.end_block(&BlockGasMeter::with_consumed(1)).unwrap();
        // write a vector with the wrong denoms straight into the store
        k.state().set_gas_price(0, &prices("1stake")).unwrap();

        let err = k.begin_block(2).unwrap_err();
        assert!(matches!(err, TierFeeError::StateCorruption(_)));
        assert!(!err.is_recoverable());
        assert_eq!(k.phase(), BlockPhase::Closed);
        assert_eq!(k.get_gas_price(0).unwrap(), Some(prices("1stake")));
    }
}
