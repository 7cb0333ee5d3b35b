// src/state.rs
// Persistent fee market state: parent gas usage and one gas price vector per tier
//
// Layout under the module store key:
//   0x00                      -> big-endian u64 parent gas used
//   0x01 || BE(u64(tier))     -> bincode-encoded gas price vector

use crate::coins::GasPriceVector;
use crate::error::{Result, TierFeeError};
use crate::params::Params;
use crate::storage::KvStore;

/// Module store key; every state key lives under it.
pub const STORE_KEY: &[u8] = b"tieredfee/";

pub const PARENT_GAS_USED_KEY: &[u8] = &[0x00];
pub const GAS_PRICE_PREFIX: u8 = 0x01;

pub fn gas_price_key(tier: u32) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    key.push(GAS_PRICE_PREFIX);
    key.extend_from_slice(&(tier as u64).to_be_bytes());
    key
}

fn tier_from_key(key: &[u8]) -> Result<u32> {
    let raw: [u8; 8] = key
        .get(1..)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| TierFeeError::StateCorruption(format!("bad gas price key {:02x?}", key)))?;
    u32::try_from(u64::from_be_bytes(raw))
        .map_err(|_| TierFeeError::StateCorruption(format!("tier index out of range in key {:02x?}", key)))
}

/// Typed accessors over a store already scoped to [`STORE_KEY`].
pub struct FeeState<S> {
    store: S,
}

impl<S: KvStore> FeeState<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// `None` until the first EndBlock after activation.
    pub fn get_parent_gas_used(&self) -> Result<Option<u64>> {
        match self.store.get(PARENT_GAS_USED_KEY)? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    TierFeeError::StateCorruption(format!(
                        "parent gas used is {} bytes, expected 8",
                        bytes.len()
                    ))
                })?;
                Ok(Some(u64::from_be_bytes(arr)))
            }
            None => Ok(None),
        }
    }

    pub fn set_parent_gas_used(&self, gas: u64) -> Result<()> {
        self.store.set(PARENT_GAS_USED_KEY, &gas.to_be_bytes())
    }

    pub fn clear_parent_gas_used(&self) -> Result<()> {
        self.store.delete(PARENT_GAS_USED_KEY)
    }

    pub fn get_gas_price(&self, tier: u32) -> Result<Option<GasPriceVector>> {
        match self.store.get(&gas_price_key(tier))? {
            Some(bytes) => {
                let price = bincode::deserialize(&bytes).map_err(|e| {
                    TierFeeError::StateCorruption(format!("tier {} gas price undecodable: {}", tier, e))
                })?;
                Ok(Some(price))
            }
            None => Ok(None),
        }
    }

    pub fn set_gas_price(&self, tier: u32, price: &GasPriceVector) -> Result<()> {
        let bytes = bincode::serialize(price)?;
        self.store.set(&gas_price_key(tier), &bytes)
    }

    pub fn delete_gas_price(&self, tier: u32) -> Result<()> {
        self.store.delete(&gas_price_key(tier))
    }

    /// Tier indexes that currently have a stored vector, ascending.
    pub fn stored_tiers(&self) -> Result<Vec<u32>> {
        self.store
            .prefix_scan(&[GAS_PRICE_PREFIX])?
            .iter()
            .map(|(k, _)| tier_from_key(k))
            .collect()
    }

    /// One vector per configured tier; tiers without a stored vector report
    /// their `initial_gas_price`.
    pub fn get_all_gas_prices(&self, params: &Params) -> Result<Vec<GasPriceVector>> {
        params
            .tiers
            .iter()
            .enumerate()
            .map(|(i, tier)| {
                Ok(self
                    .get_gas_price(i as u32)?
                    .unwrap_or_else(|| tier.initial_gas_price.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coins::DecCoins;
    use crate::params::TierParams;
    use crate::storage::MemStore;

    fn prices(s: &str) -> DecCoins {
        s.parse().unwrap()
    }

    #[test]
    fn test_key_layout() {
        assert_eq!(gas_price_key(0), vec![0x01, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(gas_price_key(258), vec![0x01, 0, 0, 0, 0, 0, 0, 1, 2]);
        assert_eq!(tier_from_key(&gas_price_key(258)).unwrap(), 258);
    }

    #[test]
    fn test_parent_gas_used_is_big_endian() {
        let store = MemStore::new();
        let state = FeeState::new(&store);
        assert_eq!(state.get_parent_gas_used().unwrap(), None);
        state.set_parent_gas_used(20_000_000).unwrap();
        assert_eq!(state.get_parent_gas_used().unwrap(), Some(20_000_000));
        assert_eq!(
            store.get(&[0x00]).unwrap(),
            Some(20_000_000u64.to_be_bytes().to_vec())
        );
    }

    #[test]
    fn test_corrupt_parent_gas_used() {
        let store = MemStore::new();
        store.set(&[0x00], &[1, 2, 3]).unwrap();
        let state = FeeState::new(&store);
        assert!(matches!(
            state.get_parent_gas_used(),
            Err(TierFeeError::StateCorruption(_))
        ));
    }

    #[test]
    fn test_gas_price_vectors_fill_from_initial() {
        let store = MemStore::new();
        let state = FeeState::new(&store);
        let params = Params::new(vec![
            TierParams::new(1, prices("0.000001atom")),
            TierParams::new(2, prices("0.5stake,0.1atom")),
        ]);

        state.set_gas_price(1, &prices("0.7stake,0.2atom")).unwrap();
        let all = state.get_all_gas_prices(&params).unwrap();
        assert_eq!(all[0], prices("0.000001atom"));
        assert_eq!(all[1], prices("0.7stake,0.2atom"));
        assert_eq!(state.stored_tiers().unwrap(), vec![1]);

        state.delete_gas_price(1).unwrap();
        assert!(state.get_gas_price(1).unwrap().is_none());
    }

    #[test]
    fn test_undecodable_vector_is_corruption() {
        let store = MemStore::new();
        store.set(&gas_price_key(0), &[0xff; 3]).unwrap();
        let state = FeeState::new(&store);
        assert!(matches!(state.get_gas_price(0), Err(TierFeeError::StateCorruption(_))));
    }
}
