// Tiered fee market: per-tier EIP-1559 style gas prices, the transaction fee
// gate, and the host-facing keeper, genesis and query surfaces.

pub mod api;
pub mod coins;
pub mod config;
pub mod dec;
pub mod error;
pub mod fee_gate;
pub mod fee_market;
pub mod genesis;
pub mod keeper;
pub mod params;
pub mod query;
pub mod state;
pub mod storage;
pub mod tx;

pub use coins::{Coin, Coins, DecCoin, DecCoins, GasPriceVector};
pub use dec::Dec;
pub use error::{Result, TierFeeError};
pub use genesis::GenesisState;
pub use keeper::{BlockGasMeter, BlockPhase, GasMeter, Keeper, ValidatorUpdate};
pub use params::{Params, TierParams};
pub use tx::{ExtensionOption, ExtensionOptionTieredTx, FeeTx, StdTx};
