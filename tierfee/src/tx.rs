// src/tx.rs
// What the fee gate sees of a transaction: fee coins, gas limit and the
// extension options that may select a tier

use crate::coins::Coins;
use crate::error::{Result, TierFeeError};
use prost::Message;
use serde::{Deserialize, Serialize};

/// Type URL identifying [`ExtensionOptionTieredTx`] among a transaction's
/// extension options.
pub const TIERED_TX_TYPE_URL: &str = "/tieredfee.v1.ExtensionOptionTieredTx";

/// Opaque extension option carried by the envelope: a type tag plus the
/// encoded message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionOption {
    pub type_url: String,
    #[serde(with = "hex_bytes")]
    pub value: Vec<u8>,
}

mod hex_bytes {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(d)?;
        hex::decode(raw).map_err(de::Error::custom)
    }
}

/// Selects the fee tier of a transaction. Absent means tier 0.
#[derive(Clone, Copy, PartialEq, Eq, Message)]
pub struct ExtensionOptionTieredTx {
    #[prost(uint32, tag = "1")]
    pub fee_tier: u32,
}

impl ExtensionOptionTieredTx {
    pub fn to_option(&self) -> ExtensionOption {
        ExtensionOption {
            type_url: TIERED_TX_TYPE_URL.to_string(),
            value: self.encode_to_vec(),
        }
    }

    /// `None` if the option carries some other message.
    pub fn from_option(opt: &ExtensionOption) -> Option<Result<Self>> {
        if opt.type_url != TIERED_TX_TYPE_URL {
            return None;
        }
        Some(Self::decode(opt.value.as_slice()).map_err(|e| {
            TierFeeError::MalformedTx(format!("undecodable {}: {}", TIERED_TX_TYPE_URL, e))
        }))
    }
}

/// Read-only transaction view. `None` from `fee` or `gas_limit` means the
/// envelope has no fee/gas shape.
pub trait FeeTx {
    fn fee(&self) -> Option<&Coins>;
    fn gas_limit(&self) -> Option<u64>;
    fn extension_options(&self) -> &[ExtensionOption];
}

/// Tier declared by the first tiered-tx option; unknown options are skipped.
pub fn declared_tier<T: FeeTx + ?Sized>(tx: &T) -> Result<u32> {
    for opt in tx.extension_options() {
        if let Some(decoded) = ExtensionOptionTieredTx::from_option(opt) {
            return decoded.map(|ext| ext.fee_tier);
        }
    }
    Ok(0)
}

/// Plain transaction envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdTx {
    pub fee: Option<Coins>,
    pub gas_limit: Option<u64>,
    #[serde(default)]
    pub extension_options: Vec<ExtensionOption>,
}

impl StdTx {
    pub fn new(fee: Coins, gas_limit: u64) -> Self {
        Self {
            fee: Some(fee),
            gas_limit: Some(gas_limit),
            extension_options: Vec::new(),
        }
    }

    pub fn with_tier(self, fee_tier: u32) -> Self {
        self.with_extension(ExtensionOptionTieredTx { fee_tier }.to_option())
    }

    pub fn with_extension(mut self, opt: ExtensionOption) -> Self {
        self.extension_options.push(opt);
        self
    }
}

impl FeeTx for StdTx {
    fn fee(&self) -> Option<&Coins> {
        self.fee.as_ref()
    }

    fn gas_limit(&self) -> Option<u64> {
        self.gas_limit
    }

    fn extension_options(&self) -> &[ExtensionOption] {
        &self.extension_options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tier_is_zero() {
        let tx = StdTx::new(Coins::empty(), 100);
        assert_eq!(declared_tier(&tx).unwrap(), 0);
    }

    #[test]
    fn test_tier_option_roundtrip() {
        let tx = StdTx::new(Coins::empty(), 100).with_tier(3);
        assert_eq!(declared_tier(&tx).unwrap(), 3);
        // proto3: field 1, varint 3
        assert_eq!(tx.extension_options[0].value, vec![0x08, 0x03]);
    }

    #[test]
    fn test_unknown_options_are_ignored() {
        let tx = StdTx::new(Coins::empty(), 100)
            .with_extension(ExtensionOption {
                type_url: "/other.v1.Memo".into(),
                value: vec![0xde, 0xad],
            })
            .with_tier(2)
            .with_tier(5);
        assert_eq!(declared_tier(&tx).unwrap(), 2);
    }

    #[test]
    fn test_garbled_tier_option_is_malformed() {
        let tx = StdTx::new(Coins::empty(), 100).with_extension(ExtensionOption {
            type_url: TIERED_TX_TYPE_URL.into(),
            value: vec![0x08],
        });
        assert!(matches!(declared_tier(&tx), Err(TierFeeError::MalformedTx(_))));
    }

    #[test]
    fn test_json_envelope() {
        let tx = StdTx::new("1atom".parse().unwrap(), 200_000).with_tier(1);
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["extension_options"][0]["value"], "0801");
        let back: StdTx = serde_json::from_value(json).unwrap();
        assert_eq!(back, tx);
    }
}
