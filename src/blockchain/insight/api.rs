//! structs from the insight API
//!
//! see: <https://github.com/RavenDevKit/insight-api>
use std::collections::HashMap;

use bitcoin::{OutPoint, ScriptBuf, Txid};

use crate::blockchain::ProviderError;
use crate::types::{
    Confirmation, FeeRate, RecordInput, RecordOutput, TransactionRecord, UnspentOutput, UtxoFee,
};

/// Confirmation target used for fee estimation, in blocks
pub const FEE_TARGET_BLOCKS: usize = 10;

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Utxo {
    pub txid: Txid,
    pub vout: u32,
    pub satoshis: u64,
    #[serde(rename = "scriptPubKey")]
    pub script_pubkey: ScriptBuf,
    pub height: Option<u32>,
    #[serde(default)]
    pub confirmations: u64,
}

impl Utxo {
    pub fn to_unspent_output(&self) -> UnspentOutput {
        let confirmation = match self.height {
            Some(height) if self.confirmations > 0 => Confirmation::Confirmed { height },
            _ => Confirmation::Unconfirmed,
        };

        UnspentOutput {
            outpoint: OutPoint::new(self.txid, self.vout),
            amount: self.satoshis,
            script: self.script_pubkey.clone(),
            confirmation,
        }
    }
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Vin {
    // None if coinbase
    pub txid: Option<Txid>,
    pub vout: Option<u32>,
    pub addr: Option<String>,
    #[serde(rename = "valueSat")]
    pub value_sat: Option<u64>,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct VoutScript {
    pub hex: ScriptBuf,
    #[serde(default)]
    pub addresses: Vec<String>,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Vout {
    // decimal amount in coins, eg. "0.00150000"
    pub value: String,
    #[serde(rename = "scriptPubKey")]
    pub script_pubkey: VoutScript,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Tx {
    pub txid: Txid,
    pub vin: Vec<Vin>,
    pub vout: Vec<Vout>,
    // -1 while unconfirmed
    pub blockheight: i64,
    #[serde(default)]
    pub confirmations: u64,
    pub fees: Option<f64>,
}

impl Tx {
    pub fn to_record(&self, decimals: u8) -> Result<TransactionRecord, ProviderError> {
        let block_height = if self.blockheight >= 0 && self.confirmations > 0 {
            Some(self.blockheight as u32)
        } else {
            None
        };

        let inputs = self
            .vin
            .iter()
            .map(|vin| RecordInput {
                previous_output: match (vin.txid, vin.vout) {
                    (Some(txid), Some(vout)) => Some(OutPoint::new(txid, vout)),
                    _ => None,
                },
                value: vin.value_sat,
                address: vin.addr.clone(),
            })
            .collect();

        let outputs = self
            .vout
            .iter()
            .map(|vout| {
                Ok(RecordOutput {
                    value: parse_amount(&vout.value, decimals)?,
                    script: vout.script_pubkey.hex.clone(),
                    address: vout.script_pubkey.addresses.first().cloned(),
                })
            })
            .collect::<Result<Vec<_>, ProviderError>>()?;

        Ok(TransactionRecord {
            txid: self.txid,
            block_height,
            inputs,
            outputs,
            fee: self
                .fees
                .map(|fees| (fees * 10f64.powi(decimals as i32)).round() as u64),
        })
    }
}

#[derive(serde::Serialize, Clone, Debug)]
pub struct SendRequest<'a> {
    pub rawtx: &'a str,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct SendResponse {
    pub txid: String,
}

/// Convert the `/utils/estimatefee` answer, in coins per kilobyte, into per byte rates
pub fn into_utxo_fee(
    estimates: HashMap<String, f64>,
    decimals: u8,
) -> Result<UtxoFee, ProviderError> {
    let coin_per_kb = estimates
        .get(&FEE_TARGET_BLOCKS.to_string())
        .copied()
        .filter(|rate| *rate > 0.0)
        .ok_or(ProviderError::FeeEstimateUnavailable)?;

    // bumped by 10% to compensate for estimates lagging behind the mempool
    let per_byte = coin_per_kb * 10f64.powi(decimals as i32) / 1000.0 * 1.1;

    Ok(UtxoFee {
        slow: FeeRate::from_sat_per_vb_f64(per_byte),
        market: FeeRate::from_sat_per_vb_f64(per_byte * 1.2),
        priority: FeeRate::from_sat_per_vb_f64(per_byte * 1.5),
    })
}

/// Parse a decimal coin amount into minor units, without going through floats
pub fn parse_amount(value: &str, decimals: u8) -> Result<u64, ProviderError> {
    let invalid = || ProviderError::InvalidAmount(value.to_string());

    let mut parts = value.trim().splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let fraction = parts.next().unwrap_or_default();
    if (whole.is_empty() && fraction.is_empty())
        || fraction.len() > decimals as usize
        || !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }

    let unit = 10u64.checked_pow(decimals as u32).ok_or_else(invalid)?;
    let whole = if whole.is_empty() {
        0
    } else {
        whole.parse::<u64>()?
    };
    let fraction = if fraction.is_empty() {
        0
    } else {
        format!("{:0<width$}", fraction, width = decimals as usize).parse::<u64>()?
    };

    whole
        .checked_mul(unit)
        .and_then(|whole| whole.checked_add(fraction))
        .ok_or_else(invalid)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("0.00150000", 8).unwrap(), 150_000);
        assert_eq!(parse_amount("12", 8).unwrap(), 1_200_000_000);
        assert_eq!(parse_amount("1.5", 8).unwrap(), 150_000_000);
        assert_eq!(parse_amount(".1", 8).unwrap(), 10_000_000);
        assert!(parse_amount("0.000000001", 8).is_err());
        assert!(parse_amount("-1", 8).is_err());
        assert!(parse_amount("1e8", 8).is_err());
        assert!(parse_amount("", 8).is_err());
    }

    #[test]
    fn test_into_utxo_fee() {
        let estimates: HashMap<String, f64> = serde_json::from_str(r#"{"10": 0.01}"#).unwrap();

        // 0.01 RVN/kB is 1000 sat/B, bumped to 1100
        let fee = into_utxo_fee(estimates, 8).unwrap();
        assert_eq!(fee.slow.as_sat_per_vb(), 1_100);
        assert_eq!(fee.market.as_sat_per_vb(), 1_320);
        assert_eq!(fee.priority.as_sat_per_vb(), 1_650);
    }

    #[test]
    fn test_into_utxo_fee_unavailable() {
        let estimates: HashMap<String, f64> = serde_json::from_str(r#"{"10": -1}"#).unwrap();
        assert!(matches!(
            into_utxo_fee(estimates, 8),
            Err(ProviderError::FeeEstimateUnavailable)
        ));
    }

    #[test]
    fn test_utxo_confirmation() {
        let utxos: Vec<Utxo> = serde_json::from_str(
            r#"[{
                "address": "RBkHDnsXCBhbqBEF6MHxYMKBrTLrgbhcRE",
                "txid": "ebd9813ecebc57ff8f30797de7c205e3c7498ca950ea4341ee51a685ff2fa30a",
                "vout": 0,
                "scriptPubKey": "76a914000000000000000000000000000000000000000088ac",
                "amount": 0.0015,
                "satoshis": 150000,
                "height": 3000000,
                "confirmations": 12
            }, {
                "address": "RBkHDnsXCBhbqBEF6MHxYMKBrTLrgbhcRE",
                "txid": "9bec8fb9ad1b1d19b7283e10d6a63bd1fba1edc6a5e7ebbd0e0d6a0b59d3b5b0",
                "vout": 1,
                "scriptPubKey": "76a914000000000000000000000000000000000000000088ac",
                "amount": 0.0002,
                "satoshis": 20000,
                "confirmations": 0
            }]"#,
        )
        .unwrap();

        let outputs = utxos
            .iter()
            .map(Utxo::to_unspent_output)
            .collect::<Vec<_>>();
        assert_eq!(
            outputs[0].confirmation,
            Confirmation::Confirmed { height: 3_000_000 }
        );
        assert_eq!(outputs[1].confirmation, Confirmation::Unconfirmed);
        assert_eq!(outputs[1].amount, 20_000);
    }

    #[test]
    fn test_tx_to_record() {
        let tx: Tx = serde_json::from_str(
            r#"{
                "txid": "ebd9813ecebc57ff8f30797de7c205e3c7498ca950ea4341ee51a685ff2fa30a",
                "vin": [{
                    "txid": "9bec8fb9ad1b1d19b7283e10d6a63bd1fba1edc6a5e7ebbd0e0d6a0b59d3b5b0",
                    "vout": 0,
                    "addr": "RSender",
                    "valueSat": 300000
                }],
                "vout": [{
                    "value": "0.00150000",
                    "n": 0,
                    "scriptPubKey": {
                        "hex": "76a914000000000000000000000000000000000000000088ac",
                        "addresses": ["RReceiver"]
                    }
                }],
                "blockheight": -1,
                "confirmations": 0,
                "fees": 0.0000226
            }"#,
        )
        .unwrap();

        let record = tx.to_record(8).unwrap();
        assert_eq!(record.block_height, None);
        assert_eq!(record.fee, Some(2_260));
        assert!(record.is_incoming("RReceiver"));
        assert_eq!(record.received_by("RReceiver"), 150_000);
    }
}
