//! structs from the esplora API
//!
//! see: <https://github.com/Blockstream/esplora/blob/master/API.md>
use std::collections::HashMap;

use bitcoin::{OutPoint, ScriptBuf, Txid};

use crate::blockchain::ProviderError;
use crate::types::{
    Confirmation, FeeRate, RecordInput, RecordOutput, TransactionRecord, UnspentOutput, UtxoFee,
};

// confirmation targets, in blocks
const SLOW_TARGET: usize = 144;
const MARKET_TARGET: usize = 6;
const PRIORITY_TARGET: usize = 1;

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Utxo {
    pub txid: Txid,
    pub vout: u32,
    pub value: u64,
    pub status: TxStatus,
}

impl Utxo {
    pub fn into_unspent_output(self, script: ScriptBuf) -> UnspentOutput {
        UnspentOutput {
            outpoint: OutPoint::new(self.txid, self.vout),
            amount: self.value,
            script,
            confirmation: self.status.confirmation(),
        }
    }
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct PrevOut {
    pub value: u64,
    pub scriptpubkey_address: Option<String>,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Vin {
    pub txid: Txid,
    pub vout: u32,
    // None if coinbase
    pub prevout: Option<PrevOut>,
    pub is_coinbase: bool,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Vout {
    pub value: u64,
    pub scriptpubkey: ScriptBuf,
    pub scriptpubkey_address: Option<String>,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct TxStatus {
    pub confirmed: bool,
    pub block_height: Option<u32>,
}

impl TxStatus {
    pub fn confirmation(&self) -> Confirmation {
        match self {
            TxStatus {
                confirmed: true,
                block_height: Some(height),
            } => Confirmation::Confirmed { height: *height },
            _ => Confirmation::Unconfirmed,
        }
    }
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Tx {
    pub txid: Txid,
    pub vin: Vec<Vin>,
    pub vout: Vec<Vout>,
    pub status: TxStatus,
    pub fee: u64,
}

impl Tx {
    pub fn to_record(&self) -> TransactionRecord {
        TransactionRecord {
            txid: self.txid,
            block_height: match self.status.confirmation() {
                Confirmation::Confirmed { height } => Some(height),
                Confirmation::Unconfirmed => None,
            },
            inputs: self
                .vin
                .iter()
                .map(|vin| RecordInput {
                    previous_output: if vin.is_coinbase {
                        None
                    } else {
                        Some(OutPoint::new(vin.txid, vin.vout))
                    },
                    value: vin.prevout.as_ref().map(|po| po.value),
                    address: vin
                        .prevout
                        .as_ref()
                        .and_then(|po| po.scriptpubkey_address.clone()),
                })
                .collect(),
            outputs: self
                .vout
                .iter()
                .map(|vout| RecordOutput {
                    value: vout.value,
                    script: vout.scriptpubkey.clone(),
                    address: vout.scriptpubkey_address.clone(),
                })
                .collect(),
            fee: Some(self.fee),
        }
    }

    pub fn output_script(&self, vout: u32) -> Result<ScriptBuf, ProviderError> {
        self.vout
            .get(vout as usize)
            .map(|out| out.scriptpubkey.clone())
            .ok_or_else(|| {
                ProviderError::InvalidResponse(format!("{} has no output {}", self.txid, vout))
            })
    }
}

fn into_fee_rate(target: usize, estimates: &[(usize, f64)]) -> Option<FeeRate> {
    estimates
        .iter()
        .take_while(|(k, _)| k <= &target)
        .map(|(_, v)| FeeRate::from_sat_per_vb_f64(*v))
        .last()
}

/// Pick the slow, market and priority rates out of the `/fee-estimates` map
pub fn into_utxo_fee(estimates: HashMap<String, f64>) -> Result<UtxoFee, ProviderError> {
    let mut estimates = estimates
        .into_iter()
        .map(|(k, v)| Ok::<_, std::num::ParseIntError>((k.parse::<usize>()?, v)))
        .collect::<Result<Vec<_>, _>>()?;
    estimates.sort_by_key(|(k, _)| *k);

    // a target lower than every estimate falls back to the fastest one available
    let fastest = estimates
        .first()
        .map(|(_, v)| FeeRate::from_sat_per_vb_f64(*v))
        .ok_or(ProviderError::FeeEstimateUnavailable)?;
    let rate = |target| into_fee_rate(target, &estimates).unwrap_or(fastest);

    Ok(UtxoFee {
        slow: rate(SLOW_TARGET),
        market: rate(MARKET_TARGET),
        priority: rate(PRIORITY_TARGET),
    })
}
