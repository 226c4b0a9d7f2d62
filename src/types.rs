// Bitcoin Dev Kit
// Written in 2020 by Alekos Filini <alekos.filini@gmail.com>
//
// Copyright (c) 2020-2021 Bitcoin Dev Kit Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

use bitcoin::{OutPoint, ScriptBuf, Txid};

use serde::{Deserialize, Serialize};

use crate::wallet::utils::ScriptType;

/// Fee rate
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
// Internally stored as minor units per (virtual) byte
pub struct FeeRate(u64);

impl FeeRate {
    /// Create a new instance of [`FeeRate`] given a rate in minor units per byte
    pub const fn from_sat_per_vb(sat_per_vb: u64) -> Self {
        FeeRate(sat_per_vb)
    }

    /// Create a new instance of [`FeeRate`] given a rate in whole coins per kilobyte, as most
    /// node and indexer APIs report it. The result is rounded up and never goes below the
    /// minimum relay fee.
    pub fn from_coin_per_kvb(coin_per_kvb: f64, decimals: u8) -> Self {
        let per_byte = coin_per_kvb * 10f64.powi(decimals as i32) / 1000.0;
        FeeRate::from_sat_per_vb_f64(per_byte)
    }

    /// Create a new [`FeeRate`] from a fractional rate, rounding up and clamping to the minimum
    /// relay fee
    pub fn from_sat_per_vb_f64(sat_per_vb: f64) -> Self {
        if !sat_per_vb.is_finite() || sat_per_vb <= 1.0 {
            return FeeRate::default_min_relay_fee();
        }
        FeeRate(sat_per_vb.ceil() as u64)
    }

    /// Create a new [`FeeRate`] with the default min relay fee value
    pub const fn default_min_relay_fee() -> Self {
        FeeRate(1)
    }

    /// Return the value as minor units per byte
    pub fn as_sat_per_vb(&self) -> u64 {
        self.0
    }

    /// Scale the rate by `numerator / denominator`, rounding up
    pub fn scale(&self, numerator: u64, denominator: u64) -> Self {
        let denominator = denominator.max(1) as u128;
        let scaled = (self.0 as u128 * numerator as u128 + denominator - 1) / denominator;
        FeeRate(scaled.min(u64::MAX as u128) as u64)
    }

    /// Fee owed by a transaction of `size` bytes, or `None` on overflow
    pub fn fee_for_size(&self, size: u64) -> Option<u64> {
        self.0.checked_mul(size)
    }
}

impl std::default::Default for FeeRate {
    fn default() -> Self {
        FeeRate::default_min_relay_fee()
    }
}

/// How the fee of a pre-image is decided
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeePolicy {
    /// Pay exactly this absolute fee, whatever the final size
    Exact(u64),
    /// Pay `rate * size` for the final transaction size
    Calculate(FeeRate),
}

impl FeePolicy {
    /// Fee owed by a transaction of `size`, or `None` on overflow
    pub fn fee_for_size(&self, size: u64) -> Option<u64> {
        match self {
            FeePolicy::Exact(fee) => Some(*fee),
            FeePolicy::Calculate(rate) => rate.fee_for_size(size),
        }
    }
}

/// Confirmation status of an unspent output
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Confirmation {
    /// Included in a block at this height
    Confirmed {
        /// Height of the block
        height: u32,
    },
    /// Still in the mempool
    Unconfirmed,
}

/// An unspent output as reported by a network provider
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnspentOutput {
    /// Reference to the output
    pub outpoint: OutPoint,
    /// Value in minor units
    pub amount: u64,
    /// Locking script
    pub script: ScriptBuf,
    /// Confirmation status
    pub confirmation: Confirmation,
}

impl UnspentOutput {
    /// Whether the output is included in a block
    pub fn is_confirmed(&self) -> bool {
        matches!(self.confirmation, Confirmation::Confirmed { .. })
    }

    /// Classify the locking script
    pub fn script_type(&self) -> ScriptType {
        ScriptType::from_script(&self.script)
    }
}

/// Recipient of a pre-image
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PreImageDestination {
    /// Amount to send, in minor units
    pub amount: u64,
    /// Locking script of the recipient
    pub script: ScriptBuf,
}

impl PreImageDestination {
    /// Create a new destination
    pub fn new(amount: u64, script: ScriptBuf) -> Self {
        PreImageDestination { amount, script }
    }
}

/// Output of a pre-image, in the order it must be serialized
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreImageOutput {
    /// The payment
    Destination {
        /// Locking script of the recipient
        script: ScriptBuf,
        /// Amount sent
        amount: u64,
    },
    /// The change going back to the sender
    Change {
        /// Locking script of the change
        script: ScriptBuf,
        /// Amount returned
        amount: u64,
    },
}

/// Result of coin selection: everything the signer needs to build the transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreImageTransaction {
    /// Inputs to spend, in input order
    pub selected_outputs: Vec<UnspentOutput>,
    /// Amount paid to the destination
    pub destination_amount: u64,
    /// Locking script of the destination
    pub destination_script: ScriptBuf,
    /// Amount returned as change, `0` if the transaction has no change output
    pub change_amount: u64,
    /// Locking script used for the change output
    pub change_script: ScriptBuf,
    /// Absolute fee
    pub fee: u64,
    /// Size of the transaction, as computed by the chain's size calculator
    pub estimated_size: u64,
}

impl PreImageTransaction {
    /// Sum of the selected inputs
    pub fn input_amount(&self) -> u64 {
        self.selected_outputs.iter().map(|o| o.amount).sum()
    }

    /// Whether a change output is present
    pub fn has_change(&self) -> bool {
        self.change_amount > 0
    }

    /// Outputs to serialize: the destination first, then the change if any
    pub fn outputs(&self) -> Vec<PreImageOutput> {
        let mut outputs = vec![PreImageOutput::Destination {
            script: self.destination_script.clone(),
            amount: self.destination_amount,
        }];
        if self.has_change() {
            outputs.push(PreImageOutput::Change {
                script: self.change_script.clone(),
                amount: self.change_amount,
            });
        }
        outputs
    }
}

/// Input of a [`TransactionRecord`]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RecordInput {
    /// Output being spent, `None` for coinbase inputs
    pub previous_output: Option<OutPoint>,
    /// Value of the spent output, when the provider reports it
    pub value: Option<u64>,
    /// Address of the spent output, when the provider reports it
    pub address: Option<String>,
}

/// Output of a [`TransactionRecord`]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RecordOutput {
    /// Value in minor units
    pub value: u64,
    /// Locking script
    pub script: ScriptBuf,
    /// Address of the output, when the provider reports it
    pub address: Option<String>,
}

/// A transaction as reported by a network provider
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    /// Transaction id
    pub txid: Txid,
    /// Height of the including block, `None` while in the mempool
    pub block_height: Option<u32>,
    /// Inputs
    pub inputs: Vec<RecordInput>,
    /// Outputs
    pub outputs: Vec<RecordOutput>,
    /// Fee paid, when the provider reports it
    pub fee: Option<u64>,
}

impl TransactionRecord {
    /// Whether the transaction is included in a block
    pub fn is_confirmed(&self) -> bool {
        self.block_height.is_some()
    }

    /// Whether one of the inputs spends `outpoint`
    pub fn spends(&self, outpoint: &OutPoint) -> bool {
        self.inputs
            .iter()
            .any(|input| input.previous_output.as_ref() == Some(outpoint))
    }

    /// Whether the transaction pays `address` without spending from it
    pub fn is_incoming(&self, address: &str) -> bool {
        !self
            .inputs
            .iter()
            .any(|input| input.address.as_deref() == Some(address))
    }

    /// Total value of the outputs paying `address`
    pub fn received_by(&self, address: &str) -> u64 {
        self.outputs
            .iter()
            .filter(|output| output.address.as_deref() == Some(address))
            .map(|output| output.value)
            .sum()
    }
}

/// Fee rates for the three confirmation targets
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub struct UtxoFee {
    /// Rate for a slow confirmation
    pub slow: FeeRate,
    /// Rate for a normal confirmation
    pub market: FeeRate,
    /// Rate for a fast confirmation
    pub priority: FeeRate,
}

/// Unspent outputs of an address together with its pending transactions
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct UtxoInfo {
    /// Every unspent output reported by the provider
    pub outputs: Vec<UnspentOutput>,
    /// Unconfirmed transactions that created one of the unspent outputs
    pub pending: Vec<TransactionRecord>,
}

impl UtxoInfo {
    /// Outputs that are not already spent by one of the pending transactions
    pub fn spendable_outputs(&self) -> Vec<UnspentOutput> {
        self.outputs
            .iter()
            .filter(|output| !self.pending.iter().any(|tx| tx.spends(&output.outpoint)))
            .cloned()
            .collect()
    }

    /// Sum of all the unspent outputs
    pub fn balance(&self) -> u64 {
        self.outputs.iter().map(|o| o.amount).sum()
    }
}
