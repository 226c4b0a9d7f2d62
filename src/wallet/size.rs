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

//! Transaction size estimation
//!
//! Coin selection needs to know what a transaction will cost before it is signed. This module
//! provides the [`TransactionSizeCalculator`] trait, which computes the size of a transaction from
//! the script types of its inputs and outputs alone, assuming worst-case signature sizes.
//!
//! Two implementations are provided:
//!
//! * [`BitcoinSizeCalculator`] returns the virtual size in vbytes for Bitcoin and its forks. On
//!   chains without segregated witness it is the plain serialized size.
//! * [`KaspaMassCalculator`] returns the transaction mass, which is what Kaspa fee rates are
//!   expressed against.
//!
//! Both are pure functions of their arguments: the same inputs always give the same size.

use std::fmt;

use crate::error::Error;
use crate::network::NetworkParams;
use crate::wallet::utils::{varint_size, ScriptType};

/// Computes the size of a transaction, in the unit the chain's fee rates are expressed in
pub trait TransactionSizeCalculator: fmt::Debug + Send + Sync {
    /// Parameters of the chain this calculator prices
    fn network(&self) -> &NetworkParams;

    /// Size of a transaction spending `inputs` and creating `outputs`
    fn transaction_size(&self, inputs: &[ScriptType], outputs: &[ScriptType])
        -> Result<u64, Error>;

    /// Minimum value an output locked by `script` must carry to be relayed
    fn dust_threshold(&self, script: ScriptType) -> Result<u64, Error>;

    /// Size of a transaction spending `input_count` inputs of the same type
    fn estimate_size(
        &self,
        input_count: usize,
        input_type: ScriptType,
        outputs: &[ScriptType],
    ) -> Result<u64, Error> {
        self.transaction_size(&vec![input_type; input_count], outputs)
    }
}

// version (4) + nLockTime (4)
const TX_FIXED_SIZE: u64 = 4 + 4;
// outpoint (32 + 4) + nSequence (4)
const TXIN_BASE_SIZE: u64 = 32 + 4 + 4;
// output value
const TXOUT_BASE_SIZE: u64 = 8;
// segwit marker and flag, in weight units
const SEGWIT_MARKER_WEIGHT: u64 = 2;
const WITNESS_SCALE_FACTOR: u64 = 4;

// push of a DER signature with sighash (1 + 72) and of a compressed key (1 + 33)
const P2PKH_SCRIPT_SIG_SIZE: u64 = 1 + 72 + 1 + 33;
// push of the nested `OP_0 <20 bytes>` witness program
const P2SH_P2WPKH_SCRIPT_SIG_SIZE: u64 = 1 + 22;
// item count (1) + signature (1 + 72) + compressed key (1 + 33)
const P2WPKH_WITNESS_SIZE: u64 = 1 + 1 + 72 + 1 + 33;
// item count (1) + schnorr signature (1 + 64)
const P2TR_KEYSPEND_WITNESS_SIZE: u64 = 1 + 1 + 64;

/// Size calculator for Bitcoin and the chains derived from it
#[derive(Debug, Clone)]
pub struct BitcoinSizeCalculator {
    params: NetworkParams,
}

impl BitcoinSizeCalculator {
    /// Create a calculator for the given chain
    pub fn new(params: NetworkParams) -> Self {
        BitcoinSizeCalculator { params }
    }

    fn unsupported(&self, script_type: ScriptType) -> Error {
        Error::UnsupportedScript {
            chain: self.params.chain,
            script_type,
        }
    }

    fn check_witness(&self, script_type: ScriptType) -> Result<(), Error> {
        if script_type.is_witness() && !self.params.segwit {
            return Err(self.unsupported(script_type));
        }
        Ok(())
    }

    /// Returns the non-witness bytes and the witness bytes needed to spend an output
    fn input_size(&self, script_type: ScriptType) -> Result<(u64, u64), Error> {
        self.check_witness(script_type)?;

        match script_type {
            ScriptType::P2pkh => Ok((
                TXIN_BASE_SIZE + varint_size(P2PKH_SCRIPT_SIG_SIZE) + P2PKH_SCRIPT_SIG_SIZE,
                0,
            )),
            ScriptType::P2sh if self.params.segwit => Ok((
                TXIN_BASE_SIZE
                    + varint_size(P2SH_P2WPKH_SCRIPT_SIG_SIZE)
                    + P2SH_P2WPKH_SCRIPT_SIG_SIZE,
                P2WPKH_WITNESS_SIZE,
            )),
            ScriptType::P2wpkh => Ok((TXIN_BASE_SIZE + 1, P2WPKH_WITNESS_SIZE)),
            ScriptType::P2tr => Ok((TXIN_BASE_SIZE + 1, P2TR_KEYSPEND_WITNESS_SIZE)),
            other => Err(self.unsupported(other)),
        }
    }

    fn script_len(&self, script_type: ScriptType) -> Result<u64, Error> {
        self.check_witness(script_type)?;

        match script_type {
            ScriptType::P2pkh => Ok(25),
            ScriptType::P2sh => Ok(23),
            ScriptType::P2wpkh => Ok(22),
            ScriptType::P2wsh | ScriptType::P2tr => Ok(34),
            ScriptType::Other { len } => Ok(len as u64),
            other => Err(self.unsupported(other)),
        }
    }

    fn output_size(&self, script_type: ScriptType) -> Result<u64, Error> {
        let len = self.script_len(script_type)?;
        Ok(TXOUT_BASE_SIZE + varint_size(len) + len)
    }
}

impl TransactionSizeCalculator for BitcoinSizeCalculator {
    fn network(&self) -> &NetworkParams {
        &self.params
    }

    fn transaction_size(
        &self,
        inputs: &[ScriptType],
        outputs: &[ScriptType],
    ) -> Result<u64, Error> {
        let mut base = TX_FIXED_SIZE
            + varint_size(inputs.len() as u64)
            + varint_size(outputs.len() as u64);
        let mut witness = 0;
        let mut legacy_inputs = 0;

        for input in inputs {
            let (input_base, input_witness) = self.input_size(*input)?;
            base += input_base;
            witness += input_witness;
            if input_witness == 0 {
                legacy_inputs += 1;
            }
        }
        for output in outputs {
            base += self.output_size(*output)?;
        }

        if witness == 0 {
            return Ok(base);
        }

        // legacy inputs of a segwit transaction still serialize an empty witness stack
        let weight =
            base * WITNESS_SCALE_FACTOR + SEGWIT_MARKER_WEIGHT + witness + legacy_inputs;
        Ok((weight + WITNESS_SCALE_FACTOR - 1) / WITNESS_SCALE_FACTOR)
    }

    fn dust_threshold(&self, script: ScriptType) -> Result<u64, Error> {
        let output_size = self.output_size(script)?;
        // cost of spending the output later, as Bitcoin Core prices it
        let spend_size = if script.is_witness() {
            TXIN_BASE_SIZE + 1 + P2PKH_SCRIPT_SIG_SIZE / WITNESS_SCALE_FACTOR
        } else {
            TXIN_BASE_SIZE + 1 + P2PKH_SCRIPT_SIG_SIZE
        };
        let relay = self.params.dust_relay_fee * (output_size + spend_size);

        Ok(relay.max(self.params.min_dust))
    }
}

// version (2) + input and output counts (8 + 8) + lock time (8) + subnetwork id (20) + gas (8)
// + payload hash (32) + payload length (8)
const KASPA_TX_OVERHEAD_SIZE: u64 = 2 + 8 + 8 + 8 + 20 + 8 + 32 + 8;
// outpoint (32 + 4) + script length (8) + sequence (8) + sig op count (1)
const KASPA_INPUT_BASE_SIZE: u64 = 32 + 4 + 8 + 8 + 1;
// push of a 64 bytes signature plus sighash type
const KASPA_SIGNATURE_SCRIPT_SIZE: u64 = 1 + 64 + 1;
// value (8) + script version (2) + script length (8)
const KASPA_OUTPUT_BASE_SIZE: u64 = 8 + 2 + 8;

const MASS_PER_TX_BYTE: u64 = 1;
const MASS_PER_SCRIPT_PUB_KEY_BYTE: u64 = 10;
const MASS_PER_SIG_OP: u64 = 1000;

/// Mass calculator for Kaspa
#[derive(Debug, Clone)]
pub struct KaspaMassCalculator {
    params: NetworkParams,
}

impl KaspaMassCalculator {
    /// Create a calculator for the given chain
    pub fn new(params: NetworkParams) -> Self {
        KaspaMassCalculator { params }
    }

    fn unsupported(&self, script_type: ScriptType) -> Error {
        Error::UnsupportedScript {
            chain: self.params.chain,
            script_type,
        }
    }

    fn script_len(&self, script_type: ScriptType) -> Result<u64, Error> {
        match script_type {
            ScriptType::P2pkSchnorr => Ok(34),
            ScriptType::P2pkEcdsa | ScriptType::KaspaP2sh => Ok(35),
            other => Err(self.unsupported(other)),
        }
    }
}

impl TransactionSizeCalculator for KaspaMassCalculator {
    fn network(&self) -> &NetworkParams {
        &self.params
    }

    fn transaction_size(
        &self,
        inputs: &[ScriptType],
        outputs: &[ScriptType],
    ) -> Result<u64, Error> {
        let mut size = KASPA_TX_OVERHEAD_SIZE;
        let mut script_mass = 0;

        for input in inputs {
            match input {
                ScriptType::P2pkSchnorr | ScriptType::P2pkEcdsa => {
                    size += KASPA_INPUT_BASE_SIZE + KASPA_SIGNATURE_SCRIPT_SIZE
                }
                other => return Err(self.unsupported(*other)),
            }
        }
        for output in outputs {
            let len = self.script_len(*output)?;
            size += KASPA_OUTPUT_BASE_SIZE + len;
            script_mass += (2 + len) * MASS_PER_SCRIPT_PUB_KEY_BYTE;
        }

        Ok(size * MASS_PER_TX_BYTE + script_mass + inputs.len() as u64 * MASS_PER_SIG_OP)
    }

    fn dust_threshold(&self, script: ScriptType) -> Result<u64, Error> {
        self.script_len(script)?;
        Ok(self.params.min_dust)
    }
}
