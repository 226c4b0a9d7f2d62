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

//! Script helpers
//!
//! Classifies locking scripts into the shapes the size calculators know how to price. Also
//! home of the dust comparison and `CompactSize` length helpers.

use bitcoin::Script;

use serde::{Deserialize, Serialize};

const OP_DATA_32: u8 = 0x20;
const OP_DATA_33: u8 = 0x21;
const OP_CHECKSIG: u8 = 0xac;
const OP_CHECKSIG_ECDSA: u8 = 0xab;
const OP_BLAKE2B: u8 = 0xaa;
const OP_EQUAL: u8 = 0x87;

/// Standard locking script shapes
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScriptType {
    /// Pay to public key hash
    P2pkh,
    /// Pay to script hash: `OP_HASH160 <20 bytes> OP_EQUAL`. On segwit chains spending it is
    /// priced as nested P2WPKH
    P2sh,
    /// Pay to witness public key hash
    P2wpkh,
    /// Pay to witness script hash
    P2wsh,
    /// Pay to taproot, key path spend
    P2tr,
    /// Kaspa pay to schnorr public key: `OP_DATA_32 <key> OP_CHECKSIG`
    P2pkSchnorr,
    /// Kaspa pay to ECDSA public key: `OP_DATA_33 <key> OP_CHECKSIGECDSA`
    P2pkEcdsa,
    /// Kaspa pay to script hash: `OP_BLAKE2B OP_DATA_32 <hash> OP_EQUAL`
    KaspaP2sh,
    /// Any other script, only its length is known
    Other {
        /// Length of the script in bytes
        len: usize,
    },
}

impl ScriptType {
    /// Classify a locking script
    pub fn from_script(script: &Script) -> Self {
        let bytes = script.as_bytes();
        match bytes {
            [OP_DATA_32, .., OP_CHECKSIG] if bytes.len() == 34 => return ScriptType::P2pkSchnorr,
            [OP_DATA_33, .., OP_CHECKSIG_ECDSA] if bytes.len() == 35 => {
                return ScriptType::P2pkEcdsa
            }
            [OP_BLAKE2B, OP_DATA_32, .., OP_EQUAL] if bytes.len() == 35 => {
                return ScriptType::KaspaP2sh
            }
            _ => {}
        }

        if script.is_p2pkh() {
            ScriptType::P2pkh
        } else if script.is_p2sh() {
            ScriptType::P2sh
        } else if script.is_p2wpkh() {
            ScriptType::P2wpkh
        } else if script.is_p2wsh() {
            ScriptType::P2wsh
        } else if script.is_p2tr() {
            ScriptType::P2tr
        } else {
            ScriptType::Other { len: bytes.len() }
        }
    }

    /// Whether the script is a witness program
    pub fn is_witness(&self) -> bool {
        matches!(
            self,
            ScriptType::P2wpkh | ScriptType::P2wsh | ScriptType::P2tr
        )
    }
}

/// Trait to check if a value is below the dust limit.
/// We are performing dust value calculation for a given script public key using rust-bitcoin to
/// keep it compatible with network dust rate
// we implement this trait to make sure we don't mess up the comparison with off-by-one like a <
// instead of a <= etc.
pub trait IsDust {
    /// Check whether or not a value is below the given dust threshold
    fn is_dust(&self, threshold: u64) -> bool;
}

impl IsDust for u64 {
    fn is_dust(&self, threshold: u64) -> bool {
        *self < threshold
    }
}

/// Size in bytes of the Bitcoin `CompactSize` encoding of `n`
pub fn varint_size(n: u64) -> u64 {
    match n {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}
