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

//! Network parameters
//!
//! Every supported chain is described by a [`NetworkParams`] value that is built once, lives for
//! the whole process and is never mutated. The parameters are looked up through the [`Chain`]
//! registry, which also hands out the [`TransactionSizeCalculator`] used to price transactions on
//! that chain.
//!
//! ```
//! # use bdk_utxo::network::Chain;
//! let params = Chain::Litecoin.params();
//! assert_eq!(params.p2pkh_prefix, 0x30);
//! assert_eq!(params.coin_type, 2);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::wallet::size::{BitcoinSizeCalculator, KaspaMassCalculator, TransactionSizeCalculator};

/// UTXO chains supported by the library
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Chain {
    /// Bitcoin mainnet
    Bitcoin,
    /// Bitcoin testnet
    BitcoinTestnet,
    /// Litecoin
    Litecoin,
    /// Bitcoin Cash
    BitcoinCash,
    /// Dogecoin
    Dogecoin,
    /// Dash
    Dash,
    /// Ravencoin
    Ravencoin,
    /// Kaspa
    Kaspa,
}

impl Chain {
    /// All the supported chains
    pub const ALL: [Chain; 8] = [
        Chain::Bitcoin,
        Chain::BitcoinTestnet,
        Chain::Litecoin,
        Chain::BitcoinCash,
        Chain::Dogecoin,
        Chain::Dash,
        Chain::Ravencoin,
        Chain::Kaspa,
    ];

    /// Return the constant parameters of the chain
    pub fn params(&self) -> &'static NetworkParams {
        match self {
            Chain::Bitcoin => &BITCOIN,
            Chain::BitcoinTestnet => &BITCOIN_TESTNET,
            Chain::Litecoin => &LITECOIN,
            Chain::BitcoinCash => &BITCOIN_CASH,
            Chain::Dogecoin => &DOGECOIN,
            Chain::Dash => &DASH,
            Chain::Ravencoin => &RAVENCOIN,
            Chain::Kaspa => &KASPA,
        }
    }

    /// Return the size calculator that prices transactions on this chain
    pub fn size_calculator(&self) -> Box<dyn TransactionSizeCalculator> {
        match self {
            Chain::Kaspa => Box::new(KaspaMassCalculator::new(self.params().clone())),
            _ => Box::new(BitcoinSizeCalculator::new(self.params().clone())),
        }
    }

    /// Name of the chain, as used in configuration files
    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Bitcoin => "bitcoin",
            Chain::BitcoinTestnet => "bitcoin_testnet",
            Chain::Litecoin => "litecoin",
            Chain::BitcoinCash => "bitcoin_cash",
            Chain::Dogecoin => "dogecoin",
            Chain::Dash => "dash",
            Chain::Ravencoin => "ravencoin",
            Chain::Kaspa => "kaspa",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Chain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Chain::ALL
            .iter()
            .find(|chain| chain.as_str() == s)
            .copied()
            .ok_or_else(|| Error::Generic(format!("Unknown chain `{}`", s)))
    }
}

/// Signature hash policy used when signing inputs
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignHashType {
    /// Bitcoin `SIGHASH_ALL`
    All,
    /// `SIGHASH_ALL | SIGHASH_FORKID`, used by Bitcoin Cash
    AllForkId,
    /// Schnorr `SIGHASH_ALL` over the Kaspa sighash
    AllSchnorr,
}

impl SignHashType {
    /// The byte appended to every signature
    pub fn as_u32(&self) -> u32 {
        match self {
            SignHashType::All | SignHashType::AllSchnorr => 0x01,
            SignHashType::AllForkId => 0x41,
        }
    }
}

/// Per-chain constants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkParams {
    /// Chain described by these parameters
    pub chain: Chain,
    /// Version byte of pay-to-pubkey-hash addresses
    pub p2pkh_prefix: u8,
    /// Version byte of pay-to-script-hash addresses
    pub p2sh_prefix: u8,
    /// Human readable part of bech32/cashaddr addresses, if the chain has them
    pub bech32_prefix: Option<&'static str>,
    /// BIP-44 coin type
    pub coin_type: u32,
    /// Signature hash policy
    pub sign_hash_type: SignHashType,
    /// Dust relay fee, in minor units per virtual byte
    pub dust_relay_fee: u64,
    /// Absolute dust floor, for chains that define dust as a fixed amount
    pub min_dust: u64,
    /// Number of decimal places of the minor unit
    pub decimals: u8,
    /// Whether witness programs are valid on the chain
    pub segwit: bool,
    /// Largest standard transaction, in the unit returned by the chain's size calculator
    pub max_transaction_size: u64,
}

const BITCOIN: NetworkParams = NetworkParams {
    chain: Chain::Bitcoin,
    p2pkh_prefix: 0x00,
    p2sh_prefix: 0x05,
    bech32_prefix: Some("bc"),
    coin_type: 0,
    sign_hash_type: SignHashType::All,
    dust_relay_fee: 3,
    min_dust: 0,
    decimals: 8,
    segwit: true,
    max_transaction_size: 100_000,
};

const BITCOIN_TESTNET: NetworkParams = NetworkParams {
    chain: Chain::BitcoinTestnet,
    p2pkh_prefix: 0x6f,
    p2sh_prefix: 0xc4,
    bech32_prefix: Some("tb"),
    coin_type: 1,
    ..BITCOIN
};

const LITECOIN: NetworkParams = NetworkParams {
    chain: Chain::Litecoin,
    p2pkh_prefix: 0x30,
    p2sh_prefix: 0x32,
    bech32_prefix: Some("ltc"),
    coin_type: 2,
    ..BITCOIN
};

const BITCOIN_CASH: NetworkParams = NetworkParams {
    chain: Chain::BitcoinCash,
    bech32_prefix: Some("bitcoincash"),
    coin_type: 145,
    sign_hash_type: SignHashType::AllForkId,
    segwit: false,
    ..BITCOIN
};

const DOGECOIN: NetworkParams = NetworkParams {
    chain: Chain::Dogecoin,
    p2pkh_prefix: 0x1e,
    p2sh_prefix: 0x16,
    bech32_prefix: None,
    coin_type: 3,
    dust_relay_fee: 0,
    // 0.01 DOGE
    min_dust: 1_000_000,
    segwit: false,
    ..BITCOIN
};

const DASH: NetworkParams = NetworkParams {
    chain: Chain::Dash,
    p2pkh_prefix: 0x4c,
    p2sh_prefix: 0x10,
    bech32_prefix: None,
    coin_type: 5,
    segwit: false,
    ..BITCOIN
};

const RAVENCOIN: NetworkParams = NetworkParams {
    chain: Chain::Ravencoin,
    p2pkh_prefix: 0x3c,
    p2sh_prefix: 0x7a,
    bech32_prefix: None,
    coin_type: 175,
    segwit: false,
    ..BITCOIN
};

const KASPA: NetworkParams = NetworkParams {
    chain: Chain::Kaspa,
    // address versions: schnorr pubkey (0) and script hash (8)
    p2pkh_prefix: 0x00,
    p2sh_prefix: 0x08,
    bech32_prefix: Some("kaspa"),
    coin_type: 111_111,
    sign_hash_type: SignHashType::AllSchnorr,
    dust_relay_fee: 0,
    // 0.2 KAS
    min_dust: 20_000_000,
    decimals: 8,
    segwit: false,
    max_transaction_size: 100_000,
};
