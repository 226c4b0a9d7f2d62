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

use std::fmt;

use crate::blockchain::ProviderError;
use crate::network::Chain;
use crate::wallet::utils::ScriptType;

/// Errors that can be thrown while building or broadcasting a transaction
#[derive(Debug)]
pub enum Error {
    /// Generic error
    Generic(String),
    /// The destination amount is zero
    WrongAmount,
    /// No unspent output has been passed to the coin selection
    NoOutputs,
    /// An output (the destination or the computed change) would fall below the dust threshold
    DustAmount {
        /// The offending amount
        amount: u64,
        /// Dust threshold of the output script
        threshold: u64,
    },
    /// The available outputs are not enough to cover the requested amount plus fee
    InsufficientFunds {
        /// Amount needed for the transaction, fee included
        needed: u64,
        /// Amount available for spending
        available: u64,
    },
    /// The outputs could cover the payment, but no selection satisfying the size and dust rules
    /// was found within the exploration limit
    UnableToFindSuitableUtxos,
    /// The script type can't be priced on this chain
    UnsupportedScript {
        /// Chain of the size calculator
        chain: Chain,
        /// The script type that was rejected
        script_type: ScriptType,
    },
    /// Integer overflow while summing amounts or computing a fee
    Overflow,
    /// A multi provider client needs at least one provider
    NoProviders,
    /// Error returned by a network provider
    Provider(Box<ProviderError>),
    /// Error serializing or deserializing JSON data
    Json(serde_json::Error),
}

impl Error {
    /// Whether the error was raised by a network provider, and another provider may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Provider(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generic(err) => write!(f, "Generic error: {}", err),
            Self::WrongAmount => write!(f, "Destination amount must be greater than zero"),
            Self::NoOutputs => write!(f, "No unspent outputs available"),
            Self::DustAmount { amount, threshold } => write!(
                f,
                "Output of {} is below the dust threshold of {}",
                amount, threshold
            ),
            Self::InsufficientFunds { needed, available } => write!(
                f,
                "Insufficient funds: {} available of {} needed",
                available, needed
            ),
            Self::UnableToFindSuitableUtxos => {
                write!(f, "Unable to find a suitable set of unspent outputs")
            }
            Self::UnsupportedScript { chain, script_type } => write!(
                f,
                "Script type {:?} is not supported on {}",
                script_type, chain
            ),
            Self::Overflow => write!(f, "Amount overflow"),
            Self::NoProviders => write!(f, "No network providers configured"),
            Self::Provider(err) => write!(f, "Provider error: {}", err),
            Self::Json(err) => write!(f, "Serialize/Deserialize JSON error: {}", err),
        }
    }
}

impl std::error::Error for Error {}

macro_rules! impl_error {
    ( $from:ty, $to:ident ) => {
        impl_error!($from, $to, Error);
    };
    ( $from:ty, $to:ident, $impl_for:ty ) => {
        impl std::convert::From<$from> for $impl_for {
            fn from(err: $from) -> Self {
                <$impl_for>::$to(err)
            }
        }
    };
}

impl_error!(serde_json::Error, Json);

impl From<ProviderError> for Error {
    fn from(other: ProviderError) -> Self {
        Error::Provider(Box::new(other))
    }
}
