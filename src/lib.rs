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

// only enables the `doc_cfg` feature when
// the `docsrs` configuration attribute is defined
#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]

//! A library to build transactions on UTXO chains.
//!
//! The library turns a payment ("send this amount to this script, at this fee rate") into a
//! transaction pre-image: the inputs to spend, the outputs to create and the exact fee, sized for
//! the target chain and ready to be signed by an external signer. It also provides the network
//! layer feeding it: HTTP providers for Esplora and Insight servers, and a failover client that
//! moves on to the next provider whenever one fails.
//!
//! Supported chains are listed in [`Chain`]: Bitcoin and its testnet, Litecoin, Bitcoin Cash,
//! Dogecoin, Dash, Ravencoin and Kaspa.
//!
//! ## Building a pre-image
//!
//! ```
//! # use std::str::FromStr;
//! # use bdk_utxo::bitcoin::{Address, OutPoint};
//! # use bdk_utxo::wallet::coin_selection::CoinSelector;
//! # use bdk_utxo::*;
//! let script = Address::from_str("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa")?
//!     .assume_checked()
//!     .script_pubkey();
//! let utxos = vec![UnspentOutput {
//!     outpoint: OutPoint::null(),
//!     amount: 80_000,
//!     script: script.clone(),
//!     confirmation: Confirmation::Unconfirmed,
//! }];
//!
//! let pre_image = CoinSelector::for_chain(Chain::Bitcoin).pre_image(
//!     &utxos,
//!     &script,
//!     &PreImageDestination::new(50_000, script.clone()),
//!     FeePolicy::Exact(1_000),
//! )?;
//! assert_eq!(pre_image.change_amount, 29_000);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Talking to the network
//!
//! See [`UtxoFacade`] and the [`blockchain`] module.
//!
//! ## Logging
//!
//! The library logs through the [`log`](https://docs.rs/log) facade. Install any logger to see
//! provider failovers (`warn`) and coin selection decisions (`debug`).

pub extern crate bitcoin;
extern crate log;
pub extern crate reqwest;
extern crate serde;
extern crate serde_json;

#[macro_use]
pub(crate) mod error;
pub mod blockchain;
pub mod network;
pub(crate) mod types;
pub mod wallet;

pub use error::Error;
pub use network::{Chain, NetworkParams, SignHashType};
pub use types::*;
pub use wallet::coin_selection::{CoinSelector, DustChangePolicy};
pub use wallet::size::TransactionSizeCalculator;
pub use wallet::utils::ScriptType;
pub use wallet::UtxoFacade;
