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

//! Wallet
//!
//! This module defines the [`UtxoFacade`] structure, the entry point of the library: it fetches
//! the unspent outputs of an address through a [`UtxoProvider`], turns a payment into a
//! [`PreImageTransaction`] with the chain's [`CoinSelector`] and broadcasts the transaction once
//! it has been signed elsewhere.
//!
//! ## Example
//!
//! ```no_run
//! # use bdk_utxo::blockchain::ChainConfig;
//! # use bdk_utxo::bitcoin::ScriptBuf;
//! # use bdk_utxo::*;
//! # async fn run(change_script: ScriptBuf, destination_script: ScriptBuf) -> Result<(), Error> {
//! let config: ChainConfig = serde_json::from_str(
//!     r#"{
//!         "chain": "bitcoin",
//!         "providers": [
//!             { "type": "esplora", "base_url": "https://blockstream.info/api" },
//!             { "type": "esplora", "base_url": "https://mempool.space/api" }
//!         ]
//!     }"#,
//! )?;
//! let facade = UtxoFacade::from_config(&config)?;
//!
//! let fee = facade.get_fee().await?;
//! let pre_image = facade
//!     .build_pre_image(
//!         "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4",
//!         &change_script,
//!         &PreImageDestination::new(50_000, destination_script),
//!         FeePolicy::Calculate(fee.market),
//!     )
//!     .await?;
//!
//! // sign `pre_image` externally, then
//! let txid = facade.send("0200000001...").await?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;

use bitcoin::{Script, Txid};

use futures::stream::{FuturesOrdered, TryStreamExt};

#[allow(unused_imports)]
use log::{debug, info, trace};

use crate::blockchain::{AnyProvider, ChainConfig, MultiProvider, UtxoProvider};
use crate::error::Error;
use crate::network::{Chain, NetworkParams};
use crate::types::{
    FeePolicy, PreImageDestination, PreImageTransaction, TransactionRecord, UnspentOutput, UtxoFee,
    UtxoInfo,
};

pub mod coin_selection;
pub mod size;
pub mod utils;

use coin_selection::{CoinSelector, DustChangePolicy};

/// Entry point for building and broadcasting transactions on one chain
///
/// The facade owns a provider (usually a [`MultiProvider`]) and the [`CoinSelector`] of its
/// chain. It holds no other state: every call fetches fresh data from the network.
#[derive(Debug)]
pub struct UtxoFacade<P> {
    chain: Chain,
    selector: CoinSelector,
    provider: P,
}

impl<P> UtxoFacade<P>
where
    P: UtxoProvider,
{
    /// Create a new facade for `chain`, talking to the network through `provider`
    pub fn new(chain: Chain, provider: P) -> Self {
        UtxoFacade {
            chain,
            selector: CoinSelector::for_chain(chain),
            provider,
        }
    }

    /// Change how dust change is handled by [`UtxoFacade::pre_image`]
    pub fn dust_change_policy(mut self, policy: DustChangePolicy) -> Self {
        self.selector = self.selector.dust_change_policy(policy);
        self
    }

    /// Return the chain
    pub fn chain(&self) -> Chain {
        self.chain
    }

    /// Return the chain parameters
    pub fn network(&self) -> &'static NetworkParams {
        self.chain.params()
    }

    /// Return a reference to the internal provider
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Fetch the unspent outputs of `address`, together with the unconfirmed transactions that
    /// created them.
    ///
    /// The transactions are fetched concurrently. If any of them can't be fetched the whole call
    /// fails: the pending list is never partial.
    pub async fn get_info(&self, address: &str) -> Result<UtxoInfo, Error> {
        let outputs = self.provider.get_unspent_outputs(address).await?;

        let mut seen = HashSet::new();
        let pending_txids = outputs
            .iter()
            .filter(|output| !output.is_confirmed())
            .map(|output| output.outpoint.txid)
            .filter(|txid| seen.insert(*txid))
            .collect::<Vec<_>>();
        debug!(
            "{} unspent outputs, {} pending transactions for {}",
            outputs.len(),
            pending_txids.len(),
            address
        );

        let futures: FuturesOrdered<_> = pending_txids
            .iter()
            .map(|txid| self.provider.get_transaction_info(txid))
            .collect();
        let pending: Vec<TransactionRecord> = futures.try_collect().await?;

        Ok(UtxoInfo { outputs, pending })
    }

    /// Estimate the fee rates for the slow, normal and fast confirmation targets
    pub async fn get_fee(&self) -> Result<UtxoFee, Error> {
        self.provider.get_fee().await
    }

    /// Select the outputs paying `destination` and build the pre-image. See
    /// [`CoinSelector::pre_image`].
    pub fn pre_image(
        &self,
        outputs: &[UnspentOutput],
        change_script: &Script,
        destination: &PreImageDestination,
        fee_policy: FeePolicy,
    ) -> Result<PreImageTransaction, Error> {
        self.selector
            .pre_image(outputs, change_script, destination, fee_policy)
    }

    /// Fetch the spendable outputs of `address` and build a pre-image spending them
    pub async fn build_pre_image(
        &self,
        address: &str,
        change_script: &Script,
        destination: &PreImageDestination,
        fee_policy: FeePolicy,
    ) -> Result<PreImageTransaction, Error> {
        let info = self.get_info(address).await?;
        self.pre_image(
            &info.spendable_outputs(),
            change_script,
            destination,
            fee_policy,
        )
    }

    /// Broadcast a signed transaction, serialized as hex
    pub async fn send(&self, raw_transaction: &str) -> Result<Txid, Error> {
        let txid = self.provider.send(raw_transaction).await?;
        info!("Sent transaction {} on {}", txid, self.chain);
        Ok(txid)
    }
}

impl<P: UtxoProvider> UtxoFacade<MultiProvider<P>> {
    /// Create a facade failing over between `providers`, in order
    pub fn with_providers(chain: Chain, providers: Vec<P>) -> Result<Self, Error> {
        Ok(UtxoFacade::new(chain, MultiProvider::new(providers)?))
    }
}

impl UtxoFacade<MultiProvider<AnyProvider>> {
    /// Create a facade from its configuration
    pub fn from_config(config: &ChainConfig) -> Result<Self, Error> {
        Ok(UtxoFacade::new(config.chain, config.build_providers()?))
    }
}
