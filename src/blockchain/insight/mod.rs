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

//! Insight
//!
//! This module defines a [`InsightProvider`] struct that talks to an
//! [insight-api](https://github.com/RavenDevKit/insight-api) server, the indexer exposed by most
//! Ravencoin, Dash and Dogecoin explorers.
//!
//! Insight reports amounts as decimal coin strings and fee rates per kilobyte, so the provider
//! needs the number of decimals of the chain to convert them to minor units.
//!
//! ## Example
//!
//! ```no_run
//! # use bdk_utxo::blockchain::insight::InsightProvider;
//! # use bdk_utxo::network::Chain;
//! let provider = InsightProvider::new("https://api.ravencoin.org/api", Chain::Ravencoin);
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use bitcoin::Txid;

#[allow(unused_imports)]
use log::{debug, info, trace};

use ::reqwest::Client;

use self::api::{SendRequest, SendResponse, Tx, Utxo};
use crate::blockchain::*;
use crate::error::Error;
use crate::network::Chain;
use crate::types::{TransactionRecord, UnspentOutput, UtxoFee};

mod api;

/// Structure that implements [`UtxoProvider`] on top of an insight-api server
#[derive(Debug)]
pub struct InsightProvider {
    url: String,
    client: Client,
    decimals: u8,
}

impl InsightProvider {
    /// Create a new instance of the client from a base URL, for the given chain
    pub fn new(base_url: &str, chain: Chain) -> Self {
        InsightProvider {
            url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
            decimals: chain.params().decimals,
        }
    }

    /// Set the number of decimals used to convert coin amounts to minor units
    pub fn with_decimals(mut self, decimals: u8) -> Self {
        self.decimals = decimals;
        self
    }

    /// Number of decimals used to convert coin amounts to minor units
    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    async fn _get_utxos(&self, address: &str) -> Result<Vec<Utxo>, ProviderError> {
        trace!("GET {}/addr/{}/utxo", self.url, address);
        let resp = self
            .client
            .get(&format!("{}/addr/{}/utxo", self.url, address))
            .send()
            .await?;

        Ok(check_status(resp).await?.json::<Vec<Utxo>>().await?)
    }

    async fn _get_tx(&self, txid: &Txid) -> Result<Tx, ProviderError> {
        trace!("GET {}/tx/{}", self.url, txid);
        let resp = self
            .client
            .get(&format!("{}/tx/{}", self.url, txid))
            .send()
            .await?;

        Ok(check_tx_status(resp, txid).await?.json::<Tx>().await?)
    }

    async fn _get_fee_estimates(&self) -> Result<HashMap<String, f64>, ProviderError> {
        let resp = self
            .client
            .get(&format!("{}/utils/estimatefee", self.url))
            .query(&[("nbBlocks", api::FEE_TARGET_BLOCKS)])
            .send()
            .await?;

        Ok(check_status(resp)
            .await?
            .json::<HashMap<String, f64>>()
            .await?)
    }

    async fn _broadcast(&self, raw_transaction: &str) -> Result<Txid, ProviderError> {
        let resp = self
            .client
            .post(&format!("{}/tx/send", self.url))
            .json(&SendRequest {
                rawtx: raw_transaction,
            })
            .send()
            .await?;

        let response = check_status(resp).await?.json::<SendResponse>().await?;
        parse_txid(&response.txid)
    }
}

#[async_trait]
impl UtxoProvider for InsightProvider {
    fn host(&self) -> &str {
        &self.url
    }

    async fn get_unspent_outputs(&self, address: &str) -> Result<Vec<UnspentOutput>, Error> {
        let utxos = self._get_utxos(address).await?;
        debug!("{} unspent outputs for {}", utxos.len(), address);

        Ok(utxos.iter().map(Utxo::to_unspent_output).collect())
    }

    async fn get_transaction_info(&self, txid: &Txid) -> Result<TransactionRecord, Error> {
        Ok(self._get_tx(txid).await?.to_record(self.decimals)?)
    }

    async fn get_fee(&self) -> Result<UtxoFee, Error> {
        let estimates = self._get_fee_estimates().await?;
        Ok(api::into_utxo_fee(estimates, self.decimals)?)
    }

    async fn send(&self, raw_transaction: &str) -> Result<Txid, Error> {
        let txid = self._broadcast(raw_transaction).await?;
        info!("Broadcast {} through {}", txid, self.url);
        Ok(txid)
    }
}

/// Configuration for an [`InsightProvider`]
#[derive(Debug, serde::Deserialize, serde::Serialize, Clone, PartialEq, Eq)]
pub struct InsightConfig {
    /// Base URL of the insight-api service
    ///
    /// eg. `https://api.ravencoin.org/api`
    pub base_url: String,
    /// Optional URL of the proxy to use to make requests to the server
    ///
    /// The proxy is ignored when targeting `wasm32`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    /// Request timeout, in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Number of decimals of the chain's coin
    ///
    /// Required by [`InsightProvider::from_config`]. When the provider is built from a
    /// [`ChainConfig`](crate::blockchain::ChainConfig) it defaults to the chain's decimals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,
}

impl ConfigurableProvider for InsightProvider {
    type Config = InsightConfig;

    fn from_config(config: &Self::Config) -> Result<Self, Error> {
        let decimals = config.decimals.ok_or_else(|| {
            Error::Generic(format!(
                "Missing `decimals` for insight provider {}",
                config.base_url
            ))
        })?;

        Ok(InsightProvider {
            url: config.base_url.trim_end_matches('/').to_string(),
            client: build_client(config.proxy.as_deref(), config.timeout)?,
            decimals,
        })
    }
}
