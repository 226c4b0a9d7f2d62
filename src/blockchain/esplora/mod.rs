//! Esplora
//!
//! This module defines a [`EsploraProvider`] struct that queries an
//! [Esplora](https://github.com/Blockstream/esplora) REST backend for unspent outputs,
//! transactions and fee estimates, and broadcasts signed transactions through it.
//!
//! ## Example
//!
//! ```no_run
//! # use bdk_utxo::blockchain::esplora::EsploraProvider;
//! let provider = EsploraProvider::new("https://blockstream.info/testnet/api");
//! # Ok::<(), bdk_utxo::Error>(())
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use bitcoin::Txid;

#[allow(unused_imports)]
use log::{debug, error, info, trace};

use ::reqwest::Client;

use self::api::{Tx, Utxo};
use crate::blockchain::*;
use crate::error::Error;
use crate::types::{TransactionRecord, UnspentOutput, UtxoFee};

mod api;

/// Structure that implements [`UtxoProvider`] on top of an Esplora server
///
/// ## Example
/// See the [`blockchain::esplora`](crate::blockchain::esplora) module for a usage example.
#[derive(Debug)]
pub struct EsploraProvider {
    url: String,
    client: Client,
}

impl EsploraProvider {
    /// Create a new instance of the client from a base URL
    pub fn new(base_url: &str) -> Self {
        EsploraProvider {
            url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    async fn _get_utxos(&self, address: &str) -> Result<Vec<Utxo>, ProviderError> {
        trace!("GET {}/address/{}/utxo", self.url, address);
        let resp = self
            .client
            .get(&format!("{}/address/{}/utxo", self.url, address))
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
            .get(&format!("{}/fee-estimates", self.url))
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
            .post(&format!("{}/tx", self.url))
            .body(raw_transaction.to_string())
            .send()
            .await?;

        parse_txid(&check_status(resp).await?.text().await?)
    }
}

#[async_trait]
impl UtxoProvider for EsploraProvider {
    fn host(&self) -> &str {
        &self.url
    }

    async fn get_unspent_outputs(&self, address: &str) -> Result<Vec<UnspentOutput>, Error> {
        let utxos = self._get_utxos(address).await?;
        let first = match utxos.first() {
            Some(first) => first,
            None => return Ok(vec![]),
        };

        // the utxo listing has no scripts, and they all share the address' script
        let script = self._get_tx(&first.txid).await?.output_script(first.vout)?;
        debug!("{} unspent outputs for {}", utxos.len(), address);

        Ok(utxos
            .into_iter()
            .map(|utxo| utxo.into_unspent_output(script.clone()))
            .collect())
    }

    async fn get_transaction_info(&self, txid: &Txid) -> Result<TransactionRecord, Error> {
        Ok(self._get_tx(txid).await?.to_record())
    }

    async fn get_fee(&self) -> Result<UtxoFee, Error> {
        let estimates = self._get_fee_estimates().await?;
        Ok(api::into_utxo_fee(estimates)?)
    }

    async fn send(&self, raw_transaction: &str) -> Result<Txid, Error> {
        let txid = self._broadcast(raw_transaction).await?;
        info!("Broadcast {} through {}", txid, self.url);
        Ok(txid)
    }
}

/// Configuration for an [`EsploraProvider`]
#[derive(Debug, serde::Deserialize, serde::Serialize, Clone, PartialEq, Eq)]
pub struct EsploraConfig {
    /// Base URL of the esplora service
    ///
    /// eg. `https://blockstream.info/api/`
    pub base_url: String,
    /// Optional URL of the proxy to use to make requests to the Esplora server
    ///
    /// The string should be formatted as: `<protocol>://<user>:<password>@host:<port>`.
    ///
    /// The proxy is ignored when targeting `wasm32`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    /// Request timeout, in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl EsploraConfig {
    /// create a config with default values given the base url
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            proxy: None,
            timeout: None,
        }
    }
}

impl ConfigurableProvider for EsploraProvider {
    type Config = EsploraConfig;

    fn from_config(config: &Self::Config) -> Result<Self, Error> {
        let mut provider = EsploraProvider::new(config.base_url.as_str());
        provider.client = build_client(config.proxy.as_deref(), config.timeout)?;

        Ok(provider)
    }
}
