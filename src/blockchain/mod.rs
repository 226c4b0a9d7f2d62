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

//! Blockchain backends
//!
//! This module provides the [`UtxoProvider`] trait, implemented by every backend that can list
//! the unspent outputs of an address, describe a transaction, estimate fees and broadcast a
//! signed transaction.
//!
//! The library ships two HTTP backends, [`EsploraProvider`] and [`InsightProvider`], the
//! [`AnyProvider`] enum that picks one at runtime from its configuration, and
//! [`MultiProvider`], which spreads the calls over several interchangeable providers and fails
//! over to the next one when a provider errors.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bitcoin::Txid;

use reqwest::{Response, StatusCode};

use crate::error::Error;
use crate::types::{TransactionRecord, UnspentOutput, UtxoFee};

pub mod any;
pub use self::any::{AnyProvider, AnyProviderConfig, ChainConfig};

pub mod esplora;
pub use self::esplora::{EsploraConfig, EsploraProvider};

pub mod insight;
pub use self::insight::{InsightConfig, InsightProvider};

pub mod multi;
pub use self::multi::MultiProvider;

/// Trait that defines the actions that must be supported by a network provider
#[async_trait]
pub trait UtxoProvider: Send + Sync {
    /// Host the provider talks to, used in logs
    fn host(&self) -> &str;

    /// List the unspent outputs locked to `address`
    async fn get_unspent_outputs(&self, address: &str) -> Result<Vec<UnspentOutput>, Error>;

    /// Fetch the details of a transaction
    async fn get_transaction_info(&self, txid: &Txid) -> Result<TransactionRecord, Error>;

    /// Estimate the fee rates for the slow, normal and fast confirmation targets
    async fn get_fee(&self) -> Result<UtxoFee, Error>;

    /// Broadcast a signed transaction, serialized as hex
    async fn send(&self, raw_transaction: &str) -> Result<Txid, Error>;
}

#[async_trait]
impl<T: UtxoProvider + ?Sized> UtxoProvider for Arc<T> {
    fn host(&self) -> &str {
        (**self).host()
    }

    async fn get_unspent_outputs(&self, address: &str) -> Result<Vec<UnspentOutput>, Error> {
        (**self).get_unspent_outputs(address).await
    }

    async fn get_transaction_info(&self, txid: &Txid) -> Result<TransactionRecord, Error> {
        (**self).get_transaction_info(txid).await
    }

    async fn get_fee(&self) -> Result<UtxoFee, Error> {
        (**self).get_fee().await
    }

    async fn send(&self, raw_transaction: &str) -> Result<Txid, Error> {
        (**self).send(raw_transaction).await
    }
}

/// Trait for [`UtxoProvider`] types that can be created given a configuration
pub trait ConfigurableProvider: UtxoProvider + Sized {
    /// Type that contains the configuration
    type Config: std::fmt::Debug;

    /// Create a new instance given a configuration
    fn from_config(config: &Self::Config) -> Result<Self, Error>;
}

/// Errors that can happen while talking to a network provider
#[derive(Debug)]
pub enum ProviderError {
    /// Error during reqwest HTTP request
    Reqwest(reqwest::Error),
    /// HTTP response error
    HttpResponse {
        /// Status code of the response
        status: u16,
        /// Body of the response
        message: String,
    },
    /// Invalid number returned
    Parsing(std::num::ParseIntError),
    /// Invalid amount returned
    InvalidAmount(String),
    /// Invalid transaction id returned
    InvalidTxid(String),
    /// The response doesn't contain what was asked for
    InvalidResponse(String),
    /// Transaction not found
    TransactionNotFound(Txid),
    /// The provider has no fee estimate
    FeeEstimateUnavailable,
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reqwest(err) => write!(f, "HTTP error: {}", err),
            Self::HttpResponse { status, message } => {
                write!(f, "HTTP status {}: {}", status, message)
            }
            Self::Parsing(err) => write!(f, "Invalid number: {}", err),
            Self::InvalidAmount(amount) => write!(f, "Invalid amount `{}`", amount),
            Self::InvalidTxid(txid) => write!(f, "Invalid transaction id `{}`", txid),
            Self::InvalidResponse(err) => write!(f, "Invalid response: {}", err),
            Self::TransactionNotFound(txid) => write!(f, "Transaction {} not found", txid),
            Self::FeeEstimateUnavailable => write!(f, "Fee estimate unavailable"),
        }
    }
}

impl std::error::Error for ProviderError {}

impl_error!(reqwest::Error, Reqwest, ProviderError);
impl_error!(std::num::ParseIntError, Parsing, ProviderError);

/// Turn a non-success response into a [`ProviderError::HttpResponse`]
pub(crate) async fn check_status(resp: Response) -> Result<Response, ProviderError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let message = resp.text().await.unwrap_or_default();
    Err(ProviderError::HttpResponse {
        status: status.as_u16(),
        message,
    })
}

/// Like [`check_status`], mapping `404` to [`ProviderError::TransactionNotFound`]
pub(crate) async fn check_tx_status(
    resp: Response,
    txid: &Txid,
) -> Result<Response, ProviderError> {
    if let StatusCode::NOT_FOUND = resp.status() {
        return Err(ProviderError::TransactionNotFound(*txid));
    }
    check_status(resp).await
}

pub(crate) fn parse_txid(txid: &str) -> Result<Txid, ProviderError> {
    txid.trim()
        .parse()
        .map_err(|_| ProviderError::InvalidTxid(txid.to_string()))
}

/// Build the `reqwest` client shared by the HTTP providers
pub(crate) fn build_client(
    proxy: Option<&str>,
    timeout: Option<u64>,
) -> Result<reqwest::Client, ProviderError> {
    let mut builder = reqwest::Client::builder();
    #[cfg(not(target_arch = "wasm32"))]
    if let Some(proxy) = proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy)?);
    }

    #[cfg(not(target_arch = "wasm32"))]
    if let Some(timeout) = timeout {
        builder = builder.timeout(core::time::Duration::from_secs(timeout));
    }

    Ok(builder.build()?)
}
