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

//! Runtime-checked provider types
//!
//! This module provides the implementation of [`AnyProvider`] which allows switching the
//! inner [`UtxoProvider`] type at runtime.
//!
//! ## Example
//!
//! When paired with the use of [`ConfigurableProvider`], it allows creating any
//! provider type supported using a single line of code:
//!
//! ```no_run
//! # use bdk_utxo::blockchain::*;
//! # async fn run() -> Result<(), bdk_utxo::Error> {
//! let config = serde_json::from_str("...")?;
//! let provider = AnyProvider::from_config(&config)?;
//! let fee = provider.get_fee().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use bitcoin::Txid;

use super::*;
use crate::network::Chain;

macro_rules! impl_from {
    ( boxed $from:ty, $to:ty, $variant:ident ) => {
        impl From<$from> for $to {
            fn from(inner: $from) -> Self {
                <$to>::$variant(Box::new(inner))
            }
        }
    };
    ( $from:ty, $to:ty, $variant:ident ) => {
        impl From<$from> for $to {
            fn from(inner: $from) -> Self {
                <$to>::$variant(inner)
            }
        }
    };
}

macro_rules! impl_inner_method {
    ( $self:expr, $name:ident $(, $args:expr)* ) => {
        match $self {
            AnyProvider::Esplora(inner) => inner.$name( $($args, )* ).await,
            AnyProvider::Insight(inner) => inner.$name( $($args, )* ).await,
        }
    }
}

/// Type that can contain any of the [`UtxoProvider`] types defined by the library
///
/// It allows switching backend at runtime
///
/// See [this module](crate::blockchain::any)'s documentation for a usage example.
#[derive(Debug)]
pub enum AnyProvider {
    /// Esplora client
    Esplora(Box<esplora::EsploraProvider>),
    /// Insight client
    Insight(Box<insight::InsightProvider>),
}

#[async_trait]
impl UtxoProvider for AnyProvider {
    fn host(&self) -> &str {
        match self {
            AnyProvider::Esplora(inner) => inner.host(),
            AnyProvider::Insight(inner) => inner.host(),
        }
    }

    async fn get_unspent_outputs(&self, address: &str) -> Result<Vec<UnspentOutput>, Error> {
        impl_inner_method!(self, get_unspent_outputs, address)
    }

    async fn get_transaction_info(&self, txid: &Txid) -> Result<TransactionRecord, Error> {
        impl_inner_method!(self, get_transaction_info, txid)
    }

    async fn get_fee(&self) -> Result<UtxoFee, Error> {
        impl_inner_method!(self, get_fee)
    }

    async fn send(&self, raw_transaction: &str) -> Result<Txid, Error> {
        impl_inner_method!(self, send, raw_transaction)
    }
}

impl_from!(boxed esplora::EsploraProvider, AnyProvider, Esplora);
impl_from!(boxed insight::InsightProvider, AnyProvider, Insight);

/// Type that can contain any of the provider configurations defined by the library
///
/// This allows storing a single configuration that can be loaded into an [`AnyProvider`]
/// instance.
///
/// This type can be serialized from a JSON object like:
///
/// ```
/// use bdk_utxo::blockchain::{esplora::EsploraConfig, AnyProviderConfig};
/// let config: AnyProviderConfig = serde_json::from_str(
///     r#"{
///    "type" : "esplora",
///    "base_url" : "https://blockstream.info/api",
///    "timeout": 10
/// }"#,
/// )
/// .unwrap();
/// assert_eq!(
///     config,
///     AnyProviderConfig::Esplora(EsploraConfig {
///         base_url: "https://blockstream.info/api".into(),
///         proxy: None,
///         timeout: Some(10),
///     })
/// );
/// ```
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnyProviderConfig {
    /// Esplora client
    Esplora(esplora::EsploraConfig),
    /// Insight client
    Insight(insight::InsightConfig),
}

impl ConfigurableProvider for AnyProvider {
    type Config = AnyProviderConfig;

    fn from_config(config: &Self::Config) -> Result<Self, Error> {
        Ok(match config {
            AnyProviderConfig::Esplora(inner) => {
                AnyProvider::Esplora(Box::new(esplora::EsploraProvider::from_config(inner)?))
            }
            AnyProviderConfig::Insight(inner) => {
                AnyProvider::Insight(Box::new(insight::InsightProvider::from_config(inner)?))
            }
        })
    }
}

impl_from!(esplora::EsploraConfig, AnyProviderConfig, Esplora);
impl_from!(insight::InsightConfig, AnyProviderConfig, Insight);

/// Configuration of a chain and of the providers serving it, in failover order
///
/// ```
/// # use bdk_utxo::blockchain::ChainConfig;
/// # use bdk_utxo::network::Chain;
/// let config: ChainConfig = serde_json::from_str(
///     r#"{
///    "chain": "ravencoin",
///    "providers": [
///        { "type": "insight", "base_url": "https://api.ravencoin.org/api" },
///        { "type": "insight", "base_url": "https://ravencoin.network/api" }
///    ]
/// }"#,
/// )
/// .unwrap();
/// assert_eq!(config.chain, Chain::Ravencoin);
/// assert_eq!(config.providers.len(), 2);
/// ```
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    /// The chain
    pub chain: Chain,
    /// Providers, the first one is tried first
    pub providers: Vec<AnyProviderConfig>,
}

impl ChainConfig {
    /// Build the failover client described by this configuration
    pub fn build_providers(&self) -> Result<MultiProvider<AnyProvider>, Error> {
        let providers = self
            .providers
            .iter()
            .map(|config| match config {
                AnyProviderConfig::Insight(inner) if inner.decimals.is_none() => {
                    AnyProvider::from_config(&AnyProviderConfig::Insight(insight::InsightConfig {
                        decimals: Some(self.chain.params().decimals),
                        ..inner.clone()
                    }))
                }
                other => AnyProvider::from_config(other),
            })
            .collect::<Result<Vec<_>, _>>()?;

        MultiProvider::new(providers)
    }
}

#[cfg(test)]
mod test {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_build_providers() {
        let config = ChainConfig {
            chain: Chain::Bitcoin,
            providers: vec![
                esplora::EsploraConfig::new("https://blockstream.info/api/".into()).into(),
                esplora::EsploraConfig::new("https://mempool.space/api".into()).into(),
            ],
        };

        let multi = config.build_providers().unwrap();
        assert_eq!(multi.providers().len(), 2);
        assert_eq!(multi.host(), "https://blockstream.info/api");
        assert_matches!(multi.providers()[1], AnyProvider::Esplora(_));
    }

    #[test]
    fn test_insight_decimals() {
        let insight_config = |decimals| {
            AnyProviderConfig::Insight(insight::InsightConfig {
                base_url: "https://api.ravencoin.org/api".into(),
                proxy: None,
                timeout: None,
                decimals,
            })
        };
        let config = ChainConfig {
            chain: Chain::Ravencoin,
            providers: vec![insight_config(None), insight_config(Some(2))],
        };

        let multi = config.build_providers().unwrap();
        let decimals = multi
            .providers()
            .iter()
            .map(|provider| match provider {
                AnyProvider::Insight(inner) => inner.decimals(),
                other => panic!("unexpected provider {:?}", other),
            })
            .collect::<Vec<_>>();
        assert_eq!(decimals, vec![Chain::Ravencoin.params().decimals, 2]);

        // without a chain there is nothing to default to
        assert_matches!(
            AnyProvider::from_config(&insight_config(None)),
            Err(Error::Generic(_))
        );
    }

    #[test]
    fn test_empty_provider_list() {
        let config = ChainConfig {
            chain: Chain::Dash,
            providers: vec![],
        };
        assert_matches!(config.build_providers(), Err(Error::NoProviders));
    }
}
