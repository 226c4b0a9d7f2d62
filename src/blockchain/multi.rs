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

//! Provider failover
//!
//! [`MultiProvider`] wraps an ordered list of interchangeable providers. Every call goes to the
//! current provider; when it fails the cursor moves to the next provider and the call is
//! retried, until it succeeds or every provider has been tried once. A successful provider stays
//! current for the following calls.
//!
//! ## Example
//!
//! ```no_run
//! # use bdk_utxo::blockchain::*;
//! # async fn run() -> Result<(), bdk_utxo::Error> {
//! let provider = MultiProvider::new(vec![
//!     EsploraProvider::new("https://blockstream.info/api"),
//!     EsploraProvider::new("https://mempool.space/api"),
//! ])?;
//! let fee = provider.get_fee().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bitcoin::Txid;

#[allow(unused_imports)]
use log::{debug, info, warn};

use crate::blockchain::UtxoProvider;
use crate::error::Error;
use crate::types::{TransactionRecord, UnspentOutput, UtxoFee};

/// Calls `$name` on the current provider, moving to the next one on failure
macro_rules! with_failover {
    ( $self:expr, $name:ident $(, $args:expr)* ) => {{
        let providers = &$self.providers;
        let mut index = $self.current_index();
        let mut attempts = 0;

        loop {
            let provider = &providers[index];
            match provider.$name( $($args, )* ).await {
                Ok(value) => break Ok(value),
                Err(err) => {
                    attempts += 1;
                    warn!(
                        "`{}` failed on provider {} ({}): {}",
                        stringify!($name),
                        index,
                        provider.host(),
                        err
                    );

                    let next = $self.switch_provider(index);
                    if attempts >= providers.len() {
                        break Err(err);
                    }
                    index = next;
                }
            }
        }
    }};
}

/// Failover wrapper around a list of providers
#[derive(Debug)]
pub struct MultiProvider<P> {
    providers: Vec<P>,
    current: AtomicUsize,
}

impl<P: UtxoProvider> MultiProvider<P> {
    /// Create a new instance, starting from the first provider
    pub fn new(providers: Vec<P>) -> Result<Self, Error> {
        if providers.is_empty() {
            return Err(Error::NoProviders);
        }

        Ok(MultiProvider {
            providers,
            current: AtomicUsize::new(0),
        })
    }

    /// Index of the provider the next call goes to
    pub fn current_index(&self) -> usize {
        self.current.load(Ordering::Acquire)
    }

    /// The wrapped providers
    pub fn providers(&self) -> &[P] {
        &self.providers
    }

    /// Move the cursor past the `failed` provider and return the index to retry with.
    ///
    /// The cursor is only moved if it still points to `failed`: a concurrent call that already
    /// switched provider is not overwritten.
    fn switch_provider(&self, failed: usize) -> usize {
        let next = (failed + 1) % self.providers.len();
        match self
            .current
            .compare_exchange(failed, next, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => info!(
                "Switching to provider {} ({})",
                next,
                self.providers[next].host()
            ),
            Err(current) => debug!("Provider already switched to {}", current),
        }
        next
    }
}

#[async_trait]
impl<P: UtxoProvider> UtxoProvider for MultiProvider<P> {
    fn host(&self) -> &str {
        self.providers[self.current_index()].host()
    }

    async fn get_unspent_outputs(&self, address: &str) -> Result<Vec<UnspentOutput>, Error> {
        with_failover!(self, get_unspent_outputs, address)
    }

    async fn get_transaction_info(&self, txid: &Txid) -> Result<TransactionRecord, Error> {
        with_failover!(self, get_transaction_info, txid)
    }

    async fn get_fee(&self) -> Result<UtxoFee, Error> {
        with_failover!(self, get_fee)
    }

    async fn send(&self, raw_transaction: &str) -> Result<Txid, Error> {
        with_failover!(self, send, raw_transaction)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use assert_matches::assert_matches;

    use super::*;
    use crate::blockchain::ProviderError;
    use crate::types::FeeRate;

    #[derive(Debug)]
    struct FlakyProvider {
        name: String,
        fail: bool,
        calls: AtomicUsize,
    }

    impl FlakyProvider {
        fn new(name: &str, fail: bool) -> Arc<Self> {
            Arc::new(FlakyProvider {
                name: name.to_string(),
                fail,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn respond<T>(&self, value: T) -> Result<T, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ProviderError::HttpResponse {
                    status: 503,
                    message: self.name.clone(),
                }
                .into())
            } else {
                Ok(value)
            }
        }
    }

    #[async_trait]
    impl UtxoProvider for FlakyProvider {
        fn host(&self) -> &str {
            &self.name
        }

        async fn get_unspent_outputs(&self, _address: &str) -> Result<Vec<UnspentOutput>, Error> {
            self.respond(vec![])
        }

        async fn get_transaction_info(&self, txid: &Txid) -> Result<TransactionRecord, Error> {
            self.respond(TransactionRecord {
                txid: *txid,
                block_height: None,
                inputs: vec![],
                outputs: vec![],
                fee: None,
            })
        }

        async fn get_fee(&self) -> Result<UtxoFee, Error> {
            let rate = FeeRate::from_sat_per_vb(self.name.len() as u64);
            self.respond(UtxoFee {
                slow: rate,
                market: rate,
                priority: rate,
            })
        }

        async fn send(&self, _raw_transaction: &str) -> Result<Txid, Error> {
            Err(Error::Generic("not used".to_string()))
        }
    }

    #[test]
    fn test_no_providers() {
        assert_matches!(
            MultiProvider::<Arc<FlakyProvider>>::new(vec![]),
            Err(Error::NoProviders)
        );
    }

    #[tokio::test]
    async fn test_failover_to_third_provider() {
        let providers = vec![
            FlakyProvider::new("a", true),
            FlakyProvider::new("bb", true),
            FlakyProvider::new("ccc", false),
        ];
        let multi = MultiProvider::new(providers.clone()).unwrap();

        let fee = multi.get_fee().await.unwrap();
        assert_eq!(fee.market.as_sat_per_vb(), 3);
        assert_eq!(multi.current_index(), 2);
        assert!(providers.iter().all(|p| p.calls() == 1));

        // sticky on success
        multi.get_fee().await.unwrap();
        assert_eq!(multi.current_index(), 2);
        assert_eq!(providers[0].calls(), 1);
        assert_eq!(providers[2].calls(), 2);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let providers = vec![FlakyProvider::new("a", true), FlakyProvider::new("b", true)];
        let multi = MultiProvider::new(providers.clone()).unwrap();

        let err = multi.get_unspent_outputs("address").await.unwrap_err();
        assert_matches!(
            err,
            Error::Provider(ref e) if matches!(**e, ProviderError::HttpResponse { ref message, .. } if message == "b")
        );
        assert!(err.is_transient());
        assert!(providers.iter().all(|p| p.calls() == 1));
    }

    #[test]
    fn test_switch_does_not_overwrite_concurrent_switch() {
        let providers = vec![
            FlakyProvider::new("a", false),
            FlakyProvider::new("b", false),
            FlakyProvider::new("c", false),
        ];
        let multi = MultiProvider::new(providers).unwrap();

        assert_eq!(multi.switch_provider(0), 1);
        assert_eq!(multi.current_index(), 1);
        // a stale failure of provider 0 doesn't move the cursor again
        assert_eq!(multi.switch_provider(0), 1);
        assert_eq!(multi.current_index(), 1);
        assert_eq!(multi.switch_provider(1), 2);
        assert_eq!(multi.switch_provider(2), 0);
        assert_eq!(multi.current_index(), 0);
    }
}
