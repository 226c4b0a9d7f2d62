#![allow(unused)]
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bdk_utxo::bitcoin::{OutPoint, ScriptBuf, Txid};
use bdk_utxo::blockchain::{ProviderError, UtxoProvider};
use bdk_utxo::{
    Confirmation, Error, FeeRate, RecordInput, RecordOutput, TransactionRecord, UnspentOutput,
    UtxoFee,
};

pub const ADDRESS: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";

pub fn txid(byte: u8) -> Txid {
    Txid::from_str(&format!("{:02x}", byte).repeat(32)).unwrap()
}

pub fn p2pkh_script(byte: u8) -> ScriptBuf {
    let mut bytes = vec![0x76, 0xa9, 0x14];
    bytes.extend_from_slice(&[byte; 20]);
    bytes.extend_from_slice(&[0x88, 0xac]);
    ScriptBuf::from_bytes(bytes)
}

pub fn utxo(txid_byte: u8, vout: u32, amount: u64, height: Option<u32>) -> UnspentOutput {
    UnspentOutput {
        outpoint: OutPoint::new(txid(txid_byte), vout),
        amount,
        script: p2pkh_script(1),
        confirmation: match height {
            Some(height) => Confirmation::Confirmed { height },
            None => Confirmation::Unconfirmed,
        },
    }
}

/// A pending transaction spending `spent` and paying `amount` back to [`ADDRESS`]
pub fn pending_tx(txid_byte: u8, spent: &[OutPoint], amount: u64) -> TransactionRecord {
    TransactionRecord {
        txid: txid(txid_byte),
        block_height: None,
        inputs: spent
            .iter()
            .map(|outpoint| RecordInput {
                previous_output: Some(*outpoint),
                value: None,
                address: Some(ADDRESS.to_string()),
            })
            .collect(),
        outputs: vec![RecordOutput {
            value: amount,
            script: p2pkh_script(1),
            address: Some(ADDRESS.to_string()),
        }],
        fee: Some(1_000),
    }
}

/// In-memory provider that counts its calls
#[derive(Debug, Default)]
pub struct MockProvider {
    pub name: String,
    pub utxos: Vec<UnspentOutput>,
    pub transactions: HashMap<Txid, TransactionRecord>,
    pub fee_rate: u64,
    pub broadcast_txid: Option<Txid>,
    pub fail: AtomicBool,
    pub hang: bool,
    pub calls: AtomicUsize,
    pub tx_requests: Mutex<Vec<Txid>>,
}

impl MockProvider {
    pub fn new(name: &str) -> Self {
        MockProvider {
            name: name.to_string(),
            fee_rate: 1,
            ..Default::default()
        }
    }

    pub fn failing(name: &str) -> Self {
        let provider = MockProvider::new(name);
        provider.fail.store(true, Ordering::SeqCst);
        provider
    }

    pub fn hanging(name: &str) -> Self {
        MockProvider {
            hang: true,
            ..MockProvider::new(name)
        }
    }

    pub fn with_utxos(mut self, utxos: Vec<UnspentOutput>) -> Self {
        self.utxos = utxos;
        self
    }

    pub fn with_transaction(mut self, tx: TransactionRecord) -> Self {
        self.transactions.insert(tx.txid, tx);
        self
    }

    pub fn with_fee_rate(mut self, fee_rate: u64) -> Self {
        self.fee_rate = fee_rate;
        self
    }

    pub fn with_broadcast_txid(mut self, txid: Txid) -> Self {
        self.broadcast_txid = Some(txid);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    async fn enter(&self) -> Result<(), Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            futures::future::pending::<()>().await;
        }
        // let concurrent calls interleave
        tokio::task::yield_now().await;

        if self.fail.load(Ordering::SeqCst) {
            return Err(ProviderError::HttpResponse {
                status: 503,
                message: format!("{} is down", self.name),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl UtxoProvider for MockProvider {
    fn host(&self) -> &str {
        &self.name
    }

    async fn get_unspent_outputs(&self, _address: &str) -> Result<Vec<UnspentOutput>, Error> {
        self.enter().await?;
        Ok(self.utxos.clone())
    }

    async fn get_transaction_info(&self, txid: &Txid) -> Result<TransactionRecord, Error> {
        self.enter().await?;
        self.tx_requests.lock().unwrap().push(*txid);
        self.transactions
            .get(txid)
            .cloned()
            .ok_or_else(|| ProviderError::TransactionNotFound(*txid).into())
    }

    async fn get_fee(&self) -> Result<UtxoFee, Error> {
        self.enter().await?;
        let rate = FeeRate::from_sat_per_vb(self.fee_rate);
        Ok(UtxoFee {
            slow: rate,
            market: rate.scale(6, 5),
            priority: rate.scale(3, 2),
        })
    }

    async fn send(&self, _raw_transaction: &str) -> Result<Txid, Error> {
        self.enter().await?;
        self.broadcast_txid
            .ok_or_else(|| Error::Generic("nothing to broadcast".to_string()))
    }
}
