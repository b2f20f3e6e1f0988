//! Scripted in-memory token chain for pipeline tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use tokio::sync::RwLock;

use oft_transfer::chain::{
    ChainCallError, ChainConnector, InclusionReceipt, OftChain, SendTransaction,
};
use oft_transfer::contracts::SendParam;
use oft_transfer::types::{ChainEndpoint, EndpointId, FeeQuote};
use oft_transfer::TransferError;

/// How the mock answers the receipt wait
#[derive(Clone, Debug)]
pub enum ReceiptScript {
    Confirmed { block: u64 },
    Reverted { block: u64, reason: Option<String> },
    /// Dropped from the pool: no receipt within the wait bound
    Never,
    /// Receipt RPC never answers
    Hang,
    Error(String),
}

#[derive(Clone, Debug)]
pub struct ChainScript {
    pub decimals: Result<u8, ChainCallError>,
    pub quote: Result<FeeQuote, ChainCallError>,
    pub gas_price: u128,
    pub nonce: u64,
    pub submit: Result<TxHash, ChainCallError>,
    pub receipt: ReceiptScript,
}

impl Default for ChainScript {
    fn default() -> Self {
        Self {
            decimals: Ok(18),
            quote: Ok(FeeQuote {
                native_fee: U256::from(1000),
                lz_token_fee: U256::ZERO,
            }),
            gas_price: 1_000_000_000,
            nonce: 7,
            submit: Ok(TxHash::repeat_byte(0x5e)),
            receipt: ReceiptScript::Confirmed { block: 1234 },
        }
    }
}

#[derive(Default)]
struct Recorded {
    calls: Vec<&'static str>,
    quoted: Vec<SendParam>,
    submitted: Vec<SendTransaction>,
    waited_for: Option<Duration>,
}

/// Cloning shares the recorded state.
#[derive(Clone)]
pub struct MockChain {
    script: Arc<ChainScript>,
    sender: Address,
    recorded: Arc<RwLock<Recorded>>,
}

impl MockChain {
    pub fn new(script: ChainScript) -> Self {
        Self {
            script: Arc::new(script),
            sender: Address::repeat_byte(0xf3),
            recorded: Arc::new(RwLock::new(Recorded::default())),
        }
    }

    pub async fn calls(&self) -> Vec<&'static str> {
        self.recorded.read().await.calls.clone()
    }

    pub async fn quoted(&self) -> Vec<SendParam> {
        self.recorded.read().await.quoted.clone()
    }

    pub async fn submitted(&self) -> Vec<SendTransaction> {
        self.recorded.read().await.submitted.clone()
    }

    pub async fn waited_for(&self) -> Option<Duration> {
        self.recorded.read().await.waited_for
    }

    async fn record(&self, call: &'static str) {
        self.recorded.write().await.calls.push(call);
    }
}

#[async_trait]
impl OftChain for MockChain {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn decimals(&self) -> Result<u8, ChainCallError> {
        self.record("decimals").await;
        self.script.decimals.clone()
    }

    async fn quote_send(
        &self,
        param: &SendParam,
        pay_in_lz_token: bool,
    ) -> Result<FeeQuote, ChainCallError> {
        assert!(!pay_in_lz_token, "quotes are always paid in native");
        self.record("quote_send").await;
        self.recorded.write().await.quoted.push(param.clone());
        self.script.quote.clone()
    }

    async fn gas_price(&self) -> Result<u128, ChainCallError> {
        self.record("gas_price").await;
        Ok(self.script.gas_price)
    }

    async fn nonce(&self) -> Result<u64, ChainCallError> {
        self.record("nonce").await;
        Ok(self.script.nonce)
    }

    async fn submit_send(&self, tx: &SendTransaction) -> Result<TxHash, ChainCallError> {
        self.record("submit_send").await;
        self.recorded.write().await.submitted.push(tx.clone());
        self.script.submit.clone()
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        _tx: &SendTransaction,
        timeout: Duration,
    ) -> Result<Option<InclusionReceipt>, ChainCallError> {
        self.record("wait_for_receipt").await;
        self.recorded.write().await.waited_for = Some(timeout);

        match &self.script.receipt {
            ReceiptScript::Confirmed { block } => Ok(Some(InclusionReceipt {
                tx_hash,
                block_number: Some(*block),
                success: true,
                revert_reason: None,
            })),
            ReceiptScript::Reverted { block, reason } => Ok(Some(InclusionReceipt {
                tx_hash,
                block_number: Some(*block),
                success: false,
                revert_reason: reason.clone(),
            })),
            ReceiptScript::Never => Ok(None),
            ReceiptScript::Hang => std::future::pending().await,
            ReceiptScript::Error(message) => Err(ChainCallError::new(message.clone())),
        }
    }
}

/// Hands out the same [`MockChain`] for every reachable endpoint.
#[derive(Clone)]
pub struct MockConnector {
    chain: MockChain,
    unreachable: Option<EndpointId>,
    connects: Arc<AtomicUsize>,
}

impl MockConnector {
    pub fn new(chain: MockChain) -> Self {
        Self {
            chain,
            unreachable: None,
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Connecting to `eid` fails as if the RPC were down.
    pub fn with_unreachable(mut self, eid: EndpointId) -> Self {
        self.unreachable = Some(eid);
        self
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainConnector for MockConnector {
    type Chain = MockChain;

    async fn connect(
        &self,
        endpoint: &ChainEndpoint,
        _token: Address,
    ) -> Result<MockChain, TransferError> {
        self.connects.fetch_add(1, Ordering::SeqCst);

        if self.unreachable == Some(endpoint.id) {
            return Err(TransferError::ConnectionUnavailable {
                network: endpoint.network_name.clone(),
                eid: endpoint.id,
                reason: "connection refused".to_string(),
            });
        }

        Ok(self.chain.clone())
    }
}
