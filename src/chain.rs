//! Chain access for the token contract
//!
//! The orchestrator talks to a chain only through [`OftChain`] and obtains handles through a
//! [`ChainConnector`], so the whole pipeline runs against a scripted chain in tests. The
//! alloy-backed implementations below are what the binary uses.
//!
//! ## Features
//!
//! - Token reads (`decimals`, `quoteSend`)
//! - Gas price and nonce reads, taken immediately before signing
//! - Signed legacy submission of `send` with explicit value, gas price, nonce and gas limit
//! - Bounded receipt polling with revert replay at the inclusion block

use std::time::Duration;

use alloy::{
    contract::Error as ContractError,
    eips::BlockId,
    network::{Ethereum, EthereumWallet, TransactionBuilder},
    primitives::{Address, Bytes, TxHash, U256},
    providers::{
        fillers::{FillProvider, JoinFill, WalletFiller},
        Identity, Provider, ProviderBuilder, RootProvider,
    },
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
    sol_types::{Panic, Revert, SolCall, SolError},
    transports::{
        http::{Client, Http},
        TransportError,
    },
};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::contracts::{IOFT, MessagingFee, SendParam};
use crate::error::TransferError;
use crate::types::{ChainEndpoint, FeeQuote};

/// Provider with a wallet attached, as built by `ProviderBuilder::wallet`
pub type SignerProvider = FillProvider<
    JoinFill<Identity, WalletFiller<EthereumWallet>>,
    RootProvider<Http<Client>>,
    Http<Client>,
    Ethereum,
>;

// ============================================================================
// Call Errors and Revert Decoding
// ============================================================================

/// Failure of a single chain call, with revert bytes when the node returned them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainCallError {
    pub message: String,
    pub revert_data: Option<Bytes>,
}

impl ChainCallError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            revert_data: None,
        }
    }

    pub fn reverted(message: impl Into<String>, revert_data: Bytes) -> Self {
        Self {
            message: message.into(),
            revert_data: Some(revert_data),
        }
    }

    /// Human-readable reason: the decoded revert when available, else the raw message.
    pub fn describe(&self) -> String {
        match &self.revert_data {
            Some(data) => decode_revert(data),
            None => self.message.clone(),
        }
    }

    fn from_transport(context: &str, err: &TransportError) -> Self {
        let revert_data = err
            .as_error_resp()
            .and_then(|payload| payload.as_revert_data());
        Self {
            message: format!("{}: {}", context, err),
            revert_data,
        }
    }

    fn from_contract(context: &str, err: &ContractError) -> Self {
        match err {
            ContractError::TransportError(e) => Self::from_transport(context, e),
            other => Self::new(format!("{}: {}", context, other)),
        }
    }
}

impl std::fmt::Display for ChainCallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.describe())
    }
}

/// Decode revert bytes into readable text: the OFT custom errors, `Error(string)`,
/// `Panic(uint256)`, or the raw selector and payload as hex.
pub fn decode_revert(data: &[u8]) -> String {
    if data.is_empty() {
        return "execution reverted (no data)".to_string();
    }

    if let Ok(e) = IOFT::SlippageExceeded::abi_decode(data, true) {
        return format!(
            "SlippageExceeded(amountLD: {}, minAmountLD: {})",
            e.amountLD, e.minAmountLD
        );
    }
    if let Ok(e) = IOFT::NotEnoughNative::abi_decode(data, true) {
        return format!("NotEnoughNative(msgValue: {})", e.msgValue);
    }
    if IOFT::InvalidAmount::abi_decode(data, true).is_ok() {
        return "InvalidAmount()".to_string();
    }
    if IOFT::InvalidLocalDecimals::abi_decode(data, true).is_ok() {
        return "InvalidLocalDecimals()".to_string();
    }
    if IOFT::LzTokenUnavailable::abi_decode(data, true).is_ok() {
        return "LzTokenUnavailable()".to_string();
    }

    if let Ok(revert) = Revert::abi_decode(data, true) {
        return revert.reason;
    }
    if let Ok(panic) = Panic::abi_decode(data, true) {
        return format!("panic code {}", panic.code);
    }

    format!("custom error 0x{}", hex::encode(data))
}

// ============================================================================
// Chain Abstraction
// ============================================================================

/// Everything needed to sign and submit one `send` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendTransaction {
    pub token: Address,
    pub send_param: SendParam,
    pub fee: MessagingFee,
    pub refund_address: Address,
    /// Native value attached (the fee budget)
    pub value: U256,
    pub gas_price: u128,
    pub nonce: u64,
    pub gas_limit: u64,
}

impl SendTransaction {
    /// ABI-encoded calldata for `send(sendParam, fee, refundAddress)`
    pub fn calldata(&self) -> Bytes {
        IOFT::sendCall {
            sendParam: self.send_param.clone(),
            fee: self.fee.clone(),
            refundAddress: self.refund_address,
        }
        .abi_encode()
        .into()
    }

    pub fn to_request(&self, from: Address, chain_id: Option<u64>) -> TransactionRequest {
        let mut tx = TransactionRequest::default()
            .with_from(from)
            .with_to(self.token)
            .with_input(self.calldata())
            .with_value(self.value)
            .with_gas_price(self.gas_price)
            .with_nonce(self.nonce)
            .with_gas_limit(self.gas_limit);

        if let Some(id) = chain_id {
            tx = tx.with_chain_id(id);
        }
        tx
    }
}

/// Result of waiting on a submitted transaction's inclusion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InclusionReceipt {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub success: bool,
    /// Decoded revert reason for a mined-but-failed transaction, when recoverable
    pub revert_reason: Option<String>,
}

/// Token contract on one chain, bound to a signing account.
#[async_trait]
pub trait OftChain: Send + Sync {
    /// Address that signs and receives refunds
    fn sender(&self) -> Address;

    async fn decimals(&self) -> Result<u8, ChainCallError>;

    async fn quote_send(
        &self,
        param: &SendParam,
        pay_in_lz_token: bool,
    ) -> Result<FeeQuote, ChainCallError>;

    async fn gas_price(&self) -> Result<u128, ChainCallError>;

    /// Next nonce for the sender
    async fn nonce(&self) -> Result<u64, ChainCallError>;

    /// Sign and broadcast; returns as soon as the node accepts the transaction.
    async fn submit_send(&self, tx: &SendTransaction) -> Result<TxHash, ChainCallError>;

    /// Wait up to `timeout` for inclusion. `Ok(None)` means no receipt arrived in time.
    async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        tx: &SendTransaction,
        timeout: Duration,
    ) -> Result<Option<InclusionReceipt>, ChainCallError>;
}

/// Produces [`OftChain`] handles for endpoints.
#[async_trait]
pub trait ChainConnector: Send + Sync {
    type Chain: OftChain;

    /// Connect to `endpoint` and bind to the token at `token`. No retry here.
    async fn connect(
        &self,
        endpoint: &ChainEndpoint,
        token: Address,
    ) -> Result<Self::Chain, TransferError>;
}

// ============================================================================
// Alloy Implementation
// ============================================================================

/// Connects over HTTP JSON-RPC with a local private key signer.
pub struct AlloyConnector {
    signer: PrivateKeySigner,
    poll_interval: Duration,
}

impl AlloyConnector {
    pub fn new(signer: PrivateKeySigner, poll_interval: Duration) -> Self {
        Self {
            signer,
            poll_interval,
        }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }
}

#[async_trait]
impl ChainConnector for AlloyConnector {
    type Chain = AlloyOftChain;

    async fn connect(
        &self,
        endpoint: &ChainEndpoint,
        token: Address,
    ) -> Result<AlloyOftChain, TransferError> {
        let unavailable = |reason: String| TransferError::ConnectionUnavailable {
            network: endpoint.network_name.clone(),
            eid: endpoint.id,
            reason,
        };

        if !endpoint.has_rpc() {
            return Err(unavailable("no RPC URL configured".to_string()));
        }

        let url = endpoint
            .rpc_url
            .parse::<url::Url>()
            .map_err(|e| unavailable(format!("invalid RPC URL: {}", e)))?;

        let wallet = EthereumWallet::from(self.signer.clone());
        let provider = ProviderBuilder::new().wallet(wallet).on_http(url);

        // Reachability check; also gives us the chain id to sign with.
        let chain_id = provider
            .get_chain_id()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        if let Some(expected) = endpoint.chain_id {
            if expected != chain_id {
                warn!(
                    network = %endpoint.network_name,
                    expected = expected,
                    reported = chain_id,
                    "RPC reports a different chain id than configured"
                );
            }
        }

        info!(
            network = %endpoint.network_name,
            eid = %endpoint.id,
            chain_id = chain_id,
            token = %token,
            sender = %self.signer.address(),
            "Connected to source chain"
        );

        Ok(AlloyOftChain {
            provider,
            token,
            sender: self.signer.address(),
            chain_id,
            poll_interval: self.poll_interval,
        })
    }
}

/// OFT token bound to an alloy provider with wallet.
pub struct AlloyOftChain {
    provider: SignerProvider,
    token: Address,
    sender: Address,
    chain_id: u64,
    poll_interval: Duration,
}

impl AlloyOftChain {
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Replay a mined call at its block to recover revert data.
    async fn replay_revert(&self, tx: &SendTransaction, block_number: u64) -> Option<String> {
        let request = tx.to_request(self.sender, Some(self.chain_id));
        match self
            .provider
            .call(&request)
            .block(BlockId::number(block_number))
            .await
        {
            Ok(_) => None,
            Err(e) => {
                let err = ChainCallError::from_transport("replay", &e);
                err.revert_data.as_ref().map(|data| decode_revert(data))
            }
        }
    }
    /// Poll until the receipt shows up. Unbounded; callers apply the timeout.
    async fn poll_receipt(
        &self,
        tx_hash: TxHash,
        tx: &SendTransaction,
    ) -> Result<InclusionReceipt, ChainCallError> {
        loop {
            let receipt = self
                .provider
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(|e| ChainCallError::from_transport("Failed to get receipt", &e))?;

            if let Some(receipt) = receipt {
                let success = receipt.status();
                let revert_reason = match (success, receipt.block_number) {
                    (false, Some(block)) => self.replay_revert(tx, block).await,
                    _ => None,
                };

                return Ok(InclusionReceipt {
                    tx_hash,
                    block_number: receipt.block_number,
                    success,
                    revert_reason,
                });
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl OftChain for AlloyOftChain {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn decimals(&self) -> Result<u8, ChainCallError> {
        let oft = IOFT::new(self.token, &self.provider);
        let result = oft
            .decimals()
            .call()
            .await
            .map_err(|e| ChainCallError::from_contract("decimals() failed", &e))?;
        Ok(result._0)
    }

    async fn quote_send(
        &self,
        param: &SendParam,
        pay_in_lz_token: bool,
    ) -> Result<FeeQuote, ChainCallError> {
        let oft = IOFT::new(self.token, &self.provider);
        let result = oft
            .quoteSend(param.clone(), pay_in_lz_token)
            .call()
            .await
            .map_err(|e| ChainCallError::from_contract("quoteSend() failed", &e))?;
        Ok(FeeQuote::from(result.msgFee))
    }

    async fn gas_price(&self) -> Result<u128, ChainCallError> {
        self.provider
            .get_gas_price()
            .await
            .map_err(|e| ChainCallError::from_transport("Failed to get gas price", &e))
    }

    async fn nonce(&self) -> Result<u64, ChainCallError> {
        self.provider
            .get_transaction_count(self.sender)
            .await
            .map_err(|e| ChainCallError::from_transport("Failed to get nonce", &e))
    }

    async fn submit_send(&self, tx: &SendTransaction) -> Result<TxHash, ChainCallError> {
        let request = tx.to_request(self.sender, Some(self.chain_id));

        debug!(
            token = %tx.token,
            value = %tx.value,
            gas_price = tx.gas_price,
            nonce = tx.nonce,
            gas_limit = tx.gas_limit,
            "Submitting send transaction"
        );

        let pending = self
            .provider
            .send_transaction(request)
            .await
            .map_err(|e| ChainCallError::from_transport("Failed to send transaction", &e))?;

        Ok(*pending.tx_hash())
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        tx: &SendTransaction,
        timeout: Duration,
    ) -> Result<Option<InclusionReceipt>, ChainCallError> {
        // Bounds in-flight RPC calls as well as the sleeps
        match tokio::time::timeout(timeout, self.poll_receipt(tx_hash, tx)).await {
            Ok(result) => result.map(Some),
            Err(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, B256};

    fn sample_tx() -> SendTransaction {
        SendTransaction {
            token: address!("1111111111111111111111111111111111111111"),
            send_param: SendParam {
                dstEid: 40153,
                to: B256::repeat_byte(0x22),
                amountLD: U256::from(1000),
                minAmountLD: U256::from(980),
                extraOptions: Bytes::from(vec![0, 3]),
                composeMsg: Bytes::new(),
                oftCmd: Bytes::new(),
            },
            fee: MessagingFee {
                nativeFee: U256::from(2000),
                lzTokenFee: U256::ZERO,
            },
            refund_address: address!("3333333333333333333333333333333333333333"),
            value: U256::from(2000),
            gas_price: 2_000_000_000,
            nonce: 7,
            gas_limit: 7_000_000,
        }
    }

    #[test]
    fn test_send_calldata_selector() {
        let tx = sample_tx();
        let calldata = tx.calldata();

        assert_eq!(&calldata[..4], &IOFT::sendCall::SELECTOR);

        let decoded = IOFT::sendCall::abi_decode(&calldata, true).unwrap();
        assert_eq!(decoded.sendParam, tx.send_param);
        assert_eq!(decoded.fee, tx.fee);
        assert_eq!(decoded.refundAddress, tx.refund_address);
    }

    #[test]
    fn test_request_carries_pricing_fields() {
        let tx = sample_tx();
        let from = address!("4444444444444444444444444444444444444444");
        let request = tx.to_request(from, Some(1115));

        assert_eq!(request.from, Some(from));
        assert_eq!(request.gas_price, Some(2_000_000_000));
        assert_eq!(request.nonce, Some(7));
        assert_eq!(request.gas, Some(7_000_000));
        assert_eq!(request.value, Some(U256::from(2000)));
        assert_eq!(request.chain_id, Some(1115));
    }

    #[test]
    fn test_decode_revert_error_string() {
        // Error(string) with "insufficient balance"
        let data = hex::decode(
            "08c379a0\
             0000000000000000000000000000000000000000000000000000000000000020\
             0000000000000000000000000000000000000000000000000000000000000014\
             696e73756666696369656e742062616c616e6365000000000000000000000000",
        )
        .unwrap();

        assert!(decode_revert(&data).contains("insufficient balance"));
    }

    #[test]
    fn test_decode_revert_custom_errors() {
        let slippage = IOFT::SlippageExceeded {
            amountLD: U256::from(970),
            minAmountLD: U256::from(980),
        }
        .abi_encode();
        assert_eq!(
            decode_revert(&slippage),
            "SlippageExceeded(amountLD: 970, minAmountLD: 980)"
        );

        let native = IOFT::NotEnoughNative {
            msgValue: U256::from(5),
        }
        .abi_encode();
        assert_eq!(decode_revert(&native), "NotEnoughNative(msgValue: 5)");
    }

    #[test]
    fn test_decode_revert_unknown_and_empty() {
        assert_eq!(decode_revert(&[]), "execution reverted (no data)");
        assert_eq!(
            decode_revert(&[0xde, 0xad, 0xbe, 0xef]),
            "custom error 0xdeadbeef"
        );
    }

    #[test]
    fn test_call_error_describe_prefers_revert() {
        let plain = ChainCallError::new("connection reset");
        assert_eq!(plain.describe(), "connection reset");

        let reverted = ChainCallError::reverted(
            "quoteSend() failed",
            Bytes::from(IOFT::InvalidAmount {}.abi_encode()),
        );
        assert_eq!(reverted.describe(), "InvalidAmount()");
    }

    #[test]
    fn test_sol_structs_derive_debug_and_eq() {
        let tx = sample_tx();
        let copy = tx.send_param.clone();
        assert_eq!(copy, tx.send_param);
        assert!(format!("{:?}", copy).contains("dstEid"));
    }

    /// Accepts connections and never answers them.
    async fn silent_rpc() -> (String, tokio::task::JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        (url, handle)
    }

    #[tokio::test]
    async fn test_wait_for_receipt_bounded_when_rpc_hangs() {
        let (url, server) = silent_rpc().await;
        let wallet = EthereumWallet::from(PrivateKeySigner::from_bytes(&B256::repeat_byte(0x11)).unwrap());
        let chain = AlloyOftChain {
            provider: ProviderBuilder::new()
                .wallet(wallet)
                .on_http(url.parse().unwrap()),
            token: address!("1111111111111111111111111111111111111111"),
            sender: address!("4444444444444444444444444444444444444444"),
            chain_id: 1115,
            poll_interval: Duration::from_millis(50),
        };

        let tx = sample_tx();
        let started = std::time::Instant::now();
        let waited = tokio::time::timeout(
            Duration::from_secs(10),
            chain.wait_for_receipt(TxHash::repeat_byte(0x5e), &tx, Duration::from_millis(500)),
        )
        .await
        .expect("wait_for_receipt ignored its own bound");

        assert!(matches!(waited, Ok(None)));
        assert!(started.elapsed() < Duration::from_secs(5));
        server.abort();
    }
}
