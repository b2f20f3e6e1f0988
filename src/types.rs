//! Common types for cross-chain OFT transfers
//!
//! Endpoint identifiers, chain endpoints, quotes, requests and submission outcomes
//! shared by the directory, the fee engine and the orchestrator.

use alloy::primitives::{Address, TxHash, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::contracts::MessagingFee;
use crate::error::TransferError;

// ============================================================================
// Endpoint ID
// ============================================================================

/// LayerZero endpoint identifier (eid) of a chain within the messaging system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointId(pub u32);

impl EndpointId {
    /// Endpoint ids in the 40xxx range belong to V2 testnets.
    pub fn is_testnet(&self) -> bool {
        (40_000..50_000).contains(&self.0)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for EndpointId {
    fn from(id: u32) -> Self {
        EndpointId(id)
    }
}

// ============================================================================
// Chain Endpoint
// ============================================================================

/// A network the tool can reach: its endpoint id plus connection parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEndpoint {
    pub id: EndpointId,
    /// Network name as used on the command line (e.g. "base-sepolia")
    pub network_name: String,
    /// JSON-RPC URL; empty when the environment provides none
    pub rpc_url: String,
    /// Native EVM chain id, when known, used to sanity-check the RPC
    pub chain_id: Option<u64>,
}

impl ChainEndpoint {
    pub fn has_rpc(&self) -> bool {
        !self.rpc_url.trim().is_empty()
    }
}

impl fmt::Display for ChainEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (eid {})", self.network_name, self.id)
    }
}

// ============================================================================
// Addresses
// ============================================================================

/// Left-pad a 20-byte EVM address into the 32-byte recipient form.
pub fn pad_address(address: Address) -> B256 {
    address.into_word()
}

/// Parse a recipient given as a 20-byte EVM address or an already padded 32-byte value.
pub fn parse_recipient(input: &str) -> Result<B256, TransferError> {
    let invalid = |reason: String| TransferError::InvalidAddress {
        address: input.to_string(),
        reason,
    };

    let stripped = input.strip_prefix("0x").unwrap_or(input);
    let bytes = hex::decode(stripped).map_err(|e| invalid(e.to_string()))?;

    match bytes.len() {
        20 => Ok(pad_address(Address::from_slice(&bytes))),
        32 => Ok(B256::from_slice(&bytes)),
        len => Err(invalid(format!("expected 20 or 32 bytes, got {}", len))),
    }
}

/// Parse a 20-byte EVM address (token contracts and refund addresses).
pub fn parse_evm_address(input: &str) -> Result<Address, TransferError> {
    input.parse().map_err(|e| TransferError::InvalidAddress {
        address: input.to_string(),
        reason: format!("{}", e),
    })
}

// ============================================================================
// Quotes and Requests
// ============================================================================

/// Messaging fee returned by the token's quote entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeeQuote {
    pub native_fee: U256,
    pub lz_token_fee: U256,
}

impl From<MessagingFee> for FeeQuote {
    fn from(fee: MessagingFee) -> Self {
        Self {
            native_fee: fee.nativeFee,
            lz_token_fee: fee.lzTokenFee,
        }
    }
}

/// A fully resolved transfer, immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub source: ChainEndpoint,
    pub destination: ChainEndpoint,
    /// OFT contract on the source chain
    pub token: Address,
    pub recipient: B256,
    /// Amount in local decimals
    pub amount_ld: U256,
    pub slippage_bps: u32,
    pub execution_gas: u128,
}

// ============================================================================
// Send Outcome
// ============================================================================

/// Status of a submitted send transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferStatus {
    Pending,
    Confirmed,
    Failed,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Confirmed => "confirmed",
            TransferStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransferStatus::Pending)
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Record of a submitted transaction. Created pending, settled once by the confirmation wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    pub tx_hash: TxHash,
    pub mined_block: Option<u64>,
    pub status: TransferStatus,
    pub failure_reason: Option<String>,
}

impl SendOutcome {
    pub fn pending(tx_hash: TxHash) -> Self {
        Self {
            tx_hash,
            mined_block: None,
            status: TransferStatus::Pending,
            failure_reason: None,
        }
    }

    /// Settle as confirmed. Returns false (and changes nothing) if already terminal.
    pub fn confirm(&mut self, mined_block: Option<u64>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = TransferStatus::Confirmed;
        self.mined_block = mined_block;
        true
    }

    /// Settle as failed. Returns false (and changes nothing) if already terminal.
    pub fn fail(&mut self, reason: impl Into<String>, mined_block: Option<u64>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = TransferStatus::Failed;
        self.mined_block = mined_block;
        self.failure_reason = Some(reason.into());
        true
    }
}
