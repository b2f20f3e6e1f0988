//! Error types for OFT transfer orchestration
//!
//! Every failure the pipeline can end in maps to exactly one variant here, so the
//! caller decides exit codes and retry policy instead of the core.

use alloy::primitives::{Bytes, TxHash};
use thiserror::Error;

use crate::types::EndpointId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransferError {
    // ========================================================================
    // Input / Configuration Errors (fatal, never retried)
    // ========================================================================

    #[error("Unknown network: {network}")]
    UnknownNetwork { network: String },

    #[error("Invalid slippage tolerance: {bps} bps (must be in [0, 10000))")]
    InvalidSlippage { bps: u32 },

    #[error("Invalid quorum: {reason}")]
    InvalidQuorum { reason: String },

    #[error("Unsupported executor option type: {option_type}")]
    UnsupportedOptionType { option_type: u8 },

    #[error("Invalid amount '{amount}': {reason}")]
    InvalidAmount { amount: String, reason: String },

    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // ========================================================================
    // Chain Errors
    // ========================================================================

    /// Transient: the caller may retry the whole invocation.
    #[error("Connection unavailable for {network} (eid {eid}): {reason}")]
    ConnectionUnavailable {
        network: String,
        eid: EndpointId,
        reason: String,
    },

    #[error("Quote failed: {reason}")]
    QuoteFailed {
        reason: String,
        revert_data: Option<Bytes>,
    },

    #[error("Submission rejected: {reason}")]
    SubmissionRejected { reason: String },

    // ========================================================================
    // Terminal Transaction Errors
    // ========================================================================

    #[error("Transfer failed: {reason}")]
    Failed {
        reason: String,
        tx_hash: Option<TxHash>,
    },
}

impl TransferError {
    /// Reason reported when no receipt arrives within the wait bound.
    pub const NO_CONFIRMATION: &'static str = "no confirmation";

    /// Reason reported when an external deadline abandons the pipeline.
    pub const TIMEOUT: &'static str = "timeout";

    /// Only connectivity failures are worth retrying as a whole invocation.
    pub fn is_transient(&self) -> bool {
        matches!(self, TransferError::ConnectionUnavailable { .. })
    }

    /// The transaction hash already observed on chain, if the failure happened after submission.
    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            TransferError::Failed { tx_hash, .. } => *tx_hash,
            _ => None,
        }
    }

    pub fn no_confirmation(tx_hash: TxHash) -> Self {
        TransferError::Failed {
            reason: Self::NO_CONFIRMATION.to_string(),
            tx_hash: Some(tx_hash),
        }
    }

    pub fn timeout(tx_hash: Option<TxHash>) -> Self {
        TransferError::Failed {
            reason: Self::TIMEOUT.to_string(),
            tx_hash,
        }
    }

    /// Short machine-friendly kind label used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TransferError::UnknownNetwork { .. } => "unknown_network",
            TransferError::InvalidSlippage { .. } => "invalid_slippage",
            TransferError::InvalidQuorum { .. } => "invalid_quorum",
            TransferError::UnsupportedOptionType { .. } => "unsupported_option_type",
            TransferError::InvalidAmount { .. } => "invalid_amount",
            TransferError::InvalidAddress { .. } => "invalid_address",
            TransferError::InvalidConfig { .. } => "invalid_config",
            TransferError::ConnectionUnavailable { .. } => "connection_unavailable",
            TransferError::QuoteFailed { .. } => "quote_failed",
            TransferError::SubmissionRejected { .. } => "submission_rejected",
            TransferError::Failed { .. } => "failed",
        }
    }
}
