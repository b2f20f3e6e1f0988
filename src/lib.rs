//! OFT Transfer - cross-chain token transfers over LayerZero V2
//!
//! Library interface for the `oft-transfer` binary and its integration tests.
//!
//! A transfer resolves two network names through the [`endpoints::EndpointDirectory`], quotes
//! the messaging fee on the source token, fixes a slippage-protected minimum amount and an
//! over-provisioned fee budget, encodes destination execution options and submits one priced
//! `send` transaction. See [`orchestrator`] for the state machine.
//!
//! Per-path security settings (libraries, confirmations, DVN quorum, executor) live in
//! [`path_config`]; they are read-only at send time.

pub mod chain;
pub mod config;
pub mod contracts;
pub mod endpoints;
pub mod error;
pub mod fees;
pub mod options;
pub mod orchestrator;
pub mod path_config;
pub mod types;

pub use chain::{AlloyConnector, ChainConnector, OftChain};
pub use config::{Config, SigningCredential, TransferSettings};
pub use endpoints::EndpointDirectory;
pub use error::TransferError;
pub use orchestrator::{
    SendCommand, TransferFailure, TransferOrchestrator, TransferReceipt, TransferState,
};
pub use path_config::{PathConfig, PathRegistry};
pub use types::{ChainEndpoint, EndpointId, FeeQuote, SendOutcome, TransferStatus};
