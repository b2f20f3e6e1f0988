//! Transfer Orchestrator
//!
//! Drives one cross-chain send through a fixed, forward-only sequence of states:
//!
//! ```text
//! Resolving -> Quoting -> Bounding -> Submitting -> AwaitingConfirmation -> Confirmed
//!      \          \          \            \                  \
//!       +----------+----------+------------+------------------+--> Failed
//! ```
//!
//! The pipeline quotes once and submits once. The minimum receive amount and the fee budget
//! are fixed before submission and never revisited, however long the transaction stays
//! pending. There is no retry loop: the fee margin and the gas price multiplier, applied once,
//! are the only protection against underpricing. Every failure is logged here with the
//! addresses, amounts and endpoint ids involved and handed back to the caller as a value.

use std::fmt;
use std::time::Duration;

use alloy::primitives::{Address, Bytes, TxHash, B256, U256};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::chain::{ChainCallError, ChainConnector, OftChain, SendTransaction};
use crate::config::TransferSettings;
use crate::contracts::{MessagingFee, SendParam};
use crate::endpoints::EndpointDirectory;
use crate::error::TransferError;
use crate::fees::{
    bumped_gas_price, min_acceptable_amount, quote, safe_fee_budget, scale_amount, BPS_DENOMINATOR,
};
use crate::options::build_lz_receive_options;
use crate::path_config::PathRegistry;
use crate::types::{ChainEndpoint, FeeQuote, SendOutcome, TransferRequest};

// ============================================================================
// States
// ============================================================================

/// Pipeline state. Declaration order is the only allowed direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransferState {
    Resolving,
    Quoting,
    Bounding,
    Submitting,
    AwaitingConfirmation,
    Confirmed,
    Failed,
}

impl TransferState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferState::Resolving => "resolving",
            TransferState::Quoting => "quoting",
            TransferState::Bounding => "bounding",
            TransferState::Submitting => "submitting",
            TransferState::AwaitingConfirmation => "awaiting_confirmation",
            TransferState::Confirmed => "confirmed",
            TransferState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferState::Confirmed | TransferState::Failed)
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Records the path through the state machine and refuses to move backwards.
#[derive(Debug, Clone)]
struct StateTrail {
    visited: Vec<TransferState>,
}

impl StateTrail {
    fn start() -> Self {
        debug!(to = %TransferState::Resolving, "Transfer state");
        Self {
            visited: vec![TransferState::Resolving],
        }
    }

    fn current(&self) -> TransferState {
        self.visited
            .last()
            .copied()
            .unwrap_or(TransferState::Resolving)
    }

    fn advance(&mut self, next: TransferState) {
        let current = self.current();
        if current.is_terminal() || next <= current {
            // Unreachable with the linear pipeline below; keep the trail untouched.
            warn!(from = %current, to = %next, "Ignoring backwards state transition");
            return;
        }
        debug!(from = %current, to = %next, "Transfer state");
        self.visited.push(next);
    }
}

// ============================================================================
// Inputs and Results
// ============================================================================

/// One `send` invocation as the caller expresses it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendCommand {
    /// OFT contract on the source network
    pub token: Address,
    /// 32-byte padded recipient on the destination network
    pub recipient: B256,
    pub source_network: String,
    pub destination_network: String,
    /// Human-readable decimal amount, scaled with the token's decimals
    pub amount: String,
    pub slippage_bps: Option<u32>,
    pub execution_gas: Option<u128>,
    pub gas_limit: Option<u64>,
    /// Bound on the whole pipeline, submission and confirmation included
    pub deadline: Option<Duration>,
}

/// Values fixed during Bounding and used unchanged by the submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferBounds {
    pub min_amount_ld: U256,
    pub fee_budget: U256,
    pub options: Bytes,
}

/// A transfer that reached `Confirmed`.
#[derive(Debug, Clone)]
pub struct TransferReceipt {
    pub request: TransferRequest,
    pub quote: FeeQuote,
    pub bounds: TransferBounds,
    pub outcome: SendOutcome,
    /// Where to follow delivery on the destination side
    pub explorer_url: String,
    pub states: Vec<TransferState>,
}

impl TransferReceipt {
    pub fn tx_hash(&self) -> TxHash {
        self.outcome.tx_hash
    }
}

/// A transfer that ended in `Failed`, with whatever was learned before it failed.
#[derive(Debug, Clone, Error)]
#[error("transfer failed while {failed_in}: {error}")]
pub struct TransferFailure {
    #[source]
    pub error: TransferError,
    /// Last non-terminal state reached
    pub failed_in: TransferState,
    pub states: Vec<TransferState>,
    pub quote: Option<FeeQuote>,
    pub outcome: Option<SendOutcome>,
    pub explorer_url: Option<String>,
}

impl TransferFailure {
    /// Hash of the submitted transaction, when the failure came after submission.
    pub fn tx_hash(&self) -> Option<TxHash> {
        self.outcome
            .as_ref()
            .map(|o| o.tx_hash)
            .or_else(|| self.error.tx_hash())
    }
}

/// Partial results accumulated as the pipeline advances.
#[derive(Default)]
struct Progress {
    request: Option<TransferRequest>,
    quote: Option<FeeQuote>,
    outcome: Option<SendOutcome>,
    explorer_url: Option<String>,
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Runs transfers against read-only configuration. Holds no mutable state, so one instance can
/// drive any number of independent invocations.
pub struct TransferOrchestrator<'a, C: ChainConnector> {
    endpoints: &'a EndpointDirectory,
    paths: &'a PathRegistry,
    settings: &'a TransferSettings,
    connector: &'a C,
}

impl<'a, C: ChainConnector> TransferOrchestrator<'a, C> {
    pub fn new(
        endpoints: &'a EndpointDirectory,
        paths: &'a PathRegistry,
        settings: &'a TransferSettings,
        connector: &'a C,
    ) -> Self {
        Self {
            endpoints,
            paths,
            settings,
            connector,
        }
    }

    /// Run the whole pipeline for `command`. Exactly one of `Confirmed` or `Failed` is reached.
    pub async fn execute(&self, command: &SendCommand) -> Result<TransferReceipt, TransferFailure> {
        let mut trail = StateTrail::start();
        let mut progress = Progress::default();

        let result = match command.deadline {
            Some(deadline) => {
                let pipeline = self.run(command, &mut trail, &mut progress);
                let timed = tokio::time::timeout(deadline, pipeline).await;
                timed.unwrap_or_else(|_| Err(abandon(&mut progress, deadline)))
            }
            None => self.run(command, &mut trail, &mut progress).await,
        };

        match result {
            Ok(receipt) => Ok(receipt),
            Err(err) => {
                let failed_in = trail.current();
                trail.advance(TransferState::Failed);

                let tx_hash = progress
                    .outcome
                    .as_ref()
                    .map(|o| o.tx_hash)
                    .or_else(|| err.tx_hash());

                error!(
                    kind = err.kind(),
                    state = %failed_in,
                    token = %command.token,
                    recipient = %command.recipient,
                    source = %command.source_network,
                    destination = %command.destination_network,
                    src_eid = ?progress.request.as_ref().map(|r| r.source.id.as_u32()),
                    dst_eid = ?progress.request.as_ref().map(|r| r.destination.id.as_u32()),
                    amount = %command.amount,
                    amount_ld = ?progress.request.as_ref().map(|r| r.amount_ld),
                    native_fee = ?progress.quote.map(|q| q.native_fee),
                    tx_hash = ?tx_hash,
                    error = %err,
                    "Transfer failed"
                );

                Err(TransferFailure {
                    error: err,
                    failed_in,
                    states: trail.visited,
                    quote: progress.quote,
                    outcome: progress.outcome,
                    explorer_url: progress.explorer_url,
                })
            }
        }
    }

    async fn run(
        &self,
        command: &SendCommand,
        trail: &mut StateTrail,
        progress: &mut Progress,
    ) -> Result<TransferReceipt, TransferError> {
        // --------------------------------------------------------------------
        // Resolving: names to endpoints, no network access
        // --------------------------------------------------------------------
        let slippage_bps = command.slippage_bps.unwrap_or(self.settings.slippage_bps);
        if slippage_bps >= BPS_DENOMINATOR {
            return Err(TransferError::InvalidSlippage { bps: slippage_bps });
        }

        let source = self.endpoints.resolve(&command.source_network)?.clone();
        let destination = self.endpoints.resolve(&command.destination_network)?.clone();
        if source.id == destination.id {
            return Err(TransferError::InvalidConfig {
                reason: format!("source and destination are both {}", source),
            });
        }

        let execution_gas = self.execution_gas_for(&source, &destination, command.execution_gas)?;

        info!(
            source = %source,
            destination = %destination,
            token = %command.token,
            amount = %command.amount,
            "Starting transfer"
        );

        let chain = self
            .endpoints
            .connection(self.connector, &source, command.token)
            .await?;

        // --------------------------------------------------------------------
        // Quoting
        // --------------------------------------------------------------------
        trail.advance(TransferState::Quoting);

        let decimals = chain
            .decimals()
            .await
            .map_err(|e| read_failure(&source, "decimals()", e))?;
        let amount_ld = scale_amount(&command.amount, decimals)?;

        let request = TransferRequest {
            source: source.clone(),
            destination: destination.clone(),
            token: command.token,
            recipient: command.recipient,
            amount_ld,
            slippage_bps,
            execution_gas,
        };
        progress.request = Some(request.clone());

        // Quoted with the same min amount and options that will be sent
        let min_amount_ld = min_acceptable_amount(amount_ld, slippage_bps)?;
        let options = build_lz_receive_options(execution_gas, 0);
        let send_param = build_send_param(&request, min_amount_ld, options.clone());

        let fee_quote = quote(&chain, &send_param).await?;
        progress.quote = Some(fee_quote);

        info!(
            native_fee = %fee_quote.native_fee,
            lz_token_fee = %fee_quote.lz_token_fee,
            amount_ld = %amount_ld,
            decimals = decimals,
            "Fee quoted"
        );

        // --------------------------------------------------------------------
        // Bounding: min amount first, then fee budget; both frozen from here on
        // --------------------------------------------------------------------
        trail.advance(TransferState::Bounding);

        let fee_budget = safe_fee_budget(fee_quote.native_fee, self.settings.fee_margin_multiplier);
        let bounds = TransferBounds {
            min_amount_ld,
            fee_budget,
            options,
        };

        debug!(
            min_amount_ld = %bounds.min_amount_ld,
            fee_budget = %bounds.fee_budget,
            execution_gas = execution_gas,
            options = %bounds.options,
            "Transfer bounds fixed"
        );

        // --------------------------------------------------------------------
        // Submitting
        // --------------------------------------------------------------------
        trail.advance(TransferState::Submitting);

        let observed_gas_price = chain
            .gas_price()
            .await
            .map_err(|e| read_failure(&source, "gas price", e))?;
        let gas_price = bumped_gas_price(observed_gas_price, self.settings.gas_price_multiplier);

        // Read as late as possible to narrow the race with other submissions from this key
        let nonce = chain
            .nonce()
            .await
            .map_err(|e| read_failure(&source, "nonce", e))?;

        let tx = SendTransaction {
            token: command.token,
            send_param,
            fee: MessagingFee {
                nativeFee: bounds.fee_budget,
                lzTokenFee: U256::ZERO,
            },
            refund_address: chain.sender(),
            value: bounds.fee_budget,
            gas_price,
            nonce,
            gas_limit: command.gas_limit.unwrap_or(self.settings.gas_limit),
        };

        let tx_hash = chain
            .submit_send(&tx)
            .await
            .map_err(|e| TransferError::SubmissionRejected {
                reason: e.describe(),
            })?;

        let mut outcome = SendOutcome::pending(tx_hash);
        progress.outcome = Some(outcome.clone());
        let explorer_url = self.settings.explorer_url(source.id, tx_hash);
        progress.explorer_url = Some(explorer_url.clone());

        info!(
            tx_hash = %tx_hash,
            nonce = nonce,
            gas_price = gas_price,
            value = %tx.value,
            "Send transaction submitted"
        );

        // --------------------------------------------------------------------
        // AwaitingConfirmation
        // --------------------------------------------------------------------
        trail.advance(TransferState::AwaitingConfirmation);

        let inclusion = chain
            .wait_for_receipt(tx_hash, &tx, self.settings.confirmation_timeout)
            .await;

        match inclusion {
            Ok(Some(receipt)) if receipt.success => {
                outcome.confirm(receipt.block_number);
            }
            Ok(Some(receipt)) => {
                let reason = receipt
                    .revert_reason
                    .unwrap_or_else(|| "transaction reverted".to_string());
                outcome.fail(reason.clone(), receipt.block_number);
                progress.outcome = Some(outcome);
                return Err(TransferError::Failed {
                    reason,
                    tx_hash: Some(tx_hash),
                });
            }
            Ok(None) => {
                outcome.fail(TransferError::NO_CONFIRMATION, None);
                progress.outcome = Some(outcome);
                return Err(TransferError::no_confirmation(tx_hash));
            }
            Err(e) => {
                let reason = e.describe();
                outcome.fail(reason.clone(), None);
                progress.outcome = Some(outcome);
                return Err(TransferError::Failed {
                    reason,
                    tx_hash: Some(tx_hash),
                });
            }
        }

        trail.advance(TransferState::Confirmed);

        info!(
            tx_hash = %tx_hash,
            block = ?outcome.mined_block,
            explorer = %explorer_url,
            "Transfer confirmed on source chain"
        );

        Ok(TransferReceipt {
            request,
            quote: fee_quote,
            bounds,
            outcome,
            explorer_url,
            states: trail.visited.clone(),
        })
    }

    /// Caller override, else the configured default raised to the path's enforced gas.
    fn execution_gas_for(
        &self,
        source: &ChainEndpoint,
        destination: &ChainEndpoint,
        requested: Option<u128>,
    ) -> Result<u128, TransferError> {
        let path = self.paths.get(source.id, destination.id);

        match path {
            Some(path) => path.ensure_can_carry_value()?,
            None => debug!(
                src_eid = source.id.as_u32(),
                dst_eid = destination.id.as_u32(),
                "No path record; using configured execution gas"
            ),
        }

        if let Some(gas) = requested {
            return Ok(gas);
        }

        let enforced = path.map(|p| p.enforced_execution_gas() as u128).unwrap_or(0);
        Ok(self.settings.execution_gas.max(enforced))
    }
}

fn build_send_param(request: &TransferRequest, min_amount_ld: U256, options: Bytes) -> SendParam {
    SendParam {
        dstEid: request.destination.id.as_u32(),
        to: request.recipient,
        amountLD: request.amount_ld,
        minAmountLD: min_amount_ld,
        extraOptions: options,
        composeMsg: Bytes::new(),
        oftCmd: Bytes::new(),
    }
}

/// Deadline hit: settle a submitted transaction as failed and keep its hash.
fn abandon(progress: &mut Progress, deadline: Duration) -> TransferError {
    warn!(deadline_secs = deadline.as_secs_f64(), "Transfer deadline elapsed");

    let tx_hash = progress.outcome.as_mut().map(|outcome| {
        outcome.fail(TransferError::TIMEOUT, None);
        outcome.tx_hash
    });
    TransferError::timeout(tx_hash)
}

/// A failed read: reverts point at the contract, anything else at the connection.
fn read_failure(endpoint: &ChainEndpoint, what: &str, err: ChainCallError) -> TransferError {
    if err.revert_data.is_some() {
        TransferError::QuoteFailed {
            reason: format!("{} reverted: {}", what, err.describe()),
            revert_data: err.revert_data,
        }
    } else {
        TransferError::ConnectionUnavailable {
            network: endpoint.network_name.clone(),
            eid: endpoint.id,
            reason: format!("{}: {}", what, err.describe()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_order() {
        assert!(TransferState::Resolving < TransferState::Quoting);
        assert!(TransferState::Quoting < TransferState::Bounding);
        assert!(TransferState::Bounding < TransferState::Submitting);
        assert!(TransferState::Submitting < TransferState::AwaitingConfirmation);
        assert!(TransferState::AwaitingConfirmation < TransferState::Confirmed);
        assert!(TransferState::Confirmed.is_terminal());
        assert!(TransferState::Failed.is_terminal());
        assert!(!TransferState::Submitting.is_terminal());
    }

    #[test]
    fn test_trail_never_revisits() {
        let mut trail = StateTrail::start();
        trail.advance(TransferState::Quoting);
        trail.advance(TransferState::Resolving);
        trail.advance(TransferState::Quoting);
        trail.advance(TransferState::Bounding);

        assert_eq!(
            trail.visited,
            vec![
                TransferState::Resolving,
                TransferState::Quoting,
                TransferState::Bounding
            ]
        );
    }

    #[test]
    fn test_trail_stops_at_terminal() {
        let mut trail = StateTrail::start();
        trail.advance(TransferState::Confirmed);
        trail.advance(TransferState::Failed);

        assert_eq!(trail.current(), TransferState::Confirmed);
        assert_eq!(trail.visited.len(), 2);
    }

    #[test]
    fn test_read_failure_classification() {
        let endpoint = ChainEndpoint {
            id: crate::endpoints::EID_SEPOLIA,
            network_name: "sepolia".to_string(),
            rpc_url: String::new(),
            chain_id: None,
        };

        let err = read_failure(&endpoint, "nonce", ChainCallError::new("connection refused"));
        assert!(err.is_transient());

        let err = read_failure(
            &endpoint,
            "decimals()",
            ChainCallError::reverted("execution reverted", Bytes::new()),
        );
        assert!(matches!(err, TransferError::QuoteFailed { .. }));
    }
}
