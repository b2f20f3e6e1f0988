//! Fee & Slippage Engine
//!
//! Integer-only arithmetic for the minimum receive amount, the over-provisioned native fee
//! and the bumped gas price, plus the dry-run quote against the token contract.

use alloy::primitives::{
    utils::{parse_units, ParseUnits},
    U256,
};
use tracing::debug;

use crate::chain::OftChain;
use crate::contracts::SendParam;
use crate::error::TransferError;
use crate::types::FeeQuote;

/// Basis points in 100%
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Default slippage tolerance (2%)
pub const DEFAULT_SLIPPAGE_BPS: u32 = 200;

/// Default over-provision of the quoted native fee
pub const DEFAULT_FEE_MARGIN: u32 = 2;

/// Default multiplier over the observed gas price
pub const DEFAULT_GAS_PRICE_MULTIPLIER: u32 = 2;

/// Minimum amount the recipient must receive, in local decimals.
///
/// `amount * (10000 - bps) / 10000`, rounded down. The amount is split into
/// `q * 10000 + r` so the product never overflows `U256`.
pub fn min_acceptable_amount(amount_ld: U256, slippage_bps: u32) -> Result<U256, TransferError> {
    if slippage_bps >= BPS_DENOMINATOR {
        return Err(TransferError::InvalidSlippage { bps: slippage_bps });
    }

    let denominator = U256::from(BPS_DENOMINATOR);
    let keep = U256::from(BPS_DENOMINATOR - slippage_bps);

    let quotient = amount_ld / denominator;
    let remainder = amount_ld % denominator;

    Ok(quotient * keep + remainder * keep / denominator)
}

/// Native fee actually attached to the send: the quote times the margin.
///
/// The excess is refunded on chain to the refund address.
pub fn safe_fee_budget(quoted_fee: U256, margin_multiplier: u32) -> U256 {
    quoted_fee.saturating_mul(U256::from(margin_multiplier))
}

/// Gas price to submit with: the observed price times the multiplier.
pub fn bumped_gas_price(observed_gas_price: u128, multiplier: u32) -> u128 {
    observed_gas_price.saturating_mul(multiplier as u128)
}

/// Scale a human-readable decimal string into integer units of the token.
pub fn scale_amount(amount: &str, decimals: u8) -> Result<U256, TransferError> {
    let invalid = |reason: String| TransferError::InvalidAmount {
        amount: amount.to_string(),
        reason,
    };

    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return Err(invalid("amount is empty".to_string()));
    }
    if trimmed.starts_with('-') {
        return Err(invalid("amount must not be negative".to_string()));
    }

    let scaled = match parse_units(trimmed, decimals).map_err(|e| invalid(e.to_string()))? {
        ParseUnits::U256(value) => value,
        ParseUnits::I256(_) => return Err(invalid("amount must not be negative".to_string())),
    };

    if scaled.is_zero() {
        return Err(invalid("amount must be greater than zero".to_string()));
    }

    Ok(scaled)
}

/// Ask the token for the messaging fee of `param`. The call is a view call and never
/// mutates state; a revert surfaces as `QuoteFailed` with decoded revert data when present.
pub async fn quote<C: OftChain + ?Sized>(
    chain: &C,
    param: &SendParam,
) -> Result<FeeQuote, TransferError> {
    let quote = chain
        .quote_send(param, false)
        .await
        .map_err(|e| TransferError::QuoteFailed {
            reason: e.describe(),
            revert_data: e.revert_data.clone(),
        })?;

    debug!(
        native_fee = %quote.native_fee,
        lz_token_fee = %quote.lz_token_fee,
        dst_eid = param.dstEid,
        "Received fee quote"
    );

    Ok(quote)
}
