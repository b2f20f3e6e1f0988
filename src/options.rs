//! Executor Option Builder
//!
//! Encodes destination-side execution instructions into the type-3 options blob the
//! messaging protocol's executor expects.
//!
//! ## Layout
//!
//! ```text
//! u16  options type (3)
//! per option:
//!   u8   worker id (1 = executor)
//!   u16  option size (1 + params length)
//!   u8   option type
//!   ...  params, big-endian
//! ```
//!
//! Value fields are omitted when zero, matching the on-chain option decoder.

use alloy::primitives::{Bytes, B256};

use crate::error::TransferError;

/// Options container type understood by the V2 executor
pub const OPTIONS_TYPE_3: u16 = 3;

/// Worker id of the executor
pub const EXECUTOR_WORKER_ID: u8 = 1;

/// Destination gas used when neither the caller nor the path overrides it
pub const DEFAULT_LZ_RECEIVE_GAS: u128 = 200_000;

/// Executor option types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExecutorOptionType {
    LzReceive = 1,
    NativeDrop = 2,
    LzCompose = 3,
    OrderedExecution = 4,
}

impl TryFrom<u8> for ExecutorOptionType {
    type Error = TransferError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ExecutorOptionType::LzReceive),
            2 => Ok(ExecutorOptionType::NativeDrop),
            3 => Ok(ExecutorOptionType::LzCompose),
            4 => Ok(ExecutorOptionType::OrderedExecution),
            other => Err(TransferError::UnsupportedOptionType {
                option_type: other,
            }),
        }
    }
}

/// A single executor instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorOption {
    LzReceive { gas: u128, value: u128 },
    NativeDrop { amount: u128, receiver: B256 },
    LzCompose { index: u16, gas: u128, value: u128 },
    OrderedExecution,
}

impl ExecutorOption {
    pub fn option_type(&self) -> ExecutorOptionType {
        match self {
            ExecutorOption::LzReceive { .. } => ExecutorOptionType::LzReceive,
            ExecutorOption::NativeDrop { .. } => ExecutorOptionType::NativeDrop,
            ExecutorOption::LzCompose { .. } => ExecutorOptionType::LzCompose,
            ExecutorOption::OrderedExecution => ExecutorOptionType::OrderedExecution,
        }
    }

    fn encode_params(&self) -> Vec<u8> {
        let mut params = Vec::with_capacity(48);
        match *self {
            ExecutorOption::LzReceive { gas, value } => {
                params.extend_from_slice(&gas.to_be_bytes());
                if value > 0 {
                    params.extend_from_slice(&value.to_be_bytes());
                }
            }
            ExecutorOption::NativeDrop { amount, receiver } => {
                params.extend_from_slice(&amount.to_be_bytes());
                params.extend_from_slice(receiver.as_slice());
            }
            ExecutorOption::LzCompose { index, gas, value } => {
                params.extend_from_slice(&index.to_be_bytes());
                params.extend_from_slice(&gas.to_be_bytes());
                if value > 0 {
                    params.extend_from_slice(&value.to_be_bytes());
                }
            }
            ExecutorOption::OrderedExecution => {}
        }
        params
    }
}

/// Accumulates executor options and serializes them in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionsBuilder {
    options: Vec<ExecutorOption>,
}

impl OptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_executor_option(mut self, option: ExecutorOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn add_lz_receive(self, gas: u128, value: u128) -> Self {
        self.add_executor_option(ExecutorOption::LzReceive { gas, value })
    }

    pub fn add_native_drop(self, amount: u128, receiver: B256) -> Self {
        self.add_executor_option(ExecutorOption::NativeDrop { amount, receiver })
    }

    pub fn add_lz_compose(self, index: u16, gas: u128, value: u128) -> Self {
        self.add_executor_option(ExecutorOption::LzCompose { index, gas, value })
    }

    pub fn add_ordered_execution(self) -> Self {
        self.add_executor_option(ExecutorOption::OrderedExecution)
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn build(&self) -> Bytes {
        let mut out = Vec::with_capacity(2 + self.options.len() * 52);
        out.extend_from_slice(&OPTIONS_TYPE_3.to_be_bytes());

        for option in &self.options {
            let params = option.encode_params();
            // params never exceed 48 bytes, so the size always fits in u16
            let size = (params.len() + 1) as u16;
            out.push(EXECUTOR_WORKER_ID);
            out.extend_from_slice(&size.to_be_bytes());
            out.push(option.option_type() as u8);
            out.extend_from_slice(&params);
        }

        Bytes::from(out)
    }
}

/// Encode a single execute-on-receive instruction with a destination gas budget and an
/// optional attached native value.
pub fn build_lz_receive_options(execution_gas: u128, attached_value: u128) -> Bytes {
    OptionsBuilder::new()
        .add_lz_receive(execution_gas, attached_value)
        .build()
}

/// Encode an instruction chosen by its raw type byte. Only the gas/value shaped options can be
/// expressed this way. Native drop is a known type but needs a receiver, so it is an
/// `InvalidConfig`; unknown bytes are `UnsupportedOptionType`.
pub fn build_option_by_type(
    option_type: u8,
    execution_gas: u128,
    attached_value: u128,
) -> Result<Bytes, TransferError> {
    let option = match ExecutorOptionType::try_from(option_type)? {
        ExecutorOptionType::LzReceive => ExecutorOption::LzReceive {
            gas: execution_gas,
            value: attached_value,
        },
        ExecutorOptionType::LzCompose => ExecutorOption::LzCompose {
            index: 0,
            gas: execution_gas,
            value: attached_value,
        },
        ExecutorOptionType::OrderedExecution => ExecutorOption::OrderedExecution,
        ExecutorOptionType::NativeDrop => {
            return Err(TransferError::InvalidConfig {
                reason: "native drop needs a receiver, build it with OptionsBuilder::add_native_drop"
                    .to_string(),
            })
        }
    };

    Ok(OptionsBuilder::new().add_executor_option(option).build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lz_receive_default_gas_layout() {
        let options = build_lz_receive_options(200_000, 0);

        // header 0x0003, executor worker, size 17, lzReceive, gas 200000
        assert_eq!(
            hex::encode(&options),
            "00030100110100000000000000000000000000030d40"
        );
    }

    #[test]
    fn test_lz_receive_with_value_appends_value() {
        let options = build_lz_receive_options(65_000, 1);
        let bytes = options.as_ref();

        assert_eq!(bytes.len(), 2 + 4 + 32);
        // size = 1 (type) + 16 (gas) + 16 (value)
        assert_eq!(&bytes[3..5], &33u16.to_be_bytes());
        assert_eq!(bytes[bytes.len() - 1], 1);
    }

    #[test]
    fn test_options_are_deterministic() {
        let a = build_lz_receive_options(123_456, 789);
        let b = build_lz_receive_options(123_456, 789);
        assert_eq!(a, b);

        let c = build_lz_receive_options(123_457, 789);
        assert_ne!(a, c);
    }

    #[test]
    fn test_multiple_options_concatenate() {
        let receiver = B256::repeat_byte(0x11);
        let options = OptionsBuilder::new()
            .add_lz_receive(200_000, 0)
            .add_native_drop(5, receiver)
            .add_ordered_execution()
            .build();
        let bytes = options.as_ref();

        // header + lzReceive(4 + 16) + nativeDrop(4 + 48) + ordered(4)
        assert_eq!(bytes.len(), 2 + 20 + 52 + 4);
        assert_eq!(&bytes[bytes.len() - 4..], &[1, 0, 1, 4]);
    }

    #[test]
    fn test_compose_option_layout() {
        let options = OptionsBuilder::new().add_lz_compose(2, 50_000, 0).build();
        let bytes = options.as_ref();

        assert_eq!(&bytes[3..5], &19u16.to_be_bytes());
        assert_eq!(bytes[5], ExecutorOptionType::LzCompose as u8);
        assert_eq!(&bytes[6..8], &2u16.to_be_bytes());
    }

    #[test]
    fn test_unsupported_option_type() {
        let err = build_option_by_type(9, 200_000, 0).unwrap_err();
        assert_eq!(err, TransferError::UnsupportedOptionType { option_type: 9 });

        let err = build_option_by_type(0, 200_000, 0).unwrap_err();
        assert_eq!(err, TransferError::UnsupportedOptionType { option_type: 0 });

        let ok = build_option_by_type(1, 200_000, 0).unwrap();
        assert_eq!(ok, build_lz_receive_options(200_000, 0));
    }

    #[test]
    fn test_native_drop_by_type_is_not_unsupported() {
        let err = build_option_by_type(2, 200_000, 0).unwrap_err();
        assert!(matches!(err, TransferError::InvalidConfig { .. }));
        assert!(err.to_string().contains("add_native_drop"));

        let receiver = B256::repeat_byte(0x42);
        let built = OptionsBuilder::new().add_native_drop(1, receiver).build();
        assert_eq!(&built[..6], &[0x00, 0x03, 0x01, 0x00, 0x31, 0x02]);
    }
}
