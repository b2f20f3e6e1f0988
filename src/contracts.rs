//! OFT and endpoint ABI definitions
//!
//! Uses alloy's sol! macro to generate type-safe bindings for the token entry points the
//! orchestrator calls, and for the endpoint config structs the provisioning step writes.

#![allow(clippy::too_many_arguments)]

use alloy::sol;

sol! {
    #![sol(all_derives)]

    /// Send parameters wire tuple
    struct SendParam {
        uint32 dstEid;
        bytes32 to;
        uint256 amountLD;
        uint256 minAmountLD;
        bytes extraOptions;
        bytes composeMsg;
        bytes oftCmd;
    }

    /// Fee parameters wire tuple
    struct MessagingFee {
        uint256 nativeFee;
        uint256 lzTokenFee;
    }

    struct MessagingReceipt {
        bytes32 guid;
        uint64 nonce;
        MessagingFee fee;
    }

    struct OFTReceipt {
        uint256 amountSentLD;
        uint256 amountReceivedLD;
    }

    /// OFT token interface (only the entry points this tool touches)
    #[sol(rpc)]
    interface IOFT {
        function decimals() external view returns (uint8);

        /// View call: never mutates state
        function quoteSend(SendParam calldata sendParam, bool payInLzToken)
            external view returns (MessagingFee memory msgFee);

        function send(SendParam calldata sendParam, MessagingFee calldata fee, address refundAddress)
            external payable returns (MessagingReceipt memory msgReceipt, OFTReceipt memory oftReceipt);

        // ====================================================================
        // Errors
        // ====================================================================

        error SlippageExceeded(uint256 amountLD, uint256 minAmountLD);
        error InvalidLocalDecimals();
        error InvalidAmount();
        error NotEnoughNative(uint256 msgValue);
        error LzTokenUnavailable();
    }

    // ========================================================================
    // Endpoint configuration (ULN 302)
    // ========================================================================

    /// Executor config (config type 1)
    struct ExecutorConfig {
        uint32 maxMessageSize;
        address executor;
    }

    /// ULN verification config (config type 2)
    struct UlnConfig {
        uint64 confirmations;
        uint8 requiredDVNCount;
        uint8 optionalDVNCount;
        uint8 optionalDVNThreshold;
        address[] requiredDVNs;
        address[] optionalDVNs;
    }

    struct SetConfigParam {
        uint32 eid;
        uint32 configType;
        bytes config;
    }

    interface IMessageLibManager {
        function setSendLibrary(address oapp, uint32 eid, address newLib) external;
        function setReceiveLibrary(address oapp, uint32 eid, address newLib, uint256 gracePeriod) external;
        function setConfig(address oapp, address lib, SetConfigParam[] calldata params) external;
    }
}

/// Config type tag for [`ExecutorConfig`]
pub const CONFIG_TYPE_EXECUTOR: u32 = 1;

/// Config type tag for [`UlnConfig`]
pub const CONFIG_TYPE_ULN: u32 = 2;
