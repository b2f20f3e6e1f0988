//! Security Path Configuration
//!
//! One record per directional pathway `from -> to`: which message libraries are used, how
//! many source confirmations are required, which verifiers (DVNs) must attest, and which
//! executor delivers. Records are authored once, validated on construction and never
//! mutated afterwards; the orchestrator only reads them.
//!
//! A record also encodes the `setConfig` parameters the one-time provisioning step writes
//! to the endpoint (executor config and ULN config), though nothing here submits them.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use alloy::primitives::{address, Address, Bytes, U256};
use alloy::sol_types::{SolCall, SolValue};
use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};

use crate::contracts::{
    ExecutorConfig, IMessageLibManager, SetConfigParam, UlnConfig, CONFIG_TYPE_EXECUTOR,
    CONFIG_TYPE_ULN,
};
use crate::endpoints::{EID_BASE_SEPOLIA, EID_COREDAO_TESTNET, EID_SEPOLIA};
use crate::error::TransferError;
use crate::types::EndpointId;

/// Default executor message size cap (bytes)
pub const DEFAULT_MAX_MESSAGE_SIZE: u32 = 10_000;

/// Most verifiers the ULN accepts in either set; counts travel as `uint8`
pub const MAX_VERIFIER_COUNT: usize = 127;

fn default_max_message_size() -> u32 {
    DEFAULT_MAX_MESSAGE_SIZE
}

/// Raw, unvalidated path record as authored in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathConfigParams {
    pub from: EndpointId,
    pub to: EndpointId,
    pub send_library: Address,
    pub receive_library: Address,
    /// Blocks the previous receive library stays valid after a switch
    #[serde(default)]
    pub receive_library_grace_period: u64,
    pub send_confirmations: u64,
    pub receive_confirmations: u64,
    /// Every one of these must attest
    pub required_verifiers: BTreeSet<Address>,
    #[serde(default)]
    pub optional_verifiers: BTreeSet<Address>,
    /// How many of the optional verifiers must also attest
    #[serde(default)]
    pub optional_verifier_threshold: u8,
    pub executor: Address,
    #[serde(default = "default_max_message_size")]
    pub max_message_size: u32,
    /// Gas the OApp enforces for lzReceive on this path (0 = none)
    #[serde(default)]
    pub enforced_execution_gas: u64,
}

/// Effective verifier quorum of a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quorum {
    pub required_count: usize,
    pub optional_count: usize,
    pub optional_threshold: u8,
}

impl Quorum {
    /// Minimum number of distinct attestations before a message is accepted
    pub fn min_attestations(&self) -> usize {
        self.required_count + self.optional_threshold as usize
    }
}

/// A validated path record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PathConfigParams", into = "PathConfigParams")]
pub struct PathConfig {
    params: PathConfigParams,
}

impl TryFrom<PathConfigParams> for PathConfig {
    type Error = TransferError;

    fn try_from(params: PathConfigParams) -> Result<Self, Self::Error> {
        PathConfig::new(params)
    }
}

impl From<PathConfig> for PathConfigParams {
    fn from(config: PathConfig) -> Self {
        config.params
    }
}

impl PathConfig {
    /// Validate and wrap a record. Fails with `InvalidQuorum` when either verifier set holds
    /// more than [`MAX_VERIFIER_COUNT`] entries or the optional threshold exceeds the number of
    /// optional verifiers.
    pub fn new(params: PathConfigParams) -> Result<Self, TransferError> {
        for (kind, count) in [
            ("required", params.required_verifiers.len()),
            ("optional", params.optional_verifiers.len()),
        ] {
            if count > MAX_VERIFIER_COUNT {
                return Err(TransferError::InvalidQuorum {
                    reason: format!(
                        "path {} -> {}: {} {} verifiers, at most {} allowed",
                        params.from, params.to, count, kind, MAX_VERIFIER_COUNT
                    ),
                });
            }
        }

        let optional = params.optional_verifiers.len();
        if params.optional_verifier_threshold as usize > optional {
            return Err(TransferError::InvalidQuorum {
                reason: format!(
                    "path {} -> {}: optional threshold {} exceeds {} optional verifiers",
                    params.from, params.to, params.optional_verifier_threshold, optional
                ),
            });
        }

        Ok(Self { params })
    }

    pub fn params(&self) -> &PathConfigParams {
        &self.params
    }

    pub fn from(&self) -> EndpointId {
        self.params.from
    }

    pub fn to(&self) -> EndpointId {
        self.params.to
    }

    pub fn enforced_execution_gas(&self) -> u64 {
        self.params.enforced_execution_gas
    }

    pub fn effective_quorum(&self) -> Quorum {
        Quorum {
            required_count: self.params.required_verifiers.len(),
            optional_count: self.params.optional_verifiers.len(),
            optional_threshold: self.params.optional_verifier_threshold,
        }
    }

    /// A path that moves value needs at least one required verifier.
    pub fn ensure_can_carry_value(&self) -> Result<(), TransferError> {
        if self.params.required_verifiers.is_empty() {
            return Err(TransferError::InvalidQuorum {
                reason: format!(
                    "path {} -> {} has no required verifiers",
                    self.params.from, self.params.to
                ),
            });
        }
        Ok(())
    }

    // =========================================================================
    // Provisioning Parameters
    // =========================================================================

    fn uln_config(&self, confirmations: u64) -> UlnConfig {
        // BTreeSet iteration is ascending, which the ULN requires
        UlnConfig {
            confirmations,
            requiredDVNCount: self.params.required_verifiers.len() as u8,
            optionalDVNCount: self.params.optional_verifiers.len() as u8,
            optionalDVNThreshold: self.params.optional_verifier_threshold,
            requiredDVNs: self.params.required_verifiers.iter().copied().collect(),
            optionalDVNs: self.params.optional_verifiers.iter().copied().collect(),
        }
    }

    /// `setConfig` params for the send library: executor (type 1) then ULN (type 2).
    pub fn send_config_params(&self) -> Vec<SetConfigParam> {
        let executor = ExecutorConfig {
            maxMessageSize: self.params.max_message_size,
            executor: self.params.executor,
        };

        vec![
            SetConfigParam {
                eid: self.params.to.as_u32(),
                configType: CONFIG_TYPE_EXECUTOR,
                config: Bytes::from(executor.abi_encode()),
            },
            SetConfigParam {
                eid: self.params.to.as_u32(),
                configType: CONFIG_TYPE_ULN,
                config: Bytes::from(self.uln_config(self.params.send_confirmations).abi_encode()),
            },
        ]
    }

    /// `setConfig` params for the receive library (ULN only).
    pub fn receive_config_params(&self) -> Vec<SetConfigParam> {
        vec![SetConfigParam {
            eid: self.params.to.as_u32(),
            configType: CONFIG_TYPE_ULN,
            config: Bytes::from(
                self.uln_config(self.params.receive_confirmations)
                    .abi_encode(),
            ),
        }]
    }

    /// Endpoint calls the provisioning step issues for `oapp` on the source chain.
    pub fn provisioning_calls(&self, oapp: Address) -> Vec<ProvisioningCall> {
        let eid = self.params.to.as_u32();

        vec![
            ProvisioningCall {
                description: format!("setSendLibrary(eid {})", eid),
                calldata: IMessageLibManager::setSendLibraryCall {
                    oapp,
                    eid,
                    newLib: self.params.send_library,
                }
                .abi_encode()
                .into(),
            },
            ProvisioningCall {
                description: format!("setReceiveLibrary(eid {})", eid),
                calldata: IMessageLibManager::setReceiveLibraryCall {
                    oapp,
                    eid,
                    newLib: self.params.receive_library,
                    gracePeriod: U256::from(self.params.receive_library_grace_period),
                }
                .abi_encode()
                .into(),
            },
            ProvisioningCall {
                description: "setConfig(send library)".to_string(),
                calldata: IMessageLibManager::setConfigCall {
                    oapp,
                    lib: self.params.send_library,
                    params: self.send_config_params(),
                }
                .abi_encode()
                .into(),
            },
            ProvisioningCall {
                description: "setConfig(receive library)".to_string(),
                calldata: IMessageLibManager::setConfigCall {
                    oapp,
                    lib: self.params.receive_library,
                    params: self.receive_config_params(),
                }
                .abi_encode()
                .into(),
            },
        ]
    }
}

/// One encoded endpoint call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningCall {
    pub description: String,
    pub calldata: Bytes,
}

// ============================================================================
// Registry
// ============================================================================

/// Immutable set of path records keyed by `(from, to)`.
#[derive(Debug, Clone, Default)]
pub struct PathRegistry {
    paths: BTreeMap<(EndpointId, EndpointId), PathConfig>,
}

impl PathRegistry {
    pub fn new(paths: Vec<PathConfig>) -> Result<Self, TransferError> {
        let mut map = BTreeMap::new();
        for path in paths {
            let key = (path.from(), path.to());
            if key.0 == key.1 {
                return Err(TransferError::InvalidConfig {
                    reason: format!("path {} -> {} loops back to itself", key.0, key.1),
                });
            }
            if map.insert(key, path).is_some() {
                return Err(TransferError::InvalidConfig {
                    reason: format!("duplicate path {} -> {}", key.0, key.1),
                });
            }
        }
        Ok(Self { paths: map })
    }

    /// Parse a JSON array of path records; every record is validated.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let paths: Vec<PathConfig> =
            serde_json::from_str(json).wrap_err("Failed to parse path configuration")?;
        Ok(Self::new(paths)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read path config from {}", path.display()))?;
        Self::from_json_str(&json)
    }

    pub fn get(&self, from: EndpointId, to: EndpointId) -> Option<&PathConfig> {
        self.paths.get(&(from, to))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathConfig> {
        self.paths.values()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Testnet pathways this toolkit ships with.
    pub fn builtin() -> Self {
        let single = |a: Address| BTreeSet::from([a]);

        let records = vec![
            PathConfigParams {
                from: EID_BASE_SEPOLIA,
                to: EID_COREDAO_TESTNET,
                send_library: address!("C1868e054425D378095A003EcbA3823a5D0135C9"),
                receive_library: address!("12523de19dc41c91F7d2093E0CFbB76b17012C8d"),
                receive_library_grace_period: 0,
                send_confirmations: 1,
                receive_confirmations: 1,
                required_verifiers: single(address!("e1a12515F9AB2764b887bF60B923Ca494EBbB2d6")),
                optional_verifiers: BTreeSet::new(),
                optional_verifier_threshold: 0,
                executor: address!("8A3D588D9f6AC041476b094f97FF94ec30169d3D"),
                max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
                enforced_execution_gas: 0,
            },
            PathConfigParams {
                from: EID_COREDAO_TESTNET,
                to: EID_BASE_SEPOLIA,
                send_library: address!("c8361Fac616435eB86B9F6e2faaff38F38B0d68C"),
                receive_library: address!("D1bbdB62826eDdE4934Ff3A4920eB053ac9D5569"),
                receive_library_grace_period: 0,
                send_confirmations: 1,
                receive_confirmations: 1,
                required_verifiers: single(address!("Ae9BBF877BF1BD41EdD5dfc3473D263171cF3B9e")),
                optional_verifiers: BTreeSet::new(),
                optional_verifier_threshold: 0,
                executor: address!("3Bdb89Df44e50748fAed8cf851eB25bf95f37d19"),
                max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
                enforced_execution_gas: 0,
            },
            PathConfigParams {
                from: EID_SEPOLIA,
                to: EID_COREDAO_TESTNET,
                send_library: address!("cc1ae8Cf5D3904Cef3360A9532B477529b177cCE"),
                receive_library: address!("dAf00F5eE2158dD58E0d3857851c432E34A3A851"),
                receive_library_grace_period: 0,
                send_confirmations: 15,
                receive_confirmations: 20,
                required_verifiers: single(address!("8eebf8b423b73bfca51a1db4b7354aa0bfca9193")),
                optional_verifiers: BTreeSet::new(),
                optional_verifier_threshold: 0,
                executor: address!("718B92b5CB0a5552039B593faF724D182A881eDA"),
                max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
                enforced_execution_gas: 65_000,
            },
            PathConfigParams {
                from: EID_COREDAO_TESTNET,
                to: EID_SEPOLIA,
                send_library: address!("0BcAC336466ef7F1e0b5c184aAB2867C108331aF"),
                receive_library: address!("8F76bAcC52b5730c1f1A2413B8936D4df12aF4f6"),
                receive_library_grace_period: 0,
                send_confirmations: 15,
                receive_confirmations: 20,
                required_verifiers: single(address!("ae9bbf877bf1bd41edd5dfc3473d263171cf3b9e")),
                optional_verifiers: BTreeSet::new(),
                optional_verifier_threshold: 0,
                executor: address!("3Bdb89Df44e50748fAed8cf851eB25bf95f37d19"),
                max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
                enforced_execution_gas: 65_000,
            },
        ];

        let mut paths = BTreeMap::new();
        for params in records {
            // Built-in records satisfy the quorum invariant by construction.
            paths.insert((params.from, params.to), PathConfig { params });
        }
        Self { paths }
    }
}
