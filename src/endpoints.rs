//! Endpoint Directory
//!
//! Static table of the networks a transfer can start from or land on. Built once at startup
//! from the built-in testnets plus any networks declared in the environment, then only read.
//!
//! # Environment Variable Schema
//!
//! ```text
//! RPC_URL_BASE=https://...                 # base-sepolia
//! RPC_URL_COREDAO_V2_TESTNET=https://...   # coredao-testnet (public default if unset)
//! RPC_URL_SEPOLIA=https://...              # sepolia
//!
//! LZ_NETWORKS_COUNT=1                      # extra networks
//! LZ_NETWORK_1_NAME=arbitrum-sepolia
//! LZ_NETWORK_1_EID=40231
//! LZ_NETWORK_1_RPC_URL=https://...
//! LZ_NETWORK_1_CHAIN_ID=421614             # optional
//! ```

use std::collections::HashMap;

use alloy::primitives::Address;
use eyre::{eyre, Result};
use tracing::warn;

use crate::chain::ChainConnector;
use crate::error::TransferError;
use crate::types::{ChainEndpoint, EndpointId};

pub const EID_BASE_SEPOLIA: EndpointId = EndpointId(40245);
pub const EID_COREDAO_TESTNET: EndpointId = EndpointId(40153);
pub const EID_SEPOLIA: EndpointId = EndpointId(40161);

/// Public Core testnet RPC used when no override is configured
pub const DEFAULT_COREDAO_TESTNET_RPC: &str = "https://rpc.test.btcs.network";

/// A network the tool knows without any configuration
#[derive(Debug, Clone, Copy)]
pub struct KnownNetwork {
    pub name: &'static str,
    pub eid: EndpointId,
    pub chain_id: u64,
    /// Environment variable holding the RPC URL
    pub rpc_env: &'static str,
    pub default_rpc: Option<&'static str>,
}

pub const KNOWN_NETWORKS: &[KnownNetwork] = &[
    KnownNetwork {
        name: "base-sepolia",
        eid: EID_BASE_SEPOLIA,
        chain_id: 84532,
        rpc_env: "RPC_URL_BASE",
        default_rpc: None,
    },
    KnownNetwork {
        name: "coredao-testnet",
        eid: EID_COREDAO_TESTNET,
        chain_id: 1115,
        rpc_env: "RPC_URL_COREDAO_V2_TESTNET",
        default_rpc: Some(DEFAULT_COREDAO_TESTNET_RPC),
    },
    KnownNetwork {
        name: "sepolia",
        eid: EID_SEPOLIA,
        chain_id: 11155111,
        rpc_env: "RPC_URL_SEPOLIA",
        default_rpc: None,
    },
];

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// Parse an endpoint RPC URL. Only http(s) with a host is reachable by the provider.
pub fn validate_rpc_url(raw: &str, source: &str) -> Result<url::Url> {
    let url = url::Url::parse(raw).map_err(|e| eyre!("{}: bad RPC URL: {}", source, e))?;

    match (url.scheme(), url.host_str()) {
        ("http" | "https", Some(_)) => Ok(url),
        ("http" | "https", None) => Err(eyre!("{}: RPC URL has no host", source)),
        (scheme, _) => Err(eyre!("{}: RPC URL scheme {} is not http(s)", source, scheme)),
    }
}

/// Immutable lookup of chain endpoints by network name or endpoint id.
#[derive(Debug, Clone)]
pub struct EndpointDirectory {
    endpoints: Vec<ChainEndpoint>,
    by_name: HashMap<String, usize>,
    by_id: HashMap<EndpointId, usize>,
}

impl EndpointDirectory {
    /// Build a directory, rejecting duplicate names or endpoint ids.
    pub fn new(endpoints: Vec<ChainEndpoint>) -> Result<Self, TransferError> {
        let mut by_name = HashMap::new();
        let mut by_id = HashMap::new();

        for (idx, endpoint) in endpoints.iter().enumerate() {
            let name = normalize(&endpoint.network_name);
            if name.is_empty() {
                return Err(TransferError::InvalidConfig {
                    reason: format!("endpoint {} has an empty network name", endpoint.id),
                });
            }
            if by_name.insert(name, idx).is_some() {
                return Err(TransferError::InvalidConfig {
                    reason: format!("duplicate network name: {}", endpoint.network_name),
                });
            }
            if by_id.insert(endpoint.id, idx).is_some() {
                return Err(TransferError::InvalidConfig {
                    reason: format!(
                        "duplicate endpoint id {} (network: {})",
                        endpoint.id, endpoint.network_name
                    ),
                });
            }
        }

        Ok(Self {
            endpoints,
            by_name,
            by_id,
        })
    }

    /// Translate a network name into its endpoint.
    pub fn resolve(&self, network_name: &str) -> Result<&ChainEndpoint, TransferError> {
        self.by_name
            .get(&normalize(network_name))
            .map(|&idx| &self.endpoints[idx])
            .ok_or_else(|| TransferError::UnknownNetwork {
                network: network_name.to_string(),
            })
    }

    pub fn get(&self, id: EndpointId) -> Option<&ChainEndpoint> {
        self.by_id.get(&id).map(|&idx| &self.endpoints[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChainEndpoint> {
        self.endpoints.iter()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Open a signer-capable handle to `token` on `endpoint`. No retry happens here.
    pub async fn connection<C: ChainConnector>(
        &self,
        connector: &C,
        endpoint: &ChainEndpoint,
        token: Address,
    ) -> Result<C::Chain, TransferError> {
        connector.connect(endpoint, token).await
    }

    /// Built-in networks with RPC URLs taken from `lookup` (usually the environment).
    pub fn builtin_with(lookup: impl Fn(&str) -> Option<String>) -> Vec<ChainEndpoint> {
        KNOWN_NETWORKS
            .iter()
            .map(|known| {
                let rpc_url = lookup(known.rpc_env)
                    .filter(|url| !url.trim().is_empty())
                    .or_else(|| known.default_rpc.map(str::to_string))
                    .unwrap_or_default();

                ChainEndpoint {
                    id: known.eid,
                    network_name: known.name.to_string(),
                    rpc_url,
                    chain_id: Some(known.chain_id),
                }
            })
            .collect()
    }

    /// Load the directory from the process environment (call `dotenvy` first).
    pub fn load_from_env() -> Result<Self> {
        let mut endpoints = Self::builtin_with(|key| std::env::var(key).ok());

        for endpoint in &endpoints {
            if endpoint.has_rpc() {
                validate_rpc_url(&endpoint.rpc_url, &endpoint.network_name)?;
            } else {
                warn!(
                    network = %endpoint.network_name,
                    eid = endpoint.id.as_u32(),
                    "No RPC URL configured; transfers on this network will be unavailable"
                );
            }
        }

        endpoints.extend(load_extra_networks()?);
        Ok(Self::new(endpoints)?)
    }
}

/// Read `LZ_NETWORK_{i}_*` declarations. Returns an empty list when `LZ_NETWORKS_COUNT` is unset.
fn load_extra_networks() -> Result<Vec<ChainEndpoint>> {
    let count: usize = match std::env::var("LZ_NETWORKS_COUNT") {
        Ok(s) => s
            .trim()
            .parse()
            .map_err(|_| eyre!("Invalid LZ_NETWORKS_COUNT: {}", s))?,
        Err(_) => return Ok(Vec::new()),
    };

    let mut endpoints = Vec::with_capacity(count);

    for i in 1..=count {
        let prefix = format!("LZ_NETWORK_{}", i);

        let network_name = std::env::var(format!("{}_NAME", prefix))
            .map_err(|_| eyre!("Missing {}_NAME", prefix))?;

        let eid: u32 = std::env::var(format!("{}_EID", prefix))
            .map_err(|_| eyre!("Missing {}_EID", prefix))?
            .trim()
            .parse()
            .map_err(|_| eyre!("Invalid {}_EID - must be a u32", prefix))?;

        let rpc_url = std::env::var(format!("{}_RPC_URL", prefix))
            .map_err(|_| eyre!("Missing {}_RPC_URL", prefix))?;
        validate_rpc_url(&rpc_url, &format!("{}_RPC_URL", prefix))?;

        let chain_id = match std::env::var(format!("{}_CHAIN_ID", prefix)) {
            Ok(s) => Some(
                s.trim()
                    .parse::<u64>()
                    .map_err(|_| eyre!("Invalid {}_CHAIN_ID - must be a u64", prefix))?,
            ),
            Err(_) => None,
        };

        endpoints.push(ChainEndpoint {
            id: EndpointId(eid),
            network_name,
            rpc_url,
            chain_id,
        });
    }

    Ok(endpoints)
}
