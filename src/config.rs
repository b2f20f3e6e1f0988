//! Configuration
//!
//! Everything the tool reads from the environment, read once at startup (after loading a
//! `.env` file when present) into immutable structures that are passed by reference.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::TxHash;
use alloy::signers::local::{coins_bip39::English, MnemonicBuilder, PrivateKeySigner};
use eyre::{eyre, Result, WrapErr};

use crate::endpoints::EndpointDirectory;
use crate::error::TransferError;
use crate::fees::{
    BPS_DENOMINATOR, DEFAULT_FEE_MARGIN, DEFAULT_GAS_PRICE_MULTIPLIER, DEFAULT_SLIPPAGE_BPS,
};
use crate::options::DEFAULT_LZ_RECEIVE_GAS;
use crate::path_config::PathRegistry;
use crate::types::EndpointId;

/// Explorer for V2 testnet deliveries
pub const TESTNET_SCAN_URL: &str = "https://testnet.layerzeroscan.com";

/// Explorer for mainnet deliveries
pub const MAINNET_SCAN_URL: &str = "https://layerzeroscan.com";

/// Default functions
fn default_gas_limit() -> u64 {
    7_000_000
}

fn default_confirmation_timeout() -> Duration {
    Duration::from_secs(180)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(1000)
}

/// Read an optional variable, failing only when it is set but unparseable.
fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| eyre!("{} has an invalid value: {}", key, raw)),
        _ => Ok(None),
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

// ============================================================================
// Signing Credential
// ============================================================================

/// Key material used to sign the send transaction. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub enum SigningCredential {
    /// Raw secp256k1 key, hex
    PrivateKey(String),
    /// BIP-39 phrase derived at `m/44'/60'/0'/0/{index}`
    Mnemonic { phrase: String, index: u32 },
}

/// Custom Debug that redacts key material to prevent accidental log leakage.
impl fmt::Debug for SigningCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigningCredential::PrivateKey(_) => f
                .debug_tuple("PrivateKey")
                .field(&"<redacted>")
                .finish(),
            SigningCredential::Mnemonic { index, .. } => f
                .debug_struct("Mnemonic")
                .field("phrase", &"<redacted>")
                .field("index", index)
                .finish(),
        }
    }
}

impl fmt::Display for SigningCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigningCredential::PrivateKey(_) => write!(f, "private key <redacted>"),
            SigningCredential::Mnemonic { index, .. } => {
                write!(f, "mnemonic <redacted> (index {})", index)
            }
        }
    }
}

impl SigningCredential {
    /// `MNEMONIC` wins over `PRIVATE_KEY` when both are set.
    pub fn from_env() -> Result<Option<Self>> {
        if let Some(phrase) = env_string("MNEMONIC") {
            let index = env_parse::<u32>("MNEMONIC_INDEX")?.unwrap_or(0);
            return Ok(Some(SigningCredential::Mnemonic {
                phrase: phrase.trim().to_string(),
                index,
            }));
        }

        if let Some(key) = env_string("PRIVATE_KEY") {
            return Ok(Some(SigningCredential::PrivateKey(key.trim().to_string())));
        }

        Ok(None)
    }

    pub fn to_signer(&self) -> Result<PrivateKeySigner> {
        match self {
            SigningCredential::PrivateKey(key) => {
                let hex_part = key.strip_prefix("0x").unwrap_or(key);
                if hex_part.len() != 64 {
                    return Err(eyre!("private key must be 32 bytes (64 hex chars)"));
                }
                // Never echo the parse error, it may contain the key
                hex_part
                    .parse::<PrivateKeySigner>()
                    .map_err(|_| eyre!("private key is not valid hex secp256k1 material"))
            }
            SigningCredential::Mnemonic { phrase, index } => MnemonicBuilder::<English>::default()
                .phrase(phrase.as_str())
                .index(*index)
                .wrap_err("Invalid mnemonic derivation index")?
                .build()
                .map_err(|_| eyre!("mnemonic could not be turned into a signing key")),
        }
    }
}

// ============================================================================
// Transfer Settings
// ============================================================================

/// Knobs of the send pipeline. Defaults reproduce the observed policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSettings {
    pub slippage_bps: u32,
    /// Multiplier over the quoted native fee
    pub fee_margin_multiplier: u32,
    /// Multiplier over the observed gas price
    pub gas_price_multiplier: u32,
    /// Destination lzReceive gas when the caller does not override it
    pub execution_gas: u128,
    pub gas_limit: u64,
    /// Bound on the wait for a receipt
    pub confirmation_timeout: Duration,
    pub receipt_poll_interval: Duration,
    /// Explorer override; chosen from the endpoint id when unset
    pub scan_url: Option<String>,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
            fee_margin_multiplier: DEFAULT_FEE_MARGIN,
            gas_price_multiplier: DEFAULT_GAS_PRICE_MULTIPLIER,
            execution_gas: DEFAULT_LZ_RECEIVE_GAS,
            gas_limit: default_gas_limit(),
            confirmation_timeout: default_confirmation_timeout(),
            receipt_poll_interval: default_poll_interval(),
            scan_url: None,
        }
    }
}

impl TransferSettings {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let settings = Self {
            slippage_bps: env_parse("SLIPPAGE_BPS")?.unwrap_or(defaults.slippage_bps),
            fee_margin_multiplier: env_parse("FEE_MARGIN_MULTIPLIER")?
                .unwrap_or(defaults.fee_margin_multiplier),
            gas_price_multiplier: env_parse("GAS_PRICE_MULTIPLIER")?
                .unwrap_or(defaults.gas_price_multiplier),
            execution_gas: env_parse("EXECUTION_GAS")?.unwrap_or(defaults.execution_gas),
            gas_limit: env_parse("GAS_LIMIT")?.unwrap_or(defaults.gas_limit),
            confirmation_timeout: env_parse::<u64>("CONFIRMATION_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.confirmation_timeout),
            receipt_poll_interval: env_parse::<u64>("RECEIPT_POLL_INTERVAL_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.receipt_poll_interval),
            scan_url: env_string("LZ_SCAN_URL").map(|u| u.trim_end_matches('/').to_string()),
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), TransferError> {
        let invalid = |reason: &str| {
            Err(TransferError::InvalidConfig {
                reason: reason.to_string(),
            })
        };

        if self.slippage_bps >= BPS_DENOMINATOR {
            return Err(TransferError::InvalidSlippage {
                bps: self.slippage_bps,
            });
        }
        if self.fee_margin_multiplier == 0 {
            return invalid("fee margin multiplier must be at least 1");
        }
        if self.gas_price_multiplier == 0 {
            return invalid("gas price multiplier must be at least 1");
        }
        if self.execution_gas == 0 {
            return invalid("execution gas must be greater than zero");
        }
        if self.gas_limit == 0 {
            return invalid("gas limit must be greater than zero");
        }
        if self.confirmation_timeout.is_zero() {
            return invalid("confirmation timeout must be greater than zero");
        }
        if self.receipt_poll_interval.is_zero() {
            return invalid("receipt poll interval must be greater than zero");
        }

        Ok(())
    }

    /// Explorer base for deliveries leaving `source`.
    pub fn scan_base(&self, source: EndpointId) -> &str {
        match &self.scan_url {
            Some(url) => url.as_str(),
            None if source.is_testnet() => TESTNET_SCAN_URL,
            None => MAINNET_SCAN_URL,
        }
    }

    /// Link to track delivery of the message sent in `tx_hash`.
    pub fn explorer_url(&self, source: EndpointId, tx_hash: TxHash) -> String {
        format!("{}/tx/{}", self.scan_base(source), tx_hash)
    }
}

// ============================================================================
// Config
// ============================================================================

/// Complete startup configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub endpoints: EndpointDirectory,
    pub paths: PathRegistry,
    pub settings: TransferSettings,
    /// Absent when only read-only commands will run
    pub credential: Option<SigningCredential>,
}

impl Config {
    /// Load configuration from environment variables.
    /// Loads .env file if present, then reads from environment.
    pub fn load() -> Result<Self> {
        Self::load_from_file(".env")
    }

    /// Load from a specific .env file path
    pub fn load_from_file(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            dotenvy::from_filename(path)
                .wrap_err_with(|| format!("Failed to load .env file from {}", path))?;
        }
        Self::load_from_env()
    }

    fn load_from_env() -> Result<Self> {
        let endpoints =
            EndpointDirectory::load_from_env().wrap_err("Failed to build endpoint directory")?;

        let paths = match env_string("PATH_CONFIG_FILE") {
            Some(file) => PathRegistry::from_file(PathBuf::from(file.trim()))?,
            None => PathRegistry::builtin(),
        };

        let settings = TransferSettings::from_env().wrap_err("Invalid transfer settings")?;
        let credential = SigningCredential::from_env()?;

        Ok(Self {
            endpoints,
            paths,
            settings,
            credential,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;
    use serial_test::serial;

    const ANVIL_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const ANVIL_MNEMONIC: &str = "test test test test test test test test test test test junk";

    const SETTINGS_VARS: &[&str] = &[
        "SLIPPAGE_BPS",
        "FEE_MARGIN_MULTIPLIER",
        "GAS_PRICE_MULTIPLIER",
        "EXECUTION_GAS",
        "GAS_LIMIT",
        "CONFIRMATION_TIMEOUT_SECS",
        "RECEIPT_POLL_INTERVAL_MS",
        "LZ_SCAN_URL",
        "PRIVATE_KEY",
        "MNEMONIC",
        "MNEMONIC_INDEX",
        "PATH_CONFIG_FILE",
        "LZ_NETWORKS_COUNT",
    ];

    fn clear_env() {
        for key in SETTINGS_VARS {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_default_settings_match_policy() {
        let settings = TransferSettings::default();
        assert_eq!(settings.slippage_bps, 200);
        assert_eq!(settings.fee_margin_multiplier, 2);
        assert_eq!(settings.gas_price_multiplier, 2);
        assert_eq!(settings.execution_gas, 200_000);
        assert_eq!(settings.gas_limit, 7_000_000);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_validation() {
        let mut settings = TransferSettings::default();
        settings.slippage_bps = 10_000;
        assert!(matches!(
            settings.validate(),
            Err(TransferError::InvalidSlippage { bps: 10_000 })
        ));

        let mut settings = TransferSettings::default();
        settings.fee_margin_multiplier = 0;
        assert!(settings.validate().is_err());

        let mut settings = TransferSettings::default();
        settings.gas_price_multiplier = 0;
        assert!(settings.validate().is_err());

        let mut settings = TransferSettings::default();
        settings.gas_limit = 0;
        assert!(settings.validate().is_err());

        let mut settings = TransferSettings::default();
        settings.confirmation_timeout = Duration::ZERO;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_explorer_url() {
        let settings = TransferSettings::default();
        let hash = TxHash::repeat_byte(0xab);

        let url = settings.explorer_url(EndpointId(40161), hash);
        assert!(url.starts_with("https://testnet.layerzeroscan.com/tx/0xabab"));

        let url = settings.explorer_url(EndpointId(30101), hash);
        assert!(url.starts_with("https://layerzeroscan.com/tx/"));

        let custom = TransferSettings {
            scan_url: Some("https://scan.example".to_string()),
            ..TransferSettings::default()
        };
        assert!(custom
            .explorer_url(EndpointId(40161), hash)
            .starts_with("https://scan.example/tx/"));
    }

    #[test]
    fn test_credential_is_redacted() {
        let key = SigningCredential::PrivateKey(ANVIL_KEY.to_string());
        assert!(!format!("{:?}", key).contains("ac0974"));
        assert!(!format!("{}", key).contains("ac0974"));

        let mnemonic = SigningCredential::Mnemonic {
            phrase: ANVIL_MNEMONIC.to_string(),
            index: 3,
        };
        let debug = format!("{:?}", mnemonic);
        assert!(!debug.contains("junk"));
        assert!(debug.contains("3"));
    }

    #[test]
    fn test_credentials_derive_same_signer() {
        let expected = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

        let from_key = SigningCredential::PrivateKey(ANVIL_KEY.to_string())
            .to_signer()
            .unwrap();
        assert_eq!(from_key.address(), expected);

        let from_phrase = SigningCredential::Mnemonic {
            phrase: ANVIL_MNEMONIC.to_string(),
            index: 0,
        }
        .to_signer()
        .unwrap();
        assert_eq!(from_phrase.address(), expected);
    }

    #[test]
    fn test_bad_private_key_rejected() {
        assert!(SigningCredential::PrivateKey("0x1234".to_string())
            .to_signer()
            .is_err());
        assert!(SigningCredential::PrivateKey("zz".repeat(32))
            .to_signer()
            .is_err());
    }

    #[test]
    #[serial]
    fn test_settings_from_env() {
        clear_env();
        env::set_var("SLIPPAGE_BPS", "50");
        env::set_var("GAS_LIMIT", "500000");
        env::set_var("CONFIRMATION_TIMEOUT_SECS", "30");
        env::set_var("LZ_SCAN_URL", "https://scan.example/");

        let settings = TransferSettings::from_env().unwrap();
        assert_eq!(settings.slippage_bps, 50);
        assert_eq!(settings.gas_limit, 500_000);
        assert_eq!(settings.confirmation_timeout, Duration::from_secs(30));
        assert_eq!(settings.scan_url.as_deref(), Some("https://scan.example"));
        assert_eq!(settings.fee_margin_multiplier, 2);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_settings_from_env_rejects_garbage() {
        clear_env();
        env::set_var("SLIPPAGE_BPS", "two percent");
        assert!(TransferSettings::from_env().is_err());

        env::set_var("SLIPPAGE_BPS", "10000");
        assert!(TransferSettings::from_env().is_err());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_credential_from_env_prefers_mnemonic() {
        clear_env();
        assert_eq!(SigningCredential::from_env().unwrap(), None);

        env::set_var("PRIVATE_KEY", ANVIL_KEY);
        assert_eq!(
            SigningCredential::from_env().unwrap(),
            Some(SigningCredential::PrivateKey(ANVIL_KEY.to_string()))
        );

        env::set_var("MNEMONIC", ANVIL_MNEMONIC);
        env::set_var("MNEMONIC_INDEX", "2");
        assert_eq!(
            SigningCredential::from_env().unwrap(),
            Some(SigningCredential::Mnemonic {
                phrase: ANVIL_MNEMONIC.to_string(),
                index: 2
            })
        );

        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_load_uses_builtin_paths() {
        clear_env();
        let config = Config::load_from_file("/nonexistent/.env").unwrap();

        assert_eq!(config.paths.len(), 4);
        assert!(config.endpoints.resolve("coredao-testnet").is_ok());
        assert_eq!(config.settings, TransferSettings::default());
        assert!(config.credential.is_none());
    }
}
