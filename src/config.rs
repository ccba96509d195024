//! Environment-based Configuration
//!
//! All settings load from environment variables, with safe defaults for the
//! local development network only.
//!
//! # Environment Variables
//!
//! ## Network
//! - `PEGIN_NETWORK` - "mainnet", "testnet", or "devnet" (default: "devnet")
//! - `PEGIN_ESPLORA_URL` - Esplora API endpoint
//! - `PEGIN_STACKS_API` - Stacks node API endpoint
//!
//! ## sBTC contract
//! - `PEGIN_SBTC_CONTRACT` - sBTC contract identifier (`ADDR.name`)
//! - `PEGIN_SBTC_ASSET` - sBTC fungible token asset name
//!
//! ## Wallet
//! - `PEGIN_STX_ADDRESS` - Stacks address to mint the wrapped asset to
//! - `PEGIN_WALLET_SEED` - seed for the dev wallet's BTC key
//!
//! ## Deposit
//! - `PEGIN_DEPOSIT_SATS` - deposit amount in satoshis (default: 10000)
//! - `PEGIN_POLL_INTERVAL_SECS` - confirmation poll interval (default: 10)
//! - `PEGIN_LOG_LEVEL` - logging level (debug, info, warn, error)

use std::env;
use std::str::FromStr;
use thiserror::Error;

/// How much to deposit when no override is configured, in satoshis.
pub const DEFAULT_DEPOSIT_SATS: u64 = 10_000;

/// Default confirmation/balance poll interval in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Network environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
    Devnet,
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            "devnet" | "dev" => Ok(Network::Devnet),
            _ => Err(ConfigError::InvalidValue(
                "PEGIN_NETWORK".to_string(),
                format!("unknown network: {}", s),
            )),
        }
    }
}

impl Network {
    /// Get default Esplora API for this network
    pub fn default_esplora_url(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://blockstream.info/api",
            Network::Testnet => "https://blockstream.info/testnet/api",
            Network::Devnet => "http://127.0.0.1:3002/api",
        }
    }

    /// Get default Stacks node API for this network
    pub fn default_stacks_api(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://api.hiro.so",
            Network::Testnet => "https://api.testnet.hiro.so",
            Network::Devnet => "http://127.0.0.1:3999",
        }
    }

    /// Get bitcoin network enum
    pub fn bitcoin_network(&self) -> bitcoin::Network {
        match self {
            Network::Mainnet => bitcoin::Network::Bitcoin,
            Network::Testnet | Network::Devnet => bitcoin::Network::Testnet,
        }
    }
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct PeginConfig {
    /// Network environment
    pub network: Network,

    /// Esplora API endpoint
    pub esplora_url: String,

    /// Stacks node API endpoint
    pub stacks_api: String,

    /// sBTC contract identifier (`ADDR.name`)
    pub sbtc_contract: String,

    /// sBTC fungible token asset name
    pub sbtc_asset: String,

    /// Stacks address receiving the wrapped asset
    pub stx_address: String,

    /// Seed for the dev wallet's BTC key
    pub wallet_seed: String,

    /// Deposit amount in satoshis
    pub deposit_sats: u64,

    /// Confirmation/balance poll interval in seconds
    pub poll_interval_secs: u64,

    /// Log level
    pub log_level: String,
}

impl PeginConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let network: Network = env::var("PEGIN_NETWORK")
            .unwrap_or_else(|_| "devnet".to_string())
            .parse()?;

        let esplora_url = env::var("PEGIN_ESPLORA_URL")
            .unwrap_or_else(|_| network.default_esplora_url().to_string());

        let stacks_api = env::var("PEGIN_STACKS_API")
            .unwrap_or_else(|_| network.default_stacks_api().to_string());

        let sbtc_contract = get_required_or_devnet_default(
            "PEGIN_SBTC_CONTRACT",
            "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM.asset",
            network,
        )?;

        let sbtc_asset = env::var("PEGIN_SBTC_ASSET").unwrap_or_else(|_| "sbtc".to_string());

        let stx_address = get_required_or_devnet_default(
            "PEGIN_STX_ADDRESS",
            "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM",
            network,
        )?;

        let wallet_seed = match env::var("PEGIN_WALLET_SEED") {
            Ok(seed) => seed,
            Err(_) => {
                if network == Network::Devnet {
                    eprintln!(
                        "WARNING: Using derived dev wallet key - DO NOT USE WITH REAL FUNDS"
                    );
                    "wallet_00".to_string()
                } else {
                    return Err(ConfigError::MissingEnvVar("PEGIN_WALLET_SEED".to_string()));
                }
            }
        };

        let deposit_sats = parse_env_or("PEGIN_DEPOSIT_SATS", DEFAULT_DEPOSIT_SATS)?;
        let poll_interval_secs =
            parse_env_or("PEGIN_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;

        let log_level = env::var("PEGIN_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            network,
            esplora_url,
            stacks_api,
            sbtc_contract,
            sbtc_asset,
            stx_address,
            wallet_seed,
            deposit_sats,
            poll_interval_secs,
            log_level,
        })
    }

    /// Print configuration summary (hiding sensitive values)
    pub fn print_summary(&self) {
        println!("=== Peg-In Configuration ===");
        println!("Network: {:?}", self.network);
        println!("Esplora API: {}", self.esplora_url);
        println!("Stacks API: {}", self.stacks_api);
        println!("sBTC Contract: {}", self.sbtc_contract);
        println!("STX Address: {}", self.stx_address);
        println!("Deposit Amount: {} sats", self.deposit_sats);
        println!("Poll Interval: {} seconds", self.poll_interval_secs);
        println!("Log Level: {}", self.log_level);
        println!("============================");
    }
}

/// Get required env var, or use default for devnet only
fn get_required_or_devnet_default(
    var_name: &str,
    devnet_default: &str,
    network: Network,
) -> Result<String, ConfigError> {
    match env::var(var_name) {
        Ok(value) => Ok(value),
        Err(_) => {
            if network == Network::Devnet {
                Ok(devnet_default.to_string())
            } else {
                Err(ConfigError::MissingEnvVar(var_name.to_string()))
            }
        }
    }
}

fn parse_env_or(var_name: &str, default: u64) -> Result<u64, ConfigError> {
    match env::var(var_name) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue(var_name.to_string(), value)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_parsing() {
        assert!(matches!("mainnet".parse::<Network>(), Ok(Network::Mainnet)));
        assert!(matches!("testnet".parse::<Network>(), Ok(Network::Testnet)));
        assert!(matches!("devnet".parse::<Network>(), Ok(Network::Devnet)));
        assert!("invalid".parse::<Network>().is_err());
    }

    #[test]
    fn test_bitcoin_network_mapping() {
        assert_eq!(Network::Mainnet.bitcoin_network(), bitcoin::Network::Bitcoin);
        assert_eq!(Network::Testnet.bitcoin_network(), bitcoin::Network::Testnet);
        assert_eq!(Network::Devnet.bitcoin_network(), bitcoin::Network::Testnet);
    }

    #[test]
    fn test_devnet_default_helper() {
        let value = get_required_or_devnet_default("PEGIN_TEST_UNSET_VAR", "fallback", Network::Devnet)
            .unwrap();
        assert_eq!(value, "fallback");

        let missing =
            get_required_or_devnet_default("PEGIN_TEST_UNSET_VAR", "fallback", Network::Testnet);
        assert!(matches!(missing, Err(ConfigError::MissingEnvVar(_))));
    }
}
