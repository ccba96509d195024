//! Wallet Authentication Provider
//!
//! The `WalletConnector` trait abstracts sign-in against an external wallet:
//! initiating authentication, loading the authenticated identity, and
//! signing out. `DevWallet` is the development-network implementation, with
//! a BTC key derived deterministically from a configured seed in place of a
//! real wallet session.

use async_trait::async_trait;
use bitcoin::key::{CompressedPublicKey, Secp256k1};
use bitcoin::{Address, PublicKey};
use secp256k1::SecretKey;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::PeginConfig;
use crate::signer::{sign_psbt_inputs, DepositSigner, SignerError};

/// Connection errors
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("authentication cancelled by user")]
    Cancelled,

    #[error("wallet unavailable: {0}")]
    Unavailable(String),

    #[error("invalid wallet key: {0}")]
    InvalidKey(String),
}

/// An authenticated wallet identity
#[derive(Debug, Clone)]
pub struct WalletIdentity {
    /// Decentralized identity handle
    pub identity: String,
    /// Stacks address receiving the wrapped asset
    pub stx_address: String,
    /// BTC funding address
    pub btc_address: Address,
    /// Public key backing the BTC address
    pub public_key: PublicKey,
}

/// Wallet authentication capability
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WalletConnector: Send + Sync {
    /// Initiate sign-in and load the authenticated identity
    async fn connect(&self) -> Result<WalletIdentity, ConnectError>;

    /// End the wallet session
    async fn sign_out(&self) -> Result<(), ConnectError>;
}

/// Development wallet backed by a seed-derived key.
///
/// Stands in for an external wallet session on the development network,
/// providing both the identity (`WalletConnector`) and PSBT signatures
/// (`DepositSigner`).
pub struct DevWallet {
    secret_key: SecretKey,
    public_key: PublicKey,
    btc_address: Address,
    stx_address: String,
}

impl DevWallet {
    /// Derive a wallet from a seed string.
    ///
    /// Deterministic on purpose: the same seed always yields the same
    /// address, mirroring the fixed dev-network wallets.
    pub fn from_seed(
        seed: &str,
        stx_address: &str,
        network: bitcoin::Network,
    ) -> Result<Self, ConnectError> {
        let mut hasher = Sha256::new();
        hasher.update(seed.as_bytes());
        let hash: [u8; 32] = hasher.finalize().into();

        let secret_key =
            SecretKey::from_slice(&hash).map_err(|e| ConnectError::InvalidKey(e.to_string()))?;

        let secp = Secp256k1::new();
        let public_key = PublicKey::new(secret_key.public_key(&secp));
        let compressed = CompressedPublicKey(public_key.inner);
        let btc_address = Address::p2wpkh(&compressed, network);

        Ok(Self {
            secret_key,
            public_key,
            btc_address,
            stx_address: stx_address.to_string(),
        })
    }

    /// Build the wallet described by the configuration
    pub fn from_config(config: &PeginConfig) -> Result<Self, ConnectError> {
        Self::from_seed(
            &config.wallet_seed,
            &config.stx_address,
            config.network.bitcoin_network(),
        )
    }

    /// The wallet's BTC funding address
    pub fn btc_address(&self) -> &Address {
        &self.btc_address
    }
}

#[async_trait]
impl WalletConnector for DevWallet {
    async fn connect(&self) -> Result<WalletIdentity, ConnectError> {
        Ok(WalletIdentity {
            identity: format!("did:btc-addr:{}", self.btc_address),
            stx_address: self.stx_address.clone(),
            btc_address: self.btc_address.clone(),
            public_key: self.public_key,
        })
    }

    async fn sign_out(&self) -> Result<(), ConnectError> {
        Ok(())
    }
}

#[async_trait]
impl DepositSigner for DevWallet {
    async fn sign_psbt(
        &self,
        psbt_bytes: &[u8],
        public_key: &PublicKey,
    ) -> Result<Vec<u8>, SignerError> {
        if *public_key != self.public_key {
            return Err(SignerError::UnknownKey(public_key.to_string()));
        }
        sign_psbt_inputs(psbt_bytes, &self.secret_key, &self.public_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_derivation_is_deterministic() {
        let a = DevWallet::from_seed("wallet_00", "ST1TEST", bitcoin::Network::Testnet).unwrap();
        let b = DevWallet::from_seed("wallet_00", "ST1TEST", bitcoin::Network::Testnet).unwrap();
        assert_eq!(a.btc_address(), b.btc_address());
        assert_eq!(a.public_key, b.public_key);

        let c = DevWallet::from_seed("wallet_01", "ST1TEST", bitcoin::Network::Testnet).unwrap();
        assert_ne!(a.btc_address(), c.btc_address());
    }

    #[tokio::test]
    async fn test_connect_yields_identity() {
        let wallet =
            DevWallet::from_seed("wallet_00", "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM", bitcoin::Network::Testnet)
                .unwrap();
        let identity = wallet.connect().await.unwrap();

        assert_eq!(identity.stx_address, "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM");
        assert!(identity.identity.starts_with("did:btc-addr:tb1q"));
        assert_eq!(identity.btc_address, *wallet.btc_address());
    }

    #[tokio::test]
    async fn test_sign_refuses_foreign_key() {
        let wallet = DevWallet::from_seed("wallet_00", "ST1TEST", bitcoin::Network::Testnet).unwrap();
        let other = DevWallet::from_seed("wallet_01", "ST1TEST", bitcoin::Network::Testnet).unwrap();

        let result = wallet.sign_psbt(&[], &other.public_key).await;
        assert!(matches!(result, Err(SignerError::UnknownKey(_))));
    }
}
