//! Stacks Node Client
//!
//! Queries the second ledger: the wrapped-asset (sBTC) balance of a Stacks
//! address and the current peg address. The peg address is derived from the
//! peg wallet public key exposed by the bridge contract as a taproot
//! key-path address.

use std::collections::HashMap;

use async_trait::async_trait;
use bitcoin::key::Secp256k1;
use bitcoin::{Address, XOnlyPublicKey};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use super::clarity::{ClarityError, ClarityValue};

/// Contract function exposing the peg wallet public key
const PEG_PUBKEY_FUNCTION: &str = "get-bitcoin-wallet-public-key";

/// Stacks chain errors
#[derive(Debug, Error)]
pub enum StacksApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("contract call failed: {0}")]
    ContractCall(String),

    #[error("clarity error: {0}")]
    Clarity(#[from] ClarityError),

    #[error("invalid contract identifier: {0}")]
    InvalidContract(String),

    #[error("peg wallet not registered")]
    PegWalletMissing,

    #[error("parse error: {0}")]
    ParseError(String),
}

/// Stacks chain capability used by the session layer
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StacksApi: Send + Sync {
    /// Wrapped-asset balance of a Stacks address, in satoshis
    async fn sbtc_balance(&self, stx_address: &str) -> Result<u64, StacksApiError>;

    /// Current peg address on the Bitcoin side
    async fn peg_address(&self) -> Result<String, StacksApiError>;
}

/// Stacks node HTTP client
#[derive(Debug, Clone)]
pub struct StacksClient {
    client: Client,
    base_url: String,
    contract_address: String,
    contract_name: String,
    asset_name: String,
    network: bitcoin::Network,
}

impl StacksClient {
    /// Create a new client.
    ///
    /// `contract` is the sBTC contract identifier in `ADDR.name` form.
    pub fn new(
        base_url: &str,
        contract: &str,
        asset_name: &str,
        network: bitcoin::Network,
    ) -> Result<Self, StacksApiError> {
        let (contract_address, contract_name) = contract
            .split_once('.')
            .ok_or_else(|| StacksApiError::InvalidContract(contract.to_string()))?;

        if contract_address.is_empty() || contract_name.is_empty() {
            return Err(StacksApiError::InvalidContract(contract.to_string()));
        }

        Ok(Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            contract_address: contract_address.to_string(),
            contract_name: contract_name.to_string(),
            asset_name: asset_name.to_string(),
            network,
        })
    }

    /// Fully qualified asset identifier, as keyed in the balances endpoint
    fn asset_identifier(&self) -> String {
        format!(
            "{}.{}::{}",
            self.contract_address, self.contract_name, self.asset_name
        )
    }

    /// Execute a read-only contract call and decode the returned value
    async fn call_read(&self, function: &str) -> Result<ClarityValue, StacksApiError> {
        let url = format!(
            "{}/v2/contracts/call-read/{}/{}/{}",
            self.base_url, self.contract_address, self.contract_name, function
        );

        let body = json!({
            "sender": self.contract_address,
            "arguments": [],
        });

        let resp = self.client.post(&url).json(&body).send().await?;
        let result: CallReadResponse = resp.json().await?;

        if !result.okay {
            return Err(StacksApiError::ContractCall(
                result.cause.unwrap_or_else(|| "unknown cause".to_string()),
            ));
        }

        let raw = result
            .result
            .ok_or_else(|| StacksApiError::ContractCall("empty result".to_string()))?;

        Ok(ClarityValue::from_hex(&raw)?)
    }
}

#[async_trait]
impl StacksApi for StacksClient {
    async fn sbtc_balance(&self, stx_address: &str) -> Result<u64, StacksApiError> {
        let url = format!(
            "{}/extended/v1/address/{}/balances",
            self.base_url, stx_address
        );
        let resp = self.client.get(&url).send().await?;
        let balances: AddressBalances = resp.json().await?;

        // An address that never held the token has no entry at all
        let balance = match balances.fungible_tokens.get(&self.asset_identifier()) {
            Some(ft) => ft
                .balance
                .parse::<u64>()
                .map_err(|e| StacksApiError::ParseError(e.to_string()))?,
            None => 0,
        };

        Ok(balance)
    }

    async fn peg_address(&self) -> Result<String, StacksApiError> {
        let value = self.call_read(PEG_PUBKEY_FUNCTION).await?;

        if value.clone().unwrap_layers() == ClarityValue::OptionalNone {
            return Err(StacksApiError::PegWalletMissing);
        }

        let pubkey = value.as_buffer()?;
        Ok(peg_address_from_pubkey(&pubkey, self.network)?)
    }
}

/// Derive the taproot peg address from the peg wallet public key.
///
/// The contract stores either a 33-byte compressed key or a 32-byte x-only
/// key; both spend via the key path with no script tree.
pub fn peg_address_from_pubkey(
    pubkey: &[u8],
    network: bitcoin::Network,
) -> Result<String, StacksApiError> {
    let xonly_bytes = match pubkey.len() {
        33 => &pubkey[1..],
        32 => pubkey,
        other => {
            return Err(StacksApiError::ParseError(format!(
                "peg public key must be 32 or 33 bytes, got {}",
                other
            )))
        }
    };

    let internal_key = XOnlyPublicKey::from_slice(xonly_bytes)
        .map_err(|e| StacksApiError::ParseError(e.to_string()))?;

    let secp = Secp256k1::verification_only();
    let address = Address::p2tr(&secp, internal_key, None, network);
    Ok(address.to_string())
}

// =============================================================================
// Stacks API Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct CallReadResponse {
    okay: bool,
    result: Option<String>,
    cause: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AddressBalances {
    fungible_tokens: HashMap<String, FtBalance>,
}

#[derive(Debug, Deserialize)]
struct FtBalance {
    balance: String,
}
