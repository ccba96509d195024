//! Esplora API Client
//!
//! Queries Bitcoin network state over the Esplora REST API: address
//! balances, spendable outputs, fee estimates, transaction confirmation
//! status, and transaction broadcast.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

/// Bitcoin chain errors
#[derive(Debug, Error)]
pub enum BitcoinApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("address not found: {0}")]
    AddressNotFound(String),

    #[error("transaction not found: {0}")]
    TxNotFound(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("broadcast failed: {0}")]
    BroadcastFailed(String),
}

/// Unspent transaction output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    /// Transaction ID
    pub txid: String,
    /// Output index
    pub vout: u32,
    /// Value in satoshis
    pub value: u64,
    /// Block height (None if unconfirmed)
    pub block_height: Option<u64>,
}

/// Transaction confirmation status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxStatus {
    pub confirmed: bool,
    pub block_height: Option<u64>,
}

/// Bitcoin chain capability used by the session layer
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BitcoinApi: Send + Sync {
    /// Current fee-rate estimate in sat/vB
    async fn fee_rate(&self) -> Result<u64, BitcoinApiError>;

    /// Confirmed balance of an address in satoshis
    async fn balance(&self, address: &str) -> Result<u64, BitcoinApiError>;

    /// Spendable outputs of an address
    async fn utxos(&self, address: &str) -> Result<Vec<Utxo>, BitcoinApiError>;

    /// Confirmation status of a transaction
    async fn tx_status(&self, txid: &str) -> Result<TxStatus, BitcoinApiError>;

    /// Broadcast a raw transaction (hex), returning its txid
    async fn broadcast(&self, tx_hex: &str) -> Result<String, BitcoinApiError>;
}

/// Esplora HTTP client
#[derive(Debug, Clone)]
pub struct EsploraClient {
    client: Client,
    base_url: String,
}

impl EsploraClient {
    /// Create a new client with custom URL
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl BitcoinApi for EsploraClient {
    async fn fee_rate(&self) -> Result<u64, BitcoinApiError> {
        let url = format!("{}/fee-estimates", self.base_url);
        let resp = self.client.get(&url).send().await?;

        let estimates: HashMap<String, f64> = resp.json().await?;

        // Next-block estimate, falling back to slower targets on sparse maps
        let rate = estimates
            .get("1")
            .or_else(|| estimates.get("2"))
            .or_else(|| estimates.get("3"))
            .or_else(|| estimates.get("6"))
            .copied()
            .unwrap_or(1.0);

        Ok((rate.ceil() as u64).max(1))
    }

    async fn balance(&self, address: &str) -> Result<u64, BitcoinApiError> {
        let url = format!("{}/address/{}", self.base_url, address);
        let resp = self.client.get(&url).send().await?;

        if !resp.status().is_success() {
            return Err(BitcoinApiError::AddressNotFound(address.to_string()));
        }

        let info: EsploraAddressInfo = resp.json().await?;
        Ok(info
            .chain_stats
            .funded_txo_sum
            .saturating_sub(info.chain_stats.spent_txo_sum))
    }

    async fn utxos(&self, address: &str) -> Result<Vec<Utxo>, BitcoinApiError> {
        let url = format!("{}/address/{}/utxo", self.base_url, address);
        let resp = self.client.get(&url).send().await?;

        if !resp.status().is_success() {
            return Err(BitcoinApiError::AddressNotFound(address.to_string()));
        }

        let raw: Vec<EsploraUtxo> = resp.json().await?;

        Ok(raw
            .into_iter()
            .map(|u| Utxo {
                txid: u.txid,
                vout: u.vout,
                value: u.value,
                block_height: u.status.block_height,
            })
            .collect())
    }

    async fn tx_status(&self, txid: &str) -> Result<TxStatus, BitcoinApiError> {
        let url = format!("{}/tx/{}/status", self.base_url, txid);
        let resp = self.client.get(&url).send().await?;

        if !resp.status().is_success() {
            return Err(BitcoinApiError::TxNotFound(txid.to_string()));
        }

        let status: EsploraTxStatus = resp.json().await?;

        Ok(TxStatus {
            confirmed: status.confirmed,
            block_height: status.block_height,
        })
    }

    async fn broadcast(&self, tx_hex: &str) -> Result<String, BitcoinApiError> {
        let url = format!("{}/tx", self.base_url);
        let resp = self
            .client
            .post(&url)
            .body(tx_hex.to_string())
            .send()
            .await?;

        if !resp.status().is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            return Err(BitcoinApiError::BroadcastFailed(error_text));
        }

        let txid = resp.text().await?;
        Ok(txid)
    }
}

// =============================================================================
// Esplora API Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct EsploraAddressInfo {
    chain_stats: ChainStats,
}

#[derive(Debug, Deserialize)]
struct ChainStats {
    funded_txo_sum: u64,
    spent_txo_sum: u64,
}

#[derive(Debug, Deserialize)]
struct EsploraUtxo {
    txid: String,
    vout: u32,
    value: u64,
    status: EsploraTxStatus,
}

#[derive(Debug, Clone, Deserialize)]
struct EsploraTxStatus {
    confirmed: bool,
    block_height: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalization() {
        let client = EsploraClient::new("https://blockstream.info/testnet/api/");
        assert_eq!(client.base_url(), "https://blockstream.info/testnet/api");
    }

    #[test]
    fn test_utxo_parsing() {
        let raw = r#"[
            {"txid":"aa","vout":0,"value":50000,"status":{"confirmed":true,"block_height":100}},
            {"txid":"bb","vout":1,"value":7000,"status":{"confirmed":false,"block_height":null}}
        ]"#;
        let parsed: Vec<EsploraUtxo> = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].value, 50_000);
        assert_eq!(parsed[0].status.block_height, Some(100));
        assert!(!parsed[1].status.confirmed);
    }

    #[test]
    fn test_address_info_parsing() {
        let raw = r#"{"chain_stats":{"funded_txo_count":3,"funded_txo_sum":90000,"spent_txo_count":1,"spent_txo_sum":40000,"tx_count":4}}"#;
        let info: EsploraAddressInfo = serde_json::from_str(raw).unwrap();
        assert_eq!(
            info.chain_stats.funded_txo_sum - info.chain_stats.spent_txo_sum,
            50_000
        );
    }
}
