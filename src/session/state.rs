//! Session State
//!
//! One tagged union describes the whole session:
//!
//! ```text
//! DISCONNECTED → CONNECTING → READY → DEPOSITING → REQUEST_SENT → CONFIRMED
//!                          ↘ INSUFFICIENT_FUNDS
//! ```
//!
//! Each variant carries exactly the fields valid in that state, so a
//! populated wallet snapshot can never coexist with a disconnected session
//! and a transaction handle only exists once a deposit is in flight.
//! Transitions are one-directional; reset returns to `Disconnected` from
//! anywhere, and failures land in `Failed` (recoverable only via reset).

use bitcoin::{Address, PublicKey};

/// Assumed deposit transaction size in virtual bytes, used only by the
/// funds-sufficiency check. This is a fixed approximation, not derived from
/// the transaction that ends up being built.
pub const FEE_VSIZE_ASSUMPTION: u64 = 1_000;

/// Everything known about the connected wallet
#[derive(Debug, Clone, PartialEq)]
pub struct WalletSnapshot {
    /// Decentralized identity handle
    pub identity: String,
    /// BTC funding address
    pub btc_address: Address,
    /// Stacks address receiving the wrapped asset
    pub stx_address: String,
    /// Public key backing the BTC address
    pub public_key: PublicKey,
    /// BTC balance in satoshis
    pub btc_balance: u64,
    /// sBTC balance in satoshis
    pub sbtc_balance: u64,
}

/// Network-side parameters of the pending deposit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositContext {
    /// Peg address receiving deposits
    pub peg_address: String,
    /// Fee rate estimate in sat/vB
    pub fee_rate: u64,
}

/// Handle to a broadcast deposit transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositReceipt {
    /// Transaction ID on the Bitcoin chain
    pub txid: String,
    /// Unix timestamp of the broadcast
    pub broadcast_at: i64,
}

/// Progress through an in-flight deposit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepositPhase {
    /// Fetching fresh UTXOs and constructing the unsigned transaction
    Building,
    /// Unsigned transaction handed to the external signer
    AwaitingSignature { unsigned_txid: String },
    /// Finalizing and broadcasting the signed transaction
    Broadcasting { unsigned_txid: String },
}

/// The session state machine
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// No wallet connected
    Disconnected,
    /// Authentication succeeded, wallet and network data loading
    Connecting,
    /// Funds suffice for the configured deposit
    Ready {
        wallet: WalletSnapshot,
        deposit: DepositContext,
    },
    /// Funds do not suffice for the configured deposit
    InsufficientFunds {
        wallet: WalletSnapshot,
        deposit: DepositContext,
    },
    /// A deposit operation is in flight
    Depositing {
        wallet: WalletSnapshot,
        deposit: DepositContext,
        phase: DepositPhase,
    },
    /// Deposit broadcast, awaiting confirmation
    RequestSent {
        wallet: WalletSnapshot,
        deposit: DepositContext,
        receipt: DepositReceipt,
    },
    /// Deposit confirmed on the Bitcoin chain
    Confirmed {
        wallet: WalletSnapshot,
        deposit: DepositContext,
        receipt: DepositReceipt,
    },
    /// A non-recoverable failure; reset to continue
    Failed { reason: String },
}

impl SessionState {
    /// Uppercase state label, stable for display and logging
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "DISCONNECTED",
            SessionState::Connecting => "CONNECTING",
            SessionState::Ready { .. } => "READY",
            SessionState::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            SessionState::Depositing { .. } => "DEPOSITING",
            SessionState::RequestSent { .. } => "REQUEST_SENT",
            SessionState::Confirmed { .. } => "CONFIRMED",
            SessionState::Failed { .. } => "FAILED",
        }
    }

    /// Wallet snapshot, when one exists in this state
    pub fn wallet(&self) -> Option<&WalletSnapshot> {
        match self {
            SessionState::Ready { wallet, .. }
            | SessionState::InsufficientFunds { wallet, .. }
            | SessionState::Depositing { wallet, .. }
            | SessionState::RequestSent { wallet, .. }
            | SessionState::Confirmed { wallet, .. } => Some(wallet),
            _ => None,
        }
    }

    /// Broadcast receipt, once a deposit has been sent
    pub fn receipt(&self) -> Option<&DepositReceipt> {
        match self {
            SessionState::RequestSent { receipt, .. }
            | SessionState::Confirmed { receipt, .. } => Some(receipt),
            _ => None,
        }
    }

    /// Classify a freshly fetched wallet as ready or underfunded
    pub fn from_fetched(
        wallet: WalletSnapshot,
        deposit: DepositContext,
        deposit_sats: u64,
    ) -> SessionState {
        if funds_sufficient(wallet.btc_balance, deposit.fee_rate, deposit_sats) {
            SessionState::Ready { wallet, deposit }
        } else {
            SessionState::InsufficientFunds { wallet, deposit }
        }
    }
}

/// Funds suffice iff `balance + fee_rate * 1000 > deposit_amount`.
///
/// Equality counts as insufficient.
pub fn funds_sufficient(balance: u64, fee_rate: u64, deposit_sats: u64) -> bool {
    balance + fee_rate * FEE_VSIZE_ASSUMPTION > deposit_sats
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::key::{CompressedPublicKey, Secp256k1};
    use secp256k1::SecretKey;

    fn snapshot(btc_balance: u64) -> WalletSnapshot {
        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(&[0x11; 32]).unwrap();
        let public_key = PublicKey::new(secret_key.public_key(&secp));
        let compressed = CompressedPublicKey(public_key.inner);
        let btc_address = Address::p2wpkh(&compressed, bitcoin::Network::Testnet);

        WalletSnapshot {
            identity: format!("did:btc-addr:{}", btc_address),
            btc_address,
            stx_address: "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM".to_string(),
            public_key,
            btc_balance,
            sbtc_balance: 0,
        }
    }

    fn context(fee_rate: u64) -> DepositContext {
        DepositContext {
            peg_address: "tb1ppeg".to_string(),
            fee_rate,
        }
    }

    #[test]
    fn test_sufficiency_boundary() {
        // balance + feeRate*1000 == deposit is insufficient
        assert!(!funds_sufficient(6_000, 4, 10_000));
        // one satoshi above is sufficient
        assert!(funds_sufficient(6_001, 4, 10_000));
    }

    #[test]
    fn test_underfunded_wallet() {
        // 5000 + 4*1000 = 9000 <= 10000
        let state = SessionState::from_fetched(snapshot(5_000), context(4), 10_000);
        assert!(matches!(state, SessionState::InsufficientFunds { .. }));
        assert_eq!(state.label(), "INSUFFICIENT_FUNDS");
    }

    #[test]
    fn test_funded_wallet() {
        // 9000 + 4*1000 = 13000 > 10000
        let state = SessionState::from_fetched(snapshot(9_000), context(4), 10_000);
        assert!(matches!(state, SessionState::Ready { .. }));
        assert_eq!(state.label(), "READY");
    }

    #[test]
    fn test_field_presence_per_state() {
        assert!(SessionState::Disconnected.wallet().is_none());
        assert!(SessionState::Connecting.wallet().is_none());

        let ready = SessionState::from_fetched(snapshot(9_000), context(4), 10_000);
        assert!(ready.wallet().is_some());
        assert!(ready.receipt().is_none());

        let sent = SessionState::RequestSent {
            wallet: snapshot(9_000),
            deposit: context(4),
            receipt: DepositReceipt {
                txid: "c".repeat(64),
                broadcast_at: 1_700_000_000,
            },
        };
        assert_eq!(sent.receipt().unwrap().txid, "c".repeat(64));
    }
}
