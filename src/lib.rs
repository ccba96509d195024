//! sBTC Peg-In Client
//!
//! A headless client for depositing BTC into the sBTC peg wallet and
//! receiving the wrapped equivalent on the Stacks ledger.
//!
//! ## Components
//!
//! 1. **Session** - single state machine driving connect → fetch → deposit → confirm
//! 2. **Chain clients** - Esplora (Bitcoin) and Stacks node REST clients
//! 3. **Wallet** - dev wallet providing identity and PSBT signing
//! 4. **Deposit builder** - constructs the unsigned peg-in transaction
//!
//! ## Flow
//!
//! 1. `connect` authenticates the wallet and loads balances, fee rate, and
//!    the current peg address
//! 2. If funds suffice, `deposit` builds the peg-in transaction, collects an
//!    external signature over its PSBT form, finalizes, and broadcasts
//! 3. A polling task watches the broadcast transaction until it confirms,
//!    then keeps the balances fresh

pub mod chain;
pub mod config;
pub mod connect;
pub mod deposit;
pub mod error;
pub mod explorer;
pub mod logging;
pub mod report;
pub mod session;
pub mod signer;

// Re-exports: configuration
pub use config::{ConfigError, Network, PeginConfig};

// Re-exports: root error
pub use error::{PeginError, Result};

// Re-exports: chain clients
pub use chain::bitcoin::{BitcoinApi, BitcoinApiError, EsploraClient, TxStatus, Utxo};
pub use chain::stacks::{StacksApi, StacksApiError, StacksClient};

// Re-exports: session
pub use session::service::{SessionError, SessionService};
pub use session::state::{
    DepositContext, DepositPhase, DepositReceipt, SessionState, WalletSnapshot,
};

// Re-exports: wallet
pub use connect::{ConnectError, DevWallet, WalletConnector, WalletIdentity};
pub use signer::{DepositSigner, SignerError};

/// Satoshi conversion helpers
pub mod units {
    pub const SATS_PER_BTC: u64 = 100_000_000;

    pub fn sats_to_btc(sats: u64) -> f64 {
        sats as f64 / SATS_PER_BTC as f64
    }

    pub fn format_sats(sats: u64) -> String {
        format!("{} sats ({:.8} BTC)", human_readable(sats), sats_to_btc(sats))
    }

    /// Format a satoshi amount with thousands separators
    pub fn human_readable(sats: u64) -> String {
        let digits = sats.to_string();
        let mut out = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                out.push(',');
            }
            out.push(c);
        }
        out
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_human_readable() {
            assert_eq!(human_readable(0), "0");
            assert_eq!(human_readable(999), "999");
            assert_eq!(human_readable(10_000), "10,000");
            assert_eq!(human_readable(1_234_567), "1,234,567");
        }

        #[test]
        fn test_format_sats() {
            let formatted = format_sats(10_000);
            assert!(formatted.contains("10,000 sats"));
            assert!(formatted.contains("0.00010000 BTC"));
        }
    }
}
