//! Session State Rendering
//!
//! Pure functions from session state to terminal text: one panel per state,
//! plus a diagnostic field dump. The CLI prints these; nothing here feeds
//! back into the session.

use crate::config::Network;
use crate::explorer;
use crate::session::state::{DepositPhase, SessionState};
use crate::units::human_readable;

/// One-line balance banner shown above the panel
pub fn banner(state: &SessionState) -> String {
    match state {
        SessionState::Disconnected => "Connect to proceed".to_string(),
        SessionState::Connecting => "Loading ...".to_string(),
        SessionState::Failed { .. } => "Session failed".to_string(),
        _ => match state.wallet() {
            Some(w) => format!(
                "You currently hold {} BTC sats and {} in sBTC sats.",
                human_readable(w.btc_balance),
                human_readable(w.sbtc_balance)
            ),
            None => "Loading ...".to_string(),
        },
    }
}

/// Panel describing the current state and the action it suggests
pub fn render(state: &SessionState, network: Network, deposit_sats: u64) -> String {
    match state {
        SessionState::Disconnected => {
            format!(
                "Deposit your satoshis.\nTransfer {} satoshis to the peg-in.\n\n-> run `pegin deposit` to connect a wallet",
                human_readable(deposit_sats)
            )
        }
        SessionState::Connecting => {
            "Loading necessary data from your wallet and the chain...".to_string()
        }
        SessionState::Ready { wallet, deposit } => {
            format!(
                "The sats will be sent from your BTC address\n  {}\nto the peg address\n  {}\nYou will receive the equal amount of sBTC to your STX address\n  {}\n[{} sat/vB fee]",
                explorer::btc_address_url(network, &wallet.btc_address.to_string()),
                explorer::btc_address_url(network, &deposit.peg_address),
                explorer::stx_address_url(network, &wallet.stx_address),
                deposit.fee_rate
            )
        }
        SessionState::InsufficientFunds { .. } => {
            "Your BTC account does not contain enough Satoshis. Top it up before proceeding."
                .to_string()
        }
        SessionState::Depositing { phase, .. } => match phase {
            DepositPhase::Building => "Preparing the deposit transaction...".to_string(),
            DepositPhase::AwaitingSignature { unsigned_txid } => {
                format!("Waiting for signature over transaction {}", unsigned_txid)
            }
            DepositPhase::Broadcasting { unsigned_txid } => {
                format!("Broadcasting transaction {}", unsigned_txid)
            }
        },
        SessionState::RequestSent { receipt, .. } => {
            format!(
                "Waiting for confirmations (see {})",
                explorer::btc_tx_url(network, &receipt.txid)
            )
        }
        SessionState::Confirmed { receipt, .. } => {
            format!(
                "Transaction confirmed (see {})",
                explorer::btc_tx_url(network, &receipt.txid)
            )
        }
        SessionState::Failed { reason } => {
            format!("Session failed: {}\n\n-> run `pegin deposit` again to retry from scratch", reason)
        }
    }
}

/// Diagnostic dump of everything known in the current state
pub fn field_dump(state: &SessionState) -> String {
    let mut lines = vec![format!("State: {}", state.label())];

    match state.wallet() {
        Some(wallet) => {
            lines.push(format!("Decentralized ID: {}", wallet.identity));
            lines.push(format!("BTC Address: {}", wallet.btc_address));
            lines.push(format!("STX Address: {}", wallet.stx_address));
            lines.push(format!("BTC Public Key: {}", wallet.public_key));
            lines.push(format!("BTC Balance: {}", wallet.btc_balance));
            lines.push(format!("sBTC Balance: {}", wallet.sbtc_balance));
        }
        None => lines.push("Wallet: not connected".to_string()),
    }

    match state {
        SessionState::Ready { deposit, .. }
        | SessionState::InsufficientFunds { deposit, .. }
        | SessionState::Depositing { deposit, .. }
        | SessionState::RequestSent { deposit, .. }
        | SessionState::Confirmed { deposit, .. } => {
            lines.push(format!("sBTC Peg Address: {}", deposit.peg_address));
            lines.push(format!("Fee Rate: {}", deposit.fee_rate));
        }
        _ => {}
    }

    if let SessionState::Depositing { phase, .. } = state {
        match phase {
            DepositPhase::Building => lines.push("Transaction not prepared...".to_string()),
            _ => lines.push("Transaction prepared".to_string()),
        }
    }

    match state.receipt() {
        Some(receipt) => lines.push(format!("Transaction finalized: {}", receipt.txid)),
        None => lines.push("Transaction not finalized...".to_string()),
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::state::{DepositContext, DepositReceipt, WalletSnapshot};
    use bitcoin::key::{CompressedPublicKey, Secp256k1};
    use bitcoin::PublicKey;
    use secp256k1::SecretKey;

    fn snapshot() -> WalletSnapshot {
        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(&[0x11; 32]).unwrap();
        let public_key = PublicKey::new(secret_key.public_key(&secp));
        let compressed = CompressedPublicKey(public_key.inner);
        let btc_address = bitcoin::Address::p2wpkh(&compressed, bitcoin::Network::Testnet);

        WalletSnapshot {
            identity: "did:btc-addr:test".to_string(),
            btc_address,
            stx_address: "ST1TEST".to_string(),
            public_key,
            btc_balance: 50_000,
            sbtc_balance: 12_000,
        }
    }

    #[test]
    fn test_banner_per_state() {
        assert_eq!(banner(&SessionState::Disconnected), "Connect to proceed");
        assert_eq!(banner(&SessionState::Connecting), "Loading ...");

        let ready = SessionState::Ready {
            wallet: snapshot(),
            deposit: DepositContext {
                peg_address: "tb1ppeg".to_string(),
                fee_rate: 4,
            },
        };
        let text = banner(&ready);
        assert!(text.contains("50,000"));
        assert!(text.contains("12,000"));
    }

    #[test]
    fn test_render_ready_links_addresses() {
        let ready = SessionState::Ready {
            wallet: snapshot(),
            deposit: DepositContext {
                peg_address: "tb1ppeg".to_string(),
                fee_rate: 4,
            },
        };
        let text = render(&ready, Network::Testnet, 10_000);
        assert!(text.contains("mempool.space/testnet/address/tb1ppeg"));
        assert!(text.contains("explorer.hiro.so/address/ST1TEST"));
        assert!(text.contains("4 sat/vB fee"));
    }

    #[test]
    fn test_render_waiting_links_transaction() {
        let sent = SessionState::RequestSent {
            wallet: snapshot(),
            deposit: DepositContext {
                peg_address: "tb1ppeg".to_string(),
                fee_rate: 4,
            },
            receipt: DepositReceipt {
                txid: "c".repeat(64),
                broadcast_at: 1_700_000_000,
            },
        };
        let text = render(&sent, Network::Testnet, 10_000);
        assert!(text.contains("Waiting for confirmations"));
        assert!(text.contains(&format!("tx/{}", "c".repeat(64))));
    }

    #[test]
    fn test_field_dump_tracks_state() {
        let dump = field_dump(&SessionState::Disconnected);
        assert!(dump.contains("State: DISCONNECTED"));
        assert!(dump.contains("not connected"));

        let confirmed = SessionState::Confirmed {
            wallet: snapshot(),
            deposit: DepositContext {
                peg_address: "tb1ppeg".to_string(),
                fee_rate: 4,
            },
            receipt: DepositReceipt {
                txid: "c".repeat(64),
                broadcast_at: 1_700_000_000,
            },
        };
        let dump = field_dump(&confirmed);
        assert!(dump.contains("State: CONFIRMED"));
        assert!(dump.contains("Transaction finalized"));
        assert!(dump.contains("sBTC Peg Address: tb1ppeg"));
    }
}
