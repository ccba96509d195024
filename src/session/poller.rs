//! Confirmation Poller
//!
//! One scoped task per broadcast deposit. It polls the transaction's
//! confirmation status on a fixed interval; on the first confirmed result it
//! stops polling for confirmation, moves the session to `Confirmed`, and
//! switches to refreshing the wallet balances on the same interval until the
//! session is reset. The owning session aborts the task on reset and on
//! drop, so no timer outlives its session.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::chain::bitcoin::BitcoinApi;
use crate::chain::stacks::StacksApi;
use crate::session::state::SessionState;

/// Poll until the transaction confirms, then keep balances fresh.
pub async fn run(
    state: Arc<RwLock<SessionState>>,
    btc: Arc<dyn BitcoinApi>,
    stacks: Arc<dyn StacksApi>,
    txid: String,
    period: Duration,
) {
    let mut ticker = interval(period);

    // Phase 1: wait for confirmation. Transient query failures skip the
    // tick rather than killing the poller.
    loop {
        ticker.tick().await;
        match btc.tx_status(&txid).await {
            Ok(status) if status.confirmed => break,
            Ok(_) => debug!(%txid, "deposit not yet confirmed"),
            Err(e) => warn!(%txid, error = %e, "confirmation query failed"),
        }
    }

    // The session may have been reset while we slept; only the expected
    // transition is applied.
    {
        let mut current = state.write().await;
        match current.clone() {
            SessionState::RequestSent {
                wallet,
                deposit,
                receipt,
            } if receipt.txid == txid => {
                *current = SessionState::Confirmed {
                    wallet,
                    deposit,
                    receipt,
                };
            }
            _ => return,
        }
    }
    info!(%txid, "deposit confirmed");

    // Phase 2: refresh balances until the session goes away.
    loop {
        ticker.tick().await;

        let (btc_address, stx_address) = match &*state.read().await {
            SessionState::Confirmed { wallet, .. } => {
                (wallet.btc_address.to_string(), wallet.stx_address.clone())
            }
            _ => return,
        };

        let btc_balance = match btc.balance(&btc_address).await {
            Ok(balance) => balance,
            Err(e) => {
                warn!(error = %e, "balance refresh failed");
                continue;
            }
        };
        let sbtc_balance = match stacks.sbtc_balance(&stx_address).await {
            Ok(balance) => balance,
            Err(e) => {
                warn!(error = %e, "sBTC balance refresh failed");
                continue;
            }
        };

        let mut current = state.write().await;
        if let SessionState::Confirmed { wallet, .. } = &mut *current {
            wallet.btc_balance = btc_balance;
            wallet.sbtc_balance = sbtc_balance;
        } else {
            return;
        }
    }
}
