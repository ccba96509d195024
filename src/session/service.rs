//! Session Service
//!
//! Orchestrates the peg-in flow over the chain clients, the wallet
//! connector, and the external signer:
//!
//! 1. `connect` - authenticate, load wallet and network data, classify funds
//! 2. `deposit` - build → sign → finalize → broadcast, one phase at a time
//! 3. `reset` - back to `Disconnected` from anywhere, cancelling the poller
//!
//! A deposit is a single-in-flight operation keyed on the session state:
//! only a `Ready` session may start one, and a second invocation while one
//! runs is rejected. Each phase has its own failure transition - build and
//! sign failures return the session to `Ready`, finalize/broadcast failures
//! are fatal.

use std::sync::Arc;
use std::time::Duration;

use bitcoin::psbt::Psbt;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::chain::bitcoin::{BitcoinApi, BitcoinApiError};
use crate::chain::stacks::{StacksApi, StacksApiError};
use crate::config::PeginConfig;
use crate::connect::{ConnectError, WalletConnector, WalletIdentity};
use crate::deposit::{
    finalize_deposit, raw_tx_hex, BuilderError, DepositBuilder, DepositRequest, FinalizeError,
};
use crate::session::poller;
use crate::session::state::{
    DepositContext, DepositPhase, DepositReceipt, SessionState, WalletSnapshot,
};
use crate::signer::{DepositSigner, SignerError};

/// Session/orchestration errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("already connected (state {0})")]
    AlreadyConnected(&'static str),

    #[error("authentication cancelled")]
    AuthCancelled,

    #[error("deposit requires READY state, currently {0}")]
    NotReady(&'static str),

    #[error("a deposit is already in flight")]
    DepositInFlight,

    #[error("wallet error: {0}")]
    Connect(#[from] ConnectError),

    #[error("bitcoin chain error: {0}")]
    Bitcoin(#[from] BitcoinApiError),

    #[error("stacks chain error: {0}")]
    Stacks(#[from] StacksApiError),

    #[error("build error: {0}")]
    Builder(#[from] BuilderError),

    #[error("signer error: {0}")]
    Signer(#[from] SignerError),

    #[error("finalize error: {0}")]
    Finalize(#[from] FinalizeError),
}

/// Session-relevant slice of the configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Bitcoin network of addresses and transactions
    pub network: bitcoin::Network,
    /// Deposit amount in satoshis
    pub deposit_sats: u64,
    /// Confirmation/balance poll interval
    pub poll_interval: Duration,
}

impl SessionConfig {
    pub fn from_config(config: &PeginConfig) -> Self {
        Self {
            network: config.network.bitcoin_network(),
            deposit_sats: config.deposit_sats,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
        }
    }
}

/// Drives one wallet session through the peg-in flow
pub struct SessionService {
    config: SessionConfig,
    connector: Arc<dyn WalletConnector>,
    signer: Arc<dyn DepositSigner>,
    btc: Arc<dyn BitcoinApi>,
    stacks: Arc<dyn StacksApi>,
    state: Arc<RwLock<SessionState>>,
    poller: Option<JoinHandle<()>>,
}

impl SessionService {
    /// Create a new disconnected session
    pub fn new(
        config: SessionConfig,
        connector: Arc<dyn WalletConnector>,
        signer: Arc<dyn DepositSigner>,
        btc: Arc<dyn BitcoinApi>,
        stacks: Arc<dyn StacksApi>,
    ) -> Self {
        Self {
            config,
            connector,
            signer,
            btc,
            stacks,
            state: Arc::new(RwLock::new(SessionState::Disconnected)),
            poller: None,
        }
    }

    /// Snapshot of the current session state
    pub async fn state(&self) -> SessionState {
        self.state.read().await.clone()
    }

    /// Whether the confirmation/refresh poller is running
    pub fn poller_active(&self) -> bool {
        self.poller.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Connect the wallet and load session data.
    ///
    /// Lands in `Ready` or `InsufficientFunds`; authentication cancellation
    /// resets the session, any other failure is fatal.
    pub async fn connect(&mut self) -> Result<(), SessionError> {
        {
            let mut current = self.state.write().await;
            if !matches!(*current, SessionState::Disconnected) {
                return Err(SessionError::AlreadyConnected(current.label()));
            }
            *current = SessionState::Connecting;
        }

        let identity = match self.connector.connect().await {
            Ok(identity) => identity,
            Err(ConnectError::Cancelled) => {
                self.reset().await;
                return Err(SessionError::AuthCancelled);
            }
            Err(e) => return Err(self.fail(e.into()).await),
        };
        info!(identity = %identity.identity, "wallet authenticated");

        match self.fetch_session(&identity).await {
            Ok(next) => {
                info!(state = next.label(), "wallet and network data loaded");
                *self.state.write().await = next;
                Ok(())
            }
            Err(e) => Err(self.fail(e).await),
        }
    }

    /// Load balances, fee rate, and peg address for a fresh identity
    async fn fetch_session(
        &self,
        identity: &WalletIdentity,
    ) -> Result<SessionState, SessionError> {
        let btc_address = identity.btc_address.to_string();

        let btc_balance = self.btc.balance(&btc_address).await?;
        let sbtc_balance = self.stacks.sbtc_balance(&identity.stx_address).await?;
        let fee_rate = self.btc.fee_rate().await?;
        let peg_address = self.stacks.peg_address().await?;

        let wallet = WalletSnapshot {
            identity: identity.identity.clone(),
            btc_address: identity.btc_address.clone(),
            stx_address: identity.stx_address.clone(),
            public_key: identity.public_key,
            btc_balance,
            sbtc_balance,
        };
        let deposit = DepositContext {
            peg_address,
            fee_rate,
        };

        Ok(SessionState::from_fetched(
            wallet,
            deposit,
            self.config.deposit_sats,
        ))
    }

    /// Run one peg-in deposit, returning the broadcast txid.
    pub async fn deposit(&mut self) -> Result<String, SessionError> {
        // Single-in-flight guard keyed on session state
        let (wallet, deposit) = {
            let mut current = self.state.write().await;
            match current.clone() {
                SessionState::Ready { wallet, deposit } => {
                    *current = SessionState::Depositing {
                        wallet: wallet.clone(),
                        deposit: deposit.clone(),
                        phase: DepositPhase::Building,
                    };
                    (wallet, deposit)
                }
                SessionState::Depositing { .. } => return Err(SessionError::DepositInFlight),
                other => return Err(SessionError::NotReady(other.label())),
            }
        };

        // Phase 1: build. Nothing is spent yet, so failure recovers.
        let (psbt, unsigned_txid) = match self.build_deposit(&wallet, &deposit).await {
            Ok(built) => built,
            Err(e) => return Err(self.recover_to_ready(wallet, deposit, e).await),
        };
        info!(%unsigned_txid, "deposit transaction prepared");

        // Phase 2: external signature. Refusal recovers.
        self.set_phase(DepositPhase::AwaitingSignature {
            unsigned_txid: unsigned_txid.clone(),
        })
        .await;
        let signed = match self
            .signer
            .sign_psbt(&psbt.serialize(), &wallet.public_key)
            .await
        {
            Ok(signed) => signed,
            Err(e) => return Err(self.recover_to_ready(wallet, deposit, e.into()).await),
        };

        // Phase 3: finalize and broadcast. Past this point the transaction
        // may have reached the network, so failures are fatal.
        self.set_phase(DepositPhase::Broadcasting {
            unsigned_txid: unsigned_txid.clone(),
        })
        .await;
        let tx = match finalize_deposit(&signed) {
            Ok(tx) => tx,
            Err(e) => return Err(self.fail(e.into()).await),
        };
        let txid = match self.btc.broadcast(&raw_tx_hex(&tx)).await {
            Ok(txid) => txid,
            Err(e) => return Err(self.fail(e.into()).await),
        };
        info!(%txid, "deposit broadcast");

        let receipt = DepositReceipt {
            txid: txid.clone(),
            broadcast_at: chrono::Utc::now().timestamp(),
        };
        *self.state.write().await = SessionState::RequestSent {
            wallet,
            deposit,
            receipt,
        };

        self.spawn_poller(txid.clone());
        Ok(txid)
    }

    /// Build the unsigned deposit from fresh fee and UTXO data
    async fn build_deposit(
        &self,
        wallet: &WalletSnapshot,
        deposit: &DepositContext,
    ) -> Result<(Psbt, String), SessionError> {
        let fee_rate = self.btc.fee_rate().await?;
        let utxos = self.btc.utxos(&wallet.btc_address.to_string()).await?;

        let request = DepositRequest {
            peg_address: deposit.peg_address.clone(),
            recipient: wallet.stx_address.clone(),
            amount_sats: self.config.deposit_sats,
            fee_rate,
            change_address: wallet.btc_address.clone(),
        };

        let unsigned = DepositBuilder::new(self.config.network).build(&request, &utxos)?;
        let unsigned_txid = unsigned.txid();
        Ok((unsigned.to_psbt()?, unsigned_txid))
    }

    /// Reset the session from any state: cancel the poller, sign out, and
    /// clear back to `Disconnected`.
    pub async fn reset(&mut self) {
        if let Some(handle) = self.poller.take() {
            handle.abort();
        }
        if let Err(e) = self.connector.sign_out().await {
            warn!(error = %e, "sign-out failed during reset");
        }
        *self.state.write().await = SessionState::Disconnected;
        info!("session reset");
    }

    fn spawn_poller(&mut self, txid: String) {
        self.poller = Some(tokio::spawn(poller::run(
            self.state.clone(),
            self.btc.clone(),
            self.stacks.clone(),
            txid,
            self.config.poll_interval,
        )));
    }

    async fn set_phase(&self, phase: DepositPhase) {
        let mut current = self.state.write().await;
        if let SessionState::Depositing { phase: slot, .. } = &mut *current {
            *slot = phase;
        }
    }

    /// Record a step failure and return the session to `Ready`
    async fn recover_to_ready(
        &self,
        wallet: WalletSnapshot,
        deposit: DepositContext,
        err: SessionError,
    ) -> SessionError {
        warn!(error = %err, "deposit step failed, returning to READY");
        *self.state.write().await = SessionState::Ready { wallet, deposit };
        err
    }

    /// Record a fatal failure
    async fn fail(&self, err: SessionError) -> SessionError {
        error!(error = %err, "session failure");
        *self.state.write().await = SessionState::Failed {
            reason: err.to_string(),
        };
        err
    }
}

impl Drop for SessionService {
    fn drop(&mut self) {
        if let Some(handle) = self.poller.take() {
            handle.abort();
        }
    }
}
