//! Peg-In Session
//!
//! The session ties the whole flow together:
//!
//! ```text
//! DISCONNECTED → CONNECTING → READY → DEPOSITING → REQUEST_SENT → CONFIRMED
//!                          ↘ INSUFFICIENT_FUNDS
//! ```
//!
//! ## Components
//!
//! - **state**: the tagged-union state machine and the funds-sufficiency rule
//! - **service**: the orchestrator driving connect, deposit, and reset
//! - **poller**: the scoped confirmation/balance-refresh task

pub mod poller;
pub mod service;
pub mod state;

pub use service::{SessionConfig, SessionError, SessionService};
pub use state::{
    funds_sufficient, DepositContext, DepositPhase, DepositReceipt, SessionState, WalletSnapshot,
    FEE_VSIZE_ASSUMPTION,
};
