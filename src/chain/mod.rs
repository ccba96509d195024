//! Chain Service Clients
//!
//! Thin async clients for the two ledgers the peg-in flow touches:
//!
//! - **bitcoin**: Esplora REST client for balances, UTXOs, fee estimates,
//!   broadcast, and confirmation status
//! - **stacks**: Stacks node REST client for the wrapped-asset balance and
//!   the current peg address
//! - **clarity**: minimal decoder for hex-encoded Clarity values returned
//!   by read-only contract calls
//!
//! Each client resolves with the queried value or fails with a typed error;
//! there is no caching, retry, or timeout layer here. Callers decide how a
//! failure maps onto the session state machine.

pub mod bitcoin;
pub mod clarity;
pub mod stacks;

pub use bitcoin::{BitcoinApi, BitcoinApiError, EsploraClient, TxStatus, Utxo};
pub use clarity::{ClarityError, ClarityValue};
pub use stacks::{StacksApi, StacksApiError, StacksClient};
