//! Deposit Transaction Builder
//!
//! Builds the unsigned peg-in transaction: a payment of the deposit amount
//! to the peg address, with the Stacks recipient carried in an OP_RETURN
//! data output and change returned to the funding address.

use std::str::FromStr;

use bitcoin::absolute::LockTime;
use bitcoin::psbt::Psbt;
use bitcoin::script::PushBytesBuf;
use bitcoin::transaction::Version;
use bitcoin::{
    Address, Amount, Network, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid,
    Witness,
};

use crate::chain::bitcoin::Utxo;

/// Protocol prefix of the OP_RETURN payload: magic bytes plus the deposit
/// opcode.
const PAYLOAD_PREFIX: &[u8] = b"T2<";

/// Maximum OP_RETURN payload accepted by standardness rules
const MAX_OP_RETURN: usize = 80;

/// Outputs below this many satoshis are treated as dust and folded into
/// the fee.
const DUST_LIMIT: u64 = 546;

// Virtual-size estimates used for fee calculation.
// P2WPKH input: ~68 vbytes, P2WPKH output: ~31 vbytes.
const TX_BASE_VSIZE: usize = 10;
const INPUT_VSIZE: usize = 68;
const OUTPUT_VSIZE: usize = 31;
const OP_RETURN_OVERHEAD: usize = 9;

/// Builder errors
#[derive(Debug, thiserror::Error)]
pub enum BuilderError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid txid: {0}")]
    InvalidTxid(String),

    #[error("recipient does not fit in an OP_RETURN output")]
    RecipientTooLong,

    #[error("insufficient funds: need {required} sats, have {available} sats")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("no UTXOs available")]
    NoUtxos,

    #[error("PSBT error: {0}")]
    Psbt(String),
}

/// Parameters of one peg-in deposit
#[derive(Debug, Clone)]
pub struct DepositRequest {
    /// Peg address receiving the deposit
    pub peg_address: String,
    /// Stacks address to mint the wrapped asset to
    pub recipient: String,
    /// Deposit amount in satoshis
    pub amount_sats: u64,
    /// Fee rate in sat/vB
    pub fee_rate: u64,
    /// Funding address; also receives the change
    pub change_address: Address,
}

/// Builds unsigned peg-in transactions
pub struct DepositBuilder {
    network: Network,
}

impl DepositBuilder {
    /// Create a builder for the given network
    pub fn new(network: Network) -> Self {
        Self { network }
    }

    /// Build an unsigned deposit transaction from spendable outputs
    pub fn build(
        &self,
        request: &DepositRequest,
        utxos: &[Utxo],
    ) -> Result<UnsignedDeposit, BuilderError> {
        if utxos.is_empty() {
            return Err(BuilderError::NoUtxos);
        }

        let peg_address = Address::from_str(&request.peg_address)
            .map_err(|e| BuilderError::InvalidAddress(e.to_string()))?
            .require_network(self.network)
            .map_err(|e| BuilderError::InvalidAddress(e.to_string()))?;

        let payload = recipient_payload(&request.recipient)?;

        // Largest-first selection until the amount plus fee is covered
        let mut candidates: Vec<&Utxo> = utxos.iter().collect();
        candidates.sort_by(|a, b| b.value.cmp(&a.value));

        let mut selected: Vec<Utxo> = Vec::new();
        let mut total_input = 0u64;
        let mut fee = 0u64;
        let mut covered = false;

        for utxo in candidates {
            selected.push(utxo.clone());
            total_input += utxo.value;
            fee = self.estimate_fee(selected.len(), payload.len(), request.fee_rate);
            if total_input >= request.amount_sats + fee {
                covered = true;
                break;
            }
        }

        if !covered {
            let available: u64 = utxos.iter().map(|u| u.value).sum();
            return Err(BuilderError::InsufficientFunds {
                required: request.amount_sats + fee,
                available,
            });
        }

        let inputs: Result<Vec<TxIn>, BuilderError> = selected
            .iter()
            .map(|utxo| {
                let txid = Txid::from_str(&utxo.txid)
                    .map_err(|e| BuilderError::InvalidTxid(e.to_string()))?;

                Ok(TxIn {
                    previous_output: OutPoint {
                        txid,
                        vout: utxo.vout,
                    },
                    script_sig: ScriptBuf::new(),
                    sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
                    witness: Witness::new(),
                })
            })
            .collect();
        let inputs = inputs?;

        let data = PushBytesBuf::try_from(payload).map_err(|_| BuilderError::RecipientTooLong)?;
        let mut outputs = vec![
            // Recipient embed comes first, then the peg payment
            TxOut {
                value: Amount::ZERO,
                script_pubkey: ScriptBuf::new_op_return(data),
            },
            TxOut {
                value: Amount::from_sat(request.amount_sats),
                script_pubkey: peg_address.script_pubkey(),
            },
        ];

        let change = total_input - request.amount_sats - fee;
        let paid_fee = if change > DUST_LIMIT {
            outputs.push(TxOut {
                value: Amount::from_sat(change),
                script_pubkey: request.change_address.script_pubkey(),
            });
            fee
        } else {
            // Dust change is folded into the fee
            total_input - request.amount_sats
        };

        let tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: inputs,
            output: outputs,
        };

        Ok(UnsignedDeposit {
            tx,
            selected,
            fee: paid_fee,
            source_script: request.change_address.script_pubkey(),
        })
    }

    /// Estimate the fee for a deposit spending `num_inputs` outputs
    pub fn estimate_fee(&self, num_inputs: usize, payload_len: usize, fee_rate: u64) -> u64 {
        // Two payment outputs (peg + change) plus the data output
        let vsize = TX_BASE_VSIZE
            + num_inputs * INPUT_VSIZE
            + 2 * OUTPUT_VSIZE
            + OP_RETURN_OVERHEAD
            + payload_len;
        (vsize as u64) * fee_rate
    }
}

/// OP_RETURN payload carrying the Stacks recipient
fn recipient_payload(recipient: &str) -> Result<Vec<u8>, BuilderError> {
    let mut payload = Vec::with_capacity(PAYLOAD_PREFIX.len() + recipient.len());
    payload.extend_from_slice(PAYLOAD_PREFIX);
    payload.extend_from_slice(recipient.as_bytes());

    if payload.len() > MAX_OP_RETURN {
        return Err(BuilderError::RecipientTooLong);
    }
    Ok(payload)
}

/// Unsigned deposit transaction ready for signing
#[derive(Debug, Clone)]
pub struct UnsignedDeposit {
    /// The unsigned transaction
    pub tx: Transaction,
    /// UTXOs being spent
    pub selected: Vec<Utxo>,
    /// Fee in satoshis
    pub fee: u64,
    /// Script of the funding address, shared by every selected output
    source_script: ScriptBuf,
}

impl UnsignedDeposit {
    /// Transaction ID of the unsigned transaction (changes once signed)
    pub fn txid(&self) -> String {
        self.tx.compute_txid().to_string()
    }

    /// Wrap the transaction as a PSBT for the external signer, attaching
    /// the witness UTXO of every input
    pub fn to_psbt(&self) -> Result<Psbt, BuilderError> {
        let mut psbt = Psbt::from_unsigned_tx(self.tx.clone())
            .map_err(|e| BuilderError::Psbt(e.to_string()))?;

        for (index, utxo) in self.selected.iter().enumerate() {
            psbt.inputs[index].witness_utxo = Some(TxOut {
                value: Amount::from_sat(utxo.value),
                script_pubkey: self.source_script.clone(),
            });
        }

        Ok(psbt)
    }
}
