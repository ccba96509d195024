//! External Transaction Signer
//!
//! The `DepositSigner` trait models the host-injected signing capability:
//! it accepts a serialized unsigned-transaction PSBT plus the public key to
//! sign for, and returns the serialized signed PSBT. The development-network
//! implementation lives on [`crate::connect::DevWallet`]; this module holds
//! the trait and the P2WPKH signing routine it uses.

use async_trait::async_trait;
use bitcoin::hashes::Hash;
use bitcoin::key::{CompressedPublicKey, Secp256k1};
use bitcoin::psbt::Psbt;
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::PublicKey;
use secp256k1::{Message, SecretKey};
use thiserror::Error;

/// Signer errors
#[derive(Debug, Error)]
pub enum SignerError {
    #[error("signing refused")]
    Refused,

    #[error("signer does not hold key {0}")]
    UnknownKey(String),

    #[error("invalid PSBT: {0}")]
    InvalidPsbt(String),

    #[error("signing failed: {0}")]
    SigningFailed(String),
}

/// External signing capability
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DepositSigner: Send + Sync {
    /// Sign a serialized PSBT for the given public key, returning the
    /// serialized signed PSBT
    async fn sign_psbt(
        &self,
        psbt_bytes: &[u8],
        public_key: &PublicKey,
    ) -> Result<Vec<u8>, SignerError>;
}

/// Sign every P2WPKH input spendable by `public_key`.
///
/// Inputs whose `witness_utxo` does not pay to the key are left untouched,
/// matching what a wallet does with a PSBT containing foreign inputs.
pub fn sign_psbt_inputs(
    psbt_bytes: &[u8],
    secret_key: &SecretKey,
    public_key: &PublicKey,
) -> Result<Vec<u8>, SignerError> {
    let mut psbt =
        Psbt::deserialize(psbt_bytes).map_err(|e| SignerError::InvalidPsbt(e.to_string()))?;

    let secp = Secp256k1::new();
    let compressed = CompressedPublicKey(public_key.inner);
    let our_script = bitcoin::ScriptBuf::new_p2wpkh(&compressed.wpubkey_hash());

    let unsigned_tx = psbt.unsigned_tx.clone();
    let mut cache = SighashCache::new(&unsigned_tx);
    let mut signed = 0usize;

    for (index, input) in psbt.inputs.iter_mut().enumerate() {
        let Some(witness_utxo) = input.witness_utxo.as_ref() else {
            continue;
        };
        if witness_utxo.script_pubkey != our_script {
            continue;
        }

        let sighash = cache
            .p2wpkh_signature_hash(
                index,
                &witness_utxo.script_pubkey,
                witness_utxo.value,
                EcdsaSighashType::All,
            )
            .map_err(|e| SignerError::SigningFailed(e.to_string()))?;

        let msg = Message::from_digest(sighash.to_byte_array());
        let signature = secp.sign_ecdsa(&msg, secret_key);

        let btc_signature = bitcoin::ecdsa::Signature {
            signature,
            sighash_type: EcdsaSighashType::All,
        };

        input.partial_sigs.insert(*public_key, btc_signature);
        signed += 1;
    }

    if signed == 0 {
        return Err(SignerError::SigningFailed(
            "no inputs spendable by this key".to_string(),
        ));
    }

    Ok(psbt.serialize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::absolute::LockTime;
    use bitcoin::transaction::Version;
    use bitcoin::{
        Address, Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness,
    };
    use std::str::FromStr;

    fn keyed_psbt() -> (Psbt, SecretKey, PublicKey) {
        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(&[0x11; 32]).unwrap();
        let public_key = PublicKey::new(secret_key.public_key(&secp));
        let compressed = CompressedPublicKey(public_key.inner);
        let address = Address::p2wpkh(&compressed, bitcoin::Network::Testnet);

        let tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint {
                    txid: Txid::from_str(
                        "1111111111111111111111111111111111111111111111111111111111111111",
                    )
                    .unwrap(),
                    vout: 0,
                },
                script_sig: ScriptBuf::new(),
                sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
                witness: Witness::new(),
            }],
            output: vec![TxOut {
                value: Amount::from_sat(40_000),
                script_pubkey: address.script_pubkey(),
            }],
        };

        let mut psbt = Psbt::from_unsigned_tx(tx).unwrap();
        psbt.inputs[0].witness_utxo = Some(TxOut {
            value: Amount::from_sat(50_000),
            script_pubkey: address.script_pubkey(),
        });

        (psbt, secret_key, public_key)
    }

    #[test]
    fn test_sign_adds_partial_sig() {
        let (psbt, secret_key, public_key) = keyed_psbt();

        let signed = sign_psbt_inputs(&psbt.serialize(), &secret_key, &public_key).unwrap();
        let signed = Psbt::deserialize(&signed).unwrap();

        assert_eq!(signed.inputs[0].partial_sigs.len(), 1);
        assert!(signed.inputs[0].partial_sigs.contains_key(&public_key));
    }

    #[test]
    fn test_sign_skips_foreign_inputs() {
        let (psbt, _, _) = keyed_psbt();

        let secp = Secp256k1::new();
        let other_key = SecretKey::from_slice(&[0x22; 32]).unwrap();
        let other_pub = PublicKey::new(other_key.public_key(&secp));

        // None of the inputs pay to the other key
        let result = sign_psbt_inputs(&psbt.serialize(), &other_key, &other_pub);
        assert!(matches!(result, Err(SignerError::SigningFailed(_))));
    }

    #[test]
    fn test_sign_rejects_garbage() {
        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(&[0x11; 32]).unwrap();
        let public_key = PublicKey::new(secret_key.public_key(&secp));

        let result = sign_psbt_inputs(&[0xde, 0xad], &secret_key, &public_key);
        assert!(matches!(result, Err(SignerError::InvalidPsbt(_))));
    }
}
