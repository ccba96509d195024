//! Peg-In Deposit Construction
//!
//! - **builder**: assembles the unsigned deposit transaction and its PSBT
//! - finalization: turns the externally signed PSBT back into a
//!   broadcast-ready transaction

pub mod builder;

pub use builder::{BuilderError, DepositBuilder, DepositRequest, UnsignedDeposit};

use bitcoin::psbt::Psbt;
use bitcoin::{Transaction, Witness};
use thiserror::Error;

/// Finalization errors
#[derive(Debug, Error)]
pub enum FinalizeError {
    #[error("invalid PSBT: {0}")]
    InvalidPsbt(String),

    #[error("input {0} is missing a signature")]
    MissingSignature(usize),

    #[error("extraction failed: {0}")]
    Extract(String),
}

/// Finalize a signed PSBT into a fully signed transaction.
///
/// Every input must carry either a final witness or exactly the partial
/// signature produced by the P2WPKH signer.
pub fn finalize_deposit(psbt_bytes: &[u8]) -> Result<Transaction, FinalizeError> {
    let mut psbt =
        Psbt::deserialize(psbt_bytes).map_err(|e| FinalizeError::InvalidPsbt(e.to_string()))?;

    for (index, input) in psbt.inputs.iter_mut().enumerate() {
        if input.final_script_witness.is_some() {
            continue;
        }

        let (pubkey, signature) = input
            .partial_sigs
            .iter()
            .next()
            .map(|(pk, sig)| (*pk, *sig))
            .ok_or(FinalizeError::MissingSignature(index))?;

        input.final_script_witness = Some(Witness::p2wpkh(&signature, &pubkey.inner));
        input.partial_sigs.clear();
    }

    psbt.extract_tx()
        .map_err(|e| FinalizeError::Extract(e.to_string()))
}

/// Serialize a transaction to the hex form expected by broadcast endpoints
pub fn raw_tx_hex(tx: &Transaction) -> String {
    hex::encode(bitcoin::consensus::encode::serialize(tx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::bitcoin::Utxo;
    use crate::signer::sign_psbt_inputs;
    use bitcoin::key::{CompressedPublicKey, Secp256k1};
    use bitcoin::{Address, Network, PublicKey};
    use secp256k1::SecretKey;

    #[test]
    fn test_build_sign_finalize_roundtrip() {
        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(&[0x11; 32]).unwrap();
        let public_key = PublicKey::new(secret_key.public_key(&secp));
        let compressed = CompressedPublicKey(public_key.inner);
        let funding = Address::p2wpkh(&compressed, Network::Testnet);

        let (peg_xonly, _) = SecretKey::from_slice(&[0x33; 32])
            .unwrap()
            .public_key(&secp)
            .x_only_public_key();
        let peg = Address::p2tr(&secp, peg_xonly, None, Network::Testnet);

        let request = DepositRequest {
            peg_address: peg.to_string(),
            recipient: "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM".to_string(),
            amount_sats: 10_000,
            fee_rate: 2,
            change_address: funding.clone(),
        };

        let utxos = vec![Utxo {
            txid: "a".repeat(64),
            vout: 1,
            value: 50_000,
            block_height: Some(100),
        }];

        let unsigned = DepositBuilder::new(Network::Testnet)
            .build(&request, &utxos)
            .unwrap();
        let psbt = unsigned.to_psbt().unwrap();

        let signed = sign_psbt_inputs(&psbt.serialize(), &secret_key, &public_key).unwrap();
        let tx = finalize_deposit(&signed).unwrap();

        assert_eq!(tx.input.len(), 1);
        assert_eq!(tx.input[0].witness.len(), 2); // signature + pubkey
        assert_eq!(tx.output.len(), unsigned.tx.output.len());
        assert!(!raw_tx_hex(&tx).is_empty());
    }

    #[test]
    fn test_finalize_requires_signature() {
        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(&[0x11; 32]).unwrap();
        let compressed = CompressedPublicKey(secret_key.public_key(&secp));
        let funding = Address::p2wpkh(&compressed, Network::Testnet);

        let (peg_xonly, _) = SecretKey::from_slice(&[0x33; 32])
            .unwrap()
            .public_key(&secp)
            .x_only_public_key();
        let peg = Address::p2tr(&secp, peg_xonly, None, Network::Testnet);

        let request = DepositRequest {
            peg_address: peg.to_string(),
            recipient: "ST1TEST".to_string(),
            amount_sats: 10_000,
            fee_rate: 2,
            change_address: funding,
        };

        let utxos = vec![Utxo {
            txid: "b".repeat(64),
            vout: 0,
            value: 50_000,
            block_height: None,
        }];

        let unsigned = DepositBuilder::new(Network::Testnet)
            .build(&request, &utxos)
            .unwrap();
        let psbt = unsigned.to_psbt().unwrap();

        // never signed
        let result = finalize_deposit(&psbt.serialize());
        assert!(matches!(result, Err(FinalizeError::MissingSignature(0))));
    }

    #[test]
    fn test_finalize_rejects_garbage() {
        assert!(matches!(
            finalize_deposit(&[0x00, 0x01]),
            Err(FinalizeError::InvalidPsbt(_))
        ));
    }
}
