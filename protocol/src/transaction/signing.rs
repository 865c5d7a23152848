//! Transaction signing with the ledger's Ed25519 key.
//!
//! The signing data is [`Transaction::signable_bytes`]: the ID, the content
//! bytes and the sealed blob. Lifecycle flags are not covered.

use super::builder::Transaction;
use crate::crypto::keys::{SignerKeypair, SignerPublicKey, TxSignature};

/// Signs a transaction in place.
///
/// Stores the hex signature and the signer's hex public key, then sets
/// `verified` from an immediate verification of the fresh signature.
pub fn sign_transaction<'a>(tx: &'a mut Transaction, keypair: &SignerKeypair) -> &'a Transaction {
    let signature = keypair.sign(&tx.signable_bytes());
    tx.signature = signature.to_hex();
    tx.signer = keypair.public_key().to_hex();
    tx.verified = verify_transaction(tx);
    tx
}

/// Checks `tx.signature` against `tx.signer` over the signable bytes.
///
/// Returns `false` for unsigned records and for malformed key or signature
/// hex.
pub fn verify_transaction(tx: &Transaction) -> bool {
    if !tx.is_signed() {
        return false;
    }
    let (Ok(public_key), Ok(signature)) = (
        SignerPublicKey::from_hex(&tx.signer),
        TxSignature::from_hex(&tx.signature),
    ) else {
        return false;
    };
    public_key.verify(&tx.signable_bytes(), &signature)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::builder::TransactionBuilder;
    use crate::transaction::types::Properties;

    fn unsigned() -> Transaction {
        TransactionBuilder::new()
            .properties(Properties {
                shipper: "ACME".into(),
                ..Default::default()
            })
            .timestamp(1_700_000_000_000)
            .build()
    }

    #[test]
    fn sign_sets_signer_and_verified() {
        let kp = SignerKeypair::generate();
        let mut tx = unsigned();
        assert!(!tx.is_signed());
        sign_transaction(&mut tx, &kp);
        assert!(tx.is_signed());
        assert!(tx.verified);
        assert_eq!(tx.signer, kp.public_key().to_hex());
        assert_eq!(tx.signature.len(), 128);
    }

    #[test]
    fn signing_does_not_change_id() {
        let kp = SignerKeypair::generate();
        let mut tx = unsigned();
        let id = tx.id.clone();
        sign_transaction(&mut tx, &kp);
        assert_eq!(tx.id, id);
    }

    #[test]
    fn tampering_breaks_verification() {
        let kp = SignerKeypair::generate();
        let mut tx = unsigned();
        sign_transaction(&mut tx, &kp);
        tx.properties.consignee = "Mallory".into();
        assert!(!verify_transaction(&tx));
    }

    #[test]
    fn unsigned_or_garbled_does_not_verify() {
        let mut tx = unsigned();
        assert!(!verify_transaction(&tx));
        tx.signature = "zz".into();
        tx.signer = "zz".into();
        assert!(!verify_transaction(&tx));
    }
}
