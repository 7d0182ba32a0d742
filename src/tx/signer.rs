//! Signing capability and signature attachment

use super::types::{SignedTransaction, TransactionSignature, UnsignedTransaction};
use crate::chain::LedgerClient;
use crate::error::{PipelineError, PipelineResult};

use ed25519_dalek::{Signer, SigningKey};
use sha3::{Digest, Sha3_256};
use std::fmt;
use tracing::debug;

pub const ED25519_SIGNATURE: &str = "ed25519_signature";

/// Authentication scheme byte for single ed25519 keys
const ED25519_SCHEME: u8 = 0x00;

/// An account able to sign arbitrary messages
pub trait Account: Send + Sync {
    fn address(&self) -> String;

    /// 0x-prefixed hex public key
    fn public_key_hex(&self) -> String;

    /// Tag attached next to the signature
    fn signature_type(&self) -> &str {
        ED25519_SIGNATURE
    }

    fn sign(&self, message: &[u8]) -> PipelineResult<Vec<u8>>;
}

/// In-memory ed25519 account
pub struct Ed25519Account {
    signing_key: SigningKey,
    address: String,
}

impl Ed25519Account {
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);

        let mut hasher = Sha3_256::new();
        hasher.update(signing_key.verifying_key().as_bytes());
        hasher.update([ED25519_SCHEME]);
        let address = format!("0x{}", hex::encode(hasher.finalize()));

        Self {
            signing_key,
            address,
        }
    }

    /// Parse a 0x-optional hex seed
    pub fn from_hex(seed: &str) -> PipelineResult<Self> {
        let bytes = hex::decode(seed.trim_start_matches("0x"))
            .map_err(|e| PipelineError::invalid_argument("seed", e.to_string()))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| PipelineError::invalid_argument("seed", "expected 32 bytes"))?;
        Ok(Self::from_seed(&seed))
    }
}

impl Account for Ed25519Account {
    fn address(&self) -> String {
        self.address.clone()
    }

    fn public_key_hex(&self) -> String {
        format!("0x{}", hex::encode(self.signing_key.verifying_key().as_bytes()))
    }

    fn sign(&self, message: &[u8]) -> PipelineResult<Vec<u8>> {
        Ok(self.signing_key.sign(message).to_bytes().to_vec())
    }
}

impl fmt::Debug for Ed25519Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519Account")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Sign the exact encoding of `transaction` and attach the signature.
///
/// Gas and sequence fields are carried over untouched.
pub async fn sign_transaction(
    client: &dyn LedgerClient,
    account: &dyn Account,
    transaction: UnsignedTransaction,
) -> PipelineResult<SignedTransaction> {
    let message = client
        .create_signing_message(&transaction)
        .await
        .map_err(|e| PipelineError::SigningFailed(format!("signing message: {}", e)))?;

    let signature = account
        .sign(&message)
        .map_err(|e| PipelineError::SigningFailed(e.to_string()))?;

    debug!(
        "Signed transaction {}#{} ({} byte message)",
        transaction.sender,
        transaction.sequence_number,
        message.len()
    );

    Ok(SignedTransaction {
        transaction,
        signature: TransactionSignature {
            signature_type: account.signature_type().to_string(),
            public_key: account.public_key_hex(),
            signature: format!("0x{}", hex::encode(signature)),
        },
    })
}
