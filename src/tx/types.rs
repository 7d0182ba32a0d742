//! Transaction records shared by the builder, signer, sender and normalizer
//!
//! The wire shapes follow the JSON representation used by Move ledgers:
//! 64-bit integers travel as decimal strings.

use crate::error::{PipelineError, PipelineResult};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic kind of a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    #[serde(rename = "entry_function_payload")]
    EntryFunction,
    #[serde(rename = "script_payload")]
    Script,
    #[serde(rename = "module_bundle_payload")]
    ModuleBundle,
    #[serde(rename = "multisig_payload")]
    Multisig,
    #[serde(other)]
    Unknown,
}

/// Chain-specific instruction produced by an external encoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(rename = "type")]
    pub kind: PayloadKind,
    #[serde(default)]
    pub function: String,
    #[serde(default)]
    pub type_arguments: Vec<String>,
    #[serde(default)]
    pub arguments: Vec<serde_json::Value>,
}

impl Payload {
    /// Entry-function payload addressing `function` with positional arguments
    pub fn entry_function(
        function: impl Into<String>,
        type_arguments: Vec<String>,
        arguments: Vec<serde_json::Value>,
    ) -> Self {
        Self {
            kind: PayloadKind::EntryFunction,
            function: function.into(),
            type_arguments,
            arguments,
        }
    }

    /// Reject payloads no ledger would accept: unknown kinds, and entry
    /// functions not named `address::module::function`.
    pub fn validate(&self) -> PipelineResult<()> {
        match self.kind {
            PayloadKind::Unknown => Err(PipelineError::invalid_argument(
                "payload",
                "unknown payload kind",
            )),
            PayloadKind::EntryFunction => validate_function_id(&self.function),
            _ => Ok(()),
        }
    }
}

fn validate_function_id(function: &str) -> PipelineResult<()> {
    let mut parts = function.split("::");
    let (address, module, name) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(address), Some(module), Some(name), None) => (address, module, name),
        _ => {
            return Err(PipelineError::invalid_argument(
                "function",
                "expected address::module::function",
            ))
        }
    };

    validate_hex_id("function", address)?;
    let identifier = |s: &str| {
        !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
    };
    if !identifier(module) || !identifier(name) {
        return Err(PipelineError::invalid_argument("function", "malformed identifier"));
    }
    Ok(())
}

/// Transaction before a signature is attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnsignedTransaction {
    pub sender: String,
    #[serde(with = "u64_string")]
    pub sequence_number: u64,
    #[serde(with = "u64_string")]
    pub max_gas_amount: u64,
    #[serde(with = "u64_string")]
    pub gas_unit_price: u64,
    pub payload: Payload,
    #[serde(with = "u64_string")]
    pub expiration_timestamp_secs: u64,
}

/// Signature block attached by the signer adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSignature {
    #[serde(rename = "type")]
    pub signature_type: String,
    pub public_key: String,
    pub signature: String,
}

/// Submittable transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedTransaction {
    #[serde(flatten)]
    pub transaction: UnsignedTransaction,
    pub signature: TransactionSignature,
}

/// Record type reported by the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    UserTransaction,
    PendingTransaction,
    GenesisTransaction,
    BlockMetadataTransaction,
    StateCheckpointTransaction,
    #[serde(other)]
    Other,
}

/// Transaction record as returned by `GetTransactionByHash`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub hash: String,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub payload: Option<Payload>,
    #[serde(default, with = "u64_string::option")]
    pub gas_unit_price: Option<u64>,
    #[serde(default, with = "u64_string::option")]
    pub gas_used: Option<u64>,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub vm_status: Option<String>,
    /// Commit time in microseconds
    #[serde(default, with = "u64_string::option")]
    pub timestamp: Option<u64>,
}

impl RawTransaction {
    /// Status classification of this record
    pub fn status(&self) -> TransactionStatus {
        match (self.kind, self.success) {
            (TransactionType::PendingTransaction, _) => TransactionStatus::Pending,
            (_, Some(true)) => TransactionStatus::Success,
            _ => TransactionStatus::Failure,
        }
    }
}

/// Terminal classification of a transaction hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failure,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Success => "success",
            TransactionStatus::Failure => "failure",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chain-agnostic transaction detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDetail {
    pub hash: String,
    pub from_address: String,
    pub to_address: Option<String>,
    pub amount: Option<String>,
    pub estimate_fees: String,
    pub status: TransactionStatus,
    pub failure_message: Option<String>,
    /// Seconds since the epoch
    pub finish_timestamp: u64,
}

/// Account balance in the chain's smallest unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub total: String,
    pub usable: String,
}

impl Balance {
    pub fn new(amount: impl Into<String>) -> Self {
        let amount = amount.into();
        Self {
            total: amount.clone(),
            usable: amount,
        }
    }

    pub fn zero() -> Self {
        Self::new("0")
    }
}

/// Longest address or hash in hex digits
const MAX_HEX_ID_DIGITS: usize = 64;

/// Check a `0x`-prefixed hex identifier of up to 32 bytes
pub(crate) fn validate_hex_id(name: &str, value: &str) -> PipelineResult<()> {
    let digits = value
        .strip_prefix("0x")
        .ok_or_else(|| PipelineError::invalid_argument(name, "missing 0x prefix"))?;

    if digits.is_empty() || digits.len() > MAX_HEX_ID_DIGITS {
        return Err(PipelineError::invalid_argument(
            name,
            format!("expected 1 to {} hex digits", MAX_HEX_ID_DIGITS),
        ));
    }
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(PipelineError::invalid_argument(name, "not hex"));
    }
    Ok(())
}

/// Serde adapter for 64-bit integers encoded as decimal strings.
/// Plain JSON numbers are accepted on input.
pub(crate) mod u64_string {
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Number(u64),
    }

    fn parse<E: de::Error>(repr: Repr) -> Result<u64, E> {
        match repr {
            Repr::Number(value) => Ok(value),
            Repr::Text(text) => text.parse().map_err(E::custom),
        }
    }

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        parse(Repr::deserialize(deserializer)?)
    }

    pub mod option {
        use super::{parse, Repr};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<u64>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => serializer.serialize_str(&value.to_string()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<u64>, D::Error> {
            match Option::<Repr>::deserialize(deserializer)? {
                Some(repr) => parse(repr).map(Some),
                None => Ok(None),
            }
        }
    }
}
