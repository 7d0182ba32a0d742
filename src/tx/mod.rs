//! Transaction pipeline: build, option hook, sign, submit, query and fees

mod builder;
mod gas;
mod normalize;
mod option;
mod sender;
mod signer;
mod status;
mod types;

pub use builder::{
    TransactionBuilder, DEFAULT_EXPIRATION_WINDOW_SECS, DEFAULT_GAS_UNIT_PRICE,
    DEFAULT_MAX_GAS_AMOUNT,
};
pub use gas::{
    compute_fee_tiers, FeeObservation, FeeRate, FeeSource, FeeTier, FeeTiers, GasFeeTier,
};
pub use normalize::normalize_transaction;
pub use option::{GasOverride, TransactionOption};
pub use sender::TransactionSender;
pub use signer::{sign_transaction, Account, Ed25519Account, ED25519_SIGNATURE};
pub use status::{collapse_status, fan_out, fetch_detail, fetch_status};
pub use types::{
    Balance, Payload, PayloadKind, RawTransaction, SignedTransaction, TransactionDetail,
    TransactionSignature, TransactionStatus, TransactionType, UnsignedTransaction,
};

pub(crate) use types::validate_hex_id;
