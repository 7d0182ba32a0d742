//! Error types for the transaction pipeline

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use thiserror::Error;
use tracing::error;

/// Main error type for the pipeline
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Chain state unavailable for {address}: {message}")]
    ChainStateUnavailable { address: String, message: String },

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Submission rejected: {reason}")]
    SubmissionRejected { reason: String },

    #[error("Transaction {hash} not found")]
    NotFound { hash: String },

    #[error("Invalid transaction {hash}: {reason}")]
    InvalidTransaction { hash: String, reason: String },

    #[error("Invalid argument {name}: {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("Chain connection error for {chain}: {message}")]
    ChainConnection { chain: String, message: String },

    #[error("Gas estimation error: {0}")]
    GasEstimation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub(crate) fn invalid_transaction(hash: &str, reason: impl Into<String>) -> Self {
        PipelineError::InvalidTransaction {
            hash: hash.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_argument(name: &str, reason: impl Into<String>) -> Self {
        PipelineError::InvalidArgument {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// Check if the caller may retry the same request
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::ChainStateUnavailable { .. } | PipelineError::ChainConnection { .. }
        )
    }

    /// Short label used for metrics
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::ChainStateUnavailable { .. } => "build",
            PipelineError::SigningFailed(_) => "sign",
            PipelineError::SubmissionRejected { .. } => "submit",
            PipelineError::NotFound { .. } => "not_found",
            PipelineError::InvalidTransaction { .. } => "invalid_transaction",
            PipelineError::InvalidArgument { .. } => "invalid_argument",
            PipelineError::ChainConnection { .. } => "connection",
            PipelineError::GasEstimation(_) => "gas",
            PipelineError::Config(_) => "config",
            PipelineError::Internal(_) => "internal",
        }
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Run a public entry point, turning an unexpected panic into `Internal`.
pub async fn guarded<F, T>(operation: &'static str, fut: F) -> PipelineResult<T>
where
    F: Future<Output = PipelineResult<T>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!("Recovered from panic in {}: {}", operation, message);
            Err(PipelineError::Internal(format!("{}: {}", operation, message)))
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
