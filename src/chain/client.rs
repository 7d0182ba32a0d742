//! Network collaborator interface for Move ledgers
//!
//! Implementations own transport, retries and connection pooling. Errors they
//! return are surfaced unchanged, except where the pipeline wraps them into
//! its own taxonomy (account state and signing message failures).

use crate::error::PipelineResult;
use crate::tx::{RawTransaction, SignedTransaction, UnsignedTransaction};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Sequencing state read once per build attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    pub sequence_number: u64,
    /// Current ledger time in seconds
    pub ledger_timestamp_secs: u64,
}

/// Structured on-chain resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountResource {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub data: serde_json::Value,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Sequence number and ledger timestamp, read together
    async fn get_account_state(&self, address: &str) -> PipelineResult<AccountState>;

    /// Canonical bytes to sign for `transaction`
    async fn create_signing_message(
        &self,
        transaction: &UnsignedTransaction,
    ) -> PipelineResult<Vec<u8>>;

    /// Submit and return the transaction hash.
    ///
    /// Synchronous rejections must be reported as `SubmissionRejected`.
    async fn submit_transaction(&self, transaction: &SignedTransaction) -> PipelineResult<String>;

    /// `None` when the hash is unknown
    async fn get_transaction_by_hash(&self, hash: &str) -> PipelineResult<Option<RawTransaction>>;

    /// `None` when the account has no such resource
    async fn get_account_resource(
        &self,
        address: &str,
        resource_type: &str,
    ) -> PipelineResult<Option<AccountResource>>;
}

/// Creates a client for a chain URL
#[async_trait]
pub trait Connector<C: ?Sized>: Send + Sync {
    async fn connect(&self, url: &str) -> PipelineResult<Arc<C>>;
}

/// Connector handing out a client created elsewhere
pub struct StaticConnector<C: ?Sized> {
    client: Arc<C>,
}

impl<C: ?Sized> StaticConnector<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C: ?Sized + Send + Sync> Connector<C> for StaticConnector<C> {
    async fn connect(&self, _url: &str) -> PipelineResult<Arc<C>> {
        Ok(self.client.clone())
    }
}
