//! Chain module - backends for each chain family
//!
//! This module provides:
//! - The `Chain` trait every backend implements
//! - The ledger collaborator interface and its lazily connected provider
//! - Move ledger and EVM backends

mod client;
pub mod evm;
pub mod ledger;
pub mod provider;

#[cfg(test)]
pub use client::MockLedgerClient;
pub use client::{AccountResource, AccountState, Connector, LedgerClient, StaticConnector};
pub use evm::{EvmChain, HttpConnector};
pub use ledger::LedgerChain;
pub use provider::ChainProvider;

use crate::error::PipelineResult;
use crate::tx::{Balance, TransactionDetail, TransactionStatus};

use async_trait::async_trait;

/// Operations every chain backend exposes
#[async_trait]
pub trait Chain: Send + Sync {
    /// Configured chain name
    fn name(&self) -> &str;

    async fn balance_of_address(&self, address: &str) -> PipelineResult<Balance>;

    /// Submit an already signed, hex-encoded transaction
    async fn send_raw_transaction(&self, raw: &str) -> PipelineResult<String>;

    async fn fetch_transaction_detail(&self, hash: &str) -> PipelineResult<TransactionDetail>;

    /// Never fails; errors read as `Failure`
    async fn fetch_transaction_status(&self, hash: &str) -> TransactionStatus;

    /// One status per input hash, in input order
    async fn batch_fetch_transaction_status(&self, hashes: &[String]) -> Vec<TransactionStatus>;
}
