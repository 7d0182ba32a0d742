//! Unsigned transaction assembly from sender account state

use super::types::{Payload, UnsignedTransaction};
use crate::chain::LedgerClient;
use crate::config::ChainConfig;
use crate::error::{PipelineError, PipelineResult};

use tracing::debug;

pub const DEFAULT_MAX_GAS_AMOUNT: u64 = 1000;
pub const DEFAULT_GAS_UNIT_PRICE: u64 = 1;
pub const DEFAULT_EXPIRATION_WINDOW_SECS: u64 = 600;

/// Builds unsigned transactions with fixed gas bounds and expiration window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionBuilder {
    max_gas_amount: u64,
    gas_unit_price: u64,
    expiration_window_secs: u64,
}

impl TransactionBuilder {
    pub fn new(max_gas_amount: u64, gas_unit_price: u64, expiration_window_secs: u64) -> Self {
        Self {
            max_gas_amount,
            gas_unit_price,
            expiration_window_secs,
        }
    }

    pub fn from_config(config: &ChainConfig) -> Self {
        Self::new(
            config.max_gas_amount,
            config.gas_unit_price,
            config.expiration_window_secs,
        )
    }

    /// Read the sender's state and assemble a fresh transaction.
    ///
    /// Sequence number and ledger time come from a single read; a stale
    /// sequence number surfaces later as a submission rejection.
    pub async fn build(
        &self,
        client: &dyn LedgerClient,
        sender: &str,
        payload: Payload,
    ) -> PipelineResult<UnsignedTransaction> {
        let state = client.get_account_state(sender).await.map_err(|e| {
            PipelineError::ChainStateUnavailable {
                address: sender.to_string(),
                message: e.to_string(),
            }
        })?;

        debug!(
            "Building transaction for {} at sequence {}",
            sender, state.sequence_number
        );

        Ok(UnsignedTransaction {
            sender: sender.to_string(),
            sequence_number: state.sequence_number,
            max_gas_amount: self.max_gas_amount,
            gas_unit_price: self.gas_unit_price,
            payload,
            expiration_timestamp_secs: state
                .ledger_timestamp_secs
                .saturating_add(self.expiration_window_secs),
        })
    }
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_GAS_AMOUNT,
            DEFAULT_GAS_UNIT_PRICE,
            DEFAULT_EXPIRATION_WINDOW_SECS,
        )
    }
}
