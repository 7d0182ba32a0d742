//! Build, sign and submit pipeline for ledger transactions

use super::builder::TransactionBuilder;
use super::option::TransactionOption;
use super::signer::{sign_transaction, Account};
use super::types::{validate_hex_id, Payload, SignedTransaction};
use crate::chain::LedgerClient;
use crate::error::{PipelineError, PipelineResult};

use tracing::{debug, info, warn};

/// Single-shot transaction submission.
///
/// Each call reads fresh account state, applies at most one option, signs
/// once and submits once. Failures abort with their cause and are not retried.
pub struct TransactionSender {
    chain: String,
    builder: TransactionBuilder,
}

impl TransactionSender {
    pub fn new(chain: impl Into<String>, builder: TransactionBuilder) -> Self {
        Self {
            chain: chain.into(),
            builder,
        }
    }

    pub fn builder(&self) -> &TransactionBuilder {
        &self.builder
    }

    /// Build a transaction for `payload`, sign it with `account` and submit it
    pub async fn submit_payload(
        &self,
        client: &dyn LedgerClient,
        account: &dyn Account,
        payload: Payload,
        option: Option<&dyn TransactionOption>,
    ) -> PipelineResult<String> {
        let result = self.run_pipeline(client, account, payload, option).await;

        match &result {
            Ok(hash) => {
                info!("Transaction submitted on {}: {}", self.chain, hash);
                crate::metrics::record_tx_submitted(&self.chain);
            }
            Err(e) => {
                warn!("Transaction pipeline failed on {}: {}", self.chain, e);
                crate::metrics::record_tx_failed(&self.chain, e.stage());
            }
        }

        result
    }

    async fn run_pipeline(
        &self,
        client: &dyn LedgerClient,
        account: &dyn Account,
        payload: Payload,
        option: Option<&dyn TransactionOption>,
    ) -> PipelineResult<String> {
        let sender = account.address();
        validate_hex_id("address", &sender)?;
        payload.validate()?;

        let mut transaction = self.builder.build(client, &sender, payload).await?;

        if let Some(option) = option {
            transaction = option.process(transaction)?;
            debug!("Applied transaction option for {}", sender);
        }

        let signed = sign_transaction(client, account, transaction).await?;
        client.submit_transaction(&signed).await
    }

    /// Submit a signed transaction given as hex-encoded JSON
    pub async fn send_raw_transaction(
        &self,
        client: &dyn LedgerClient,
        raw: &str,
    ) -> PipelineResult<String> {
        let signed = decode_raw_transaction(raw)?;
        let hash = client.submit_transaction(&signed).await?;

        info!("Raw transaction submitted on {}: {}", self.chain, hash);
        crate::metrics::record_tx_submitted(&self.chain);

        Ok(hash)
    }
}

fn decode_raw_transaction(raw: &str) -> PipelineResult<SignedTransaction> {
    let bytes = hex::decode(raw.trim().trim_start_matches("0x"))
        .map_err(|e| PipelineError::invalid_argument("raw_transaction", e.to_string()))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| PipelineError::invalid_argument("raw_transaction", e.to_string()))
}
