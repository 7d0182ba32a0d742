//! Move ledger backend
//!
//! Every entry point runs inside the panic guard. The ledger client is
//! created on first use through the configured connector.

use super::client::{Connector, LedgerClient};
use super::provider::ChainProvider;
use super::Chain;
use crate::config::ChainConfig;
use crate::error::{guarded, PipelineError, PipelineResult};
use crate::tx::{
    collapse_status, fan_out, fetch_detail, fetch_status, validate_hex_id, Account, Balance,
    Payload, TransactionBuilder, TransactionDetail, TransactionOption, TransactionSender,
    TransactionStatus,
};

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Coin store of the native coin
pub const COIN_STORE_RESOURCE: &str = "0x1::coin::CoinStore<0x1::aptos_coin::AptosCoin>";

/// Token store carrying the direct transfer opt-in
pub const TOKEN_STORE_RESOURCE: &str = "0x3::token::TokenStore";

pub struct LedgerChain {
    provider: ChainProvider<dyn LedgerClient>,
    sender: TransactionSender,
    max_concurrent_queries: usize,
}

impl LedgerChain {
    pub fn new(
        provider: ChainProvider<dyn LedgerClient>,
        builder: TransactionBuilder,
        max_concurrent_queries: usize,
    ) -> Self {
        let sender = TransactionSender::new(provider.name(), builder);
        Self {
            provider,
            sender,
            max_concurrent_queries,
        }
    }

    pub fn from_config(
        config: &ChainConfig,
        connector: Arc<dyn Connector<dyn LedgerClient>>,
    ) -> Self {
        Self::new(
            ChainProvider::new(config.name.clone(), config.url.clone(), connector),
            TransactionBuilder::from_config(config),
            config.max_concurrent_queries,
        )
    }

    pub fn provider(&self) -> &ChainProvider<dyn LedgerClient> {
        &self.provider
    }

    /// Build, optionally transform, sign and submit `payload` from `account`
    pub async fn submit_transaction_payload(
        &self,
        account: &dyn Account,
        payload: Payload,
        option: Option<&dyn TransactionOption>,
    ) -> PipelineResult<String> {
        guarded("submit_transaction_payload", async {
            let client = self.provider.client().await?;
            self.sender
                .submit_payload(client.as_ref(), account, payload, option)
                .await
        })
        .await
    }

    /// Native coin balance of `account`
    pub async fn balance_of_account(&self, account: &dyn Account) -> PipelineResult<Balance> {
        self.balance_of_address(&account.address()).await
    }

    /// Whether `address` accepts tokens without an explicit opt-in
    pub async fn direct_transfer_allowed(&self, address: &str) -> PipelineResult<bool> {
        guarded("direct_transfer_allowed", async {
            validate_hex_id("address", address)?;
            let client = self.provider.client().await?;

            let resource = match client
                .get_account_resource(address, TOKEN_STORE_RESOURCE)
                .await?
            {
                Some(resource) => resource,
                None => return Ok(false),
            };

            resource
                .data
                .get("direct_transfer")
                .and_then(|flag| flag.as_bool())
                .ok_or_else(|| {
                    PipelineError::invalid_transaction(
                        address,
                        "token store has no direct_transfer flag",
                    )
                })
        })
        .await
    }
}

#[async_trait]
impl Chain for LedgerChain {
    fn name(&self) -> &str {
        self.provider.name()
    }

    async fn balance_of_address(&self, address: &str) -> PipelineResult<Balance> {
        guarded("balance_of_address", async {
            validate_hex_id("address", address)?;
            let client = self.provider.client().await?;

            let resource = match client
                .get_account_resource(address, COIN_STORE_RESOURCE)
                .await?
            {
                Some(resource) => resource,
                None => {
                    debug!("No coin store for {}, balance is zero", address);
                    return Ok(Balance::zero());
                }
            };

            let value = resource
                .data
                .pointer("/coin/value")
                .and_then(|value| value.as_str())
                .filter(|value| !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()))
                .ok_or_else(|| PipelineError::ChainStateUnavailable {
                    address: address.to_string(),
                    message: "malformed coin store".to_string(),
                })?;

            Ok(Balance::new(value))
        })
        .await
    }

    async fn send_raw_transaction(&self, raw: &str) -> PipelineResult<String> {
        guarded("send_raw_transaction", async {
            let client = self.provider.client().await?;
            self.sender.send_raw_transaction(client.as_ref(), raw).await
        })
        .await
    }

    async fn fetch_transaction_detail(&self, hash: &str) -> PipelineResult<TransactionDetail> {
        guarded("fetch_transaction_detail", async {
            let client = self.provider.client().await?;
            fetch_detail(client.as_ref(), hash).await
        })
        .await
    }

    async fn fetch_transaction_status(&self, hash: &str) -> TransactionStatus {
        let result = guarded("fetch_transaction_status", async {
            let client = self.provider.client().await?;
            Ok(fetch_status(client.as_ref(), self.name(), hash).await)
        })
        .await;

        match result {
            Ok(status) => status,
            Err(e) => collapse_status(self.name(), hash, Err(e)),
        }
    }

    async fn batch_fetch_transaction_status(&self, hashes: &[String]) -> Vec<TransactionStatus> {
        let client = match self.provider.client().await {
            Ok(client) => client,
            Err(e) => {
                warn!("Batch status on {} without client: {}", self.name(), e);
                return hashes
                    .iter()
                    .map(|hash| collapse_status(self.name(), hash, Err(e.clone())))
                    .collect();
            }
        };

        let chain = self.name().to_string();
        fan_out(hashes, self.max_concurrent_queries, |hash| {
            let client = client.clone();
            let chain = chain.clone();
            async move { fetch_status(client.as_ref(), &chain, &hash).await }
        })
        .await
    }
}
