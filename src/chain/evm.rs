//! EVM backend over an ethers HTTP provider
//!
//! Fees come from the pending block's base fee and the node's suggested
//! priority fee. Statuses come from receipts: a known transaction without a
//! receipt is still pending.

use super::client::Connector;
use super::provider::ChainProvider;
use super::Chain;
use crate::config::ChainConfig;
use crate::error::{guarded, PipelineError, PipelineResult};
use crate::tx::{
    collapse_status, fan_out, validate_hex_id, Balance, FeeObservation, FeeSource, FeeTiers,
    GasFeeTier, TransactionDetail, TransactionStatus,
};

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{Address, BlockNumber, Bytes, Transaction, TransactionReceipt, H256, U256};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

const FAILED_EXECUTION: &str = "execution reverted";

/// Creates HTTP providers
pub struct HttpConnector {
    poll_interval: Duration,
}

impl HttpConnector {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

#[async_trait]
impl Connector<Provider<Http>> for HttpConnector {
    async fn connect(&self, url: &str) -> PipelineResult<Arc<Provider<Http>>> {
        let provider =
            Provider::<Http>::try_from(url).map_err(|e| PipelineError::ChainConnection {
                chain: url.to_string(),
                message: e.to_string(),
            })?;
        debug!("Added HTTP provider: {}", url);
        Ok(Arc::new(provider.interval(self.poll_interval)))
    }
}

pub struct EvmChain {
    provider: ChainProvider<Provider<Http>>,
    max_concurrent_queries: usize,
}

impl EvmChain {
    pub fn new(provider: ChainProvider<Provider<Http>>, max_concurrent_queries: usize) -> Self {
        Self {
            provider,
            max_concurrent_queries,
        }
    }

    pub fn from_config(config: &ChainConfig) -> Self {
        Self::new(
            ChainProvider::new(
                config.name.clone(),
                config.url.clone(),
                Arc::new(HttpConnector::default()),
            ),
            config.max_concurrent_queries,
        )
    }

    pub fn provider(&self) -> &ChainProvider<Provider<Http>> {
        &self.provider
    }

    /// Legacy gas price suggested by the node
    pub async fn suggest_gas_price(&self) -> PipelineResult<U256> {
        guarded("suggest_gas_price", async {
            let client = self.provider.client().await?;
            client
                .get_gas_price()
                .await
                .map_err(|e| PipelineError::GasEstimation(e.to_string()))
        })
        .await
    }

    /// Average tier of the current fee observation
    pub async fn suggest_gas_price_eip1559(&self) -> PipelineResult<GasFeeTier> {
        guarded("suggest_gas_price_eip1559", async {
            Ok(self.fee_observation().await?.tiers().average)
        })
        .await
    }

    /// All three tiers of the current fee observation
    pub async fn fee_tiers(&self) -> PipelineResult<FeeTiers> {
        guarded("fee_tiers", async {
            let tiers = self.fee_observation().await?.tiers();
            crate::metrics::record_fee_tiers(self.name(), &tiers);
            Ok(tiers)
        })
        .await
    }
}

#[async_trait]
impl FeeSource for EvmChain {
    async fn fee_observation(&self) -> PipelineResult<FeeObservation> {
        let client = self.provider.client().await?;

        let block = client
            .get_block(BlockNumber::Pending)
            .await
            .map_err(|e| PipelineError::GasEstimation(e.to_string()))?
            .ok_or_else(|| PipelineError::GasEstimation("pending block unavailable".to_string()))?;

        let priority_fee: U256 = client
            .request("eth_maxPriorityFeePerGas", ())
            .await
            .map_err(|e| PipelineError::GasEstimation(e.to_string()))?;

        observation(block.base_fee_per_gas, priority_fee)
    }
}

/// Pair a base fee with a priority fee; chains without a base fee have no
/// EIP-1559 market.
fn observation(base_fee: Option<U256>, priority_fee: U256) -> PipelineResult<FeeObservation> {
    let base_fee = base_fee.ok_or_else(|| {
        PipelineError::GasEstimation("The specified chain does not yet support EIP1559".to_string())
    })?;

    Ok(FeeObservation {
        base_fee: base_fee.to_string(),
        suggest_priority_fee: priority_fee.to_string(),
    })
}

#[async_trait]
impl Chain for EvmChain {
    fn name(&self) -> &str {
        self.provider.name()
    }

    async fn balance_of_address(&self, address: &str) -> PipelineResult<Balance> {
        guarded("balance_of_address", async {
            let address: Address = address
                .parse()
                .map_err(|e| PipelineError::invalid_argument("address", format!("{}", e)))?;
            let client = self.provider.client().await?;

            let balance = client
                .get_balance(address, None)
                .await
                .map_err(|e| rpc_error(self.name(), e))?;

            Ok(Balance::new(balance.to_string()))
        })
        .await
    }

    async fn send_raw_transaction(&self, raw: &str) -> PipelineResult<String> {
        guarded("send_raw_transaction", async {
            let bytes = hex::decode(raw.trim().trim_start_matches("0x"))
                .map_err(|e| PipelineError::invalid_argument("raw_transaction", e.to_string()))?;
            let client = self.provider.client().await?;

            let pending = client
                .send_raw_transaction(Bytes::from(bytes))
                .await
                .map_err(|e| PipelineError::SubmissionRejected {
                    reason: e.to_string(),
                })?;
            let hash = format!("{:?}", pending.tx_hash());

            info!("Raw transaction broadcast on {}: {}", self.name(), hash);
            crate::metrics::record_tx_submitted(self.name());
            Ok(hash)
        })
        .await
    }

    async fn fetch_transaction_detail(&self, hash: &str) -> PipelineResult<TransactionDetail> {
        guarded("fetch_transaction_detail", async {
            let tx_hash = parse_hash(hash)?;
            let client = self.provider.client().await?;

            let transaction = client
                .get_transaction(tx_hash)
                .await
                .map_err(|e| rpc_error(self.name(), e))?
                .ok_or_else(|| PipelineError::NotFound {
                    hash: hash.to_string(),
                })?;

            let receipt = client
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(|e| rpc_error(self.name(), e))?;

            let timestamp = match receipt.as_ref().and_then(|r| r.block_number) {
                Some(block_number) => client
                    .get_block(block_number)
                    .await
                    .map_err(|e| rpc_error(self.name(), e))?
                    .map(|block| block.timestamp),
                None => None,
            };

            normalize_evm_transaction(&transaction, receipt.as_ref(), timestamp)
        })
        .await
    }

    async fn fetch_transaction_status(&self, hash: &str) -> TransactionStatus {
        let result = guarded("fetch_transaction_status", async {
            let client = self.provider.client().await?;
            lookup_status(&client, self.name(), hash).await
        })
        .await;

        collapse_status(self.name(), hash, result)
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
            async move {
                let result = lookup_status(&client, &chain, &hash).await;
                collapse_status(&chain, &hash, result)
            }
        })
        .await
    }
}

async fn lookup_status(
    client: &Provider<Http>,
    chain: &str,
    hash: &str,
) -> PipelineResult<TransactionStatus> {
    let tx_hash = parse_hash(hash)?;

    let receipt = client
        .get_transaction_receipt(tx_hash)
        .await
        .map_err(|e| rpc_error(chain, e))?;
    if receipt.is_some() {
        return Ok(receipt_status(receipt.as_ref()));
    }

    // Known to the node but not mined yet
    match client
        .get_transaction(tx_hash)
        .await
        .map_err(|e| rpc_error(chain, e))?
    {
        Some(_) => Ok(TransactionStatus::Pending),
        None => Err(PipelineError::NotFound {
            hash: hash.to_string(),
        }),
    }
}

fn parse_hash(hash: &str) -> PipelineResult<H256> {
    validate_hex_id("hash", hash)?;
    hash.parse()
        .map_err(|e| PipelineError::invalid_argument("hash", format!("{}", e)))
}

fn rpc_error(chain: &str, e: impl Display) -> PipelineError {
    PipelineError::ChainConnection {
        chain: chain.to_string(),
        message: e.to_string(),
    }
}

fn receipt_status(receipt: Option<&TransactionReceipt>) -> TransactionStatus {
    match receipt {
        None => TransactionStatus::Pending,
        Some(receipt) if receipt.status.map(|s| s.as_u64()) == Some(1) => {
            TransactionStatus::Success
        }
        Some(_) => TransactionStatus::Failure,
    }
}

/// Map a plain value transfer, its receipt and block time into a detail.
///
/// Contract creations and contract calls are not transfers and are rejected.
pub fn normalize_evm_transaction(
    transaction: &Transaction,
    receipt: Option<&TransactionReceipt>,
    timestamp: Option<U256>,
) -> PipelineResult<TransactionDetail> {
    let hash = format!("{:?}", transaction.hash);
    let to = transaction.to.ok_or_else(|| {
        PipelineError::invalid_transaction(&hash, "contract creation is not a transfer")
    })?;
    if !transaction.input.is_empty() {
        return Err(PipelineError::invalid_transaction(
            &hash,
            "contract call is not a value transfer",
        ));
    }

    let status = receipt_status(receipt);

    let estimate_fees = receipt
        .and_then(|receipt| {
            let gas_used = receipt.gas_used?;
            let price = receipt.effective_gas_price.or(transaction.gas_price)?;
            Some(gas_used.saturating_mul(price))
        })
        .unwrap_or_default();

    Ok(TransactionDetail {
        hash,
        from_address: format!("{:?}", transaction.from),
        to_address: Some(format!("{:?}", to)),
        amount: Some(transaction.value.to_string()),
        estimate_fees: estimate_fees.to_string(),
        status,
        failure_message: match status {
            TransactionStatus::Failure => Some(FAILED_EXECUTION.to_string()),
            _ => None,
        },
        finish_timestamp: timestamp.map(|t| t.low_u64()).unwrap_or_default(),
    })
}
