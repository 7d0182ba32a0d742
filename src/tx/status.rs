//! Transaction detail and status queries
//!
//! Status queries never fail: any error collapses to `Failure`, with the
//! cause logged. Batch queries run one task per hash under a semaphore and
//! join into slots indexed by input position.

use super::normalize::normalize_transaction;
use super::types::{validate_hex_id, TransactionDetail, TransactionStatus};
use crate::chain::LedgerClient;
use crate::error::{guarded, PipelineError, PipelineResult};

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Look up and normalize one transaction
pub async fn fetch_detail(client: &dyn LedgerClient, hash: &str) -> PipelineResult<TransactionDetail> {
    validate_hex_id("hash", hash)?;

    let raw = client
        .get_transaction_by_hash(hash)
        .await?
        .ok_or_else(|| PipelineError::NotFound {
            hash: hash.to_string(),
        })?;

    normalize_transaction(&raw)
}

/// Current status of `hash`; unknown hashes and lookup errors read as `Failure`
pub async fn fetch_status(client: &dyn LedgerClient, chain: &str, hash: &str) -> TransactionStatus {
    collapse_status(chain, hash, lookup_status(client, hash).await)
}

async fn lookup_status(client: &dyn LedgerClient, hash: &str) -> PipelineResult<TransactionStatus> {
    validate_hex_id("hash", hash)?;
    client
        .get_transaction_by_hash(hash)
        .await?
        .map(|raw| raw.status())
        .ok_or_else(|| PipelineError::NotFound {
            hash: hash.to_string(),
        })
}

/// Fold a status lookup result into a status, recording the outcome
pub fn collapse_status(
    chain: &str,
    hash: &str,
    result: PipelineResult<TransactionStatus>,
) -> TransactionStatus {
    match result {
        Ok(status) => {
            crate::metrics::record_status_query(chain, status.as_str());
            status
        }
        Err(e) => {
            warn!("Status lookup for {} on {} failed: {}", hash, chain, e);
            crate::metrics::record_status_query(chain, "error");
            TransactionStatus::Failure
        }
    }
}

/// Run `lookup` for every hash with at most `max_concurrency` in flight.
///
/// `result[i]` belongs to `hashes[i]` whatever the completion order. A task
/// that panics yields `Failure` for its own slot only. Dropping the returned
/// future aborts every lookup still queued or running.
pub async fn fan_out<F, Fut>(
    hashes: &[String],
    max_concurrency: usize,
    lookup: F,
) -> Vec<TransactionStatus>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = TransactionStatus> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for (index, hash) in hashes.iter().enumerate() {
        let semaphore = semaphore.clone();
        let query = lookup(hash.clone());
        tasks.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return (index, TransactionStatus::Failure),
            };
            let status = guarded("batch_fetch_transaction_status", async { Ok(query.await) })
                .await
                .unwrap_or(TransactionStatus::Failure);
            (index, status)
        });
    }

    let mut statuses = vec![TransactionStatus::Failure; hashes.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, status)) => statuses[index] = status,
            Err(e) => warn!("Status task aborted: {}", e),
        }
    }

    debug!("Fetched {} transaction statuses", statuses.len());
    statuses
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockLedgerClient;
    use crate::tx::{Payload, RawTransaction, TransactionType};

    use mockall::predicate::eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn record(hash: &str, success: bool) -> RawTransaction {
        RawTransaction {
            kind: TransactionType::UserTransaction,
            hash: hash.to_string(),
            sender: Some("0xcf4d".to_string()),
            payload: Some(Payload::entry_function(
                "0x1::coin::transfer",
                vec![],
                vec![json!("0xcdbe"), json!("100")],
            )),
            gas_unit_price: Some(1),
            gas_used: Some(4),
            success: Some(success),
            vm_status: Some("Executed successfully".to_string()),
            timestamp: Some(1_660_556_054_000_000),
        }
    }

    #[tokio::test]
    async fn test_fetch_detail_unknown_hash() {
        let mut client = MockLedgerClient::new();
        client
            .expect_get_transaction_by_hash()
            .with(eq("0x404"))
            .returning(|_| Ok(None));

        let err = fetch_detail(&client, "0x404").await.unwrap_err();
        assert_eq!(
            err,
            PipelineError::NotFound {
                hash: "0x404".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_fetch_detail_rejects_bad_hash() {
        let mut client = MockLedgerClient::new();
        client.expect_get_transaction_by_hash().never();

        let err = fetch_detail(&client, "fd49").await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn test_fetch_detail_normalizes() {
        let mut client = MockLedgerClient::new();
        client
            .expect_get_transaction_by_hash()
            .returning(|hash| Ok(Some(record(hash, true))));

        let detail = fetch_detail(&client, "0xfd49").await.unwrap();
        assert_eq!(detail.hash, "0xfd49");
        assert_eq!(detail.status, TransactionStatus::Success);
        assert_eq!(detail.finish_timestamp, 1_660_556_054);
    }

    #[tokio::test]
    async fn test_fetch_status_collapses_errors() {
        let mut client = MockLedgerClient::new();
        client.expect_get_transaction_by_hash().returning(|hash| match hash {
            "0x01" => Ok(Some(record(hash, true))),
            "0x02" => Ok(Some(record(hash, false))),
            "0x03" => Ok(None),
            _ => Err(PipelineError::ChainConnection {
                chain: "devnet".to_string(),
                message: "timeout".to_string(),
            }),
        });

        assert_eq!(fetch_status(&client, "devnet", "0x01").await, TransactionStatus::Success);
        assert_eq!(fetch_status(&client, "devnet", "0x02").await, TransactionStatus::Failure);
        assert_eq!(fetch_status(&client, "devnet", "0x03").await, TransactionStatus::Failure);
        assert_eq!(fetch_status(&client, "devnet", "0x04").await, TransactionStatus::Failure);
        assert_eq!(fetch_status(&client, "devnet", "bogus").await, TransactionStatus::Failure);
    }

    #[tokio::test]
    async fn test_fan_out_preserves_input_order() {
        let hashes: Vec<String> = (0..8).map(|i| format!("0x{:02x}", i)).collect();

        // Later hashes finish first.
        let statuses = fan_out(&hashes, 8, |hash| async move {
            let index = u64::from_str_radix(&hash[2..], 16).unwrap();
            tokio::time::sleep(Duration::from_millis(5 * (8 - index))).await;
            if index % 3 == 0 {
                TransactionStatus::Pending
            } else if index % 2 == 0 {
                TransactionStatus::Success
            } else {
                TransactionStatus::Failure
            }
        })
        .await;

        use TransactionStatus::*;
        assert_eq!(
            statuses,
            vec![Pending, Failure, Success, Pending, Success, Failure, Pending, Failure]
        );
    }

    #[tokio::test]
    async fn test_fan_out_isolates_panics() {
        let hashes = vec!["0x01".to_string(), "0x02".to_string(), "0x03".to_string()];

        let statuses = fan_out(&hashes, 2, |hash| async move {
            if hash == "0x02" {
                panic!("decoder blew up");
            }
            TransactionStatus::Success
        })
        .await;

        assert_eq!(
            statuses,
            vec![
                TransactionStatus::Success,
                TransactionStatus::Failure,
                TransactionStatus::Success
            ]
        );
    }

    #[tokio::test]
    async fn test_fan_out_respects_concurrency_bound() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let hashes: Vec<String> = (0..20).map(|i| format!("0x{:02x}", i)).collect();

        let statuses = fan_out(&hashes, 3, |_| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                TransactionStatus::Success
            }
        })
        .await;

        assert_eq!(statuses.len(), 20);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_dropping_batch_stops_lookups() {
        let done = Arc::new(AtomicUsize::new(0));
        let hashes: Vec<String> = (0..50).map(|i| format!("0x{:02x}", i)).collect();

        let batch = fan_out(&hashes, 5, |_| {
            let done = done.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                done.fetch_add(1, Ordering::SeqCst);
                TransactionStatus::Success
            }
        });
        let timed_out = tokio::time::timeout(Duration::from_millis(30), batch).await;
        assert!(timed_out.is_err());

        let at_drop = done.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(done.load(Ordering::SeqCst), at_drop);
        assert!(at_drop < hashes.len());
    }

    #[tokio::test]
    async fn test_fan_out_empty_input() {
        let statuses = fan_out(&[], 4, |_| async { TransactionStatus::Success }).await;
        assert!(statuses.is_empty());
    }
}
