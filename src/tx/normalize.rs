//! Normalization of ledger transaction records into `TransactionDetail`
//!
//! Only user transactions carrying an entry-function payload are accepted.
//! Receiver and amount are read from the first two positional arguments
//! after checking their shape; records with fewer arguments keep both unset.

use super::types::{
    PayloadKind, RawTransaction, TransactionDetail, TransactionStatus, TransactionType,
};
use crate::error::{PipelineError, PipelineResult};

use serde_json::Value;

const MICROS_PER_SECOND: u64 = 1_000_000;

/// Map a raw ledger record into the canonical detail shape
pub fn normalize_transaction(raw: &RawTransaction) -> PipelineResult<TransactionDetail> {
    let hash = raw.hash.as_str();

    if !matches!(
        raw.kind,
        TransactionType::UserTransaction | TransactionType::PendingTransaction
    ) {
        return Err(PipelineError::invalid_transaction(
            hash,
            "not a user transaction",
        ));
    }

    let payload = raw
        .payload
        .as_ref()
        .filter(|payload| payload.kind == PayloadKind::EntryFunction)
        .ok_or_else(|| PipelineError::invalid_transaction(hash, "not an entry function payload"))?;

    let from_address = raw
        .sender
        .clone()
        .ok_or_else(|| PipelineError::invalid_transaction(hash, "missing sender"))?;

    let transfer = transfer_arguments(hash, &payload.arguments)?;

    let gas_unit_price = raw.gas_unit_price.unwrap_or_default();
    let gas_used = raw.gas_used.unwrap_or_default();
    let estimate_fees = (u128::from(gas_unit_price) * u128::from(gas_used)).to_string();

    let status = raw.status();
    let failure_message = match status {
        TransactionStatus::Failure => raw.vm_status.clone(),
        _ => None,
    };

    let (to_address, amount) = match transfer {
        Some((to, amount)) => (Some(to), Some(amount)),
        None => (None, None),
    };

    Ok(TransactionDetail {
        hash: hash.to_string(),
        from_address,
        to_address,
        amount,
        estimate_fees,
        status,
        failure_message,
        finish_timestamp: raw.timestamp.unwrap_or_default() / MICROS_PER_SECOND,
    })
}

/// Receiver and amount when at least two arguments are present.
///
/// The receiver must be a string; the amount a decimal string or a
/// non-negative integer.
fn transfer_arguments(hash: &str, arguments: &[Value]) -> PipelineResult<Option<(String, String)>> {
    let (receiver, amount) = match arguments {
        [receiver, amount, ..] => (receiver, amount),
        _ => return Ok(None),
    };

    let receiver = receiver
        .as_str()
        .ok_or_else(|| PipelineError::invalid_transaction(hash, "receiver argument is not a string"))?;

    let amount = match amount {
        Value::String(text) if is_decimal_integer(text) => text.clone(),
        Value::Number(number) if number.is_u64() => number.to_string(),
        _ => {
            return Err(PipelineError::invalid_transaction(
                hash,
                "amount argument is not an unsigned integer",
            ))
        }
    };

    Ok(Some((receiver.to_string(), amount)))
}

fn is_decimal_integer(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::Payload;
    use serde_json::json;

    fn transfer_record(success: bool, vm_status: &str) -> RawTransaction {
        RawTransaction {
            kind: TransactionType::UserTransaction,
            hash: "0xfd496b3dccae000096d4bf4aef581863ce2600c8867be9c2fe5b82a3408441af".to_string(),
            sender: Some(
                "0xcf4ddd208bbbbefb3227cafa5c917fc6541d26b1869276ea80d99ee0505fc6f8".to_string(),
            ),
            payload: Some(Payload::entry_function(
                "0x1::coin::transfer",
                vec!["0x1::aptos_coin::AptosCoin".to_string()],
                vec![
                    json!("0xcdbe33da8d218e97a9bec6443ba4a1b1858494f29142976d357f4770c384e015"),
                    json!("100"),
                ],
            )),
            gas_unit_price: Some(1),
            gas_used: Some(4),
            success: Some(success),
            vm_status: Some(vm_status.to_string()),
            timestamp: Some(1_660_556_054_000_000),
        }
    }

    #[test]
    fn test_successful_transfer() {
        let detail = normalize_transaction(&transfer_record(true, "Executed successfully")).unwrap();

        assert_eq!(
            detail.to_address.as_deref(),
            Some("0xcdbe33da8d218e97a9bec6443ba4a1b1858494f29142976d357f4770c384e015")
        );
        assert_eq!(detail.amount.as_deref(), Some("100"));
        assert_eq!(detail.estimate_fees, "4");
        assert_eq!(detail.status, TransactionStatus::Success);
        assert_eq!(detail.failure_message, None);
        assert_eq!(detail.finish_timestamp, 1_660_556_054);
    }

    #[test]
    fn test_failed_transfer_keeps_vm_status() {
        let detail = normalize_transaction(&transfer_record(false, "INSUFFICIENT_BALANCE")).unwrap();

        assert_eq!(detail.status, TransactionStatus::Failure);
        assert_eq!(detail.failure_message.as_deref(), Some("INSUFFICIENT_BALANCE"));
        assert_eq!(detail.amount.as_deref(), Some("100"));
    }

    #[test]
    fn test_timestamp_truncates() {
        let mut raw = transfer_record(true, "");
        raw.timestamp = Some(1_660_556_054_999_999);
        assert_eq!(normalize_transaction(&raw).unwrap().finish_timestamp, 1_660_556_054);
    }

    #[test]
    fn test_fee_does_not_overflow() {
        let mut raw = transfer_record(true, "");
        raw.gas_unit_price = Some(u64::MAX);
        raw.gas_used = Some(2);
        let detail = normalize_transaction(&raw).unwrap();
        assert_eq!(detail.estimate_fees, "36893488147419103230");
    }

    #[test]
    fn test_rejects_non_user_records() {
        let mut raw = transfer_record(true, "");
        raw.kind = TransactionType::BlockMetadataTransaction;
        let err = normalize_transaction(&raw).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidTransaction { .. }));
    }

    #[test]
    fn test_rejects_non_entry_function_payload() {
        let mut raw = transfer_record(true, "");
        raw.payload.as_mut().unwrap().kind = PayloadKind::Script;
        assert!(matches!(
            normalize_transaction(&raw),
            Err(PipelineError::InvalidTransaction { .. })
        ));

        raw.payload = None;
        assert!(matches!(
            normalize_transaction(&raw),
            Err(PipelineError::InvalidTransaction { .. })
        ));
    }

    #[test]
    fn test_short_argument_list_leaves_transfer_unset() {
        let mut raw = transfer_record(true, "");
        raw.payload.as_mut().unwrap().arguments = vec![json!("1234")];

        let detail = normalize_transaction(&raw).unwrap();
        assert_eq!(detail.to_address, None);
        assert_eq!(detail.amount, None);
        assert_eq!(detail.status, TransactionStatus::Success);
    }

    #[test]
    fn test_argument_shape_mismatch_is_invalid() {
        let mut raw = transfer_record(true, "");
        raw.payload.as_mut().unwrap().arguments = vec![json!(12), json!("100")];
        assert!(matches!(
            normalize_transaction(&raw),
            Err(PipelineError::InvalidTransaction { .. })
        ));

        raw.payload.as_mut().unwrap().arguments = vec![json!("0xcdbe"), json!({"value": 1})];
        assert!(matches!(
            normalize_transaction(&raw),
            Err(PipelineError::InvalidTransaction { .. })
        ));

        raw.payload.as_mut().unwrap().arguments = vec![json!("0xcdbe"), json!(250)];
        let detail = normalize_transaction(&raw).unwrap();
        assert_eq!(detail.amount.as_deref(), Some("250"));
    }

    #[test]
    fn test_pending_record() {
        let mut raw = transfer_record(true, "");
        raw.kind = TransactionType::PendingTransaction;
        raw.success = None;
        raw.gas_used = None;
        raw.timestamp = None;

        let detail = normalize_transaction(&raw).unwrap();
        assert_eq!(detail.status, TransactionStatus::Pending);
        assert_eq!(detail.estimate_fees, "0");
        assert_eq!(detail.finish_timestamp, 0);
    }
}
