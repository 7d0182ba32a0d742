//! Mutation hooks applied to an unsigned transaction before signing

use super::types::UnsignedTransaction;
use crate::error::{PipelineError, PipelineResult};

/// Late-bound transformation of an unsigned transaction.
///
/// At most one option runs per submission, after the build and before the
/// signature. An error aborts the submission.
pub trait TransactionOption: Send + Sync {
    fn process(&self, transaction: UnsignedTransaction) -> PipelineResult<UnsignedTransaction>;
}

impl<F> TransactionOption for F
where
    F: Fn(UnsignedTransaction) -> PipelineResult<UnsignedTransaction> + Send + Sync,
{
    fn process(&self, transaction: UnsignedTransaction) -> PipelineResult<UnsignedTransaction> {
        self(transaction)
    }
}

/// Override of the default gas bounds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GasOverride {
    pub max_gas_amount: Option<u64>,
    pub gas_unit_price: Option<u64>,
}

impl GasOverride {
    pub fn new(max_gas_amount: Option<u64>, gas_unit_price: Option<u64>) -> Self {
        Self {
            max_gas_amount,
            gas_unit_price,
        }
    }
}

impl TransactionOption for GasOverride {
    fn process(&self, mut transaction: UnsignedTransaction) -> PipelineResult<UnsignedTransaction> {
        if let Some(amount) = self.max_gas_amount {
            if amount == 0 {
                return Err(PipelineError::invalid_argument(
                    "max_gas_amount",
                    "must be greater than zero",
                ));
            }
            transaction.max_gas_amount = amount;
        }
        if let Some(price) = self.gas_unit_price {
            transaction.gas_unit_price = price;
        }
        Ok(transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::Payload;

    fn unsigned() -> UnsignedTransaction {
        UnsignedTransaction {
            sender: "0x1".to_string(),
            sequence_number: 9,
            max_gas_amount: 1000,
            gas_unit_price: 1,
            payload: Payload::entry_function("0x1::coin::transfer", vec![], vec![]),
            expiration_timestamp_secs: 600,
        }
    }

    #[test]
    fn test_gas_override_only_touches_gas_fields() {
        let tx = GasOverride::new(Some(5000), None).process(unsigned()).unwrap();
        assert_eq!(tx.max_gas_amount, 5000);
        assert_eq!(tx.gas_unit_price, 1);
        assert_eq!(tx.sequence_number, 9);

        let tx = GasOverride::new(None, Some(150)).process(unsigned()).unwrap();
        assert_eq!(tx.max_gas_amount, 1000);
        assert_eq!(tx.gas_unit_price, 150);
    }

    #[test]
    fn test_gas_override_rejects_zero_ceiling() {
        let err = GasOverride::new(Some(0), None).process(unsigned()).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidArgument { .. }));
    }

    #[test]
    fn test_closure_option() {
        let option = |mut tx: UnsignedTransaction| -> PipelineResult<UnsignedTransaction> {
            tx.expiration_timestamp_secs += 60;
            Ok(tx)
        };
        let tx = option.process(unsigned()).unwrap();
        assert_eq!(tx.expiration_timestamp_secs, 660);
    }
}
