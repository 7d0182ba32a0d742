//! Fee tier derivation for EIP-1559 style chains
//!
//! Every tier scales the suggested priority fee, adds the base fee and scales
//! the sum again:
//! - max priority fee = suggested priority fee * priority rate
//! - max fee = (max priority fee + base fee) * max fee rate
//!
//! Rates are exact hundredths and every product is truncated towards zero, so
//! the same inputs always produce the same tiers.

use crate::error::PipelineResult;

use async_trait::async_trait;
use ethers::types::U256;
use serde::Serialize;
use std::fmt;

/// Fractional digits kept when parsing a decimal fee string
const MAX_FRACTION_DIGITS: usize = 18;

/// Largest power of ten a `U256` holds
const MAX_DECIMAL_DIGITS: usize = 77;

/// Scaling pair applied to a fee observation, in hundredths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeRate {
    pub priority_percent: u64,
    pub max_fee_percent: u64,
}

impl FeeRate {
    pub const fn new(priority_percent: u64, max_fee_percent: u64) -> Self {
        Self {
            priority_percent,
            max_fee_percent,
        }
    }
}

/// Named fee tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeeTier {
    Low,
    Average,
    High,
}

impl FeeTier {
    pub const ALL: [FeeTier; 3] = [FeeTier::Low, FeeTier::Average, FeeTier::High];

    pub fn rate(&self) -> FeeRate {
        match self {
            FeeTier::Low => FeeRate::new(100, 100),
            FeeTier::Average => FeeRate::new(150, 111),
            FeeTier::High => FeeRate::new(200, 150),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeeTier::Low => "low",
            FeeTier::Average => "average",
            FeeTier::High => "high",
        }
    }
}

impl fmt::Display for FeeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fee recommendation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GasFeeTier {
    /// Pending block base fee, as observed
    pub base_fee: String,
    /// Suggested priority fee, as observed
    pub suggest_priority_fee: String,
    pub max_priority_fee: U256,
    pub max_fee: U256,
}

impl GasFeeTier {
    /// Apply an arbitrary rate pair.
    ///
    /// Inputs that do not parse as non-negative decimals count as zero.
    pub fn with_rate(base_fee: &str, suggest_priority_fee: &str, rate: FeeRate) -> Self {
        let suggested = Decimal::parse_lenient(suggest_priority_fee);
        let base = Decimal::parse_lenient(base_fee);

        let max_priority_fee = suggested.scale_floor(rate.priority_percent);
        let max_fee = base
            .add_integer(max_priority_fee)
            .scale_floor(rate.max_fee_percent);

        Self {
            base_fee: base_fee.to_string(),
            suggest_priority_fee: suggest_priority_fee.to_string(),
            max_priority_fee,
            max_fee,
        }
    }

    pub fn for_tier(base_fee: &str, suggest_priority_fee: &str, tier: FeeTier) -> Self {
        Self::with_rate(base_fee, suggest_priority_fee, tier.rate())
    }

    /// Upper bound of the cost of `gas_limit` units at this tier
    pub fn max_cost(&self, gas_limit: U256) -> U256 {
        gas_limit.saturating_mul(self.max_fee)
    }
}

/// Low / average / high recommendations derived from one observation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeeTiers {
    pub low: GasFeeTier,
    pub average: GasFeeTier,
    pub high: GasFeeTier,
}

impl FeeTiers {
    pub fn get(&self, tier: FeeTier) -> &GasFeeTier {
        match tier {
            FeeTier::Low => &self.low,
            FeeTier::Average => &self.average,
            FeeTier::High => &self.high,
        }
    }
}

/// Compute the three named tiers
pub fn compute_fee_tiers(base_fee: &str, suggest_priority_fee: &str) -> FeeTiers {
    FeeTiers {
        low: GasFeeTier::for_tier(base_fee, suggest_priority_fee, FeeTier::Low),
        average: GasFeeTier::for_tier(base_fee, suggest_priority_fee, FeeTier::Average),
        high: GasFeeTier::for_tier(base_fee, suggest_priority_fee, FeeTier::High),
    }
}

/// Live fee data reported by a network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeObservation {
    pub base_fee: String,
    pub suggest_priority_fee: String,
}

impl FeeObservation {
    pub fn tiers(&self) -> FeeTiers {
        compute_fee_tiers(&self.base_fee, &self.suggest_priority_fee)
    }
}

/// Source of fee observations
#[async_trait]
pub trait FeeSource: Send + Sync {
    async fn fee_observation(&self) -> PipelineResult<FeeObservation>;
}

/// Non-negative decimal held as `mantissa / 10^scale`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Decimal {
    mantissa: U256,
    scale: usize,
}

impl Decimal {
    const ZERO: Decimal = Decimal {
        mantissa: U256::zero(),
        scale: 0,
    };

    fn parse_lenient(input: &str) -> Self {
        Self::parse(input).unwrap_or(Self::ZERO)
    }

    /// Accepts an optional leading `+`, a decimal point and an `e`/`E`
    /// exponent. Digits beyond `MAX_FRACTION_DIGITS` are truncated.
    fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
        let (number, exponent) = match unsigned.split_once(['e', 'E']) {
            Some((number, exponent)) => (number, exponent.parse::<i32>().ok()?),
            None => (unsigned, 0),
        };

        let (integer, fraction) = number.split_once('.').unwrap_or((number, ""));
        if integer.is_empty() && fraction.is_empty() {
            return None;
        }
        let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(integer) || !all_digits(fraction) {
            return None;
        }

        let digits = format!("{}{}", integer, fraction);
        let mantissa = U256::from_dec_str(&digits).ok()?;
        let scale = fraction.len() as i64 - i64::from(exponent);

        if scale <= 0 {
            let shift = usize::try_from(-scale).ok()?;
            if shift > MAX_DECIMAL_DIGITS {
                return None;
            }
            return Some(Self {
                mantissa: mantissa.checked_mul(U256::exp10(shift))?,
                scale: 0,
            });
        }

        let scale = usize::try_from(scale).ok()?;
        let excess = scale.saturating_sub(MAX_FRACTION_DIGITS);
        let mantissa = if excess > MAX_DECIMAL_DIGITS {
            U256::zero()
        } else {
            mantissa / U256::exp10(excess)
        };
        Some(Self {
            mantissa,
            scale: scale - excess,
        })
    }

    fn denominator(&self) -> U256 {
        U256::exp10(self.scale)
    }

    fn add_integer(self, value: U256) -> Self {
        Self {
            mantissa: value
                .saturating_mul(self.denominator())
                .saturating_add(self.mantissa),
            scale: self.scale,
        }
    }

    /// floor(self * percent / 100)
    fn scale_floor(&self, percent: u64) -> U256 {
        let numerator = self.mantissa.saturating_mul(U256::from(percent));
        numerator / (self.denominator() * U256::from(100u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_tiers() {
        let tiers = compute_fee_tiers("100", "10");

        assert_eq!(tiers.low.max_priority_fee, U256::from(10));
        assert_eq!(tiers.low.max_fee, U256::from(110));
        assert_eq!(tiers.average.max_priority_fee, U256::from(15));
        assert_eq!(tiers.average.max_fee, U256::from(127));
        assert_eq!(tiers.high.max_priority_fee, U256::from(20));
        assert_eq!(tiers.high.max_fee, U256::from(180));

        assert_eq!(tiers.average.base_fee, "100");
        assert_eq!(tiers.average.suggest_priority_fee, "10");
    }

    #[test]
    fn test_tiers_are_monotonic() {
        let inputs = [
            ("0", "0"),
            ("1", "1"),
            ("7", "3"),
            ("30000000000", "1500000000"),
            ("12345678901234567890", "987654321"),
            ("100.75", "2.5"),
        ];

        for (base, priority) in inputs {
            let tiers = compute_fee_tiers(base, priority);
            assert!(tiers.high.max_fee >= tiers.average.max_fee, "{base}/{priority}");
            assert!(tiers.average.max_fee >= tiers.low.max_fee, "{base}/{priority}");
            assert!(tiers.high.max_priority_fee >= tiers.average.max_priority_fee);
            assert!(tiers.average.max_priority_fee >= tiers.low.max_priority_fee);
        }
    }

    #[test]
    fn test_computation_is_deterministic() {
        let first = compute_fee_tiers("27000000123", "1000000007");
        for _ in 0..100 {
            assert_eq!(compute_fee_tiers("27000000123", "1000000007"), first);
        }
    }

    #[test]
    fn test_unparsable_inputs_count_as_zero() {
        let tiers = compute_fee_tiers("", "not a number");
        for tier in FeeTier::ALL {
            assert_eq!(tiers.get(tier).max_priority_fee, U256::zero());
            assert_eq!(tiers.get(tier).max_fee, U256::zero());
        }

        let tiers = compute_fee_tiers("-5", "10");
        assert_eq!(tiers.low.max_fee, U256::from(10));
    }

    #[test]
    fn test_truncates_instead_of_rounding() {
        // 11 * 1.5 = 16.5 -> 16; (16 + 100) * 1.11 = 128.76 -> 128
        let average = GasFeeTier::for_tier("100", "11", FeeTier::Average);
        assert_eq!(average.max_priority_fee, U256::from(16));
        assert_eq!(average.max_fee, U256::from(128));
    }

    #[test]
    fn test_fractional_inputs() {
        let low = GasFeeTier::for_tier("0.5", "1.5", FeeTier::Low);
        assert_eq!(low.max_priority_fee, U256::from(1));
        assert_eq!(low.max_fee, U256::from(1));

        let high = GasFeeTier::for_tier("10.9", ".5", FeeTier::High);
        // 0.5 * 2 = 1; (1 + 10.9) * 1.5 = 17.85
        assert_eq!(high.max_priority_fee, U256::from(1));
        assert_eq!(high.max_fee, U256::from(17));
    }

    #[test]
    fn test_signed_and_exponent_inputs() {
        let fees = |base: &str, priority: &str| -> Vec<(U256, U256)> {
            let tiers = compute_fee_tiers(base, priority);
            FeeTier::ALL
                .iter()
                .map(|tier| (tiers.get(*tier).max_priority_fee, tiers.get(*tier).max_fee))
                .collect()
        };
        let plain = fees("100", "10");
        assert_eq!(fees("+100", "+10"), plain);
        assert_eq!(fees("1e2", "1E1"), plain);
        assert_eq!(fees("1000e-1", "0.1e2"), plain);

        let gwei = GasFeeTier::for_tier("3e9", "1.5e9", FeeTier::Low);
        assert_eq!(gwei.max_priority_fee, U256::from(1_500_000_000u64));
        assert_eq!(gwei.max_fee, U256::from(4_500_000_000u64));

        // Beyond 18 fraction digits the value truncates to zero
        let tiny = GasFeeTier::for_tier("1e-30", "0", FeeTier::High);
        assert_eq!(tiny.max_fee, U256::zero());

        // Overflowing or malformed exponents count as zero
        let tiers = compute_fee_tiers("1e100", "1e");
        assert_eq!(tiers.low.max_fee, U256::zero());
    }

    #[test]
    fn test_custom_rate_and_cost() {
        let tier = GasFeeTier::with_rate("100", "10", FeeRate::new(300, 200));
        assert_eq!(tier.max_priority_fee, U256::from(30));
        assert_eq!(tier.max_fee, U256::from(260));
        assert_eq!(tier.max_cost(U256::from(21_000)), U256::from(5_460_000));
    }
}
