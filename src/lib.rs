//! Multi-chain transaction pipeline
//!
//! Builds, signs and submits ledger transactions, queries transaction detail
//! and status across chain families, and derives EIP-1559 fee tiers.

pub mod chain;
pub mod config;
pub mod error;
pub mod metrics;
pub mod tx;

pub use chain::{Chain, EvmChain, LedgerChain};
pub use error::{PipelineError, PipelineResult};
