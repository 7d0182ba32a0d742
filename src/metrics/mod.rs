//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Chain client connections
//! - Transaction submissions and failures by stage
//! - Status query outcomes
//! - Last computed fee tiers

use crate::error::{PipelineError, PipelineResult};
use crate::tx::FeeTiers;

use axum::{http::StatusCode, routing::get, Router};
use ethers::types::U256;
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge_vec, CounterVec, Encoder, GaugeVec, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    // Chain metrics
    pub static ref CHAIN_CONNECTED: GaugeVec = register_gauge_vec!(
        "chain_pipeline_chain_connected",
        "Chain client status (1=connected, 0=connect failed)",
        &["chain"]
    ).unwrap();

    // Transaction metrics
    pub static ref TX_SUBMITTED: CounterVec = register_counter_vec!(
        "chain_pipeline_transactions_submitted_total",
        "Total transactions submitted",
        &["chain"]
    ).unwrap();

    pub static ref TX_FAILED: CounterVec = register_counter_vec!(
        "chain_pipeline_transactions_failed_total",
        "Total submissions aborted, by pipeline stage",
        &["chain", "stage"]
    ).unwrap();

    pub static ref STATUS_QUERIES: CounterVec = register_counter_vec!(
        "chain_pipeline_status_queries_total",
        "Status queries by result",
        &["chain", "status"]
    ).unwrap();

    // Fee metrics
    pub static ref FEE_TIER_MAX_FEE: GaugeVec = register_gauge_vec!(
        "chain_pipeline_fee_tier_max_fee_wei",
        "Last computed max fee per gas by tier",
        &["chain", "tier"]
    ).unwrap();

    pub static ref FEE_TIER_MAX_PRIORITY_FEE: GaugeVec = register_gauge_vec!(
        "chain_pipeline_fee_tier_max_priority_fee_wei",
        "Last computed max priority fee per gas by tier",
        &["chain", "tier"]
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> PipelineResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| PipelineError::Internal(format!("bind {}: {}", addr, e)))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| PipelineError::Internal(format!("metrics server: {}", e)))?;

        Ok(())
    }
}

async fn metrics_handler() -> Result<String, (StatusCode, String)> {
    render().map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// Text exposition of every registered metric
pub fn render() -> PipelineResult<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| PipelineError::Internal(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| PipelineError::Internal(e.to_string()))
}

// Helper functions to record metrics

pub fn record_chain_connected(chain: &str, connected: bool) {
    CHAIN_CONNECTED
        .with_label_values(&[chain])
        .set(if connected { 1.0 } else { 0.0 });
}

pub fn record_tx_submitted(chain: &str) {
    TX_SUBMITTED.with_label_values(&[chain]).inc();
}

pub fn record_tx_failed(chain: &str, stage: &str) {
    TX_FAILED.with_label_values(&[chain, stage]).inc();
}

pub fn record_status_query(chain: &str, status: &str) {
    STATUS_QUERIES.with_label_values(&[chain, status]).inc();
}

pub fn record_fee_tiers(chain: &str, tiers: &FeeTiers) {
    for tier in crate::tx::FeeTier::ALL {
        let fee = tiers.get(tier);
        FEE_TIER_MAX_FEE
            .with_label_values(&[chain, tier.as_str()])
            .set(as_gauge(fee.max_fee));
        FEE_TIER_MAX_PRIORITY_FEE
            .with_label_values(&[chain, tier.as_str()])
            .set(as_gauge(fee.max_priority_fee));
    }
}

/// Lossy conversion for gauges; values beyond 128 bits saturate
fn as_gauge(value: U256) -> f64 {
    if value.bits() <= 128 {
        value.low_u128() as f64
    } else {
        f64::MAX
    }
}
