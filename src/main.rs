//! Chain transaction pipeline daemon
//!
//! Loads the chain configuration, serves Prometheus metrics and periodically
//! logs fee tiers for every enabled EVM chain.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

use chain_tx_pipeline::chain::{Chain, EvmChain};
use chain_tx_pipeline::config::{ChainKind, Settings};
use chain_tx_pipeline::metrics::{self, MetricsServer};
use chain_tx_pipeline::tx::FeeTier;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::load().context("Failed to load configuration")?;

    // Initialize logging
    init_logging(settings.logging.json);

    info!("Starting chain-tx-pipeline v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Loaded configuration for {} chains",
        settings.enabled_chains().len()
    );

    let mut evm_chains = Vec::new();
    for (key, chain_config) in settings.enabled_chains() {
        match chain_config.kind {
            ChainKind::Evm => {
                info!("Initializing EVM chain {} ({})", chain_config.name, key);
                evm_chains.push(Arc::new(EvmChain::from_config(chain_config)));
            }
            ChainKind::Ledger => {
                info!(
                    "Ledger chain {} ({}) is served through an embedded LedgerClient",
                    chain_config.name, key
                );
            }
        }
    }

    // Start metrics server
    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    // Fee tier loop
    let fee_handle = tokio::spawn({
        let interval = settings.pipeline.fee_poll_interval_secs;
        async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval));
            loop {
                ticker.tick().await;
                for chain in &evm_chains {
                    log_fee_tiers(chain).await;
                }
            }
        }
    });

    info!("chain-tx-pipeline is running");
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutdown signal received, stopping...");

    fee_handle.abort();
    if let Some(h) = metrics_handle {
        h.abort();
    }

    info!("chain-tx-pipeline stopped");
    Ok(())
}

async fn log_fee_tiers(chain: &EvmChain) {
    match chain.fee_tiers().await {
        Ok(tiers) => {
            for tier in FeeTier::ALL {
                let fee = tiers.get(tier);
                info!(
                    "{} {} tier: max_priority_fee={} max_fee={}",
                    chain.name(),
                    tier,
                    fee.max_priority_fee,
                    fee.max_fee
                );
            }
        }
        Err(e) => {
            warn!("Fee tiers unavailable for {}: {}", chain.name(), e);
            metrics::record_tx_failed(chain.name(), e.stage());
        }
    }
}

fn init_logging(json: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,chain_tx_pipeline=debug,hyper=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_target(true)))
        .with((!json).then(|| fmt::layer().with_target(true).with_thread_ids(true)))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
