//! Configuration management for the transaction pipeline
//!
//! Loads configuration from TOML files with environment variable substitution.

use crate::tx::{DEFAULT_EXPIRATION_WINDOW_SECS, DEFAULT_GAS_UNIT_PRICE, DEFAULT_MAX_GAS_AMOUNT};

use anyhow::{Context, Result};
use regex::{Captures, Regex};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "CHAIN_PIPELINE_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub chains: HashMap<String, ChainConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// How often the binary logs fee tiers of EVM chains
    #[serde(default = "default_fee_poll_interval_secs")]
    pub fee_poll_interval_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fee_poll_interval_secs: default_fee_poll_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human readable output
    #[serde(default)]
    pub json: bool,
}

/// Chain family served by a backend
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChainKind {
    Ledger,
    Evm,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub name: String,
    pub kind: ChainKind,
    pub url: String,
    pub enabled: bool,
    #[serde(default = "default_max_gas_amount")]
    pub max_gas_amount: u64,
    #[serde(default = "default_gas_unit_price")]
    pub gas_unit_price: u64,
    #[serde(default = "default_expiration_window_secs")]
    pub expiration_window_secs: u64,
    /// Upper bound of in-flight lookups in a batch status query
    #[serde(default = "default_max_concurrent_queries")]
    pub max_concurrent_queries: usize,
}

fn default_fee_poll_interval_secs() -> u64 {
    30
}

fn default_max_gas_amount() -> u64 {
    DEFAULT_MAX_GAS_AMOUNT
}

fn default_gas_unit_price() -> u64 {
    DEFAULT_GAS_UNIT_PRICE
}

fn default_expiration_window_secs() -> u64 {
    DEFAULT_EXPIRATION_WINDOW_SECS
}

fn default_max_concurrent_queries() -> usize {
    16
}

impl Settings {
    /// Load settings from the file named by `CHAIN_PIPELINE_CONFIG`
    pub fn load() -> Result<Self> {
        let config_path = env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        Self::load_from(&config_path)
    }

    /// Load settings from a specific file
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::parse(&config_str)
    }

    /// Parse and validate a TOML document
    pub fn parse(config_str: &str) -> Result<Self> {
        // Substitute environment variables
        let config_str = substitute_env_vars(config_str)?;

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        // At least one chain must be enabled
        if self.enabled_chains().is_empty() {
            anyhow::bail!("At least one chain must be enabled");
        }

        for (name, chain) in self.enabled_chains() {
            if chain.url.trim().is_empty() {
                anyhow::bail!("Chain {} has no URL configured", name);
            }
            if chain.max_gas_amount == 0 {
                anyhow::bail!("Chain {} has a zero max_gas_amount", name);
            }
            if chain.expiration_window_secs == 0 {
                anyhow::bail!("Chain {} has a zero expiration window", name);
            }
            if chain.max_concurrent_queries == 0 {
                anyhow::bail!("Chain {} allows no concurrent queries", name);
            }
        }

        if self.pipeline.fee_poll_interval_secs == 0 {
            anyhow::bail!("fee_poll_interval_secs must be greater than zero");
        }

        Ok(())
    }

    /// Enabled chains ordered by key
    pub fn enabled_chains(&self) -> Vec<(&String, &ChainConfig)> {
        let mut chains: Vec<_> = self.chains.iter().filter(|(_, c)| c.enabled).collect();
        chains.sort_by(|a, b| a.0.cmp(b.0));
        chains
    }

    /// Get chain config by its display name
    pub fn get_chain_by_name(&self, name: &str) -> Option<&ChainConfig> {
        self.chains.values().find(|c| c.name == name)
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").context("Invalid substitution pattern")?;

    let result = re.replace_all(input, |cap: &Captures| env::var(&cap[1]).unwrap_or_default());

    Ok(result.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[pipeline]
fee_poll_interval_secs = 15

[metrics]
enabled = true
port = 9100

[chains.aptos_devnet]
name = "Aptos Devnet"
kind = "ledger"
url = "https://fullnode.devnet.aptoslabs.com"
enabled = true
expiration_window_secs = 120

[chains.sepolia]
name = "Sepolia"
kind = "evm"
url = "${PIPELINE_TEST_SEPOLIA_URL}"
enabled = true
max_concurrent_queries = 4

[chains.mainnet]
name = "Mainnet"
kind = "evm"
url = ""
enabled = false
"#;

    #[test]
    fn test_env_var_substitution() {
        env::set_var("PIPELINE_TEST_VAR", "test_value");
        let input = "url = \"https://api.example.com/${PIPELINE_TEST_VAR}/endpoint\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, "url = \"https://api.example.com/test_value/endpoint\"");

        let missing = substitute_env_vars("x = \"${PIPELINE_TEST_UNSET_VAR}\"").unwrap();
        assert_eq!(missing, "x = \"\"");
    }

    #[test]
    fn test_load_from_file() {
        env::set_var("PIPELINE_TEST_SEPOLIA_URL", "https://rpc.sepolia.org");

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let settings = Settings::load_from(file.path()).unwrap();
        assert_eq!(settings.pipeline.fee_poll_interval_secs, 15);
        assert!(settings.metrics.enabled);
        assert!(!settings.logging.json);

        let enabled: Vec<_> = settings
            .enabled_chains()
            .into_iter()
            .map(|(key, _)| key.as_str())
            .collect();
        assert_eq!(enabled, vec!["aptos_devnet", "sepolia"]);

        let devnet = &settings.chains["aptos_devnet"];
        assert_eq!(devnet.kind, ChainKind::Ledger);
        assert_eq!(devnet.max_gas_amount, 1000);
        assert_eq!(devnet.gas_unit_price, 1);
        assert_eq!(devnet.expiration_window_secs, 120);
        assert_eq!(devnet.max_concurrent_queries, 16);

        let sepolia = settings.get_chain_by_name("Sepolia").unwrap();
        assert_eq!(sepolia.url, "https://rpc.sepolia.org");
        assert_eq!(sepolia.max_concurrent_queries, 4);
    }

    #[test]
    fn test_validation_failures() {
        let no_enabled = r#"
[chains.devnet]
name = "Devnet"
kind = "ledger"
url = "http://localhost:8080"
enabled = false
"#;
        assert!(Settings::parse(no_enabled).is_err());

        let empty_url = r#"
[chains.devnet]
name = "Devnet"
kind = "ledger"
url = "  "
enabled = true
"#;
        assert!(Settings::parse(empty_url).is_err());

        let zero_window = r#"
[chains.devnet]
name = "Devnet"
kind = "ledger"
url = "http://localhost:8080"
enabled = true
expiration_window_secs = 0
"#;
        assert!(Settings::parse(zero_window).is_err());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load_from(&dir.path().join("absent.toml")).is_err());
    }
}
