//! Configuration for the shipment ledger

use super::lifecycle::DEFAULT_PAYOUT_CENTS;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory of the sled database holding ledger and documents
    pub data_dir: PathBuf,

    /// Upper bound on a single payment gateway call
    pub payment_timeout_ms: u64,

    /// `tracing_subscriber::EnvFilter` directive
    pub log_filter: String,

    /// Payout in cents for shipments delivered without a quoted amount
    pub default_payout_cents: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/shipments"),
            payment_timeout_ms: 5_000,
            log_filter: "info".to_string(),
            default_payout_cents: DEFAULT_PAYOUT_CENTS,
        }
    }
}

impl Config {
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).context("invalid configuration")
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&text)
    }

    pub fn payment_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.payment_timeout_ms)
    }

    pub fn open_sled(&self) -> anyhow::Result<sled::Db> {
        sled::open(&self.data_dir)
            .with_context(|| format!("failed to open ledger at {}", self.data_dir.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config = Config::from_toml_str("payment_timeout_ms = 250").unwrap();

        assert_eq!(config.payment_timeout_ms, 250);
        assert_eq!(config.log_filter, "info");
        assert_eq!(config.data_dir, Config::default().data_dir);
        assert_eq!(config.default_payout_cents, 10_000);
    }

    #[test]
    fn payout_default_is_configurable() {
        let config = Config::from_toml_str("default_payout_cents = 2_500").unwrap();

        assert_eq!(config.default_payout_cents, 2_500);
    }

    #[test]
    fn rejects_wrong_types() {
        assert!(Config::from_toml_str("payment_timeout_ms = \"soon\"").is_err());
    }
}
