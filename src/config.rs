// ⚙️ Configuration - defaults, optional JSON file, env overrides
//
// Precedence (lowest to highest):
//   built-in defaults < config file < DEBT_LEDGER_* env vars < CLI flags
//
// CLI flags are applied by the binaries; this module handles the rest.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_DB_PATH: &str = "DEBT_LEDGER_DB";
pub const ENV_SERVER_ADDR: &str = "DEBT_LEDGER_ADDR";
pub const ENV_HIGH_APR: &str = "DEBT_LEDGER_HIGH_APR";
pub const ENV_PROMO_WARNING_DAYS: &str = "DEBT_LEDGER_PROMO_WARNING_DAYS";
pub const ENV_UPCOMING_PAYMENT_DAYS: &str = "DEBT_LEDGER_UPCOMING_PAYMENT_DAYS";

// ============================================================================
// ALERT SETTINGS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertSettings {
    /// APR (percent) at or above which a debt is flagged
    pub high_apr_threshold: f64,

    /// Warn this many days before a promotional rate ends
    pub promo_warning_days: i64,

    /// Flag payments falling due within this many days
    pub upcoming_payment_days: i64,
}

impl Default for AlertSettings {
    fn default() -> Self {
        AlertSettings {
            high_apr_threshold: 20.0,
            promo_warning_days: 30,
            upcoming_payment_days: 7,
        }
    }
}

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub db_path: PathBuf,
    pub server_addr: String,
    pub alerts: AlertSettings,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: PathBuf::from("debt-ledger.db"),
            server_addr: "127.0.0.1:3000".to_string(),
            alerts: AlertSettings::default(),
        }
    }
}

impl Config {
    /// Load config from JSON file; missing keys keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;

        Ok(config)
    }

    /// Defaults (or `path` if given), then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Config::from_file(p)?,
            None => Config::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `DEBT_LEDGER_*` overrides from `lookup` (normally the process env)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db) = lookup(ENV_DB_PATH) {
            self.db_path = PathBuf::from(db);
        }
        if let Some(addr) = lookup(ENV_SERVER_ADDR) {
            self.server_addr = addr;
        }
        if let Some(apr) = lookup(ENV_HIGH_APR) {
            self.alerts.high_apr_threshold = apr
                .parse()
                .with_context(|| format!("{} must be a number, got {:?}", ENV_HIGH_APR, apr))?;
        }
        if let Some(days) = lookup(ENV_PROMO_WARNING_DAYS) {
            self.alerts.promo_warning_days = days.parse().with_context(|| {
                format!("{} must be an integer, got {:?}", ENV_PROMO_WARNING_DAYS, days)
            })?;
        }
        if let Some(days) = lookup(ENV_UPCOMING_PAYMENT_DAYS) {
            self.alerts.upcoming_payment_days = days.parse().with_context(|| {
                format!("{} must be an integer, got {:?}", ENV_UPCOMING_PAYMENT_DAYS, days)
            })?;
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.db_path, PathBuf::from("debt-ledger.db"));
        assert_eq!(config.alerts.high_apr_threshold, 20.0);
        assert_eq!(config.alerts.promo_warning_days, 30);
        assert_eq!(config.alerts.upcoming_payment_days, 7);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"db_path": "/tmp/ledger.db", "alerts": {{"high_apr_threshold": 25.5}}}}"#).unwrap();

        let config = Config::from_file(file.path()).unwrap();

        assert_eq!(config.db_path, PathBuf::from("/tmp/ledger.db"));
        assert_eq!(config.server_addr, "127.0.0.1:3000");
        assert_eq!(config.alerts.high_apr_threshold, 25.5);
        assert_eq!(config.alerts.promo_warning_days, 30);
    }

    #[test]
    fn test_missing_file_is_error() {
        let err = Config::from_file("/definitely/not/here.json").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_DB_PATH, "other.db"),
            (ENV_HIGH_APR, "18"),
            (ENV_UPCOMING_PAYMENT_DAYS, "3"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.db_path, PathBuf::from("other.db"));
        assert_eq!(config.alerts.high_apr_threshold, 18.0);
        assert_eq!(config.alerts.upcoming_payment_days, 3);
        assert_eq!(config.alerts.promo_warning_days, 30);
    }

    #[test]
    fn test_bad_env_override() {
        let mut config = Config::default();
        let result = config.apply_overrides(|key| {
            (key == ENV_PROMO_WARNING_DAYS).then(|| "soon".to_string())
        });
        assert!(result.is_err());
    }
}
