// ⚙️ Configuration - one struct passed in at construction time
//
// Replaces hardcoded file paths and SQL table names. Every section falls back
// to defaults so a partial (or empty) TOML file is valid.

use crate::error::{LedgerError, Result};
use crate::reconciliation::MatchPolicy;
use crate::stats::ArimaOrder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ============================================================================
// SECTIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: PathBuf,
    pub csv_path: PathBuf,
    pub purchases_table: String,
    pub returns_table: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            database_path: PathBuf::from("ledger.db"),
            csv_path: PathBuf::from("combined_transactions.csv"),
            purchases_table: "purchases".to_string(),
            returns_table: "returns".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    pub match_policy: MatchPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationarityConfig {
    /// p-values below this reject the unit-root null
    pub significance: f64,
    pub min_observations: usize,
    /// None = automatic lag bound from the sample size
    pub max_lag: Option<usize>,
}

impl Default for StationarityConfig {
    fn default() -> Self {
        StationarityConfig {
            significance: 0.05,
            min_observations: 10,
            max_lag: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub order: ArimaOrder,
    /// Future days predicted beyond the held-out range
    pub horizon: usize,
    /// Trailing days held out for evaluation
    pub test_days: usize,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        ForecastConfig {
            order: ArimaOrder::default(),
            horizon: 10,
            test_days: 13,
            max_iterations: 2000,
            tolerance: 1e-8,
        }
    }
}

// ============================================================================
// ROOT CONFIG
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub storage: StorageConfig,
    pub reconciliation: ReconciliationConfig,
    pub stationarity: StationarityConfig,
    pub forecast: ForecastConfig,
}

impl LedgerConfig {
    /// Read and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: LedgerConfig =
            toml::from_str(text).map_err(|e| LedgerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for table in [&self.storage.purchases_table, &self.storage.returns_table] {
            if !is_sql_identifier(table) {
                return Err(LedgerError::Config(format!(
                    "table name '{}' is not a plain SQL identifier",
                    table
                )));
            }
        }
        if self.storage.purchases_table == self.storage.returns_table {
            return Err(LedgerError::Config(
                "purchases and returns must live in different tables".to_string(),
            ));
        }

        let significance = self.stationarity.significance;
        if !(significance > 0.0 && significance < 1.0) {
            return Err(LedgerError::Config(format!(
                "significance must be in (0, 1), got {}",
                significance
            )));
        }
        if self.stationarity.min_observations < 4 {
            return Err(LedgerError::Config(
                "stationarity.min_observations must be at least 4".to_string(),
            ));
        }

        if self.forecast.max_iterations == 0 {
            return Err(LedgerError::Config(
                "forecast.max_iterations must be positive".to_string(),
            ));
        }
        if !(self.forecast.tolerance > 0.0) {
            return Err(LedgerError::Config(
                "forecast.tolerance must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// Table names are interpolated into SQL, so only [A-Za-z_][A-Za-z0-9_]* passes
fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = LedgerConfig::from_toml_str("").unwrap();
        assert_eq!(config, LedgerConfig::default());
        assert_eq!(config.storage.purchases_table, "purchases");
        assert_eq!(config.forecast.order, ArimaOrder::new(1, 0, 1));
        assert_eq!(config.reconciliation.match_policy, MatchPolicy::ExistenceBased);
    }

    #[test]
    fn test_partial_sections() {
        let config = LedgerConfig::from_toml_str(
            r#"
            [reconciliation]
            match_policy = "one_to_one"

            [forecast]
            horizon = 3
            order = { p = 0, d = 1, q = 2 }
            "#,
        )
        .unwrap();

        assert_eq!(config.reconciliation.match_policy, MatchPolicy::OneToOne);
        assert_eq!(config.forecast.horizon, 3);
        assert_eq!(config.forecast.order, ArimaOrder::new(0, 1, 2));
        assert_eq!(config.forecast.test_days, 13);
        assert_eq!(config.stationarity.significance, 0.05);
    }

    #[test]
    fn test_rejects_injected_table_name() {
        let err = LedgerConfig::from_toml_str(
            r#"
            [storage]
            purchases_table = "purchases; DROP TABLE returns"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::Config(_)));
    }

    #[test]
    fn test_rejects_bad_significance() {
        let mut config = LedgerConfig::default();
        config.stationarity.significance = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_identifier_rules() {
        assert!(is_sql_identifier("purchases"));
        assert!(is_sql_identifier("_ledger_2023"));
        assert!(!is_sql_identifier("2023_ledger"));
        assert!(!is_sql_identifier(""));
        assert!(!is_sql_identifier("a-b"));
    }
}
