// Ledger Forecast - Core Library
// Reconcile returns against purchases, aggregate daily net per merchant,
// test stationarity and forecast. Used by the CLI, the API server and tests.

pub mod config;
pub mod error;
pub mod db;
pub mod reconciliation;
pub mod aggregation;
pub mod stats;
pub mod stationarity;
pub mod forecast;
pub mod report;

// Re-export commonly used types
pub use config::{
    ForecastConfig, LedgerConfig, ReconciliationConfig, StationarityConfig, StorageConfig,
};
pub use error::{LedgerError, Result};
pub use db::{
    TransactionKind, TransactionRecord, ImportSummary,
    load_csv, read_ledger, parse_timestamp, format_timestamp,
    setup_database, replace_ledger, count_records,
    fetch_user_ledger, fetch_merchant_records, fetch_merchant_net,
};
pub use reconciliation::{
    reconcile, MatchKey, MatchPolicy, NetPurchaseRecord, ReconciliationEngine,
    ReconciliationOutcome,
};
pub use aggregation::{aggregate, aggregate_net, DailyNetEntry, DailyNetSeries};
pub use stats::{
    adfuller, AdfResult, ArimaEstimator, ArimaOrder, CriticalValues, FittedArima, FittedModel,
    ModelEstimator, ModelSummary,
};
pub use stationarity::{StationarityAnalyzer, StationarityReport};
pub use forecast::{resample_daily, ForecastPoint, ForecastResult, Forecaster};
pub use report::{
    cents_to_dollars, cents_to_dollars_f64, forecast_rows, merchant_net_json, user_ledger_json,
    ForecastRow, MerchantNetEntry, UserLedgerEntry,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
