//! Numerical building blocks for the statistical stages.

pub mod adf;
pub mod arima;
pub mod linalg;
pub mod normal;
pub mod optimize;

pub use adf::{adfuller, AdfResult, CriticalValues};
pub use arima::{ArimaEstimator, ArimaOrder, FittedArima, FittedModel, ModelEstimator, ModelSummary};
