use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ledger_forecast::{
    fetch_merchant_net, fetch_user_ledger, forecast_rows, load_csv, merchant_net_json,
    replace_ledger, setup_database, user_ledger_json, ArimaOrder, Forecaster, LedgerConfig,
    StationarityAnalyzer,
};

#[derive(Parser)]
#[command(name = "ledger-forecast")]
#[command(about = "Reconcile purchases and returns, then analyse and forecast daily net per merchant")]
#[command(version)]
struct Cli {
    /// TOML configuration file (defaults apply when omitted)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replace the database contents with a CSV ledger
    Import {
        /// Overrides storage.csv_path
        #[arg(long, value_name = "PATH")]
        csv: Option<PathBuf>,
    },

    /// All purchases and returns of one user
    User { user_id: i64 },

    /// Daily net amounts of one merchant category
    Merchant { merchant_type_code: i64 },

    /// Unit-root test on a merchant's daily net series
    Stationarity { merchant_type_code: i64 },

    /// Fit on all but the trailing test days, predict them plus a horizon
    Forecast {
        merchant_type_code: i64,

        #[arg(long)]
        test_days: Option<usize>,

        #[arg(long)]
        horizon: Option<usize>,

        /// Model order as "p,d,q"
        #[arg(long, value_name = "P,D,Q")]
        order: Option<ArimaOrder>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "ledger_forecast=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => LedgerConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => LedgerConfig::default(),
    };

    match cli.command {
        Command::Import { csv } => run_import(&config, csv),
        Command::User { user_id } => {
            let conn = open_database(&config)?;
            let records = fetch_user_ledger(&conn, &config.storage, user_id)?;
            println!("{}", user_ledger_json(&records)?);
            Ok(())
        }
        Command::Merchant { merchant_type_code } => {
            let conn = open_database(&config)?;
            let series = fetch_merchant_net(
                &conn,
                &config.storage,
                merchant_type_code,
                config.reconciliation.match_policy,
            )?;
            println!("{}", merchant_net_json(&series)?);
            Ok(())
        }
        Command::Stationarity { merchant_type_code } => {
            run_stationarity(&config, merchant_type_code)
        }
        Command::Forecast {
            merchant_type_code,
            test_days,
            horizon,
            order,
        } => {
            let mut forecast = config.forecast.clone();
            if let Some(days) = test_days {
                forecast.test_days = days;
            }
            if let Some(h) = horizon {
                forecast.horizon = h;
            }
            if let Some(o) = order {
                forecast.order = o;
            }
            let config = LedgerConfig { forecast, ..config };
            run_forecast(&config, merchant_type_code)
        }
    }
}

fn open_database(config: &LedgerConfig) -> Result<Connection> {
    let path = &config.storage.database_path;
    let conn = Connection::open(path)
        .with_context(|| format!("opening database {}", path.display()))?;
    setup_database(&conn, &config.storage)?;
    Ok(conn)
}

fn run_import(config: &LedgerConfig, csv: Option<PathBuf>) -> Result<()> {
    let csv_path = csv.unwrap_or_else(|| config.storage.csv_path.clone());

    let records = load_csv(&csv_path)
        .with_context(|| format!("reading ledger {}", csv_path.display()))?;
    info!(records = records.len(), path = %csv_path.display(), "ledger loaded");

    let mut conn = open_database(config)?;
    let summary = replace_ledger(&mut conn, &config.storage, &records)?;

    println!(
        "{}",
        json!({
            "purchases": summary.purchases,
            "returns": summary.returns,
            "total": summary.total(),
        })
    );
    Ok(())
}

fn run_stationarity(config: &LedgerConfig, merchant_type_code: i64) -> Result<()> {
    let conn = open_database(config)?;
    let series = fetch_merchant_net(
        &conn,
        &config.storage,
        merchant_type_code,
        config.reconciliation.match_policy,
    )?;

    let report = StationarityAnalyzer::from_config(&config.stationarity)
        .analyze_series(&series)
        .with_context(|| format!("stationarity test for merchant {}", merchant_type_code))?;
    info!("{}", report.summary());

    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

fn run_forecast(config: &LedgerConfig, merchant_type_code: i64) -> Result<()> {
    let conn = open_database(config)?;
    let series = fetch_merchant_net(
        &conn,
        &config.storage,
        merchant_type_code,
        config.reconciliation.match_policy,
    )?;

    let result = Forecaster::from_config(&config.forecast)
        .forecast_trailing(&series, config.forecast.test_days, config.forecast.horizon)
        .with_context(|| format!("forecast for merchant {}", merchant_type_code))?;

    println!(
        "{}",
        json!({
            "merchant_type_code": merchant_type_code,
            "model": result.model,
            "mean_absolute_error": result.mean_absolute_error().map(|mae| mae / 100.0),
            "rows": forecast_rows(&result),
        })
    );
    Ok(())
}
