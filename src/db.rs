use crate::aggregation::{aggregate, DailyNetSeries};
use crate::config::StorageConfig;
use crate::error::{LedgerError, Result};
use crate::reconciliation::{reconcile, MatchPolicy};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

// ============================================================================
// TRANSACTION RECORD
// ============================================================================

/// Purchase or return, as stored in the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    #[serde(rename = "PurchaseActivity")]
    Purchase,
    #[serde(rename = "ReturnActivity")]
    Return,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Purchase => "PurchaseActivity",
            TransactionKind::Return => "ReturnActivity",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "PurchaseActivity" => Some(TransactionKind::Purchase),
            "ReturnActivity" => Some(TransactionKind::Return),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ledger row. Immutable once loaded; amounts are integer cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub user_id: i64,
    pub merchant_type_code: i64,
    pub amount_cents: i64,
    pub timestamp: NaiveDateTime,
    pub kind: TransactionKind,
    /// Only present when the source ledger carries one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

impl TransactionRecord {
    pub fn new(
        user_id: i64,
        merchant_type_code: i64,
        amount_cents: i64,
        timestamp: NaiveDateTime,
        kind: TransactionKind,
    ) -> Self {
        TransactionRecord {
            user_id,
            merchant_type_code,
            amount_cents,
            timestamp,
            kind,
            transaction_id: None,
        }
    }

    pub fn with_transaction_id(mut self, id: impl Into<String>) -> Self {
        self.transaction_id = Some(id.into());
        self
    }

    /// Calendar date used for matching and daily grouping
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn is_purchase(&self) -> bool {
        self.kind == TransactionKind::Purchase
    }

    pub fn is_return(&self) -> bool {
        self.kind == TransactionKind::Return
    }

    /// Amounts and merchant codes are unsigned in the ledger
    pub fn validate(&self) -> Result<()> {
        if self.amount_cents < 0 {
            return Err(LedgerError::data_shape(format!(
                "user {}: negative amount_cents {}",
                self.user_id, self.amount_cents
            )));
        }
        if self.merchant_type_code < 0 {
            return Err(LedgerError::data_shape(format!(
                "user {}: negative merchant_type_code {}",
                self.user_id, self.merchant_type_code
            )));
        }
        Ok(())
    }
}

/// Raw CSV row - every column is optional text so missing or malformed values
/// become DataShape errors that name the row
#[derive(Debug, Deserialize)]
struct LedgerRow {
    user_id: Option<String>,
    merchant_type_code: Option<String>,
    amount_cents: Option<String>,
    datetime: Option<String>,
    transaction_type: Option<String>,
    #[serde(default)]
    transaction_id: Option<String>,
}

/// Whole-number column; blank counts as missing
fn parse_integer(value: Option<String>, field: &str, row_number: usize) -> Result<i64> {
    let value = value.unwrap_or_default();
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::data_shape(format!(
            "row {}: missing {}",
            row_number, field
        )));
    }
    trimmed.parse::<i64>().map_err(|_| {
        LedgerError::data_shape(format!(
            "row {}: invalid {} '{}'",
            row_number, field, trimmed
        ))
    })
}

impl LedgerRow {
    fn into_record(self, row_number: usize) -> Result<TransactionRecord> {
        let missing =
            |field: &str| LedgerError::data_shape(format!("row {}: missing {}", row_number, field));

        let kind_str = self.transaction_type.ok_or_else(|| missing("transaction_type"))?;
        let kind = TransactionKind::parse(&kind_str).ok_or_else(|| {
            LedgerError::data_shape(format!(
                "row {}: unknown transaction_type '{}'",
                row_number, kind_str
            ))
        })?;

        let datetime = self.datetime.ok_or_else(|| missing("datetime"))?;
        let timestamp = parse_timestamp(&datetime).ok_or_else(|| {
            LedgerError::data_shape(format!(
                "row {}: cannot parse datetime '{}'",
                row_number, datetime
            ))
        })?;

        let record = TransactionRecord {
            user_id: parse_integer(self.user_id, "user_id", row_number)?,
            merchant_type_code: parse_integer(
                self.merchant_type_code,
                "merchant_type_code",
                row_number,
            )?,
            amount_cents: parse_integer(self.amount_cents, "amount_cents", row_number)?,
            timestamp,
            kind,
            transaction_id: self
                .transaction_id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty()),
        };
        record.validate()?;

        Ok(record)
    }
}

/// Accepts "2023-01-01 08:00:00", ISO "T" form, RFC 3339 and bare dates.
///
/// An RFC 3339 offset is dropped, not applied: the wall-clock time as written
/// is kept, so a purchase and a return stamped on the same local day share a
/// calendar date whatever their offsets.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Some(ts);
        }
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.naive_local());
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Canonical storage / display form
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

// ============================================================================
// LEDGER LOADER
// ============================================================================

pub fn load_csv(csv_path: &Path) -> Result<Vec<TransactionRecord>> {
    let rdr = csv::Reader::from_path(csv_path)?;
    read_ledger(rdr)
}

/// Same as load_csv, for any reader (tests, stdin)
pub fn read_ledger<R: std::io::Read>(mut rdr: csv::Reader<R>) -> Result<Vec<TransactionRecord>> {
    let mut records = Vec::new();

    for (index, result) in rdr.deserialize::<LedgerRow>().enumerate() {
        let row = result?;
        records.push(row.into_record(index + 1)?);
    }

    debug!(records = records.len(), "ledger rows parsed");
    Ok(records)
}

// ============================================================================
// SCHEMA
// ============================================================================

/// Rows written by one import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub purchases: usize,
    pub returns: usize,
}

impl ImportSummary {
    pub fn total(&self) -> usize {
        self.purchases + self.returns
    }
}

pub fn setup_database(conn: &Connection, storage: &StorageConfig) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // Surrogate key: a user has many transactions
    for table in [&storage.purchases_table, &storage.returns_table] {
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL,
                    transaction_type TEXT NOT NULL,
                    merchant_type_code INTEGER NOT NULL,
                    amount_cents INTEGER NOT NULL,
                    datetime TEXT NOT NULL,
                    transaction_id TEXT
                )"
            ),
            [],
        )?;

        conn.execute(
            &format!("CREATE INDEX IF NOT EXISTS idx_{table}_user ON {table}(user_id)"),
            [],
        )?;

        conn.execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_merchant ON {table}(merchant_type_code)"
            ),
            [],
        )?;
    }

    Ok(())
}

/// Replace both tables with the given records in a single SQL transaction
pub fn replace_ledger(
    conn: &mut Connection,
    storage: &StorageConfig,
    records: &[TransactionRecord],
) -> Result<ImportSummary> {
    for record in records {
        record.validate()?;
    }

    let tx = conn.transaction()?;
    tx.execute(&format!("DELETE FROM {}", storage.purchases_table), [])?;
    tx.execute(&format!("DELETE FROM {}", storage.returns_table), [])?;

    let mut summary = ImportSummary {
        purchases: 0,
        returns: 0,
    };

    {
        let insert = |table: &str| {
            format!(
                "INSERT INTO {table} (
                    user_id, transaction_type, merchant_type_code, amount_cents, datetime, transaction_id
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            )
        };
        let mut purchases = tx.prepare(&insert(&storage.purchases_table))?;
        let mut returns = tx.prepare(&insert(&storage.returns_table))?;

        for record in records {
            let stmt = match record.kind {
                TransactionKind::Purchase => {
                    summary.purchases += 1;
                    &mut purchases
                }
                TransactionKind::Return => {
                    summary.returns += 1;
                    &mut returns
                }
            };
            stmt.execute(params![
                record.user_id,
                record.kind.as_str(),
                record.merchant_type_code,
                record.amount_cents,
                format_timestamp(&record.timestamp),
                record.transaction_id,
            ])?;
        }
    }

    tx.commit()?;

    info!(
        purchases = summary.purchases,
        returns = summary.returns,
        "ledger replaced"
    );
    Ok(summary)
}

/// (purchases, returns) row counts
pub fn count_records(conn: &Connection, storage: &StorageConfig) -> Result<(i64, i64)> {
    let count = |table: &str| -> Result<i64> {
        Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
            row.get(0)
        })?)
    };

    Ok((
        count(&storage.purchases_table)?,
        count(&storage.returns_table)?,
    ))
}

// ============================================================================
// QUERY BOUNDARY
// ============================================================================

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<TransactionRecord> {
    let kind_str: String = row.get(1)?;
    let datetime: String = row.get(4)?;

    let kind = TransactionKind::parse(&kind_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            format!("unknown transaction_type '{}'", kind_str).into(),
        )
    })?;
    let timestamp = parse_timestamp(&datetime).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("cannot parse datetime '{}'", datetime).into(),
        )
    })?;

    Ok(TransactionRecord {
        user_id: row.get(0)?,
        merchant_type_code: row.get(2)?,
        amount_cents: row.get(3)?,
        timestamp,
        kind,
        transaction_id: row.get(5)?,
    })
}

fn union_query(storage: &StorageConfig, key_column: &str) -> String {
    let columns = "user_id, transaction_type, merchant_type_code, amount_cents, datetime, transaction_id";
    format!(
        "SELECT {columns}, 0 AS source, id FROM {purchases} WHERE {key_column} = ?1
         UNION ALL
         SELECT {columns}, 1 AS source, id FROM {returns} WHERE {key_column} = ?1
         ORDER BY datetime, source, id",
        purchases = storage.purchases_table,
        returns = storage.returns_table,
    )
}

fn query_records(conn: &Connection, sql: &str, key: i64) -> Result<Vec<TransactionRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let records = stmt
        .query_map(params![key], record_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(records)
}

/// All purchases and returns of one user, no dedup. Unknown user = empty.
pub fn fetch_user_ledger(
    conn: &Connection,
    storage: &StorageConfig,
    user_id: i64,
) -> Result<Vec<TransactionRecord>> {
    let records = query_records(conn, &union_query(storage, "user_id"), user_id)?;
    debug!(user_id, records = records.len(), "user ledger fetched");
    Ok(records)
}

pub fn fetch_merchant_records(
    conn: &Connection,
    storage: &StorageConfig,
    merchant_type_code: i64,
) -> Result<Vec<TransactionRecord>> {
    query_records(
        conn,
        &union_query(storage, "merchant_type_code"),
        merchant_type_code,
    )
}

/// Per-day net amount for one merchant: reconcile, then aggregate
pub fn fetch_merchant_net(
    conn: &Connection,
    storage: &StorageConfig,
    merchant_type_code: i64,
    policy: MatchPolicy,
) -> Result<DailyNetSeries> {
    let records = fetch_merchant_records(conn, storage, merchant_type_code)?;
    let net = reconcile(&records, policy)?;
    let series = aggregate(&net);
    debug!(
        merchant_type_code,
        records = records.len(),
        days = series.len(),
        "merchant net computed"
    );
    Ok(series)
}
