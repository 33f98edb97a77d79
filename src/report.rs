// 🧾 Presentation boundary - cents become dollars only here
//
// Row shapes and key order match the JSON the ledger queries have always
// returned.

use crate::aggregation::DailyNetSeries;
use crate::db::{format_timestamp, TransactionRecord};
use crate::error::Result;
use crate::forecast::ForecastResult;
use chrono::NaiveDate;
use serde::Serialize;

pub fn cents_to_dollars(cents: i64) -> f64 {
    cents as f64 / 100.0
}

pub fn cents_to_dollars_f64(cents: f64) -> f64 {
    cents / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserLedgerEntry {
    pub user_id: i64,
    /// "YYYY-MM-DD HH:MM:SS"
    pub datetime: String,
    pub merchant_type_code: i64,
    pub amount_in_dollars: f64,
}

impl From<&TransactionRecord> for UserLedgerEntry {
    fn from(record: &TransactionRecord) -> Self {
        UserLedgerEntry {
            user_id: record.user_id,
            datetime: format_timestamp(&record.timestamp),
            merchant_type_code: record.merchant_type_code,
            amount_in_dollars: cents_to_dollars(record.amount_cents),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MerchantNetEntry {
    pub date: NaiveDate,
    pub merchant_type_code: i64,
    pub net_amount_in_dollars: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastRow {
    pub date: NaiveDate,
    pub actual_amount: Option<f64>,
    pub predicted_amount: f64,
}

pub fn user_ledger(records: &[TransactionRecord]) -> Vec<UserLedgerEntry> {
    records.iter().map(UserLedgerEntry::from).collect()
}

pub fn merchant_net(series: &DailyNetSeries) -> Vec<MerchantNetEntry> {
    series
        .iter()
        .map(|e| MerchantNetEntry {
            date: e.date,
            merchant_type_code: e.merchant_type_code,
            net_amount_in_dollars: cents_to_dollars(e.net_amount_cents),
        })
        .collect()
}

pub fn forecast_rows(result: &ForecastResult) -> Vec<ForecastRow> {
    result
        .points
        .iter()
        .map(|p| ForecastRow {
            date: p.date,
            actual_amount: p.actual_cents.map(cents_to_dollars),
            predicted_amount: cents_to_dollars_f64(p.predicted_cents),
        })
        .collect()
}

pub fn user_ledger_json(records: &[TransactionRecord]) -> Result<String> {
    Ok(serde_json::to_string(&user_ledger(records))?)
}

pub fn merchant_net_json(series: &DailyNetSeries) -> Result<String> {
    Ok(serde_json::to_string(&merchant_net(series))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::DailyNetEntry;
    use crate::db::{parse_timestamp, TransactionKind};
    use crate::forecast::ForecastPoint;

    #[test]
    fn test_user_ledger_json_shape() {
        let records = vec![TransactionRecord::new(
            1,
            123,
            1000,
            parse_timestamp("2023-06-01 10:00:00").unwrap(),
            TransactionKind::Purchase,
        )];
        assert_eq!(
            user_ledger_json(&records).unwrap(),
            r#"[{"user_id":1,"datetime":"2023-06-01 10:00:00","merchant_type_code":123,"amount_in_dollars":10.0}]"#
        );
    }

    #[test]
    fn test_merchant_net_json_shape() {
        let series = DailyNetSeries::from_entries(vec![DailyNetEntry {
            date: NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(),
            merchant_type_code: 123,
            net_amount_cents: 5000,
        }])
        .unwrap();
        assert_eq!(
            merchant_net_json(&series).unwrap(),
            r#"[{"date":"2023-06-01","merchant_type_code":123,"net_amount_in_dollars":50.0}]"#
        );
    }

    #[test]
    fn test_empty_inputs_render_empty_arrays() {
        assert_eq!(user_ledger_json(&[]).unwrap(), "[]");
        assert_eq!(merchant_net_json(&DailyNetSeries::new()).unwrap(), "[]");
    }

    #[test]
    fn test_forecast_rows_in_dollars() {
        let date = NaiveDate::from_ymd_opt(2023, 2, 1).unwrap();
        let result = ForecastResult {
            points: vec![
                ForecastPoint { date, actual_cents: Some(1250), predicted_cents: 1200.0 },
                ForecastPoint { date: date.succ_opt().unwrap(), actual_cents: None, predicted_cents: 1100.0 },
            ],
            model: None,
        };

        let rows = forecast_rows(&result);
        assert_eq!(rows[0].actual_amount, Some(12.5));
        assert_eq!(rows[0].predicted_amount, 12.0);
        assert_eq!(rows[1].actual_amount, None);
        assert_eq!(cents_to_dollars(-350), -3.5);
    }
}
