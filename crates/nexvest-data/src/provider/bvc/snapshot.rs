//! 일별 스냅샷과 종목별 레코드 추출.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;

use crate::model::{HistoricalRecord, Security};

/// 거래소 응답의 종목 행.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BvcRow {
    pub mnemonic: String,
    pub board: String,
    #[serde(default)]
    pub open_price: Option<Decimal>,
    #[serde(default)]
    pub maximum_price: Option<Decimal>,
    #[serde(default)]
    pub minimum_price: Option<Decimal>,
    #[serde(default)]
    pub last_price: Option<Decimal>,
    #[serde(default)]
    pub volume: Option<Decimal>,
    #[serde(default)]
    pub average_price: Option<Decimal>,
    #[serde(default)]
    pub absolute_variation: Option<Decimal>,
    #[serde(default)]
    pub percentage_variation: Option<Decimal>,
}

/// 한 번의 호출로 받은 특정 날짜의 전 종목 데이터.
///
/// 비어 있으면 해당 날짜에 거래가 없었다는 의미입니다 (전송 실패와 구분).
#[derive(Debug, Clone, Default)]
pub struct DaySnapshot {
    pub rows: Vec<BvcRow>,
}

impl DaySnapshot {
    pub fn new(rows: Vec<BvcRow>) -> Self {
        Self { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 수집 대상 종목별 레코드 추출.
    ///
    /// `(심볼, 시장)` 인덱스로 조회하며, 행이 없거나 종가가 없는 종목은 결과에서 빠집니다.
    pub fn extract(
        &self,
        securities: &[Security],
        target_date: NaiveDate,
        resolved_date: NaiveDate,
    ) -> HashMap<String, HistoricalRecord> {
        let index: HashMap<(&str, &str), &BvcRow> = self
            .rows
            .iter()
            .map(|row| ((row.mnemonic.as_str(), row.board.as_str()), row))
            .collect();

        securities
            .iter()
            .filter_map(|sec| {
                let row = index.get(&(sec.symbol.as_str(), sec.board.as_str()))?;
                let record = row.to_record(target_date, resolved_date)?;
                Some((sec.symbol.clone(), record))
            })
            .collect()
    }
}

impl BvcRow {
    /// 레코드로 변환. 종가가 없으면 `None`.
    pub fn to_record(
        &self,
        target_date: NaiveDate,
        resolved_date: NaiveDate,
    ) -> Option<HistoricalRecord> {
        let close = self.last_price?;
        Some(HistoricalRecord {
            resolved_date,
            target_date,
            open: self.open_price,
            high: self.maximum_price,
            low: self.minimum_price,
            close,
            volume: self.volume,
            average_price: self.average_price,
            absolute_variation: self.absolute_variation,
            percentage_variation: self.percentage_variation,
            symbol: self.mnemonic.clone(),
            board: self.board.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn row(symbol: &str, close: Option<Decimal>) -> BvcRow {
        BvcRow {
            mnemonic: symbol.into(),
            board: "EQTY".into(),
            last_price: close,
            volume: Some(dec!(500)),
            ..Default::default()
        }
    }

    #[test]
    fn test_extract_omits_absent_security() {
        let snapshot = DaySnapshot::new(vec![row("A", Some(dec!(10))), row("B", Some(dec!(20)))]);
        let securities = vec![
            Security::new("A", "EQTY"),
            Security::new("B", "EQTY"),
            Security::new("C", "EQTY"),
        ];

        let records = snapshot.extract(&securities, d(2024, 1, 2), d(2024, 1, 2));
        assert_eq!(records.len(), 2);
        assert_eq!(records["A"].close, dec!(10));
        assert_eq!(records["B"].close, dec!(20));
        assert!(!records.contains_key("C"));
    }

    #[test]
    fn test_extract_drops_null_close() {
        let snapshot = DaySnapshot::new(vec![row("A", None)]);
        let records = snapshot.extract(&[Security::new("A", "EQTY")], d(2024, 1, 2), d(2024, 1, 2));
        assert!(records.is_empty());
    }

    #[test]
    fn test_extract_matches_board() {
        let mut repo_row = row("A", Some(dec!(10)));
        repo_row.board = "REPO".into();
        let snapshot = DaySnapshot::new(vec![repo_row]);

        let records = snapshot.extract(&[Security::new("A", "EQTY")], d(2024, 1, 2), d(2024, 1, 2));
        assert!(records.is_empty());
    }

    #[test]
    fn test_row_deserialization() {
        let json = r#"{
            "mnemonic": "ECOPETROL", "board": "EQTY",
            "openPrice": 2400, "maximumPrice": 2450.5, "minimumPrice": 2390,
            "lastPrice": 2420, "volume": 1500000, "averagePrice": null,
            "tradeValue": 3630000000
        }"#;
        let row: BvcRow = serde_json::from_str(json).unwrap();
        assert_eq!(row.last_price, Some(dec!(2420)));
        assert_eq!(row.maximum_price, Some(dec!(2450.5)));
        assert_eq!(row.average_price, None);
        assert_eq!(row.absolute_variation, None);
    }
}
