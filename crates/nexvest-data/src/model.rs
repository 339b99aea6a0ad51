//! 수집 대상 종목과 정규화된 레코드 타입.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DataError;

/// 거래소 종목 식별자 (심볼 + 시장 구분).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Security {
    /// 종목 심볼 (예: ECOPETROL)
    pub symbol: String,
    /// 시장 구분 (예: EQTY)
    pub board: String,
}

impl Security {
    pub fn new(symbol: impl Into<String>, board: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            board: board.into(),
        }
    }
}

impl fmt::Display for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.symbol, self.board)
    }
}

impl FromStr for Security {
    type Err = DataError;

    /// `SYMBOL:BOARD` 형식 파싱. 시장 구분이 없으면 `EQTY`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (symbol, board) = match s.split_once(':') {
            Some((symbol, board)) => (symbol.trim(), board.trim()),
            None => (s, DEFAULT_BOARD),
        };
        if symbol.is_empty() || board.is_empty() {
            return Err(DataError::ConfigError(format!("invalid security '{}'", s)));
        }
        Ok(Security::new(symbol.to_uppercase(), board.to_uppercase()))
    }
}

/// 기본 시장 구분.
pub const DEFAULT_BOARD: &str = "EQTY";

/// 기본 거래소 수집 종목.
pub fn default_securities() -> Vec<Security> {
    [
        "ECOPETROL",
        "ISA",
        "GEB",
        "PFBCOLOM",
        "NUTRESA",
        "GRUPOSURA",
        "CELSIA",
        // 거래소 API에는 악센트 없이 등록되어 있음
        "EXITO",
        "CEMARGOS",
        "CNEC",
        "CORFICOLCF",
        "PROMIGAS",
        "MINEROS",
        "CLH",
        "PFDAVVNDA",
    ]
    .into_iter()
    .map(|symbol| Security::new(symbol, DEFAULT_BOARD))
    .collect()
}

/// 기본 금융 데이터 제공자 티커.
pub fn default_tickers() -> Vec<String> {
    ["VOO", "CSPX.L", "SPY", "QQQ", "IVV", "GLD"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// 정규화된 일별 거래소 레코드.
///
/// `target_date`는 요청한 날짜, `resolved_date`는 실제 데이터를 제공한 날짜입니다.
/// 휴장일 백필 시 두 값이 달라집니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalRecord {
    #[serde(rename = "date")]
    pub resolved_date: NaiveDate,
    pub target_date: NaiveDate,
    pub open: Option<Decimal>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub close: Decimal,
    pub volume: Option<Decimal>,
    pub average_price: Option<Decimal>,
    pub absolute_variation: Option<Decimal>,
    pub percentage_variation: Option<Decimal>,
    #[serde(rename = "mnemonic")]
    pub symbol: String,
    #[serde(rename = "board")]
    pub board: String,
}

/// 금융 데이터 제공자의 일별 OHLCV 레코드.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerRecord {
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub adj_close: Decimal,
    pub volume: i64,
    pub ticker: String,
}

/// 날짜 키로 저장되는 레코드.
pub trait DatedRecord: Serialize {
    /// 저장 키가 되는 날짜.
    fn record_date(&self) -> NaiveDate;
}

impl DatedRecord for HistoricalRecord {
    fn record_date(&self) -> NaiveDate {
        self.resolved_date
    }
}

impl DatedRecord for TickerRecord {
    fn record_date(&self) -> NaiveDate {
        self.date
    }
}

/// 수집 기간 (양 끝 포함).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// `end`로부터 `years_back`년(365일 단위) 이전까지.
    pub fn years_back(end: NaiveDate, years_back: u32) -> Self {
        Self {
            start: end - Duration::days(i64::from(years_back) * 365),
            end,
        }
    }

    /// 기간 내 평일 목록.
    pub fn weekdays(&self) -> Vec<NaiveDate> {
        self.start
            .iter_days()
            .take_while(|d| *d <= self.end)
            .filter(|d| is_weekday(*d))
            .collect()
    }
}

/// 토/일요일이 아닌지 확인.
pub fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// 주말이면 다음 월요일로 이동.
pub fn roll_past_weekend(mut date: NaiveDate) -> NaiveDate {
    while !is_weekday(date) {
        date += Duration::days(1);
    }
    date
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_security_parsing() {
        let sec: Security = "ecopetrol:eqty".parse().unwrap();
        assert_eq!(sec, Security::new("ECOPETROL", "EQTY"));

        let sec: Security = "GEB".parse().unwrap();
        assert_eq!(sec.board, "EQTY");

        assert!(":EQTY".parse::<Security>().is_err());
    }

    #[test]
    fn test_weekdays_skip_weekends() {
        // 2024-01-05 금 ~ 2024-01-08 월
        let range = DateRange {
            start: d(2024, 1, 5),
            end: d(2024, 1, 8),
        };
        assert_eq!(range.weekdays(), vec![d(2024, 1, 5), d(2024, 1, 8)]);
    }

    #[test]
    fn test_roll_past_weekend() {
        assert_eq!(roll_past_weekend(d(2024, 1, 6)), d(2024, 1, 8));
        assert_eq!(roll_past_weekend(d(2024, 1, 7)), d(2024, 1, 8));
        assert_eq!(roll_past_weekend(d(2024, 1, 9)), d(2024, 1, 9));
    }

    #[test]
    fn test_years_back_range() {
        let range = DateRange::years_back(d(2024, 12, 31), 1);
        assert_eq!(range.start, d(2024, 1, 1));
    }

    #[test]
    fn test_historical_record_serialization_keys() {
        let record = HistoricalRecord {
            resolved_date: d(2024, 1, 2),
            target_date: d(2024, 1, 1),
            open: None,
            high: None,
            low: None,
            close: dec!(100),
            volume: Some(dec!(500)),
            average_price: None,
            absolute_variation: None,
            percentage_variation: None,
            symbol: "X".into(),
            board: "EQTY".into(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["date"], "2024-01-02");
        assert_eq!(json["targetDate"], "2024-01-01");
        assert_eq!(json["mnemonic"], "X");
        assert_eq!(json["close"], 100.0);
        assert_eq!(record.record_date(), d(2024, 1, 2));
    }
}
