//! 저장된 시세 조회.

use chrono::NaiveDate;
use nexvest_data::{DataError, DocumentStore};
use serde_json::Value;

use crate::Result;

/// 종목의 특정 날짜 레코드 조회.
///
/// 종목이나 날짜가 없으면 `DataError::NotFound`.
pub async fn find_record(
    store: &dyn DocumentStore,
    symbol: &str,
    date: NaiveDate,
) -> Result<Value> {
    match store.find_one(symbol, date).await? {
        Some(document) => Ok(document),
        None => {
            tracing::debug!(symbol = %symbol, date = %date, "레코드 없음");
            Err(DataError::NotFound(format!("{} {}", symbol.to_uppercase(), date)).into())
        }
    }
}
