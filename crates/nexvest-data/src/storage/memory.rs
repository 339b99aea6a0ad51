//! 메모리 문서 저장소.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use super::{collection_name, merge_into, Document, DocumentStore, RangeQuery, UpsertSummary};
use crate::error::{DataError, Result};

/// 컬렉션 이름 -> (종목, 날짜별 문서)
type Collections = HashMap<String, (String, BTreeMap<NaiveDate, Value>)>;

/// 프로세스 메모리에만 저장하는 저장소.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 컬렉션 문서 수.
    pub async fn count(&self, symbol: &str) -> usize {
        self.collections
            .read()
            .await
            .get(&collection_name(symbol))
            .map_or(0, |(_, docs)| docs.len())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn upsert(&self, symbol: &str, documents: Vec<Document>) -> Result<UpsertSummary> {
        let mut collections = self.collections.write().await;
        let (_, collection) = collections
            .entry(collection_name(symbol))
            .or_insert_with(|| (symbol.to_uppercase(), BTreeMap::new()));
        Ok(merge_into(collection, documents))
    }

    async fn find(&self, symbol: &str, query: &RangeQuery) -> Result<Vec<Value>> {
        let collections = self.collections.read().await;
        let (_, collection) = collections
            .get(&collection_name(symbol))
            .ok_or_else(|| DataError::NotFound(symbol.to_uppercase()))?;
        Ok(query.apply(collection))
    }

    async fn find_one(&self, symbol: &str, date: NaiveDate) -> Result<Option<Value>> {
        let collections = self.collections.read().await;
        let (_, collection) = collections
            .get(&collection_name(symbol))
            .ok_or_else(|| DataError::NotFound(symbol.to_uppercase()))?;
        Ok(collection.get(&date).cloned())
    }

    async fn list_symbols(&self) -> Result<Vec<String>> {
        let collections = self.collections.read().await;
        let mut symbols: Vec<String> = collections.values().map(|(s, _)| s.clone()).collect();
        symbols.sort();
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HistoricalRecord;
    use crate::storage::upsert_records;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn record(resolved: NaiveDate, close: Decimal) -> HistoricalRecord {
        HistoricalRecord {
            resolved_date: resolved,
            target_date: resolved,
            open: None,
            high: None,
            low: None,
            close,
            volume: None,
            average_price: None,
            absolute_variation: None,
            percentage_variation: None,
            symbol: "GEB".into(),
            board: "EQTY".into(),
        }
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_and_last_write_wins() {
        let store = MemoryStore::new();

        let first = upsert_records(&store, "GEB", &[record(d(2024, 1, 2), dec!(100))])
            .await
            .unwrap();
        assert_eq!(first, UpsertSummary { upserted: 1, modified: 0 });

        let same = upsert_records(&store, "GEB", &[record(d(2024, 1, 2), dec!(100))])
            .await
            .unwrap();
        assert_eq!(same, UpsertSummary::default());

        let changed = upsert_records(&store, "GEB", &[record(d(2024, 1, 2), dec!(105))])
            .await
            .unwrap();
        assert_eq!(changed, UpsertSummary { upserted: 0, modified: 1 });

        assert_eq!(store.count("GEB").await, 1);
        let doc = store.find_one("geb", d(2024, 1, 2)).await.unwrap().unwrap();
        assert_eq!(doc["close"], 105.0);
    }

    #[tokio::test]
    async fn test_empty_upsert_creates_collection() {
        let store = MemoryStore::new();
        upsert_records::<HistoricalRecord>(&store, "CLH", &[]).await.unwrap();

        assert_eq!(store.list_symbols().await.unwrap(), vec!["CLH".to_string()]);
        assert!(store.find("CLH", &RangeQuery::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_range_and_not_found() {
        let store = MemoryStore::new();
        let records: Vec<_> = (2..=6).map(|day| record(d(2024, 1, day), dec!(1))).collect();
        upsert_records(&store, "GEB", &records).await.unwrap();

        let query = RangeQuery {
            from: Some(d(2024, 1, 3)),
            to: Some(d(2024, 1, 5)),
            limit: None,
        };
        let docs = store.find("GEB", &query).await.unwrap();
        let dates: Vec<&str> = docs.iter().map(|d| d["date"].as_str().unwrap()).collect();
        assert_eq!(dates, vec!["2024-01-03", "2024-01-04", "2024-01-05"]);

        let empty = RangeQuery {
            from: Some(d(2025, 1, 1)),
            ..Default::default()
        };
        assert!(store.find("GEB", &empty).await.unwrap().is_empty());

        assert!(matches!(
            store.find("NOPE", &RangeQuery::default()).await,
            Err(DataError::NotFound(_))
        ));
    }
}
