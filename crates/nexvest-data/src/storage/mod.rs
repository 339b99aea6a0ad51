//! 문서 저장소.
//!
//! 종목마다 하나의 컬렉션(`historico_<심볼 소문자>`)에 날짜를 키로 문서를 저장합니다.
//! 같은 날짜로 다시 쓰면 새 필드 값이 기존 값을 덮어쓰고 나머지 필드는 유지됩니다.
//!
//! - `JsonFileStore`: 종목별 JSON 배열 파일
//! - `PgDocumentStore`: PostgreSQL JSONB
//! - `MemoryStore`: 드라이런/테스트용

pub mod json_file;
pub mod memory;
pub mod postgres;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
pub use postgres::PgDocumentStore;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::model::DatedRecord;

/// 날짜 범위 없이 조회할 때의 기본 최대 건수.
pub const DEFAULT_QUERY_LIMIT: usize = 100;

/// 날짜 키 문서.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub date: NaiveDate,
    pub body: Value,
}

impl Document {
    pub fn from_record<R: DatedRecord>(record: &R) -> Result<Self> {
        Ok(Self {
            date: record.record_date(),
            body: serde_json::to_value(record)?,
        })
    }

    /// `date` 필드가 있는 JSON 객체만 문서로 인정.
    pub fn from_value(body: Value) -> Option<Self> {
        let date = body
            .get("date")
            .and_then(Value::as_str)
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())?;
        Some(Self { date, body })
    }
}

/// 업서트 결과.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertSummary {
    /// 새로 삽입된 문서 수
    pub upserted: u64,
    /// 값이 바뀐 기존 문서 수
    pub modified: u64,
}

impl std::ops::AddAssign for UpsertSummary {
    fn add_assign(&mut self, rhs: Self) {
        self.upserted += rhs.upserted;
        self.modified += rhs.modified;
    }
}

/// 기간 조회 조건.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub limit: Option<usize>,
}

impl RangeQuery {
    /// 명시적 limit 우선. 기간 조건이 없으면 기본 100건, 있으면 제한 없음.
    pub fn effective_limit(&self) -> Option<usize> {
        match self.limit {
            Some(limit) => Some(limit),
            None if self.from.is_none() && self.to.is_none() => Some(DEFAULT_QUERY_LIMIT),
            None => None,
        }
    }

    fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }

    /// 날짜 오름차순 컬렉션에 조건 적용.
    pub fn apply(&self, collection: &BTreeMap<NaiveDate, Value>) -> Vec<Value> {
        let matching = collection
            .iter()
            .filter(|(date, _)| self.contains(**date))
            .map(|(_, doc)| doc.clone());
        match self.effective_limit() {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        }
    }
}

/// 종목별 문서 저장소.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// 날짜 키로 업서트. 문서가 없어도 컬렉션은 생성됩니다.
    async fn upsert(&self, symbol: &str, documents: Vec<Document>) -> Result<UpsertSummary>;

    /// 기간 조회 (날짜 오름차순). 컬렉션이 없으면 `NotFound`.
    async fn find(&self, symbol: &str, query: &RangeQuery) -> Result<Vec<Value>>;

    /// 특정 날짜 문서 조회. 컬렉션이 없으면 `NotFound`.
    async fn find_one(&self, symbol: &str, date: NaiveDate) -> Result<Option<Value>>;

    /// 저장된 종목 목록 (대문자, 정렬).
    async fn list_symbols(&self) -> Result<Vec<String>>;
}

/// 레코드를 문서로 변환해 업서트.
pub async fn upsert_records<R: DatedRecord + Sync>(
    store: &dyn DocumentStore,
    symbol: &str,
    records: &[R],
) -> Result<UpsertSummary> {
    let documents = records
        .iter()
        .map(Document::from_record)
        .collect::<Result<Vec<_>>>()?;
    store.upsert(symbol, documents).await
}

/// 종목 컬렉션 이름.
pub fn collection_name(symbol: &str) -> String {
    format!("historico_{}", symbol.to_lowercase())
}

/// 필드 단위 병합. 값이 바뀌었으면 `true`.
pub fn merge_fields(existing: &mut Value, incoming: Value) -> bool {
    match (existing, incoming) {
        (Value::Object(current), Value::Object(fields)) => {
            let mut changed = false;
            for (key, value) in fields {
                if current.get(&key) != Some(&value) {
                    current.insert(key, value);
                    changed = true;
                }
            }
            changed
        }
        (current, incoming) => {
            if *current != incoming {
                *current = incoming;
                true
            } else {
                false
            }
        }
    }
}

/// 메모리 컬렉션에 문서 병합.
pub(crate) fn merge_into(
    collection: &mut BTreeMap<NaiveDate, Value>,
    documents: Vec<Document>,
) -> UpsertSummary {
    let mut summary = UpsertSummary::default();
    for doc in documents {
        match collection.get_mut(&doc.date) {
            Some(existing) => {
                if merge_fields(existing, doc.body) {
                    summary.modified += 1;
                }
            }
            None => {
                collection.insert(doc.date, doc.body);
                summary.upserted += 1;
            }
        }
    }
    summary
}
