//! 종목별 JSON 파일 저장소.
//!
//! `<디렉터리>/<SYMBOL>_historico.json` 파일 하나에 날짜 오름차순 배열로 저장합니다.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{merge_into, Document, DocumentStore, RangeQuery, UpsertSummary};
use crate::error::{DataError, Result};

const FILE_SUFFIX: &str = "_historico.json";

/// JSON 파일 저장소.
pub struct JsonFileStore {
    dir: PathBuf,
    /// 같은 파일에 대한 읽기-병합-쓰기 직렬화
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{}{}", symbol.to_uppercase(), FILE_SUFFIX))
    }

    /// 파일의 문서 로드. `date`가 없는 항목은 버립니다.
    pub async fn load_file(path: &Path) -> Result<BTreeMap<NaiveDate, Value>> {
        let raw = tokio::fs::read_to_string(path).await?;
        let values: Vec<Value> = serde_json::from_str(&raw)?;
        let total = values.len();

        let collection: BTreeMap<NaiveDate, Value> = values
            .into_iter()
            .filter_map(Document::from_value)
            .map(|doc| (doc.date, doc.body))
            .collect();

        let dropped = total - collection.len();
        if dropped > 0 {
            warn!(file = %path.display(), dropped, "불완전한 레코드 제외");
        }
        Ok(collection)
    }

    async fn load_symbol(&self, symbol: &str) -> Result<Option<BTreeMap<NaiveDate, Value>>> {
        let path = self.path_for(symbol);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        Self::load_file(&path).await.map(Some)
    }

    /// 디렉터리의 모든 종목 문서 로드 (업로드용).
    pub async fn load_all(&self) -> Result<Vec<(String, Vec<Document>)>> {
        let mut all = Vec::new();
        for symbol in self.list_symbols().await? {
            let collection = self.load_symbol(&symbol).await?.unwrap_or_default();
            let documents = collection
                .into_iter()
                .map(|(date, body)| Document { date, body })
                .collect();
            all.push((symbol, documents));
        }
        Ok(all)
    }
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    async fn upsert(&self, symbol: &str, documents: Vec<Document>) -> Result<UpsertSummary> {
        let _guard = self.write_lock.lock().await;
        tokio::fs::create_dir_all(&self.dir).await?;

        let mut collection = self.load_symbol(symbol).await?.unwrap_or_default();
        let summary = merge_into(&mut collection, documents);

        let values: Vec<&Value> = collection.values().collect();
        let path = self.path_for(symbol);
        tokio::fs::write(&path, serde_json::to_vec_pretty(&values)?).await?;

        debug!(
            file = %path.display(),
            documents = values.len(),
            upserted = summary.upserted,
            modified = summary.modified,
            "JSON 파일 저장"
        );
        Ok(summary)
    }

    async fn find(&self, symbol: &str, query: &RangeQuery) -> Result<Vec<Value>> {
        let collection = self
            .load_symbol(symbol)
            .await?
            .ok_or_else(|| DataError::NotFound(symbol.to_uppercase()))?;
        Ok(query.apply(&collection))
    }

    async fn find_one(&self, symbol: &str, date: NaiveDate) -> Result<Option<Value>> {
        let mut collection = self
            .load_symbol(symbol)
            .await?
            .ok_or_else(|| DataError::NotFound(symbol.to_uppercase()))?;
        Ok(collection.remove(&date))
    }

    async fn list_symbols(&self) -> Result<Vec<String>> {
        if !tokio::fs::try_exists(&self.dir).await? {
            return Ok(Vec::new());
        }

        let mut symbols = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if let Some(symbol) = name.to_str().and_then(|n| n.strip_suffix(FILE_SUFFIX)) {
                symbols.push(symbol.to_uppercase());
            }
        }
        symbols.sort();
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn doc(date: &str, close: f64) -> Document {
        Document::from_value(json!({"date": date, "close": close})).unwrap()
    }

    #[tokio::test]
    async fn test_upsert_writes_sorted_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        store
            .upsert("isa", vec![doc("2024-01-03", 2.0), doc("2024-01-02", 1.0)])
            .await
            .unwrap();
        let summary = store
            .upsert("ISA", vec![doc("2024-01-02", 1.5), doc("2024-01-04", 3.0)])
            .await
            .unwrap();
        assert_eq!(summary, UpsertSummary { upserted: 1, modified: 1 });

        let raw = std::fs::read_to_string(dir.path().join("ISA_historico.json")).unwrap();
        let values: Vec<Value> = serde_json::from_str(&raw).unwrap();
        let dates: Vec<&str> = values.iter().map(|v| v["date"].as_str().unwrap()).collect();
        assert_eq!(dates, vec!["2024-01-02", "2024-01-03", "2024-01-04"]);
        assert_eq!(values[0]["close"], 1.5);

        assert_eq!(store.list_symbols().await.unwrap(), vec!["ISA".to_string()]);
        let one = store.find_one("ISA", d(2024, 1, 3)).await.unwrap().unwrap();
        assert_eq!(one["close"], 2.0);
    }

    #[tokio::test]
    async fn test_load_drops_entries_without_date() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("GEB_historico.json"),
            r#"[{"date":"2024-01-02","close":1},{"close":2},"junk"]"#,
        )
        .unwrap();

        let store = JsonFileStore::new(dir.path());
        let all = store.load_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].0, "GEB");
        assert_eq!(all[0].1.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_symbol_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("missing"));
        assert!(store.list_symbols().await.unwrap().is_empty());
        assert!(matches!(
            store.find("GEB", &RangeQuery::default()).await,
            Err(DataError::NotFound(_))
        ));
    }
}
