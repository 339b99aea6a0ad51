//! 수집 결과 저장과 요약 파일.

use chrono::NaiveDate;
use nexvest_data::{upsert_records, DatedRecord, DocumentStore, JsonFileStore, UpsertSummary};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::Result;

/// 요약 파일 이름
pub const SUMMARY_FILE: &str = "download_summary.json";

/// 수집 기간
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// 수집 실행 요약 (`download_summary.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadSummary {
    pub download_date: NaiveDate,
    pub range: SummaryRange,
    pub duration_seconds: f64,
    pub dates_processed: usize,
    /// 거래소 종목별 레코드 수
    pub bvc_assets: BTreeMap<String, usize>,
    /// 티커별 레코드 수
    pub yahoo_assets: BTreeMap<String, usize>,
    pub storage: UpsertSummary,
}

/// 종목별 레코드를 저장소에 업서트.
///
/// 레코드가 없는 종목도 빈 컬렉션으로 저장됩니다.
pub async fn persist_records<R: DatedRecord + Sync>(
    store: &dyn DocumentStore,
    records: &BTreeMap<String, Vec<R>>,
) -> Result<UpsertSummary> {
    let mut total = UpsertSummary::default();
    for (symbol, series) in records {
        let summary = upsert_records(store, symbol, series).await?;
        if series.is_empty() {
            tracing::warn!(symbol = %symbol, "저장할 레코드 없음");
        } else {
            tracing::debug!(
                symbol = %symbol,
                records = series.len(),
                upserted = summary.upserted,
                modified = summary.modified,
                "저장 완료"
            );
        }
        total += summary;
    }
    Ok(total)
}

/// 요약 파일 기록. 기록한 파일 경로 반환.
pub async fn write_summary(dir: &Path, summary: &DownloadSummary) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(SUMMARY_FILE);
    tokio::fs::write(&path, serde_json::to_vec_pretty(summary)?).await?;
    Ok(path)
}

/// JSON 디렉터리의 모든 종목 파일을 다른 저장소로 복사.
pub async fn upload_json_dir(
    source: &JsonFileStore,
    target: &dyn DocumentStore,
) -> Result<UpsertSummary> {
    let collections = source.load_all().await?;
    tracing::info!(
        dir = %source.dir().display(),
        collections = collections.len(),
        "업로드 시작"
    );

    let mut total = UpsertSummary::default();
    for (symbol, documents) in collections {
        let count = documents.len();
        let summary = target.upsert(&symbol, documents).await?;
        tracing::info!(
            symbol = %symbol,
            documents = count,
            upserted = summary.upserted,
            modified = summary.modified,
            "업로드 완료"
        );
        total += summary;
    }
    Ok(total)
}
