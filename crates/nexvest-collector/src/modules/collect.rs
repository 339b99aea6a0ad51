//! 전체 수집 워크플로우.
//!
//! 1. 거래소 일별 시세 수집 (날짜 단위 병렬, 종목별 병합/정렬)
//! 2. 티커별 일봉 수집 (공유 세션, 낮은 동시 실행 수)
//! 3. 저장소 업서트와 요약 파일 기록
//!
//! 각 단계는 이전 단계의 병합이 끝난 뒤 시작합니다.

use chrono::Utc;
use nexvest_data::{
    BvcClient, DateRange, DocumentStore, JsonFileStore, MemoryStore, PgDocumentStore,
    TickerFetcher, UpsertSummary, YahooClient,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use super::backfill::BackfillResolver;
use super::bvc_collect::{collect_bvc, BvcCollectOptions, BvcCollection};
use super::persist::{persist_records, write_summary, DownloadSummary, SummaryRange};
use super::yahoo_collect::{collect_yahoo, YahooCollection};
use crate::stats::{log_symbol_outcomes, SymbolOutcome};
use crate::{CollectorConfig, Result};

/// 수집 대상 소스
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SourceSelection {
    All,
    Bvc,
    Yahoo,
}

impl SourceSelection {
    fn includes_bvc(self) -> bool {
        matches!(self, Self::All | Self::Bvc)
    }

    fn includes_yahoo(self) -> bool {
        matches!(self, Self::All | Self::Yahoo)
    }
}

/// 저장소 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StoreKind {
    /// 종목별 JSON 파일 (`OUTPUT_DIR`)
    Json,
    /// PostgreSQL (`DATABASE_URL`)
    Postgres,
    /// 메모리 (드라이런)
    Memory,
}

/// 설정에 맞는 저장소 생성.
pub async fn open_store(kind: StoreKind, config: &CollectorConfig) -> Result<Arc<dyn DocumentStore>> {
    match kind {
        StoreKind::Json => Ok(Arc::new(JsonFileStore::new(&config.output_dir))),
        StoreKind::Postgres => {
            let store = PgDocumentStore::connect(config.require_database_url()?, 10).await?;
            store.ensure_schema().await?;
            Ok(Arc::new(store))
        }
        StoreKind::Memory => Ok(Arc::new(MemoryStore::new())),
    }
}

/// 실행별 수집 옵션 (CLI 인자로 설정 덮어쓰기)
#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub source: SourceSelection,
    pub years_back: u32,
    pub bvc_workers: usize,
    pub yahoo_workers: usize,
    pub show_progress: bool,
}

impl CollectOptions {
    pub fn from_config(config: &CollectorConfig) -> Self {
        Self {
            source: SourceSelection::All,
            years_back: config.years_back,
            bvc_workers: config.bvc.workers,
            yahoo_workers: config.yahoo.workers,
            show_progress: true,
        }
    }
}

/// 설정된 소스에서 수집 후 저장.
pub async fn run_collect(
    config: &CollectorConfig,
    options: &CollectOptions,
    store: &dyn DocumentStore,
) -> Result<DownloadSummary> {
    let start = Instant::now();
    let today = Utc::now().date_naive();
    let range = DateRange::years_back(today, options.years_back);
    let days = range.weekdays();

    tracing::info!(
        start = %range.start,
        end = %range.end,
        dates = days.len(),
        source = ?options.source,
        "수집 범위 설정 완료"
    );

    // 1. 거래소
    let bvc = if options.source.includes_bvc() {
        tracing::info!("Step 1/2: 거래소 일별 시세 수집");
        let client = BvcClient::new(config.bvc.endpoints(), config.bvc.timeout())?;
        let bvc_options = BvcCollectOptions {
            workers: options.bvc_workers,
            securities: config.bvc.securities.clone(),
            resolver: BackfillResolver::new(
                config.bvc.backfill_horizon,
                config.bvc.probe_backoff(),
            ),
            progress_interval: options.show_progress.then(|| config.progress_interval()),
        };
        let collection = collect_bvc(Arc::new(client), days.clone(), &bvc_options).await?;
        collection.stats.log_summary("거래소 수집");
        collection
    } else {
        BvcCollection::default()
    };

    // 2. 티커
    let yahoo = if options.source.includes_yahoo() {
        tracing::info!("Step 2/2: 티커 일봉 수집");
        let fetcher = Arc::new(TickerFetcher::new(YahooClient::new(config.yahoo.settings())));
        let collection = collect_yahoo(
            fetcher,
            config.yahoo.tickers.clone(),
            range,
            options.yahoo_workers,
        )
        .await?;
        collection.stats.log_summary("티커 수집");
        tracing::info!(handshakes = collection.handshakes, "세션 핸드셰이크 횟수");
        collection
    } else {
        YahooCollection::default()
    };

    // 3. 저장
    let mut storage = UpsertSummary::default();
    storage += persist_records(store, &bvc.records).await?;
    storage += persist_records(store, &yahoo.records).await?;
    tracing::info!(
        upserted = storage.upserted,
        modified = storage.modified,
        "저장 완료"
    );

    let bvc_outcomes: BTreeMap<String, SymbolOutcome> = bvc
        .records
        .iter()
        .map(|(symbol, series)| {
            (
                symbol.clone(),
                SymbolOutcome {
                    records: series.len(),
                    error: None,
                },
            )
        })
        .collect();
    log_symbol_outcomes("bvc", &bvc_outcomes);
    log_symbol_outcomes("yahoo", &yahoo.outcomes);

    let summary = DownloadSummary {
        download_date: today,
        range: SummaryRange {
            start: range.start,
            end: range.end,
        },
        duration_seconds: (start.elapsed().as_secs_f64() * 100.0).round() / 100.0,
        dates_processed: if options.source.includes_bvc() {
            days.len()
        } else {
            0
        },
        bvc_assets: bvc_outcomes
            .iter()
            .map(|(symbol, outcome)| (symbol.clone(), outcome.records))
            .collect(),
        yahoo_assets: yahoo
            .records
            .iter()
            .map(|(ticker, series)| (ticker.clone(), series.len()))
            .collect(),
        storage,
    };

    let path = write_summary(&config.output_dir, &summary).await?;
    tracing::info!(path = %path.display(), "요약 파일 저장");

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_selection() {
        assert!(SourceSelection::All.includes_bvc());
        assert!(SourceSelection::All.includes_yahoo());
        assert!(!SourceSelection::Bvc.includes_yahoo());
        assert!(!SourceSelection::Yahoo.includes_bvc());
    }

    #[tokio::test]
    async fn test_open_postgres_without_url_is_config_error() {
        let config = CollectorConfig::default();
        assert!(matches!(
            open_store(StoreKind::Postgres, &config).await,
            Err(crate::CollectorError::Config(_))
        ));
    }
}
