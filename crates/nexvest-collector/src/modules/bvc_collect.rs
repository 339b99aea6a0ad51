//! 거래소 일별 시세 수집.
//!
//! 날짜마다 태스크 하나를 만들어 제한된 동시 실행 수로 수행합니다. 각 태스크는 자기 세션을
//! 만들어 백필 조회 후 전 종목 레코드를 추출하고, 결과는 단일 소비 루프에서 종목별로
//! 병합됩니다. 한 날짜의 실패는 다른 날짜에 영향을 주지 않으며 재시도하지 않습니다.

use chrono::NaiveDate;
use futures::StreamExt;
use nexvest_data::{DataError, HistoricalRecord, Security, SnapshotSource};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::backfill::{BackfillResolver, Resolution};
use super::pool::spawn_bounded;
use super::progress::{ProgressRenderer, ProgressSnapshot, ProgressTracker, TaskStatus};
use crate::{CollectionStats, Result};

/// 거래소 수집 옵션
#[derive(Debug, Clone)]
pub struct BvcCollectOptions {
    pub workers: usize,
    pub securities: Vec<Security>,
    pub resolver: BackfillResolver,
    /// 진행 막대 갱신 주기 (`None`이면 표시하지 않음)
    pub progress_interval: Option<Duration>,
}

/// 거래소 수집 결과
#[derive(Debug, Default)]
pub struct BvcCollection {
    /// 종목별 레코드 (결과 날짜 오름차순, 날짜 중복 없음). 데이터가 없는 종목은 빈 목록.
    pub records: BTreeMap<String, Vec<HistoricalRecord>>,
    pub stats: CollectionStats,
    pub progress: ProgressSnapshot,
}

enum DayOutcome {
    Records(HashMap<String, HistoricalRecord>),
    NoData,
}

/// 날짜 목록에 대한 전 종목 시세 수집.
pub async fn collect_bvc<S: SnapshotSource>(
    source: Arc<S>,
    days: Vec<NaiveDate>,
    options: &BvcCollectOptions,
) -> Result<BvcCollection> {
    let start = Instant::now();
    let mut stats = CollectionStats::new();
    stats.total = days.len();

    tracing::info!(
        dates = days.len(),
        securities = options.securities.len(),
        workers = options.workers,
        horizon = options.resolver.horizon(),
        "거래소 수집 시작"
    );

    let mut tracker = ProgressTracker::new(days.len());
    let renderer = options
        .progress_interval
        .map(|interval| ProgressRenderer::spawn("BVC", tracker.subscribe(), interval));

    let securities = Arc::new(options.securities.clone());
    let resolver = options.resolver;

    let results = spawn_bounded(days, options.workers, move |day| {
        let source = Arc::clone(&source);
        let securities = Arc::clone(&securities);
        async move { collect_day(source.as_ref(), &securities, resolver, day).await }
    });
    futures::pin_mut!(results);

    let mut accumulators: HashMap<String, Vec<HistoricalRecord>> = HashMap::new();

    while let Some((day, result)) = results.next().await {
        let status = match result {
            Ok(DayOutcome::Records(records)) => {
                let count = records.len();
                for (symbol, record) in records {
                    accumulators.entry(symbol).or_default().push(record);
                }
                stats.success += 1;
                stats.total_records += count;
                TaskStatus::Completed { records: count }
            }
            Ok(DayOutcome::NoData) => {
                stats.skipped += 1;
                TaskStatus::Skipped
            }
            Err(e) => {
                tracing::error!(date = %day, error = %e, "날짜 처리 실패");
                stats.errors += 1;
                TaskStatus::Failed
            }
        };
        tracker.record(status);
    }

    let progress = tracker.snapshot();
    if let Some(renderer) = renderer {
        renderer.finish(&progress).await;
    }

    let mut records = BTreeMap::new();
    for security in &options.securities {
        let mut series = accumulators.remove(&security.symbol).unwrap_or_default();
        finalize_series(&mut series);
        records.insert(security.symbol.clone(), series);
    }

    stats.elapsed = start.elapsed();
    Ok(BvcCollection {
        records,
        stats,
        progress,
    })
}

async fn collect_day<S: SnapshotSource>(
    source: &S,
    securities: &[Security],
    resolver: BackfillResolver,
    day: NaiveDate,
) -> Result<DayOutcome> {
    // 세션은 태스크 안에서 만들고 버림
    let session = source.session();

    match resolver.resolve(&session, day).await? {
        Resolution::Resolved {
            snapshot,
            resolved_date,
            failed_probes,
        } => {
            if resolved_date != day {
                tracing::debug!(date = %day, resolved = %resolved_date, failed_probes, "백필 적용");
            }
            Ok(DayOutcome::Records(snapshot.extract(securities, day, resolved_date)))
        }
        Resolution::NoData {
            probes,
            failed_probes,
        } => {
            tracing::debug!(date = %day, probes, failed_probes, "데이터 없음, 건너뜀");
            Ok(DayOutcome::NoData)
        }
        Resolution::Unreachable { probes, last_error } => Err(DataError::Transport(format!(
            "{}회 조회 모두 실패: {}",
            probes, last_error
        ))
        .into()),
    }
}

/// 결과 날짜 오름차순 정렬 후 날짜 중복 제거.
///
/// 같은 날짜로 귀결된 레코드가 여럿이면 요청 날짜가 결과 날짜에 가장 가까운 것을 남깁니다.
pub fn finalize_series(series: &mut Vec<HistoricalRecord>) {
    series.sort_by(|a, b| {
        a.resolved_date
            .cmp(&b.resolved_date)
            .then(b.target_date.cmp(&a.target_date))
    });
    series.dedup_by_key(|record| record.resolved_date);
}
