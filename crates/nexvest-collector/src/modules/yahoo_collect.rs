//! 티커별 전체 기간 일봉 수집.
//!
//! 세션 하나를 모든 티커가 공유하므로 동시 실행 수를 낮게 유지합니다.
//! 실패한 티커는 에러로 기록되고 빈 결과로 저장됩니다.

use futures::StreamExt;
use nexvest_data::{DateRange, TickerFetcher, TickerRecord, TickerSource};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use super::pool::spawn_bounded;
use crate::stats::SymbolOutcome;
use crate::{CollectionStats, Result};

/// 티커 수집 결과
#[derive(Debug, Default)]
pub struct YahooCollection {
    /// 티커별 레코드 (날짜 오름차순). 실패한 티커는 빈 목록.
    pub records: BTreeMap<String, Vec<TickerRecord>>,
    pub outcomes: BTreeMap<String, SymbolOutcome>,
    pub stats: CollectionStats,
    /// 수행된 세션 핸드셰이크 횟수
    pub handshakes: u64,
}

/// 티커 목록 수집.
pub async fn collect_yahoo<T: TickerSource>(
    fetcher: Arc<TickerFetcher<T>>,
    tickers: Vec<String>,
    range: DateRange,
    workers: usize,
) -> Result<YahooCollection> {
    let start = Instant::now();
    let mut collection = YahooCollection::default();
    collection.stats.total = tickers.len();

    tracing::info!(
        tickers = tickers.len(),
        workers,
        start = %range.start,
        end = %range.end,
        "티커 수집 시작"
    );

    let results = spawn_bounded(tickers, workers, {
        let fetcher = Arc::clone(&fetcher);
        move |ticker: String| {
            let fetcher = Arc::clone(&fetcher);
            async move { Ok(fetcher.fetch(&ticker, range).await?) }
        }
    });
    futures::pin_mut!(results);

    while let Some((ticker, result)) = results.next().await {
        let outcome = match result {
            Ok(mut records) => {
                records.sort_by_key(|r| r.date);
                records.dedup_by_key(|r| r.date);

                tracing::info!(ticker = %ticker, records = records.len(), "티커 수집 완료");
                if records.is_empty() {
                    collection.stats.skipped += 1;
                } else {
                    collection.stats.success += 1;
                }
                collection.stats.total_records += records.len();

                let outcome = SymbolOutcome {
                    records: records.len(),
                    error: None,
                };
                collection.records.insert(ticker.clone(), records);
                outcome
            }
            Err(e) => {
                tracing::error!(ticker = %ticker, error = %e, "티커 수집 실패");
                collection.stats.errors += 1;
                collection.records.insert(ticker.clone(), Vec::new());
                SymbolOutcome {
                    records: 0,
                    error: Some(e.to_string()),
                }
            }
        };
        collection.outcomes.insert(ticker, outcome);
    }

    collection.handshakes = fetcher.shared_session().handshake_count();
    collection.stats.elapsed = start.elapsed();
    Ok(collection)
}
