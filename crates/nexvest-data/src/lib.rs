//! 과거 시세 데이터 조회 및 저장.
//!
//! 이 crate는 다음을 제공합니다:
//! - 거래소(BVC) 일별 전 종목 시세 클라이언트
//! - 금융 데이터 제공자(Yahoo Finance) 티커별 일봉 클라이언트와 공유 세션
//! - 날짜 키 문서 저장소 (JSON 파일, PostgreSQL, 메모리)

pub mod error;
pub mod model;
pub mod provider;
pub mod storage;

pub use error::{DataError, Result};

pub use model::{
    default_securities, default_tickers, is_weekday, roll_past_weekend, DateRange, DatedRecord,
    HistoricalRecord, Security, TickerRecord, DEFAULT_BOARD,
};

pub use provider::{
    BvcClient, BvcEndpoints, BvcRow, BvcSession, DayFetcher, DaySnapshot, SessionHandshake,
    SessionLease, SharedSession, SnapshotSource, TickerFetcher, TickerSource, YahooClient,
    YahooEndpoints, YahooSession, YahooSettings,
};

pub use storage::{
    collection_name, upsert_records, Document, DocumentStore, JsonFileStore, MemoryStore,
    PgDocumentStore, RangeQuery, UpsertSummary, DEFAULT_QUERY_LIMIT,
};
