//! Concurrent historical market data collector.
//!
//! 이 crate는 두 업스트림 소스에서 과거 일별 시세를 수집하는 바이너리를 제공합니다:
//! - 거래소 일별 전 종목 시세 (날짜 단위 병렬 수집, 휴장일 백필)
//! - 금융 데이터 제공자 티커별 일봉 (공유 세션, 인증 만료 시 단일 갱신)
//! - 수집 결과 저장 (JSON 파일, PostgreSQL) 및 조회

pub mod config;
pub mod error;
pub mod modules;
pub mod stats;

pub use config::CollectorConfig;
pub use error::{CollectorError, Result};
pub use stats::{CollectionStats, SymbolOutcome};
