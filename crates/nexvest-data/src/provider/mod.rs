//! 데이터 Provider 모듈.
//!
//! ## 거래소 (BVC)
//! - `BvcClient`: 토큰 핸드셰이크 + 서명 헤더 방식의 일별 전 종목 시세
//! - `DaySnapshot`: 하루치 응답, 종목별 레코드 추출
//!
//! ## 금융 데이터 제공자 (Yahoo Finance)
//! - `YahooClient`: 쿠키/crumb 세션, 티커별 전체 기간 일봉 (JSON, CSV 폴백)
//! - `TickerFetcher`: 공유 세션과 단일 갱신 정책

pub mod bvc;
pub mod yahoo;

pub use bvc::{BvcClient, BvcEndpoints, BvcRow, BvcSession, DayFetcher, DaySnapshot, SnapshotSource};
pub use yahoo::{
    SessionHandshake, SessionLease, SharedSession, TickerFetcher, TickerSource, YahooClient,
    YahooEndpoints, YahooSession, YahooSettings,
};
