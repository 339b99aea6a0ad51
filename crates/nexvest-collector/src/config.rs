//! 환경변수 기반 설정 모듈.

use crate::error::CollectorError;
use crate::Result;
use nexvest_data::{
    default_securities, default_tickers, BvcEndpoints, Security, YahooEndpoints, YahooSettings,
};
use std::path::PathBuf;
use std::time::Duration;

/// Collector 전체 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 수집 기간 (년, 365일 단위)
    pub years_back: u32,
    /// JSON 출력 디렉터리
    pub output_dir: PathBuf,
    /// 데이터베이스 URL (PostgreSQL 저장소 사용 시 필수)
    pub database_url: Option<String>,
    /// 거래소 수집 설정
    pub bvc: BvcCollectConfig,
    /// 티커 수집 설정
    pub yahoo: YahooCollectConfig,
    /// 진행률 갱신 주기 (밀리초)
    pub progress_interval_ms: u64,
}

/// 거래소 수집 설정
#[derive(Debug, Clone)]
pub struct BvcCollectConfig {
    /// 동시 실행 태스크 수
    pub workers: usize,
    /// 휴장일 백필 최대 일수
    pub backfill_horizon: u32,
    /// 후보 날짜 조회 실패 시 대기 (밀리초)
    pub probe_backoff_ms: u64,
    /// 호출당 타임아웃 (초)
    pub timeout_secs: u64,
    /// 수집 대상 종목
    pub securities: Vec<Security>,
    pub handshake_url: Option<String>,
    pub data_url: Option<String>,
}

/// 티커 수집 설정
#[derive(Debug, Clone)]
pub struct YahooCollectConfig {
    /// 동시 실행 태스크 수 (rate limit 회피를 위해 낮게 유지)
    pub workers: usize,
    /// 수집 대상 티커
    pub tickers: Vec<String>,
    /// 호출당 타임아웃 (초)
    pub timeout_secs: u64,
    /// 쿠키 설정 후 대기 (밀리초)
    pub cookie_settle_ms: u64,
    /// crumb 엔드포인트별 시도 횟수
    pub crumb_attempts: u32,
    pub chart_url: Option<String>,
    pub download_url: Option<String>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            years_back: 5,
            output_dir: PathBuf::from("historicos"),
            database_url: None,
            bvc: BvcCollectConfig::default(),
            yahoo: YahooCollectConfig::default(),
            progress_interval_ms: 250,
        }
    }
}

impl Default for BvcCollectConfig {
    fn default() -> Self {
        Self {
            workers: 25,
            backfill_horizon: 7,
            probe_backoff_ms: 300,
            timeout_secs: 15,
            securities: default_securities(),
            handshake_url: None,
            data_url: None,
        }
    }
}

impl Default for YahooCollectConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            tickers: default_tickers(),
            timeout_secs: 30,
            cookie_settle_ms: 1000,
            crumb_attempts: 3,
            chart_url: None,
            download_url: None,
        }
    }
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let bvc = defaults.bvc;
        let yahoo = defaults.yahoo;

        let securities = match std::env::var("BVC_ASSETS") {
            Ok(raw) => parse_securities(&raw)?,
            Err(_) => bvc.securities,
        };
        let tickers = match std::env::var("YAHOO_TICKERS") {
            Ok(raw) => parse_tickers(&raw)?,
            Err(_) => yahoo.tickers,
        };

        Ok(Self {
            years_back: env_var_parse("YEARS_BACK", defaults.years_back),
            output_dir: std::env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            database_url: std::env::var("DATABASE_URL").ok(),
            bvc: BvcCollectConfig {
                workers: env_var_parse("BVC_WORKERS", bvc.workers),
                backfill_horizon: env_var_parse("BVC_BACKFILL_HORIZON", bvc.backfill_horizon),
                probe_backoff_ms: env_var_parse("BVC_PROBE_BACKOFF_MS", bvc.probe_backoff_ms),
                timeout_secs: env_var_parse("BVC_TIMEOUT_SECS", bvc.timeout_secs),
                securities,
                handshake_url: std::env::var("BVC_HANDSHAKE_URL").ok(),
                data_url: std::env::var("BVC_DATA_URL").ok(),
            },
            yahoo: YahooCollectConfig {
                workers: env_var_parse("YAHOO_WORKERS", yahoo.workers),
                tickers,
                timeout_secs: env_var_parse("YAHOO_TIMEOUT_SECS", yahoo.timeout_secs),
                cookie_settle_ms: env_var_parse("YAHOO_COOKIE_SETTLE_MS", yahoo.cookie_settle_ms),
                crumb_attempts: env_var_parse("YAHOO_CRUMB_ATTEMPTS", yahoo.crumb_attempts),
                chart_url: std::env::var("YAHOO_CHART_URL").ok(),
                download_url: std::env::var("YAHOO_DOWNLOAD_URL").ok(),
            },
            progress_interval_ms: env_var_parse(
                "PROGRESS_INTERVAL_MS",
                defaults.progress_interval_ms,
            ),
        })
    }

    /// PostgreSQL 저장소용 URL
    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url.as_deref().ok_or_else(|| {
            CollectorError::Config("DATABASE_URL 환경변수가 설정되지 않았습니다".to_string())
        })
    }

    /// 진행률 갱신 주기를 Duration으로 반환
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

impl BvcCollectConfig {
    /// 설정된 URL을 반영한 엔드포인트
    pub fn endpoints(&self) -> BvcEndpoints {
        let mut endpoints = BvcEndpoints::default();
        if let Some(url) = &self.handshake_url {
            endpoints.handshake_url = url.clone();
        }
        if let Some(url) = &self.data_url {
            endpoints.data_url = url.clone();
        }
        endpoints
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// 후보 날짜 조회 실패 시 대기를 Duration으로 반환
    pub fn probe_backoff(&self) -> Duration {
        Duration::from_millis(self.probe_backoff_ms)
    }
}

impl YahooCollectConfig {
    /// 클라이언트 설정 생성
    pub fn settings(&self) -> YahooSettings {
        let mut endpoints = YahooEndpoints::default();
        if let Some(url) = &self.chart_url {
            endpoints.chart_base = url.clone();
        }
        if let Some(url) = &self.download_url {
            endpoints.download_base = url.clone();
        }

        YahooSettings {
            endpoints,
            timeout: Duration::from_secs(self.timeout_secs),
            cookie_settle: Duration::from_millis(self.cookie_settle_ms),
            crumb_attempts: self.crumb_attempts.max(1),
            ..YahooSettings::default()
        }
    }
}

/// `SYMBOL:BOARD` 목록 파싱 (쉼표 구분)
pub fn parse_securities(raw: &str) -> Result<Vec<Security>> {
    let securities = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Security>())
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if securities.is_empty() {
        return Err(CollectorError::Config("BVC_ASSETS가 비어 있습니다".to_string()));
    }
    Ok(securities)
}

/// 티커 목록 파싱 (쉼표 구분)
pub fn parse_tickers(raw: &str) -> Result<Vec<String>> {
    let tickers: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect();

    if tickers.is_empty() {
        return Err(CollectorError::Config("YAHOO_TICKERS가 비어 있습니다".to_string()));
    }
    Ok(tickers)
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용)
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
