//! 금융 데이터 제공자(Yahoo Finance) 티커별 일봉 클라이언트.
//!
//! 쿠키와 crumb 토큰이 있어야 응답하는 소스입니다.
//!
//! # 핸드셰이크
//!
//! 1. 동의(consent) 제출 - 실패해도 무시
//! 2. 종목 페이지 방문으로 쿠키 설정 - 실패해도 무시
//! 3. crumb 발급 (두 개의 엔드포인트를 순서대로 시도)
//!
//! crumb을 끝내 받지 못해도 세션은 crumb 없이 사용합니다.
//!
//! # 조회
//!
//! - 구조화 엔드포인트 (v8 chart JSON)
//! - 구분자 텍스트 엔드포인트 (v7 CSV) - 구조화 응답에 유효 행이 없을 때 폴백

mod fetcher;
mod session;

pub use fetcher::TickerFetcher;
pub use session::{SessionHandshake, SessionLease, SharedSession};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime};
use reqwest::header::{self, HeaderMap, HeaderValue};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{DataError, Result};
use crate::model::{DateRange, TickerRecord};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// 가격 반올림 자릿수.
const PRICE_SCALE: u32 = 6;

/// 티커별 일봉을 제공하는 소스.
#[async_trait]
pub trait TickerSource: SessionHandshake {
    /// 구조화(JSON) 엔드포인트 조회.
    async fn fetch_structured(
        &self,
        session: &Self::Session,
        ticker: &str,
        range: DateRange,
    ) -> Result<Vec<TickerRecord>>;

    /// 구분자 텍스트(CSV) 엔드포인트 조회.
    async fn fetch_delimited(
        &self,
        session: &Self::Session,
        ticker: &str,
        range: DateRange,
    ) -> Result<Vec<TickerRecord>>;
}

/// 제공자 엔드포인트.
#[derive(Debug, Clone)]
pub struct YahooEndpoints {
    pub consent_url: String,
    /// 쿠키 설정용 페이지
    pub seed_url: String,
    /// crumb 발급 엔드포인트 (순서대로 시도)
    pub crumb_urls: Vec<String>,
    /// `{chart_base}/{ticker}`
    pub chart_base: String,
    /// `{download_base}/{ticker}`
    pub download_base: String,
}

impl Default for YahooEndpoints {
    fn default() -> Self {
        Self {
            consent_url: "https://consent.yahoo.com/v2/collectConsent".to_string(),
            seed_url: "https://finance.yahoo.com/quote/SPY/history/".to_string(),
            crumb_urls: vec![
                "https://query1.finance.yahoo.com/v1/test/getcrumb".to_string(),
                "https://query2.finance.yahoo.com/v1/test/getcrumb".to_string(),
            ],
            chart_base: "https://query1.finance.yahoo.com/v8/finance/chart".to_string(),
            download_base: "https://query1.finance.yahoo.com/v7/finance/download".to_string(),
        }
    }
}

/// 제공자 클라이언트 설정.
#[derive(Debug, Clone)]
pub struct YahooSettings {
    pub endpoints: YahooEndpoints,
    /// 호출당 타임아웃
    pub timeout: Duration,
    /// 쿠키 설정 후 대기 시간
    pub cookie_settle: Duration,
    /// crumb 엔드포인트별 시도 횟수
    pub crumb_attempts: u32,
    /// crumb 재시도 간 대기 시간
    pub crumb_retry_pause: Duration,
}

impl Default for YahooSettings {
    fn default() -> Self {
        Self {
            endpoints: YahooEndpoints::default(),
            timeout: Duration::from_secs(30),
            cookie_settle: Duration::from_secs(1),
            crumb_attempts: 3,
            crumb_retry_pause: Duration::from_secs(1),
        }
    }
}

/// 쿠키와 crumb을 보유한 인증 세션.
pub struct YahooSession {
    client: reqwest::Client,
    crumb: Option<String>,
}

impl YahooSession {
    pub fn crumb(&self) -> Option<&str> {
        self.crumb.as_deref()
    }
}

/// 제공자 클라이언트.
#[derive(Debug, Clone, Default)]
pub struct YahooClient {
    settings: YahooSettings,
}

impl YahooClient {
    pub fn new(settings: YahooSettings) -> Self {
        Self { settings }
    }

    fn build_http_client(&self) -> Result<reqwest::Client> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(header::REFERER, HeaderValue::from_static("https://finance.yahoo.com/"));

        reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .cookie_store(true)
            .timeout(self.settings.timeout)
            .build()
            .map_err(|e| DataError::ConfigError(format!("HTTP 클라이언트 생성 실패: {}", e)))
    }

    /// crumb 발급 시도. 모든 엔드포인트가 실패하면 `None`.
    async fn request_crumb(&self, client: &reqwest::Client) -> Option<String> {
        for url in &self.settings.endpoints.crumb_urls {
            for attempt in 1..=self.settings.crumb_attempts {
                match client.get(url).send().await {
                    Ok(response) if response.status().is_success() => {
                        if let Ok(text) = response.text().await {
                            let crumb = text.trim();
                            if !crumb.is_empty() {
                                return Some(crumb.to_string());
                            }
                        }
                    }
                    Ok(response) => {
                        debug!(url = %url, attempt, status = %response.status(), "crumb 응답 실패");
                    }
                    Err(e) => {
                        debug!(url = %url, attempt, error = %e, "crumb 요청 실패");
                    }
                }
                tokio::time::sleep(self.settings.crumb_retry_pause).await;
            }
        }
        None
    }

    fn period(range: DateRange) -> (i64, i64) {
        let to_ts = |d: NaiveDate| d.and_time(NaiveTime::MIN).and_utc().timestamp();
        (to_ts(range.start), to_ts(range.end))
    }

    async fn get_text(&self, session: &YahooSession, url: &str, context: &str) -> Result<String> {
        let mut request = session.client.get(url);
        if let Some(crumb) = session.crumb() {
            request = request.query(&[("crumb", crumb)]);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(DataError::from_status(response.status(), context));
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl SessionHandshake for YahooClient {
    type Session = YahooSession;

    async fn handshake(&self) -> Result<YahooSession> {
        let client = self.build_http_client()?;
        let endpoints = &self.settings.endpoints;

        // 1. 동의 제출 (유럽/중남미 IP)
        let consent = client
            .post(&endpoints.consent_url)
            .form(&[
                ("agree", "agree"),
                ("agree", "agree"),
                ("consentUUID", "default"),
                ("sessionId", "default"),
            ])
            .send()
            .await;
        if let Err(e) = consent {
            debug!(error = %e, "consent 제출 실패 (무시)");
        }

        // 2. 쿠키 설정
        match client.get(&endpoints.seed_url).send().await {
            Ok(_) => tokio::time::sleep(self.settings.cookie_settle).await,
            Err(e) => debug!(error = %e, "쿠키 설정 페이지 방문 실패 (무시)"),
        }

        // 3. crumb 발급
        let crumb = self.request_crumb(&client).await;
        match &crumb {
            Some(c) => info!(
                crumb_prefix = %c.chars().take(8).collect::<String>(),
                "제공자 세션 준비 완료"
            ),
            None => warn!("crumb 없이 세션 진행"),
        }

        Ok(YahooSession { client, crumb })
    }
}

#[async_trait]
impl TickerSource for YahooClient {
    async fn fetch_structured(
        &self,
        session: &YahooSession,
        ticker: &str,
        range: DateRange,
    ) -> Result<Vec<TickerRecord>> {
        let (p1, p2) = Self::period(range);
        let url = format!(
            "{}/{}?period1={}&period2={}&interval=1d&events=history&includeAdjustedClose=true",
            self.settings.endpoints.chart_base, ticker, p1, p2
        );
        let body = self.get_text(session, &url, "chart").await?;
        parse_chart(ticker, &body)
    }

    async fn fetch_delimited(
        &self,
        session: &YahooSession,
        ticker: &str,
        range: DateRange,
    ) -> Result<Vec<TickerRecord>> {
        let (p1, p2) = Self::period(range);
        let url = format!(
            "{}/{}?period1={}&period2={}&interval=1d&events=history",
            self.settings.endpoints.download_base, ticker, p1, p2
        );
        let body = self.get_text(session, &url, "download").await?;
        Ok(parse_csv(ticker, &body))
    }
}

/// v8 chart 응답 구조
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<Quote>,
    #[serde(rename = "adjclose")]
    adj_close: Option<Vec<AdjClose>>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    open: Option<Vec<Option<f64>>>,
    high: Option<Vec<Option<f64>>>,
    low: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
    volume: Option<Vec<Option<f64>>>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    #[serde(rename = "adjclose")]
    adj_close: Option<Vec<Option<f64>>>,
}

fn price(value: f64) -> Option<Decimal> {
    Decimal::from_f64(value).map(|d| d.round_dp(PRICE_SCALE))
}

fn nth(series: &[Option<f64>], i: usize) -> Option<f64> {
    series.get(i).copied().flatten()
}

/// v8 chart JSON 파싱. 종가가 없는 날은 제외합니다.
pub fn parse_chart(ticker: &str, body: &str) -> Result<Vec<TickerRecord>> {
    let response: ChartResponse = serde_json::from_str(body)
        .map_err(|e| DataError::MalformedPayload(format!("chart {}: {}", ticker, e)))?;

    if let Some(error) = response.chart.error {
        return Err(DataError::MalformedPayload(format!(
            "chart {}: {} - {}",
            ticker, error.code, error.description
        )));
    }

    let result = response
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| DataError::MalformedPayload(format!("chart {}: empty result", ticker)))?;

    let timestamps = result.timestamp.unwrap_or_default();
    let quote = result
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| DataError::MalformedPayload(format!("chart {}: no quote", ticker)))?;

    let opens = quote.open.unwrap_or_default();
    let highs = quote.high.unwrap_or_default();
    let lows = quote.low.unwrap_or_default();
    let closes = quote.close.unwrap_or_default();
    let volumes = quote.volume.unwrap_or_default();
    let adj_closes = result
        .indicators
        .adj_close
        .and_then(|ac| ac.into_iter().next())
        .and_then(|ac| ac.adj_close)
        .unwrap_or_default();

    let records = timestamps
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            let close = price(nth(&closes, i)?)?;
            let date = DateTime::from_timestamp(*ts, 0)?.date_naive();
            let or_zero = |series: &[Option<f64>]| {
                nth(series, i).and_then(price).unwrap_or(Decimal::ZERO)
            };
            let adj_close = nth(&adj_closes, i)
                .filter(|v| *v != 0.0)
                .and_then(price)
                .unwrap_or(close);

            Some(TickerRecord {
                date,
                open: or_zero(&opens),
                high: or_zero(&highs),
                low: or_zero(&lows),
                close,
                adj_close,
                volume: nth(&volumes, i).map(|v| v as i64).unwrap_or(0),
                ticker: ticker.to_string(),
            })
        })
        .collect();

    Ok(records)
}

/// v7 CSV 파싱. 형식이 맞지 않는 레코드는 건너뜁니다.
pub fn parse_csv(ticker: &str, body: &str) -> Vec<TickerRecord> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(body.trim().as_bytes());

    let header: Vec<String> = match reader.headers() {
        Ok(headers) => headers.iter().map(str::to_lowercase).collect(),
        Err(e) => {
            warn!(ticker = ticker, error = %e, "CSV 헤더 파싱 실패");
            return Vec::new();
        }
    };

    reader
        .records()
        .filter_map(|result| match result {
            Ok(record) => {
                if record.len() < header.len() {
                    return None;
                }
                let row: HashMap<&str, &str> =
                    header.iter().map(String::as_str).zip(record.iter()).collect();
                parse_csv_row(ticker, &row)
            }
            Err(e) => {
                debug!(ticker = ticker, error = %e, "CSV 레코드 건너뜀");
                None
            }
        })
        .collect()
}
