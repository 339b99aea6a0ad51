//! 거래소(BVC) 일별 시세 클라이언트.
//!
//! 하루치 전 종목 데이터를 단일 호출로 가져옵니다.
//!
//! # 호출 절차
//!
//! 1. 핸드셰이크: 타임스탬프와 난수를 붙여 단기 토큰 발급
//! 2. 데이터 조회: 토큰과 쿼리 문자열에서 파생한 서명 헤더(`k`)를 함께 전송
//!
//! 토큰은 호출마다 새로 발급받으므로 세션은 태스크 단위로 생성하고 버립니다.
//!
//! # 사용 예제
//!
//! ```rust,ignore
//! use nexvest_data::provider::bvc::{BvcClient, DayFetcher, SnapshotSource};
//!
//! let client = BvcClient::new(Default::default(), Duration::from_secs(15))?;
//! let session = client.session();
//! let snapshot = session.fetch_day(date).await?;
//! ```

mod snapshot;

pub use snapshot::{BvcRow, DaySnapshot};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{NaiveDate, Utc};
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::error::{DataError, Result};

/// 조회 대상 시장 구분.
const BOARDS: [&str; 3] = ["EQTY", "REPO", "TTV"];

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// 거래소 API 엔드포인트.
#[derive(Debug, Clone)]
pub struct BvcEndpoints {
    /// 토큰 발급 URL
    pub handshake_url: String,
    /// 일별 시세 조회 URL
    pub data_url: String,
    /// `Origin` 헤더 값
    pub origin: String,
}

impl Default for BvcEndpoints {
    fn default() -> Self {
        Self {
            handshake_url: "https://www.bvc.com.co/api/handshake".to_string(),
            data_url: "https://rest.bvc.com.co/market-information/rv/lvl-2".to_string(),
            origin: "https://www.bvc.com.co".to_string(),
        }
    }
}

/// 날짜 하나의 전 종목 스냅샷을 가져오는 소스.
#[async_trait]
pub trait DayFetcher: Send + Sync {
    /// 거래가 없던 날은 빈 스냅샷을 반환합니다 (오류 아님).
    async fn fetch_day(&self, date: NaiveDate) -> Result<DaySnapshot>;
}

/// 태스크 단위 세션 생성기.
pub trait SnapshotSource: Send + Sync + 'static {
    type Session: DayFetcher + 'static;

    /// 태스크 하나가 소유할 세션 생성.
    fn session(&self) -> Self::Session;
}

/// 거래소 API 클라이언트.
#[derive(Clone)]
pub struct BvcClient {
    client: reqwest::Client,
    endpoints: BvcEndpoints,
}

/// 태스크 하나에 묶인 인증 세션.
pub struct BvcSession {
    client: reqwest::Client,
    endpoints: BvcEndpoints,
}

#[derive(Debug, Deserialize)]
struct HandshakeResponse {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MarketDataResponse {
    #[serde(default)]
    data: Option<MarketDataBody>,
}

#[derive(Debug, Deserialize)]
struct MarketDataBody {
    #[serde(default)]
    tab: Option<Vec<BvcRow>>,
}

impl BvcClient {
    /// 새로운 거래소 클라이언트 생성.
    pub fn new(endpoints: BvcEndpoints, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            header::ORIGIN,
            HeaderValue::from_str(&endpoints.origin)
                .map_err(|e| DataError::ConfigError(e.to_string()))?,
        );
        headers.insert(
            header::REFERER,
            HeaderValue::from_str(&format!("{}/", endpoints.origin))
                .map_err(|e| DataError::ConfigError(e.to_string()))?,
        );

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| DataError::ConfigError(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self { client, endpoints })
    }
}

impl SnapshotSource for BvcClient {
    type Session = BvcSession;

    fn session(&self) -> BvcSession {
        BvcSession {
            client: self.client.clone(),
            endpoints: self.endpoints.clone(),
        }
    }
}

impl BvcSession {
    /// 단기 토큰 발급.
    async fn acquire_token(&self) -> Result<String> {
        let ts = Utc::now().timestamp_millis().to_string();
        let nonce = uuid::Uuid::new_v4().to_string();

        let response = self
            .client
            .get(&self.endpoints.handshake_url)
            .query(&[("ts", ts.as_str()), ("r", nonce.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DataError::from_status(response.status(), "handshake"));
        }

        let body: HandshakeResponse = response.json().await?;
        body.token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| DataError::MalformedPayload("handshake response without token".into()))
    }
}

#[async_trait]
impl DayFetcher for BvcSession {
    async fn fetch_day(&self, date: NaiveDate) -> Result<DaySnapshot> {
        let token = self.acquire_token().await?;
        let params = query_params(date);

        let response = self
            .client
            .get(&self.endpoints.data_url)
            .query(&params)
            .header("token", token)
            .header("k", signature_header(date))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DataError::from_status(response.status(), "market data"));
        }

        let body = response.text().await?;
        let parsed: MarketDataResponse = serde_json::from_str(&body)
            .map_err(|e| DataError::MalformedPayload(format!("market data ({}): {}", date, e)))?;

        let rows = parsed.data.and_then(|d| d.tab).unwrap_or_default();
        debug!(date = %date, rows = rows.len(), "거래소 일별 시세 조회");
        Ok(DaySnapshot::new(rows))
    }
}

/// 데이터 조회 쿼리 파라미터 (순서 고정).
fn query_params(date: NaiveDate) -> Vec<(&'static str, String)> {
    let mut params = vec![("filters[marketDataRv][tradeDate]", date.format("%Y-%m-%d").to_string())];
    params.extend(
        BOARDS
            .iter()
            .map(|board| ("filters[marketDataRv][board]", board.to_string())),
    );
    params.push(("sorter[]", "tradeValue".to_string()));
    params.push(("sorter[]", "DESC".to_string()));
    params
}

/// 필터 절을 재현 가능한 방식으로 인코딩한 서명 헤더.
pub fn signature_header(date: NaiveDate) -> String {
    let clause = query_params(date)
        .into_iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");
    STANDARD.encode(clause)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn client_for(server: &mockito::ServerGuard) -> BvcClient {
        let endpoints = BvcEndpoints {
            handshake_url: format!("{}/api/handshake", server.url()),
            data_url: format!("{}/market-information/rv/lvl-2", server.url()),
            origin: server.url(),
        };
        BvcClient::new(endpoints, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_signature_header_is_deterministic() {
        let expected = STANDARD.encode(
            "filters[marketDataRv][tradeDate]=2024-01-02\
             &filters[marketDataRv][board]=EQTY\
             &filters[marketDataRv][board]=REPO\
             &filters[marketDataRv][board]=TTV\
             &sorter[]=tradeValue&sorter[]=DESC",
        );
        assert_eq!(signature_header(d(2024, 1, 2)), expected);
        assert_eq!(signature_header(d(2024, 1, 2)), signature_header(d(2024, 1, 2)));
        assert_ne!(signature_header(d(2024, 1, 2)), signature_header(d(2024, 1, 3)));
    }

    #[tokio::test]
    async fn test_fetch_day_sends_token_and_signature() {
        let mut server = mockito::Server::new_async().await;
        let handshake = server
            .mock("GET", "/api/handshake")
            .match_query(Matcher::AllOf(vec![
                Matcher::Regex("ts=\\d+".into()),
                Matcher::Regex("r=[0-9a-f-]{36}".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"token":"tok-123"}"#)
            .create_async()
            .await;
        let data = server
            .mock("GET", "/market-information/rv/lvl-2")
            .match_query(Matcher::UrlEncoded(
                "filters[marketDataRv][tradeDate]".into(),
                "2024-01-02".into(),
            ))
            .match_header("token", "tok-123")
            .match_header("k", signature_header(d(2024, 1, 2)).as_str())
            .with_status(200)
            .with_body(
                r#"{"data":{"tab":[
                    {"mnemonic":"ECOPETROL","board":"EQTY","lastPrice":2420,"volume":1000},
                    {"mnemonic":"ISA","board":"EQTY","lastPrice":null}
                ]}}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let snapshot = client.session().fetch_day(d(2024, 1, 2)).await.unwrap();

        handshake.assert_async().await;
        data.assert_async().await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.rows[0].last_price, Some(dec!(2420)));
    }

    #[tokio::test]
    async fn test_fetch_day_without_tab_is_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/handshake")
            .match_query(Matcher::Any)
            .with_body(r#"{"token":"t"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/market-information/rv/lvl-2")
            .match_query(Matcher::Any)
            .with_body(r#"{"data":{}}"#)
            .create_async()
            .await;

        let snapshot = client_for(&server)
            .session()
            .fetch_day(d(2024, 1, 1))
            .await
            .unwrap();
        assert!(snapshot.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_day_classifies_failures() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/handshake")
            .match_query(Matcher::Any)
            .with_body(r#"{"token":"t"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/market-information/rv/lvl-2")
            .match_query(Matcher::Any)
            .with_status(502)
            .create_async()
            .await;

        let err = client_for(&server)
            .session()
            .fetch_day(d(2024, 1, 2))
            .await
            .unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_fetch_day_malformed_payload() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/handshake")
            .match_query(Matcher::Any)
            .with_body(r#"{"token":"t"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/market-information/rv/lvl-2")
            .match_query(Matcher::Any)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let err = client_for(&server)
            .session()
            .fetch_day(d(2024, 1, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::MalformedPayload(_)));
    }

    #[tokio::test]
    async fn test_handshake_without_token_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/handshake")
            .match_query(Matcher::Any)
            .with_body(r#"{"status":"ok"}"#)
            .create_async()
            .await;

        let err = client_for(&server)
            .session()
            .fetch_day(d(2024, 1, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::MalformedPayload(_)));
    }
}
