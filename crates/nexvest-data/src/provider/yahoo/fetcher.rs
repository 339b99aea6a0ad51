//! 티커 단위 조회 (세션 1회 갱신, CSV 폴백).

use tracing::{debug, warn};

use super::session::{SessionLease, SharedSession};
use super::TickerSource;
use crate::error::Result;
use crate::model::{DateRange, TickerRecord};

#[derive(Debug, Clone, Copy)]
enum Endpoint {
    Structured,
    Delimited,
}

/// 공유 세션을 사용하는 티커 조회기.
pub struct TickerFetcher<T: TickerSource> {
    shared: SharedSession<T>,
}

impl<T: TickerSource> TickerFetcher<T> {
    pub fn new(source: T) -> Self {
        Self {
            shared: SharedSession::new(source),
        }
    }

    /// 공유 세션 (핸드셰이크 횟수 확인용).
    pub fn shared_session(&self) -> &SharedSession<T> {
        &self.shared
    }

    /// 티커 전체 기간 일봉 조회.
    ///
    /// 구조화 응답에 유효 행이 없거나 인증 외 오류가 나면 CSV로 폴백합니다.
    /// 인증 만료는 티커당 한 번만 세션을 갱신해 재시도하며, 그래도 실패하면 오류를 반환합니다.
    pub async fn fetch(&self, ticker: &str, range: DateRange) -> Result<Vec<TickerRecord>> {
        let mut renewed = false;

        match self.call(Endpoint::Structured, ticker, range, &mut renewed).await {
            Ok(records) if !records.is_empty() => return Ok(records),
            Ok(_) => debug!(ticker, "구조화 응답에 유효 행 없음, CSV 폴백"),
            Err(e) if e.is_authorization() => return Err(e),
            Err(e) => warn!(ticker, error = %e, "구조화 조회 실패, CSV 폴백"),
        }

        self.call(Endpoint::Delimited, ticker, range, &mut renewed).await
    }

    async fn call(
        &self,
        endpoint: Endpoint,
        ticker: &str,
        range: DateRange,
        renewed: &mut bool,
    ) -> Result<Vec<TickerRecord>> {
        let lease = self.shared.acquire().await?;

        match self.invoke(endpoint, &lease, ticker, range).await {
            Err(e) if e.is_authorization() && !*renewed => {
                *renewed = true;
                warn!(ticker, error = %e, generation = lease.generation(), "인증 만료, 세션 갱신 후 재시도");
                let fresh = self.shared.renew(&lease).await?;
                self.invoke(endpoint, &fresh, ticker, range).await
            }
            other => other,
        }
    }

    async fn invoke(
        &self,
        endpoint: Endpoint,
        lease: &SessionLease<T::Session>,
        ticker: &str,
        range: DateRange,
    ) -> Result<Vec<TickerRecord>> {
        let source = self.shared.handshaker();
        match endpoint {
            Endpoint::Structured => source.fetch_structured(lease, ticker, range).await,
            Endpoint::Delimited => source.fetch_delimited(lease, ticker, range).await,
        }
    }
}
