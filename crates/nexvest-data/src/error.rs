//! 데이터 모듈 오류 타입.

use thiserror::Error;

/// 데이터 관련 오류.
///
/// 업스트림 오류는 재시도 정책이 서로 다르므로 종류별로 구분합니다:
/// - `Transport`: 네트워크 실패 또는 비정상 HTTP 상태 (백필 루프에서 다음 후보로 진행)
/// - `AuthorizationExpired`: 401/403 (세션 1회 갱신 후 재시도)
/// - `MalformedPayload`: 예상과 다른 응답 형태 (태스크 실패로 집계)
#[derive(Debug, Error)]
pub enum DataError {
    /// 네트워크/HTTP 전송 오류
    #[error("Transport error: {0}")]
    Transport(String),

    /// 인증 만료 (HTTP 401/403)
    #[error("Authorization expired (HTTP {status})")]
    AuthorizationExpired { status: u16 },

    /// 응답 형식 오류
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// 레코드를 찾을 수 없음
    #[error("Record not found: {0}")]
    NotFound(String),

    /// 데이터베이스 연결 오류
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// 쿼리 실행 오류
    #[error("Query error: {0}")]
    QueryError(String),

    /// 직렬화/역직렬화 오류
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// 파일 입출력 오류
    #[error("I/O error: {0}")]
    Io(String),

    /// 설정 오류
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl DataError {
    /// 전송 계층 실패 여부 (다른 후보 날짜로 재시도 가능).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            DataError::Transport(_) | DataError::AuthorizationExpired { .. }
        )
    }

    /// 인증 만료 여부.
    pub fn is_authorization(&self) -> bool {
        matches!(self, DataError::AuthorizationExpired { .. })
    }

    /// HTTP 상태 코드를 오류로 분류.
    pub fn from_status(status: reqwest::StatusCode, context: &str) -> Self {
        match status.as_u16() {
            401 | 403 => DataError::AuthorizationExpired {
                status: status.as_u16(),
            },
            code => DataError::Transport(format!("{}: HTTP {}", context, code)),
        }
    }
}

impl From<reqwest::Error> for DataError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return DataError::MalformedPayload(err.to_string());
        }
        match err.status() {
            Some(status) if status.as_u16() == 401 || status.as_u16() == 403 => {
                DataError::AuthorizationExpired {
                    status: status.as_u16(),
                }
            }
            _ => DataError::Transport(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DataError::NotFound("Row not found".to_string()),
            sqlx::Error::Database(db_err) => DataError::QueryError(db_err.message().to_string()),
            _ => DataError::QueryError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for DataError {
    fn from(err: std::io::Error) -> Self {
        DataError::Io(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(DataError::from_status(reqwest::StatusCode::UNAUTHORIZED, "chart").is_authorization());
        assert!(DataError::from_status(reqwest::StatusCode::FORBIDDEN, "chart").is_authorization());

        let err = DataError::from_status(reqwest::StatusCode::BAD_GATEWAY, "lvl-2");
        assert!(err.is_transport());
        assert!(!err.is_authorization());
    }

    #[test]
    fn test_malformed_is_not_transport() {
        assert!(!DataError::MalformedPayload("tab".into()).is_transport());
    }
}
