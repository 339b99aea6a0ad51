//! 에러 타입 정의.

use nexvest_data::DataError;
use std::fmt;

/// Collector 에러 타입
#[derive(Debug)]
pub enum CollectorError {
    /// 데이터 소스/저장소 에러
    Data(DataError),
    /// 설정 에러
    Config(String),
    /// 태스크 실행 에러 (패닉, 취소)
    Task(String),
}

impl CollectorError {
    /// 업스트림 인증 만료 여부
    pub fn is_authorization(&self) -> bool {
        matches!(self, Self::Data(e) if e.is_authorization())
    }
}

impl fmt::Display for CollectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data(e) => write!(f, "Data error: {}", e),
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::Task(msg) => write!(f, "Task error: {}", msg),
        }
    }
}

impl std::error::Error for CollectorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Data(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DataError> for CollectorError {
    fn from(err: DataError) -> Self {
        Self::Data(err)
    }
}

impl From<std::io::Error> for CollectorError {
    fn from(err: std::io::Error) -> Self {
        Self::Data(DataError::from(err))
    }
}

impl From<serde_json::Error> for CollectorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Data(DataError::from(err))
    }
}

impl From<tokio::task::JoinError> for CollectorError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_panic() {
            Self::Task(format!("task panicked: {}", err))
        } else {
            Self::Task(err.to_string())
        }
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[tokio::test]
    async fn test_panicked_task_becomes_task_error() {
        let err = tokio::spawn(async { panic!("boom") }).await.unwrap_err();
        let err = CollectorError::from(err);
        assert!(matches!(err, CollectorError::Task(ref msg) if msg.contains("panicked")));
        assert!(err.source().is_none());
    }

    #[test]
    fn test_data_error_keeps_source() {
        let err = CollectorError::from(DataError::NotFound("GEB".into()));
        assert!(err.source().is_some());
        assert!(err.to_string().starts_with("Data error"));
    }
}
