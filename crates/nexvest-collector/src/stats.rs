//! 수집 통계 구조체.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// 수집 작업 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionStats {
    /// 총 태스크 수 (날짜 또는 티커)
    pub total: usize,
    /// 데이터를 얻은 태스크 수
    pub success: usize,
    /// 에러 횟수
    pub errors: usize,
    /// 건너뛴 횟수 (휴장일 등 데이터 없음)
    pub skipped: usize,
    /// 추출된 총 레코드 수
    pub total_records: usize,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl CollectionStats {
    /// 새 통계 객체 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.success as f64 / self.total as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            total = self.total,
            success = self.success,
            errors = self.errors,
            skipped = self.skipped,
            total_records = self.total_records,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "수집 완료"
        );
    }
}

/// 종목/티커별 결과
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolOutcome {
    pub records: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 종목/티커별 결과 로그 출력
pub fn log_symbol_outcomes(source: &str, outcomes: &BTreeMap<String, SymbolOutcome>) {
    for (symbol, outcome) in outcomes {
        match (&outcome.error, outcome.records) {
            (Some(error), _) => {
                tracing::error!(source, symbol = %symbol, error = %error, "수집 실패")
            }
            (None, 0) => tracing::warn!(source, symbol = %symbol, "데이터 없음"),
            (None, records) => tracing::info!(source, symbol = %symbol, records, "수집 완료"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate() {
        let stats = CollectionStats {
            total: 4,
            success: 3,
            ..Default::default()
        };
        assert!((stats.success_rate() - 75.0).abs() < f64::EPSILON);
        assert_eq!(CollectionStats::new().success_rate(), 0.0);
    }
}
