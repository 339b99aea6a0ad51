//! 휴장일 백필.
//!
//! 요청 날짜에 데이터가 없으면 평일 기준으로 하루씩 앞으로 이동하며 최대 `horizon`일까지
//! 조회합니다. 처음으로 비어 있지 않은 스냅샷을 준 날짜가 결과 날짜가 됩니다.
//!
//! | 후보 조회 결과 | 처리 |
//! |----------------|------|
//! | 데이터 있음 | 즉시 반환 |
//! | 빈 스냅샷 | 다음 후보 |
//! | 전송/인증 오류 | 잠시 대기 후 다음 후보 |
//! | 응답 형식 오류 | 중단, 태스크 실패 |

use chrono::{Duration as ChronoDuration, NaiveDate};
use nexvest_data::{roll_past_weekend, DayFetcher, DaySnapshot};
use std::time::Duration;
use tracing::debug;

use crate::Result;

/// 백필 조회 결과.
#[derive(Debug)]
pub enum Resolution {
    /// 데이터를 찾음
    Resolved {
        snapshot: DaySnapshot,
        resolved_date: NaiveDate,
        /// 찾기 전까지 전송 오류로 실패한 후보 수
        failed_probes: usize,
    },
    /// 모든 후보가 비어 있음 (휴장일, 상장 전 등)
    NoData { probes: usize, failed_probes: usize },
    /// 모든 후보 조회가 전송 오류로 실패
    Unreachable { probes: usize, last_error: String },
}

/// 휴장일 백필 조회기.
#[derive(Debug, Clone, Copy)]
pub struct BackfillResolver {
    horizon: u32,
    backoff: Duration,
}

impl BackfillResolver {
    pub fn new(horizon: u32, backoff: Duration) -> Self {
        Self {
            horizon: horizon.max(1),
            backoff,
        }
    }

    pub fn horizon(&self) -> u32 {
        self.horizon
    }

    /// 조회할 후보 날짜 (순서대로, 중복 없음).
    ///
    /// 주말은 다음 월요일로 이동하며, 요청 날짜로부터 `horizon`일을 넘는 후보는 제외합니다.
    pub fn candidates(&self, target: NaiveDate) -> Vec<NaiveDate> {
        let limit = target + ChronoDuration::days(i64::from(self.horizon));
        let mut candidates: Vec<NaiveDate> = Vec::new();

        for delta in 0..self.horizon {
            let candidate = roll_past_weekend(target + ChronoDuration::days(i64::from(delta)));
            if candidate > limit {
                break;
            }
            if candidates.last() != Some(&candidate) {
                candidates.push(candidate);
            }
        }
        candidates
    }

    /// 요청 날짜에 해당하는 스냅샷 조회.
    pub async fn resolve<F>(&self, fetcher: &F, target: NaiveDate) -> Result<Resolution>
    where
        F: DayFetcher + ?Sized,
    {
        let candidates = self.candidates(target);
        let probes = candidates.len();
        let mut failed_probes = 0;
        let mut last_error = None;

        for candidate in candidates {
            match fetcher.fetch_day(candidate).await {
                Ok(snapshot) if !snapshot.is_empty() => {
                    debug!(date = %target, resolved = %candidate, rows = snapshot.len(), "데이터 확인");
                    return Ok(Resolution::Resolved {
                        snapshot,
                        resolved_date: candidate,
                        failed_probes,
                    });
                }
                Ok(_) => {
                    debug!(date = %target, candidate = %candidate, "빈 스냅샷");
                }
                Err(e) if e.is_transport() => {
                    debug!(date = %target, candidate = %candidate, error = %e, "후보 조회 실패");
                    failed_probes += 1;
                    last_error = Some(e.to_string());
                    tokio::time::sleep(self.backoff).await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        match last_error {
            Some(last_error) if failed_probes == probes => Ok(Resolution::Unreachable {
                probes,
                last_error,
            }),
            _ => Ok(Resolution::NoData {
                probes,
                failed_probes,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nexvest_data::{BvcRow, DataError};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    enum Script {
        Rows,
        Fail,
        Malformed,
    }

    /// 날짜별 응답이 정해진 가짜 조회기. 목록에 없는 날짜는 빈 스냅샷.
    #[derive(Default)]
    struct ScriptedDays {
        days: HashMap<NaiveDate, Script>,
        calls: Mutex<Vec<NaiveDate>>,
    }

    impl ScriptedDays {
        fn with(mut self, date: NaiveDate, script: Script) -> Self {
            self.days.insert(date, script);
            self
        }

        fn calls(&self) -> Vec<NaiveDate> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DayFetcher for ScriptedDays {
        async fn fetch_day(&self, date: NaiveDate) -> nexvest_data::Result<DaySnapshot> {
            self.calls.lock().unwrap().push(date);
            match self.days.get(&date) {
                Some(Script::Rows) => Ok(DaySnapshot::new(vec![BvcRow {
                    mnemonic: "X".into(),
                    board: "EQTY".into(),
                    last_price: Some(dec!(100)),
                    ..Default::default()
                }])),
                Some(Script::Fail) => Err(DataError::Transport("HTTP 502".into())),
                Some(Script::Malformed) => Err(DataError::MalformedPayload("html".into())),
                None => Ok(DaySnapshot::default()),
            }
        }
    }

    fn resolver() -> BackfillResolver {
        BackfillResolver::new(7, Duration::ZERO)
    }

    #[test]
    fn test_candidates_skip_weekends_without_duplicates() {
        // 2024-01-05 금요일
        let candidates = resolver().candidates(d(2024, 1, 5));
        assert_eq!(
            candidates,
            vec![
                d(2024, 1, 5),
                d(2024, 1, 8),
                d(2024, 1, 9),
                d(2024, 1, 10),
                d(2024, 1, 11),
            ]
        );
        assert!(candidates.iter().all(|c| *c - d(2024, 1, 5) <= ChronoDuration::days(7)));
    }

    #[tokio::test]
    async fn test_holiday_advances_to_next_day() {
        let fetcher = ScriptedDays::default().with(d(2024, 1, 2), Script::Rows);

        match resolver().resolve(&fetcher, d(2024, 1, 1)).await.unwrap() {
            Resolution::Resolved { resolved_date, snapshot, .. } => {
                assert_eq!(resolved_date, d(2024, 1, 2));
                assert_eq!(snapshot.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
        // 첫 결과에서 중단
        assert_eq!(fetcher.calls(), vec![d(2024, 1, 1), d(2024, 1, 2)]);
    }

    #[tokio::test]
    async fn test_transport_failure_moves_to_next_candidate() {
        let fetcher = ScriptedDays::default()
            .with(d(2024, 1, 1), Script::Fail)
            .with(d(2024, 1, 2), Script::Rows);

        match resolver().resolve(&fetcher, d(2024, 1, 1)).await.unwrap() {
            Resolution::Resolved { resolved_date, failed_probes, .. } => {
                assert_eq!(resolved_date, d(2024, 1, 2));
                assert_eq!(failed_probes, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_exhausted_horizon_is_no_data() {
        let fetcher = ScriptedDays::default().with(d(2024, 1, 2), Script::Fail);

        match resolver().resolve(&fetcher, d(2024, 1, 1)).await.unwrap() {
            Resolution::NoData { probes, failed_probes } => {
                assert_eq!(probes, fetcher.calls().len());
                assert_eq!(failed_probes, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_all_failures_is_unreachable() {
        let target = d(2024, 1, 1);
        let mut fetcher = ScriptedDays::default();
        for c in resolver().candidates(target) {
            fetcher = fetcher.with(c, Script::Fail);
        }

        assert!(matches!(
            resolver().resolve(&fetcher, target).await.unwrap(),
            Resolution::Unreachable { .. }
        ));
    }

    #[tokio::test]
    async fn test_malformed_payload_fails_task() {
        let fetcher = ScriptedDays::default()
            .with(d(2024, 1, 1), Script::Malformed)
            .with(d(2024, 1, 2), Script::Rows);

        assert!(resolver().resolve(&fetcher, d(2024, 1, 1)).await.is_err());
        assert_eq!(fetcher.calls(), vec![d(2024, 1, 1)]);
    }
}
