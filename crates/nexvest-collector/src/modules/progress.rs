//! 진행률 집계와 표시.
//!
//! 카운터는 결과를 소비하는 루프 하나만 갱신하고, 갱신할 때마다 스냅샷을 `watch` 채널로
//! 발행합니다. 표시는 별도 태스크가 주기적으로 최신 스냅샷을 읽어 진행 막대에 반영하므로
//! 표시가 느리거나 실패해도 작업에는 영향이 없습니다.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// 완료된 태스크 하나의 결과 분류.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// 데이터 확보 (추출된 레코드 수)
    Completed { records: usize },
    /// 데이터 없음
    Skipped,
    /// 실패
    Failed,
}

/// 진행 카운터.
#[derive(Debug, Clone)]
pub struct ProgressState {
    pub done: usize,
    pub total: usize,
    /// 추출된 레코드 수
    pub ok: usize,
    pub skipped: usize,
    pub errors: usize,
    started: Instant,
}

impl ProgressState {
    pub fn new(total: usize) -> Self {
        Self {
            done: 0,
            total,
            ok: 0,
            skipped: 0,
            errors: 0,
            started: Instant::now(),
        }
    }

    fn apply(&mut self, status: TaskStatus) {
        self.done += 1;
        match status {
            TaskStatus::Completed { records } => self.ok += records,
            TaskStatus::Skipped => self.skipped += 1,
            TaskStatus::Failed => self.errors += 1,
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            done: self.done,
            total: self.total,
            ok: self.ok,
            skipped: self.skipped,
            errors: self.errors,
            elapsed: self.started.elapsed(),
        }
    }
}

/// 특정 시점의 진행 상황.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressSnapshot {
    pub done: usize,
    pub total: usize,
    pub ok: usize,
    pub skipped: usize,
    pub errors: usize,
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    /// 남은 시간 추정: `(total - done) * (elapsed / done)`. 완료된 태스크가 없으면 `None`.
    pub fn eta(&self) -> Option<Duration> {
        if self.done == 0 {
            return None;
        }
        let remaining = self.total.saturating_sub(self.done) as f64;
        Some(self.elapsed.mul_f64(remaining / self.done as f64))
    }

    fn message(&self) -> String {
        let eta = self
            .eta()
            .map(|eta| format!("{}s", eta.as_secs()))
            .unwrap_or_else(|| "--".to_string());
        format!(
            "ok:{} skip:{} err:{} eta:{}",
            self.ok, self.skipped, self.errors, eta
        )
    }
}

/// 진행 카운터의 단일 갱신 지점.
pub struct ProgressTracker {
    state: ProgressState,
    publisher: watch::Sender<ProgressSnapshot>,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        let state = ProgressState::new(total);
        let (publisher, _) = watch::channel(state.snapshot());
        Self { state, publisher }
    }

    /// 태스크 완료 기록. 완료 수는 결과와 관계없이 정확히 1 증가합니다.
    pub fn record(&mut self, status: TaskStatus) {
        self.state.apply(status);
        // 구독자가 없어도 값은 갱신됨
        self.publisher.send_replace(self.state.snapshot());
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.state.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.publisher.subscribe()
    }
}

/// 주기적으로 진행 막대를 갱신하는 표시 태스크.
pub struct ProgressRenderer {
    bar: ProgressBar,
    handle: JoinHandle<()>,
}

impl ProgressRenderer {
    /// 표시 태스크 시작.
    pub fn spawn(
        label: &str,
        receiver: watch::Receiver<ProgressSnapshot>,
        interval: Duration,
    ) -> Self {
        let total = receiver.borrow().total as u64;
        let bar = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{prefix:>6} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map(|style| style.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar.set_prefix(label.to_string());

        let handle = tokio::spawn({
            let bar = bar.clone();
            async move {
                let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(10)));
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    let snapshot = receiver.borrow().clone();
                    bar.set_position(snapshot.done as u64);
                    bar.set_message(snapshot.message());
                }
            }
        });

        Self { bar, handle }
    }

    /// 표시 태스크를 멈추고 최종 상태로 막대를 닫음.
    ///
    /// 표시 태스크가 패닉했더라도 결과는 버리고 막대만 닫습니다.
    pub async fn finish(self, last: &ProgressSnapshot) {
        self.handle.abort();
        if let Err(e) = self.handle.await {
            if e.is_panic() {
                tracing::warn!(error = %e, "진행 표시 태스크 패닉");
            }
        }
        self.bar.set_position(last.done as u64);
        self.bar.finish_with_message(last.message());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eta_undefined_before_first_completion() {
        let snapshot = ProgressSnapshot {
            total: 10,
            elapsed: Duration::from_secs(5),
            ..Default::default()
        };
        assert_eq!(snapshot.eta(), None);
    }

    #[test]
    fn test_eta_scales_with_remaining() {
        let snapshot = ProgressSnapshot {
            done: 2,
            total: 10,
            elapsed: Duration::from_secs(4),
            ..Default::default()
        };
        assert_eq!(snapshot.eta(), Some(Duration::from_secs(16)));
    }

    #[test]
    fn test_record_counts_each_task_once() {
        let mut tracker = ProgressTracker::new(4);
        let receiver = tracker.subscribe();

        tracker.record(TaskStatus::Completed { records: 3 });
        tracker.record(TaskStatus::Skipped);
        tracker.record(TaskStatus::Failed);
        tracker.record(TaskStatus::Completed { records: 0 });

        let snapshot = tracker.snapshot();
        assert_eq!(
            (snapshot.done, snapshot.ok, snapshot.skipped, snapshot.errors),
            (4, 3, 1, 1)
        );
        assert_eq!(receiver.borrow().done, 4);
    }

    #[tokio::test]
    async fn test_renderer_stops_on_finish() {
        let mut tracker = ProgressTracker::new(3);
        let renderer =
            ProgressRenderer::spawn("TEST", tracker.subscribe(), Duration::from_millis(1));
        renderer.bar.set_draw_target(indicatif::ProgressDrawTarget::hidden());

        for _ in 0..3 {
            tracker.record(TaskStatus::Completed { records: 1 });
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let bar = renderer.bar.clone();
        let last = tracker.snapshot();
        tokio::time::timeout(Duration::from_secs(1), renderer.finish(&last))
            .await
            .expect("finish should return once the render task is aborted");

        assert!(bar.is_finished());
        assert_eq!(bar.position(), 3);
        // 표시 태스크가 멈춘 뒤에도 카운터는 그대로 갱신됨
        tracker.record(TaskStatus::Failed);
        assert_eq!(tracker.snapshot().errors, 1);
    }
}
