use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use log::info;

/// 명령 실행 중 누적되는 카운터
#[derive(Debug)]
pub struct RunMetrics {
    files_applied: AtomicU64,
    files_failed: AtomicU64,
    statements_executed: AtomicU64,
    retries: AtomicU64,
    tests_passed: AtomicU64,
    tests_failed: AtomicU64,
    rows_inserted: AtomicU64,
    start_time: Instant,
}

/// 한 시점의 카운터 값
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub files_applied: u64,
    pub files_failed: u64,
    pub statements_executed: u64,
    pub retries: u64,
    pub tests_passed: u64,
    pub tests_failed: u64,
    pub rows_inserted: u64,
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            files_applied: AtomicU64::new(0),
            files_failed: AtomicU64::new(0),
            statements_executed: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            tests_passed: AtomicU64::new(0),
            tests_failed: AtomicU64::new(0),
            rows_inserted: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    // 파일 적용 결과 반영
    pub fn file_finished(&self, succeeded: bool, statements: usize) {
        if succeeded {
            self.files_applied.fetch_add(1, Ordering::Relaxed);
            self.statements_executed
                .fetch_add(statements as u64, Ordering::Relaxed);
        } else {
            self.files_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    // 테스트 결과 반영
    pub fn test_finished(&self, passed: bool) {
        if passed {
            self.tests_passed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.tests_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn retried(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_rows(&self, rows: u64) {
        self.rows_inserted.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    // 모든 카운터 값을 한 번에 로드
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            files_applied: self.files_applied.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
            statements_executed: self.statements_executed.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            tests_passed: self.tests_passed.load(Ordering::Relaxed),
            tests_failed: self.tests_failed.load(Ordering::Relaxed),
            rows_inserted: self.rows_inserted.load(Ordering::Relaxed),
        }
    }

    pub fn print_stats(&self) {
        let metrics = self.snapshot();
        // 초 단위로 잘라서 출력
        let elapsed = Duration::from_millis(self.elapsed().as_millis() as u64);

        info!("=== 실행 통계 ===");
        info!("소요 시간: {}", humantime::format_duration(elapsed));
        if metrics.files_applied + metrics.files_failed > 0 {
            info!(
                "SQL 파일: 성공 {} / 실패 {} (문장 {} 개)",
                metrics.files_applied, metrics.files_failed, metrics.statements_executed
            );
        }
        if metrics.tests_passed + metrics.tests_failed > 0 {
            info!("테스트: 통과 {} / 실패 {}", metrics.tests_passed, metrics.tests_failed);
        }
        if metrics.rows_inserted > 0 {
            info!("삽입된 행: {}", metrics.rows_inserted);
        }
        if metrics.retries > 0 {
            info!("재시도 횟수: {}", metrics.retries);
        }
        info!("=================");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_only_successful_statements() {
        let metrics = RunMetrics::new();
        metrics.file_finished(true, 4);
        metrics.file_finished(false, 7);
        metrics.test_finished(true);
        metrics.test_finished(false);
        metrics.test_finished(false);
        metrics.retried();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.files_applied, 1);
        assert_eq!(snapshot.files_failed, 1);
        assert_eq!(snapshot.statements_executed, 4);
        assert_eq!(snapshot.tests_passed, 1);
        assert_eq!(snapshot.tests_failed, 2);
        assert_eq!(snapshot.retries, 1);
    }
}
