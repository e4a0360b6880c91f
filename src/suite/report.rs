use chrono::{DateTime, Utc};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use tokio_postgres::GenericClient;
use uuid::Uuid;

use crate::db::bookkeeping::{test_failures, test_summary};
use crate::error::Result;

/// 한 번의 테스트 실행 결과 집계
#[derive(Debug, Clone, PartialEq)]
pub struct TestReport {
    pub run_id: Uuid,
    pub total: i64,
    pub passed: i64,
    pub failed: i64,
    pub duration_ms: i64,
    pub started_at: Option<DateTime<Utc>>,
    /// (테스트 이름, 에러 메시지)
    pub failures: Vec<(String, String)>,
}

impl TestReport {
    /// test_results 테이블에서 집계
    pub async fn load<C: GenericClient>(client: &C, schema: &str, run_id: Uuid) -> Result<Self> {
        let summary = test_summary(client, schema, run_id).await?;
        let failures = test_failures(client, schema, run_id).await?;
        Ok(Self {
            run_id,
            total: summary.total,
            passed: summary.passed,
            failed: summary.failed,
            duration_ms: summary.duration_ms,
            started_at: summary.started_at,
            failures,
        })
    }

    pub fn empty(run_id: Uuid) -> Self {
        Self {
            run_id,
            total: 0,
            passed: 0,
            failed: 0,
            duration_ms: 0,
            started_at: None,
            failures: Vec::new(),
        }
    }

    /// 통과율 (%) - 테스트가 없으면 0
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.passed as f64 * 100.0 / self.total as f64
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    /// 터미널 출력용 표
    pub fn render(&self) -> String {
        let mut summary = Table::new();
        summary
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["run_id", "started", "total", "passed", "failed", "pass rate", "duration"]);

        let started = self
            .started_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        let failed_color = if self.failed > 0 { Color::Red } else { Color::Green };
        summary.add_row(vec![
            Cell::new(self.run_id),
            Cell::new(started),
            Cell::new(self.total),
            Cell::new(self.passed).fg(Color::Green),
            Cell::new(self.failed).fg(failed_color),
            Cell::new(format!("{:.1}%", self.pass_rate())),
            Cell::new(format!("{} ms", self.duration_ms)),
        ]);

        if self.failures.is_empty() {
            return summary.to_string();
        }

        let mut failures = Table::new();
        failures
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["failed test", "error"]);
        for (name, message) in &self.failures {
            failures.add_row(vec![Cell::new(name).fg(Color::Red), Cell::new(message)]);
        }

        format!("{}\n{}", summary, failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(passed: i64, failed: i64) -> TestReport {
        TestReport {
            run_id: Uuid::nil(),
            total: passed + failed,
            passed,
            failed,
            duration_ms: 120,
            started_at: None,
            failures: (0..failed)
                .map(|i| (format!("test_{}.sql", i), "line 3: boom".to_string()))
                .collect(),
        }
    }

    #[test]
    fn pass_rate_handles_empty_run() {
        assert_eq!(report(0, 0).pass_rate(), 0.0);
        assert_eq!(report(3, 1).pass_rate(), 75.0);
        assert!(report(2, 0).all_passed());
        assert!(!report(2, 1).all_passed());
    }

    #[test]
    fn render_lists_failures() {
        let text = report(1, 2).render();
        assert!(text.contains("test_0.sql"));
        assert!(text.contains("test_1.sql"));
        assert!(text.contains("33.3%"));

        let clean = report(4, 0).render();
        assert!(!clean.contains("failed test"));
        assert!(clean.contains("100.0%"));
    }
}
