use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::time::{interval, MissedTickBehavior};

use crate::db::bookkeeping::ensure_bookkeeping;
use crate::db::DatabasePool;
use crate::error::Result;
use crate::shutdown::Shutdown;

pub mod history;
pub mod render;
pub mod sample;

pub use history::HistoryWriter;
pub use sample::{Health, Sample};

/// 모니터링 실행 옵션
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    pub interval: Duration,
    /// None 이면 종료 신호까지 반복
    pub iterations: Option<u64>,
    pub plain: bool,
    pub record_history: bool,
    pub top_tables: i64,
}

/// pg_stat_* 주기적 폴링 대시보드
pub struct Monitor {
    pool: Arc<DatabasePool>,
    schema: String,
}

impl Monitor {
    pub fn new(pool: Arc<DatabasePool>, schema: &str) -> Self {
        Self {
            pool,
            schema: schema.to_string(),
        }
    }

    /// 한 번 샘플링
    pub async fn sample(&self, top_tables: i64) -> Result<Sample> {
        let client = self.pool.get_client_with_retry().await?;
        Sample::collect(&**client, &self.schema, top_tables).await
    }

    /// 종료 신호 또는 반복 횟수 소진까지 폴링 - 수집한 샘플 수 반환
    pub async fn run(&self, options: MonitorOptions, mut shutdown: Shutdown) -> Result<u64> {
        let history = if options.record_history {
            let client = self.pool.get_client_with_retry().await?;
            ensure_bookkeeping(&**client, &self.schema).await?;
            Some(HistoryWriter::spawn(self.pool.clone(), &self.schema))
        } else {
            None
        };

        info!(
            "모니터링 시작: 주기 {}, 이력 기록 {}",
            humantime::format_duration(options.interval),
            if history.is_some() { "사용" } else { "미사용" }
        );

        let mut ticker = interval(options.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut collected = 0u64;

        let result = loop {
            if options.iterations.is_some_and(|limit| collected >= limit) {
                break Ok(());
            }

            tokio::select! {
                _ = shutdown.triggered() => {
                    info!("모니터링 중단 요청");
                    break Ok(());
                }
                _ = ticker.tick() => {}
            }

            let sample = match self.sample(options.top_tables).await {
                Ok(sample) => sample,
                Err(e) if e.is_retryable() => {
                    warn!("샘플 수집 실패, 다음 주기에 다시 시도: {}", e);
                    continue;
                }
                Err(e) => break Err(e),
            };
            collected += 1;

            if options.plain {
                for line in render::plain_lines(&sample) {
                    info!("{}", line);
                }
            } else if let Err(e) = render::draw(&sample, &self.schema) {
                error!("대시보드 출력 실패: {}", e);
            }

            if let Some(history) = &history {
                history.record(sample.metric_rows());
            }
            debug!("샘플 {} 수집 완료", collected);
        };

        if let Some(history) = history {
            history.shutdown().await;
        }
        info!("모니터링 종료: 샘플 {} 개", collected);
        result.map(|()| collected)
    }
}
