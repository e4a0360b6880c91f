use std::future::Future;
use std::mem;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::sample::MetricRow;
use crate::constants::bookkeeping::INSERT_MONITORING_SAMPLE;
use crate::constants::{with_schema, HISTORY_BATCH_SIZE, HISTORY_CHANNEL_SIZE, HISTORY_FLUSH_INTERVAL_MS};
use crate::db::DatabasePool;
use crate::error::Result;

/// 모니터링 이력 배치
#[derive(Debug)]
pub struct HistoryBatch {
    rows: Vec<MetricRow>,
    limit: usize,
}

impl HistoryBatch {
    pub fn new(limit: usize) -> Self {
        Self {
            rows: Vec::with_capacity(limit),
            limit: limit.max(1),
        }
    }

    /// 배치에 행 추가 - 플러시가 필요하면 true
    pub fn extend(&mut self, rows: Vec<MetricRow>) -> bool {
        self.rows.extend(rows);
        self.should_flush()
    }

    pub fn should_flush(&self) -> bool {
        self.rows.len() >= self.limit
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn count(&self) -> usize {
        self.rows.len()
    }

    /// 쌓인 행을 꺼내고 배치 비우기
    pub fn take(&mut self) -> Vec<MetricRow> {
        mem::take(&mut self.rows)
    }
}

/// 이력 행을 받아 저장하는 곳
pub trait HistorySink: Send + Sync + 'static {
    fn write(&self, rows: Vec<MetricRow>) -> impl Future<Output = Result<()>> + Send;
}

/// {schema}.monitoring_history 테이블
pub struct TableSink {
    pool: Arc<DatabasePool>,
    insert_sql: String,
}

impl TableSink {
    pub fn new(pool: Arc<DatabasePool>, schema: &str) -> Self {
        Self {
            pool,
            insert_sql: with_schema(INSERT_MONITORING_SAMPLE, schema),
        }
    }
}

impl HistorySink for TableSink {
    async fn write(&self, rows: Vec<MetricRow>) -> Result<()> {
        let mut client = self.pool.get_client().await?;
        let tx = client.transaction().await?;
        let statement = tx.prepare(&self.insert_sql).await?;
        for row in &rows {
            tx.execute(&statement, &[&row.sampled_at, &row.metric, &row.subject, &row.value])
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

/// 모니터링 샘플을 백그라운드에서 monitoring_history 에 기록
pub struct HistoryWriter {
    sender: Sender<Vec<MetricRow>>,
    handle: JoinHandle<()>,
}

impl HistoryWriter {
    /// 기록 워커 시작
    pub fn spawn(pool: Arc<DatabasePool>, schema: &str) -> Self {
        Self::spawn_with(
            TableSink::new(pool, schema),
            HISTORY_BATCH_SIZE,
            Duration::from_millis(HISTORY_FLUSH_INTERVAL_MS),
        )
    }

    pub fn spawn_with<S: HistorySink>(sink: S, batch_size: usize, flush_interval: Duration) -> Self {
        let (sender, receiver) = mpsc::channel(HISTORY_CHANNEL_SIZE);
        let handle = tokio::spawn(async move {
            worker_task(receiver, sink, batch_size, flush_interval).await;
        });
        debug!("모니터링 이력 워커 시작 (배치 {}, 주기 {:?})", batch_size, flush_interval);
        Self { sender, handle }
    }

    /// 샘플 전달 - 채널이 가득 차면 버림
    pub fn record(&self, rows: Vec<MetricRow>) {
        match self.sender.try_send(rows) {
            Ok(()) => {}
            Err(TrySendError::Full(rows)) => {
                warn!("모니터링 이력 채널이 가득 차 {} 개 행을 버립니다", rows.len());
            }
            Err(TrySendError::Closed(_)) => {
                error!("모니터링 이력 워커가 종료되어 기록할 수 없습니다");
            }
        }
    }

    /// 남은 배치를 기록하고 워커 종료
    pub async fn shutdown(self) {
        drop(self.sender);
        if let Err(e) = self.handle.await {
            error!("모니터링 이력 워커 종료 실패: {}", e);
        }
    }
}

async fn worker_task<S: HistorySink>(
    mut receiver: Receiver<Vec<MetricRow>>,
    sink: S,
    batch_size: usize,
    flush_interval: Duration,
) {
    let mut batch = HistoryBatch::new(batch_size);
    // 첫 플러시는 한 주기 뒤
    let flush_interval = flush_interval.max(Duration::from_millis(1));
    let mut ticker = interval_at(Instant::now() + flush_interval, flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            message = receiver.recv() => match message {
                Some(rows) => {
                    if batch.extend(rows) {
                        flush(&sink, &mut batch).await;
                    }
                }
                None => break,
            },
            _ = ticker.tick() => {
                if !batch.is_empty() {
                    flush(&sink, &mut batch).await;
                }
            }
        }
    }

    if !batch.is_empty() {
        flush(&sink, &mut batch).await;
    }
    info!("모니터링 이력 워커 종료");
}

/// 배치 기록 - 실패해도 모니터링은 계속
async fn flush<S: HistorySink>(sink: &S, batch: &mut HistoryBatch) {
    let rows = batch.take();
    let count = rows.len();
    match sink.write(rows).await {
        Ok(()) => debug!("모니터링 이력 {} 개 행 기록", count),
        Err(e) => error!("모니터링 이력 기록 실패 ({} 개 행 버림): {}", count, e),
    }
}
