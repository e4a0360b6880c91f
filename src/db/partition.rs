use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Datelike, Duration, Local, Months, NaiveDate, NaiveDateTime};
use log::{debug, error, info, warn};
use tokio_postgres::GenericClient;

use super::bookkeeping::ensure_bookkeeping;
use super::config::PartitionConfig;
use super::pool::{DatabasePool, PooledClient};
use crate::constants::partition::*;
use crate::constants::{with_schema, PARTITION_ENSURE_TIMEOUT_SECS};
use crate::error::{ReviewDbError, Result};
use crate::shutdown::Shutdown;

/// 월 단위 파티션 정의
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSpec {
    pub table: String,
    pub name: String,
    pub range_start: NaiveDate,
    pub range_end: NaiveDate,
}

impl PartitionSpec {
    pub fn for_month(table: &str, month: NaiveDate) -> Self {
        let range_start = month_start(month);
        Self {
            table: table.to_string(),
            name: partition_name(table, range_start),
            range_start,
            range_end: add_months(range_start, 1),
        }
    }
}

/// 데이터베이스에 존재하는 파티션
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionInfo {
    pub table: String,
    pub name: String,
    /// 이름 형식이 맞지 않으면 None
    pub month: Option<NaiveDate>,
}

/// 해당 월의 1일
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.day0()))
}

/// 월 단위 이동 (음수면 과거)
pub fn add_months(date: NaiveDate, months: i32) -> NaiveDate {
    let shifted = if months >= 0 {
        date.checked_add_months(Months::new(months.unsigned_abs()))
    } else {
        date.checked_sub_months(Months::new(months.unsigned_abs()))
    };
    shifted.unwrap_or(if months >= 0 { NaiveDate::MAX } else { NaiveDate::MIN })
}

/// 파티션 이름 생성 (table_yYYYYmMM)
pub fn partition_name(table: &str, month: NaiveDate) -> String {
    format!("{}_y{:04}m{:02}", table, month.year(), month.month())
}

/// 파티션 이름에서 월 추출
pub fn parse_partition_month(table: &str, name: &str) -> Option<NaiveDate> {
    let suffix = name.strip_prefix(table)?.strip_prefix("_y")?;
    let (year, month) = suffix.split_once('m')?;
    if year.len() != 4 || month.len() != 2 {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)
}

/// 첫 달부터 count 개월의 파티션 계획
pub fn plan_months(table: &str, first_month: NaiveDate, count: u32) -> Vec<PartitionSpec> {
    let first = month_start(first_month);
    (0..count)
        .map(|i| PartitionSpec::for_month(table, add_months(first, i as i32)))
        .collect()
}

/// 이 날짜 이전에 끝나는 파티션은 보존 기간이 지난 것
pub fn retention_cutoff(today: NaiveDate, retention_months: u32) -> Option<NaiveDate> {
    if retention_months == 0 {
        return None;
    }
    Some(add_months(month_start(today), -(retention_months.min(i32::MAX as u32) as i32)))
}

/// 파티션 관리자 구조체
pub struct PartitionManager {
    pool: Arc<DatabasePool>,
    schema: String,
    config: PartitionConfig,
}

impl PartitionManager {
    /// 새 PartitionManager 인스턴스 생성
    pub fn new(pool: Arc<DatabasePool>, schema: &str, config: PartitionConfig) -> Self {
        Self {
            pool,
            schema: schema.to_string(),
            config,
        }
    }

    /// 오늘 기준 현재 월과 미래 파티션 생성
    pub async fn ensure(&self, today: NaiveDate) -> Result<Vec<String>> {
        let months = self.config.future_partitions.saturating_add(1);
        info!("테이블별 파티션 생성 (이번 달 및 미래 {} 개월분)", self.config.future_partitions);
        self.ensure_months(month_start(today), months).await
    }

    /// 지정한 월 범위의 파티션 생성
    pub async fn ensure_months(&self, first_month: NaiveDate, count: u32) -> Result<Vec<String>> {
        let mut client = self.pool.get_client_with_retry().await?;
        ensure_bookkeeping(&**client, &self.schema).await?;

        let mut created = Vec::new();
        for table in &self.config.tables {
            if !self.is_partitioned(&**client, table).await? {
                warn!("{}.{} 는 파티션 테이블이 아니므로 건너뜁니다", self.schema, table);
                continue;
            }

            let mut table_created = 0;
            for spec in plan_months(table, first_month, count) {
                if self.partition_exists(&**client, &spec.name).await? {
                    debug!("파티션이 이미 존재함: {}", spec.name);
                    continue;
                }

                // 타임아웃 설정으로 파티션 생성
                let timeout = StdDuration::from_secs(self.config.create_timeout_seconds);
                match tokio::time::timeout(timeout, self.create_partition(&mut client, &spec)).await {
                    Ok(Ok(())) => {
                        table_created += 1;
                        created.push(spec.name);
                    }
                    Ok(Err(e)) => {
                        error!("파티션 생성 실패 - {}: {}", spec.name, e);
                    }
                    Err(_) => {
                        error!("파티션 생성 타임아웃 - {}", spec.name);
                    }
                }
            }
            info!("테이블 {} 에 대해 {} 개의 파티션 생성됨", table, table_created);
        }

        Ok(created)
    }

    /// 보존 기간이 지난 파티션 삭제
    pub async fn prune(&self, today: NaiveDate) -> Result<Vec<String>> {
        let Some(cutoff) = retention_cutoff(today, self.config.retention_months) else {
            info!("보존 기간이 0 이므로 파티션을 삭제하지 않습니다");
            return Ok(Vec::new());
        };

        let mut client = self.pool.get_client_with_retry().await?;
        ensure_bookkeeping(&**client, &self.schema).await?;

        let mut dropped = Vec::new();
        for info in self.list_with(&**client).await? {
            let Some(month) = info.month else {
                continue;
            };
            if add_months(month, 1) > cutoff {
                continue;
            }

            match self.drop_partition(&mut client, &info.name).await {
                Ok(()) => {
                    info!("오래된 파티션 삭제: {}", info.name);
                    dropped.push(info.name);
                }
                Err(e) => {
                    error!("파티션 삭제 실패 - {}: {}", info.name, e);
                }
            }
        }

        info!("{} 개의 오래된 파티션 삭제됨 (기준일 {})", dropped.len(), cutoff);
        Ok(dropped)
    }

    /// 설정된 모든 부모 테이블의 파티션 목록
    pub async fn list(&self) -> Result<Vec<PartitionInfo>> {
        let client = self.pool.get_client_with_retry().await?;
        self.list_with(&**client).await
    }

    /// 계획상 있어야 하지만 없는 파티션 (파티션 테이블인 부모만)
    pub async fn coverage_gaps(&self, today: NaiveDate) -> Result<Vec<PartitionSpec>> {
        let client = self.pool.get_client_with_retry().await?;
        let existing = self.list_with(&**client).await?;
        let months = self.config.future_partitions.saturating_add(1);

        let mut gaps = Vec::new();
        for table in &self.config.tables {
            if !self.is_partitioned(&**client, table).await? {
                continue;
            }
            gaps.extend(
                plan_months(table, today, months)
                    .into_iter()
                    .filter(|spec| !existing.iter().any(|info| info.name == spec.name)),
            );
        }
        Ok(gaps)
    }

    async fn list_with<C: GenericClient>(&self, client: &C) -> Result<Vec<PartitionInfo>> {
        let mut partitions = Vec::new();
        for table in &self.config.tables {
            let rows = client.query(LIST_PARTITIONS, &[&self.schema, table]).await?;
            for row in rows {
                let name: String = row.get(0);
                partitions.push(PartitionInfo {
                    table: table.clone(),
                    month: parse_partition_month(table, &name),
                    name,
                });
            }
        }
        Ok(partitions)
    }

    async fn is_partitioned<C: GenericClient>(&self, client: &C, table: &str) -> Result<bool> {
        let row = client
            .query_one(CHECK_PARTITIONED_TABLE, &[&self.schema, &table])
            .await?;
        Ok(row.get(0))
    }

    /// 파티션이 존재하는지 확인
    async fn partition_exists<C: GenericClient>(&self, client: &C, name: &str) -> Result<bool> {
        let row = client
            .query_one(CHECK_PARTITION_EXISTS, &[&self.schema, &name])
            .await?;
        Ok(row.get(0))
    }

    /// 단일 파티션 생성 및 기록 - 한 트랜잭션
    async fn create_partition(&self, client: &mut PooledClient, spec: &PartitionSpec) -> Result<()> {
        let create_sql = with_schema(CREATE_MONTHLY_PARTITION, &self.schema)
            .replace("{partition}", &spec.name)
            .replace("{parent}", &spec.table)
            .replace("{from}", &spec.range_start.to_string())
            .replace("{to}", &spec.range_end.to_string());

        let tx = client.transaction().await?;
        tx.batch_execute(&create_sql).await?;
        tx.execute(
            &with_schema(RECORD_PARTITION_CREATED, &self.schema),
            &[&spec.name, &spec.table, &spec.range_start, &spec.range_end],
        )
        .await?;
        tx.commit().await?;

        debug!("파티션 생성 완료: {}", spec.name);
        Ok(())
    }

    /// 단일 파티션 삭제 및 dropped_at 기록 - 한 트랜잭션
    async fn drop_partition(&self, client: &mut PooledClient, name: &str) -> Result<()> {
        let drop_sql = with_schema(DROP_PARTITION, &self.schema).replace("{partition}", name);

        let tx = client.transaction().await?;
        tx.batch_execute(&drop_sql).await?;
        tx.execute(&with_schema(RECORD_PARTITION_DROPPED, &self.schema), &[&name])
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// 매일 자정 직후 파티션 생성/정리를 반복 - 종료 신호까지 실행
    pub async fn run_scheduler(&self, mut shutdown: Shutdown) -> Result<()> {
        info!("파티션 자동 관리 스케줄러 시작");
        self.maintain(Local::now().date_naive()).await;

        loop {
            let now = Local::now().naive_local();
            let next_run = next_maintenance_time(now);
            let wait = (next_run - now).to_std().unwrap_or(StdDuration::from_secs(60));

            debug!(
                "다음 파티션 관리 스케줄: {} 후 ({})",
                humantime::format_duration(StdDuration::from_secs(wait.as_secs())),
                next_run
            );

            tokio::select! {
                _ = shutdown.triggered() => {
                    info!("파티션 자동 관리 스케줄러 종료");
                    return Ok(());
                }
                _ = tokio::time::sleep(wait) => {}
            }

            self.maintain(Local::now().date_naive()).await;
        }
    }

    async fn maintain(&self, today: NaiveDate) {
        let limit = StdDuration::from_secs(PARTITION_ENSURE_TIMEOUT_SECS);
        let ensured = match tokio::time::timeout(limit, self.ensure(today)).await {
            Ok(result) => result,
            Err(_) => Err(ReviewDbError::Timeout(format!(
                "파티션 생성 작업이 {} 안에 끝나지 않음",
                humantime::format_duration(limit)
            ))),
        };
        match ensured {
            Ok(created) if !created.is_empty() => info!("파티션 {} 개 생성 완료", created.len()),
            Ok(_) => {}
            Err(e) => error!("파티션 생성 작업 실패: {}", e),
        }
        if let Err(e) = self.prune(today).await {
            error!("파티션 정리 작업 실패: {}", e);
        }
    }
}

/// 다음 관리 작업 시각 (다음 날 00:05)
pub fn next_maintenance_time(now: NaiveDateTime) -> NaiveDateTime {
    let tomorrow = now.date() + Duration::days(1);
    tomorrow.and_hms_opt(0, 5, 0).unwrap_or(now + Duration::days(1))
}
