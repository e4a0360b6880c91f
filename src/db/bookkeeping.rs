use chrono::{DateTime, Utc};
use log::{debug, info};
use tokio_postgres::GenericClient;
use uuid::Uuid;

use super::query::FileOutcome;
use crate::constants::bookkeeping::*;
use crate::constants::with_schema;
use crate::error::Result;

/// 테스트 실행 집계
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestSummary {
    pub total: i64,
    pub passed: i64,
    pub failed: i64,
    pub duration_ms: i64,
    pub started_at: Option<DateTime<Utc>>,
}

/// 스키마와 기록 테이블 생성
pub async fn ensure_bookkeeping<C: GenericClient>(client: &C, schema: &str) -> Result<()> {
    client.batch_execute(&with_schema(CREATE_SCHEMA, schema)).await?;

    for ddl in [
        CREATE_DEPLOYMENT_HISTORY,
        CREATE_TEST_RESULTS,
        CREATE_MONITORING_HISTORY,
        CREATE_PARTITION_MANAGEMENT,
    ] {
        client.batch_execute(&with_schema(ddl, schema)).await?;
    }

    for index in CREATE_INDICES {
        client.batch_execute(&with_schema(index, schema)).await?;
    }

    debug!("기록 테이블 확인 완료: {}", schema);
    Ok(())
}

/// 테스트 결과 테이블이 이미 있는지 확인 (아무것도 만들지 않음)
pub async fn test_results_exist<C: GenericClient>(client: &C, schema: &str) -> Result<bool> {
    let row = client
        .query_one(CHECK_TEST_RESULTS_EXISTS, &[&schema])
        .await?;
    Ok(row.get(0))
}

/// 스키마 전체 삭제
pub async fn drop_schema<C: GenericClient>(client: &C, schema: &str) -> Result<()> {
    client.batch_execute(&with_schema(DROP_SCHEMA, schema)).await?;
    info!("스키마 삭제 완료: {}", schema);
    Ok(())
}

fn duration_ms(outcome: &FileOutcome) -> i64 {
    i64::try_from(outcome.duration.as_millis()).unwrap_or(i64::MAX)
}

/// 파일 배포 결과 기록
pub async fn record_deployment<C: GenericClient>(
    client: &C,
    schema: &str,
    run_id: Uuid,
    outcome: &FileOutcome,
) -> Result<()> {
    let status = if outcome.succeeded() { "applied" } else { "failed" };
    let statements = i32::try_from(outcome.statements).unwrap_or(i32::MAX);
    client
        .execute(
            &with_schema(INSERT_DEPLOYMENT, schema),
            &[
                &run_id,
                &outcome.name,
                &status,
                &statements,
                &duration_ms(outcome),
                &outcome.error_message(),
            ],
        )
        .await?;
    Ok(())
}

/// 테스트 파일 결과 기록
pub async fn record_test_result<C: GenericClient>(
    client: &C,
    schema: &str,
    run_id: Uuid,
    outcome: &FileOutcome,
) -> Result<()> {
    let status = if outcome.succeeded() { "pass" } else { "fail" };
    client
        .execute(
            &with_schema(INSERT_TEST_RESULT, schema),
            &[
                &run_id,
                &outcome.name,
                &status,
                &outcome.error_message(),
                &duration_ms(outcome),
            ],
        )
        .await?;
    Ok(())
}

/// 실행 단위 집계 조회
pub async fn test_summary<C: GenericClient>(
    client: &C,
    schema: &str,
    run_id: Uuid,
) -> Result<TestSummary> {
    let row = client
        .query_one(&with_schema(SELECT_TEST_SUMMARY, schema), &[&run_id])
        .await?;
    Ok(TestSummary {
        total: row.get(0),
        passed: row.get(1),
        failed: row.get(2),
        duration_ms: row.get(3),
        started_at: row.get(4),
    })
}

/// 실패한 테스트 이름과 에러 메시지 조회
pub async fn test_failures<C: GenericClient>(
    client: &C,
    schema: &str,
    run_id: Uuid,
) -> Result<Vec<(String, String)>> {
    let rows = client
        .query(&with_schema(SELECT_TEST_FAILURES, schema), &[&run_id])
        .await?;
    Ok(rows.iter().map(|row| (row.get(0), row.get(1))).collect())
}

/// 가장 최근 테스트 실행 ID
pub async fn latest_test_run<C: GenericClient>(client: &C, schema: &str) -> Result<Option<Uuid>> {
    let row = client
        .query_opt(&with_schema(SELECT_LATEST_TEST_RUN, schema), &[])
        .await?;
    Ok(row.map(|row| row.get(0)))
}
