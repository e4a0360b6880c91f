use std::path::PathBuf;
use std::sync::Arc;

use log::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::db::bookkeeping::{
    ensure_bookkeeping, latest_test_run, record_test_result, test_results_exist,
};
use crate::db::{DatabasePool, QueryExecutor, SqlFile};
use crate::deploy::{resolve_sql_files, run_file, DeployOptions, DeployPlan, Deployer};
use crate::error::{ReviewDbError, Result};
use crate::metrics::RunMetrics;

pub mod report;

pub use report::TestReport;

/// SQL 테스트 파일 실행기
pub struct TestSuite {
    pool: Arc<DatabasePool>,
    config: Config,
    files: Vec<PathBuf>,
    executor: QueryExecutor,
    metrics: Arc<RunMetrics>,
}

impl TestSuite {
    pub fn from_config(
        pool: Arc<DatabasePool>,
        config: &Config,
        metrics: Arc<RunMetrics>,
    ) -> Result<Self> {
        let files = resolve_sql_files(&config.deploy.test_dir, &config.deploy.test_files)?;
        let executor = QueryExecutor::new(
            config.deploy.mode.into(),
            config.database.connection.statement_timeout(),
        );
        Ok(Self {
            pool,
            config: config.clone(),
            files,
            executor,
            metrics,
        })
    }

    /// 테스트 실행 - skip_deploy 가 아니면 먼저 배포하고, 배포가 실패하면 중단
    pub async fn run(&self, skip_deploy: bool) -> Result<TestReport> {
        let files = self
            .files
            .iter()
            .map(SqlFile::load)
            .collect::<Result<Vec<_>>>()?;
        let schema = &self.config.schema;

        if !skip_deploy {
            let plan = DeployPlan::from_config(&self.config.deploy)?;
            let deployer = Deployer::new(
                self.pool.clone(),
                schema,
                self.executor.clone(),
                self.metrics.clone(),
            );
            let deployment = deployer.deploy(&plan, DeployOptions::default()).await?;
            deployment.log_summary();
            if !deployment.succeeded() {
                return Err(ReviewDbError::Aborted(format!(
                    "배포 실패로 테스트를 실행하지 않습니다 (run_id {})",
                    deployment.run_id
                )));
            }
        }

        {
            let client = self.pool.get_client_with_retry().await?;
            ensure_bookkeeping(&**client, schema).await?;
        }

        let run_id = Uuid::new_v4();
        info!("테스트 시작: {} 개 파일 (run_id {})", files.len(), run_id);
        if files.is_empty() {
            warn!("실행할 테스트 파일이 없습니다");
            return Ok(TestReport::empty(run_id));
        }

        for file in &files {
            let outcome = run_file(&self.pool, &self.executor, file, &self.metrics).await?;
            let passed = outcome.succeeded();
            self.metrics.test_finished(passed);

            match outcome.error_message() {
                None => info!("[PASS] {}", outcome.name),
                Some(message) => error!("[FAIL] {}: {}", outcome.name, message),
            }

            let client = self.pool.get_client_with_retry().await?;
            record_test_result(&**client, schema, run_id, &outcome).await?;
        }

        load_report(&self.pool, schema, Some(run_id)).await
    }
}

/// 저장된 테스트 결과 조회 - run_id 가 없으면 가장 최근 실행
///
/// 읽기 전용: 기록 테이블이 없으면 만들지 않고 설정 오류를 반환
pub async fn load_report(
    pool: &DatabasePool,
    schema: &str,
    run_id: Option<Uuid>,
) -> Result<TestReport> {
    let client = pool.get_client_with_retry().await?;
    if !test_results_exist(&**client, schema).await? {
        return Err(ReviewDbError::Config(format!(
            "{}.test_results 테이블이 없습니다. 먼저 test 를 실행하세요",
            schema
        )));
    }

    let run_id = match run_id {
        Some(id) => id,
        None => latest_test_run(&**client, schema)
            .await?
            .ok_or_else(|| ReviewDbError::Config("저장된 테스트 결과가 없습니다".into()))?,
    };

    let report = TestReport::load(&**client, schema, run_id).await?;
    if report.total == 0 {
        return Err(ReviewDbError::Config(format!(
            "run_id {} 에 해당하는 테스트 결과가 없습니다",
            run_id
        )));
    }
    Ok(report)
}
