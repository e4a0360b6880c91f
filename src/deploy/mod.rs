use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::DeployConfig;
use crate::db::bookkeeping::{drop_schema, ensure_bookkeeping, record_deployment};
use crate::db::{DatabasePool, FileOutcome, QueryExecutor, SqlFile};
use crate::error::{ReviewDbError, Result};
use crate::metrics::RunMetrics;

/// 디렉토리 기준으로 실행할 SQL 파일 목록 확정
///
/// 이름을 지정하면 그 순서를 따르고, 비어 있으면 디렉토리의 `*.sql` 파일을 이름순으로 사용한다.
/// 지정한 파일 중 하나라도 없으면 아무것도 실행하지 않고 에러를 반환한다.
pub fn resolve_sql_files(dir: &Path, names: &[String]) -> Result<Vec<PathBuf>> {
    if names.is_empty() {
        let entries = fs::read_dir(dir).map_err(|e| ReviewDbError::io(dir, e))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| ReviewDbError::io(dir, e))?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "sql") {
                files.push(path);
            }
        }
        files.sort();
        return Ok(files);
    }

    let files: Vec<PathBuf> = names.iter().map(|name| dir.join(name)).collect();
    let missing: Vec<String> = files
        .iter()
        .filter(|path| !path.is_file())
        .map(|path| path.display().to_string())
        .collect();

    if !missing.is_empty() {
        return Err(ReviewDbError::Config(format!(
            "SQL 파일을 찾을 수 없습니다: {}",
            missing.join(", ")
        )));
    }
    Ok(files)
}

/// 배포 대상 파일 목록
#[derive(Debug, Clone)]
pub struct DeployPlan {
    pub files: Vec<PathBuf>,
}

impl DeployPlan {
    pub fn from_config(config: &DeployConfig) -> Result<Self> {
        let files = resolve_sql_files(&config.sql_dir, &config.files)?;
        debug!("배포 계획: {} 개 파일 ({})", files.len(), config.sql_dir.display());
        Ok(Self { files })
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// 파일 내용을 모두 읽어 둠 - 하나라도 읽지 못하면 실행 전에 실패
    pub fn load(&self) -> Result<Vec<SqlFile>> {
        self.files.iter().map(SqlFile::load).collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeployOptions {
    /// 배포 전에 스키마를 삭제
    pub force: bool,
    pub continue_on_error: bool,
}

/// 배포 결과
#[derive(Debug)]
pub struct DeployReport {
    pub run_id: Uuid,
    pub outcomes: Vec<FileOutcome>,
    /// 앞선 실패로 실행하지 않은 파일
    pub skipped: Vec<String>,
}

impl DeployReport {
    pub fn succeeded(&self) -> bool {
        self.skipped.is_empty() && self.outcomes.iter().all(FileOutcome::succeeded)
    }

    pub fn applied(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.applied()
    }

    pub fn log_summary(&self) {
        for outcome in &self.outcomes {
            match outcome.error_message() {
                None => info!(
                    "  [적용] {} ({} 문장, {})",
                    outcome.name,
                    outcome.statements,
                    humantime::format_duration(round_ms(outcome.duration))
                ),
                Some(message) => error!("  [실패] {}: {}", outcome.name, message),
            }
        }
        for name in &self.skipped {
            warn!("  [건너뜀] {}", name);
        }
        info!(
            "배포 {} - 적용 {} / 실패 {} / 건너뜀 {} (run_id {})",
            if self.succeeded() { "완료" } else { "실패" },
            self.applied(),
            self.failed(),
            self.skipped.len(),
            self.run_id
        );
    }
}

fn round_ms(duration: std::time::Duration) -> std::time::Duration {
    std::time::Duration::from_millis(duration.as_millis() as u64)
}

/// 파일 하나를 실행 - 일시적인 에러로 롤백되면 백오프 후 다시 실행
pub async fn run_file(
    pool: &DatabasePool,
    executor: &QueryExecutor,
    file: &SqlFile,
    metrics: &RunMetrics,
) -> Result<FileOutcome> {
    let policy = pool.retry_policy();
    let mut attempt = 1;
    loop {
        let mut client = pool.get_client_with_retry().await?;
        let outcome = executor.execute_file(&mut client, file).await;
        drop(client);

        if !outcome.is_retryable() || attempt >= policy.max_attempts {
            return Ok(outcome);
        }

        let delay = policy.delay_for(attempt);
        warn!(
            "{}: 일시적인 에러로 롤백됨, {} 후 재실행 ({}/{})",
            file.name,
            humantime::format_duration(delay),
            attempt,
            policy.max_attempts
        );
        metrics.retried();
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// 스키마 배포 담당
pub struct Deployer {
    pool: Arc<DatabasePool>,
    schema: String,
    executor: QueryExecutor,
    metrics: Arc<RunMetrics>,
}

impl Deployer {
    pub fn new(
        pool: Arc<DatabasePool>,
        schema: &str,
        executor: QueryExecutor,
        metrics: Arc<RunMetrics>,
    ) -> Self {
        Self {
            pool,
            schema: schema.to_string(),
            executor,
            metrics,
        }
    }

    /// 스키마 삭제 - force 없이는 거부
    pub async fn reset(&self, force: bool) -> Result<()> {
        if !force {
            return Err(ReviewDbError::Config(format!(
                "스키마 {} 를 삭제하려면 --force 가 필요합니다",
                self.schema
            )));
        }

        warn!("스키마 {} 와 포함된 모든 객체를 삭제합니다", self.schema);
        let client = self.pool.get_client_with_retry().await?;
        drop_schema(&**client, &self.schema).await
    }

    /// 계획된 파일을 순서대로 적용하고 결과를 deployment_history 에 기록
    pub async fn deploy(&self, plan: &DeployPlan, options: DeployOptions) -> Result<DeployReport> {
        let files = plan.load()?;

        if options.force {
            self.reset(true).await?;
        }

        {
            let client = self.pool.get_client_with_retry().await?;
            ensure_bookkeeping(&**client, &self.schema).await?;
        }

        let run_id = Uuid::new_v4();
        info!("배포 시작: {} 개 파일 (run_id {})", files.len(), run_id);
        if files.is_empty() {
            warn!("배포할 SQL 파일이 없습니다");
        }

        let mut outcomes = Vec::with_capacity(files.len());
        let mut skipped = Vec::new();

        for (index, file) in files.iter().enumerate() {
            let outcome = run_file(&self.pool, &self.executor, file, &self.metrics).await?;
            self.metrics
                .file_finished(outcome.succeeded(), outcome.statements);

            let client = self.pool.get_client_with_retry().await?;
            record_deployment(&**client, &self.schema, run_id, &outcome).await?;

            let failed = !outcome.succeeded();
            if !failed {
                info!("적용 완료: {} ({} 문장)", outcome.name, outcome.statements);
            }
            outcomes.push(outcome);

            if failed && !options.continue_on_error {
                skipped = files[index + 1..].iter().map(|f| f.name.clone()).collect();
                if !skipped.is_empty() {
                    warn!("실패로 인해 남은 {} 개 파일을 건너뜁니다", skipped.len());
                }
                break;
            }
        }

        Ok(DeployReport {
            run_id,
            outcomes,
            skipped,
        })
    }
}
