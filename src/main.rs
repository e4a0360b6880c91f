use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
#[cfg(debug_assertions)]
use std::io::Write;

use chrono::{Local, Utc};
use clap::{ArgAction, Parser, Subcommand};
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use env_logger::Builder;
use log::{error, info, warn, LevelFilter};
use uuid::Uuid;

use reviewdb::config::Config;
use reviewdb::db::partition::PartitionManager;
use reviewdb::db::{DatabasePool, QueryExecutor};
use reviewdb::deploy::{DeployOptions, DeployPlan, Deployer};
use reviewdb::metrics::RunMetrics;
use reviewdb::monitor::{Monitor, MonitorOptions};
use reviewdb::seed::Seeder;
use reviewdb::shutdown::Shutdown;
use reviewdb::suite::{load_report, TestSuite};
use reviewdb::{ReviewDbError, Result, Settings};

#[derive(Parser, Debug)]
#[command(name = "reviewdb", version, about = "review_system PostgreSQL 스키마 관리 도구")]
struct Cli {
    /// 설정 파일 경로 (기본: REVIEWDB_CONFIG 또는 ./reviewdb.yml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// 대상 스키마
    #[arg(long, global = true, env = "REVIEWDB_SCHEMA")]
    schema: Option<String>,

    /// 로그 상세도 (-v: debug, -vv: trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 연결, 파티션, 최근 테스트 결과 확인
    Status,
    /// SQL 파일을 순서대로 배포
    Deploy {
        /// 배포 전에 스키마 삭제
        #[arg(long)]
        force: bool,
        /// 실패한 파일이 있어도 나머지 파일 계속 실행
        #[arg(long)]
        continue_on_error: bool,
    },
    /// 스키마 삭제
    Reset {
        #[arg(long)]
        force: bool,
    },
    /// 테스트 SQL 실행 및 결과 기록
    Test {
        /// 배포 없이 테스트만 실행
        #[arg(long)]
        skip_deploy: bool,
    },
    /// 저장된 테스트 결과 출력
    Report {
        /// 조회할 실행 ID (기본: 가장 최근)
        #[arg(long)]
        run_id: Option<Uuid>,
    },
    /// 샘플 리뷰/답글 데이터 삽입
    Seed {
        #[arg(long)]
        reviews: Option<u32>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// 월 단위 파티션 관리
    Partitions {
        #[command(subcommand)]
        action: PartitionAction,
    },
    /// 실시간 모니터링 대시보드
    Monitor {
        /// 폴링 주기 (초)
        #[arg(long)]
        interval: Option<u64>,
        /// 지정한 횟수만큼 수집 후 종료
        #[arg(long)]
        iterations: Option<u64>,
        /// 화면 대신 로그 출력
        #[arg(long)]
        plain: bool,
        /// monitoring_history 기록 안 함
        #[arg(long)]
        no_history: bool,
    },
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum PartitionAction {
    /// 이번 달과 미래 파티션 생성
    Ensure,
    /// 보존 기간이 지난 파티션 삭제
    Prune,
    /// 파티션 목록
    List,
    /// 매일 생성/정리를 반복 (종료 신호까지)
    Watch,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logger(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            exit_code_for(&e)
        }
    }
}

/// 설정/연결 문제는 2, 나머지 실패는 1
fn exit_code_for(error: &ReviewDbError) -> ExitCode {
    match error {
        ReviewDbError::Config(_)
        | ReviewDbError::Io { .. }
        | ReviewDbError::Connection(_)
        | ReviewDbError::PoolTimeout => ExitCode::from(2),
        _ => ExitCode::from(1),
    }
}

fn success_code(succeeded: bool) -> ExitCode {
    if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

/// 로거 설정 - RUST_LOG 가 있으면 우선
fn setup_logger(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = Builder::new();
    builder
        .filter(None, LevelFilter::Warn)
        .filter(Some("reviewdb"), level);

    #[cfg(debug_assertions)]
    builder.format(|buf, record| {
        writeln!(
            buf,
            "[{} {} {}:{}] {}",
            Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
            record.level(),
            record.file().unwrap_or("unknown"),
            record.line().unwrap_or(0),
            record.args()
        )
    });

    builder.parse_default_env().init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(schema) = &cli.schema {
        settings.override_schema(schema)?;
    }
    settings.log_settings();

    let mut config = settings.config;
    apply_overrides(&mut config, &cli.command)?;

    let metrics = Arc::new(RunMetrics::new());
    let pool = DatabasePool::connect_with_metrics(&config.database, metrics.clone()).await?;

    let result = execute(&cli.command, &config, pool.clone(), metrics.clone()).await;

    pool.close();
    metrics.print_stats();
    result
}

/// 명령행 옵션으로 설정 값 덮어쓰기
fn apply_overrides(config: &mut Config, command: &Command) -> Result<()> {
    match command {
        Command::Deploy {
            continue_on_error: true,
            ..
        } => config.deploy.continue_on_error = true,
        Command::Seed { reviews, seed } => {
            if let Some(reviews) = reviews {
                config.seed.reviews = *reviews;
            }
            if let Some(seed) = seed {
                config.seed.seed = *seed;
            }
        }
        Command::Monitor {
            interval: Some(interval),
            ..
        } => config.monitor.interval_seconds = *interval,
        _ => {}
    }
    config.validate()
}

fn executor_for(config: &Config) -> QueryExecutor {
    QueryExecutor::new(
        config.deploy.mode.into(),
        config.database.connection.statement_timeout(),
    )
}

async fn execute(
    command: &Command,
    config: &Config,
    pool: Arc<DatabasePool>,
    metrics: Arc<RunMetrics>,
) -> Result<ExitCode> {
    let schema = config.schema.as_str();

    match command {
        Command::Status => {
            status(config, &pool).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Deploy { force, .. } => {
            let plan = DeployPlan::from_config(&config.deploy)?;
            let deployer = Deployer::new(pool, schema, executor_for(config), metrics);
            let options = DeployOptions {
                force: *force,
                continue_on_error: config.deploy.continue_on_error,
            };
            let report = deployer.deploy(&plan, options).await?;
            report.log_summary();
            Ok(success_code(report.succeeded()))
        }
        Command::Reset { force } => {
            let deployer = Deployer::new(pool, schema, executor_for(config), metrics);
            deployer.reset(*force).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Test { skip_deploy } => {
            let suite = TestSuite::from_config(pool, config, metrics)?;
            let report = suite.run(*skip_deploy).await?;
            println!("{}", report.render());
            Ok(success_code(report.all_passed()))
        }
        Command::Report { run_id } => {
            let report = load_report(&pool, schema, *run_id).await?;
            println!("{}", report.render());
            Ok(success_code(report.all_passed()))
        }
        Command::Seed { .. } => {
            let seeder = Seeder::new(pool, config, metrics);
            seeder.run(Utc::now()).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Partitions { action } => {
            partitions(*action, config, pool).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Monitor {
            iterations,
            plain,
            no_history,
            ..
        } => {
            let options = MonitorOptions {
                interval: Duration::from_secs(config.monitor.interval_seconds),
                iterations: *iterations,
                plain: *plain,
                record_history: config.monitor.record_history && !*no_history,
                top_tables: config.monitor.top_tables,
            };
            Monitor::new(pool, schema)
                .run(options, Shutdown::listen())
                .await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn status(config: &Config, pool: &Arc<DatabasePool>) -> Result<()> {
    let version = pool.server_version().await?;
    let pool_status = pool.get_pool_status();
    info!("서버: {}", version);
    info!(
        "연결 풀: 크기 {} / 최대 {} (사용 가능 {}, 대기 {})",
        pool_status.size, pool_status.max_size, pool_status.available, pool_status.waiting
    );

    let manager = PartitionManager::new(pool.clone(), &config.schema, config.database.partitioning.clone());
    let partitions = manager.list().await?;
    info!("파티션: {} 개", partitions.len());
    let gaps = manager.coverage_gaps(Local::now().date_naive()).await?;
    if gaps.is_empty() {
        info!("이번 달과 미래 파티션이 모두 존재합니다");
    } else {
        for gap in &gaps {
            warn!("파티션 없음: {} [{} ~ {})", gap.name, gap.range_start, gap.range_end);
        }
    }

    match load_report(pool, &config.schema, None).await {
        Ok(report) => info!(
            "최근 테스트: run_id {} - 통과 {} / 전체 {} ({:.1}%)",
            report.run_id,
            report.passed,
            report.total,
            report.pass_rate()
        ),
        Err(ReviewDbError::Config(message)) => info!("최근 테스트: {}", message),
        Err(e) => return Err(e),
    }
    Ok(())
}

async fn partitions(action: PartitionAction, config: &Config, pool: Arc<DatabasePool>) -> Result<()> {
    let manager = PartitionManager::new(pool, &config.schema, config.database.partitioning.clone());
    let today = Local::now().date_naive();

    match action {
        PartitionAction::Ensure => {
            let created = manager.ensure(today).await?;
            info!("파티션 {} 개 생성", created.len());
        }
        PartitionAction::Prune => {
            manager.prune(today).await?;
        }
        PartitionAction::List => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["parent", "partition", "month"]);
            for info in manager.list().await? {
                let month = info
                    .month
                    .map(|m| m.format("%Y-%m").to_string())
                    .unwrap_or_else(|| "-".to_string());
                table.add_row(vec![info.table, info.name, month]);
            }
            println!("{}", table);
        }
        PartitionAction::Watch => {
            manager.run_scheduler(Shutdown::listen()).await?;
        }
    }
    Ok(())
}
