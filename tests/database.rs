//! PostgreSQL 컨테이너가 필요한 통합 테스트 (cargo test -- --ignored)

mod common;

use std::sync::Arc;

use chrono::{Local, Utc};

use common::{write_sql, TestDb, SCHEMA_SQL, TEST_SCHEMA};
use reviewdb::config::Config;
use reviewdb::db::partition::{add_months, month_start, partition_name, PartitionManager};
use reviewdb::db::{DatabasePool, QueryExecutor, SqlFile};
use reviewdb::deploy::{DeployOptions, DeployPlan, Deployer};
use reviewdb::metrics::RunMetrics;
use reviewdb::monitor::{Monitor, MonitorOptions};
use reviewdb::seed::Seeder;
use reviewdb::shutdown::Shutdown;
use reviewdb::suite::{load_report, TestSuite};
use reviewdb::ReviewDbError;

fn deployer(db: &TestDb, pool: Arc<DatabasePool>, metrics: Arc<RunMetrics>) -> Deployer {
    Deployer::new(pool, &db.config.schema, QueryExecutor::default(), metrics)
}

fn with_sql_dir(config: &Config, dir: &std::path::Path) -> Config {
    let mut config = config.clone();
    config.deploy.sql_dir = dir.to_path_buf();
    config.deploy.test_dir = dir.join("tests");
    config
}

async fn apply_schema(pool: &DatabasePool) {
    let dir = tempfile::tempdir().unwrap();
    write_sql(dir.path(), "01_schema.sql", SCHEMA_SQL);
    let file = SqlFile::load(dir.path().join("01_schema.sql")).unwrap();
    let mut client = pool.get_client().await.unwrap();
    let outcome = QueryExecutor::default().execute_file(&mut client, &file).await;
    assert!(outcome.succeeded(), "{:?}", outcome.failure);
}

async fn table_exists(db: &TestDb, pool: &DatabasePool, name: &str) -> bool {
    let sql = format!(
        "SELECT COUNT(*) FROM pg_tables WHERE schemaname = 'it_reviews' AND tablename = '{}'",
        name
    );
    db.scalar_i64(pool, &sql).await == 1
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn deploy_applies_files_and_records_history() {
    let db = TestDb::new().await;
    let pool = db.pool().await;
    let dir = tempfile::tempdir().unwrap();
    write_sql(dir.path(), "01_schema.sql", SCHEMA_SQL);
    write_sql(
        dir.path(),
        "02_view.sql",
        "CREATE VIEW it_reviews.top_games AS SELECT game_id, COUNT(*) AS n FROM it_reviews.reviews_partitioned GROUP BY game_id;",
    );

    let config = with_sql_dir(&db.config, dir.path());
    let plan = DeployPlan::from_config(&config.deploy).unwrap();
    let metrics = Arc::new(RunMetrics::new());
    let report = deployer(&db, pool.clone(), metrics.clone())
        .deploy(&plan, DeployOptions::default())
        .await
        .unwrap();

    assert!(report.succeeded(), "{:?}", report);
    assert_eq!(report.outcomes[0].statements, 4);
    assert_eq!(metrics.snapshot().files_applied, 2);

    let applied = db
        .scalar_i64(
            &pool,
            "SELECT COUNT(*) FROM it_reviews.deployment_history WHERE status = 'applied'",
        )
        .await;
    assert_eq!(applied, 2);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn failing_file_rolls_back_and_stops() {
    let db = TestDb::new().await;
    let pool = db.pool().await;
    let dir = tempfile::tempdir().unwrap();
    write_sql(dir.path(), "01_schema.sql", SCHEMA_SQL);
    write_sql(
        dir.path(),
        "02_broken.sql",
        "CREATE TABLE it_reviews.half_done (id INT);\nCREATE TABLE it_reviews.broken (id INT REFERENCES nowhere(id));",
    );
    write_sql(dir.path(), "03_never.sql", "CREATE TABLE it_reviews.never (id INT);");

    let config = with_sql_dir(&db.config, dir.path());
    let plan = DeployPlan::from_config(&config.deploy).unwrap();
    let report = deployer(&db, pool.clone(), Arc::new(RunMetrics::new()))
        .deploy(&plan, DeployOptions::default())
        .await
        .unwrap();

    assert!(!report.succeeded());
    assert_eq!(report.failed(), 1);
    assert_eq!(report.skipped, vec!["03_never.sql".to_string()]);

    let failure = report.outcomes[1].failure.as_ref().unwrap();
    assert_eq!(failure.statement_index, Some(1));
    assert_eq!(failure.line, Some(2));

    // 실패한 파일의 첫 문장도 롤백됨
    let half_done = db
        .scalar_i64(
            &pool,
            "SELECT COUNT(*) FROM pg_tables WHERE schemaname = 'it_reviews' AND tablename = 'half_done'",
        )
        .await;
    assert_eq!(half_done, 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn reset_requires_force() {
    let db = TestDb::new().await;
    let pool = db.pool().await;
    let deployer = deployer(&db, pool.clone(), Arc::new(RunMetrics::new()));

    assert!(deployer.reset(false).await.is_err());
    deployer.reset(true).await.unwrap();

    let schemas = db
        .scalar_i64(
            &pool,
            "SELECT COUNT(*) FROM pg_namespace WHERE nspname = 'it_reviews'",
        )
        .await;
    assert_eq!(schemas, 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn suite_records_pass_and_fail() {
    let db = TestDb::new().await;
    let pool = db.pool().await;
    let dir = tempfile::tempdir().unwrap();
    write_sql(dir.path(), "01_schema.sql", SCHEMA_SQL);
    std::fs::create_dir(dir.path().join("tests")).unwrap();
    write_sql(
        &dir.path().join("tests"),
        "test_01_function.sql",
        "DO $$ BEGIN IF it_reviews.average_rating(1) <> 0 THEN RAISE EXCEPTION 'unexpected'; END IF; END $$;",
    );
    write_sql(&dir.path().join("tests"), "test_02_broken.sql", "SELECT 1 / 0;");

    let config = with_sql_dir(&db.config, dir.path());
    let suite = TestSuite::from_config(pool.clone(), &config, Arc::new(RunMetrics::new())).unwrap();
    let report = suite.run(false).await.unwrap();

    assert_eq!(report.total, 2);
    assert_eq!(report.passed, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.failures[0].0, "test_02_broken.sql");
    assert!(!report.all_passed());

    let latest = load_report(&pool, TEST_SCHEMA, None).await.unwrap();
    assert_eq!(latest.run_id, report.run_id);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn partitions_seed_and_monitor() {
    let db = TestDb::new().await;
    let pool = db.pool().await;
    let dir = tempfile::tempdir().unwrap();
    let schema_file = dir.path().join("01_schema.sql");
    std::fs::write(&schema_file, SCHEMA_SQL).unwrap();

    let mut client = pool.get_client().await.unwrap();
    let outcome = QueryExecutor::default()
        .execute_file(&mut client, &SqlFile::load(&schema_file).unwrap())
        .await;
    assert!(outcome.succeeded());
    drop(client);

    let mut config = db.config.clone();
    config.seed.reviews = 300;
    config.seed.months = 2;

    // 파티션 생성은 멱등
    let manager = PartitionManager::new(pool.clone(), TEST_SCHEMA, config.database.partitioning.clone());
    let today = Local::now().date_naive();
    let created = manager.ensure(today).await.unwrap();
    assert_eq!(created.len(), 2 * 4);
    assert!(created.contains(&partition_name("reviews_partitioned", month_start(today))));
    assert!(manager.ensure(today).await.unwrap().is_empty());
    // review_summary_partitioned 는 없는 테이블이므로 누락으로 보지 않음
    assert!(manager.coverage_gaps(today).await.unwrap().is_empty());

    let summary = Seeder::new(pool.clone(), &config, Arc::new(RunMetrics::new()))
        .run(Utc::now())
        .await
        .unwrap();
    assert_eq!(summary.reviews, 300);
    let stored = db
        .scalar_i64(&pool, "SELECT COUNT(*) FROM it_reviews.reviews_partitioned")
        .await;
    assert_eq!(stored, 300);

    let options = MonitorOptions {
        interval: std::time::Duration::from_millis(100),
        iterations: Some(2),
        plain: true,
        record_history: true,
        top_tables: 5,
    };
    let samples = Monitor::new(pool.clone(), TEST_SCHEMA)
        .run(options, Shutdown::manual().1)
        .await
        .unwrap();
    assert_eq!(samples, 2);

    let history = db
        .scalar_i64(&pool, "SELECT COUNT(*) FROM it_reviews.monitoring_history")
        .await;
    assert!(history > 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn transient_rollback_is_rerun() {
    let db = TestDb::new().await;
    let pool = db.pool().await;
    let dir = tempfile::tempdir().unwrap();
    write_sql(
        dir.path(),
        "01_sequence.sql",
        "CREATE SCHEMA IF NOT EXISTS it_reviews;\nCREATE SEQUENCE it_reviews.attempts;",
    );
    // 시퀀스 값은 롤백되지 않으므로 첫 실행만 직렬화 실패
    write_sql(
        dir.path(),
        "02_flaky.sql",
        "CREATE TABLE it_reviews.after_retry (id INT);\n\
         DO $$ BEGIN IF nextval('it_reviews.attempts') = 1 THEN \
         RAISE EXCEPTION 'conflict' USING ERRCODE = 'serialization_failure'; END IF; END $$;",
    );

    let config = with_sql_dir(&db.config, dir.path());
    let plan = DeployPlan::from_config(&config.deploy).unwrap();
    let metrics = Arc::new(RunMetrics::new());
    let report = deployer(&db, pool.clone(), metrics.clone())
        .deploy(&plan, DeployOptions::default())
        .await
        .unwrap();

    assert!(report.succeeded(), "{:?}", report);
    assert_eq!(metrics.snapshot().retries, 1);
    assert!(table_exists(&db, &pool, "after_retry").await);
    let attempts = db.scalar_i64(&pool, "SELECT last_value FROM it_reviews.attempts").await;
    assert_eq!(attempts, 2);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn statement_timeout_fails_without_rerun() {
    let db = TestDb::new().await;
    let pool = db.pool().await;
    let dir = tempfile::tempdir().unwrap();
    write_sql(
        dir.path(),
        "01_slow.sql",
        "SET LOCAL statement_timeout = '100ms';\nSELECT pg_sleep(2);",
    );

    let config = with_sql_dir(&db.config, dir.path());
    let plan = DeployPlan::from_config(&config.deploy).unwrap();
    let metrics = Arc::new(RunMetrics::new());
    let report = deployer(&db, pool.clone(), metrics.clone())
        .deploy(&plan, DeployOptions::default())
        .await
        .unwrap();

    assert_eq!(report.failed(), 1);
    assert_eq!(metrics.snapshot().retries, 0);
    let failure = report.outcomes[0].failure.as_ref().unwrap();
    assert!(
        matches!(&failure.error, ReviewDbError::Sql { code, .. } if code == "57014"),
        "{:?}",
        failure.error
    );
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn continue_on_error_runs_remaining_files() {
    let db = TestDb::new().await;
    let pool = db.pool().await;
    let dir = tempfile::tempdir().unwrap();
    write_sql(dir.path(), "01_schema.sql", SCHEMA_SQL);
    write_sql(dir.path(), "02_broken.sql", "CREATE TABLE it_reviews.broken (id INT REFERENCES nowhere(id));");
    write_sql(dir.path(), "03_after.sql", "CREATE TABLE it_reviews.after_failure (id INT);");

    let config = with_sql_dir(&db.config, dir.path());
    let plan = DeployPlan::from_config(&config.deploy).unwrap();
    let options = DeployOptions {
        continue_on_error: true,
        ..DeployOptions::default()
    };
    let report = deployer(&db, pool.clone(), Arc::new(RunMetrics::new()))
        .deploy(&plan, options)
        .await
        .unwrap();

    assert!(!report.succeeded());
    assert_eq!(report.applied(), 2);
    assert_eq!(report.failed(), 1);
    assert!(report.skipped.is_empty());
    assert!(table_exists(&db, &pool, "after_failure").await);

    let recorded = db
        .scalar_i64(&pool, "SELECT COUNT(*) FROM it_reviews.deployment_history")
        .await;
    assert_eq!(recorded, 3);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn forced_deploy_resets_schema_first() {
    let db = TestDb::new().await;
    let pool = db.pool().await;
    apply_schema(&pool).await;
    {
        let client = pool.get_client().await.unwrap();
        client
            .batch_execute("CREATE TABLE it_reviews.leftover (id INT)")
            .await
            .unwrap();
    }

    let dir = tempfile::tempdir().unwrap();
    write_sql(dir.path(), "01_schema.sql", SCHEMA_SQL);
    let config = with_sql_dir(&db.config, dir.path());
    let plan = DeployPlan::from_config(&config.deploy).unwrap();
    let options = DeployOptions {
        force: true,
        ..DeployOptions::default()
    };
    let report = deployer(&db, pool.clone(), Arc::new(RunMetrics::new()))
        .deploy(&plan, options)
        .await
        .unwrap();

    assert!(report.succeeded(), "{:?}", report);
    assert!(!table_exists(&db, &pool, "leftover").await);
    assert!(table_exists(&db, &pool, "reviews_partitioned").await);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn prune_drops_expired_partitions() {
    let db = TestDb::new().await;
    let pool = db.pool().await;
    apply_schema(&pool).await;

    let mut partitioning = db.config.database.partitioning.clone();
    partitioning.retention_months = 1;
    partitioning.future_partitions = 0;
    let manager = PartitionManager::new(pool.clone(), TEST_SCHEMA, partitioning);

    let today = Local::now().date_naive();
    let old_month = add_months(month_start(today), -6);
    let old = manager.ensure_months(old_month, 1).await.unwrap();
    assert_eq!(old.len(), 2);
    manager.ensure(today).await.unwrap();

    let dropped = manager.prune(today).await.unwrap();
    assert_eq!(dropped.len(), 2);
    assert!(dropped.contains(&partition_name("reviews_partitioned", old_month)));

    let old_name = partition_name("reviews_partitioned", old_month);
    assert!(!table_exists(&db, &pool, &old_name).await);
    let marked = db
        .scalar_i64(
            &pool,
            &format!(
                "SELECT COUNT(*) FROM it_reviews.partition_management \
                 WHERE partition_name = '{}' AND dropped_at IS NOT NULL",
                old_name
            ),
        )
        .await;
    assert_eq!(marked, 1);

    let current = partition_name("reviews_partitioned", month_start(today));
    assert!(table_exists(&db, &pool, &current).await);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn failed_bookkeeping_insert_rolls_back_partition() {
    let db = TestDb::new().await;
    let pool = db.pool().await;
    apply_schema(&pool).await;

    let mut partitioning = db.config.database.partitioning.clone();
    partitioning.future_partitions = 0;
    let manager = PartitionManager::new(pool.clone(), TEST_SCHEMA, partitioning);
    assert!(manager.list().await.unwrap().is_empty());

    // 기록 테이블을 먼저 만들고 모든 INSERT 를 거부하게 함
    {
        let client = pool.get_client().await.unwrap();
        reviewdb::db::bookkeeping::ensure_bookkeeping(&**client, TEST_SCHEMA)
            .await
            .unwrap();
        client
            .batch_execute(
                "ALTER TABLE it_reviews.partition_management \
                 ADD CONSTRAINT reject_all CHECK (false) NOT VALID",
            )
            .await
            .unwrap();
    }

    let today = Local::now().date_naive();
    let created = manager.ensure(today).await.unwrap();
    assert!(created.is_empty());
    assert!(manager.list().await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn report_on_fresh_database_creates_nothing() {
    let db = TestDb::new().await;
    let pool = db.pool().await;

    let result = load_report(&pool, TEST_SCHEMA, None).await;
    assert!(matches!(result, Err(ReviewDbError::Config(_))), "{:?}", result.err());

    let manager = PartitionManager::new(pool.clone(), TEST_SCHEMA, db.config.database.partitioning.clone());
    assert!(manager.coverage_gaps(Local::now().date_naive()).await.unwrap().is_empty());

    let schemas = db
        .scalar_i64(&pool, "SELECT COUNT(*) FROM pg_namespace WHERE nspname = 'it_reviews'")
        .await;
    assert_eq!(schemas, 0);
}
