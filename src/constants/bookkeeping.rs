/// 도구가 관리하는 기록 테이블 관련 SQL 쿼리
/// `{schema}` 는 검증된 스키마 이름으로 치환됨

/// 스키마 생성 쿼리
pub const CREATE_SCHEMA: &str = "CREATE SCHEMA IF NOT EXISTS {schema}";

/// 스키마 삭제 쿼리
pub const DROP_SCHEMA: &str = "DROP SCHEMA IF EXISTS {schema} CASCADE";

/// 테스트 결과 테이블 존재 여부 확인 쿼리 (읽기 전용 명령용)
pub const CHECK_TEST_RESULTS_EXISTS: &str = "
    SELECT EXISTS (
        SELECT FROM pg_tables
        WHERE schemaname = $1
        AND tablename = 'test_results'
    )";

/// 배포 이력 테이블 생성 쿼리
pub const CREATE_DEPLOYMENT_HISTORY: &str = "
    CREATE TABLE IF NOT EXISTS {schema}.deployment_history (
        id BIGSERIAL PRIMARY KEY,
        run_id UUID NOT NULL,
        file_name TEXT NOT NULL,
        status TEXT NOT NULL CHECK (status IN ('applied', 'failed')),
        statements INTEGER NOT NULL DEFAULT 0,
        duration_ms BIGINT NOT NULL,
        error_message TEXT,
        executed_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )";

/// 테스트 결과 테이블 생성 쿼리
pub const CREATE_TEST_RESULTS: &str = "
    CREATE TABLE IF NOT EXISTS {schema}.test_results (
        id BIGSERIAL PRIMARY KEY,
        run_id UUID NOT NULL,
        test_name TEXT NOT NULL,
        status TEXT NOT NULL CHECK (status IN ('pass', 'fail')),
        error_message TEXT,
        duration_ms BIGINT NOT NULL,
        executed_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )";

/// 모니터링 이력 테이블 생성 쿼리
pub const CREATE_MONITORING_HISTORY: &str = "
    CREATE TABLE IF NOT EXISTS {schema}.monitoring_history (
        id BIGSERIAL,
        sampled_at TIMESTAMPTZ NOT NULL,
        metric TEXT NOT NULL,
        subject TEXT NOT NULL,
        value DOUBLE PRECISION NOT NULL,
        PRIMARY KEY (id, sampled_at)
    )";

/// 파티션 관리 테이블 생성 쿼리
pub const CREATE_PARTITION_MANAGEMENT: &str = "
    CREATE TABLE IF NOT EXISTS {schema}.partition_management (
        partition_name TEXT PRIMARY KEY,
        table_name TEXT NOT NULL,
        range_start DATE NOT NULL,
        range_end DATE NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        dropped_at TIMESTAMPTZ
    )";

/// 기본 인덱스 생성 쿼리
pub const CREATE_INDICES: [&str; 4] = [
    "CREATE INDEX IF NOT EXISTS test_results_run_id_idx ON {schema}.test_results(run_id)",
    "CREATE INDEX IF NOT EXISTS deployment_history_run_id_idx ON {schema}.deployment_history(run_id)",
    "CREATE INDEX IF NOT EXISTS monitoring_history_sampled_at_idx ON {schema}.monitoring_history(sampled_at)",
    "CREATE INDEX IF NOT EXISTS monitoring_history_metric_idx ON {schema}.monitoring_history(metric, subject)",
];

/// 배포 이력 기록 쿼리
pub const INSERT_DEPLOYMENT: &str = "
    INSERT INTO {schema}.deployment_history (
        run_id, file_name, status, statements, duration_ms, error_message
    ) VALUES ($1, $2, $3, $4, $5, $6)";

/// 테스트 결과 기록 쿼리
pub const INSERT_TEST_RESULT: &str = "
    INSERT INTO {schema}.test_results (
        run_id, test_name, status, error_message, duration_ms
    ) VALUES ($1, $2, $3, $4, $5)";

/// 실행 단위 집계 쿼리
pub const SELECT_TEST_SUMMARY: &str = "
    SELECT
        COUNT(*) AS total,
        COUNT(*) FILTER (WHERE status = 'pass') AS passed,
        COUNT(*) FILTER (WHERE status = 'fail') AS failed,
        COALESCE(SUM(duration_ms), 0)::BIGINT AS duration_ms,
        MIN(executed_at) AS started_at
    FROM {schema}.test_results
    WHERE run_id = $1";

/// 실패한 테스트 목록 조회 쿼리
pub const SELECT_TEST_FAILURES: &str = "
    SELECT test_name, COALESCE(error_message, '')
    FROM {schema}.test_results
    WHERE run_id = $1 AND status = 'fail'
    ORDER BY id";

/// 마지막 테스트 실행 ID 조회 쿼리
pub const SELECT_LATEST_TEST_RUN: &str = "
    SELECT run_id
    FROM {schema}.test_results
    ORDER BY executed_at DESC, id DESC
    LIMIT 1";

/// 모니터링 이력 삽입 쿼리
pub const INSERT_MONITORING_SAMPLE: &str = "
    INSERT INTO {schema}.monitoring_history (sampled_at, metric, subject, value)
    VALUES ($1, $2, $3, $4)";
