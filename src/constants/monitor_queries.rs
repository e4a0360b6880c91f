/// monitor 모듈에서 사용하는 SQL 쿼리 모음

/// 현재 데이터베이스의 상태별 연결 수 조회 쿼리
pub const SELECT_CONNECTION_STATES: &str = "
    SELECT COALESCE(state, 'unknown') AS state, COUNT(*)::BIGINT
    FROM pg_stat_activity
    WHERE datname = current_database()
    GROUP BY 1
    ORDER BY 1
";

/// 가장 오래 실행 중인 쿼리의 경과 시간(초) 조회 쿼리
pub const SELECT_LONGEST_ACTIVE_QUERY: &str = "
    SELECT COALESCE(EXTRACT(EPOCH FROM MAX(NOW() - query_start)), 0)::DOUBLE PRECISION
    FROM pg_stat_activity
    WHERE datname = current_database()
    AND state = 'active'
    AND pid <> pg_backend_pid()
";

/// 서버 최대 연결 수 조회 쿼리
pub const SELECT_MAX_CONNECTIONS: &str = "SELECT current_setting('max_connections')::BIGINT";

/// 데이터베이스 크기 조회 쿼리
pub const SELECT_DATABASE_SIZE: &str = "SELECT pg_database_size(current_database())::BIGINT";

/// 스키마 내 테이블 통계 조회 쿼리
pub const SELECT_TABLE_STATS: &str = "
    SELECT
        relname::TEXT,
        n_live_tup::BIGINT,
        n_dead_tup::BIGINT,
        COALESCE(seq_scan, 0)::BIGINT,
        COALESCE(idx_scan, 0)::BIGINT,
        GREATEST(last_autovacuum, last_vacuum)
    FROM pg_stat_user_tables
    WHERE schemaname = $1
    ORDER BY n_live_tup DESC, relname
    LIMIT $2
";
