// 파티션 관련 SQL 쿼리

/// 부모 테이블에 연결된 파티션 목록 조회 쿼리
pub const LIST_PARTITIONS: &str = "
    SELECT child.relname::TEXT
    FROM pg_inherits
    JOIN pg_class parent ON parent.oid = pg_inherits.inhparent
    JOIN pg_class child ON child.oid = pg_inherits.inhrelid
    JOIN pg_namespace ns ON ns.oid = parent.relnamespace
    WHERE ns.nspname = $1 AND parent.relname = $2
    ORDER BY child.relname";

/// 부모 테이블이 파티션 테이블인지 확인 쿼리
pub const CHECK_PARTITIONED_TABLE: &str = "
    SELECT EXISTS (
        SELECT FROM pg_partitioned_table pt
        JOIN pg_class c ON c.oid = pt.partrelid
        JOIN pg_namespace ns ON ns.oid = c.relnamespace
        WHERE ns.nspname = $1 AND c.relname = $2
    )";

/// 파티션 존재 여부 확인 쿼리
pub const CHECK_PARTITION_EXISTS: &str = "
    SELECT EXISTS (
        SELECT FROM pg_tables
        WHERE schemaname = $1
        AND tablename = $2
    )";

/// 월별 파티션 생성 쿼리 포맷
pub const CREATE_MONTHLY_PARTITION: &str =
    "CREATE TABLE IF NOT EXISTS {schema}.{partition} PARTITION OF {schema}.{parent} FOR VALUES FROM ('{from}') TO ('{to}')";

/// 파티션 삭제 쿼리 포맷
pub const DROP_PARTITION: &str = "DROP TABLE IF EXISTS {schema}.{partition}";

/// 파티션 생성 기록 쿼리
pub const RECORD_PARTITION_CREATED: &str = "
    INSERT INTO {schema}.partition_management (partition_name, table_name, range_start, range_end)
    VALUES ($1, $2, $3, $4)
    ON CONFLICT (partition_name) DO UPDATE
    SET created_at = NOW(), dropped_at = NULL";

/// 파티션 삭제 기록 쿼리
pub const RECORD_PARTITION_DROPPED: &str = "
    UPDATE {schema}.partition_management
    SET dropped_at = NOW()
    WHERE partition_name = $1";
