// SQL 쿼리 모듈 (기능별 SQL 쿼리 관리)
pub mod bookkeeping;
pub mod monitor_queries;
pub mod partition;
pub mod seed;

// 기본 스키마 이름
pub const DEFAULT_SCHEMA: &str = "review_system";

// 기본 설정 파일 이름
pub const DEFAULT_CONFIG_FILE: &str = "reviewdb.yml";

// 모니터링 이력 배치 크기 및 플러시 간격
pub const HISTORY_BATCH_SIZE: usize = 200;
pub const HISTORY_FLUSH_INTERVAL_MS: u64 = 5000;
pub const HISTORY_CHANNEL_SIZE: usize = 1000;

// 모니터링 경고 임계값
pub const DEAD_TUPLE_WARN_RATIO: f64 = 0.2;       // 죽은 튜플 비율 경고 (20%)
pub const DEAD_TUPLE_CRITICAL_RATIO: f64 = 0.5;   // 죽은 튜플 비율 위험 (50%)
pub const CONNECTION_WARN_RATIO: f64 = 0.8;       // 연결 사용률 경고 (80%)
pub const CONNECTION_CRITICAL_RATIO: f64 = 0.95;  // 연결 사용률 위험 (95%)

// 파티션 확인 전체 타임아웃
pub const PARTITION_ENSURE_TIMEOUT_SECS: u64 = 60;

// 파티션 부모 테이블 이름 최대 길이 (63 - "_yYYYYmMM")
pub const MAX_PARTITION_PARENT_LEN: usize = 54;

// 한 번에 다루는 월 범위 상한 (future_partitions, seed.months)
pub const MAX_PLAN_MONTHS: u32 = 240;

// 샘플 데이터 삽입 배치 크기
pub const SEED_BATCH_SIZE: usize = 500;

/// 스키마 이름처럼 SQL 에 그대로 넣을 식별자인지 확인
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// 쿼리의 `{schema}` 자리표시자 치환
pub fn with_schema(query: &str, schema: &str) -> String {
    query.replace("{schema}", schema)
}
