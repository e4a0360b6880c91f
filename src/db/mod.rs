// 데이터베이스 관리 모듈
// 연결 풀, 설정, 재시도, SQL 파일 실행과 파티션 관리를 담당합니다.

pub mod bookkeeping;
pub mod config;
pub mod partition;
pub mod pool;
pub mod query;
pub mod retry;
pub mod splitter;

// 외부로 노출할 항목들
pub use config::DbConfig;
pub use pool::{DatabasePool, PooledClient};
pub use query::{ExecMode, FileOutcome, QueryExecutor, SqlFile};
pub use retry::RetryPolicy;
