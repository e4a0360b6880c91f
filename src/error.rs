//! 에러 타입 정의
//!
//! 모든 명령은 `Result<T, ReviewDbError>`로 에러를 전파합니다.
//! PostgreSQL 에러는 SQLSTATE 클래스로 분류되어 재시도 여부가 결정됩니다.

use std::fmt;
use std::path::PathBuf;

use deadpool_postgres::PoolError;

/// SQL 에러 분류 (SQLSTATE 클래스 기준)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlErrorKind {
    /// 08 - 연결 예외
    Connection,
    /// 23 - 무결성 제약 위반
    Constraint,
    /// 42 - 구문 오류 또는 정의되지 않은 객체
    Syntax,
    /// 40 - 트랜잭션 롤백 (직렬화 실패, 교착 상태)
    Rollback,
    /// 53 - 자원 부족
    Resources,
    /// 57014 - statement_timeout 이나 취소 요청으로 중단된 쿼리
    QueryCanceled,
    /// 57 - 운영자 개입 (서버 종료, 재시작 중)
    OperatorIntervention,
    Other,
}

impl SqlErrorKind {
    /// SQLSTATE 코드로 분류
    pub fn from_code(code: &str) -> Self {
        if code == "57014" {
            return SqlErrorKind::QueryCanceled;
        }
        match code.get(0..2) {
            Some("08") => SqlErrorKind::Connection,
            Some("23") => SqlErrorKind::Constraint,
            Some("42") => SqlErrorKind::Syntax,
            Some("40") => SqlErrorKind::Rollback,
            Some("53") => SqlErrorKind::Resources,
            Some("57") => SqlErrorKind::OperatorIntervention,
            _ => SqlErrorKind::Other,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SqlErrorKind::Connection
                | SqlErrorKind::Rollback
                | SqlErrorKind::Resources
                | SqlErrorKind::OperatorIntervention
        )
    }
}

impl fmt::Display for SqlErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SqlErrorKind::Connection => "connection",
            SqlErrorKind::Constraint => "constraint",
            SqlErrorKind::Syntax => "syntax",
            SqlErrorKind::Rollback => "rollback",
            SqlErrorKind::QueryCanceled => "query-canceled",
            SqlErrorKind::Resources => "resources",
            SqlErrorKind::OperatorIntervention => "operator-intervention",
            SqlErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// 도구 전체 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum ReviewDbError {
    #[error("설정 오류: {0}")]
    Config(String),

    #[error("파일 입출력 실패 ({}): {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("데이터베이스 연결 실패: {0}")]
    Connection(String),

    #[error("연결 풀 대기 시간 초과")]
    PoolTimeout,

    #[error("SQL 실패 [{kind}/{code}]: {message}")]
    Sql {
        kind: SqlErrorKind,
        code: String,
        message: String,
    },

    #[error("작업 시간 초과: {0}")]
    Timeout(String),

    #[error("작업 중단: {0}")]
    Aborted(String),

    #[error("내부 오류: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ReviewDbError>;

impl ReviewDbError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ReviewDbError::Io {
            path: path.into(),
            source,
        }
    }

    /// 재시도로 해결될 수 있는 에러인지 확인
    pub fn is_retryable(&self) -> bool {
        match self {
            ReviewDbError::Connection(_) | ReviewDbError::PoolTimeout => true,
            ReviewDbError::Sql { kind, .. } => kind.is_transient(),
            _ => false,
        }
    }
}

impl From<tokio_postgres::Error> for ReviewDbError {
    fn from(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let code = db_err.code().code().to_string();
            let mut message = db_err.message().to_string();
            if let Some(detail) = db_err.detail() {
                message.push_str(" - ");
                message.push_str(detail);
            }
            return ReviewDbError::Sql {
                kind: SqlErrorKind::from_code(&code),
                code,
                message,
            };
        }

        let text = err.to_string();
        if err.is_closed() || is_connection_message(&text) {
            return ReviewDbError::Connection(text);
        }

        ReviewDbError::Internal(text)
    }
}

/// tokio-postgres 는 에러 종류를 공개하지 않으므로 메시지로 판별
fn is_connection_message(text: &str) -> bool {
    const PREFIXES: [&str; 5] = [
        "error connecting",
        "error communicating",
        "connection closed",
        "timeout waiting",
        "error performing TLS",
    ];
    PREFIXES.iter().any(|prefix| text.starts_with(prefix))
}

impl From<PoolError> for ReviewDbError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Timeout(_) => ReviewDbError::PoolTimeout,
            PoolError::Backend(e) => ReviewDbError::from(e),
            PoolError::Closed => ReviewDbError::Connection("연결 풀이 닫혔습니다".to_string()),
            other => ReviewDbError::Internal(other.to_string()),
        }
    }
}

impl From<serde_yaml::Error> for ReviewDbError {
    fn from(err: serde_yaml::Error) -> Self {
        ReviewDbError::Config(err.to_string())
    }
}
