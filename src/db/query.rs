use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::{debug, error, trace, warn};
use tokio_postgres::Client;

use super::splitter::{split_statements, SqlStatement};
use crate::error::{ReviewDbError, Result};

/// SQL 파일 실행 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecMode {
    /// 파일 전체를 한 번에 전송
    WholeFile,
    /// 문장 단위로 분리해 순서대로 실행 - 실패 위치를 알 수 있음
    #[default]
    Statements,
}

/// 읽어 들인 SQL 파일
#[derive(Debug, Clone)]
pub struct SqlFile {
    pub name: String,
    pub path: PathBuf,
    pub contents: String,
}

impl SqlFile {
    /// SQL 파일 읽기
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ReviewDbError::io(path, e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            name,
            path: path.to_path_buf(),
            contents,
        })
    }

    pub fn statements(&self) -> Vec<SqlStatement> {
        split_statements(&self.contents)
    }
}

/// 파일 실행 실패 정보
#[derive(Debug)]
pub struct FileFailure {
    /// 실패한 문장 순번 (0부터, 파일 전체 실행 시 None)
    pub statement_index: Option<usize>,
    pub line: Option<usize>,
    pub error: ReviewDbError,
}

/// 파일 실행 결과
#[derive(Debug)]
pub struct FileOutcome {
    pub name: String,
    /// 커밋된 문장 수 (실패 시 0)
    pub statements: usize,
    pub duration: Duration,
    pub failure: Option<FileFailure>,
}

impl FileOutcome {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }

    pub fn is_retryable(&self) -> bool {
        self.failure
            .as_ref()
            .is_some_and(|failure| failure.error.is_retryable())
    }

    /// 결과 테이블에 기록할 에러 메시지
    pub fn error_message(&self) -> Option<String> {
        self.failure.as_ref().map(|failure| match failure.line {
            Some(line) => format!("line {}: {}", line, failure.error),
            None => failure.error.to_string(),
        })
    }
}

/// 쿼리 실행기 구조체
#[derive(Debug, Clone, Default)]
pub struct QueryExecutor {
    mode: ExecMode,
    statement_timeout: Option<Duration>,
}

impl QueryExecutor {
    pub fn new(mode: ExecMode, statement_timeout: Option<Duration>) -> Self {
        Self {
            mode,
            statement_timeout,
        }
    }

    /// SQL 파일을 하나의 트랜잭션으로 실행 - 성공 시 커밋, 실패 시 롤백
    pub async fn execute_file(&self, client: &mut Client, file: &SqlFile) -> FileOutcome {
        let started = Instant::now();
        debug!("SQL 파일 실행: {}", file.path.display());

        let (statements, failure) = match self.run_in_transaction(client, file).await {
            Ok(count) => (count, None),
            Err(failure) => {
                error!("SQL 파일 실패 - {}: {}", file.name, failure.error);
                (0, Some(failure))
            }
        };

        FileOutcome {
            name: file.name.clone(),
            statements,
            duration: started.elapsed(),
            failure,
        }
    }

    async fn run_in_transaction(
        &self,
        client: &mut Client,
        file: &SqlFile,
    ) -> std::result::Result<usize, FileFailure> {
        let whole = |error: ReviewDbError| FileFailure {
            statement_index: None,
            line: None,
            error,
        };

        let tx = client.transaction().await.map_err(|e| whole(e.into()))?;

        if let Some(timeout) = self.statement_timeout {
            let set_timeout = format!("SET LOCAL statement_timeout = {}", timeout.as_millis());
            if let Err(e) = tx.batch_execute(&set_timeout).await {
                rollback(tx, &file.name).await;
                return Err(whole(e.into()));
            }
        }

        let statements = file.statements();
        match self.mode {
            ExecMode::WholeFile => {
                trace!("파일 전체 실행: {}", file.name);
                if let Err(e) = tx.batch_execute(&file.contents).await {
                    rollback(tx, &file.name).await;
                    return Err(whole(e.into()));
                }
            }
            ExecMode::Statements => {
                for (index, statement) in statements.iter().enumerate() {
                    trace!("{}:{} 실행", file.name, statement.line);
                    if let Err(e) = tx.batch_execute(&statement.text).await {
                        rollback(tx, &file.name).await;
                        return Err(FileFailure {
                            statement_index: Some(index),
                            line: Some(statement.line),
                            error: e.into(),
                        });
                    }
                }
            }
        }

        tx.commit().await.map_err(|e| whole(e.into()))?;
        Ok(statements.len())
    }
}

async fn rollback(tx: tokio_postgres::Transaction<'_>, name: &str) {
    if let Err(e) = tx.rollback().await {
        warn!("롤백 실패 - {}: {}", name, e);
    } else {
        debug!("롤백 완료: {}", name);
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::error::SqlErrorKind;

    #[test]
    fn load_reads_name_and_statements() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("01_schema.sql");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "CREATE SCHEMA IF NOT EXISTS review_system;").unwrap();
        writeln!(file, "CREATE TABLE review_system.t (id int);").unwrap();

        let sql = SqlFile::load(&path).unwrap();
        assert_eq!(sql.name, "01_schema.sql");
        assert_eq!(sql.statements().len(), 2);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = SqlFile::load("/nonexistent/nope.sql").unwrap_err();
        assert!(matches!(err, ReviewDbError::Io { .. }));
    }

    #[test]
    fn outcome_error_message_includes_line() {
        let outcome = FileOutcome {
            name: "02_tables.sql".into(),
            statements: 0,
            duration: Duration::from_millis(3),
            failure: Some(FileFailure {
                statement_index: Some(1),
                line: Some(12),
                error: ReviewDbError::Sql {
                    kind: SqlErrorKind::Syntax,
                    code: "42601".into(),
                    message: "syntax error".into(),
                },
            }),
        };
        assert!(!outcome.succeeded());
        assert!(!outcome.is_retryable());
        assert!(outcome.error_message().unwrap().starts_with("line 12: "));
    }
}
