use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 데이터베이스 연결 설정
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    /// 기본값은 비어 있음 - 설정 파일이나 DB_PASSWORD 로 주입
    pub password: String,
    pub sslmode: String,
    pub max_connections: usize,
    pub connection_timeout_seconds: u64,
    /// 풀에서 연결을 기다리는 최대 시간
    pub acquire_timeout_seconds: u64,
    /// SQL 파일 실행 시 statement_timeout (None 이면 서버 기본값)
    pub statement_timeout_seconds: Option<u64>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "postgres".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            sslmode: "disable".to_string(),
            max_connections: 4,
            connection_timeout_seconds: 10,
            acquire_timeout_seconds: 30,
            statement_timeout_seconds: None,
        }
    }
}

impl ConnectionConfig {
    /// 비밀번호를 가린 연결 문자열
    pub fn redacted(&self) -> String {
        let password = if self.password.is_empty() { "" } else { "****" };
        format!(
            "host={} port={} dbname={} user={} password={} sslmode={}",
            self.host, self.port, self.database, self.user, password, self.sslmode
        )
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_seconds)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }

    pub fn statement_timeout(&self) -> Option<Duration> {
        self.statement_timeout_seconds.map(Duration::from_secs)
    }
}

/// 재시도 정책 설정
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// 0.0 ~ 1.0 범위의 지터 비율
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
            jitter: 0.2,
        }
    }
}

/// 파티션 설정
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    /// 월 단위 범위 파티션 부모 테이블
    pub tables: Vec<String>,
    /// 현재 월 이후로 미리 만들어 둘 월 파티션 수
    pub future_partitions: u32,
    /// 보존 기간 (월, 0 이면 삭제하지 않음)
    pub retention_months: u32,
    pub create_timeout_seconds: u64,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            tables: vec![
                "reviews_partitioned".to_string(),
                "review_replies_partitioned".to_string(),
                "review_summary_partitioned".to_string(),
            ],
            future_partitions: 3,
            retention_months: 24,
            create_timeout_seconds: 5,
        }
    }
}

/// 데이터베이스 설정
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub connection: ConnectionConfig,
    pub retry: RetryConfig,
    pub partitioning: PartitionConfig,
}

impl DbConfig {
    /// 연결 풀 최대 크기 가져오기
    pub fn get_max_connections(&self) -> usize {
        self.connection.max_connections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacted_hides_password() {
        let mut conn = ConnectionConfig::default();
        conn.password = "s3cret".to_string();
        let dsn = conn.redacted();
        assert!(!dsn.contains("s3cret"));
        assert!(dsn.contains("password=****"));
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = "connection:\n  host: db.internal\n  port: 6543\npartitioning:\n  retention_months: 6\n";
        let config: DbConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.connection.host, "db.internal");
        assert_eq!(config.connection.port, 6543);
        assert_eq!(config.connection.user, "postgres");
        assert!(config.connection.password.is_empty());
        assert_eq!(config.partitioning.retention_months, 6);
        assert_eq!(config.partitioning.tables.len(), 3);
        assert_eq!(config.retry.max_attempts, 5);
    }
}
