use std::sync::Arc;
use std::time::Duration;

use deadpool_postgres::{
    Config, ManagerConfig, Object, Pool, PoolConfig, RecyclingMethod, Runtime, Timeouts,
};
use log::{debug, info, warn};
use tokio_postgres::NoTls;

use super::config::DbConfig;
use super::retry::RetryPolicy;
use crate::error::{ReviewDbError, Result};
use crate::metrics::RunMetrics;

/// 풀에서 빌린 연결 - drop 시 자동 반환
pub type PooledClient = Object;

/// 데이터베이스 풀 관리자 구조체
pub struct DatabasePool {
    pool: Pool,
    config: DbConfig,
    retry: RetryPolicy,
}

/// 풀 상태 구조체
#[derive(Debug, Clone, Copy)]
pub struct PoolStatus {
    pub max_size: usize,
    pub available: usize,
    pub size: usize,
    pub waiting: usize,
}

impl DatabasePool {
    /// 연결 풀 생성 후 재시도 정책에 따라 연결 확인
    pub async fn connect(db_config: &DbConfig) -> Result<Arc<Self>> {
        Self::connect_with_metrics(db_config, Arc::new(RunMetrics::new())).await
    }

    /// 연결/획득 재시도를 metrics 에 기록하는 풀 생성
    pub async fn connect_with_metrics(
        db_config: &DbConfig,
        metrics: Arc<RunMetrics>,
    ) -> Result<Arc<Self>> {
        let pool = Self::build_pool(db_config)?;
        let retry = RetryPolicy::from_config(&db_config.retry).with_metrics(metrics);
        let manager = Arc::new(Self {
            pool,
            config: db_config.clone(),
            retry,
        });

        let version = manager
            .retry
            .run("DB 연결", |_| manager.server_version())
            .await?;
        info!("DB 연결 성공: {} ({})", db_config.connection.redacted(), version);

        Ok(manager)
    }

    fn build_pool(db_config: &DbConfig) -> Result<Pool> {
        let conn_config = &db_config.connection;

        if conn_config.sslmode == "require" {
            warn!("sslmode=require 는 지원하지 않습니다. 암호화 없이 연결합니다");
        }

        // deadpool-postgres 설정 생성
        let mut cfg = Config::new();
        cfg.host = Some(conn_config.host.clone());
        cfg.port = Some(conn_config.port);
        cfg.user = Some(conn_config.user.clone());
        if !conn_config.password.is_empty() {
            cfg.password = Some(conn_config.password.clone());
        }
        cfg.dbname = Some(conn_config.database.clone());
        cfg.application_name = Some("reviewdb".to_string());
        cfg.connect_timeout = Some(conn_config.connect_timeout());

        // 반환된 연결은 재사용 전에 상태 확인
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Verified,
        });

        let mut pool_config = PoolConfig::new(conn_config.max_connections.max(1));
        pool_config.timeouts = Timeouts {
            wait: Some(conn_config.acquire_timeout()),
            create: Some(conn_config.connect_timeout()),
            recycle: Some(Duration::from_secs(5)),
        };
        cfg.pool = Some(pool_config);

        debug!("DB 연결 풀 생성 중... (최대 연결: {})", conn_config.max_connections);
        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ReviewDbError::Config(format!("연결 풀 생성 실패: {}", e)))
    }

    /// 클라이언트 가져오기
    pub async fn get_client(&self) -> Result<PooledClient> {
        Ok(self.pool.get().await?)
    }

    /// 재시도 정책을 적용해 클라이언트 가져오기
    pub async fn get_client_with_retry(&self) -> Result<PooledClient> {
        self.retry.run("연결 획득", |_| self.get_client()).await
    }

    /// 설정 가져오기
    pub fn get_config(&self) -> &DbConfig {
        &self.config
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// 서버 버전 조회
    pub async fn server_version(&self) -> Result<String> {
        let client = self.get_client().await?;
        let row = client.query_one("SELECT version()", &[]).await?;
        Ok(row.get(0))
    }

    /// 풀 상태 확인
    pub fn get_pool_status(&self) -> PoolStatus {
        let status = self.pool.status();
        PoolStatus {
            max_size: self.config.get_max_connections(),
            available: status.available,
            size: status.size,
            waiting: status.waiting,
        }
    }

    /// 풀 종료 - 대기 중인 요청은 Closed 에러를 받음
    pub fn close(&self) {
        let status = self.get_pool_status();
        debug!(
            "DB 풀 종료: 사용 가능 {}/{} (최대 {})",
            status.available, status.size, status.max_size
        );
        self.pool.close();
    }
}
