//! 통합 테스트 공용 도우미 - Testcontainers PostgreSQL 사용

use std::fs;
use std::path::Path;
use std::sync::Arc;

use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;

use reviewdb::config::Config;
use reviewdb::db::DatabasePool;

pub const TEST_SCHEMA: &str = "it_reviews";

/// 리뷰/답글 파티션 부모 테이블 - 함수 본문의 세미콜론까지 포함
pub const SCHEMA_SQL: &str = r#"
CREATE SCHEMA IF NOT EXISTS it_reviews;

CREATE TABLE it_reviews.reviews_partitioned (
    review_id BIGSERIAL,
    game_id INTEGER NOT NULL,
    user_id INTEGER NOT NULL,
    rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
    content TEXT,
    created_at TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (review_id, created_at)
) PARTITION BY RANGE (created_at);

CREATE TABLE it_reviews.review_replies_partitioned (
    reply_id BIGSERIAL,
    review_id BIGINT NOT NULL,
    user_id INTEGER NOT NULL,
    content TEXT,
    created_at TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (reply_id, created_at)
) PARTITION BY RANGE (created_at);

-- 본문 안의 ';' 는 문장 경계가 아님
CREATE OR REPLACE FUNCTION it_reviews.average_rating(p_game INTEGER)
RETURNS NUMERIC LANGUAGE plpgsql AS $$
DECLARE
    result NUMERIC;
BEGIN
    SELECT AVG(rating) INTO result FROM it_reviews.reviews_partitioned WHERE game_id = p_game;
    RETURN COALESCE(result, 0);
END;
$$;
"#;

/// Testcontainers PostgreSQL 인스턴스 - drop 시 정리
pub struct TestDb {
    pub config: Config,
    _container: ContainerAsync<Postgres>,
}

#[allow(dead_code)]
impl TestDb {
    pub async fn new() -> Self {
        let container = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .expect("Failed to start PostgreSQL container");

        let port = container
            .get_host_port_ipv4(5432)
            .await
            .expect("Failed to get mapped port");

        let mut config = Config::default();
        config.schema = TEST_SCHEMA.to_string();
        let connection = &mut config.database.connection;
        connection.host = "127.0.0.1".to_string();
        connection.port = port;
        connection.database = "postgres".to_string();
        connection.user = "postgres".to_string();
        connection.password = "postgres".to_string();
        config.database.retry.base_delay_ms = 200;

        TestDb {
            config,
            _container: container,
        }
    }

    pub async fn pool(&self) -> Arc<DatabasePool> {
        DatabasePool::connect(&self.config.database)
            .await
            .expect("Failed to connect to test database")
    }

    pub async fn scalar_i64(&self, pool: &DatabasePool, sql: &str) -> i64 {
        let client = pool.get_client().await.expect("client");
        client
            .query_one(sql, &[])
            .await
            .unwrap_or_else(|e| panic!("Scalar query failed: {}\nSQL: {}", e, sql))
            .get(0)
    }
}

pub fn write_sql(dir: &Path, name: &str, sql: &str) {
    fs::write(dir.join(name), sql).expect("write sql file");
}
