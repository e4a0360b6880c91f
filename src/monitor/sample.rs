use chrono::{DateTime, Utc};
use tokio_postgres::GenericClient;

use crate::constants::monitor_queries::*;
use crate::constants::{
    CONNECTION_CRITICAL_RATIO, CONNECTION_WARN_RATIO, DEAD_TUPLE_CRITICAL_RATIO,
    DEAD_TUPLE_WARN_RATIO,
};
use crate::error::Result;

/// 상태 수준
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Health {
    Ok,
    Warning,
    Critical,
}

impl Health {
    fn from_ratio(ratio: f64, warn: f64, critical: f64) -> Self {
        if ratio >= critical {
            Health::Critical
        } else if ratio >= warn {
            Health::Warning
        } else {
            Health::Ok
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Health::Ok => "OK",
            Health::Warning => "WARN",
            Health::Critical => "CRIT",
        }
    }
}

/// 전체 튜플 중 죽은 튜플 비율
pub fn dead_tuple_ratio(live: i64, dead: i64) -> f64 {
    let total = live.max(0) + dead.max(0);
    if total == 0 {
        return 0.0;
    }
    dead.max(0) as f64 / total as f64
}

pub fn dead_tuple_health(ratio: f64) -> Health {
    Health::from_ratio(ratio, DEAD_TUPLE_WARN_RATIO, DEAD_TUPLE_CRITICAL_RATIO)
}

pub fn connection_health(used: i64, max: i64) -> Health {
    if max <= 0 {
        return Health::Ok;
    }
    Health::from_ratio(used as f64 / max as f64, CONNECTION_WARN_RATIO, CONNECTION_CRITICAL_RATIO)
}

/// pg_stat_user_tables 한 행
#[derive(Debug, Clone, PartialEq)]
pub struct TableStats {
    pub name: String,
    pub live_tuples: i64,
    pub dead_tuples: i64,
    pub seq_scan: i64,
    pub idx_scan: i64,
    pub last_vacuum: Option<DateTime<Utc>>,
}

impl TableStats {
    pub fn dead_ratio(&self) -> f64 {
        dead_tuple_ratio(self.live_tuples, self.dead_tuples)
    }

    pub fn health(&self) -> Health {
        dead_tuple_health(self.dead_ratio())
    }
}

/// 모니터링 이력 테이블에 들어갈 한 행
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRow {
    pub sampled_at: DateTime<Utc>,
    pub metric: &'static str,
    pub subject: String,
    pub value: f64,
}

/// 한 번의 폴링 결과
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub taken_at: DateTime<Utc>,
    /// (상태, 연결 수)
    pub connections: Vec<(String, i64)>,
    pub max_connections: i64,
    pub longest_query_seconds: f64,
    pub database_size: i64,
    pub tables: Vec<TableStats>,
}

impl Sample {
    pub async fn collect<C: GenericClient>(client: &C, schema: &str, top_tables: i64) -> Result<Self> {
        let taken_at = Utc::now();

        let connections: Vec<(String, i64)> = client
            .query(SELECT_CONNECTION_STATES, &[])
            .await?
            .iter()
            .map(|row| (row.get(0), row.get(1)))
            .collect();

        let longest_query_seconds: f64 = client.query_one(SELECT_LONGEST_ACTIVE_QUERY, &[]).await?.get(0);
        let max_connections: i64 = client.query_one(SELECT_MAX_CONNECTIONS, &[]).await?.get(0);
        let database_size: i64 = client.query_one(SELECT_DATABASE_SIZE, &[]).await?.get(0);

        let tables: Vec<TableStats> = client
            .query(SELECT_TABLE_STATS, &[&schema, &top_tables])
            .await?
            .iter()
            .map(|row| TableStats {
                name: row.get(0),
                live_tuples: row.get(1),
                dead_tuples: row.get(2),
                seq_scan: row.get(3),
                idx_scan: row.get(4),
                last_vacuum: row.get(5),
            })
            .collect();

        Ok(Self {
            taken_at,
            connections,
            max_connections,
            longest_query_seconds,
            database_size,
            tables,
        })
    }

    pub fn total_connections(&self) -> i64 {
        self.connections.iter().map(|(_, count)| count).sum()
    }

    pub fn connection_usage(&self) -> f64 {
        if self.max_connections <= 0 {
            return 0.0;
        }
        self.total_connections() as f64 / self.max_connections as f64
    }

    pub fn connection_health(&self) -> Health {
        connection_health(self.total_connections(), self.max_connections)
    }

    /// 가장 나쁜 상태
    pub fn overall_health(&self) -> Health {
        self.tables
            .iter()
            .map(TableStats::health)
            .chain(std::iter::once(self.connection_health()))
            .max()
            .unwrap_or(Health::Ok)
    }

    /// 이력 테이블용 행으로 펼침
    pub fn metric_rows(&self) -> Vec<MetricRow> {
        let row = |metric: &'static str, subject: &str, value: f64| MetricRow {
            sampled_at: self.taken_at,
            metric,
            subject: subject.to_string(),
            value,
        };

        let mut rows = Vec::with_capacity(4 + self.connections.len() + self.tables.len() * 2);
        rows.push(row("connections_total", "database", self.total_connections() as f64));
        rows.push(row("connection_usage", "database", self.connection_usage()));
        rows.push(row("longest_query_seconds", "database", self.longest_query_seconds));
        rows.push(row("database_size_bytes", "database", self.database_size as f64));
        for (state, count) in &self.connections {
            rows.push(row("connections", state, *count as f64));
        }
        for table in &self.tables {
            rows.push(row("live_tuples", &table.name, table.live_tuples as f64));
            rows.push(row("dead_tuple_ratio", &table.name, table.dead_ratio()));
        }
        rows
    }
}
