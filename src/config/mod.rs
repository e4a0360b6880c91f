use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{
    is_valid_identifier, DEFAULT_SCHEMA, MAX_PARTITION_PARENT_LEN, MAX_PLAN_MONTHS,
};
use crate::db::config::DbConfig;
use crate::db::query::ExecMode;
use crate::error::{ReviewDbError, Result};

pub mod settings;

pub use settings::{ConfigSource, Settings};

/// 배포/테스트 설정
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    pub sql_dir: PathBuf,
    /// 실행 순서대로 나열한 배포 파일 (비어 있으면 sql_dir 의 *.sql 이름순)
    pub files: Vec<String>,
    pub test_dir: PathBuf,
    /// 실행 순서대로 나열한 테스트 파일 (비어 있으면 test_dir 의 *.sql 이름순)
    pub test_files: Vec<String>,
    pub mode: ExecModeSetting,
    pub continue_on_error: bool,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            sql_dir: PathBuf::from("sql"),
            files: Vec::new(),
            test_dir: PathBuf::from("sql/tests"),
            test_files: Vec::new(),
            mode: ExecModeSetting::Statements,
            continue_on_error: false,
        }
    }
}

/// 설정 파일용 실행 방식 표기
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecModeSetting {
    WholeFile,
    Statements,
}

impl From<ExecModeSetting> for ExecMode {
    fn from(setting: ExecModeSetting) -> Self {
        match setting {
            ExecModeSetting::WholeFile => ExecMode::WholeFile,
            ExecModeSetting::Statements => ExecMode::Statements,
        }
    }
}

/// 모니터링 설정
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub interval_seconds: u64,
    /// 대시보드에 표시할 테이블 수
    pub top_tables: i64,
    pub record_history: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 5,
            top_tables: 10,
            record_history: true,
        }
    }
}

/// 샘플 데이터 설정
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    pub games: u32,
    pub users: u32,
    pub reviews: u32,
    /// 답글이 달리는 리뷰 비율
    pub reply_ratio: f64,
    /// 오늘부터 거슬러 올라가는 기간 (월)
    pub months: u32,
    pub seed: u64,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            games: 50,
            users: 500,
            reviews: 1000,
            reply_ratio: 0.3,
            months: 6,
            seed: 42,
        }
    }
}

/// 도구 전체 설정
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub schema: String,
    pub database: DbConfig,
    pub deploy: DeployConfig,
    pub monitor: MonitorConfig,
    pub seed: SeedConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema: DEFAULT_SCHEMA.to_string(),
            database: DbConfig::default(),
            deploy: DeployConfig::default(),
            monitor: MonitorConfig::default(),
            seed: SeedConfig::default(),
        }
    }
}

impl Config {
    /// 설정 파일에서 Config 인스턴스 로드
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ReviewDbError::io(path, e))?;
        let config: Self = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// SQL 에 직접 들어가는 이름과 범위 값 검증
    pub fn validate(&self) -> Result<()> {
        if !is_valid_identifier(&self.schema) {
            return Err(ReviewDbError::Config(format!(
                "스키마 이름이 올바르지 않습니다: {:?}",
                self.schema
            )));
        }

        if let Some(table) = self
            .database
            .partitioning
            .tables
            .iter()
            .find(|table| !is_valid_identifier(table) || table.len() > MAX_PARTITION_PARENT_LEN)
        {
            return Err(ReviewDbError::Config(format!(
                "파티션 테이블 이름이 올바르지 않거나 {} 자를 넘습니다: {:?}",
                MAX_PARTITION_PARENT_LEN, table
            )));
        }

        let partitioning = &self.database.partitioning;
        if partitioning.future_partitions > MAX_PLAN_MONTHS {
            return Err(ReviewDbError::Config(format!(
                "future_partitions 는 {} 이하여야 합니다",
                MAX_PLAN_MONTHS
            )));
        }

        let jitter = self.database.retry.jitter;
        if !jitter.is_finite() || !(0.0..=1.0).contains(&jitter) {
            return Err(ReviewDbError::Config("retry.jitter 는 0.0 ~ 1.0 범위여야 합니다".into()));
        }

        if self.database.connection.max_connections == 0 {
            return Err(ReviewDbError::Config("max_connections 는 1 이상이어야 합니다".into()));
        }

        if !(0.0..=1.0).contains(&self.seed.reply_ratio) {
            return Err(ReviewDbError::Config("seed.reply_ratio 는 0.0 ~ 1.0 범위여야 합니다".into()));
        }

        let id_range = 1..=i32::MAX as u32;
        if !id_range.contains(&self.seed.games) || !id_range.contains(&self.seed.users) {
            return Err(ReviewDbError::Config(format!(
                "seed.games 와 seed.users 는 1 ~ {} 범위여야 합니다",
                i32::MAX
            )));
        }

        if self.seed.months > MAX_PLAN_MONTHS {
            return Err(ReviewDbError::Config(format!(
                "seed.months 는 {} 이하여야 합니다",
                MAX_PLAN_MONTHS
            )));
        }

        if self.monitor.interval_seconds == 0 {
            return Err(ReviewDbError::Config("monitor.interval_seconds 는 1 이상이어야 합니다".into()));
        }

        if self.monitor.top_tables < 1 {
            return Err(ReviewDbError::Config("monitor.top_tables 는 1 이상이어야 합니다".into()));
        }

        Ok(())
    }
}
