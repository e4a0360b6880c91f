//! review_system 스키마 배포, 테스트, 샘플 데이터, 파티션 관리, 모니터링 도구

pub mod config;
pub mod constants;
pub mod db;
pub mod deploy;
pub mod error;
pub mod metrics;
pub mod monitor;
pub mod seed;
pub mod shutdown;
pub mod suite;

pub use config::{Config, Settings};
pub use error::{ReviewDbError, Result};
