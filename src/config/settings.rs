use std::env;
use std::path::{Path, PathBuf};

use log::{info, warn};

use super::Config;
use crate::constants::DEFAULT_CONFIG_FILE;
use crate::error::Result;

/// 설정 소스 우선순위
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigSource {
    /// 명령행 인자
    CommandLine,
    /// 환경 변수
    Environment,
    /// 설정 파일
    File,
    /// 기본값
    Default,
}

impl ConfigSource {
    fn label(&self) -> &'static str {
        match self {
            ConfigSource::CommandLine => "명령행 인자",
            ConfigSource::Environment => "환경 변수",
            ConfigSource::File => "설정 파일",
            ConfigSource::Default => "기본값",
        }
    }
}

/// 통합 설정 관리자
#[derive(Clone, Debug)]
pub struct Settings {
    pub config: Config,
    /// 설정 파일 소스
    pub file_source: ConfigSource,
    pub file_path: Option<PathBuf>,
    /// 데이터베이스 연결 설정 소스
    pub db_source: ConfigSource,
}

impl Settings {
    /// 기본값 -> 설정 파일 -> .env -> 환경 변수 순서로 설정 로드
    pub fn load(path_override: Option<&Path>) -> Result<Self> {
        load_dotenv();

        let (config, file_source, file_path) = Self::load_config_file(path_override)?;
        let mut settings = Self {
            config,
            file_source,
            file_path,
            db_source: file_source,
        };

        settings.override_from_env();
        settings.config.validate()?;
        Ok(settings)
    }

    /// 설정 파일 로드
    fn load_config_file(path_override: Option<&Path>) -> Result<(Config, ConfigSource, Option<PathBuf>)> {
        // 1. 명령행으로 지정한 파일은 반드시 존재해야 함
        if let Some(path) = path_override {
            info!("설정 파일 로드: {}", path.display());
            let config = Config::from_file(path)?;
            return Ok((config, ConfigSource::CommandLine, Some(path.to_path_buf())));
        }

        // 2. 환경 변수에서 설정 파일 경로 확인
        if let Ok(path) = env::var("REVIEWDB_CONFIG") {
            info!("환경 변수에서 설정 파일 경로 로드: {}", path);
            if Path::new(&path).exists() {
                let config = Config::from_file(&path)?;
                return Ok((config, ConfigSource::Environment, Some(PathBuf::from(path))));
            }
            warn!("환경 변수에 지정된 설정 파일이 존재하지 않음: {}", path);
        }

        // 3. 현재 디렉토리의 기본 설정 파일 확인
        if Path::new(DEFAULT_CONFIG_FILE).exists() {
            info!("설정 파일 로드: {}", DEFAULT_CONFIG_FILE);
            let config = Config::from_file(DEFAULT_CONFIG_FILE)?;
            return Ok((config, ConfigSource::File, Some(PathBuf::from(DEFAULT_CONFIG_FILE))));
        }

        // 4. 기본 설정 사용
        info!("설정 파일을 찾을 수 없어 기본 설정 사용");
        Ok((Config::default(), ConfigSource::Default, None))
    }

    /// 환경 변수에서 설정 값 오버라이드
    pub fn override_from_env(&mut self) {
        self.apply_env(|key| env::var(key).ok());
    }

    /// 조회 함수로 주어진 변수 값 적용
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let connection = &mut self.config.database.connection;
        let mut changed = false;

        if let Some(host) = lookup("DB_HOST") {
            info!("환경 변수에서 DB 호스트 설정: {}", host);
            connection.host = host;
            changed = true;
        }

        if let Some(port) = lookup("DB_PORT") {
            match port.parse::<u16>() {
                Ok(port) => {
                    info!("환경 변수에서 DB 포트 설정: {}", port);
                    connection.port = port;
                    changed = true;
                }
                Err(_) => warn!("환경 변수 DB_PORT 값이 유효한 포트 번호가 아님: {}", port),
            }
        }

        if let Some(name) = lookup("DB_NAME") {
            info!("환경 변수에서 DB 이름 설정: {}", name);
            connection.database = name;
            changed = true;
        }

        if let Some(user) = lookup("DB_USER") {
            info!("환경 변수에서 DB 사용자 설정: {}", user);
            connection.user = user;
            changed = true;
        }

        if let Some(password) = lookup("DB_PASSWORD") {
            info!("환경 변수에서 DB 비밀번호 설정");
            connection.password = password;
            changed = true;
        }

        if let Some(sslmode) = lookup("DB_SSLMODE") {
            connection.sslmode = sslmode;
            changed = true;
        }

        if let Some(max_conn) = lookup("DB_MAX_CONNECTIONS") {
            match max_conn.parse::<usize>() {
                Ok(max) => {
                    info!("환경 변수에서 DB 최대 연결 수 설정: {}", max);
                    connection.max_connections = max;
                    changed = true;
                }
                Err(_) => warn!("환경 변수 DB_MAX_CONNECTIONS 값이 숫자가 아님: {}", max_conn),
            }
        }

        if changed {
            self.db_source = ConfigSource::Environment;
        }

        if let Some(dir) = lookup("REVIEWDB_SQL_DIR") {
            info!("환경 변수에서 SQL 디렉토리 설정: {}", dir);
            self.config.deploy.sql_dir = PathBuf::from(dir);
        }
    }

    /// 명령행 인자로 스키마 지정
    pub fn override_schema(&mut self, schema: &str) -> Result<()> {
        self.config.schema = schema.to_string();
        self.config.validate()
    }

    /// 설정 정보 로그 출력 - 비밀번호는 출력하지 않음
    pub fn log_settings(&self) {
        info!("설정 파일 소스: {}", self.file_source.label());
        if let Some(path) = &self.file_path {
            info!("설정 파일 경로: {}", path.display());
        }
        info!("데이터베이스 설정 소스: {}", self.db_source.label());
        info!("데이터베이스 연결: {}", self.config.database.connection.redacted());
        info!("대상 스키마: {}", self.config.schema);
    }
}

/// 작업 디렉토리의 .env 파일 로드 (이미 설정된 환경 변수는 유지)
fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => info!(".env 파일 로드: {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(".env 파일 로드 실패: {}", e),
    }
}
