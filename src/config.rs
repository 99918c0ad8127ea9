// region:    --- Imports
use std::time::Duration;
use tracing::info;

// endregion: --- Imports

// region:    --- Config

/// 서비스 환경 설정
/// 모든 값은 환경 변수에서 읽어오며, 코어 로직에는 포함되지 않는다.
#[derive(Debug, Clone)]
pub struct Config {
    /// 데이터베이스 연결 문자열
    pub database_url: String,
    /// HTTP 서버 바인드 주소
    pub bind_addr: String,
    /// 최소 입찰 증가 단위 (통화 단위)
    pub minimum_increment: i64,
    /// 클라이언트 폴링 주기
    pub poll_interval: Duration,
    /// 롱폴 기본 대기 시간
    pub long_poll_timeout: Duration,
    /// 푸시 채널 재연결 최대 시도 횟수
    pub max_reconnect_attempts: u32,
}

impl Config {
    /// 환경 변수에서 설정 읽기
    pub fn from_env() -> Result<Self, String> {
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set".to_string())?;

        let bind_addr =
            std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let minimum_increment = Self::env_i64("MINIMUM_INCREMENT", 1000)?;
        let poll_interval_ms = Self::env_i64("POLL_INTERVAL_MS", 3000)?;
        let long_poll_timeout_ms = Self::env_i64("LONG_POLL_TIMEOUT_MS", 25_000)?;
        let max_reconnect_attempts = Self::env_i64("MAX_RECONNECT_ATTEMPTS", 5)? as u32;

        if minimum_increment <= 0 {
            return Err("MINIMUM_INCREMENT must be positive".to_string());
        }

        let config = Self {
            database_url,
            bind_addr,
            minimum_increment,
            poll_interval: Duration::from_millis(poll_interval_ms as u64),
            long_poll_timeout: Duration::from_millis(long_poll_timeout_ms as u64),
            max_reconnect_attempts,
        };

        info!(
            "{:<12} --> 설정 로드 완료: increment={}, poll={}ms",
            "Config", config.minimum_increment, poll_interval_ms
        );

        Ok(config)
    }

    /// 정수 환경 변수 읽기 (기본값 포함)
    fn env_i64(key: &str, default: i64) -> Result<i64, String> {
        match std::env::var(key) {
            Ok(v) => v
                .parse::<i64>()
                .map_err(|_| format!("{} must be an integer, got {:?}", key, v)),
            Err(_) => Ok(default),
        }
    }
}

// endregion: --- Config

// endregion: --- Tests
