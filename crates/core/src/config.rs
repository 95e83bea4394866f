//! 설정 관리: kernlog.toml 파싱 및 런타임 설정
//!
//! [`KernlogConfig`]는 데몬과 입력 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`KERNLOG_KLOG_DRIVER=klog` 형식)
//! 3. 설정 파일 (`kernlog.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! `[klog.module]` 테이블은 입력 모듈의 구조화(v2) 파라미터 블록으로,
//! 해석 없이 그대로 모듈에 전달됩니다.
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), kernlog_core::error::KernlogError> {
//! use kernlog_core::config::KernlogConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = KernlogConfig::load("kernlog.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = KernlogConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, KernlogError};

/// kernlog 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KernlogConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 메인 큐 설정
    #[serde(default)]
    pub queue: QueueConfig,
    /// 커널 로그 입력 설정
    #[serde(default)]
    pub klog: KlogConfig,
    /// 메트릭 노출 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl KernlogConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, KernlogError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, KernlogError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                KernlogError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                KernlogError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, KernlogError> {
        toml::from_str(toml_str).map_err(|e| {
            KernlogError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `KERNLOG_{SECTION}_{FIELD}`
    /// 예: `KERNLOG_GENERAL_LOG_LEVEL=debug`
    ///
    /// `[klog.module]` 블록은 환경변수로 오버라이드할 수 없습니다.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "KERNLOG_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "KERNLOG_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.hostname, "KERNLOG_GENERAL_HOSTNAME");

        // Queue
        override_usize(&mut self.queue.capacity, "KERNLOG_QUEUE_CAPACITY");
        override_u64(&mut self.queue.light_delay_ms, "KERNLOG_QUEUE_LIGHT_DELAY_MS");

        // Klog
        override_bool(&mut self.klog.enabled, "KERNLOG_KLOG_ENABLED");
        override_string(&mut self.klog.driver, "KERNLOG_KLOG_DRIVER");
        override_string(&mut self.klog.legacy_config, "KERNLOG_KLOG_LEGACY_CONFIG");
        override_bool(&mut self.klog.read_existing, "KERNLOG_KLOG_READ_EXISTING");
        override_u64(
            &mut self.klog.poll_interval_ms,
            "KERNLOG_KLOG_POLL_INTERVAL_MS",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "KERNLOG_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "KERNLOG_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "KERNLOG_METRICS_PORT");
        override_string(&mut self.metrics.endpoint, "KERNLOG_METRICS_ENDPOINT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), KernlogError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.queue.capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "queue.capacity".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.klog.enabled {
            let valid_drivers = ["kmsg", "klog"];
            if !valid_drivers.contains(&self.klog.driver.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: "klog.driver".to_owned(),
                    reason: format!("must be one of: {}", valid_drivers.join(", ")),
                }
                .into());
            }

            if self.klog.poll_interval_ms == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "klog.poll_interval_ms".to_owned(),
                    reason: "must be greater than 0".to_owned(),
                }
                .into());
            }
        }

        if self.metrics.enabled && !self.metrics.endpoint.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "metrics.endpoint".to_owned(),
                reason: "must start with '/'".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 레코드에 기록할 호스트명 (비어 있으면 시스템 호스트명 사용)
    pub hostname: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            hostname: String::new(),
        }
    }
}

/// 메인 큐 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// 큐 용량 (레코드 수)
    pub capacity: usize,
    /// light-delay 제출 시 최대 대기 시간 (밀리초)
    pub light_delay_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 4096,
            light_delay_ms: 1000,
        }
    }
}

/// 커널 로그 입력 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KlogConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 드라이버 (kmsg, klog)
    pub driver: String,
    /// 레거시 지시어 파일 경로 (비어 있으면 사용 안 함)
    pub legacy_config: String,
    /// kmsg 드라이버: 시작 시 링 버퍼의 기존 메시지를 재생할지 여부
    pub read_existing: bool,
    /// 드라이버 읽기 대기 간격 (밀리초). 정지 요청은 이 간격 안에 관측됩니다.
    pub poll_interval_ms: u64,
    /// 구조화(v2) 파라미터 블록
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<toml::Table>,
}

impl Default for KlogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            driver: "kmsg".to_owned(),
            legacy_config: String::new(),
            read_existing: false,
            poll_interval_ms: 500,
            module: None,
        }
    }
}

/// 메트릭 노출 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus 엔드포인트 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 포트
    pub port: u16,
    /// HTTP 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9464,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
