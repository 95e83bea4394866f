//! 커널 로그 입력 에러 타입
//!
//! [`InputError`]는 입력 모듈 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<InputError> for KernlogError` 변환이 구현되어 있어
//! 데몬에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.
//!
//! PRI 파싱 실패와 큐 제출 실패는 수집 루프 안에서 흡수되며,
//! 설정 로드와 활성화 실패만 호출자에게 전파됩니다.

use std::path::PathBuf;

use kernlog_core::error::{KernlogError, ModuleError};
use kernlog_core::module::{EntryPoint, LifecycleState};

use crate::MODULE_NAME;
use crate::config::StorePhase;
use crate::queue::SubmitError;

/// 커널 로그 입력 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    /// `<digits>` 형식이 아님 (호출자가 대체 경로로 처리)
    #[error("invalid PRI format at offset {offset}: {reason}")]
    InvalidPriFormat {
        /// 실패 위치 (바이트 오프셋)
        offset: usize,
        /// 실패 사유
        reason: &'static str,
    },

    /// 구조화 파라미터 블록 처리 실패 (로드 사이클 폐기)
    #[error("error processing module config parameters: {0}")]
    MissingConfigParams(String),

    /// 큐 제출 실패 (해당 줄만 중단)
    #[error("submit failed: {0}")]
    SubmitFailed(#[from] SubmitError),

    /// 드라이버 에러
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    /// 알 수 없는 레거시 지시어
    #[error("unknown directive '${name}'")]
    UnknownDirective { name: String },

    /// 더 이상 지원하지 않는 레거시 지시어
    #[error("directive '${name}' is no longer supported")]
    ObsoleteDirective { name: String },

    /// 레거시 지시어 인자 오류
    #[error("invalid value '{value}' for '${name}': {reason}")]
    InvalidDirectiveValue {
        name: String,
        value: String,
        reason: String,
    },

    /// v2 블록 이후 모듈 전역 레거시 지시어 사용
    #[error(
        "legacy directive '${name}' is not permitted after module() parameters were set"
    )]
    LegacyNotPermitted { name: String },

    /// 확정된 설정 값 오류
    #[error("invalid config value for '{field}': {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// 설정 저장소를 순서에 맞지 않게 사용
    #[error("config store: {operation} not allowed in phase {phase}")]
    ConfigPhase {
        operation: &'static str,
        phase: StorePhase,
    },

    /// 현재 상태에서 허용되지 않는 진입점
    #[error("{entry_point} not allowed in state {state}")]
    InvalidTransition {
        entry_point: EntryPoint,
        state: LifecycleState,
    },

    /// module_exit 이후 호출
    #[error("module already exited")]
    ModuleExited,

    /// 수집 태스크 합류 실패
    #[error("ingest task failed: {0}")]
    IngestTask(String),
}

/// 커널 로그 드라이버 에러
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// 장치 열기 실패
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 읽기 실패
    #[error("read failed: {0}")]
    Read(#[source] std::io::Error),

    /// 콘솔 로그 레벨 설정 실패
    #[error("failed to set console log level {level}: {source}")]
    ConsoleLevel {
        level: i32,
        #[source]
        source: std::io::Error,
    },

    /// 활성화 전에 읽기 시도
    #[error("driver not activated")]
    NotActivated,

    /// 이 플랫폼에서 지원하지 않는 기능
    #[error("unsupported on this platform: {0}")]
    Unsupported(&'static str),
}

impl From<InputError> for KernlogError {
    fn from(err: InputError) -> Self {
        let module = MODULE_NAME.to_owned();
        let module_err = match err {
            InputError::InvalidTransition { entry_point, state } => {
                ModuleError::InvalidTransition {
                    module,
                    entry_point: entry_point.to_string(),
                    state: state.to_string(),
                }
            }
            InputError::MissingConfigParams(_)
            | InputError::UnknownDirective { .. }
            | InputError::ObsoleteDirective { .. }
            | InputError::InvalidDirectiveValue { .. }
            | InputError::LegacyNotPermitted { .. }
            | InputError::InvalidConfig { .. } => ModuleError::ConfigLoad {
                module,
                reason: err.to_string(),
            },
            InputError::Driver(_) => ModuleError::Activation {
                module,
                reason: err.to_string(),
            },
            InputError::IngestTask(reason) => {
                ModuleError::StopFailed(format!("{MODULE_NAME}: {reason}"))
            }
            InputError::InvalidPriFormat { .. }
            | InputError::ConfigPhase { .. }
            | InputError::SubmitFailed(_)
            | InputError::ModuleExited => ModuleError::Internal {
                module,
                reason: err.to_string(),
            },
        };
        KernlogError::Module(module_err)
    }
}
