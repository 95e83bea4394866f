//! 에러 타입: 도메인별 에러 정의

/// kernlog 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum KernlogError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 입력 모듈 생명주기 에러
    #[error("module error: {0}")]
    Module(#[from] ModuleError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// 레거시 지시어 파일의 잘못된 줄
    #[error("malformed directive at line {line}: {reason}")]
    MalformedDirective { line: usize, reason: String },
}

/// 입력 모듈 생명주기 에러
///
/// 각 입력 모듈은 자체 에러 타입을 가지며, 레지스트리와 데몬 경계에서
/// 이 타입으로 변환됩니다.
#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    /// 동일한 이름의 모듈이 이미 등록됨
    #[error("module already registered: {name}")]
    AlreadyRegistered { name: String },

    /// 모듈을 찾을 수 없음
    #[error("module not found: {name}")]
    NotFound { name: String },

    /// 설정 로드 사이클 실패 (사이클 전체가 폐기됨)
    #[error("config load failed for '{module}': {reason}")]
    ConfigLoad { module: String, reason: String },

    /// 활성화 실패 (Running 진입 불가)
    #[error("activation failed for '{module}': {reason}")]
    Activation { module: String, reason: String },

    /// 현재 상태에서 허용되지 않는 진입점 호출
    #[error("'{module}': {entry_point} not allowed in state {state}")]
    InvalidTransition {
        module: String,
        entry_point: String,
        state: String,
    },

    /// 정지 실패 (여러 모듈의 에러가 수집될 수 있음)
    #[error("stop failed: {0}")]
    StopFailed(String),

    /// 모듈 내부 에러
    #[error("'{module}': {reason}")]
    Internal { module: String, reason: String },
}
