//! 입력 모듈 설정: 레거시/v2 누산기와 로드 사이클별 병합
//!
//! - [`legacy`]: `$KLog...` 줄 지시어 누산기
//! - [`v2`]: `module(...)` 구조화 파라미터 누산기
//! - [`store`]: 로드 사이클 상태 기계와 병합 정책
//!
//! 병합 결과인 [`EffectiveConfig`]는 실행 사이클 동안 변경되지 않습니다.

pub mod legacy;
pub mod store;
pub mod v2;

use std::path::PathBuf;

use kernlog_core::types::Facility;

pub use legacy::{LegacyDirective, LegacySettings, ObsoleteDirective};
pub use store::{ConfigLoadState, ConfigStore, StorePhase};
pub use v2::{V2Param, V2Settings};

/// 내부 메시지 facility 기본값
pub const DEFAULT_INTERNAL_MSG_FACILITY: Facility = Facility::Syslog;

/// 콘솔 로그 레벨로 허용되는 최댓값
pub const MAX_CONSOLE_LOG_LEVEL: i32 = 8;

/// 한 실행 사이클의 유효 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    /// 커널 이외 facility 메시지 허용 여부
    pub permit_non_kernel_facility: bool,
    /// 커널 타임스탬프(`[sec.usec]`)를 레코드 시각으로 사용할지 여부
    pub parse_kernel_timestamp: bool,
    /// 해석한 커널 타임스탬프를 메시지 본문에 남길지 여부
    pub keep_kernel_timestamp: bool,
    /// 모듈 내부 진단 메시지의 facility
    pub internal_msg_facility: Facility,
    /// 활성화 시 설정할 콘솔 로그 레벨 (`None`이면 변경하지 않음)
    pub console_log_level: Option<i32>,
    /// 커널 로그 장치 경로 (`None`이면 드라이버 기본 경로)
    pub source_path: Option<PathBuf>,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            permit_non_kernel_facility: false,
            parse_kernel_timestamp: false,
            keep_kernel_timestamp: false,
            internal_msg_facility: DEFAULT_INTERNAL_MSG_FACILITY,
            console_log_level: None,
            source_path: None,
        }
    }
}

/// on/off, yes/no, true/false, 1/0 (대소문자 무시)
pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "yes" | "true" | "1" => Some(true),
        "off" | "no" | "false" | "0" => Some(false),
        _ => None,
    }
}

/// 빈 경로는 드라이버 기본값을 의미합니다.
pub(crate) fn non_empty_path(raw: &str) -> Option<PathBuf> {
    if raw.is_empty() {
        None
    } else {
        Some(PathBuf::from(raw))
    }
}
