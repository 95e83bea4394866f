//! 레거시 줄 지시어
//!
//! 지시어 이름은 닫힌 열거형 [`LegacyDirective`]로 해석되며,
//! 알 수 없는 이름은 로드 시점 에러입니다.

use std::str::FromStr;

use kernlog_core::types::Facility;

use super::{DEFAULT_INTERNAL_MSG_FACILITY, EffectiveConfig, non_empty_path, parse_bool};
use crate::error::InputError;

/// 인식하지만 더 이상 지원하지 않는 지시어
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObsoleteDirective {
    DebugPrintKernelSymbols,
    SymbolLookup,
    SymbolsTwice,
    UseSyscallInterface,
}

impl ObsoleteDirective {
    pub const fn name(self) -> &'static str {
        match self {
            Self::DebugPrintKernelSymbols => "debugprintkernelsymbols",
            Self::SymbolLookup => "klogsymbollookup",
            Self::SymbolsTwice => "klogsymbolstwice",
            Self::UseSyscallInterface => "klogusesyscallinterface",
        }
    }
}

/// 입력 모듈이 처리하는 레거시 지시어
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyDirective {
    /// `$KLogPath <word>`
    Path,
    /// `$KLogPermitNonKernelFacility <bool>`
    PermitNonKernelFacility,
    /// `$KLogConsoleLogLevel <int>`
    ConsoleLogLevel,
    /// `$KLogInternalMsgFacility <facility>`
    InternalMsgFacility,
    /// `$KLogParseKernelTimestamp <bool>`
    ParseKernelTimestamp,
    /// `$KLogKeepKernelTimestamp <bool>`
    KeepKernelTimestamp,
    /// `$ResetConfigVariables` (인자 없음, 즉시 적용)
    ResetConfigVariables,
    /// 제거된 지시어
    Obsolete(ObsoleteDirective),
}

impl LegacyDirective {
    /// 소문자 정규화된 지시어 이름
    pub const fn name(self) -> &'static str {
        match self {
            Self::Path => "klogpath",
            Self::PermitNonKernelFacility => "klogpermitnonkernelfacility",
            Self::ConsoleLogLevel => "klogconsoleloglevel",
            Self::InternalMsgFacility => "kloginternalmsgfacility",
            Self::ParseKernelTimestamp => "klogparsekerneltimestamp",
            Self::KeepKernelTimestamp => "klogkeepkerneltimestamp",
            Self::ResetConfigVariables => "resetconfigvariables",
            Self::Obsolete(o) => o.name(),
        }
    }

    /// v2 블록 이후에는 사용할 수 없는 모듈 전역 지시어인지 여부
    pub const fn is_module_global(self) -> bool {
        !matches!(self, Self::ResetConfigVariables | Self::Obsolete(_))
    }
}

impl FromStr for LegacyDirective {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let directive = match s.trim().to_ascii_lowercase().as_str() {
            "klogpath" => Self::Path,
            "klogpermitnonkernelfacility" => Self::PermitNonKernelFacility,
            "klogconsoleloglevel" => Self::ConsoleLogLevel,
            "kloginternalmsgfacility" => Self::InternalMsgFacility,
            "klogparsekerneltimestamp" => Self::ParseKernelTimestamp,
            "klogkeepkerneltimestamp" => Self::KeepKernelTimestamp,
            "resetconfigvariables" => Self::ResetConfigVariables,
            "debugprintkernelsymbols" => Self::Obsolete(ObsoleteDirective::DebugPrintKernelSymbols),
            "klogsymbollookup" => Self::Obsolete(ObsoleteDirective::SymbolLookup),
            "klogsymbolstwice" => Self::Obsolete(ObsoleteDirective::SymbolsTwice),
            "klogusesyscallinterface" => Self::Obsolete(ObsoleteDirective::UseSyscallInterface),
            _ => {
                return Err(InputError::UnknownDirective {
                    name: s.trim().to_owned(),
                });
            }
        };
        Ok(directive)
    }
}

/// 레거시 지시어 누산기
///
/// 로드 사이클 시작 시와 `$ResetConfigVariables` 수신 시 기본값으로 초기화됩니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacySettings {
    pub permit_non_kernel_facility: bool,
    pub parse_kernel_timestamp: bool,
    pub keep_kernel_timestamp: bool,
    pub internal_msg_facility: Facility,
    /// `-1`은 변경하지 않음을 의미
    pub console_log_level: i32,
    /// 원시 경로 버퍼 (빈 문자열은 미설정)
    pub path: String,
}

impl Default for LegacySettings {
    fn default() -> Self {
        Self {
            permit_non_kernel_facility: false,
            parse_kernel_timestamp: false,
            keep_kernel_timestamp: false,
            internal_msg_facility: DEFAULT_INTERNAL_MSG_FACILITY,
            console_log_level: -1,
            path: String::new(),
        }
    }
}

impl LegacySettings {
    /// 모든 필드를 기본값으로 되돌립니다.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// 지시어 하나를 적용합니다.
    ///
    /// 인자 해석에 실패하면 누산기는 변경되지 않습니다.
    pub fn apply(&mut self, directive: LegacyDirective, argument: &str) -> Result<(), InputError> {
        let invalid = |reason: &str| InputError::InvalidDirectiveValue {
            name: directive.name().to_owned(),
            value: argument.to_owned(),
            reason: reason.to_owned(),
        };
        let boolean = || parse_bool(argument).ok_or_else(|| invalid("expected on/off"));

        match directive {
            LegacyDirective::Path => {
                self.path = argument.split_whitespace().next().unwrap_or("").to_owned();
            }
            LegacyDirective::PermitNonKernelFacility => {
                self.permit_non_kernel_facility = boolean()?;
            }
            LegacyDirective::ParseKernelTimestamp => {
                self.parse_kernel_timestamp = boolean()?;
            }
            LegacyDirective::KeepKernelTimestamp => {
                self.keep_kernel_timestamp = boolean()?;
            }
            LegacyDirective::ConsoleLogLevel => {
                self.console_log_level = argument
                    .trim()
                    .parse::<i32>()
                    .map_err(|_| invalid("expected an integer"))?;
            }
            LegacyDirective::InternalMsgFacility => {
                self.internal_msg_facility = argument
                    .parse::<Facility>()
                    .map_err(|e| invalid(&e.to_string()))?;
            }
            LegacyDirective::ResetConfigVariables => self.reset(),
            LegacyDirective::Obsolete(o) => {
                return Err(InputError::ObsoleteDirective {
                    name: o.name().to_owned(),
                });
            }
        }
        Ok(())
    }

    /// 누산된 값을 유효 설정으로 변환합니다.
    pub fn to_effective(&self) -> EffectiveConfig {
        EffectiveConfig {
            permit_non_kernel_facility: self.permit_non_kernel_facility,
            parse_kernel_timestamp: self.parse_kernel_timestamp,
            keep_kernel_timestamp: self.keep_kernel_timestamp,
            internal_msg_facility: self.internal_msg_facility,
            console_log_level: (self.console_log_level != -1).then_some(self.console_log_level),
            source_path: non_empty_path(&self.path),
        }
    }
}
