//! 구조화(v2) 파라미터 블록
//!
//! ```toml
//! [klog.module]
//! logpath = "/proc/kmsg"
//! permitnonkernelfacility = true
//! consoleloglevel = 4
//! internalmsgfacility = "local0"
//! ```
//!
//! 각 필드는 명시적으로 설정되었는지 여부를 `Option`으로 기록합니다.
//! 설정되지 않은 필드는 병합 시 레거시 값이 아닌 기본값을 받습니다.

use std::str::FromStr;

use kernlog_core::module::ModuleParams;
use kernlog_core::types::Facility;

use super::{DEFAULT_INTERNAL_MSG_FACILITY, EffectiveConfig, non_empty_path, parse_bool};
use crate::error::InputError;

/// 입력 모듈이 받는 v2 파라미터
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum V2Param {
    LogPath,
    PermitNonKernelFacility,
    ConsoleLogLevel,
    InternalMsgFacility,
}

impl V2Param {
    pub const fn name(self) -> &'static str {
        match self {
            Self::LogPath => "logpath",
            Self::PermitNonKernelFacility => "permitnonkernelfacility",
            Self::ConsoleLogLevel => "consoleloglevel",
            Self::InternalMsgFacility => "internalmsgfacility",
        }
    }
}

impl FromStr for V2Param {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "logpath" => Ok(Self::LogPath),
            "permitnonkernelfacility" => Ok(Self::PermitNonKernelFacility),
            "consoleloglevel" => Ok(Self::ConsoleLogLevel),
            "internalmsgfacility" => Ok(Self::InternalMsgFacility),
            _ => Err(InputError::MissingConfigParams(format!(
                "unknown parameter '{s}'"
            ))),
        }
    }
}

/// v2 파라미터 누산기
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct V2Settings {
    pub log_path: Option<String>,
    pub permit_non_kernel_facility: Option<bool>,
    pub console_log_level: Option<i32>,
    pub internal_msg_facility: Option<Facility>,
}

impl V2Settings {
    /// 파라미터 블록 전체를 적용하고 적용된 파라미터 수를 반환합니다.
    ///
    /// 하나라도 인식할 수 없거나 형식이 잘못되면 아무것도 적용하지 않고
    /// `MissingConfigParams`를 반환합니다.
    pub fn apply_block(&mut self, params: &ModuleParams) -> Result<usize, InputError> {
        let mut staged = self.clone();
        for (key, value) in params {
            let param: V2Param = key.parse()?;
            staged.apply(param, value)?;
        }
        *self = staged;
        Ok(params.len())
    }

    fn apply(&mut self, param: V2Param, value: &toml::Value) -> Result<(), InputError> {
        let malformed = |expected: &str| {
            InputError::MissingConfigParams(format!(
                "parameter '{}' expects {expected}, got {}",
                param.name(),
                value.type_str()
            ))
        };

        match param {
            V2Param::LogPath => {
                let word = value.as_str().ok_or_else(|| malformed("a string"))?;
                self.log_path = Some(word.to_owned());
            }
            V2Param::PermitNonKernelFacility => {
                let flag = match value {
                    toml::Value::Boolean(b) => *b,
                    toml::Value::String(s) => parse_bool(s).ok_or_else(|| malformed("a boolean"))?,
                    toml::Value::Integer(0) => false,
                    toml::Value::Integer(1) => true,
                    _ => return Err(malformed("a boolean")),
                };
                self.permit_non_kernel_facility = Some(flag);
            }
            V2Param::ConsoleLogLevel => {
                let level = value
                    .as_integer()
                    .and_then(|n| i32::try_from(n).ok())
                    .ok_or_else(|| malformed("an integer"))?;
                self.console_log_level = Some(level);
            }
            V2Param::InternalMsgFacility => {
                let facility = match value {
                    toml::Value::String(s) => s.parse::<Facility>().ok(),
                    toml::Value::Integer(n) => u8::try_from(*n).ok().and_then(Facility::from_code),
                    _ => None,
                }
                .ok_or_else(|| malformed("a facility name or code"))?;
                self.internal_msg_facility = Some(facility);
            }
        }
        Ok(())
    }

    /// 설정된 값만 사용하고 나머지는 기본값으로 채운 유효 설정을 만듭니다.
    pub fn to_effective(&self) -> EffectiveConfig {
        EffectiveConfig {
            permit_non_kernel_facility: self.permit_non_kernel_facility.unwrap_or(false),
            parse_kernel_timestamp: false,
            keep_kernel_timestamp: false,
            internal_msg_facility: self
                .internal_msg_facility
                .unwrap_or(DEFAULT_INTERNAL_MSG_FACILITY),
            console_log_level: self.console_log_level.filter(|level| *level != -1),
            source_path: self.log_path.as_deref().and_then(non_empty_path),
        }
    }
}
