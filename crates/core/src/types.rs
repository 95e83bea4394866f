//! 도메인 타입: syslog 우선순위 구성 요소와 흐름 제어 등급
//!
//! 커널 로그 입력과 데몬의 출력 단계가 공유하는 값 타입을 정의합니다.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// PRI 값에서 facility 코드를 추출합니다 (`LOG_FAC` 매크로와 동일).
pub const fn pri_facility(pri: u32) -> u8 {
    ((pri & 0x3f8) >> 3) as u8
}

/// PRI 값에서 severity 코드를 추출합니다 (`LOG_PRI` 매크로와 동일).
pub const fn pri_severity(pri: u32) -> u8 {
    (pri & 0x07) as u8
}

/// facility와 severity를 PRI 값으로 합성합니다.
pub const fn make_pri(facility: Facility, severity: Severity) -> u32 {
    (facility as u32) * 8 + severity as u32
}

// ─── Facility ────────────────────────────────────────────────────────

/// syslog facility 코드 (0..=23)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Facility {
    Kern = 0,
    User = 1,
    Mail = 2,
    Daemon = 3,
    Auth = 4,
    Syslog = 5,
    Lpr = 6,
    News = 7,
    Uucp = 8,
    Cron = 9,
    Authpriv = 10,
    Ftp = 11,
    Ntp = 12,
    Audit = 13,
    Alert = 14,
    Clock = 15,
    Local0 = 16,
    Local1 = 17,
    Local2 = 18,
    Local3 = 19,
    Local4 = 20,
    Local5 = 21,
    Local6 = 22,
    Local7 = 23,
}

impl Facility {
    const ALL: [Facility; 24] = [
        Self::Kern,
        Self::User,
        Self::Mail,
        Self::Daemon,
        Self::Auth,
        Self::Syslog,
        Self::Lpr,
        Self::News,
        Self::Uucp,
        Self::Cron,
        Self::Authpriv,
        Self::Ftp,
        Self::Ntp,
        Self::Audit,
        Self::Alert,
        Self::Clock,
        Self::Local0,
        Self::Local1,
        Self::Local2,
        Self::Local3,
        Self::Local4,
        Self::Local5,
        Self::Local6,
        Self::Local7,
    ];

    /// facility 코드에서 변환합니다. 범위를 벗어나면 `None`.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }

    /// facility 코드
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// syslog 표준 이름
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Kern => "kern",
            Self::User => "user",
            Self::Mail => "mail",
            Self::Daemon => "daemon",
            Self::Auth => "auth",
            Self::Syslog => "syslog",
            Self::Lpr => "lpr",
            Self::News => "news",
            Self::Uucp => "uucp",
            Self::Cron => "cron",
            Self::Authpriv => "authpriv",
            Self::Ftp => "ftp",
            Self::Ntp => "ntp",
            Self::Audit => "audit",
            Self::Alert => "alert",
            Self::Clock => "clock",
            Self::Local0 => "local0",
            Self::Local1 => "local1",
            Self::Local2 => "local2",
            Self::Local3 => "local3",
            Self::Local4 => "local4",
            Self::Local5 => "local5",
            Self::Local6 => "local6",
            Self::Local7 => "local7",
        }
    }
}

impl fmt::Display for Facility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// facility 파싱 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown facility: '{0}'")]
pub struct UnknownFacility(pub String);

impl FromStr for Facility {
    type Err = UnknownFacility;

    /// syslog 이름(대소문자 무시, `security`는 `auth`의 별칭) 또는 숫자 코드를 받습니다.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<u8>() {
            return Self::from_code(code).ok_or_else(|| UnknownFacility(s.to_owned()));
        }
        let lower = trimmed.to_ascii_lowercase();
        if lower == "security" {
            return Ok(Self::Auth);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == lower)
            .ok_or_else(|| UnknownFacility(s.to_owned()))
    }
}

// ─── Severity ────────────────────────────────────────────────────────

/// syslog severity (0 = emergency, 7 = debug)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Severity {
    Emergency = 0,
    Alert = 1,
    Critical = 2,
    Error = 3,
    Warning = 4,
    Notice = 5,
    Info = 6,
    Debug = 7,
}

impl Severity {
    /// 하위 3비트만 사용하므로 모든 입력에 대해 정의됩니다.
    pub const fn from_code(code: u8) -> Self {
        match code & 0x07 {
            0 => Self::Emergency,
            1 => Self::Alert,
            2 => Self::Critical,
            3 => Self::Error,
            4 => Self::Warning,
            5 => Self::Notice,
            6 => Self::Info,
            _ => Self::Debug,
        }
    }

    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Emergency => "emerg",
            Self::Alert => "alert",
            Self::Critical => "crit",
            Self::Error => "err",
            Self::Warning => "warning",
            Self::Notice => "notice",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── FlowControl ─────────────────────────────────────────────────────

/// 큐 제출 시 흐름 제어 등급
///
/// - `NoDelay`: 큐가 가득 차면 즉시 실패
/// - `LightDelay`: 제한된 시간 동안 대기 후 실패
/// - `FullDelay`: 공간이 생길 때까지 대기
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowControl {
    NoDelay,
    LightDelay,
    FullDelay,
}

impl fmt::Display for FlowControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDelay => write!(f, "no-delay"),
            Self::LightDelay => write!(f, "light-delay"),
            Self::FullDelay => write!(f, "full-delay"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pri_decomposition_matches_syslog_macros() {
        assert_eq!(pri_facility(5), 0);
        assert_eq!(pri_severity(5), 5);
        assert_eq!(pri_facility(13), 1);
        assert_eq!(pri_severity(13), 5);
        assert_eq!(pri_facility(191), 23);
        assert_eq!(pri_severity(191), 7);
    }

    #[test]
    fn pri_facility_masks_high_bits() {
        // 0x3f8 마스크 밖의 비트는 버려짐
        assert_eq!(pri_facility(1024 + 13), 1);
    }

    #[test]
    fn make_pri_roundtrips_components() {
        let pri = make_pri(Facility::Local4, Severity::Warning);
        assert_eq!(pri, 164);
        assert_eq!(pri_facility(pri), Facility::Local4.code());
        assert_eq!(pri_severity(pri), Severity::Warning.code());
    }

    #[test]
    fn facility_from_code_bounds() {
        assert_eq!(Facility::from_code(0), Some(Facility::Kern));
        assert_eq!(Facility::from_code(23), Some(Facility::Local7));
        assert_eq!(Facility::from_code(24), None);
    }

    #[test]
    fn facility_parse_names_and_numbers() {
        assert_eq!("kern".parse::<Facility>().unwrap(), Facility::Kern);
        assert_eq!("SYSLOG".parse::<Facility>().unwrap(), Facility::Syslog);
        assert_eq!("security".parse::<Facility>().unwrap(), Facility::Auth);
        assert_eq!("local7".parse::<Facility>().unwrap(), Facility::Local7);
        assert_eq!("5".parse::<Facility>().unwrap(), Facility::Syslog);
        assert!("24".parse::<Facility>().is_err());
        assert!("kernel".parse::<Facility>().is_err());
    }

    #[test]
    fn severity_from_code_masks() {
        assert_eq!(Severity::from_code(0), Severity::Emergency);
        assert_eq!(Severity::from_code(6), Severity::Info);
        assert_eq!(Severity::from_code(15), Severity::Debug);
    }

    #[test]
    fn severity_ordering_follows_urgency() {
        assert!(Severity::Emergency < Severity::Debug);
        assert!(Severity::Warning < Severity::Info);
    }

    #[test]
    fn display_strings() {
        assert_eq!(Facility::Authpriv.to_string(), "authpriv");
        assert_eq!(Severity::Warning.to_string(), "warning");
        assert_eq!(FlowControl::LightDelay.to_string(), "light-delay");
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Facility::Local0).unwrap();
        assert_eq!(json, "\"local0\"");
        let sev: Severity = serde_json::from_str("\"notice\"").unwrap();
        assert_eq!(sev, Severity::Notice);
    }
}
