//! 커널 로그 드라이버: 플랫폼별 커널 로그 소스 추상화
//!
//! [`KernelLogDriver`]는 수집 루프가 사용하는 유일한 소스 인터페이스입니다.
//!
//! - [`kmsg`]: Linux `/dev/kmsg` 레코드 (`pri,seq,usec[,flags];text`)
//! - [`klog`]: 줄 단위 커널 로그 장치 (`/proc/kmsg`, BSD `/dev/klog`)
//!
//! 장치 열기와 콘솔 로그 레벨 변경처럼 권한이 필요한 작업은 `on_activate`에서만
//! 수행합니다. `next_line`은 드라이버의 대기 간격이 지나면 `Idle`을 반환하여
//! 수집 루프가 정지 요청을 확인할 수 있게 합니다.

#[cfg(unix)]
mod device;
#[cfg(unix)]
pub mod klog;
#[cfg(target_os = "linux")]
pub mod kmsg;

use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use tracing::warn;

use crate::config::EffectiveConfig;
use crate::error::DriverError;

#[cfg(unix)]
pub use klog::KlogDriver;
#[cfg(target_os = "linux")]
pub use kmsg::KmsgDriver;

/// PRI가 없는 줄에 사용하는 기본 PRI (kern.info)
pub const DEFAULT_LINE_PRIORITY: u32 = 6;

/// 드라이버가 읽은 커널 로그 한 줄
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelLine {
    /// 원시 텍스트 (PRI 포함 가능)
    pub text: Bytes,
    /// 드라이버가 알고 있는 메시지 시각
    pub timestamp: Option<SystemTime>,
    /// 텍스트에 PRI가 없을 때 사용할 PRI
    pub default_priority: u32,
}

impl KernelLine {
    pub fn new(text: impl Into<Bytes>) -> Self {
        Self {
            text: text.into(),
            timestamp: None,
            default_priority: DEFAULT_LINE_PRIORITY,
        }
    }

    pub fn with_timestamp(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_default_priority(mut self, priority: u32) -> Self {
        self.default_priority = priority;
        self
    }
}

/// 드라이버 공통 읽기 옵션
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverOptions {
    /// 활성화 시점 이전에 쌓인 메시지도 읽을지 여부
    pub read_existing: bool,
    /// 한 번의 읽기 대기 상한
    pub poll_interval: Duration,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            read_existing: false,
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// `next_line` 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    /// 한 줄을 읽음
    Line(KernelLine),
    /// 대기 간격 동안 읽을 줄이 없음
    Idle,
    /// 소스가 끝남 (수집 루프 종료)
    Shutdown,
}

/// 커널 로그 소스 드라이버
pub trait KernelLogDriver: Send + Sync + 'static {
    /// 드라이버 이름 (`kmsg`, `klog`, ...)
    fn name(&self) -> &'static str;

    /// 권한 강하 전에 호출됩니다. 장치를 열고 콘솔 로그 레벨을 설정합니다.
    fn on_activate(&mut self, config: &EffectiveConfig) -> Result<(), DriverError>;

    /// 다음 줄을 기다립니다.
    fn next_line(&mut self) -> impl Future<Output = Result<DriverEvent, DriverError>> + Send;

    /// 수집 종료 후 자원을 해제합니다.
    fn on_teardown(&mut self) -> Result<(), DriverError>;
}

// ─── Kernel timestamp ────────────────────────────────────────────────

/// 커널 메시지의 `[sec.usec]` 타임스탬프
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelStamp {
    /// 부팅 이후 경과 시간
    pub since_boot: Duration,
    /// 닫는 `]`와 뒤따르는 공백 하나까지 포함한 길이
    pub len: usize,
}

impl KernelStamp {
    /// 텍스트 선두의 `[  123.456789] ` 형식 타임스탬프를 파싱합니다.
    pub fn parse(text: &[u8]) -> Option<Self> {
        let rest = text.strip_prefix(b"[")?;
        let spaces = rest.iter().take_while(|b| **b == b' ').count();
        let rest = &rest[spaces..];

        let sec_len = rest.iter().take_while(|b| b.is_ascii_digit()).count();
        if sec_len == 0 || rest.get(sec_len) != Some(&b'.') {
            return None;
        }
        let frac = &rest[sec_len + 1..];
        let frac_len = frac.iter().take_while(|b| b.is_ascii_digit()).count();
        if frac_len == 0 || frac.get(frac_len) != Some(&b']') {
            return None;
        }

        let secs = parse_decimal(&rest[..sec_len])?;
        // 소수부는 마이크로초 정밀도로 정규화
        let micros = frac[..frac_len.min(6)]
            .iter()
            .chain(std::iter::repeat(&b'0'))
            .take(6)
            .fold(0u32, |acc, b| acc * 10 + u32::from(b - b'0'));

        let mut len = 1 + spaces + sec_len + 1 + frac_len + 1;
        if text.get(len) == Some(&b' ') {
            len += 1;
        }

        let since_boot =
            Duration::from_secs(secs).checked_add(Duration::from_micros(u64::from(micros)))?;
        Some(Self { since_boot, len })
    }

    /// `[%5ld.%06ld] ` 형식으로 씁니다.
    pub fn format(since_boot: Duration) -> String {
        format!(
            "[{:5}.{:06}] ",
            since_boot.as_secs(),
            since_boot.subsec_micros()
        )
    }
}

fn parse_decimal(digits: &[u8]) -> Option<u64> {
    digits.iter().try_fold(0u64, |acc, b| {
        acc.checked_mul(10)?.checked_add(u64::from(b - b'0'))
    })
}

/// 시스템 부팅 시각을 계산합니다 (`/proc/uptime` 기준).
///
/// 읽을 수 없으면 `None`을 반환하며 호출자는 수신 시각을 대신 사용합니다.
pub fn boot_time() -> Option<SystemTime> {
    let uptime = match std::fs::read_to_string("/proc/uptime") {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to read /proc/uptime, kernel timestamps disabled");
            return None;
        }
    };
    boot_time_from_uptime(&uptime, SystemTime::now())
}

fn boot_time_from_uptime(uptime: &str, now: SystemTime) -> Option<SystemTime> {
    let secs: f64 = uptime.split_whitespace().next()?.parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    now.checked_sub(Duration::from_secs_f64(secs))
        .filter(|t| *t >= UNIX_EPOCH)
}

/// 콘솔 로그 레벨을 설정합니다 (`klogctl(SYSLOG_ACTION_CONSOLE_LEVEL)`).
#[cfg(target_os = "linux")]
pub(crate) fn set_console_log_level(level: i32) -> Result<(), DriverError> {
    const SYSLOG_ACTION_CONSOLE_LEVEL: libc::c_int = 8;
    // SAFETY: CONSOLE_LEVEL 동작은 버퍼를 사용하지 않으므로 null 포인터와 레벨 값만 전달합니다.
    let rc = unsafe { libc::klogctl(SYSLOG_ACTION_CONSOLE_LEVEL, std::ptr::null_mut(), level) };
    if rc == -1 {
        return Err(DriverError::ConsoleLevel {
            level,
            source: std::io::Error::last_os_error(),
        });
    }
    Ok(())
}

#[cfg(all(unix, not(target_os = "linux")))]
pub(crate) fn set_console_log_level(_level: i32) -> Result<(), DriverError> {
    Err(DriverError::Unsupported("console log level"))
}
