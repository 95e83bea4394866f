//! 레코드 구성: 원시 줄과 결정된 PRI로 구조화 레코드를 만듭니다
//!
//! 모든 레코드는 모듈 수명 동안 유지되는 입력 식별자([`InputIdentity`])와
//! 데몬 전역 호스트 식별자([`HostIdentity`])를 `Arc`로 공유합니다.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use kernlog_core::types::{Facility, FlowControl, Severity, make_pri, pri_facility, pri_severity};

use crate::pri::PriResolution;

/// 커널 메시지 태그
pub const KERNEL_TAG: &str = "kernel:";

/// 내부 진단 메시지 태그
pub const INTERNAL_TAG: &str = "kernlog:";

/// 내부 진단 메시지 최대 길이 (바이트)
pub const INTERNAL_MSG_MAX: usize = 2048;

/// 입력 모듈 식별자 (모듈 초기화 시 한 번 생성)
#[derive(Debug, PartialEq, Eq)]
pub struct InputIdentity {
    /// 입력 이름 레이블
    pub input_name: String,
    /// 수신 주소 레이블 (루프백)
    pub source_ip: String,
}

impl InputIdentity {
    pub fn new(input_name: impl Into<String>) -> Self {
        Self {
            input_name: input_name.into(),
            source_ip: "127.0.0.1".to_owned(),
        }
    }
}

/// 데몬 전역 호스트 식별자
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    pub hostname: String,
}

impl HostIdentity {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
        }
    }
}

/// 큐에 제출되는 커널 로그 레코드
#[derive(Debug, Clone)]
pub struct KernelRecord {
    /// 원시 줄 (PRI 포함)
    pub raw: Bytes,
    /// 페이로드 시작 오프셋
    pub msg_offset: usize,
    /// facility 코드 (`LOG_FAC`, 0..=127)
    pub facility: u8,
    pub severity: Severity,
    pub tag: &'static str,
    /// 메시지 시각 (드라이버 제공 또는 수신 시각)
    pub timestamp: SystemTime,
    /// 수신 시각
    pub received_at: SystemTime,
    pub host: Arc<HostIdentity>,
    pub input: Arc<InputIdentity>,
    pub flow_control: FlowControl,
}

impl KernelRecord {
    /// PRI를 제외한 메시지 본문
    pub fn payload(&self) -> &[u8] {
        self.raw.get(self.msg_offset..).unwrap_or_default()
    }

    /// UTF-8이 아닌 바이트는 대체 문자로 바꾼 본문
    pub fn payload_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.payload())
    }

    /// 표준 facility (0..=23 범위 밖이면 `None`)
    pub fn facility(&self) -> Option<Facility> {
        Facility::from_code(self.facility)
    }

    /// facility와 severity로 재구성한 PRI
    pub fn priority(&self) -> u32 {
        u32::from(self.facility) * 8 + u32::from(self.severity.code())
    }
}

/// 레코드 생성기
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    input: Arc<InputIdentity>,
    host: Arc<HostIdentity>,
}

impl MessageBuilder {
    pub fn new(input: Arc<InputIdentity>, host: Arc<HostIdentity>) -> Self {
        Self { input, host }
    }

    pub fn input(&self) -> &Arc<InputIdentity> {
        &self.input
    }

    /// 커널 메시지 레코드를 만듭니다.
    ///
    /// `timestamp`가 없으면 수신 시각을 사용합니다. 흐름 제어는 항상 light-delay입니다.
    pub fn kernel(&self, raw: Bytes, resolution: &PriResolution, timestamp: Option<SystemTime>) -> KernelRecord {
        let received_at = SystemTime::now();
        KernelRecord {
            msg_offset: resolution.payload_offset.min(raw.len()),
            raw,
            facility: pri_facility(resolution.priority),
            severity: Severity::from_code(pri_severity(resolution.priority)),
            tag: KERNEL_TAG,
            timestamp: timestamp.unwrap_or(received_at),
            received_at,
            host: Arc::clone(&self.host),
            input: Arc::clone(&self.input),
            flow_control: FlowControl::LightDelay,
        }
    }

    /// 모듈 내부 진단 레코드를 만듭니다. 본문은 2048바이트로 잘립니다.
    pub fn internal(&self, facility: Facility, severity: Severity, text: &str) -> KernelRecord {
        let text = truncate_on_char_boundary(text, INTERNAL_MSG_MAX);
        let received_at = SystemTime::now();
        KernelRecord {
            raw: Bytes::copy_from_slice(text.as_bytes()),
            msg_offset: 0,
            facility: pri_facility(make_pri(facility, severity)),
            severity,
            tag: INTERNAL_TAG,
            timestamp: received_at,
            received_at,
            host: Arc::clone(&self.host),
            input: Arc::clone(&self.input),
            flow_control: FlowControl::LightDelay,
        }
    }
}

fn truncate_on_char_boundary(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::pri::resolve_priority;

    fn builder() -> MessageBuilder {
        MessageBuilder::new(
            Arc::new(InputIdentity::new("imklog")),
            Arc::new(HostIdentity::new("testhost")),
        )
    }

    #[test]
    fn kernel_record_strips_pri_and_decomposes() {
        let raw = Bytes::from_static(b"<5>kernel panic");
        let resolution = resolve_priority(&raw, 14);
        let record = builder().kernel(raw, &resolution, None);
        assert_eq!(record.payload(), b"kernel panic");
        assert_eq!(record.facility, 0);
        assert_eq!(record.severity, Severity::Notice);
        assert_eq!(record.tag, "kernel:");
        assert_eq!(record.flow_control, FlowControl::LightDelay);
        assert_eq!(record.priority(), 5);
        assert_eq!(record.timestamp, record.received_at);
    }

    #[test]
    fn driver_timestamp_is_preserved() {
        let ts = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let raw = Bytes::from_static(b"<6>eth0: link up");
        let resolution = resolve_priority(&raw, 14);
        let record = builder().kernel(raw, &resolution, Some(ts));
        assert_eq!(record.timestamp, ts);
        assert!(record.received_at > ts);
    }

    #[test]
    fn records_share_identities() {
        let b = builder();
        let raw = Bytes::from_static(b"<6>a");
        let r1 = b.kernel(raw.clone(), &resolve_priority(&raw, 6), None);
        let r2 = b.kernel(raw.clone(), &resolve_priority(&raw, 6), None);
        assert!(Arc::ptr_eq(&r1.input, &r2.input));
        assert!(Arc::ptr_eq(&r1.host, &r2.host));
        assert_eq!(r1.input.input_name, "imklog");
        assert_eq!(r1.input.source_ip, "127.0.0.1");
        assert_eq!(r1.host.hostname, "testhost");
    }

    #[test]
    fn non_standard_facility_is_kept_as_code() {
        let raw = Bytes::from_static(b"<1000>odd");
        let record = builder().kernel(raw.clone(), &resolve_priority(&raw, 6), None);
        assert_eq!(record.facility, 125);
        assert_eq!(record.facility(), None);
    }

    #[test]
    fn payload_lossy_replaces_invalid_utf8() {
        let raw = Bytes::from_static(b"<6>bad \xff byte");
        let record = builder().kernel(raw.clone(), &resolve_priority(&raw, 6), None);
        assert_eq!(record.payload_lossy(), "bad \u{fffd} byte");
    }

    #[test]
    fn internal_record_uses_internal_facility_and_cap() {
        let long = "é".repeat(INTERNAL_MSG_MAX);
        let record = builder().internal(Facility::Syslog, Severity::Warning, &long);
        assert_eq!(record.tag, INTERNAL_TAG);
        assert_eq!(record.facility(), Some(Facility::Syslog));
        assert_eq!(record.severity, Severity::Warning);
        assert!(record.raw.len() <= INTERNAL_MSG_MAX);
        assert!(std::str::from_utf8(&record.raw).is_ok());
    }

    #[test]
    fn truncate_keeps_short_text() {
        assert_eq!(truncate_on_char_boundary("abc", 10), "abc");
        assert_eq!(truncate_on_char_boundary("abcdef", 3), "abc");
        assert_eq!(truncate_on_char_boundary("aé", 2), "a");
    }
}
