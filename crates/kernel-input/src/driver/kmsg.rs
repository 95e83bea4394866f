//! Linux `/dev/kmsg` 드라이버
//!
//! 레코드 형식: `priority,sequence,usec[,flags];message\n[ KEY=value\n...]`
//!
//! 레코드 헤더의 PRI는 텍스트 앞에 `<pri>`로 붙여 전달하고 기본 PRI로도 사용합니다.
//! 헤더의 부팅 후 경과 시간은 `keep_kernel_timestamp`이면 `[sec.usec] ` 형식으로
//! 본문 앞에 남기고, `parse_kernel_timestamp`이면 레코드 시각으로 변환합니다.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use kernlog_core::metrics as m;
use metrics::counter;
use tracing::{debug, info, warn};

use super::device::{DeviceReader, ReadOutcome};
use super::{DriverEvent, DriverOptions, KernelLine, KernelLogDriver, KernelStamp};
use crate::config::EffectiveConfig;
use crate::error::DriverError;

/// 기본 장치 경로
pub const KMSG_DEVICE_PATH: &str = "/dev/kmsg";

/// 레코드 하나를 담기에 충분한 읽기 버퍼 크기
const READ_BUF_SIZE: usize = 8192;

const DRIVER_NAME: &str = "kmsg";

/// `/dev/kmsg` 레코드 한 건
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KmsgRecord<'a> {
    pub priority: u32,
    pub sequence: u64,
    /// 부팅 이후 경과 시간
    pub since_boot: Duration,
    /// 첫 줄 본문 (딕셔너리 줄 제외)
    pub message: &'a [u8],
}

/// kmsg 레코드를 파싱합니다. 헤더가 형식에 맞지 않으면 `None`입니다.
pub fn parse_record(data: &[u8]) -> Option<KmsgRecord<'_>> {
    let sep = data.iter().position(|b| *b == b';')?;
    let header = std::str::from_utf8(&data[..sep]).ok()?;
    let mut fields = header.split(',');

    let priority = fields.next()?.trim().parse().ok()?;
    let sequence = fields.next()?.trim().parse().ok()?;
    let usec: u64 = fields.next()?.trim().parse().ok()?;

    let body = &data[sep + 1..];
    let end = body.iter().position(|b| *b == b'\n').unwrap_or(body.len());

    Some(KmsgRecord {
        priority,
        sequence,
        since_boot: Duration::from_micros(usec),
        message: &body[..end],
    })
}

/// `/dev/kmsg` 드라이버
#[derive(Debug)]
pub struct KmsgDriver {
    options: DriverOptions,
    device: Option<DeviceReader>,
    buf: Vec<u8>,
    keep_stamp: bool,
    /// `parse_kernel_timestamp`가 켜져 있고 부팅 시각을 알 때만 `Some`
    boot_time: Option<SystemTime>,
    last_sequence: Option<u64>,
}

impl KmsgDriver {
    pub fn new(options: DriverOptions) -> Self {
        Self {
            options,
            device: None,
            buf: vec![0; READ_BUF_SIZE],
            keep_stamp: false,
            boot_time: None,
            last_sequence: None,
        }
    }

    /// 레코드를 수집 루프에 넘길 줄로 변환합니다.
    fn to_line(&self, record: &KmsgRecord<'_>) -> KernelLine {
        let prefix = format!("<{}>", record.priority);
        let stamp = self
            .keep_stamp
            .then(|| KernelStamp::format(record.since_boot));

        let mut text = Vec::with_capacity(
            prefix.len() + stamp.as_ref().map_or(0, String::len) + record.message.len(),
        );
        text.extend_from_slice(prefix.as_bytes());
        if let Some(stamp) = &stamp {
            text.extend_from_slice(stamp.as_bytes());
        }
        text.extend_from_slice(record.message);

        let line = KernelLine::new(Bytes::from(text)).with_default_priority(record.priority);
        match self
            .boot_time
            .and_then(|boot| boot.checked_add(record.since_boot))
        {
            Some(at) => line.with_timestamp(at),
            None => line,
        }
    }

    fn note_sequence(&mut self, sequence: u64) {
        if let Some(last) = self.last_sequence
            && sequence > last.saturating_add(1)
        {
            debug!(missed = sequence - last - 1, "kmsg sequence gap");
        }
        self.last_sequence = Some(sequence);
    }
}

impl KernelLogDriver for KmsgDriver {
    fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn on_activate(&mut self, config: &EffectiveConfig) -> Result<(), DriverError> {
        let path: PathBuf = config
            .source_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(KMSG_DEVICE_PATH));

        let device = DeviceReader::open(&path, !self.options.read_existing)?;

        if let Some(level) = config.console_log_level
            && let Err(e) = super::set_console_log_level(level)
        {
            warn!(error = %e, "cannot set console log level, leaving it unchanged");
        }

        self.keep_stamp = config.keep_kernel_timestamp;
        self.boot_time = if config.parse_kernel_timestamp {
            super::boot_time()
        } else {
            None
        };
        self.last_sequence = None;

        info!(
            path = %path.display(),
            read_existing = self.options.read_existing,
            parse_kernel_timestamp = self.boot_time.is_some(),
            keep_kernel_timestamp = self.keep_stamp,
            "kmsg driver activated"
        );
        self.device = Some(device);
        Ok(())
    }

    async fn next_line(&mut self) -> Result<DriverEvent, DriverError> {
        let device = self.device.as_ref().ok_or(DriverError::NotActivated)?;
        let outcome = device.read(&mut self.buf, self.options.poll_interval).await?;

        let n = match outcome {
            ReadOutcome::Data(n) => n,
            ReadOutcome::Idle => return Ok(DriverEvent::Idle),
            ReadOutcome::Overrun => {
                counter!(m::KLOG_DRIVER_ERRORS_TOTAL, m::LABEL_DRIVER => DRIVER_NAME).increment(1);
                self.last_sequence = None;
                return Ok(DriverEvent::Idle);
            }
            ReadOutcome::Eof => return Ok(DriverEvent::Shutdown),
        };

        let Some(record) = parse_record(&self.buf[..n]) else {
            counter!(m::KLOG_DRIVER_ERRORS_TOTAL, m::LABEL_DRIVER => DRIVER_NAME).increment(1);
            warn!(
                record = %String::from_utf8_lossy(&self.buf[..n]).trim_end(),
                "malformed kmsg record skipped"
            );
            return Ok(DriverEvent::Idle);
        };

        let line = self.to_line(&record);
        let sequence = record.sequence;
        self.note_sequence(sequence);
        Ok(DriverEvent::Line(line))
    }

    fn on_teardown(&mut self) -> Result<(), DriverError> {
        if let Some(device) = self.device.take() {
            debug!(path = %device.path().display(), "kmsg device closed");
        }
        Ok(())
    }
}

impl KmsgDriver {
    /// 활성화된 장치 경로
    pub fn device_path(&self) -> Option<&Path> {
        self.device.as_ref().map(DeviceReader::path)
    }
}

#[cfg(test)]
mod tests {
    use std::time::UNIX_EPOCH;

    use super::*;

    #[test]
    fn parses_basic_record() {
        let record = parse_record(b"6,1234,5678901;eth0: link up\n").unwrap();
        assert_eq!(record.priority, 6);
        assert_eq!(record.sequence, 1234);
        assert_eq!(record.since_boot, Duration::from_micros(5_678_901));
        assert_eq!(record.message, b"eth0: link up");
    }

    #[test]
    fn parses_flags_and_drops_dictionary_lines() {
        let record =
            parse_record(b"30,7,100,c;systemd[1]: started\n SUBSYSTEM=net\n DEVICE=n2\n").unwrap();
        assert_eq!(record.priority, 30);
        assert_eq!(record.message, b"systemd[1]: started");
    }

    #[test]
    fn message_may_contain_semicolons() {
        let record = parse_record(b"4,1,1;a;b;c").unwrap();
        assert_eq!(record.message, b"a;b;c");
    }

    #[test]
    fn rejects_malformed_headers() {
        for data in [
            &b"no separator"[..],
            b"6,1;missing usec",
            b"x,1,1;bad pri",
            b"6,y,1;bad seq",
            b"6,1,z;bad usec",
            b";empty header",
        ] {
            assert!(parse_record(data).is_none(), "{:?}", data);
        }
    }

    #[test]
    fn line_carries_pri_prefix_and_default_priority() {
        let driver = KmsgDriver::new(DriverOptions::default());
        let record = parse_record(b"3,1,2000000;disk error").unwrap();
        let line = driver.to_line(&record);
        assert_eq!(&line.text[..], b"<3>disk error");
        assert_eq!(line.default_priority, 3);
        assert_eq!(line.timestamp, None);
    }

    #[test]
    fn keep_stamp_prefixes_kernel_time() {
        let mut driver = KmsgDriver::new(DriverOptions::default());
        driver.keep_stamp = true;
        let record = parse_record(b"6,1,12345678;usb 1-1: new device").unwrap();
        let line = driver.to_line(&record);
        assert_eq!(&line.text[..], b"<6>[   12.345678] usb 1-1: new device");
    }

    #[test]
    fn boot_time_yields_record_timestamp() {
        let mut driver = KmsgDriver::new(DriverOptions::default());
        let boot = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        driver.boot_time = Some(boot);
        let record = parse_record(b"6,1,1500000;x").unwrap();
        let line = driver.to_line(&record);
        assert_eq!(line.timestamp, Some(boot + Duration::from_millis(1500)));
    }

    #[tokio::test]
    async fn next_line_before_activation_fails() {
        let mut driver = KmsgDriver::new(DriverOptions::default());
        assert!(matches!(
            driver.next_line().await,
            Err(DriverError::NotActivated)
        ));
        assert!(driver.device_path().is_none());
        assert!(driver.on_teardown().is_ok());
    }

    #[test]
    fn activation_with_missing_device_fails() {
        let mut driver = KmsgDriver::new(DriverOptions::default());
        let config = EffectiveConfig {
            source_path: Some(PathBuf::from("/nonexistent/kmsg")),
            ..EffectiveConfig::default()
        };
        assert!(matches!(
            driver.on_activate(&config),
            Err(DriverError::Open { .. })
        ));
    }
}
