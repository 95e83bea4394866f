//! 줄 단위 커널 로그 장치 드라이버 (`/proc/kmsg`, BSD `/dev/klog`)
//!
//! 장치에서 읽은 바이트를 줄 단위로 나눕니다. 각 줄은 `<pri>` 뒤에
//! `[sec.usec]` 커널 타임스탬프가 올 수 있습니다.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::SystemTime;

use bytes::{Bytes, BytesMut};
use kernlog_core::metrics as m;
use metrics::counter;
use tracing::{debug, info, warn};

use super::device::{DeviceReader, ReadOutcome};
use super::{DriverEvent, DriverOptions, KernelLine, KernelLogDriver, KernelStamp};
use crate::config::EffectiveConfig;
use crate::error::DriverError;

/// 플랫폼 기본 장치 경로
#[cfg(target_os = "linux")]
pub const KLOG_DEVICE_PATH: &str = "/proc/kmsg";
#[cfg(not(target_os = "linux"))]
pub const KLOG_DEVICE_PATH: &str = "/dev/klog";

/// 개행 없이 이 길이를 넘으면 강제로 한 줄로 자릅니다.
pub const MAX_LINE_LEN: usize = 8096;

const READ_BUF_SIZE: usize = 4096;

const DRIVER_NAME: &str = "klog";

/// 바이트 스트림을 줄로 나누는 누산기
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: BytesMut,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 데이터를 추가하고 완성된 줄(개행 제외)을 `out`에 넣습니다.
    pub fn push(&mut self, data: &[u8], out: &mut VecDeque<Bytes>) {
        self.pending.extend_from_slice(data);
        loop {
            let newline = self
                .pending
                .iter()
                .take(MAX_LINE_LEN)
                .position(|b| *b == b'\n');
            match newline {
                Some(pos) => {
                    let mut line = self.pending.split_to(pos + 1);
                    line.truncate(pos);
                    if line.last() == Some(&b'\r') {
                        line.truncate(pos - 1);
                    }
                    if !line.is_empty() {
                        out.push_back(line.freeze());
                    }
                }
                None if self.pending.len() >= MAX_LINE_LEN => {
                    out.push_back(self.pending.split_to(MAX_LINE_LEN).freeze());
                }
                None => break,
            }
        }
    }

    /// 남은 부분 줄을 꺼냅니다.
    pub fn flush(&mut self) -> Option<Bytes> {
        (!self.pending.is_empty()).then(|| self.pending.split().freeze())
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// PRI 뒤의 커널 타임스탬프를 찾습니다. `(stamp 시작 오프셋, stamp)`를 반환합니다.
pub fn find_stamp(line: &[u8]) -> Option<(usize, KernelStamp)> {
    let start = match line.first() {
        Some(b'<') => line.iter().position(|b| *b == b'>')? + 1,
        _ => 0,
    };
    KernelStamp::parse(&line[start..]).map(|stamp| (start, stamp))
}

/// 줄 단위 커널 로그 드라이버
#[derive(Debug)]
pub struct KlogDriver {
    options: DriverOptions,
    device: Option<DeviceReader>,
    buf: Vec<u8>,
    splitter: LineSplitter,
    ready: VecDeque<Bytes>,
    parse_stamp: bool,
    keep_stamp: bool,
    boot_time: Option<SystemTime>,
}

impl KlogDriver {
    pub fn new(options: DriverOptions) -> Self {
        Self {
            options,
            device: None,
            buf: vec![0; READ_BUF_SIZE],
            splitter: LineSplitter::new(),
            ready: VecDeque::new(),
            parse_stamp: false,
            keep_stamp: false,
            boot_time: None,
        }
    }

    /// 타임스탬프 설정을 적용하여 줄을 만듭니다.
    fn to_line(&self, text: Bytes) -> KernelLine {
        if !self.parse_stamp {
            return KernelLine::new(text);
        }
        let Some((start, stamp)) = find_stamp(&text) else {
            return KernelLine::new(text);
        };

        let text = if self.keep_stamp {
            text
        } else {
            let mut stripped = BytesMut::with_capacity(text.len() - stamp.len);
            stripped.extend_from_slice(&text[..start]);
            stripped.extend_from_slice(&text[start + stamp.len..]);
            stripped.freeze()
        };

        let line = KernelLine::new(text);
        match self.boot_time.and_then(|boot| boot.checked_add(stamp.since_boot)) {
            Some(at) => line.with_timestamp(at),
            None => line,
        }
    }
}

impl KernelLogDriver for KlogDriver {
    fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn on_activate(&mut self, config: &EffectiveConfig) -> Result<(), DriverError> {
        let path = config
            .source_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(KLOG_DEVICE_PATH));

        // 줄 단위 장치는 읽으면 소비되므로 위치 이동이 의미 없음
        let device = DeviceReader::open(&path, false)?;

        if let Some(level) = config.console_log_level
            && let Err(e) = super::set_console_log_level(level)
        {
            warn!(error = %e, "cannot set console log level, leaving it unchanged");
        }

        self.parse_stamp = config.parse_kernel_timestamp;
        self.keep_stamp = config.keep_kernel_timestamp;
        self.boot_time = if self.parse_stamp {
            super::boot_time()
        } else {
            None
        };
        self.splitter = LineSplitter::new();
        self.ready.clear();

        info!(
            path = %path.display(),
            parse_kernel_timestamp = self.parse_stamp,
            keep_kernel_timestamp = self.keep_stamp,
            "klog driver activated"
        );
        self.device = Some(device);
        Ok(())
    }

    async fn next_line(&mut self) -> Result<DriverEvent, DriverError> {
        if let Some(text) = self.ready.pop_front() {
            return Ok(DriverEvent::Line(self.to_line(text)));
        }

        let device = self.device.as_ref().ok_or(DriverError::NotActivated)?;
        let outcome = device.read(&mut self.buf, self.options.poll_interval).await?;
        match outcome {
            ReadOutcome::Data(n) => {
                self.splitter.push(&self.buf[..n], &mut self.ready);
                match self.ready.pop_front() {
                    Some(text) => Ok(DriverEvent::Line(self.to_line(text))),
                    None => Ok(DriverEvent::Idle),
                }
            }
            ReadOutcome::Idle => Ok(DriverEvent::Idle),
            ReadOutcome::Overrun => {
                counter!(m::KLOG_DRIVER_ERRORS_TOTAL, m::LABEL_DRIVER => DRIVER_NAME).increment(1);
                Ok(DriverEvent::Idle)
            }
            ReadOutcome::Eof => match self.splitter.flush() {
                Some(text) => {
                    self.ready.push_back(text);
                    Ok(DriverEvent::Idle)
                }
                None => Ok(DriverEvent::Shutdown),
            },
        }
    }

    fn on_teardown(&mut self) -> Result<(), DriverError> {
        if let Some(device) = self.device.take() {
            let dropped = self.ready.len() + usize::from(self.splitter.pending_len() > 0);
            debug!(path = %device.path().display(), dropped, "klog device closed");
        }
        self.ready.clear();
        self.splitter = LineSplitter::new();
        Ok(())
    }
}
