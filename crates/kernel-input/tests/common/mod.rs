//! 통합 테스트 공용 헬퍼 -- 스크립트 드라이버, 기록/실패 큐

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use bytes::Bytes;

use kernlog_kernel_input::{
    DriverError, DriverEvent, EffectiveConfig, HostIdentity, KernelLine, KernelLogDriver,
    KernelLogModule, KernelRecord, MessageQueue, SubmitError,
};

/// 드라이버 호출 기록
#[derive(Debug, Default)]
pub struct DriverProbe {
    pub activations: AtomicUsize,
    pub teardowns: AtomicUsize,
    pub last_config: Mutex<Option<EffectiveConfig>>,
}

impl DriverProbe {
    pub fn activations(&self) -> usize {
        self.activations.load(Ordering::SeqCst)
    }

    pub fn teardowns(&self) -> usize {
        self.teardowns.load(Ordering::SeqCst)
    }

    pub fn last_config(&self) -> Option<EffectiveConfig> {
        self.last_config.lock().unwrap().clone()
    }
}

/// 미리 정한 이벤트를 차례로 돌려주는 드라이버
///
/// 스크립트가 끝나면 `idle_when_empty`이면 `Idle`, 아니면 `Shutdown`을 반환합니다.
pub struct ScriptedDriver {
    events: VecDeque<Result<DriverEvent, DriverError>>,
    idle_when_empty: bool,
    fail_activate: bool,
    pub probe: Arc<DriverProbe>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self {
            events: VecDeque::new(),
            idle_when_empty: false,
            fail_activate: false,
            probe: Arc::new(DriverProbe::default()),
        }
    }

    pub fn lines(lines: &[&str]) -> Self {
        let mut driver = Self::new();
        for line in lines {
            driver = driver.line(line);
        }
        driver
    }

    pub fn line(mut self, text: &str) -> Self {
        self.events.push_back(Ok(DriverEvent::Line(KernelLine::new(Bytes::copy_from_slice(
            text.as_bytes(),
        )))));
        self
    }

    pub fn line_with(mut self, text: &str, default_priority: u32, ts: Option<SystemTime>) -> Self {
        let mut line =
            KernelLine::new(Bytes::copy_from_slice(text.as_bytes())).with_default_priority(default_priority);
        if let Some(ts) = ts {
            line = line.with_timestamp(ts);
        }
        self.events.push_back(Ok(DriverEvent::Line(line)));
        self
    }

    pub fn idle(mut self) -> Self {
        self.events.push_back(Ok(DriverEvent::Idle));
        self
    }

    pub fn error(mut self, message: &str) -> Self {
        self.events
            .push_back(Err(DriverError::Read(std::io::Error::other(message.to_owned()))));
        self
    }

    pub fn idle_when_empty(mut self) -> Self {
        self.idle_when_empty = true;
        self
    }

    pub fn failing_activate(mut self) -> Self {
        self.fail_activate = true;
        self
    }

    pub fn remaining(&self) -> usize {
        self.events.len()
    }
}

impl KernelLogDriver for ScriptedDriver {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn on_activate(&mut self, config: &EffectiveConfig) -> Result<(), DriverError> {
        if self.fail_activate {
            return Err(DriverError::Open {
                path: "/dev/kmsg".into(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            });
        }
        self.probe.activations.fetch_add(1, Ordering::SeqCst);
        *self.probe.last_config.lock().unwrap() = Some(config.clone());
        Ok(())
    }

    async fn next_line(&mut self) -> Result<DriverEvent, DriverError> {
        match self.events.pop_front() {
            Some(event) => event,
            None if self.idle_when_empty => {
                tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                Ok(DriverEvent::Idle)
            }
            None => Ok(DriverEvent::Shutdown),
        }
    }

    fn on_teardown(&mut self) -> Result<(), DriverError> {
        self.probe.teardowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// 제출된 레코드를 기록하는 큐
#[derive(Debug, Default)]
pub struct RecordingQueue {
    records: Mutex<Vec<KernelRecord>>,
}

impl RecordingQueue {
    pub fn records(&self) -> Vec<KernelRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn payloads(&self) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.payload_lossy().into_owned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

impl MessageQueue for RecordingQueue {
    async fn submit(&self, record: KernelRecord) -> Result<(), SubmitError> {
        self.records.lock().unwrap().push(record);
        Ok(())
    }
}

/// 지정한 순번(0부터)의 제출만 실패시키는 큐
#[derive(Debug)]
pub struct FailingQueue {
    fail_at: Vec<usize>,
    calls: AtomicUsize,
    pub inner: RecordingQueue,
}

impl FailingQueue {
    pub fn failing_at(fail_at: &[usize]) -> Self {
        Self {
            fail_at: fail_at.to_vec(),
            calls: AtomicUsize::new(0),
            inner: RecordingQueue::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MessageQueue for FailingQueue {
    async fn submit(&self, record: KernelRecord) -> Result<(), SubmitError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_at.contains(&call) {
            return Err(SubmitError::Closed);
        }
        self.inner.submit(record).await
    }
}

pub fn host() -> Arc<HostIdentity> {
    Arc::new(HostIdentity::new("testhost"))
}

/// 스크립트 드라이버와 기록 큐로 모듈을 만듭니다.
pub fn scripted_module(
    driver: ScriptedDriver,
) -> (
    KernelLogModule<ScriptedDriver, RecordingQueue>,
    Arc<RecordingQueue>,
    Arc<DriverProbe>,
) {
    let probe = Arc::clone(&driver.probe);
    let queue = Arc::new(RecordingQueue::default());
    let module = KernelLogModule::new(driver, Arc::clone(&queue), host());
    (module, queue, probe)
}
