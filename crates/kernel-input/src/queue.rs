//! 메인 큐 인터페이스와 tokio 채널 구현
//!
//! [`ChannelQueue`]는 light-delay 흐름 제어를 구현합니다. 큐에 공간이 없으면
//! 정해진 시간까지만 기다리고, 그래도 공간이 없으면 제출을 실패로 처리합니다.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};

use crate::message::KernelRecord;

/// 큐 제출 실패 사유
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    /// 수신 측이 닫힘
    #[error("queue closed")]
    Closed,
    /// light-delay 대기 시간 초과
    #[error("queue full after waiting {0:?}")]
    Timeout(Duration),
}

/// 레코드를 받는 메인 큐
///
/// 제출된 레코드의 소유권은 큐로 이동합니다.
pub trait MessageQueue: Send + Sync + 'static {
    fn submit(&self, record: KernelRecord) -> impl Future<Output = Result<(), SubmitError>> + Send;
}

/// 제한된 `mpsc` 채널 기반 큐
#[derive(Debug, Clone)]
pub struct ChannelQueue {
    tx: mpsc::Sender<KernelRecord>,
    light_delay: Duration,
}

impl ChannelQueue {
    /// 용량 `capacity`의 큐와 수신 측을 만듭니다.
    pub fn bounded(capacity: usize, light_delay: Duration) -> (Self, mpsc::Receiver<KernelRecord>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx, light_delay }, rx)
    }

    pub fn light_delay(&self) -> Duration {
        self.light_delay
    }
}

impl MessageQueue for ChannelQueue {
    async fn submit(&self, record: KernelRecord) -> Result<(), SubmitError> {
        let record = match self.tx.try_send(record) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Closed(_)) => return Err(SubmitError::Closed),
            Err(TrySendError::Full(record)) => record,
        };

        match self.tx.send_timeout(record, self.light_delay).await {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Closed(_)) => Err(SubmitError::Closed),
            Err(SendTimeoutError::Timeout(_)) => Err(SubmitError::Timeout(self.light_delay)),
        }
    }
}
