//! 수집 루프: 드라이버에서 줄을 읽어 PRI를 결정하고 레코드를 큐에 제출합니다
//!
//! # 처리 흐름
//! ```text
//! driver.next_line() -> resolve_priority -> facility filter -> MessageBuilder -> queue.submit
//! ```
//!
//! PRI 파싱 실패, facility 필터링, 제출 실패는 모두 줄 단위로 흡수됩니다.
//! 루프는 정지 토큰이 취소되거나, 소스가 끝나거나, 드라이버 읽기가 실패할 때만
//! 종료하며 종료 시 드라이버를 호출자에게 돌려줍니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use kernlog_core::metrics as m;
use kernlog_core::types::{Facility, Severity, pri_facility};
use metrics::counter;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::EffectiveConfig;
use crate::driver::{DriverEvent, KernelLine, KernelLogDriver};
use crate::message::MessageBuilder;
use crate::pri::resolve_priority;
use crate::queue::{MessageQueue, SubmitError};

/// 한 줄 처리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// 큐에 제출됨
    Submitted,
    /// 커널 이외 facility라 버려짐
    Filtered,
    /// 큐 제출 실패 (루프는 계속)
    SubmitFailed,
}

/// 수집 통계 (루프와 모듈이 공유)
#[derive(Debug, Default)]
pub struct IngestStats {
    lines_read: AtomicU64,
    submitted: AtomicU64,
    filtered: AtomicU64,
    submit_failures: AtomicU64,
}

/// [`IngestStats`]의 특정 시점 값
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestSnapshot {
    pub lines_read: u64,
    pub submitted: u64,
    pub filtered: u64,
    pub submit_failures: u64,
}

impl IngestStats {
    pub fn snapshot(&self) -> IngestSnapshot {
        IngestSnapshot {
            lines_read: self.lines_read.load(Ordering::Relaxed),
            submitted: self.submitted.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            submit_failures: self.submit_failures.load(Ordering::Relaxed),
        }
    }
}

/// 수집 루프 종료 사유
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "detail")]
pub enum ExitReason {
    /// 정지 토큰 취소
    Stopped,
    /// 드라이버가 소스 종료를 알림
    SourceClosed,
    /// 드라이버 읽기 실패
    DriverFailed(String),
}

/// 수집 루프 종료 결과. 드라이버 소유권을 돌려줍니다.
#[derive(Debug)]
pub struct IngestExit<D> {
    pub driver: D,
    pub reason: ExitReason,
}

/// 줄 단위 처리기 (필터링, 레코드 구성, 제출)
struct LineProcessor<Q> {
    queue: Arc<Q>,
    builder: MessageBuilder,
    config: Arc<EffectiveConfig>,
    stats: Arc<IngestStats>,
}

impl<Q: MessageQueue> LineProcessor<Q> {
    async fn process(&self, line: KernelLine) -> LineOutcome {
        self.stats.lines_read.fetch_add(1, Ordering::Relaxed);
        counter!(m::KLOG_LINES_READ_TOTAL).increment(1);

        let resolution = resolve_priority(&line.text, line.default_priority);
        counter!(m::KLOG_PRI_RESOLVED_TOTAL, m::LABEL_PRI_SOURCE => resolution.source.as_str())
            .increment(1);

        let facility = pri_facility(resolution.priority);
        if !self.config.permit_non_kernel_facility && facility != Facility::Kern.code() {
            self.stats.filtered.fetch_add(1, Ordering::Relaxed);
            counter!(m::KLOG_LINES_FILTERED_TOTAL).increment(1);
            trace!(
                facility,
                priority = resolution.priority,
                "non-kernel facility line dropped"
            );
            return LineOutcome::Filtered;
        }

        debug!(
            priority = resolution.priority,
            source = %resolution.source,
            "kernel line resolved"
        );
        let record = self
            .builder
            .kernel(line.text, &resolution, line.timestamp);

        match self.queue.submit(record).await {
            Ok(()) => {
                self.stats.submitted.fetch_add(1, Ordering::Relaxed);
                counter!(m::KLOG_RECORDS_SUBMITTED_TOTAL).increment(1);
                LineOutcome::Submitted
            }
            Err(e) => {
                self.stats.submit_failures.fetch_add(1, Ordering::Relaxed);
                counter!(m::KLOG_SUBMIT_FAILURES_TOTAL).increment(1);
                warn!(error = %e, "failed to submit kernel message");
                self.report_internal(
                    Severity::Warning,
                    &format!("imklog: failed to submit kernel message: {e}"),
                )
                .await;
                LineOutcome::SubmitFailed
            }
        }
    }

    /// 내부 진단 메시지를 같은 큐로 보냅니다.
    async fn report_internal(&self, severity: Severity, text: &str) {
        let record = self
            .builder
            .internal(self.config.internal_msg_facility, severity, text);
        if let Err(e) = self.queue.submit(record).await {
            match e {
                SubmitError::Closed => debug!("internal message dropped, queue closed"),
                SubmitError::Timeout(_) => debug!(error = %e, "internal message dropped"),
            }
        }
    }
}

/// 커널 로그 수집 루프
///
/// # 사용 예시
/// ```ignore
/// let ingest = IngestLoop::new(driver, queue, builder, config, stats);
/// let handle = tokio::spawn(ingest.run(stop.clone()));
///
/// stop.cancel();
/// let exit = handle.await?;
/// exit.driver.on_teardown()?;
/// ```
pub struct IngestLoop<D, Q> {
    driver: D,
    processor: LineProcessor<Q>,
}

impl<D, Q> IngestLoop<D, Q>
where
    D: KernelLogDriver,
    Q: MessageQueue,
{
    pub fn new(
        driver: D,
        queue: Arc<Q>,
        builder: MessageBuilder,
        config: Arc<EffectiveConfig>,
        stats: Arc<IngestStats>,
    ) -> Self {
        Self {
            driver,
            processor: LineProcessor {
                queue,
                builder,
                config,
                stats,
            },
        }
    }

    /// 한 줄을 처리합니다.
    pub async fn process_line(&self, line: KernelLine) -> LineOutcome {
        self.processor.process(line).await
    }

    /// 정지 요청까지 "읽기, 처리, 제출"을 반복합니다.
    ///
    /// 정지 토큰은 반복마다 한 번 확인합니다. 진행 중인 읽기는 드라이버의
    /// 대기 간격 안에 반환됩니다.
    pub async fn run(mut self, stop: CancellationToken) -> IngestExit<D> {
        let driver_name = self.driver.name();
        info!(driver = driver_name, "kernel log ingestion started");

        let reason = loop {
            if stop.is_cancelled() {
                break ExitReason::Stopped;
            }

            let event = self.driver.next_line().await;
            match event {
                Ok(DriverEvent::Line(line)) => {
                    self.processor.process(line).await;
                }
                Ok(DriverEvent::Idle) => {}
                Ok(DriverEvent::Shutdown) => break ExitReason::SourceClosed,
                Err(e) => {
                    counter!(m::KLOG_DRIVER_ERRORS_TOTAL, m::LABEL_DRIVER => driver_name)
                        .increment(1);
                    error!(
                        driver = driver_name,
                        error = %e,
                        "error reading kernel log, ingestion stops"
                    );
                    self.processor
                        .report_internal(
                            Severity::Error,
                            &format!("imklog: error reading kernel log - shutting down: {e}"),
                        )
                        .await;
                    break ExitReason::DriverFailed(e.to_string());
                }
            }
        };

        let stats = self.processor.stats.snapshot();
        info!(
            driver = driver_name,
            ?reason,
            lines_read = stats.lines_read,
            submitted = stats.submitted,
            filtered = stats.filtered,
            submit_failures = stats.submit_failures,
            "kernel log ingestion stopped"
        );

        IngestExit {
            driver: self.driver,
            reason,
        }
    }
}
