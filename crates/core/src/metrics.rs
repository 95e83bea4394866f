//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `kernlog_`
//! - 모듈명: `klog_`, `daemon_`
//! - 접미어: `_total` (counter), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(kernlog_core::metrics::KLOG_LINES_READ_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// PRI 출처 레이블 키 (secondary, primary, default)
pub const LABEL_PRI_SOURCE: &str = "pri_source";

/// 드라이버 레이블 키 (kmsg, klog)
pub const LABEL_DRIVER: &str = "driver";

// ─── Kernel Input 메트릭 ───────────────────────────────────────────

/// Klog: 드라이버에서 읽은 줄 수 (counter)
pub const KLOG_LINES_READ_TOTAL: &str = "kernlog_klog_lines_read_total";

/// Klog: 큐에 제출된 레코드 수 (counter)
pub const KLOG_RECORDS_SUBMITTED_TOTAL: &str = "kernlog_klog_records_submitted_total";

/// Klog: facility 정책으로 버려진 줄 수 (counter)
pub const KLOG_LINES_FILTERED_TOTAL: &str = "kernlog_klog_lines_filtered_total";

/// Klog: 큐 제출 실패 수 (counter)
pub const KLOG_SUBMIT_FAILURES_TOTAL: &str = "kernlog_klog_submit_failures_total";

/// Klog: PRI 결정 출처별 줄 수 (counter, label: pri_source)
pub const KLOG_PRI_RESOLVED_TOTAL: &str = "kernlog_klog_pri_resolved_total";

/// Klog: 드라이버 읽기 에러 수 (counter, label: driver)
pub const KLOG_DRIVER_ERRORS_TOTAL: &str = "kernlog_klog_driver_errors_total";

// ─── Daemon 메트릭 ─────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "kernlog_daemon_uptime_seconds";

/// Daemon: 등록된 입력 모듈 수 (gauge)
pub const DAEMON_MODULES_REGISTERED: &str = "kernlog_daemon_modules_registered";

/// Daemon: 출력 단계가 기록한 레코드 수 (counter)
pub const DAEMON_RECORDS_WRITTEN_TOTAL: &str = "kernlog_daemon_records_written_total";

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 이 함수는 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 `kernlog-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    // Kernel Input
    describe_counter!(
        KLOG_LINES_READ_TOTAL,
        "Total number of raw kernel log lines read from the driver"
    );
    describe_counter!(
        KLOG_RECORDS_SUBMITTED_TOTAL,
        "Total number of kernel log records submitted to the main queue"
    );
    describe_counter!(
        KLOG_LINES_FILTERED_TOTAL,
        "Total number of lines dropped because of a non-kernel facility"
    );
    describe_counter!(
        KLOG_SUBMIT_FAILURES_TOTAL,
        "Total number of records the main queue refused or timed out on"
    );
    describe_counter!(
        KLOG_PRI_RESOLVED_TOTAL,
        "Lines per priority source (secondary, primary, default)"
    );
    describe_counter!(
        KLOG_DRIVER_ERRORS_TOTAL,
        "Total number of recoverable driver read errors"
    );

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "kernlog daemon uptime in seconds");
    describe_gauge!(
        DAEMON_MODULES_REGISTERED,
        "Number of input modules registered in the daemon"
    );
    describe_counter!(
        DAEMON_RECORDS_WRITTEN_TOTAL,
        "Total number of records written by the output stage"
    );
}
