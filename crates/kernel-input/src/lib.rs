#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`pri`]: `<N>` PRI 파서와 이중 PRI 결정
//! - [`config`]: 레거시/v2 설정 누산기, 로드 사이클 저장소, 유효 설정
//! - [`message`]: 레코드 구성과 공유 식별자
//! - [`queue`]: 메인 큐 인터페이스와 light-delay 채널 구현
//! - [`driver`]: 커널 로그 소스 드라이버 (`/dev/kmsg`, `/proc/kmsg`, `/dev/klog`)
//! - [`ingest`]: 읽기/처리/제출 수집 루프
//! - [`module`]: 생명주기 상태 기계 (InputModule trait 구현)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! Driver -> IngestLoop -> resolve_priority -> facility filter -> MessageBuilder -> MessageQueue
//!                                                                                    |
//!                                                                               ChannelQueue
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod ingest;
pub mod message;
pub mod module;
pub mod pri;
pub mod queue;

/// 입력 모듈 이름 (레코드의 입력 이름 레이블)
pub const MODULE_NAME: &str = "imklog";

// --- 주요 타입 re-export ---

// 모듈
pub use module::KernelLogModule;

// 설정
pub use config::{ConfigStore, EffectiveConfig};

// 에러
pub use error::{DriverError, InputError};

// PRI
pub use pri::{PriResolution, PriSource, parse_pri, resolve_priority};

// 레코드
pub use message::{HostIdentity, InputIdentity, KernelRecord, MessageBuilder};

// 큐
pub use queue::{ChannelQueue, MessageQueue, SubmitError};

// 드라이버
pub use driver::{DriverEvent, DriverOptions, KernelLine, KernelLogDriver};
#[cfg(unix)]
pub use driver::KlogDriver;
#[cfg(target_os = "linux")]
pub use driver::KmsgDriver;

// 수집 루프
pub use ingest::{ExitReason, IngestLoop, IngestSnapshot, IngestStats, LineOutcome};
