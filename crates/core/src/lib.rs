#![doc = include_str!("../README.md")]

pub mod config;
pub mod directive;
pub mod error;
pub mod metrics;
pub mod module;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, KernlogError, ModuleError};

// 설정
pub use config::KernlogConfig;
pub use directive::DirectiveLine;

// 모듈 생명주기
pub use module::{
    DynInputModule, EntryPoint, InputModule, LifecycleState, ModuleInfo, ModuleParams,
    ModuleRegistry,
};

// 도메인 타입
pub use types::{Facility, FlowControl, Severity};
