//! 입력 모듈 시스템: 생명주기 진입점, 등록, 순차 구동
//!
//! [`InputModule`] trait은 데몬이 입력 모듈을 구동하는 진입점을 하나의 메서드로
//! 하나씩 정의합니다. [`ModuleRegistry`]는 등록 순서를 보존하며 활성화와
//! 종료를 일괄 수행합니다.
//!
//! # 생명주기
//! ```text
//! Unloaded → begin_config_load() → ConfigLoading
//!          → end_config_load()   → ConfigLoaded
//!          → activate_pre_priv_drop() → Activating
//!          → activate() → run()  → Running
//!          → after_run()         → Stopping
//!          → free_config()       → Unloaded
//! ```
//!
//! `module_exit()`은 모듈 수명 동안 공유되는 자원을 해제하는 유일한 지점입니다.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{KernlogError, ModuleError};

/// 구조화(v2) 파라미터 블록
pub type ModuleParams = toml::Table;

/// dyn 호환 trait에서 사용하는 박싱된 Future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ─── ModuleInfo ──────────────────────────────────────────────────────

/// 입력 모듈 메타데이터
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// 모듈 고유 이름 (예: `"imklog"`)
    pub name: String,
    /// 모듈 버전
    pub version: String,
    /// 모듈 설명
    pub description: String,
}

// ─── LifecycleState ──────────────────────────────────────────────────

/// 입력 모듈 생명주기 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleState {
    /// 설정 없음 (초기 상태 및 free_config 이후)
    Unloaded,
    /// 설정 로드 사이클 진행 중
    ConfigLoading,
    /// 설정 병합 완료
    ConfigLoaded,
    /// 권한 강하 전 활성화 완료, run 대기
    Activating,
    /// 수집 실행 중
    Running,
    /// 수집 종료, 설정 해제 대기
    Stopping,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unloaded => write!(f, "unloaded"),
            Self::ConfigLoading => write!(f, "config-loading"),
            Self::ConfigLoaded => write!(f, "config-loaded"),
            Self::Activating => write!(f, "activating"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
        }
    }
}

// ─── EntryPoint ──────────────────────────────────────────────────────

/// 데몬이 조회할 수 있는 생명주기 진입점
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryPoint {
    BeginConfigLoad,
    SetModuleConfig,
    EndConfigLoad,
    CheckConfig,
    ActivatePrePrivDrop,
    Activate,
    Run,
    AfterRun,
    FreeConfig,
    ModuleExit,
    QueryEntryPoints,
}

impl EntryPoint {
    /// 모든 진입점 (호출 순서)
    pub const ALL: [EntryPoint; 11] = [
        Self::BeginConfigLoad,
        Self::SetModuleConfig,
        Self::EndConfigLoad,
        Self::CheckConfig,
        Self::ActivatePrePrivDrop,
        Self::Activate,
        Self::Run,
        Self::AfterRun,
        Self::FreeConfig,
        Self::ModuleExit,
        Self::QueryEntryPoints,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BeginConfigLoad => "begin-config-load",
            Self::SetModuleConfig => "set-module-config",
            Self::EndConfigLoad => "end-config-load",
            Self::CheckConfig => "check-config",
            Self::ActivatePrePrivDrop => "activate-pre-priv-drop",
            Self::Activate => "activate",
            Self::Run => "run",
            Self::AfterRun => "after-run",
            Self::FreeConfig => "free-config",
            Self::ModuleExit => "module-exit",
            Self::QueryEntryPoints => "query-entry-points",
        }
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── InputModule Trait ───────────────────────────────────────────────

/// 데몬이 로드하는 입력 모듈 trait
///
/// 각 메서드는 하나의 생명주기 진입점에 대응합니다. 현재 상태에서 허용되지 않는
/// 호출은 상태를 바꾸지 않고 에러를 반환해야 합니다.
///
/// 모듈은 자체 에러 타입을 사용하며, [`DynInputModule`]을 통해 호출될 때
/// [`KernlogError`]로 변환됩니다.
pub trait InputModule: Send + Sync {
    /// 모듈 에러 타입
    type Error: std::error::Error + Into<KernlogError> + Send + Sync + 'static;

    /// 모듈 메타데이터를 반환합니다.
    fn info(&self) -> &ModuleInfo;

    /// 현재 생명주기 상태를 반환합니다.
    fn state(&self) -> LifecycleState;

    /// 모듈이 지원하는 진입점 목록을 반환합니다.
    fn entry_points(&self) -> &'static [EntryPoint];

    /// 새 설정 로드 사이클을 시작합니다.
    fn begin_config_load(&mut self) -> Result<(), Self::Error>;

    /// 구조화(v2) 파라미터 블록을 적용합니다.
    fn set_module_config(&mut self, params: &ModuleParams) -> Result<(), Self::Error>;

    /// 레거시 지시어 한 줄을 적용합니다.
    fn legacy_directive(&mut self, name: &str, argument: &str) -> Result<(), Self::Error>;

    /// 설정 로드 사이클을 종료하고 유효 설정을 확정합니다.
    fn end_config_load(&mut self) -> Result<(), Self::Error>;

    /// 확정된 설정을 검증합니다.
    fn check_config(&self) -> Result<(), Self::Error>;

    /// 권한 강하 전에 필요한 자원(장치 열기 등)을 준비합니다.
    fn activate_pre_priv_drop(&mut self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// 권한 강하 후 활성화를 마무리합니다.
    fn activate(&mut self) -> Result<(), Self::Error>;

    /// 전용 실행 컨텍스트에서 수집을 시작합니다.
    ///
    /// `stop`이 취소되면 수집 루프는 현재 반복을 마치고 종료합니다.
    fn run(&mut self, stop: CancellationToken) -> Result<(), Self::Error>;

    /// 수집 종료를 기다리고 실행 자원을 정리합니다.
    fn after_run(&mut self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// 로드된 설정을 해제합니다.
    fn free_config(&mut self) -> Result<(), Self::Error>;

    /// 모듈 수명 자원을 해제합니다. 두 번째 호출부터는 아무것도 하지 않습니다.
    fn module_exit(&mut self) -> Result<(), Self::Error>;
}

// ─── DynInputModule Trait ────────────────────────────────────────────

/// dyn-compatible 입력 모듈 trait
///
/// `InputModule`은 RPITIT와 연관 타입을 사용하므로 `dyn InputModule`이 불가합니다.
/// `DynInputModule`은 `BoxFuture`와 [`KernlogError`]를 반환하여
/// `Vec<Box<dyn DynInputModule>>`으로 모듈을 관리할 수 있게 합니다.
pub trait DynInputModule: Send + Sync {
    fn info(&self) -> &ModuleInfo;
    fn state(&self) -> LifecycleState;
    fn entry_points(&self) -> &'static [EntryPoint];
    fn begin_config_load(&mut self) -> Result<(), KernlogError>;
    fn set_module_config(&mut self, params: &ModuleParams) -> Result<(), KernlogError>;
    fn legacy_directive(&mut self, name: &str, argument: &str) -> Result<(), KernlogError>;
    fn end_config_load(&mut self) -> Result<(), KernlogError>;
    fn check_config(&self) -> Result<(), KernlogError>;
    fn activate_pre_priv_drop(&mut self) -> BoxFuture<'_, Result<(), KernlogError>>;
    fn activate(&mut self) -> Result<(), KernlogError>;
    fn run(&mut self, stop: CancellationToken) -> Result<(), KernlogError>;
    fn after_run(&mut self) -> BoxFuture<'_, Result<(), KernlogError>>;
    fn free_config(&mut self) -> Result<(), KernlogError>;
    fn module_exit(&mut self) -> Result<(), KernlogError>;
}

/// InputModule을 구현한 타입은 자동으로 DynInputModule도 구현됩니다.
impl<T: InputModule> DynInputModule for T {
    fn info(&self) -> &ModuleInfo {
        InputModule::info(self)
    }

    fn state(&self) -> LifecycleState {
        InputModule::state(self)
    }

    fn entry_points(&self) -> &'static [EntryPoint] {
        InputModule::entry_points(self)
    }

    fn begin_config_load(&mut self) -> Result<(), KernlogError> {
        InputModule::begin_config_load(self).map_err(Into::into)
    }

    fn set_module_config(&mut self, params: &ModuleParams) -> Result<(), KernlogError> {
        InputModule::set_module_config(self, params).map_err(Into::into)
    }

    fn legacy_directive(&mut self, name: &str, argument: &str) -> Result<(), KernlogError> {
        InputModule::legacy_directive(self, name, argument).map_err(Into::into)
    }

    fn end_config_load(&mut self) -> Result<(), KernlogError> {
        InputModule::end_config_load(self).map_err(Into::into)
    }

    fn check_config(&self) -> Result<(), KernlogError> {
        InputModule::check_config(self).map_err(Into::into)
    }

    fn activate_pre_priv_drop(&mut self) -> BoxFuture<'_, Result<(), KernlogError>> {
        Box::pin(async move {
            InputModule::activate_pre_priv_drop(self)
                .await
                .map_err(Into::into)
        })
    }

    fn activate(&mut self) -> Result<(), KernlogError> {
        InputModule::activate(self).map_err(Into::into)
    }

    fn run(&mut self, stop: CancellationToken) -> Result<(), KernlogError> {
        InputModule::run(self, stop).map_err(Into::into)
    }

    fn after_run(&mut self) -> BoxFuture<'_, Result<(), KernlogError>> {
        Box::pin(async move { InputModule::after_run(self).await.map_err(Into::into) })
    }

    fn free_config(&mut self) -> Result<(), KernlogError> {
        InputModule::free_config(self).map_err(Into::into)
    }

    fn module_exit(&mut self) -> Result<(), KernlogError> {
        InputModule::module_exit(self).map_err(Into::into)
    }
}

// ─── ModuleRegistry ──────────────────────────────────────────────────

/// 입력 모듈 레지스트리
///
/// 등록 순서가 보존되며 활성화와 종료는 등록 순서대로 수행됩니다.
///
/// # 사용 예시
/// ```ignore
/// let mut registry = ModuleRegistry::new();
/// registry.register(Box::new(klog_module))?;
///
/// // 설정 로드는 모듈별로 수행
/// let module = registry.get_mut("imklog").unwrap();
/// module.begin_config_load()?;
/// module.end_config_load()?;
///
/// registry.activate_all().await?;
/// registry.run_all(stop.clone())?;
///
/// // ... 실행 중 ...
///
/// registry.shutdown_all().await?;
/// ```
pub struct ModuleRegistry {
    modules: Vec<Box<dyn DynInputModule>>,
}

impl ModuleRegistry {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
        }
    }

    /// 모듈을 등록합니다.
    ///
    /// 동일한 이름의 모듈이 이미 등록되어 있으면 에러를 반환합니다.
    pub fn register(&mut self, module: Box<dyn DynInputModule>) -> Result<(), KernlogError> {
        let name = module.info().name.clone();
        if self.modules.iter().any(|m| m.info().name == name) {
            return Err(ModuleError::AlreadyRegistered { name }.into());
        }
        self.modules.push(module);
        Ok(())
    }

    /// 이름으로 모듈을 조회합니다.
    pub fn get(&self, name: &str) -> Option<&dyn DynInputModule> {
        self.modules
            .iter()
            .find(|m| m.info().name == name)
            .map(|m| m.as_ref())
    }

    /// 이름으로 모듈을 가변 조회합니다.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut dyn DynInputModule> {
        for module in &mut self.modules {
            if module.info().name == name {
                return Some(&mut **module);
            }
        }
        None
    }

    /// 설정이 로드된 모든 모듈을 검증하고 활성화합니다.
    ///
    /// 모든 모듈의 권한 강하 전 단계가 끝난 뒤에 `activate`를 호출합니다.
    /// 첫 번째 실패 시 즉시 반환합니다 (fail-fast).
    pub async fn activate_all(&mut self) -> Result<(), KernlogError> {
        for module in &mut self.modules {
            module.check_config()?;
            module.activate_pre_priv_drop().await?;
        }
        for module in &mut self.modules {
            module.activate()?;
        }
        Ok(())
    }

    /// 모든 모듈의 수집을 시작합니다.
    pub fn run_all(&mut self, stop: CancellationToken) -> Result<(), KernlogError> {
        for module in &mut self.modules {
            module.run(stop.clone())?;
        }
        Ok(())
    }

    /// 모든 모듈을 종료합니다.
    ///
    /// 상태에 맞는 정리 단계(after_run, free_config)를 거친 뒤 module_exit를 호출합니다.
    /// 개별 모듈 실패 시에도 나머지 모듈의 종료를 계속하며, 모든 에러를 수집하여 반환합니다.
    pub async fn shutdown_all(&mut self) -> Result<(), KernlogError> {
        let mut errors = Vec::new();
        for module in &mut self.modules {
            let name = module.info().name.clone();
            if module.state() == LifecycleState::Running {
                if let Err(e) = module.after_run().await {
                    errors.push(format!("{name}: {e}"));
                }
            }
            if module.state() != LifecycleState::Unloaded {
                if let Err(e) = module.free_config() {
                    errors.push(format!("{name}: {e}"));
                }
            }
            if let Err(e) = module.module_exit() {
                errors.push(format!("{name}: {e}"));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ModuleError::StopFailed(errors.join("; ")).into())
        }
    }

    /// 등록된 모듈 수를 반환합니다.
    pub fn count(&self) -> usize {
        self.modules.len()
    }

    /// 등록된 모든 모듈의 이름과 상태를 반환합니다.
    pub fn states(&self) -> Vec<(String, LifecycleState)> {
        self.modules
            .iter()
            .map(|m| (m.info().name.clone(), m.state()))
            .collect()
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
