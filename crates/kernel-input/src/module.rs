//! 커널 로그 입력 모듈: 생명주기 상태 기계
//!
//! [`KernelLogModule`]은 core의 [`InputModule`] trait을 구현하여 데몬의
//! [`ModuleRegistry`](kernlog_core::module::ModuleRegistry)에서 다른 입력 모듈과
//! 같은 진입점으로 구동됩니다.
//!
//! # 상태 전이
//! ```text
//! Unloaded ─begin_config_load→ ConfigLoading ─end_config_load→ ConfigLoaded
//!   ─activate_pre_priv_drop→ Activating ─run→ Running ─after_run→ Stopping
//!   ─free_config→ Unloaded
//! ```
//!
//! 허용되지 않는 호출은 상태를 바꾸지 않고 `InvalidTransition`을 반환합니다.
//! 설정 저장소를 변경하는 곳은 이 모듈뿐입니다.

use std::sync::Arc;

use kernlog_core::module::{EntryPoint, InputModule, LifecycleState, ModuleInfo, ModuleParams};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::MODULE_NAME;
use crate::config::{ConfigStore, EffectiveConfig, MAX_CONSOLE_LOG_LEVEL, StorePhase};
use crate::driver::KernelLogDriver;
use crate::error::InputError;
use crate::ingest::{ExitReason, IngestExit, IngestLoop, IngestSnapshot, IngestStats};
use crate::message::{HostIdentity, InputIdentity, MessageBuilder};
use crate::queue::MessageQueue;

/// 커널 로그 입력 모듈
///
/// # 사용 예시
/// ```ignore
/// let (queue, rx) = ChannelQueue::bounded(4096, Duration::from_secs(1));
/// let module = KernelLogModule::new(KmsgDriver::new(options), Arc::new(queue), host);
///
/// let mut registry = ModuleRegistry::new();
/// registry.register(Box::new(module))?;
/// ```
pub struct KernelLogModule<D, Q> {
    info: ModuleInfo,
    state: LifecycleState,
    store: ConfigStore,
    /// 수집 태스크가 실행 중일 때는 `None`
    driver: Option<D>,
    driver_open: bool,
    queue: Arc<Q>,
    host: Arc<HostIdentity>,
    /// module_exit에서 해제
    input: Option<Arc<InputIdentity>>,
    exited: bool,
    stats: Arc<IngestStats>,
    task: Option<JoinHandle<IngestExit<D>>>,
    stop: Option<CancellationToken>,
    last_exit: Option<ExitReason>,
}

impl<D, Q> KernelLogModule<D, Q>
where
    D: KernelLogDriver,
    Q: MessageQueue,
{
    /// 새 모듈을 생성합니다. 입력 식별자는 여기서 한 번 만들어집니다.
    pub fn new(driver: D, queue: Arc<Q>, host: Arc<HostIdentity>) -> Self {
        Self {
            info: ModuleInfo {
                name: MODULE_NAME.to_owned(),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                description: "kernel log input".to_owned(),
            },
            state: LifecycleState::Unloaded,
            store: ConfigStore::new(),
            driver: Some(driver),
            driver_open: false,
            queue,
            host,
            input: Some(Arc::new(InputIdentity::new(MODULE_NAME))),
            exited: false,
            stats: Arc::new(IngestStats::default()),
            task: None,
            stop: None,
            last_exit: None,
        }
    }

    /// 누적 수집 통계
    pub fn stats(&self) -> IngestSnapshot {
        self.stats.snapshot()
    }

    /// 실행 사이클의 유효 설정 (활성화 이후에만 존재)
    pub fn effective_config(&self) -> Option<Arc<EffectiveConfig>> {
        self.store.active()
    }

    /// 확정되었지만 아직 활성화되지 않은 설정
    pub fn resolved_config(&self) -> Option<&EffectiveConfig> {
        self.store.resolved()
    }

    pub fn config_phase(&self) -> StorePhase {
        self.store.phase()
    }

    /// 입력 식별자 (module_exit 이후 `None`)
    pub fn input_identity(&self) -> Option<&Arc<InputIdentity>> {
        self.input.as_ref()
    }

    /// 마지막 수집 루프 종료 사유
    pub fn last_exit(&self) -> Option<&ExitReason> {
        self.last_exit.as_ref()
    }

    /// 수집 태스크가 끝났는지 여부 (실행 중이 아니면 `true`)
    pub fn ingest_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    fn expect(&self, entry_point: EntryPoint, allowed: &[LifecycleState]) -> Result<(), InputError> {
        if self.exited {
            return Err(InputError::ModuleExited);
        }
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(InputError::InvalidTransition {
                entry_point,
                state: self.state,
            })
        }
    }

    fn driver_mut(&mut self) -> Result<&mut D, InputError> {
        self.driver
            .as_mut()
            .ok_or_else(|| InputError::IngestTask("driver is owned by the ingest task".to_owned()))
    }

    fn teardown_driver(&mut self) -> Result<(), InputError> {
        if !self.driver_open {
            return Ok(());
        }
        self.driver_open = false;
        if let Some(driver) = self.driver.as_mut() {
            driver.on_teardown()?;
            debug!(driver = driver.name(), "driver torn down");
        }
        Ok(())
    }
}

impl<D, Q> InputModule for KernelLogModule<D, Q>
where
    D: KernelLogDriver,
    Q: MessageQueue,
{
    type Error = InputError;

    fn info(&self) -> &ModuleInfo {
        &self.info
    }

    fn state(&self) -> LifecycleState {
        self.state
    }

    fn entry_points(&self) -> &'static [EntryPoint] {
        &EntryPoint::ALL
    }

    fn begin_config_load(&mut self) -> Result<(), InputError> {
        self.expect(EntryPoint::BeginConfigLoad, &[LifecycleState::Unloaded])?;
        self.store.clear();
        self.store.begin_load()?;
        self.state = LifecycleState::ConfigLoading;
        debug!(module = MODULE_NAME, "config load cycle started");
        Ok(())
    }

    fn set_module_config(&mut self, params: &ModuleParams) -> Result<(), InputError> {
        self.expect(EntryPoint::SetModuleConfig, &[LifecycleState::ConfigLoading])?;
        if let Err(e) = self.store.apply_v2(params) {
            // 저장소는 이미 로드 사이클을 폐기함
            self.state = LifecycleState::Unloaded;
            return Err(e);
        }
        Ok(())
    }

    fn legacy_directive(&mut self, name: &str, argument: &str) -> Result<(), InputError> {
        self.expect(EntryPoint::SetModuleConfig, &[LifecycleState::ConfigLoading])?;
        self.store.apply_legacy(name, argument)?;
        Ok(())
    }

    fn end_config_load(&mut self) -> Result<(), InputError> {
        self.expect(EntryPoint::EndConfigLoad, &[LifecycleState::ConfigLoading])?;
        let effective = self.store.end_load()?;
        info!(
            module = MODULE_NAME,
            permit_non_kernel_facility = effective.permit_non_kernel_facility,
            parse_kernel_timestamp = effective.parse_kernel_timestamp,
            keep_kernel_timestamp = effective.keep_kernel_timestamp,
            internal_msg_facility = %effective.internal_msg_facility,
            console_log_level = ?effective.console_log_level,
            source_path = ?effective.source_path,
            "config loaded"
        );
        self.state = LifecycleState::ConfigLoaded;
        Ok(())
    }

    fn check_config(&self) -> Result<(), InputError> {
        self.expect(EntryPoint::CheckConfig, &[LifecycleState::ConfigLoaded])?;
        let effective = self.store.resolved().ok_or(InputError::ConfigPhase {
            operation: "check_config",
            phase: self.store.phase(),
        })?;

        if let Some(level) = effective.console_log_level
            && !(0..=MAX_CONSOLE_LOG_LEVEL).contains(&level)
        {
            return Err(InputError::InvalidConfig {
                field: "console_log_level",
                reason: format!("{level} is outside 0..={MAX_CONSOLE_LOG_LEVEL}"),
            });
        }
        if let Some(path) = &effective.source_path
            && path.as_os_str().is_empty()
        {
            return Err(InputError::InvalidConfig {
                field: "source_path",
                reason: "must not be empty".to_owned(),
            });
        }
        Ok(())
    }

    async fn activate_pre_priv_drop(&mut self) -> Result<(), InputError> {
        self.expect(EntryPoint::ActivatePrePrivDrop, &[LifecycleState::ConfigLoaded])?;
        let effective = self
            .store
            .resolved()
            .cloned()
            .ok_or(InputError::ConfigPhase {
                operation: "activate_pre_priv_drop",
                phase: self.store.phase(),
            })?;

        let driver = self.driver_mut()?;
        driver.on_activate(&effective)?;
        let driver_name = driver.name();
        self.driver_open = true;

        self.store.activate()?;
        self.state = LifecycleState::Activating;
        info!(module = MODULE_NAME, driver = driver_name, "activated before privilege drop");
        Ok(())
    }

    fn activate(&mut self) -> Result<(), InputError> {
        self.expect(EntryPoint::Activate, &[LifecycleState::Activating])?;
        debug!(module = MODULE_NAME, "activated");
        Ok(())
    }

    fn run(&mut self, stop: CancellationToken) -> Result<(), InputError> {
        self.expect(EntryPoint::Run, &[LifecycleState::Activating])?;

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| InputError::IngestTask(e.to_string()))?;
        let config = self.store.active().ok_or(InputError::ConfigPhase {
            operation: "run",
            phase: self.store.phase(),
        })?;
        let input = self.input.clone().ok_or(InputError::ModuleExited)?;
        let driver = self
            .driver
            .take()
            .ok_or_else(|| InputError::IngestTask("driver is owned by the ingest task".to_owned()))?;

        let builder = MessageBuilder::new(input, Arc::clone(&self.host));
        let ingest = IngestLoop::new(
            driver,
            Arc::clone(&self.queue),
            builder,
            config,
            Arc::clone(&self.stats),
        );

        let stop = stop.child_token();
        self.task = Some(runtime.spawn(ingest.run(stop.clone())));
        self.stop = Some(stop);
        self.last_exit = None;
        self.state = LifecycleState::Running;
        info!(module = MODULE_NAME, "ingest task started");
        Ok(())
    }

    async fn after_run(&mut self) -> Result<(), InputError> {
        self.expect(EntryPoint::AfterRun, &[LifecycleState::Running])?;
        self.state = LifecycleState::Stopping;

        if let Some(stop) = self.stop.take() {
            stop.cancel();
        }
        let Some(task) = self.task.take() else {
            return Ok(());
        };

        match task.await {
            Ok(exit) => {
                info!(module = MODULE_NAME, reason = ?exit.reason, "ingest task joined");
                self.last_exit = Some(exit.reason);
                self.driver = Some(exit.driver);
                self.teardown_driver()
            }
            Err(e) => {
                // 드라이버는 태스크와 함께 사라졌으므로 해제할 것이 없음
                self.driver_open = false;
                warn!(module = MODULE_NAME, error = %e, "ingest task failed");
                Err(InputError::IngestTask(e.to_string()))
            }
        }
    }

    fn free_config(&mut self) -> Result<(), InputError> {
        self.expect(
            EntryPoint::FreeConfig,
            &[
                LifecycleState::ConfigLoaded,
                LifecycleState::Activating,
                LifecycleState::Stopping,
            ],
        )?;
        let teardown = self.teardown_driver();
        self.store.clear();
        self.state = LifecycleState::Unloaded;
        debug!(module = MODULE_NAME, "config freed");
        teardown
    }

    fn module_exit(&mut self) -> Result<(), InputError> {
        if self.exited {
            return Ok(());
        }
        if self.state == LifecycleState::Running {
            return Err(InputError::InvalidTransition {
                entry_point: EntryPoint::ModuleExit,
                state: self.state,
            });
        }

        let teardown = self.teardown_driver();
        self.store.clear();
        self.input = None;
        self.exited = true;
        self.state = LifecycleState::Unloaded;
        info!(module = MODULE_NAME, "module exited");
        teardown
    }
}
