//! 설정 저장소: 로드 사이클 상태 기계와 병합 정책
//!
//! # 상태 전환
//! ```text
//! Idle → begin_load() → Loading → end_load() → Merging → Resolved
//!      → activate() → Activated
//!      → discard()  → Discarded
//! ```
//!
//! 한 로드 사이클에서 권한을 가지는 쪽은 레거시 값 전체 또는 v2 값 전체 중
//! 하나뿐입니다. 인식된 v2 파라미터가 하나라도 들어오면 그 사이클은 v2 모드가
//! 되며, 이후의 모듈 전역 레거시 지시어는 거부됩니다.

use std::fmt;
use std::sync::Arc;

use kernlog_core::module::ModuleParams;
use tracing::debug;

use super::legacy::{LegacyDirective, LegacySettings};
use super::v2::V2Settings;
use super::EffectiveConfig;
use crate::error::InputError;

/// 저장소 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorePhase {
    Idle,
    Loading,
    Merging,
    Resolved,
    Activated,
    Discarded,
}

impl fmt::Display for StorePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Loading => write!(f, "loading"),
            Self::Merging => write!(f, "merging"),
            Self::Resolved => write!(f, "resolved"),
            Self::Activated => write!(f, "activated"),
            Self::Discarded => write!(f, "discarded"),
        }
    }
}

/// 한 로드 사이클의 상태
///
/// 로드 시작 시 생성되고 활성화 또는 폐기 시 버려집니다. 재사용되지 않습니다.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoadState {
    /// v2 파라미터가 하나 이상 적용되었는지 여부
    pub resolved_via_v2: bool,
    pub legacy: LegacySettings,
    pub v2: V2Settings,
    /// 로드 종료 시 확정된 유효 설정
    pub effective: Option<EffectiveConfig>,
}

/// 두 누산기를 하나의 유효 설정으로 병합합니다.
///
/// 입력만으로 결과가 정해지는 순수 함수이므로 반복 호출해도 결과가 같습니다.
pub fn merge(resolved_via_v2: bool, legacy: &LegacySettings, v2: &V2Settings) -> EffectiveConfig {
    if resolved_via_v2 {
        v2.to_effective()
    } else {
        legacy.to_effective()
    }
}

/// 입력 모듈 설정 저장소
#[derive(Debug)]
pub struct ConfigStore {
    phase: StorePhase,
    cycle: Option<ConfigLoadState>,
    active: Option<Arc<EffectiveConfig>>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self {
            phase: StorePhase::Idle,
            cycle: None,
            active: None,
        }
    }

    pub fn phase(&self) -> StorePhase {
        self.phase
    }

    /// 진행 중인 로드 사이클 (Loading ~ Resolved)
    pub fn cycle(&self) -> Option<&ConfigLoadState> {
        self.cycle.as_ref()
    }

    /// 확정되었지만 아직 활성화되지 않은 유효 설정
    pub fn resolved(&self) -> Option<&EffectiveConfig> {
        self.cycle.as_ref().and_then(|c| c.effective.as_ref())
    }

    /// 활성화된 유효 설정
    pub fn active(&self) -> Option<Arc<EffectiveConfig>> {
        self.active.clone()
    }

    fn require(&self, operation: &'static str, allowed: &[StorePhase]) -> Result<(), InputError> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(InputError::ConfigPhase {
                operation,
                phase: self.phase,
            })
        }
    }

    fn loading_cycle(&mut self, operation: &'static str) -> Result<&mut ConfigLoadState, InputError> {
        self.require(operation, &[StorePhase::Loading])?;
        self.cycle.as_mut().ok_or(InputError::ConfigPhase {
            operation,
            phase: StorePhase::Loading,
        })
    }

    /// 새 로드 사이클을 시작합니다. 두 누산기는 기본값으로 초기화됩니다.
    pub fn begin_load(&mut self) -> Result<(), InputError> {
        self.require(
            "begin_load",
            &[StorePhase::Idle, StorePhase::Discarded, StorePhase::Activated],
        )?;
        self.cycle = Some(ConfigLoadState::default());
        self.active = None;
        self.phase = StorePhase::Loading;
        Ok(())
    }

    /// 레거시 지시어 한 줄을 적용합니다.
    pub fn apply_legacy(&mut self, name: &str, argument: &str) -> Result<LegacyDirective, InputError> {
        let directive: LegacyDirective = name.parse()?;
        let cycle = self.loading_cycle("apply_legacy")?;

        if cycle.resolved_via_v2 && directive.is_module_global() {
            return Err(InputError::LegacyNotPermitted {
                name: directive.name().to_owned(),
            });
        }

        cycle.legacy.apply(directive, argument)?;
        debug!(directive = directive.name(), argument, "legacy directive applied");
        Ok(directive)
    }

    /// v2 파라미터 블록을 적용합니다.
    ///
    /// 실패하면 로드 사이클 전체가 폐기되며 저장소는 `Discarded`가 됩니다.
    /// 빈 블록은 v2 모드로 전환하지 않습니다.
    pub fn apply_v2(&mut self, params: &ModuleParams) -> Result<usize, InputError> {
        let cycle = self.loading_cycle("apply_v2")?;
        match cycle.v2.apply_block(params) {
            Ok(applied) => {
                if applied > 0 {
                    cycle.resolved_via_v2 = true;
                }
                debug!(applied, "module parameters applied");
                Ok(applied)
            }
            Err(e) => {
                self.discard();
                Err(e)
            }
        }
    }

    /// 로드 사이클을 종료하고 유효 설정을 확정합니다.
    pub fn end_load(&mut self) -> Result<&EffectiveConfig, InputError> {
        self.loading_cycle("end_load")?;
        self.phase = StorePhase::Merging;

        let Some(cycle) = self.cycle.as_mut() else {
            self.phase = StorePhase::Discarded;
            return Err(InputError::ConfigPhase {
                operation: "end_load",
                phase: StorePhase::Merging,
            });
        };
        let effective = merge(cycle.resolved_via_v2, &cycle.legacy, &cycle.v2);
        debug!(
            via_v2 = cycle.resolved_via_v2,
            ?effective,
            "config load cycle resolved"
        );
        self.phase = StorePhase::Resolved;
        Ok(cycle.effective.insert(effective))
    }

    /// 확정된 설정을 실행 사이클로 넘기고 로드 상태를 버립니다.
    pub fn activate(&mut self) -> Result<Arc<EffectiveConfig>, InputError> {
        self.require("activate", &[StorePhase::Resolved])?;
        let effective = self
            .cycle
            .take()
            .and_then(|c| c.effective)
            .ok_or(InputError::ConfigPhase {
                operation: "activate",
                phase: StorePhase::Resolved,
            })?;
        let effective = Arc::new(effective);
        self.active = Some(Arc::clone(&effective));
        self.phase = StorePhase::Activated;
        Ok(effective)
    }

    /// 진행 중인 로드 사이클을 폐기합니다.
    pub fn discard(&mut self) {
        self.cycle = None;
        self.phase = StorePhase::Discarded;
    }

    /// 모든 상태를 버리고 초기 상태로 돌아갑니다.
    pub fn clear(&mut self) {
        self.cycle = None;
        self.active = None;
        self.phase = StorePhase::Idle;
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use kernlog_core::types::Facility;

    use super::*;

    fn params(src: &str) -> ModuleParams {
        toml::from_str(src).unwrap()
    }

    fn loading() -> ConfigStore {
        let mut store = ConfigStore::new();
        store.begin_load().unwrap();
        store
    }

    #[test]
    fn legacy_only_cycle_uses_legacy_values() {
        let mut store = loading();
        store.apply_legacy("KLogPermitNonKernelFacility", "on").unwrap();
        store.apply_legacy("KLogPath", "/dev/klog").unwrap();
        let e = store.end_load().unwrap().clone();
        assert!(e.permit_non_kernel_facility);
        assert_eq!(e.source_path, Some(PathBuf::from("/dev/klog")));
        assert_eq!(e.internal_msg_facility, Facility::Syslog);
        assert_eq!(store.phase(), StorePhase::Resolved);
    }

    #[test]
    fn any_v2_parameter_ignores_all_legacy_values() {
        let mut store = loading();
        store.apply_legacy("klogpermitnonkernelfacility", "on").unwrap();
        store.apply_legacy("klogparsekerneltimestamp", "on").unwrap();
        store.apply_legacy("kloginternalmsgfacility", "local2").unwrap();
        store.apply_v2(&params("consoleloglevel = 1")).unwrap();

        let e = store.end_load().unwrap();
        assert_eq!(e.console_log_level, Some(1));
        assert!(!e.permit_non_kernel_facility);
        assert!(!e.parse_kernel_timestamp);
        assert_eq!(e.internal_msg_facility, Facility::Syslog);
    }

    #[test]
    fn legacy_after_v2_is_refused_but_reset_is_allowed() {
        let mut store = loading();
        store.apply_v2(&params("permitnonkernelfacility = true")).unwrap();
        let err = store.apply_legacy("klogpath", "/dev/klog").unwrap_err();
        assert!(matches!(err, InputError::LegacyNotPermitted { .. }));
        store.apply_legacy("resetconfigvariables", "").unwrap();
        assert!(store.end_load().unwrap().permit_non_kernel_facility);
    }

    #[test]
    fn empty_v2_block_keeps_legacy_mode() {
        let mut store = loading();
        store.apply_legacy("klogpermitnonkernelfacility", "on").unwrap();
        assert_eq!(store.apply_v2(&ModuleParams::new()).unwrap(), 0);
        assert!(!store.cycle().unwrap().resolved_via_v2);
        assert!(store.end_load().unwrap().permit_non_kernel_facility);
    }

    #[test]
    fn reset_then_end_yields_all_defaults() {
        let mut store = loading();
        store.apply_legacy("klogpermitnonkernelfacility", "on").unwrap();
        store.apply_legacy("klogconsoleloglevel", "3").unwrap();
        store.apply_legacy("klogpath", "/dev/klog").unwrap();
        store.apply_legacy("resetconfigvariables", "").unwrap();
        assert_eq!(store.end_load().unwrap(), &EffectiveConfig::default());
    }

    #[test]
    fn bad_v2_block_discards_cycle() {
        let mut store = loading();
        let err = store.apply_v2(&params("nosuchparam = 1")).unwrap_err();
        assert!(matches!(err, InputError::MissingConfigParams(_)));
        assert_eq!(store.phase(), StorePhase::Discarded);
        assert!(store.cycle().is_none());
        assert!(store.end_load().is_err());
        // 새 사이클은 다시 시작 가능
        store.begin_load().unwrap();
    }

    #[test]
    fn merge_is_idempotent() {
        let mut legacy = LegacySettings::default();
        legacy.permit_non_kernel_facility = true;
        let mut v2 = V2Settings::default();
        v2.console_log_level = Some(2);
        for via_v2 in [false, true] {
            let first = merge(via_v2, &legacy, &v2);
            let second = merge(via_v2, &legacy, &v2);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn activate_hands_off_and_drops_cycle() {
        let mut store = loading();
        store.apply_legacy("klogconsoleloglevel", "6").unwrap();
        store.end_load().unwrap();
        let active = store.activate().unwrap();
        assert_eq!(active.console_log_level, Some(6));
        assert!(store.cycle().is_none());
        assert_eq!(store.phase(), StorePhase::Activated);
        assert!(Arc::ptr_eq(&active, &store.active().unwrap()));
    }

    #[test]
    fn out_of_order_calls_are_rejected() {
        let mut store = ConfigStore::new();
        assert!(store.apply_legacy("klogpath", "/x").is_err());
        assert!(store.end_load().is_err());
        assert!(store.activate().is_err());
        store.begin_load().unwrap();
        assert!(matches!(
            store.begin_load(),
            Err(InputError::ConfigPhase { .. })
        ));
    }

    #[test]
    fn unknown_directive_is_reported_during_load() {
        let mut store = loading();
        assert!(matches!(
            store.apply_legacy("klogwhatever", "1"),
            Err(InputError::UnknownDirective { .. })
        ));
        assert_eq!(store.phase(), StorePhase::Loading);
    }

    #[test]
    fn clear_returns_to_idle() {
        let mut store = loading();
        store.end_load().unwrap();
        store.activate().unwrap();
        store.clear();
        assert_eq!(store.phase(), StorePhase::Idle);
        assert!(store.active().is_none());
    }
}
