//! Module orchestration -- configuration loading, queue wiring, and lifecycle management.
//!
//! The [`Orchestrator`] is the central coordinator of `kernlog-daemon`.
//! It builds the kernel log input module for the configured driver, feeds it
//! the legacy directive file and the `[klog.module]` parameter block, and
//! drives the lifecycle entry points in order.
//!
//! # Lifecycle Order
//!
//! 1. `begin_config_load` -> legacy directives -> `set_module_config` -> `end_config_load`
//! 2. `check_config` -> `activate_pre_priv_drop` (every module) -> `activate` (every module)
//! 3. `run` with a shared stop token
//! 4. On shutdown: `after_run` -> `free_config` -> `module_exit`, then the
//!    output stage drains what is left in the queue.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use kernlog_core::config::{GeneralConfig, KernlogConfig, KlogConfig};
use kernlog_core::directive::{DirectiveLine, load_directives};
use kernlog_core::module::{DynInputModule, LifecycleState, ModuleRegistry};
use kernlog_kernel_input::{ChannelQueue, DriverOptions, HostIdentity, KernelRecord};

use crate::metrics_server;
use crate::output::OutputStage;

/// Boxed writer receiving the JSON-lines output.
pub type OutputWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Interval between uptime gauge updates.
const UPTIME_INTERVAL: Duration = Duration::from_secs(5);

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: KernlogConfig,
    /// Registered input modules.
    registry: ModuleRegistry,
    /// Receiving side of the main queue, handed to the output stage on start.
    records_rx: Option<mpsc::Receiver<KernelRecord>>,
    /// Output destination, handed to the output stage on start.
    output: Option<OutputWriter>,
    output_task: Option<JoinHandle<std::io::Result<u64>>>,
    uptime_task: Option<JoinHandle<()>>,
    /// Stop signal shared with every module's ingest task.
    stop: CancellationToken,
    start_time: Instant,
    /// Legacy directives the module refused during configuration load.
    legacy_rejected: usize,
}

/// The input module plus the queue receiver it submits into.
struct PreparedInput {
    module: Box<dyn DynInputModule>,
    records_rx: mpsc::Receiver<KernelRecord>,
    legacy_rejected: usize,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator writing to stdout.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = KernlogConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration, writing records to stdout.
    pub async fn build_from_config(config: KernlogConfig) -> Result<Self> {
        Self::build_with_output(config, Box::new(tokio::io::stdout())).await
    }

    /// Build from an already-loaded configuration with a custom output writer.
    ///
    /// The kernel log device is not opened here; that happens on [`start`](Self::start).
    pub async fn build_with_output(config: KernlogConfig, output: OutputWriter) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        let mut registry = ModuleRegistry::new();
        let mut records_rx = None;
        let mut legacy_rejected = 0;

        if config.klog.enabled {
            let prepared = prepare_input(&config).await?;
            legacy_rejected = prepared.legacy_rejected;
            records_rx = Some(prepared.records_rx);
            registry.register(prepared.module)?;
        } else {
            tracing::warn!("kernel log input disabled, no records will be produced");
        }

        tracing::info!(
            modules = registry.count(),
            legacy_rejected,
            "orchestrator initialized"
        );
        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!(kernlog_core::metrics::DAEMON_MODULES_REGISTERED)
            .set(registry.count() as f64);

        Ok(Self {
            config,
            registry,
            records_rx,
            output: Some(output),
            output_task: None,
            uptime_task: None,
            stop: CancellationToken::new(),
            start_time: Instant::now(),
            legacy_rejected,
        })
    }

    /// Activate and run every module, then start the output stage.
    ///
    /// On activation failure the modules are torn down before the error is returned.
    pub async fn start(&mut self) -> Result<()> {
        tracing::info!("activating input modules");
        if let Err(e) = self.registry.activate_all().await {
            tracing::error!(error = %e, "module activation failed");
            if let Err(cleanup) = self.registry.shutdown_all().await {
                tracing::error!(
                    activation_error = %e,
                    cleanup_error = %cleanup,
                    "cleanup after activation failure also failed"
                );
            }
            return Err(anyhow::anyhow!("failed to activate input modules: {}", e));
        }

        if let Err(e) = self.registry.run_all(self.stop.clone()) {
            tracing::error!(error = %e, "failed to start ingestion");
            if let Err(cleanup) = self.registry.shutdown_all().await {
                tracing::error!(cleanup_error = %cleanup, "cleanup after run failure also failed");
            }
            return Err(anyhow::anyhow!("failed to start input modules: {}", e));
        }

        if let (Some(rx), Some(writer)) = (self.records_rx.take(), self.output.take()) {
            self.output_task = Some(tokio::spawn(async move {
                OutputStage::new(writer)
                    .run(rx)
                    .await
                    .map(|stage| stage.written())
            }));
        }

        if self.config.metrics.enabled {
            self.uptime_task = Some(spawn_uptime_updater(self.start_time, self.stop.clone()));
        }

        tracing::info!(modules = ?self.registry.states(), "input modules running");
        Ok(())
    }

    /// Start, wait for SIGTERM/SIGINT, and shut down.
    pub async fn run(&mut self) -> Result<()> {
        self.start().await?;

        let signal = wait_for_shutdown_signal().await?;
        tracing::info!(signal, "shutdown signal received");

        self.shutdown().await?;
        Ok(())
    }

    /// Stop every module, drain the queue, and return the number of records written.
    pub async fn shutdown(&mut self) -> Result<u64> {
        tracing::info!("stopping input modules");
        self.stop.cancel();
        let stopped = self.registry.shutdown_all().await;

        // The modules own the queue senders; dropping them lets the output stage finish.
        drop(std::mem::take(&mut self.registry));
        self.records_rx = None;

        if let Some(task) = self.uptime_task.take() {
            let _ = task.await;
        }

        let written = match self.output_task.take() {
            Some(task) => task
                .await
                .map_err(|e| anyhow::anyhow!("output task failed: {}", e))?
                .map_err(|e| anyhow::anyhow!("failed to write records: {}", e))?,
            None => 0,
        };

        stopped.map_err(|e| anyhow::anyhow!("module shutdown failed: {}", e))?;
        tracing::info!(written, "kernlog-daemon shut down");
        Ok(written)
    }

    /// Name and lifecycle state of every registered module.
    pub fn module_states(&self) -> Vec<(String, LifecycleState)> {
        self.registry.states()
    }

    /// Number of legacy directives the module refused.
    pub fn legacy_rejected(&self) -> usize {
        self.legacy_rejected
    }

    /// Seconds since the orchestrator was built.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn config(&self) -> &KernlogConfig {
        &self.config
    }
}

/// Run a configuration load and check without opening the kernel log device.
///
/// Returns the number of legacy directives that were rejected.
pub async fn validate(config: &KernlogConfig) -> Result<usize> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    if !config.klog.enabled {
        return Ok(0);
    }

    let mut prepared = prepare_input(config).await?;
    let checked = prepared.module.check_config();
    prepared.module.free_config()?;
    prepared.module.module_exit()?;
    checked.map_err(|e| anyhow::anyhow!("module config check failed: {}", e))?;
    Ok(prepared.legacy_rejected)
}

/// Host name recorded in every record.
///
/// Uses `general.hostname` when set, otherwise the system host name.
pub fn resolve_hostname(general: &GeneralConfig) -> String {
    if !general.hostname.is_empty() {
        return general.hostname.clone();
    }
    let name = gethostname::gethostname().to_string_lossy().into_owned();
    if name.is_empty() {
        "localhost".to_owned()
    } else {
        name
    }
}

/// Drive one configuration load cycle on `module`.
///
/// Legacy directives are applied first and individually; a refused directive
/// is logged and counted but does not abort the load. The `[klog.module]`
/// block is applied afterwards, and its failure aborts the load.
///
/// Returns the number of refused legacy directives.
pub fn load_module_config(
    module: &mut dyn DynInputModule,
    klog: &KlogConfig,
    legacy: &[DirectiveLine],
) -> Result<usize> {
    let name = module.info().name.clone();
    module.begin_config_load()?;

    let mut rejected = 0;
    for directive in legacy {
        if let Err(e) = module.legacy_directive(&directive.name, &directive.argument) {
            tracing::warn!(
                module = %name,
                line = directive.line,
                directive = %directive.name,
                error = %e,
                "legacy directive rejected"
            );
            rejected += 1;
        }
    }

    if let Some(params) = &klog.module {
        module
            .set_module_config(params)
            .map_err(|e| anyhow::anyhow!("invalid [klog.module] parameters: {}", e))?;
    }

    module.end_config_load()?;
    tracing::debug!(module = %name, legacy = legacy.len(), rejected, "module config loaded");
    Ok(rejected)
}

/// Build the input module, its queue, and run its configuration load.
async fn prepare_input(config: &KernlogConfig) -> Result<PreparedInput> {
    let host = Arc::new(HostIdentity::new(resolve_hostname(&config.general)));
    let (queue, records_rx) = ChannelQueue::bounded(
        config.queue.capacity,
        Duration::from_millis(config.queue.light_delay_ms),
    );

    let mut module = build_module(&config.klog, Arc::new(queue), host)?;

    let legacy = if config.klog.legacy_config.is_empty() {
        Vec::new()
    } else {
        load_directives(&config.klog.legacy_config)
            .await
            .map_err(|e| {
                anyhow::anyhow!(
                    "failed to read legacy config {}: {}",
                    config.klog.legacy_config,
                    e
                )
            })?
    };

    let legacy_rejected = load_module_config(module.as_mut(), &config.klog, &legacy)?;
    Ok(PreparedInput {
        module,
        records_rx,
        legacy_rejected,
    })
}

/// Instantiate the kernel log module for the configured driver.
fn build_module(
    klog: &KlogConfig,
    queue: Arc<ChannelQueue>,
    host: Arc<HostIdentity>,
) -> Result<Box<dyn DynInputModule>> {
    let options = DriverOptions {
        read_existing: klog.read_existing,
        poll_interval: Duration::from_millis(klog.poll_interval_ms),
    };
    tracing::info!(driver = %klog.driver, "initializing kernel log input");

    match klog.driver.as_str() {
        #[cfg(target_os = "linux")]
        "kmsg" => Ok(Box::new(kernlog_kernel_input::KernelLogModule::new(
            kernlog_kernel_input::KmsgDriver::new(options),
            queue,
            host,
        ))),
        #[cfg(unix)]
        "klog" => Ok(Box::new(kernlog_kernel_input::KernelLogModule::new(
            kernlog_kernel_input::KlogDriver::new(options),
            queue,
            host,
        ))),
        other => {
            let _ = (options, queue, host);
            Err(anyhow::anyhow!(
                "driver '{}' is not available on this platform",
                other
            ))
        }
    }
}

/// Periodically publish the uptime gauge until `stop` is cancelled.
fn spawn_uptime_updater(start_time: Instant, stop: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(UPTIME_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(kernlog_core::metrics::DAEMON_UPTIME_SECONDS)
                        .set(start_time.elapsed().as_secs() as f64);
                }
                _ = stop.cancelled() => break,
            }
        }
    })
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("failed to install Ctrl+C handler: {}", e))?;
    Ok("ctrl-c")
}
