use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, error, info, warn};

use super::{DispatchReport, SignalOutcome};
use crate::config::{AgentConfig, InstallLayout};
use crate::error::{AgentError, AgentResult, ArtifactError, PathError};
use crate::host::{Host, ProxyAdvertisement, artifact_digest};
use crate::migration::{DataMigrator, migration_target};
use crate::state::{DeferDecision, StateStore, UnitState};
use crate::types::{Signal, UnitStatus};

/// OS packages the application needs at runtime.
pub const DEPENDENCIES: [&str; 2] = ["nodejs", "libssl-dev"];

/// Permissions of the rendered service unit.
pub const UNIT_FILE_MODE: u32 = 0o440;

const READY: &str = "Unit is ready";

pub struct LifecycleController {
    layout: InstallLayout,
    host: Host,
    store: Box<dyn StateStore>,
    migrator: DataMigrator,
}

impl LifecycleController {
    pub fn new(layout: InstallLayout, host: Host, store: Box<dyn StateStore>) -> Self {
        Self {
            layout,
            host,
            store,
            migrator: DataMigrator::new(),
        }
    }

    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    /// Persisted state, or a fresh uninstalled unit.
    pub fn load_state(&self) -> AgentResult<UnitState> {
        Ok(self
            .store
            .load()
            .map_err(AgentError::State)?
            .unwrap_or_else(|| UnitState::new(self.layout.default_data_path.clone())))
    }

    /// Deliver `signal`, then re-deliver whatever was deferred before it.
    ///
    /// Replays run after the new signal so that a signal waiting on it (start
    /// waiting on config-changed) spends its one retry once the precondition
    /// can hold. A pending copy of `signal` itself is coalesced into this
    /// delivery, and a signal deferred by this delivery waits for the next one.
    pub fn dispatch(&self, signal: Signal, config: &AgentConfig) -> AgentResult<DispatchReport> {
        let pending = self.load_state()?.retries.pending().to_vec();
        let outcome = self.deliver(signal, config)?;

        let mut replayed = Vec::new();
        for deferred in pending.into_iter().filter(|s| *s != signal) {
            debug!(signal = %deferred, "re-delivering deferred signal");
            let outcome = self.deliver(deferred, config)?;
            replayed.push((deferred, outcome));
        }

        Ok(DispatchReport {
            replayed,
            signal,
            outcome,
        })
    }

    /// Deliver one signal: load state, handle, persist.
    ///
    /// Nothing is persisted when the handler fails.
    pub fn deliver(&self, signal: Signal, config: &AgentConfig) -> AgentResult<SignalOutcome> {
        config
            .validate()
            .map_err(|e| AgentError::Config(format!("{e:#}")))?;

        let mut state = self.load_state()?;
        if state.retries.take_pending(signal) {
            debug!(%signal, "delivery coalesced with deferred copy");
        }

        info!(%signal, "handling signal");
        let outcome = self.handle(signal, config, &mut state)?;

        state.check_invariants().map_err(AgentError::State)?;
        self.store.save(&state).map_err(AgentError::State)?;

        info!(%signal, outcome = outcome.label(), status = %state.status(), "signal handled");
        Ok(outcome)
    }

    /// Apply `signal` to `state` in memory.
    pub fn handle(
        &self,
        signal: Signal,
        config: &AgentConfig,
        state: &mut UnitState,
    ) -> AgentResult<SignalOutcome> {
        let outcome = match signal {
            Signal::Install => self.on_install(config, state)?,
            Signal::ConfigChanged if !state.installed => {
                return Ok(self.defer(signal, "installed", state));
            }
            Signal::ConfigChanged => self.on_config_changed(config, state)?,
            Signal::Start if !state.configured => {
                return Ok(self.defer(signal, "configured", state));
            }
            Signal::Start => self.on_start(state)?,
            Signal::Upgrade => self.on_upgrade(state)?,
            Signal::ProxyConnected if !state.started => {
                return Ok(self.defer(signal, "started", state));
            }
            Signal::ProxyConnected => self.on_proxy_connected(config)?,
        };
        state.retries.clear(signal);
        Ok(outcome)
    }

    fn on_install(&self, config: &AgentConfig, state: &mut UnitState) -> AgentResult<SignalOutcome> {
        state.set_status(UnitStatus::maintenance("Installing software"));

        let resource = &self.layout.resource_name;
        let artifact = match self.host.artifacts.fetch(resource) {
            Ok(path) => path,
            Err(err) => {
                warn!(error = %err, "no install resource available, install blocked");
                state.set_status(UnitStatus::blocked(format!(
                    "Upload {resource} resource to proceed"
                )));
                return Ok(SignalOutcome::Blocked(err.into()));
            }
        };

        create_dir(&self.layout.install_path)?;
        create_dir(&state.current_data_path)?;

        if let Err(err) = self
            .host
            .extractor
            .extract(&artifact, &self.layout.install_path)
        {
            return match err.downcast::<ArtifactError>() {
                Ok(bad) => {
                    error!(error = %bad, artifact = %artifact.display(), "could not install resource");
                    state.set_status(UnitStatus::blocked("Bad zip file, upload a new resource"));
                    Ok(SignalOutcome::Blocked(bad.into()))
                }
                Err(other) => Err(AgentError::Io(other)),
            };
        }
        let digest = artifact_digest(&artifact).map_err(AgentError::Io)?;

        state.set_status(UnitStatus::maintenance("Installing dependencies"));
        info!("installing dependencies");
        self.install_dependencies(config)?;

        self.render_unit(&state.current_data_path)?;

        state.installed = true;
        state.artifact_digest = Some(digest);
        state.set_status(UnitStatus::maintenance("Install complete"));
        info!("install of software complete");
        Ok(SignalOutcome::Completed)
    }

    fn install_dependencies(&self, config: &AgentConfig) -> AgentResult<()> {
        let codename = self.host.identity.distro_codename().map_err(fatal)?;
        let line = config.apt_line(&codename);
        info!(line = %line, "adding apt source");

        let packages = &self.host.packages;
        packages
            .add_repository(&line, config.node_repo_key.as_deref())
            .map_err(fatal)?;
        packages.update().map_err(fatal)?;
        packages.install_packages(&DEPENDENCIES).map_err(fatal)?;
        Ok(())
    }

    fn on_config_changed(
        &self,
        config: &AgentConfig,
        state: &mut UnitState,
    ) -> AgentResult<SignalOutcome> {
        if let Some(target) = migration_target(
            config.custom_data_path(),
            &state.current_data_path,
            &self.layout.default_data_path,
        ) && let Some(blocked) = self.relocate_data(&target, state)?
        {
            return Ok(blocked);
        }

        state.configured = true;
        state.set_status(if state.started {
            UnitStatus::active(READY)
        } else {
            UnitStatus::maintenance("Configuration complete")
        });
        info!(data_path = %state.current_data_path.display(), "configured");
        Ok(SignalOutcome::Completed)
    }

    /// Move data to `target`. Returns the blocking outcome when the move is
    /// refused or fails, or when the service does not come back afterwards.
    fn relocate_data(
        &self,
        target: &Path,
        state: &mut UnitState,
    ) -> AgentResult<Option<SignalOutcome>> {
        let plan = match self.migrator.plan(&state.current_data_path, target) {
            Ok(Some(plan)) => plan,
            Ok(None) => return Ok(None),
            Err(err) => return Ok(Some(block_on_path(err, state))),
        };

        let was_running = state.started;
        if was_running {
            info!("stopping service for data migration");
            self.host
                .services
                .stop(&self.layout.service_name)
                .map_err(AgentError::Io)?;
        }

        if let Err(err) = self.migrator.execute(&plan) {
            // The service stays down until an operator sorts out the split.
            state.started = false;
            return Ok(Some(block_on_path(err, state)));
        }

        info!(
            from = %plan.source.display(),
            to = %plan.target.display(),
            "data path migrated"
        );
        // The data now lives at the target whatever happens next.
        state.current_data_path = plan.target;
        state.started = false;

        if let Err(err) = self.restart_on_new_path(&state.current_data_path, was_running) {
            error!(error = %err, "service did not come back after data migration");
            state.set_status(UnitStatus::blocked(format!(
                "Data moved to {} but the service did not restart",
                state.current_data_path.display()
            )));
            return Ok(Some(SignalOutcome::Blocked(err)));
        }
        state.started = was_running;
        Ok(None)
    }

    fn restart_on_new_path(&self, data_path: &Path, was_running: bool) -> AgentResult<()> {
        self.render_unit(data_path)?;
        if was_running {
            self.host
                .services
                .start(&self.layout.service_name)
                .map_err(AgentError::Io)?;
        }
        Ok(())
    }

    fn on_start(&self, state: &mut UnitState) -> AgentResult<SignalOutcome> {
        state.set_status(UnitStatus::maintenance("Starting software"));
        let name = &self.layout.service_name;
        self.host.services.enable(name).map_err(AgentError::Io)?;
        self.host.services.start(name).map_err(AgentError::Io)?;

        state.enabled = true;
        state.started = true;
        state.set_status(UnitStatus::active(READY));
        info!("started");
        Ok(SignalOutcome::Completed)
    }

    fn on_upgrade(&self, state: &mut UnitState) -> AgentResult<SignalOutcome> {
        if state.enabled {
            debug!("service already enabled, nothing to upgrade");
            return Ok(SignalOutcome::Skipped);
        }
        self.host
            .services
            .enable(&self.layout.service_name)
            .map_err(AgentError::Io)?;
        state.enabled = true;
        Ok(SignalOutcome::Completed)
    }

    fn on_proxy_connected(&self, config: &AgentConfig) -> AgentResult<SignalOutcome> {
        let identity = &self.host.identity;
        let internal_host = if config.proxy_via_fqdn {
            identity.fqdn()
        } else {
            identity.address()
        }
        .map_err(AgentError::Io)?;

        let advertisement = ProxyAdvertisement::from_config(config, internal_host);
        advertisement
            .validate()
            .map_err(|e| AgentError::Config(e.to_string()))?;

        info!(?advertisement, "proxy is connected, publishing");
        self.host
            .proxy
            .publish(&advertisement)
            .map_err(AgentError::Io)?;
        Ok(SignalOutcome::Completed)
    }

    fn render_unit(&self, data_path: &Path) -> AgentResult<()> {
        let context = BTreeMap::from([
            (
                "install_path".to_string(),
                self.layout.install_path.display().to_string(),
            ),
            ("data_path".to_string(), data_path.display().to_string()),
        ]);
        self.host
            .renderer
            .render(
                &self.layout.service_name,
                &self.layout.service_file,
                &context,
                UNIT_FILE_MODE,
            )
            .map_err(AgentError::Io)?;
        self.host.services.daemon_reload().map_err(AgentError::Io)
    }

    fn defer(&self, signal: Signal, requires: &'static str, state: &mut UnitState) -> SignalOutcome {
        let err = AgentError::PreconditionNotMet { signal, requires };
        match state.retries.defer_or_drop(signal) {
            DeferDecision::Deferred => {
                warn!(%signal, requires, "called before the unit is ready, deferring");
                SignalOutcome::Deferred(err)
            }
            DeferDecision::Dropped => {
                warn!(%signal, requires, "still not ready after one retry, dropping");
                SignalOutcome::Dropped(err)
            }
        }
    }
}

impl std::fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleController")
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

fn block_on_path(err: PathError, state: &mut UnitState) -> SignalOutcome {
    error!(error = %err, "data path migration blocked");
    state.set_status(UnitStatus::blocked(err.status_reason()));
    SignalOutcome::Blocked(err.into())
}

fn fatal(err: anyhow::Error) -> AgentError {
    error!(error = %format!("{err:#}"), "dependency installation failed");
    AgentError::FatalDependency(format!("{err:#}"))
}

fn create_dir(path: &Path) -> AgentResult<()> {
    std::fs::create_dir_all(path).map_err(|e| {
        AgentError::Io(anyhow::Error::new(e).context(format!(
            "Failed to create directory: {}",
            path.display()
        )))
    })
}
