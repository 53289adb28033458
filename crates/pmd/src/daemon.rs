//! Poll orchestrator.
//!
//! One pass loads the configuration snapshot, reconciles the registry
//! against it, polls every module in sequence, and publishes the attribute
//! sets that changed.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::backend::ModuleBackend;
use crate::config::{PollingConfig, RetryPolicy};
use crate::db::{ConfigSnapshot, ConfigStore, FieldValues, InterfaceRow};
use crate::error::{PmdError, PmdResult};
use crate::module::{Module, ModuleState, Subsystem};
use crate::registry::Registry;
use crate::state_machine::{poll_module, PollOutcome};
use crate::topology::TopologyDirectory;

/// Counters of one poll pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub polled: usize,
    pub identified: usize,
    pub removed: usize,
    pub failed: usize,
    pub published: usize,
}

/// Pluggable module daemon core.
pub struct Daemon<B, D> {
    backend: B,
    topology: Arc<D>,
    policy: RetryPolicy,
    dom_refresh_cycles: u32,
    registry: Registry,
    snapshot: Option<ConfigSnapshot>,
    /// Instances whose published row must be dropped.
    retired: Vec<String>,
    passes: u64,
    ready: bool,
}

impl<B, D> Daemon<B, D>
where
    B: ModuleBackend,
    D: TopologyDirectory,
{
    pub fn new(backend: B, topology: Arc<D>, polling: &PollingConfig) -> Self {
        Self::with_policy(
            backend,
            topology,
            polling.retry_policy(),
            polling.dom_refresh_cycles,
        )
    }

    pub fn with_policy(
        backend: B,
        topology: Arc<D>,
        policy: RetryPolicy,
        dom_refresh_cycles: u32,
    ) -> Self {
        Self {
            backend,
            topology,
            policy,
            dom_refresh_cycles,
            registry: Registry::new(),
            snapshot: None,
            retired: Vec::new(),
            passes: 0,
            ready: false,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Reconciles the registry if `snapshot` differs from the last one.
    pub fn apply_snapshot(&mut self, snapshot: ConfigSnapshot) {
        if self.snapshot.as_ref() == Some(&snapshot) {
            return;
        }
        self.reconcile(&snapshot);
        self.snapshot = Some(snapshot);
    }

    /// Brings subsystems and modules in line with `snapshot`.
    pub fn reconcile(&mut self, snapshot: &ConfigSnapshot) {
        let wanted = |m: &Module| {
            snapshot
                .interfaces
                .iter()
                .any(|row| row.name == m.instance && row.pluggable && row.subsystem == m.subsystem)
        };
        let stale: Vec<String> = self
            .registry
            .modules()
            .filter(|&m| !wanted(m))
            .map(|m| m.instance.clone())
            .collect();
        for instance in stale {
            self.registry.remove_module(&instance);
            self.retired.push(instance);
        }

        let vanished: Vec<String> = self
            .registry
            .subsystems()
            .filter(|s| !snapshot.subsystems.iter().any(|row| row.name == s.name))
            .map(|s| s.name.clone())
            .collect();
        for name in vanished {
            let removed = self.registry.remove_subsystem(&name);
            self.retired.extend(removed);
        }

        for row in &snapshot.subsystems {
            if self.registry.subsystem(&row.name).is_none() {
                self.registry
                    .add_subsystem(Subsystem::new(row.name.as_str(), row.key.as_str()));
            }
        }

        for row in snapshot.interfaces.iter().filter(|row| row.pluggable) {
            if self.registry.module(&row.name).is_some() {
                self.update_module(row);
            } else {
                self.create_module(row);
            }
        }
    }

    fn create_module(&mut self, row: &InterfaceRow) {
        if self.registry.subsystem(&row.subsystem).is_none() {
            warn!(
                module = %row.name,
                subsystem = %row.subsystem,
                "Interface refers to an unknown subsystem"
            );
            return;
        }
        let Some(port) = self.topology.find_port(&row.subsystem, &row.name) else {
            debug!(module = %row.name, "No pluggable port in topology, skipping");
            return;
        };

        let mut module = Module::new(
            row.name.as_str(),
            row.subsystem.as_str(),
            row.key.as_str(),
            port.clone(),
        );
        module.hw_enable = row.hw_enable;
        module.split = row.split_enable;
        self.retired.retain(|instance| instance != &row.name);

        if let Err(e) = self.registry.add_module(module) {
            error!(module = %row.name, error = %e, "Failed to create module");
            return;
        }

        let Some((subsystem, module)) = self.registry.module_with_subsystem(&row.name) else {
            return;
        };
        let result = self
            .backend
            .initialize(subsystem, module)
            .and_then(|()| self.backend.set_enabled(subsystem, module))
            .and_then(|()| self.backend.reset(subsystem, module));
        if let Err(e) = result {
            report(module, "setup", &e);
        }
    }

    fn update_module(&mut self, row: &InterfaceRow) {
        let Some((subsystem, module)) = self.registry.module_with_subsystem(&row.name) else {
            return;
        };
        if module.hw_enable == row.hw_enable && module.split == row.split_enable {
            return;
        }

        info!(
            module = %row.name,
            hw_enable = row.hw_enable,
            split = row.split_enable.is_some(),
            "Module enable changed"
        );
        module.hw_enable = row.hw_enable;
        module.split = row.split_enable;
        if let Err(e) = self.backend.set_enabled(subsystem, module) {
            report(module, "enable", &e);
        }
    }

    /// Polls every module once.
    pub fn poll(&mut self) -> PassSummary {
        let mut summary = PassSummary::default();
        self.passes += 1;

        for instance in self.registry.module_names() {
            let Some((subsystem, module)) = self.registry.module_with_subsystem(&instance) else {
                continue;
            };
            summary.polled += 1;

            match poll_module(&mut self.backend, subsystem, module, &self.policy) {
                Ok(PollOutcome::Identified) => {
                    summary.identified += 1;
                    if let Err(e) = self.backend.set_enabled(subsystem, module) {
                        report(module, "enable", &e);
                    }
                }
                Ok(PollOutcome::Removed) => summary.removed += 1,
                Ok(_) => {}
                Err(e) => {
                    summary.failed += 1;
                    report(module, "poll", &e);
                }
            }
        }

        if self.dom_refresh_cycles > 0 && self.passes % u64::from(self.dom_refresh_cycles) == 0 {
            for instance in self.registry.module_names() {
                if let Some(module) = self.registry.module_mut(&instance) {
                    if module.state() == ModuleState::PresentValidated {
                        module.a2_read_requested = true;
                    }
                }
            }
        }

        summary
    }

    /// Attribute sets waiting for publication. Retired modules map to an
    /// empty set.
    pub fn pending_updates(&self) -> Vec<(String, FieldValues)> {
        let retired = self
            .retired
            .iter()
            .map(|instance| (instance.clone(), FieldValues::new()));
        let changed = self
            .registry
            .modules()
            .filter(|m| m.changed)
            .map(|m| (m.instance.clone(), m.attributes.to_pm_info()));
        retired.chain(changed).collect()
    }

    pub fn mark_published(&mut self, instance: &str) {
        self.retired.retain(|retired| retired != instance);
        if let Some(module) = self.registry.module_mut(instance) {
            module.changed = false;
        }
    }

    /// Runs one full pass against `store`.
    pub async fn run_pass<S>(&mut self, store: &mut S) -> PmdResult<PassSummary>
    where
        S: ConfigStore + ?Sized,
    {
        let snapshot = store.load_snapshot().await?;
        self.apply_snapshot(snapshot);

        let mut summary = self.poll();

        for (instance, pm_info) in self.pending_updates() {
            match store.publish_pm_info(&instance, &pm_info).await {
                Ok(()) => {
                    self.mark_published(&instance);
                    summary.published += 1;
                }
                Err(e) => warn!(module = %instance, error = %e, "Failed to publish pm_info"),
            }
        }

        if !self.ready {
            store.set_daemon_ready().await?;
            self.ready = true;
            info!(modules = self.registry.len(), "Initial hardware pass complete");
        }

        debug!(?summary, "Pass complete");
        Ok(summary)
    }

    /// Runs passes every `interval` until `shutdown` resolves.
    pub async fn run<S, F>(&mut self, store: &mut S, interval: Duration, shutdown: F) -> PmdResult<()>
    where
        S: ConfigStore + ?Sized,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.run_pass(store).await {
                        error!(error = %e, "Poll pass failed");
                    }
                }
            }
        }
    }
}

/// Logs a module error; "not pluggable" only once per module.
fn report(module: &mut Module, what: &str, err: &PmdError) {
    if let PmdError::NotPluggable { .. } = err {
        if !module.not_pluggable_logged {
            warn!(module = %module.instance, error = %err, "Module is not pluggable");
            module.not_pluggable_logged = true;
        }
        return;
    }
    warn!(module = %module.instance, op = what, error = %err, "Module operation failed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MockConfigStore, SubsystemRow};
    use crate::eeprom::DiagnosticPages;
    use crate::topology::{PortDescriptor, StaticTopology};
    use sonic_sff::{checksum, ModuleIdentity, SerialIdPage};

    #[derive(Default)]
    struct FakeBackend {
        present: bool,
        page: Option<SerialIdPage>,
        enables: Vec<(String, bool)>,
        resets: Vec<String>,
        initialized: Vec<String>,
    }

    impl ModuleBackend for FakeBackend {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn detect(&mut self, _: &Subsystem, module: &Module) -> PmdResult<bool> {
            module.connector_type()?;
            Ok(self.present)
        }

        fn read_serial_id(&mut self, _: &Subsystem, _: &Module) -> PmdResult<SerialIdPage> {
            self.page.ok_or_else(|| PmdError::transport("eeprom", "nak"))
        }

        fn read_diagnostics(
            &mut self,
            _: &Subsystem,
            _: &Module,
            _: &ModuleIdentity,
        ) -> PmdResult<DiagnosticPages> {
            Ok(DiagnosticPages::sfp([0xff; 128]))
        }

        fn reset(&mut self, _: &Subsystem, module: &Module) -> PmdResult<()> {
            self.resets.push(module.instance.clone());
            Ok(())
        }

        fn set_enabled(&mut self, _: &Subsystem, module: &Module) -> PmdResult<()> {
            self.enables.push((module.instance.clone(), module.hw_enable));
            Ok(())
        }

        fn initialize(&mut self, _: &Subsystem, module: &Module) -> PmdResult<()> {
            self.initialized.push(module.instance.clone());
            Ok(())
        }
    }

    fn port(instance: &str, connector: &str) -> PortDescriptor {
        PortDescriptor {
            instance: instance.to_string(),
            connector: connector.to_string(),
            module_eeprom: format!("port{}_eeprom", instance),
            sfp: None,
            qsfp: None,
        }
    }

    fn topology() -> Arc<StaticTopology> {
        Arc::new(
            StaticTopology::default()
                .with_port("base", port("1", "SFP_PLUS"))
                .with_port("base", port("2", "SFP_PLUS"))
                .with_port("base", port("3", "RJ45")),
        )
    }

    fn interface(name: &str, hw_enable: bool, pluggable: bool) -> InterfaceRow {
        InterfaceRow {
            name: name.to_string(),
            key: format!("INTERFACE|{}", name),
            subsystem: "base".to_string(),
            hw_enable,
            pluggable,
            split_enable: None,
        }
    }

    fn snapshot(interfaces: Vec<InterfaceRow>) -> ConfigSnapshot {
        ConfigSnapshot {
            subsystems: vec![SubsystemRow {
                name: "base".to_string(),
                key: "SUBSYSTEM|base".to_string(),
            }],
            interfaces,
        }
    }

    fn sfp_page() -> SerialIdPage {
        let mut page = [0u8; 128];
        page[0] = 0x03;
        page[3] = 0x10;
        page[20..36].copy_from_slice(b"ACME            ");
        page[63] = checksum::checksum(&page[0..63]);
        page[95] = checksum::checksum(&page[64..95]);
        page
    }

    fn daemon(backend: FakeBackend) -> Daemon<FakeBackend, StaticTopology> {
        Daemon::with_policy(backend, topology(), RetryPolicy::immediate(2), 0)
    }

    #[test]
    fn test_reconcile_creates_pluggable_modules() {
        let mut daemon = daemon(FakeBackend::default());
        daemon.reconcile(&snapshot(vec![
            interface("1", true, true),
            interface("2", false, false),
            interface("9", true, true),
        ]));

        assert_eq!(daemon.registry().module_names(), vec!["1".to_string()]);
        assert_eq!(daemon.backend().initialized, vec!["1".to_string()]);
        assert_eq!(daemon.backend().enables, vec![("1".to_string(), true)]);
        assert_eq!(daemon.backend().resets, vec!["1".to_string()]);
    }

    #[test]
    fn test_reconcile_applies_enable_changes_once() {
        let mut daemon = daemon(FakeBackend::default());
        daemon.reconcile(&snapshot(vec![interface("1", true, true)]));
        daemon.backend_mut().enables.clear();

        daemon.reconcile(&snapshot(vec![interface("1", false, true)]));
        daemon.reconcile(&snapshot(vec![interface("1", false, true)]));
        assert_eq!(daemon.backend().enables, vec![("1".to_string(), false)]);
        assert!(!daemon.registry().module("1").unwrap().hw_enable);
    }

    #[test]
    fn test_reconcile_removes_and_retires() {
        let mut daemon = daemon(FakeBackend::default());
        daemon.reconcile(&snapshot(vec![interface("1", true, true), interface("2", true, true)]));
        daemon.reconcile(&snapshot(vec![interface("2", true, true)]));

        assert_eq!(daemon.registry().module_names(), vec!["2".to_string()]);
        let pending = daemon.pending_updates();
        assert_eq!(pending[0], ("1".to_string(), FieldValues::new()));

        daemon.reconcile(&ConfigSnapshot::default());
        assert!(daemon.registry().is_empty());
        assert!(daemon.registry().subsystem("base").is_none());
    }

    #[test]
    fn test_poll_confines_errors() {
        let mut daemon = daemon(FakeBackend {
            present: true,
            page: Some(sfp_page()),
            ..Default::default()
        });
        daemon.reconcile(&snapshot(vec![interface("1", true, true), interface("3", true, true)]));

        let summary = daemon.poll();
        assert_eq!(summary.polled, 2);
        assert_eq!(summary.identified, 1);
        assert_eq!(summary.failed, 1);
        assert!(daemon.registry().module("3").unwrap().not_pluggable_logged);

        let pending = daemon.pending_updates();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].0, "1");
    }

    #[test]
    fn test_dom_refresh_flags_validated_modules() {
        let mut daemon = Daemon::with_policy(
            FakeBackend {
                present: true,
                page: Some(sfp_page()),
                ..Default::default()
            },
            topology(),
            RetryPolicy::immediate(2),
            2,
        );
        daemon.reconcile(&snapshot(vec![interface("1", true, true)]));

        daemon.poll();
        assert!(!daemon.registry().module("1").unwrap().a2_read_requested);
        daemon.poll();
        assert!(daemon.registry().module("1").unwrap().a2_read_requested);
    }

    #[tokio::test]
    async fn test_run_pass_publishes_and_announces_ready() {
        let mut daemon = daemon(FakeBackend::default());
        let mut store = MockConfigStore::new();
        store
            .expect_load_snapshot()
            .times(2)
            .returning(|| Ok(snapshot(vec![interface("1", true, true)])));
        store
            .expect_publish_pm_info()
            .withf(|instance, fvs| {
                instance == "1" && fvs.iter().any(|(k, v)| k == "connector" && v == "absent")
            })
            .times(1)
            .returning(|_, _| Ok(()));
        store.expect_set_daemon_ready().times(1).returning(|| Ok(()));

        let first = daemon.run_pass(&mut store).await.unwrap();
        assert_eq!(first.published, 1);
        assert!(daemon.is_ready());

        let second = daemon.run_pass(&mut store).await.unwrap();
        assert_eq!(second.published, 0);
    }

    #[tokio::test]
    async fn test_publish_failure_keeps_update_pending() {
        let mut daemon = daemon(FakeBackend::default());
        let mut store = MockConfigStore::new();
        store
            .expect_load_snapshot()
            .returning(|| Ok(snapshot(vec![interface("1", true, true)])));
        store
            .expect_publish_pm_info()
            .returning(|_, _| Err(PmdError::Database("down".to_string())));
        store.expect_set_daemon_ready().returning(|| Ok(()));

        daemon.run_pass(&mut store).await.unwrap();
        assert_eq!(daemon.pending_updates().len(), 1);
    }
}
