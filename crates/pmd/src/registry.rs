//! Registry of subsystems and modules.

use std::collections::BTreeMap;

use tracing::info;

use crate::error::{PmdError, PmdResult};
use crate::module::{Module, Subsystem};

/// Owns every subsystem and module, keyed by name.
///
/// Modules name their subsystem; a subsystem is only removed after its
/// modules.
#[derive(Debug, Default)]
pub struct Registry {
    subsystems: BTreeMap<String, Subsystem>,
    modules: BTreeMap<String, Module>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_subsystem(&mut self, subsystem: Subsystem) {
        info!(subsystem = %subsystem.name, "Subsystem added");
        self.subsystems.insert(subsystem.name.clone(), subsystem);
    }

    /// Removes a subsystem and every module it owns. Returns the removed
    /// module names.
    pub fn remove_subsystem(&mut self, name: &str) -> Vec<String> {
        let owned: Vec<String> = self
            .modules
            .values()
            .filter(|m| m.subsystem == name)
            .map(|m| m.instance.clone())
            .collect();
        for instance in &owned {
            self.modules.remove(instance);
        }
        if self.subsystems.remove(name).is_some() {
            info!(subsystem = %name, modules = owned.len(), "Subsystem removed");
        }
        owned
    }

    pub fn subsystem(&self, name: &str) -> Option<&Subsystem> {
        self.subsystems.get(name)
    }

    pub fn subsystems(&self) -> impl Iterator<Item = &Subsystem> {
        self.subsystems.values()
    }

    /// Adds a module; its subsystem must already be registered.
    pub fn add_module(&mut self, module: Module) -> PmdResult<()> {
        if !self.subsystems.contains_key(&module.subsystem) {
            return Err(PmdError::SubsystemNotFound(module.subsystem.clone()));
        }
        info!(module = %module.instance, subsystem = %module.subsystem, "Module added");
        self.modules.insert(module.instance.clone(), module);
        Ok(())
    }

    pub fn remove_module(&mut self, instance: &str) -> Option<Module> {
        let removed = self.modules.remove(instance);
        if removed.is_some() {
            info!(module = %instance, "Module removed from registry");
        }
        removed
    }

    pub fn module(&self, instance: &str) -> Option<&Module> {
        self.modules.get(instance)
    }

    pub fn module_mut(&mut self, instance: &str) -> Option<&mut Module> {
        self.modules.get_mut(instance)
    }

    /// Modules in instance-name order.
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    pub fn module_names(&self) -> Vec<String> {
        self.modules.keys().cloned().collect()
    }

    /// Splits the registry into a module and its subsystem.
    pub fn module_with_subsystem(&mut self, instance: &str) -> Option<(&Subsystem, &mut Module)> {
        let module = self.modules.get_mut(instance)?;
        let subsystem = self.subsystems.get(&module.subsystem)?;
        Some((subsystem, module))
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::PortDescriptor;

    fn module(instance: &str, subsystem: &str) -> Module {
        Module::new(
            instance,
            subsystem,
            format!("INTERFACE|{}", instance),
            PortDescriptor {
                instance: instance.to_string(),
                connector: "SFP_PLUS".to_string(),
                module_eeprom: String::new(),
                sfp: None,
                qsfp: None,
            },
        )
    }

    #[test]
    fn test_module_requires_subsystem() {
        let mut registry = Registry::new();
        let err = registry.add_module(module("1", "base")).unwrap_err();
        assert!(matches!(err, PmdError::SubsystemNotFound(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_subsystem_cascades() {
        let mut registry = Registry::new();
        registry.add_subsystem(Subsystem::new("base", "SUBSYSTEM|base"));
        registry.add_subsystem(Subsystem::new("line1", "SUBSYSTEM|line1"));
        registry.add_module(module("1", "base")).unwrap();
        registry.add_module(module("2", "base")).unwrap();
        registry.add_module(module("3", "line1")).unwrap();

        let mut removed = registry.remove_subsystem("base");
        removed.sort();
        assert_eq!(removed, vec!["1".to_string(), "2".to_string()]);
        assert!(registry.subsystem("base").is_none());
        assert_eq!(registry.module_names(), vec!["3".to_string()]);
    }

    #[test]
    fn test_module_with_subsystem() {
        let mut registry = Registry::new();
        registry.add_subsystem(Subsystem::new("base", "SUBSYSTEM|base"));
        registry.add_module(module("1", "base")).unwrap();

        let (subsystem, module) = registry.module_with_subsystem("1").unwrap();
        assert_eq!(subsystem.name, "base");
        module.hw_enable = true;
        assert!(registry.module("1").unwrap().hw_enable);
        assert!(registry.module_with_subsystem("9").is_none());
    }
}
