//! Read-only dump of module attributes.

use std::fmt::Write;

use crate::error::{PmdError, PmdResult};
use crate::module::Module;
use crate::registry::Registry;

/// Renders the attributes of every module, or only of `filter`.
pub fn dump(registry: &Registry, filter: Option<&str>) -> String {
    let mut out = String::new();
    let modules = selected(registry, filter);
    if modules.is_empty() {
        if let Some(instance) = filter {
            let _ = writeln!(out, "No pluggable module for Interface {}", instance);
        }
        return out;
    }

    for module in modules {
        let _ = writeln!(out, "Pluggable info for Interface {}:", module.instance);
        let pm_info = module.attributes.to_pm_info();
        let width = pm_info.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
        for (key, value) in &pm_info {
            let _ = writeln!(out, "    {:<width$} = {}", key, value, width = width);
        }
        out.push('\n');
    }
    out
}

/// Same selection as [`dump`], as JSON.
pub fn dump_json(registry: &Registry, filter: Option<&str>) -> PmdResult<String> {
    serde_json::to_string_pretty(&selected(registry, filter))
        .map_err(|e| PmdError::Configuration(format!("Failed to encode dump: {}", e)))
}

fn selected<'a>(registry: &'a Registry, filter: Option<&str>) -> Vec<&'a Module> {
    match filter {
        Some(instance) => registry.module(instance).into_iter().collect(),
        None => registry.modules().collect(),
    }
}
