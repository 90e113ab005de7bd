//! Dependency resolution and load-queue construction.
//!
//! All functions operate on the manager's spec list and address specs by
//! [`SpecId`], the index into that list.
use std::collections::VecDeque;

use crate::plugin_system::dependency::DependencyKind;
use crate::plugin_system::spec::{PluginSpec, PluginState, SpecId};

/// Match every declared dependency of `id` to the first spec providing it.
///
/// A resolved spec is reset to `Read` and resolved again. Missing required
/// dependencies are reported together, one per line.
pub fn resolve_dependencies(specs: &mut [PluginSpec], id: SpecId) -> bool {
    let spec = &mut specs[id.0];
    if spec.has_error() {
        return false;
    }
    if spec.state() == PluginState::Resolved {
        spec.set_state(PluginState::Read);
    }
    if spec.state() != PluginState::Read {
        spec.report_error("Resolving dependencies failed because state != Read");
        return false;
    }

    let mut resolved = Vec::new();
    let mut missing = Vec::new();
    for dependency in specs[id.0].dependencies() {
        match specs.iter().position(|s| s.provides(&dependency.name, &dependency.version)) {
            Some(found) => {
                if !resolved.iter().any(|(d, _)| d == dependency) {
                    resolved.push((dependency.clone(), SpecId(found)));
                }
            }
            None if dependency.kind == DependencyKind::Required => {
                missing.push(format!(
                    "Could not resolve dependency '{}({})'",
                    dependency.name, dependency.version
                ));
            }
            None => {}
        }
    }

    let spec = &mut specs[id.0];
    if !missing.is_empty() {
        for error in &missing {
            spec.append_error(error);
        }
        log::debug!("{}: {}", spec.name(), spec.error_string());
        return false;
    }
    spec.dependency_specs = resolved;
    spec.set_state(PluginState::Resolved);
    true
}

/// Resolve every spec in list order
pub fn resolve_all(specs: &mut [PluginSpec]) {
    for index in 0..specs.len() {
        resolve_dependencies(specs, SpecId(index));
    }
}

/// Mark the disabled dependencies of enabled plugins as indirectly enabled,
/// until nothing changes.
///
/// Test dependencies only count for the specs in `test_specs`. The walk is a
/// plain worklist rather than the load queue because test dependencies may
/// form cycles.
pub fn enable_dependencies_indirectly(specs: &mut [PluginSpec], test_specs: &[SpecId]) {
    for spec in specs.iter_mut() {
        spec.set_enabled_indirectly(false);
    }
    let mut queue: VecDeque<SpecId> = specs
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_effectively_enabled())
        .map(|(i, _)| SpecId(i))
        .collect();

    while let Some(id) = queue.pop_front() {
        if !specs[id.0].is_effectively_enabled() {
            continue;
        }
        let with_tests = test_specs.contains(&id);
        let dependencies: Vec<SpecId> = specs[id.0]
            .dependency_specs()
            .iter()
            .filter(|(dep, _)| dep.kind == DependencyKind::Required || (with_tests && dep.kind == DependencyKind::Test))
            .map(|(_, dep_id)| *dep_id)
            .collect();
        for dep_id in dependencies {
            if !specs[dep_id.0].is_effectively_enabled() {
                specs[dep_id.0].set_enabled_indirectly(true);
                log::debug!("{} enabled indirectly by {}", specs[dep_id.0].name(), specs[id.0].name());
                queue.push_back(dep_id);
            }
        }
    }
}

/// Order specs so that every dependency comes before its dependents.
///
/// Specs that were never resolved are still queued (they are skipped by the
/// load phases). Cycles and failed dependencies are recorded as errors on the
/// affected specs.
pub fn load_queue(specs: &mut [PluginSpec]) -> Vec<SpecId> {
    let mut queue = Vec::with_capacity(specs.len());
    for index in 0..specs.len() {
        let mut circularity_check = Vec::new();
        visit(specs, SpecId(index), &mut queue, &mut circularity_check);
    }
    queue
}

fn visit(specs: &mut [PluginSpec], id: SpecId, queue: &mut Vec<SpecId>, stack: &mut Vec<SpecId>) -> bool {
    if queue.contains(&id) {
        return true;
    }
    if let Some(start) = stack.iter().position(|s| *s == id) {
        let mut message = String::from("Circular dependency detected:\n");
        for member in &stack[start..] {
            let member = &specs[member.0];
            message.push_str(&format!("{} ({}) depends on\n", member.name(), member.version()));
        }
        let spec = &mut specs[id.0];
        message.push_str(&format!("{} ({})", spec.name(), spec.version()));
        spec.report_error(message);
        return false;
    }
    stack.push(id);

    if matches!(specs[id.0].state(), PluginState::Invalid | PluginState::Read) {
        queue.push(id);
        return false;
    }

    // Test dependencies only force plugins to load for test runs.
    let dependencies: Vec<SpecId> = specs[id.0]
        .dependency_specs()
        .iter()
        .filter(|(dep, _)| dep.kind != DependencyKind::Test)
        .map(|(_, dep_id)| *dep_id)
        .collect();
    for dep_id in dependencies {
        if !visit(specs, dep_id, queue, stack) {
            let dependency = &specs[dep_id.0];
            let message = format!(
                "Cannot load plugin because dependency failed to load: {} ({})\nReason: {}",
                dependency.name(),
                dependency.version(),
                dependency.error_string()
            );
            specs[id.0].report_error(message);
            return false;
        }
    }

    queue.push(id);
    true
}

/// Every spec in `queue` that transitively requires `id`, in queue order
pub fn plugins_requiring(specs: &[PluginSpec], queue: &[SpecId], id: SpecId) -> Vec<SpecId> {
    let mut depending = vec![id];
    for candidate in queue {
        if !depending.contains(candidate) && specs[candidate.0].requires_any(&depending) {
            depending.push(*candidate);
        }
    }
    depending.retain(|d| *d != id);
    depending
}

/// Every spec `id` transitively requires, breadth first
pub fn plugins_required_by(specs: &[PluginSpec], id: SpecId) -> Vec<SpecId> {
    let mut found = vec![id];
    let mut queue = VecDeque::from([id]);
    while let Some(current) = queue.pop_front() {
        for (dependency, dep_id) in specs[current.0].dependency_specs() {
            if dependency.kind == DependencyKind::Required && !found.contains(dep_id) {
                found.push(*dep_id);
                queue.push_back(*dep_id);
            }
        }
    }
    found.retain(|d| *d != id);
    found
}
