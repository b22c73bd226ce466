//! `PlanSorter` (§4.4): reverse-topological order over `Configured` units,
//! with stable tie-breaking and cycle detection.
//!
//! DFS with `visited`/`visiting` sets, the same shape as a dependency
//! resolver's own topological walk: push a node onto the output only after
//! all its dependencies have been pushed, and treat re-entering a node
//! still on the current path as a cycle.

use std::collections::{HashMap, HashSet};

use crate::error::{OrchestratorError, Result};
use crate::plan::{CabalPlan, ConfiguredUnit};
use crate::types::UnitId;

/// Returns `Configured` units in reverse-topological order: every unit
/// appears after all of its dependencies. Edges to `PreExisting` units are
/// dropped — those units are already installed and impose no ordering on
/// what follows. An edge to an id that resolves to neither a `Configured`
/// nor a `PreExisting` unit is a `DanglingDep` (§7).
pub fn sort_plan(plan: &CabalPlan) -> Result<Vec<ConfiguredUnit>> {
    let configured: HashMap<&UnitId, &ConfiguredUnit> = plan
        .configured_units()
        .map(|u| (&u.pu_id, u))
        .collect();

    // Ties are broken by first-appearance order in the input plan: visit
    // units in that order and let the DFS emit as it goes, which already
    // produces first-appearance order among otherwise-unconstrained nodes.
    let ordered_ids: Vec<&UnitId> = plan.configured_units().map(|u| &u.pu_id).collect();

    let mut visited: HashSet<UnitId> = HashSet::new();
    let mut visiting: HashSet<UnitId> = HashSet::new();
    let mut out: Vec<ConfiguredUnit> = Vec::with_capacity(configured.len());

    for id in ordered_ids {
        visit(id, plan, &configured, &mut visited, &mut visiting, &mut out)?;
    }

    Ok(out)
}

fn visit(
    id: &UnitId,
    plan: &CabalPlan,
    configured: &HashMap<&UnitId, &ConfiguredUnit>,
    visited: &mut HashSet<UnitId>,
    visiting: &mut HashSet<UnitId>,
    out: &mut Vec<ConfiguredUnit>,
) -> Result<()> {
    if visited.contains(id) {
        return Ok(());
    }
    // Callers only ever reach here with an id known to be configured: the
    // top-level loop walks `configured_units()` directly, and the
    // recursive call below only fires after `configured.contains_key(dep)`.
    let unit = configured[id];

    if visiting.contains(id) {
        return Err(OrchestratorError::PlanCyclic { unit: id.clone() });
    }
    visiting.insert(id.clone());

    for dep in unit.all_depends() {
        if configured.contains_key(dep) {
            visit(dep, plan, configured, visited, visiting, out)?;
        } else if plan.find(dep).is_none() {
            return Err(OrchestratorError::DanglingDep {
                unit: id.clone(),
                dep: dep.clone(),
            });
        }
        // else: `dep` names a `PreExisting` unit — already installed, no
        // edge to follow.
    }

    visiting.remove(id);
    visited.insert(id.clone());
    out.push(unit.clone());
    Ok(())
}
