//! The resolved build plan: `ConfiguredUnit`, `PlanUnit`, `CabalPlan`, and
//! the JSON wire format an external planner emits for them (§3, §10.4).

use serde::{Deserialize, Serialize};

use crate::types::{ComponentName, FlagSpec, PkgName, PkgSrc, UnitId, Version};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfiguredUnit {
    pub pu_id: UnitId,
    pub pu_pkg_name: PkgName,
    pub pu_version: Version,
    pub pu_component_name: ComponentName,
    pub pu_pkg_src: PkgSrc,
    pub pu_setup_depends: Vec<UnitId>,
    pub pu_depends: Vec<UnitId>,
    pub pu_exe_depends: Vec<UnitId>,
    pub pu_flags: FlagSpec,
}

impl ConfiguredUnit {
    /// `dummy-package-0-inplace`, the synthetic unit the planner injects to
    /// represent the user's seed. Dropped by `SetupTagger`, never compiled.
    pub fn is_dummy_seed(&self) -> bool {
        self.pu_pkg_name.as_str() == "dummy-package-0-inplace"
    }

    pub fn package_key(&self) -> (PkgName, Version) {
        (self.pu_pkg_name.clone(), self.pu_version.clone())
    }

    /// All outgoing dependency edges, deduplicated across the three
    /// dependency kinds (setup, library, exe-tool), as `PlanSorter` wants
    /// them: an edge to every `UnitId` this unit cannot start ahead of.
    pub fn all_depends(&self) -> impl Iterator<Item = &UnitId> {
        self.pu_setup_depends
            .iter()
            .chain(self.pu_depends.iter())
            .chain(self.pu_exe_depends.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PlanUnit {
    Configured(ConfiguredUnit),
    PreExisting {
        id: UnitId,
        pkg_name: PkgName,
        version: Version,
        depends: Vec<UnitId>,
    },
}

impl PlanUnit {
    pub fn id(&self) -> &UnitId {
        match self {
            PlanUnit::Configured(u) => &u.pu_id,
            PlanUnit::PreExisting { id, .. } => id,
        }
    }

    pub fn as_configured(&self) -> Option<&ConfiguredUnit> {
        match self {
            PlanUnit::Configured(u) => Some(u),
            PlanUnit::PreExisting { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CabalPlan {
    pub units: Vec<PlanUnit>,
}

impl CabalPlan {
    pub fn find(&self, id: &UnitId) -> Option<&PlanUnit> {
        self.units.iter().find(|u| u.id() == id)
    }

    /// §4.4/§4.5 operate only over `Configured` units, in plan order.
    pub fn configured_units(&self) -> impl Iterator<Item = &ConfiguredUnit> {
        self.units.iter().filter_map(PlanUnit::as_configured)
    }
}

/// External collaborator per §10.4: parses a plan blob into a `CabalPlan`.
/// The wire format is exactly `CabalPlan`'s derived JSON shape, so
/// `parse(serialize(plan)) == plan` (§8 property 8) holds structurally —
/// `serde_json` round-trips every field without engine-side massaging.
pub fn parse(blob: &[u8]) -> crate::error::Result<CabalPlan> {
    serde_json::from_slice(blob).map_err(crate::error::OrchestratorError::from)
}

pub fn serialize(plan: &CabalPlan) -> crate::error::Result<Vec<u8>> {
    serde_json::to_vec_pretty(plan).map_err(crate::error::OrchestratorError::from)
}
