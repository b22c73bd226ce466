//! Core identifier and package-spec types (§3 of the design).
//!
//! `PkgName`, `UnitId`, `Version`, `FlagName` are opaque text-backed
//! identifiers: equality and hashing are by contents, with no further
//! structure the engine interprets.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! text_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }
    };
}

text_id!(PkgName);
text_id!(UnitId);
text_id!(FlagName);

/// Backed by `semver::Version` rather than raw text: plan blobs encode
/// versions as strings, but comparisons elsewhere (freeze pins,
/// allow-newer bounds) want real semver ordering, not lexical.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(pub semver::Version);

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed variant of build-tool component kinds. Mirrors how `cargo`
/// closes `CompileMode` over the finite set of things it can build, with
/// `as_flag` standing in for the helper predicates cargo attaches there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Lib,
    FLib,
    Exe,
    Test,
    Bench,
    Setup,
}

impl ComponentKind {
    /// The native tool's component-selection flag, e.g. `--lib`, `--exe`.
    pub fn as_flag(self) -> &'static str {
        match self {
            ComponentKind::Lib => "lib",
            ComponentKind::FLib => "flib",
            ComponentKind::Exe => "exe",
            ComponentKind::Test => "test",
            ComponentKind::Bench => "bench",
            ComponentKind::Setup => "setup",
        }
    }

    pub fn is_library_bearing(self) -> bool {
        matches!(self, ComponentKind::Lib | ComponentKind::FLib)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ComponentName {
    pub kind: ComponentKind,
    pub name: String,
}

impl fmt::Display for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_flag(), self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PkgSrc {
    Local { path: std::path::PathBuf },
    Remote,
}

/// Tri-state flag assignment: on, off, or left unset (deferred to the
/// package's own default).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagValue {
    On,
    Off,
}

pub type FlagSpec = BTreeMap<FlagName, FlagValue>;

/// A constraint string plus a flag assignment. Per §3, a `PkgSpec` is
/// *empty* iff every flag in its `FlagSpec` is unset — equivalently, iff
/// the map itself is empty (this type has no entry for "unset").
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PkgSpec {
    pub constraint: String,
    pub flags: FlagSpec,
}

impl PkgSpec {
    pub fn is_empty(&self) -> bool {
        self.constraint.is_empty() && self.flags.is_empty()
    }
}

pub type UnitSpecs = BTreeMap<PkgName, (PkgSrc, PkgSpec, BTreeSet<ComponentName>)>;
pub type PkgSpecs = BTreeMap<PkgName, PkgSpec>;

/// `(depender, dependee)` pairs permitted to bypass an upper version
/// bound. `("*", "*")` — stored as the literal wildcard strings — means
/// universal allow-newer.
pub type AllowNewer = BTreeSet<(PkgName, PkgName)>;

pub const ALLOW_NEWER_WILDCARD: &str = "*";

pub fn allow_newer_is_universal(set: &AllowNewer) -> bool {
    set.contains(&(
        PkgName(ALLOW_NEWER_WILDCARD.to_string()),
        PkgName(ALLOW_NEWER_WILDCARD.to_string()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pkg_spec_empty_iff_no_flags_and_no_constraint() {
        let empty = PkgSpec::default();
        assert!(empty.is_empty());

        let with_constraint = PkgSpec {
            constraint: ">=1.0".into(),
            flags: FlagSpec::new(),
        };
        assert!(!with_constraint.is_empty());

        let mut with_flag = PkgSpec::default();
        with_flag.flags.insert(FlagName::from("threaded"), FlagValue::On);
        assert!(!with_flag.is_empty());
    }

    #[test]
    fn allow_newer_wildcard_detection() {
        let mut set = AllowNewer::new();
        assert!(!allow_newer_is_universal(&set));
        set.insert((PkgName::from("*"), PkgName::from("*")));
        assert!(allow_newer_is_universal(&set));
    }

    #[test]
    fn component_name_display() {
        let c = ComponentName {
            kind: ComponentKind::Exe,
            name: "mybar".into(),
        };
        assert_eq!(c.to_string(), "exe:mybar");
    }
}
