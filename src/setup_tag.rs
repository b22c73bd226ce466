//! `SetupTagger` (§4.5): marks exactly one unit per package as the "setup
//! owner" responsible for compiling that package's Setup driver, and drops
//! the dummy seed unit.

use std::collections::HashMap;

use crate::plan::ConfiguredUnit;
use crate::types::{PkgName, UnitId, Version};

#[derive(Debug, Clone)]
pub struct TaggedUnit {
    pub unit: ConfiguredUnit,
    /// `None` for the package's setup owner (the first unit of that
    /// package encountered in sorted order); `Some(owner_id)` otherwise.
    pub setup_owner: Option<UnitId>,
}

/// Walks `sorted` (reverse-topological order from `sort_plan`) and tags
/// each unit. Because setup dependencies always precede their dependents
/// in that order, the first unit seen per `(PkgName, Version)` is
/// guaranteed to be the owner before any sibling of the same package is
/// reached (§4.5 contract).
pub fn tag_units(sorted: Vec<ConfiguredUnit>) -> Vec<TaggedUnit> {
    let mut owners: HashMap<(PkgName, Version), UnitId> = HashMap::new();
    let mut out = Vec::with_capacity(sorted.len());

    for unit in sorted {
        if unit.is_dummy_seed() {
            continue;
        }
        let key = unit.package_key();
        let setup_owner = match owners.get(&key) {
            Some(owner) => Some(owner.clone()),
            None => {
                owners.insert(key, unit.pu_id.clone());
                None
            }
        };
        out.push(TaggedUnit { unit, setup_owner });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ComponentKind, ComponentName, FlagSpec, PkgSrc};

    fn v(s: &str) -> Version {
        Version(semver::Version::parse(s).unwrap())
    }

    fn unit(id: &str, pkg: &str, kind: ComponentKind, ver: &str) -> ConfiguredUnit {
        ConfiguredUnit {
            pu_id: UnitId::from(id),
            pu_pkg_name: PkgName::from(pkg),
            pu_version: v(ver),
            pu_component_name: ComponentName {
                kind,
                name: pkg.to_string(),
            },
            pu_pkg_src: PkgSrc::Remote,
            pu_setup_depends: vec![],
            pu_depends: vec![],
            pu_exe_depends: vec![],
            pu_flags: FlagSpec::new(),
        }
    }

    #[test]
    fn s2_first_component_is_setup_owner() {
        let sorted = vec![
            unit("bar-2.0-lib", "bar", ComponentKind::Lib, "2.0.0"),
            unit("bar-2.0-exe", "bar", ComponentKind::Exe, "2.0.0"),
        ];
        let tagged = tag_units(sorted);
        assert_eq!(tagged.len(), 2);
        assert_eq!(tagged[0].setup_owner, None);
        assert_eq!(tagged[1].setup_owner, Some(UnitId::from("bar-2.0-lib")));
    }

    #[test]
    fn exactly_one_owner_per_package() {
        let sorted = vec![
            unit("a-1", "a", ComponentKind::Lib, "1.0.0"),
            unit("a-1-test", "a", ComponentKind::Test, "1.0.0"),
            unit("b-1", "b", ComponentKind::Lib, "1.0.0"),
        ];
        let tagged = tag_units(sorted);
        let none_count = tagged.iter().filter(|t| t.setup_owner.is_none()).count();
        assert_eq!(none_count, 2); // one per package: a, b
    }

    #[test]
    fn dummy_seed_is_elided() {
        let sorted = vec![unit(
            "dummy-0",
            "dummy-package-0-inplace",
            ComponentKind::Lib,
            "0.0.0",
        )];
        let tagged = tag_units(sorted);
        assert!(tagged.is_empty());
    }
}
