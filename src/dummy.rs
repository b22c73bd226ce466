//! Dummy seed project generation (§10.5): a throwaway scratch package
//! (`dummy-package-0-inplace`) the native tool is asked to compute a plan
//! against, naming the user's seed packages as dependencies. Pure string
//! templating; owns no engine state, exercised only by `plan` mode.

use crate::types::{FlagValue, UnitSpecs};

/// Renders the scratch package descriptor for `seeds`. The native tool's
/// own descriptor format is outside this engine's concern (it's consumed
/// by an external planner, §1's "out of scope" list) — this produces the
/// minimal dependency-and-flags section any such format needs.
pub fn render_descriptor(seeds: &UnitSpecs) -> String {
    let mut out = String::from("name: dummy-package-0-inplace\nversion: 0\nlibrary\n");
    out.push_str("  build-depends:\n");
    let mut deps: Vec<String> = Vec::new();
    for (name, (_, spec, _)) in seeds {
        let mut entry = name.as_str().to_string();
        if !spec.constraint.is_empty() {
            entry.push(' ');
            entry.push_str(&spec.constraint);
        }
        deps.push(entry);
    }
    deps.sort();
    for (i, dep) in deps.iter().enumerate() {
        out.push_str("    ");
        out.push_str(dep);
        if i + 1 < deps.len() {
            out.push(',');
        }
        out.push('\n');
    }

    for (name, (_, spec, _)) in seeds {
        for (flag, value) in &spec.flags {
            let sign = match value {
                FlagValue::On => "+",
                FlagValue::Off => "-",
            };
            out.push_str(&format!("-- flag assignment for {name}: {sign}{flag}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ComponentName, PkgName, PkgSpec, PkgSrc};
    use std::collections::BTreeSet;

    #[test]
    fn renders_seed_deps_in_sorted_order() {
        let mut seeds = UnitSpecs::new();
        seeds.insert(
            PkgName::from("zlib"),
            (PkgSrc::Remote, PkgSpec::default(), BTreeSet::<ComponentName>::new()),
        );
        seeds.insert(
            PkgName::from("aeson"),
            (PkgSrc::Remote, PkgSpec::default(), BTreeSet::<ComponentName>::new()),
        );
        let rendered = render_descriptor(&seeds);
        let aeson_pos = rendered.find("aeson").unwrap();
        let zlib_pos = rendered.find("zlib").unwrap();
        assert!(aeson_pos < zlib_pos);
    }

    #[test]
    fn includes_constraint_string() {
        let mut seeds = UnitSpecs::new();
        seeds.insert(
            PkgName::from("aeson"),
            (
                PkgSrc::Remote,
                PkgSpec {
                    constraint: ">=2.0".into(),
                    flags: Default::default(),
                },
                BTreeSet::new(),
            ),
        );
        let rendered = render_descriptor(&seeds);
        assert!(rendered.contains("aeson >=2.0"));
    }
}
