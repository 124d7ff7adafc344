//! Dependency and conflict resolution over the installed set.

use tracing::error;

use crate::error::ModuleError;
use crate::info::ModuleInfo;

fn installed(modules: &[ModuleInfo], name: &str) -> bool {
    let name = name.to_lowercase();
    modules.iter().any(|info| info.name == name)
}

/// Removes modules whose dependencies are missing or whose conflicts are
/// installed, repeating until nothing changes.
///
/// Removals happen in table order and are visible to later checks of the
/// same pass, so of two mutually conflicting modules only the first is
/// removed. Returns one error per removal.
pub fn resolve_constraints(modules: &mut Vec<ModuleInfo>) -> Vec<ModuleError> {
    let mut removed = Vec::new();
    loop {
        let before = removed.len();

        let mut i = 0;
        while i < modules.len() {
            let missing = modules[i]
                .dependencies
                .iter()
                .find(|dependency| !installed(modules, dependency))
                .cloned();
            match missing {
                Some(dependency) => {
                    let info = modules.remove(i);
                    error!(
                        module = %info.printable_name(),
                        dependency,
                        "module requires a dependency that is not installed"
                    );
                    removed.push(ModuleError::DependencyMissing {
                        name: info.name,
                        dependency,
                    });
                }
                None => i += 1,
            }
        }

        let mut i = 0;
        while i < modules.len() {
            let present = modules[i]
                .conflicts
                .iter()
                .find(|conflict| {
                    conflict.to_lowercase() != modules[i].name && installed(modules, conflict)
                })
                .cloned();
            match present {
                Some(conflict) => {
                    let info = modules.remove(i);
                    error!(
                        module = %info.printable_name(),
                        conflict,
                        "module cannot be loaded while a conflicting module is installed"
                    );
                    removed.push(ModuleError::ConflictDetected {
                        name: info.name,
                        conflict,
                    });
                }
                None => i += 1,
            }
        }

        if removed.len() == before {
            return removed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(name: &str, dependencies: &[&str], conflicts: &[&str]) -> ModuleInfo {
        let mut info = ModuleInfo::new(name);
        info.dependencies = dependencies.iter().map(ToString::to_string).collect();
        info.conflicts = conflicts.iter().map(ToString::to_string).collect();
        info
    }

    fn names(modules: &[ModuleInfo]) -> Vec<&str> {
        modules.iter().map(|info| info.name.as_str()).collect()
    }

    #[test]
    fn missing_dependency_removes_dependent() {
        let mut modules = vec![module("x", &["y"], &[]), module("z", &[], &[])];
        let removed = resolve_constraints(&mut modules);
        assert_eq!(names(&modules), ["z"]);
        assert_eq!(removed.len(), 1);
        assert!(matches!(
            &removed[0],
            ModuleError::DependencyMissing { name, dependency } if name == "x" && dependency == "y"
        ));
    }

    #[test]
    fn removals_cascade_to_fixed_point() {
        // c needs b needs a; a is missing. Table order puts c first so the
        // cascade needs more than one pass.
        let mut modules = vec![
            module("c", &["b"], &[]),
            module("b", &["a"], &[]),
            module("d", &["B"], &[]),
            module("e", &[], &[]),
        ];
        let removed = resolve_constraints(&mut modules);
        assert_eq!(names(&modules), ["e"]);
        assert_eq!(removed.len(), 3);
    }

    #[test]
    fn first_of_mutual_conflicts_is_removed() {
        let mut modules = vec![module("left", &[], &["right"]), module("right", &[], &["left"])];
        let removed = resolve_constraints(&mut modules);
        assert_eq!(names(&modules), ["right"]);
        assert!(matches!(&removed[0], ModuleError::ConflictDetected { name, .. } if name == "left"));
    }

    #[test]
    fn conflict_removal_can_break_dependents() {
        let mut modules = vec![
            module("base", &[], &["other"]),
            module("other", &[], &[]),
            module("addon", &["base"], &[]),
        ];
        let removed = resolve_constraints(&mut modules);
        assert_eq!(names(&modules), ["other"]);
        assert_eq!(removed.len(), 2);
    }

    #[test]
    fn satisfied_set_is_unchanged() {
        let mut modules = vec![
            module("command", &[], &[]),
            module("tera-game-state", &[], &[]),
            module("auto-loot", &["tera-game-state", "command"], &["vacuum"]),
        ];
        assert!(resolve_constraints(&mut modules).is_empty());
        assert_eq!(modules.len(), 3);
    }
}
