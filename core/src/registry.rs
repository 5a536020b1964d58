use std::collections::{BTreeMap, BTreeSet};

use crate::error::{TaskError, TaskResult};
use crate::namespace::{NamespaceDescriptor, DEFAULT_OPERATION};
use crate::operation::OperationRef;

/// One invocable name as shown by `--list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetEntry {
    pub name: String,
    pub description: String,
    pub aliases: Vec<String>,
}

#[derive(Clone)]
struct Alias {
    target: String,
    operation: OperationRef,
}

/// Maps external target names to operations.
///
/// Names follow `namespace[:operation]` and match case-insensitively. A bare
/// namespace name stands for that namespace's default operation. Aliases
/// are short bare names bound to one concrete target.
#[derive(Default, Clone)]
pub struct TargetRegistry {
    namespaces: BTreeMap<String, NamespaceDescriptor>,
    aliases: BTreeMap<String, Alias>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects a namespace whose name is taken, or whose sub-operations
    /// repeat a name or use the reserved `default`.
    pub fn register(&mut self, descriptor: NamespaceDescriptor) -> TaskResult<()> {
        let key = descriptor.name().to_ascii_lowercase();
        if self.namespaces.contains_key(&key) {
            return Err(TaskError::DuplicateNamespace(key));
        }
        if self.aliases.contains_key(&key) {
            return Err(TaskError::DuplicateAlias {
                alias: key,
                existing: "a namespace of the same name".to_string(),
            });
        }

        let mut seen = BTreeSet::new();
        for sub in descriptor.operation_names() {
            if sub == DEFAULT_OPERATION || !seen.insert(sub) {
                return Err(TaskError::DuplicateOperation {
                    namespace: key,
                    operation: sub.to_string(),
                });
            }
        }

        self.namespaces.insert(key, descriptor);
        Ok(())
    }

    /// Binds the bare name `alias` to `target`, which must already resolve.
    pub fn alias(&mut self, alias: &str, target: &str) -> TaskResult<()> {
        let key = alias.trim().to_ascii_lowercase();
        if key.is_empty() || key.contains(':') {
            return Err(TaskError::Resolution {
                name: alias.to_string(),
                token: key,
            });
        }
        if self.namespaces.contains_key(&key) {
            return Err(TaskError::DuplicateAlias {
                alias: key,
                existing: "a namespace of the same name".to_string(),
            });
        }
        if let Some(existing) = self.aliases.get(&key) {
            return Err(TaskError::DuplicateAlias {
                existing: format!("the alias for `{}`", existing.target),
                alias: key,
            });
        }

        let operation = self.resolve_qualified(target)?;
        self.aliases.insert(
            key,
            Alias {
                target: canonical(target),
                operation,
            },
        );
        Ok(())
    }

    pub fn namespace(&self, name: &str) -> Option<&NamespaceDescriptor> {
        self.namespaces.get(&name.to_ascii_lowercase())
    }

    pub fn resolve(&self, name: &str) -> TaskResult<OperationRef> {
        let trimmed = name.trim();
        if !trimmed.contains(':') && self.namespace(trimmed).is_none() {
            if let Some(alias) = self.aliases.get(&trimmed.to_ascii_lowercase()) {
                return Ok(alias.operation.clone());
            }
        }
        self.resolve_qualified(name)
    }

    fn resolve_qualified(&self, name: &str) -> TaskResult<OperationRef> {
        let unresolved = |token: &str| TaskError::Resolution {
            name: name.to_string(),
            token: token.to_string(),
        };

        let trimmed = name.trim();
        let (ns, sub) = match trimmed.split_once(':') {
            Some((ns, sub)) => (ns, sub),
            None => (trimmed, DEFAULT_OPERATION),
        };

        if ns.is_empty() {
            return Err(unresolved(trimmed));
        }
        let descriptor = self.namespace(ns).ok_or_else(|| unresolved(ns))?;

        if sub.is_empty() || sub.contains(':') {
            return Err(unresolved(sub));
        }
        descriptor
            .operation(sub)
            .cloned()
            .ok_or_else(|| unresolved(sub))
    }

    /// Resolves every name before anything runs, so a typo in the last
    /// target fails the whole invocation up front.
    pub fn resolve_all<S: AsRef<str>>(&self, names: &[S]) -> TaskResult<Vec<(String, OperationRef)>> {
        names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.resolve(name).map(|op| (name.to_ascii_lowercase(), op))
            })
            .collect()
    }

    pub fn list(&self) -> Vec<TargetEntry> {
        let mut entries = Vec::new();

        for (name, descriptor) in &self.namespaces {
            entries.push(TargetEntry {
                aliases: self.aliases_of(name),
                name: name.clone(),
                description: describe(descriptor.default_operation(), descriptor.description()),
            });

            for (sub, op) in descriptor.operations() {
                let name = format!("{}:{}", name, sub);
                entries.push(TargetEntry {
                    aliases: self.aliases_of(&name),
                    name,
                    description: op.description().to_string(),
                });
            }
        }

        entries
    }

    fn aliases_of(&self, target: &str) -> Vec<String> {
        self.aliases
            .iter()
            .filter(|(_, alias)| alias.target == target)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.namespaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }
}

/// `Build:Default` and `build` name the same target.
fn canonical(target: &str) -> String {
    let target = target.trim().to_ascii_lowercase();
    match target.strip_suffix(":default") {
        Some(namespace) => namespace.to_string(),
        None => target,
    }
}

fn describe(op: &OperationRef, fallback: &str) -> String {
    if op.description().is_empty() {
        fallback.to_string()
    } else {
        op.description().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn descriptor(name: &str, subs: &[&str]) -> NamespaceDescriptor {
        let mut builder = NamespaceDescriptor::builder(name, &format!("{} operations", name))
            .default_op(&format!("Default {}", name), (), |_| async { Ok(()) });
        for sub in subs {
            builder = builder.op(sub, &format!("{} {}", name, sub), (), |_| async { Ok(()) });
        }
        builder.build()
    }

    fn registry() -> TargetRegistry {
        let mut registry = TargetRegistry::new();
        registry
            .register(descriptor("test", &["unit", "race"]))
            .unwrap();
        registry
            .register(descriptor("build", &["all", "linux", "clean"]))
            .unwrap();
        registry
    }

    #[test]
    fn test_default_and_explicit_default_are_identical() {
        let registry = registry();

        let bare = registry.resolve("build").unwrap();
        let explicit = registry.resolve("build:default").unwrap();
        let shouted = registry.resolve("BUILD").unwrap();

        assert!(Arc::ptr_eq(&bare, &explicit));
        assert!(Arc::ptr_eq(&bare, &shouted));
        assert_eq!(bare.name(), "build");
    }

    #[test]
    fn test_resolve_sub_operation_case_insensitive() {
        let registry = registry();
        let op = registry.resolve("Test:Race").unwrap();
        assert_eq!(op.name(), "test:race");
    }

    #[test]
    fn test_unknown_targets_name_the_token() {
        let registry = registry();

        let cases = [
            ("doesnotexist", "doesnotexist"),
            ("build:nope", "nope"),
            ("build:", ""),
            (":unit", ":unit"),
            ("", ""),
            ("build:all:extra", "all:extra"),
        ];

        for (name, expected) in cases {
            match registry.resolve(name) {
                Err(TaskError::Resolution { name: n, token }) => {
                    assert_eq!(n, name);
                    assert_eq!(token, expected, "resolving {:?}", name);
                }
                other => panic!("Expected Resolution for {:?}, got {:?}", name, other),
            }
        }
    }

    #[test]
    fn test_duplicate_namespace_rejected() {
        let mut registry = registry();
        let err = registry.register(descriptor("Build", &[])).unwrap_err();
        assert!(matches!(err, TaskError::DuplicateNamespace(ref name) if name == "build"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_list_is_sorted_and_stable() {
        let registry = registry();
        let names: Vec<String> = registry.list().into_iter().map(|e| e.name).collect();

        assert_eq!(
            names,
            vec![
                "build",
                "build:all",
                "build:linux",
                "build:clean",
                "test",
                "test:unit",
                "test:race",
            ]
        );
        assert_eq!(registry.list(), registry.list());
        assert_eq!(registry.list()[0].description, "Default build");
    }

    #[test]
    fn test_repeated_or_reserved_operation_names_rejected() {
        let mut registry = TargetRegistry::new();

        let err = registry
            .register(descriptor("deploy", &["all", "All"]))
            .unwrap_err();
        assert!(matches!(
            err,
            TaskError::DuplicateOperation { ref namespace, ref operation }
                if namespace == "deploy" && operation == "all"
        ));

        let err = registry
            .register(descriptor("deploy", &["default"]))
            .unwrap_err();
        assert!(matches!(err, TaskError::DuplicateOperation { ref operation, .. } if operation == "default"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_alias_resolves_to_target() {
        let mut registry = registry();
        registry.alias("b", "build").unwrap();
        registry.alias("Race", "test:race").unwrap();

        assert!(Arc::ptr_eq(
            &registry.resolve("B").unwrap(),
            &registry.resolve("build").unwrap()
        ));
        assert_eq!(registry.resolve("race").unwrap().name(), "test:race");

        let list = registry.list();
        let race = list.iter().find(|e| e.name == "test:race").unwrap();
        assert_eq!(race.aliases, vec!["race"]);
        assert_eq!(list[0].aliases, vec!["b"]);
        assert!(list.iter().all(|e| e.name != "race"));
    }

    #[test]
    fn test_alias_collisions_rejected() {
        let mut registry = registry();
        registry.alias("b", "build:default").unwrap();

        let err = registry.alias("B", "test").unwrap_err();
        assert!(matches!(err, TaskError::DuplicateAlias { ref alias, .. } if alias == "b"));
        assert!(err.to_string().contains("`build`"));

        let err = registry.alias("test", "build").unwrap_err();
        assert!(matches!(err, TaskError::DuplicateAlias { .. }));

        let err = registry.register(descriptor("b", &[])).unwrap_err();
        assert!(matches!(err, TaskError::DuplicateAlias { .. }));

        assert!(registry.alias("x", "build:nope").is_err());
        assert!(registry.alias("a:b", "build").is_err());
        assert!(registry.alias("y", "b").is_err());
        assert_eq!(registry.resolve("b").unwrap().name(), "build");
    }

    #[test]
    fn test_resolve_all_stops_before_running() {
        let registry = registry();

        let resolved = registry.resolve_all(&["build", "test:unit"][..]).unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[1].0, "test:unit");

        let err = registry.resolve_all(&["build", "tset"][..]).unwrap_err();
        assert!(matches!(err, TaskError::Resolution { ref token, .. } if token == "tset"));
    }
}
