//! Group Registry
//!
//! Name -> [`Group`] lookup. The process-wide registry backs the free
//! functions [`new_group`] and [`get_group`]; tests and embedders that want
//! isolation create their own [`Registry`].

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::{info, warn};

use super::{Getter, Group, GroupConfig};

static GLOBAL: Lazy<Arc<Registry>> = Lazy::new(|| Arc::new(Registry::new()));

/// Thread-safe set of named groups
#[derive(Default)]
pub struct Registry {
    groups: RwLock<HashMap<String, Arc<Group>>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry
    pub fn global() -> Arc<Registry> {
        Arc::clone(&GLOBAL)
    }

    /// Create and register a group with default settings and the given
    /// cache budget
    pub fn new_group<G>(&self, name: impl Into<String>, cache_bytes: usize, getter: G) -> Arc<Group>
    where
        G: Getter + 'static,
    {
        let config = GroupConfig {
            cache_bytes,
            ..Default::default()
        };
        self.new_group_with_config(name, config, getter)
    }

    /// Create and register a group. A group already registered under the
    /// same name is replaced.
    pub fn new_group_with_config<G>(
        &self,
        name: impl Into<String>,
        config: GroupConfig,
        getter: G,
    ) -> Arc<Group>
    where
        G: Getter + 'static,
    {
        let name = name.into();
        let cache_bytes = config.cache_bytes;
        let group = Arc::new(Group::new(name.clone(), config, Arc::new(getter)));

        let replaced = self
            .groups
            .write()
            .insert(name.clone(), Arc::clone(&group))
            .is_some();
        if replaced {
            warn!(group = %name, "replaced existing group");
        }
        info!(group = %name, cache_bytes, "registered group");

        group
    }

    /// Look up a group by name
    pub fn get_group(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.read().get(name).cloned()
    }

    /// Registered group names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Registered groups, sorted by name
    pub fn groups(&self) -> Vec<Arc<Group>> {
        let mut groups: Vec<Arc<Group>> = self.groups.read().values().cloned().collect();
        groups.sort_by(|a, b| a.name().cmp(b.name()));
        groups
    }

    pub fn len(&self) -> usize {
        self.groups.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.read().is_empty()
    }

    /// Forget every group
    pub fn clear(&self) {
        self.groups.write().clear();
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("groups", &self.names())
            .finish()
    }
}

/// Create a group in the process-wide registry
pub fn new_group<G>(name: impl Into<String>, cache_bytes: usize, getter: G) -> Arc<Group>
where
    G: Getter + 'static,
{
    Registry::global().new_group(name, cache_bytes, getter)
}

/// Look up a group in the process-wide registry
pub fn get_group(name: &str) -> Option<Arc<Group>> {
    Registry::global().get_group(name)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn echo(key: String) -> impl std::future::Future<Output = crate::Result<Vec<u8>>> {
        async move { Ok(key.into_bytes()) }
    }

    #[test]
    fn test_get_group() {
        let registry = Registry::new();
        let group = registry.new_group("scores", 2 << 10, echo);

        let found = registry.get_group("scores").unwrap();
        assert!(Arc::ptr_eq(&group, &found));
        assert_eq!(found.name(), "scores");
        assert!(registry.get_group("scores111").is_none());
    }

    #[test]
    fn test_duplicate_name_replaces() {
        let registry = Registry::new();
        let first = registry.new_group("dup", 0, echo);
        let second = registry.new_group("dup", 0, |_key: String| async {
            Err::<Vec<u8>, _>(Error::backend("unused"))
        });

        assert_eq!(registry.len(), 1);
        let found = registry.get_group("dup").unwrap();
        assert!(Arc::ptr_eq(&found, &second));
        assert!(!Arc::ptr_eq(&found, &first));
    }

    #[test]
    fn test_names_sorted_and_clear() {
        let registry = Registry::new();
        registry.new_group("b", 0, echo);
        registry.new_group("a", 0, echo);
        assert_eq!(registry.names(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(registry.groups()[0].name(), "a");

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_global_registry() {
        let group = new_group("registry-test-global", 0, echo);
        let found = get_group("registry-test-global").unwrap();
        assert!(Arc::ptr_eq(&group, &found));
    }
}
