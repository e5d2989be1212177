//! Process-wide adapter registry, built once at startup.

use crate::ResourceAdapter;
use reaper_core::{ReaperError, ReaperResult};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Holds every registered [`ResourceAdapter`], keyed by kind identifier.
///
/// Immutable after startup: build it fully, then share it behind an `Arc`.
/// Iteration order is deterministic (sorted by kind).
#[derive(Default)]
pub struct Registry {
    adapters: BTreeMap<&'static str, Arc<dyn ResourceAdapter>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter. Duplicate kinds are a startup error.
    pub fn register(&mut self, adapter: Arc<dyn ResourceAdapter>) -> ReaperResult<()> {
        let kind = adapter.kind();
        if self.adapters.contains_key(kind) {
            return Err(ReaperError::Config(format!(
                "duplicate adapter registration for kind '{kind}'"
            )));
        }
        self.adapters.insert(kind, adapter);
        Ok(())
    }

    pub fn get(&self, kind: &str) -> Option<&Arc<dyn ResourceAdapter>> {
        self.adapters.get(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.adapters.keys().copied()
    }

    pub fn adapters(&self) -> impl Iterator<Item = &Arc<dyn ResourceAdapter>> {
        self.adapters.values()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

// Trait objects have no derivable Debug; report the registered kinds instead.
impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("kinds", &self.adapters.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reaper_core::{Outcome, ResourceCandidate, Scope};

    struct Dummy(&'static str);

    #[async_trait]
    impl ResourceAdapter for Dummy {
        fn kind(&self) -> &'static str {
            self.0
        }
        async fn discover(&self, _scope: &Scope) -> reaper_core::ReaperResult<Vec<ResourceCandidate>> {
            Ok(vec![])
        }
        async fn quarantine(&self, _candidate: &ResourceCandidate) -> Outcome {
            Outcome::Success
        }
        async fn delete(&self, _candidate: &ResourceCandidate) -> Outcome {
            Outcome::Success
        }
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = Registry::new();
        registry.register(Arc::new(Dummy("ec2-instance"))).unwrap();
        registry.register(Arc::new(Dummy("ebs-volume"))).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.get("ec2-instance").is_some());
        assert!(registry.get("vpc").is_none());
        // Sorted iteration.
        let kinds: Vec<_> = registry.kinds().collect();
        assert_eq!(kinds, vec!["ebs-volume", "ec2-instance"]);
    }

    #[test]
    fn debug_output_names_kinds() {
        let mut registry = Registry::new();
        registry.register(Arc::new(Dummy("vpc"))).unwrap();
        assert!(format!("{registry:?}").contains("vpc"));
    }

    #[test]
    fn duplicate_kind_is_an_error() {
        let mut registry = Registry::new();
        registry.register(Arc::new(Dummy("ec2-instance"))).unwrap();
        let err = registry.register(Arc::new(Dummy("ec2-instance"))).unwrap_err();
        assert!(err.to_string().contains("ec2-instance"));
    }
}
