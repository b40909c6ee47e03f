use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock};

use crate::filters::{FilterMatch, MatchError, PointcutFilter};
use crate::index::ClassNameIndex;
use crate::services::PointcutRegistry;

/// Delegates to a named pointcut declared on an aspect class, written as
/// `Aspect\Class->pointcutMethod` inside an expression.
///
/// The target may not be registered yet while the referencing expression
/// is parsed, so resolution is lazy: retried on every call until it
/// succeeds, then memoized for the lifetime of this filter.
///
/// Circular references are possible: the target can, directly or through
/// further references, delegate back here. Each `matches` call records its
/// `query_id` while delegating; seeing the same id again means the query
/// has looped back and the match fails with
/// [`MatchError::CircularReference`].
pub struct PointcutReferenceFilter {
    aspect_class_name: String,
    pointcut_method_name: String,
    registry: Arc<dyn PointcutRegistry>,
    resolved: RwLock<Option<Arc<dyn PointcutFilter>>>,
    active_queries: Mutex<HashSet<u64>>,
}

impl PointcutReferenceFilter {
    #[must_use]
    pub fn new(
        aspect_class_name: &str,
        pointcut_method_name: &str,
        registry: Arc<dyn PointcutRegistry>,
    ) -> Self {
        PointcutReferenceFilter {
            aspect_class_name: aspect_class_name.to_owned(),
            pointcut_method_name: pointcut_method_name.to_owned(),
            registry,
            resolved: RwLock::new(None),
            active_queries: Mutex::new(HashSet::new()),
        }
    }

    fn resolve(&self) -> Option<Arc<dyn PointcutFilter>> {
        if let Some(filter) = self.resolved.read().expect("lock poisoned").as_ref() {
            return Some(filter.clone());
        }
        let filter = self
            .registry
            .find_pointcut(&self.aspect_class_name, &self.pointcut_method_name)?;
        *self.resolved.write().expect("lock poisoned") = Some(filter.clone());
        Some(filter)
    }
}

impl PointcutFilter for PointcutReferenceFilter {
    /// Fails with [`MatchError::UnknownPointcut`] when the reference still
    /// cannot be resolved at matching time, and with
    /// [`MatchError::CircularReference`] when the same query re-enters
    /// this filter through a reference cycle.
    fn matches(
        &self,
        class_name: &str,
        method_name: &str,
        method_declaring_class_name: &str,
        query_id: u64,
    ) -> Result<FilterMatch, MatchError> {
        let filter = self
            .resolve()
            .ok_or_else(|| MatchError::UnknownPointcut {
                aspect_class_name: self.aspect_class_name.clone(),
                pointcut_method_name: self.pointcut_method_name.clone(),
            })?;

        if !self.active_queries.lock().expect("lock poisoned").insert(query_id) {
            return Err(MatchError::CircularReference {
                aspect_class_name: self.aspect_class_name.clone(),
                pointcut_method_name: self.pointcut_method_name.clone(),
            });
        }
        let result =
            filter.matches(class_name, method_name, method_declaring_class_name, query_id);
        self.active_queries.lock().expect("lock poisoned").remove(&query_id);
        result
    }

    fn has_runtime_evaluations(&self) -> bool {
        self.resolve()
            .is_some_and(|filter| filter.has_runtime_evaluations())
    }

    /// An unresolvable reference cannot narrow anything yet and returns
    /// the index unchanged.
    fn reduce_target_class_names(&self, index: &ClassNameIndex) -> ClassNameIndex {
        match self.resolve() {
            Some(filter) => filter.reduce_target_class_names(index),
            None => index.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::ClassNameFilter;
    use crate::services::StaticPointcutRegistry;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRegistry {
        inner: StaticPointcutRegistry,
        lookups: AtomicUsize,
    }

    impl PointcutRegistry for CountingRegistry {
        fn find_pointcut(
            &self,
            aspect_class_name: &str,
            pointcut_method_name: &str,
        ) -> Option<Arc<dyn PointcutFilter>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.find_pointcut(aspect_class_name, pointcut_method_name)
        }
    }

    fn registry_with_target() -> Arc<CountingRegistry> {
        let target: Arc<dyn PointcutFilter> = Arc::new(ClassNameFilter::new("Acme\\Cart").unwrap());
        Arc::new(CountingRegistry {
            inner: StaticPointcutRegistry::new().with("Acme\\Aspect", "carts", target),
            lookups: AtomicUsize::new(0),
        })
    }

    #[test]
    fn delegates_to_the_resolved_pointcut() {
        let filter =
            PointcutReferenceFilter::new("Acme\\Aspect", "carts", registry_with_target());
        assert!(filter.matches("Acme\\Cart", "m", "Acme\\Cart", 1).unwrap().matched);
        assert!(!filter.matches("Other", "m", "Other", 1).unwrap().matched);
    }

    #[test]
    fn resolution_is_memoized_after_first_success() {
        let registry = registry_with_target();
        let filter = PointcutReferenceFilter::new("Acme\\Aspect", "carts", registry.clone());
        for _ in 0..3 {
            filter.matches("Acme\\Cart", "m", "Acme\\Cart", 1).unwrap();
        }
        assert_eq!(registry.lookups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unresolved_reference_errors_on_matches_and_retries() {
        let registry = Arc::new(CountingRegistry {
            inner: StaticPointcutRegistry::new(),
            lookups: AtomicUsize::new(0),
        });
        let filter = PointcutReferenceFilter::new("Acme\\Aspect", "nope", registry.clone());
        assert!(matches!(
            filter.matches("Acme\\Cart", "m", "Acme\\Cart", 1),
            Err(MatchError::UnknownPointcut { .. })
        ));
        assert!(matches!(
            filter.matches("Acme\\Cart", "m", "Acme\\Cart", 2),
            Err(MatchError::UnknownPointcut { .. })
        ));
        // Every failed call retried the lookup
        assert_eq!(registry.lookups.load(Ordering::SeqCst), 2);
    }

    #[derive(Default)]
    struct MutableRegistry {
        targets: RwLock<std::collections::HashMap<String, Arc<dyn PointcutFilter>>>,
    }

    impl MutableRegistry {
        fn register(&self, aspect: &str, method: &str, filter: Arc<dyn PointcutFilter>) {
            self.targets
                .write()
                .unwrap()
                .insert(format!("{aspect}->{method}"), filter);
        }
    }

    impl PointcutRegistry for MutableRegistry {
        fn find_pointcut(
            &self,
            aspect_class_name: &str,
            pointcut_method_name: &str,
        ) -> Option<Arc<dyn PointcutFilter>> {
            self.targets
                .read()
                .unwrap()
                .get(&format!("{aspect_class_name}->{pointcut_method_name}"))
                .cloned()
        }
    }

    #[test]
    fn self_referencing_pointcut_fails_instead_of_recursing() {
        let registry = Arc::new(MutableRegistry::default());
        let filter = Arc::new(PointcutReferenceFilter::new(
            "Acme\\Aspect",
            "itself",
            registry.clone(),
        ));
        registry.register("Acme\\Aspect", "itself", filter.clone());

        assert!(matches!(
            filter.matches("Any\\Class", "m", "Any\\Class", 42),
            Err(MatchError::CircularReference { .. })
        ));
        // The in-flight bookkeeping is cleaned up, so a later query gets
        // the same verdict rather than a poisoned state
        assert!(matches!(
            filter.matches("Any\\Class", "m", "Any\\Class", 43),
            Err(MatchError::CircularReference { .. })
        ));
    }

    #[test]
    fn mutual_reference_cycle_is_detected() {
        let registry = Arc::new(MutableRegistry::default());
        let first = Arc::new(PointcutReferenceFilter::new(
            "Acme\\Aspect",
            "second",
            registry.clone(),
        ));
        let second = Arc::new(PointcutReferenceFilter::new(
            "Acme\\Aspect",
            "first",
            registry.clone(),
        ));
        registry.register("Acme\\Aspect", "first", first.clone());
        registry.register("Acme\\Aspect", "second", second.clone());

        assert!(matches!(
            first.matches("Any\\Class", "m", "Any\\Class", 7),
            Err(MatchError::CircularReference { .. })
        ));
    }

    #[test]
    fn unresolved_reference_degrades_gracefully() {
        let filter = PointcutReferenceFilter::new(
            "Acme\\Aspect",
            "nope",
            Arc::new(StaticPointcutRegistry::new()),
        );
        assert!(!filter.has_runtime_evaluations());
        let index = ClassNameIndex::from_names(["A", "B"]);
        assert_eq!(filter.reduce_target_class_names(&index), index);
    }
}
