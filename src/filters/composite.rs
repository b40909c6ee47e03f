use std::fmt;
use std::sync::Arc;

use crate::filters::{FilterMatch, MatchError, PointcutFilter, PointcutOperator};
use crate::index::ClassNameIndex;
use crate::runtime::condition::ConditionGroup;

/// Combines child filters with boolean connectives and accumulates their
/// runtime-evaluation contributions, bucketed by the operator that joined
/// each contributor.
///
/// As long as only `&&`/`&&!` filters have been added, `matches` may
/// return on the first decisive failure. The first `||`/`||!` filter
/// permanently disables that early return: every child must then be
/// evaluated on every call so that each one's runtime conditions are
/// collected.
pub struct FilterComposite {
    filters: Vec<(PointcutOperator, Arc<dyn PointcutFilter>)>,
    early_return: bool,
    global_runtime_evaluations: ConditionGroup,
}

impl Default for FilterComposite {
    fn default() -> Self {
        Self::new()
    }
}

// Child filters are trait objects, so only their connectives are shown
impl fmt::Debug for FilterComposite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let connectives: Vec<PointcutOperator> =
            self.filters.iter().map(|(operator, _)| *operator).collect();
        f.debug_struct("FilterComposite")
            .field("filters", &connectives)
            .field("early_return", &self.early_return)
            .field("global_runtime_evaluations", &self.global_runtime_evaluations)
            .finish()
    }
}

impl FilterComposite {
    #[must_use]
    pub fn new() -> Self {
        FilterComposite {
            filters: Vec::new(),
            early_return: true,
            global_runtime_evaluations: ConditionGroup::default(),
        }
    }

    /// Appends a child filter under the given connective.
    pub fn add_filter(&mut self, operator: PointcutOperator, filter: Arc<dyn PointcutFilter>) {
        if operator.base() != PointcutOperator::And {
            self.early_return = false;
        }
        self.filters.push((operator, filter));
    }

    /// Replaces the global runtime-evaluations definition, as set by an
    /// `evaluate(...)` designator. A second call overwrites the first.
    pub fn set_global_runtime_evaluations(&mut self, definition: ConditionGroup) {
        self.global_runtime_evaluations = definition;
    }

    #[must_use]
    pub fn global_runtime_evaluations(&self) -> &ConditionGroup {
        &self.global_runtime_evaluations
    }

    /// The child filters with their connectives, in addition order.
    #[must_use]
    pub fn filters(&self) -> &[(PointcutOperator, Arc<dyn PointcutFilter>)] {
        &self.filters
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl PointcutFilter for FilterComposite {
    fn matches(
        &self,
        class_name: &str,
        method_name: &str,
        method_declaring_class_name: &str,
        query_id: u64,
    ) -> Result<FilterMatch, MatchError> {
        let mut accumulator = ConditionGroup::default();
        let mut matches = true;

        for (operator, filter) in &self.filters {
            let result = filter.matches(
                class_name,
                method_name,
                method_declaring_class_name,
                query_id,
            )?;
            let mut current = result.matched;

            if current && !result.runtime.is_empty() {
                accumulator
                    .subgroups
                    .entry(*operator)
                    .or_default()
                    .merge(&result.runtime);
                // A negated filter that only matched conditionally cannot
                // veto statically; the decision moves to runtime
                if operator.is_negated() {
                    current = false;
                }
            }

            match operator {
                PointcutOperator::And => {
                    if self.early_return && !current {
                        return Ok(FilterMatch::new(false));
                    }
                    matches = matches && current;
                }
                PointcutOperator::AndNot => {
                    if self.early_return && current {
                        return Ok(FilterMatch::new(false));
                    }
                    matches = matches && !current;
                }
                PointcutOperator::Or => {
                    matches = matches || current;
                }
                PointcutOperator::OrNot => {
                    matches = matches || !current;
                }
            }
        }

        let mut runtime = self.global_runtime_evaluations.clone();
        runtime.merge(&accumulator);
        Ok(FilterMatch::with_runtime(matches, runtime))
    }

    fn has_runtime_evaluations(&self) -> bool {
        !self.global_runtime_evaluations.is_empty()
            || self
                .filters
                .iter()
                .any(|(_, filter)| filter.has_runtime_evaluations())
    }

    /// `&&`-joined filters narrow the running result progressively;
    /// `||`-joined filters contribute their reduction of the original
    /// universe. Negation does not change the direction.
    fn reduce_target_class_names(&self, index: &ClassNameIndex) -> ClassNameIndex {
        let mut result = index.clone();
        for (operator, filter) in &self.filters {
            match operator.base() {
                PointcutOperator::And => {
                    let narrowed = filter.reduce_target_class_names(&result);
                    result.apply_intersect(&narrowed);
                }
                _ => {
                    let alternative = filter.reduce_target_class_names(index);
                    result.apply_union(&alternative);
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::condition::{ConditionOperand, RuntimeCondition, RuntimeOp};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted child filter recording how often it was invoked.
    struct RecordingFilter {
        result: bool,
        runtime: ConditionGroup,
        reduces_to: Option<Vec<String>>,
        invocations: AtomicUsize,
    }

    impl RecordingFilter {
        fn new(result: bool) -> Self {
            RecordingFilter {
                result,
                runtime: ConditionGroup::default(),
                reduces_to: None,
                invocations: AtomicUsize::new(0),
            }
        }

        fn with_runtime(result: bool, runtime: ConditionGroup) -> Self {
            RecordingFilter {
                result,
                runtime,
                reduces_to: None,
                invocations: AtomicUsize::new(0),
            }
        }

        fn reducing(result: bool, names: &[&str]) -> Self {
            RecordingFilter {
                result,
                runtime: ConditionGroup::default(),
                reduces_to: Some(names.iter().map(|n| (*n).to_owned()).collect()),
                invocations: AtomicUsize::new(0),
            }
        }

        fn invocations(&self) -> usize {
            self.invocations.load(Ordering::SeqCst)
        }
    }

    impl PointcutFilter for RecordingFilter {
        fn matches(
            &self,
            _class_name: &str,
            _method_name: &str,
            _method_declaring_class_name: &str,
            _query_id: u64,
        ) -> Result<FilterMatch, MatchError> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            Ok(FilterMatch::with_runtime(self.result, self.runtime.clone()))
        }

        fn has_runtime_evaluations(&self) -> bool {
            !self.runtime.is_empty()
        }

        fn reduce_target_class_names(&self, index: &ClassNameIndex) -> ClassNameIndex {
            match &self.reduces_to {
                Some(names) => {
                    index.intersect(&ClassNameIndex::from_names(names.iter().cloned()))
                }
                None => index.clone(),
            }
        }
    }

    fn run(composite: &FilterComposite) -> FilterMatch {
        composite.matches("Any\\Class", "anyMethod", "Any\\Class", 1).unwrap()
    }

    fn some_conditions() -> ConditionGroup {
        ConditionGroup::from_conditions(vec![RuntimeCondition {
            left: ConditionOperand::from_token("this.active"),
            operator: RuntimeOp::Eq,
            right: ConditionOperand::from_token("true"),
        }])
    }

    #[test]
    fn plain_boolean_combinations() {
        let cases = [
            (vec![(PointcutOperator::And, true), (PointcutOperator::And, true)], true),
            (vec![(PointcutOperator::And, true), (PointcutOperator::And, false)], false),
            (vec![(PointcutOperator::And, false), (PointcutOperator::OrNot, true)], false),
            (vec![(PointcutOperator::And, false), (PointcutOperator::Or, true)], true),
            (vec![(PointcutOperator::And, true), (PointcutOperator::AndNot, true)], false),
            (vec![(PointcutOperator::And, true), (PointcutOperator::AndNot, false)], true),
            (vec![(PointcutOperator::And, false), (PointcutOperator::OrNot, false)], true),
        ];
        for (setup, expected) in cases {
            let mut composite = FilterComposite::new();
            for (operator, result) in &setup {
                composite.add_filter(*operator, Arc::new(RecordingFilter::new(*result)));
            }
            assert_eq!(run(&composite).matched, expected, "case {setup:?}");
        }
    }

    #[test]
    fn and_failure_short_circuits_while_pure_and() {
        let spy = Arc::new(RecordingFilter::new(true));
        let mut composite = FilterComposite::new();
        composite.add_filter(PointcutOperator::And, Arc::new(RecordingFilter::new(false)));
        composite.add_filter(PointcutOperator::And, spy.clone());

        assert!(!run(&composite).matched);
        assert_eq!(spy.invocations(), 0);
    }

    #[test]
    fn and_not_success_short_circuits_while_pure_and() {
        let spy = Arc::new(RecordingFilter::new(true));
        let mut composite = FilterComposite::new();
        composite.add_filter(PointcutOperator::AndNot, Arc::new(RecordingFilter::new(true)));
        composite.add_filter(PointcutOperator::And, spy.clone());

        assert!(!run(&composite).matched);
        assert_eq!(spy.invocations(), 0);
    }

    #[test]
    fn any_or_filter_disables_early_return_permanently() {
        let late_spy = Arc::new(RecordingFilter::new(true));
        let mut composite = FilterComposite::new();
        composite.add_filter(PointcutOperator::And, Arc::new(RecordingFilter::new(false)));
        composite.add_filter(PointcutOperator::Or, Arc::new(RecordingFilter::new(true)));
        // Added after the ||, but the flag never comes back
        composite.add_filter(PointcutOperator::And, Arc::new(RecordingFilter::new(false)));
        composite.add_filter(PointcutOperator::Or, late_spy.clone());

        assert!(run(&composite).matched);
        assert_eq!(late_spy.invocations(), 1);
    }

    #[test]
    fn or_true_never_skips_later_filters() {
        let spy = Arc::new(RecordingFilter::new(false));
        let mut composite = FilterComposite::new();
        composite.add_filter(PointcutOperator::Or, Arc::new(RecordingFilter::new(true)));
        composite.add_filter(PointcutOperator::Or, spy.clone());

        assert!(run(&composite).matched);
        assert_eq!(spy.invocations(), 1);
    }

    #[test]
    fn runtime_contributions_bucket_by_operator() {
        let mut composite = FilterComposite::new();
        composite.add_filter(
            PointcutOperator::And,
            Arc::new(RecordingFilter::with_runtime(true, some_conditions())),
        );
        composite.add_filter(
            PointcutOperator::Or,
            Arc::new(RecordingFilter::with_runtime(true, some_conditions())),
        );

        let result = run(&composite);
        assert!(result.matched);
        assert_eq!(result.runtime.subgroups.len(), 2);
        assert!(result.runtime.subgroups.contains_key(&PointcutOperator::And));
        assert!(result.runtime.subgroups.contains_key(&PointcutOperator::Or));
    }

    #[test]
    fn non_matching_filter_contributes_no_runtime_conditions() {
        let mut composite = FilterComposite::new();
        composite.add_filter(
            PointcutOperator::Or,
            Arc::new(RecordingFilter::with_runtime(false, some_conditions())),
        );
        composite.add_filter(PointcutOperator::Or, Arc::new(RecordingFilter::new(true)));

        let result = run(&composite);
        assert!(result.matched);
        assert!(result.runtime.is_empty());
    }

    #[test]
    fn negated_filter_with_runtime_conditions_defers_its_veto() {
        // &&! over a conditionally-matching filter: the static answer stays
        // true, the veto becomes a runtime condition
        let mut composite = FilterComposite::new();
        composite.add_filter(PointcutOperator::And, Arc::new(RecordingFilter::new(true)));
        composite.add_filter(
            PointcutOperator::AndNot,
            Arc::new(RecordingFilter::with_runtime(true, some_conditions())),
        );

        let result = run(&composite);
        assert!(result.matched);
        assert!(result.runtime.subgroups.contains_key(&PointcutOperator::AndNot));
    }

    #[test]
    fn global_definition_merges_with_per_call_contributions() {
        let mut composite = FilterComposite::new();
        composite.set_global_runtime_evaluations(ConditionGroup::subgroup(
            PointcutOperator::And,
            some_conditions(),
        ));
        composite.add_filter(
            PointcutOperator::And,
            Arc::new(RecordingFilter::with_runtime(true, some_conditions())),
        );

        assert!(composite.has_runtime_evaluations());
        let result = run(&composite);
        assert!(result.matched);
        // Both the evaluate(...) conditions and the filter's contribution
        // land in the && bucket
        let bucket = &result.runtime.subgroups[&PointcutOperator::And];
        assert_eq!(bucket.evaluate_conditions.len(), 2);
    }

    #[test]
    fn has_runtime_evaluations_sees_children_and_global() {
        let mut composite = FilterComposite::new();
        composite.add_filter(PointcutOperator::And, Arc::new(RecordingFilter::new(true)));
        assert!(!composite.has_runtime_evaluations());

        composite.add_filter(
            PointcutOperator::And,
            Arc::new(RecordingFilter::with_runtime(true, some_conditions())),
        );
        assert!(composite.has_runtime_evaluations());

        let mut with_global = FilterComposite::new();
        with_global.set_global_runtime_evaluations(ConditionGroup::subgroup(
            PointcutOperator::And,
            some_conditions(),
        ));
        assert!(with_global.has_runtime_evaluations());
    }

    #[test]
    fn reduction_narrows_on_and_and_unions_from_universe_on_or() {
        let universe = ClassNameIndex::from_names(["x", "y", "z"]);

        // A && B: A keeps {x,y}, B (over {x,y}) keeps {x}
        let mut and_composite = FilterComposite::new();
        and_composite.add_filter(
            PointcutOperator::And,
            Arc::new(RecordingFilter::reducing(true, &["x", "y"])),
        );
        and_composite.add_filter(
            PointcutOperator::And,
            Arc::new(RecordingFilter::reducing(true, &["x"])),
        );
        assert_eq!(
            and_composite.reduce_target_class_names(&universe),
            ClassNameIndex::from_names(["x"])
        );

        // A || B: B reduces the original universe, not A's result
        let mut or_composite = FilterComposite::new();
        or_composite.add_filter(
            PointcutOperator::And,
            Arc::new(RecordingFilter::reducing(true, &["x"])),
        );
        or_composite.add_filter(
            PointcutOperator::Or,
            Arc::new(RecordingFilter::reducing(true, &["y"])),
        );
        assert_eq!(
            or_composite.reduce_target_class_names(&universe),
            ClassNameIndex::from_names(["x", "y"])
        );
    }

    #[test]
    fn match_errors_propagate() {
        struct FailingFilter;
        impl PointcutFilter for FailingFilter {
            fn matches(
                &self,
                _: &str,
                _: &str,
                _: &str,
                _: u64,
            ) -> Result<FilterMatch, MatchError> {
                Err(MatchError::UnknownPointcut {
                    aspect_class_name: "Acme\\Aspect".into(),
                    pointcut_method_name: "gone".into(),
                })
            }
        }

        let mut composite = FilterComposite::new();
        composite.add_filter(PointcutOperator::And, Arc::new(FailingFilter));
        assert!(run_err(&composite));

        fn run_err(composite: &FilterComposite) -> bool {
            composite
                .matches("Any", "any", "Any", 1)
                .is_err()
        }
    }

    #[test]
    fn debug_output_lists_connectives() {
        let mut composite = FilterComposite::new();
        composite.add_filter(PointcutOperator::And, Arc::new(RecordingFilter::new(true)));
        composite.add_filter(PointcutOperator::OrNot, Arc::new(RecordingFilter::new(false)));

        let rendered = format!("{composite:?}");
        assert!(rendered.contains("FilterComposite"));
        assert!(rendered.contains("And"));
        assert!(rendered.contains("OrNot"));
    }
}
