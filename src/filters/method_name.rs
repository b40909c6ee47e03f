use std::collections::BTreeMap;
use std::sync::Arc;

use regex::Regex;
use tracing::warn;

use crate::filters::{
    compile_anchored, ConfigurationError, FilterMatch, MatchError, MethodVisibility,
    PointcutFilter,
};
use crate::runtime::condition::{ArgumentConstraint, ConditionGroup};
use crate::services::MetadataProvider;

/// Matches the method name against an anchored pattern, with optional
/// visibility and argument requirements.
///
/// Argument *value* constraints are never checked here; they are handed
/// back as runtime-evaluation obligations. Only the existence of each
/// referenced argument is verified, using the constraint key's first path
/// segment.
pub struct MethodNameFilter {
    pattern: Regex,
    visibility: Option<MethodVisibility>,
    argument_constraints: BTreeMap<String, ArgumentConstraint>,
    metadata: Arc<dyn MetadataProvider>,
}

impl MethodNameFilter {
    pub fn new(
        method_name_pattern: &str,
        visibility: Option<MethodVisibility>,
        argument_constraints: BTreeMap<String, ArgumentConstraint>,
        metadata: Arc<dyn MetadataProvider>,
    ) -> Result<Self, ConfigurationError> {
        Ok(MethodNameFilter {
            pattern: compile_anchored(method_name_pattern)?,
            visibility,
            argument_constraints,
            metadata,
        })
    }
}

impl PointcutFilter for MethodNameFilter {
    fn matches(
        &self,
        _class_name: &str,
        method_name: &str,
        method_declaring_class_name: &str,
        _query_id: u64,
    ) -> Result<FilterMatch, MatchError> {
        if !self.pattern.is_match(method_name) {
            return Ok(FilterMatch::new(false));
        }

        match self.visibility {
            Some(MethodVisibility::Public) => {
                let is_public = self
                    .metadata
                    .is_method_public(method_declaring_class_name, method_name)
                    .unwrap_or(false);
                if !is_public {
                    return Ok(FilterMatch::new(false));
                }
            }
            Some(MethodVisibility::Protected) => {
                let is_protected = self
                    .metadata
                    .is_method_protected(method_declaring_class_name, method_name)
                    .unwrap_or(false);
                if !is_protected {
                    return Ok(FilterMatch::new(false));
                }
            }
            None => {}
        }

        if self.argument_constraints.is_empty() {
            return Ok(FilterMatch::new(true));
        }

        let parameters = match self
            .metadata
            .method_parameters(method_declaring_class_name, method_name)
        {
            Ok(parameters) => parameters,
            Err(_) => return Ok(FilterMatch::new(false)),
        };
        for constraint_key in self.argument_constraints.keys() {
            let argument = constraint_key
                .split('.')
                .next()
                .unwrap_or(constraint_key.as_str());
            if !parameters.contains_key(argument) {
                warn!(
                    method = method_name,
                    class = method_declaring_class_name,
                    argument,
                    "argument constraint references an unknown method argument"
                );
                return Ok(FilterMatch::new(false));
            }
        }

        Ok(FilterMatch::with_runtime(
            true,
            ConditionGroup::from_argument_constraints(self.argument_constraints.clone()),
        ))
    }

    fn has_runtime_evaluations(&self) -> bool {
        !self.argument_constraints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::condition::{ConditionOperand, RuntimeOp};
    use crate::services::StaticMetadata;

    fn metadata() -> Arc<StaticMetadata> {
        Arc::new(
            StaticMetadata::new()
                .method("Acme\\Cart", "checkout", MethodVisibility::Public)
                .method_parameter("Acme\\Cart", "checkout", "amount")
                .method("Acme\\Cart", "recalculate", MethodVisibility::Protected),
        )
    }

    fn constraints(key: &str) -> BTreeMap<String, ArgumentConstraint> {
        let mut c = ArgumentConstraint::default();
        c.push(RuntimeOp::Gt, ConditionOperand::from_token("100"));
        [(key.to_owned(), c)].into()
    }

    fn matched(filter: &MethodNameFilter, method: &str) -> bool {
        filter
            .matches("Acme\\Cart", method, "Acme\\Cart", 1)
            .unwrap()
            .matched
    }

    #[test]
    fn name_pattern_is_anchored() {
        let filter =
            MethodNameFilter::new("check.*", None, BTreeMap::new(), metadata()).unwrap();
        assert!(matched(&filter, "checkout"));
        assert!(!matched(&filter, "recheckout"));
    }

    #[test]
    fn visibility_restriction() {
        let public = MethodNameFilter::new(
            ".*",
            Some(MethodVisibility::Public),
            BTreeMap::new(),
            metadata(),
        )
        .unwrap();
        assert!(matched(&public, "checkout"));
        assert!(!matched(&public, "recalculate"));

        let protected = MethodNameFilter::new(
            ".*",
            Some(MethodVisibility::Protected),
            BTreeMap::new(),
            metadata(),
        )
        .unwrap();
        assert!(matched(&protected, "recalculate"));
        assert!(!matched(&protected, "checkout"));
    }

    #[test]
    fn visibility_check_on_unknown_method_is_no_match() {
        let filter = MethodNameFilter::new(
            ".*",
            Some(MethodVisibility::Public),
            BTreeMap::new(),
            metadata(),
        )
        .unwrap();
        assert!(!matched(&filter, "unknownMethod"));
    }

    #[test]
    fn argument_constraints_defer_to_runtime() {
        let filter =
            MethodNameFilter::new("checkout", None, constraints("amount"), metadata()).unwrap();
        assert!(filter.has_runtime_evaluations());

        let result = filter.matches("Acme\\Cart", "checkout", "Acme\\Cart", 1).unwrap();
        assert!(result.matched);
        assert!(!result.runtime.is_empty());
        assert!(result.runtime.method_argument_constraints.contains_key("amount"));
    }

    #[test]
    fn dotted_constraint_key_checks_first_segment_only() {
        let filter = MethodNameFilter::new(
            "checkout",
            None,
            constraints("amount.currency"),
            metadata(),
        )
        .unwrap();
        assert!(matched(&filter, "checkout"));
    }

    #[test]
    fn unknown_argument_fails_the_match() {
        let filter =
            MethodNameFilter::new("checkout", None, constraints("nonexistent"), metadata())
                .unwrap();
        assert!(!matched(&filter, "checkout"));
    }

    #[test]
    fn without_constraints_no_metadata_is_consulted() {
        // A pure name pattern matches methods the provider knows nothing
        // about.
        let filter = MethodNameFilter::new(".*", None, BTreeMap::new(), metadata()).unwrap();
        assert!(matched(&filter, "someUnknownMethod"));
    }
}
