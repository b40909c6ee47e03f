use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::warn;

use crate::filters::{FilterMatch, MatchError, PointcutFilter};
use crate::index::ClassNameIndex;
use crate::runtime::condition::ArgumentConstraint;
use crate::services::{Annotation, MetadataProvider};

/// Matches classes carrying a given annotation type, optionally
/// constraining the annotation's property values.
///
/// With a repeatable annotation only the first instance is checked
/// against the property constraints.
pub struct ClassAnnotatedWithFilter {
    annotation_type: String,
    property_constraints: BTreeMap<String, ArgumentConstraint>,
    metadata: Arc<dyn MetadataProvider>,
}

impl ClassAnnotatedWithFilter {
    #[must_use]
    pub fn new(
        annotation_type: &str,
        property_constraints: BTreeMap<String, ArgumentConstraint>,
        metadata: Arc<dyn MetadataProvider>,
    ) -> Self {
        ClassAnnotatedWithFilter {
            annotation_type: annotation_type.to_owned(),
            property_constraints,
            metadata,
        }
    }
}

/// Checks one annotation instance against accumulated property
/// constraints. A constraint against an unknown property or a
/// non-constant operand logs a warning and fails.
pub(crate) fn annotation_satisfies_constraints(
    annotation: &Annotation,
    constraints: &BTreeMap<String, ArgumentConstraint>,
    annotation_type: &str,
) -> bool {
    for (property, constraint) in constraints {
        let actual = match annotation.property(property) {
            Some(actual) => actual,
            None => {
                warn!(
                    annotation = annotation_type,
                    property, "property constraint references an unknown annotation property"
                );
                return false;
            }
        };
        for (operator, operand) in constraint.operators.iter().zip(&constraint.values) {
            let expected = match operand.to_literal() {
                Some(expected) => expected,
                None => {
                    warn!(
                        annotation = annotation_type,
                        property,
                        "property constraint value is not a constant and cannot be compared"
                    );
                    return false;
                }
            };
            if !operator.apply(actual, &expected) {
                return false;
            }
        }
    }
    true
}

impl PointcutFilter for ClassAnnotatedWithFilter {
    fn matches(
        &self,
        class_name: &str,
        _method_name: &str,
        _method_declaring_class_name: &str,
        _query_id: u64,
    ) -> Result<FilterMatch, MatchError> {
        let annotations = match self
            .metadata
            .class_annotations(class_name, &self.annotation_type)
        {
            Ok(annotations) => annotations,
            Err(_) => return Ok(FilterMatch::new(false)),
        };
        let Some(first) = annotations.first() else {
            return Ok(FilterMatch::new(false));
        };
        if self.property_constraints.is_empty() {
            return Ok(FilterMatch::new(true));
        }
        Ok(FilterMatch::new(annotation_satisfies_constraints(
            first,
            &self.property_constraints,
            &self.annotation_type,
        )))
    }

    fn reduce_target_class_names(&self, index: &ClassNameIndex) -> ClassNameIndex {
        index.intersect(&ClassNameIndex::from_names(
            self.metadata.class_names_by_annotation(&self.annotation_type),
        ))
    }
}
