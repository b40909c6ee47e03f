use std::collections::BTreeMap;
use std::sync::Arc;

use crate::filters::class_annotated_with::annotation_satisfies_constraints;
use crate::filters::{FilterMatch, MatchError, PointcutFilter};
use crate::index::ClassNameIndex;
use crate::runtime::condition::ArgumentConstraint;
use crate::services::MetadataProvider;

/// Matches methods carrying a given annotation type, optionally
/// constraining the annotation's property values. The annotation is read
/// off the method's declaring class.
pub struct MethodAnnotatedWithFilter {
    annotation_type: String,
    property_constraints: BTreeMap<String, ArgumentConstraint>,
    metadata: Arc<dyn MetadataProvider>,
}

impl MethodAnnotatedWithFilter {
    #[must_use]
    pub fn new(
        annotation_type: &str,
        property_constraints: BTreeMap<String, ArgumentConstraint>,
        metadata: Arc<dyn MetadataProvider>,
    ) -> Self {
        MethodAnnotatedWithFilter {
            annotation_type: annotation_type.to_owned(),
            property_constraints,
            metadata,
        }
    }
}

impl PointcutFilter for MethodAnnotatedWithFilter {
    fn matches(
        &self,
        _class_name: &str,
        method_name: &str,
        method_declaring_class_name: &str,
        _query_id: u64,
    ) -> Result<FilterMatch, MatchError> {
        let annotations = match self.metadata.method_annotations(
            method_declaring_class_name,
            method_name,
            &self.annotation_type,
        ) {
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
            self.metadata
                .classes_containing_methods_annotated_with(&self.annotation_type),
        ))
    }
}
