use std::sync::Arc;

use crate::filters::{ConfigurationError, FilterMatch, MatchError, PointcutFilter};
use crate::index::ClassNameIndex;
use crate::services::MetadataProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeKind {
    Interface,
    Class,
}

/// Matches classes by type relationship: implementors of an interface, or
/// a class together with its subclasses. Built from `within(...)`.
pub struct ClassTypeFilter {
    type_name: String,
    kind: TypeKind,
    metadata: Arc<dyn MetadataProvider>,
}

impl ClassTypeFilter {
    /// The name must resolve to a known interface or class; anything else
    /// is a configuration error at construction time.
    pub fn new(
        type_name: &str,
        metadata: Arc<dyn MetadataProvider>,
    ) -> Result<Self, ConfigurationError> {
        let kind = if metadata.is_interface(type_name) {
            TypeKind::Interface
        } else if metadata.is_class(type_name) {
            TypeKind::Class
        } else {
            return Err(ConfigurationError::UnknownType {
                name: type_name.to_owned(),
            });
        };
        Ok(ClassTypeFilter {
            type_name: type_name.to_owned(),
            kind,
            metadata,
        })
    }

    fn candidate_class_names(&self) -> Vec<String> {
        match self.kind {
            TypeKind::Interface => self.metadata.implementation_class_names(&self.type_name),
            TypeKind::Class => {
                let mut names = self.metadata.sub_class_names(&self.type_name);
                names.push(self.type_name.clone());
                names
            }
        }
    }
}

impl PointcutFilter for ClassTypeFilter {
    fn matches(
        &self,
        class_name: &str,
        _method_name: &str,
        _method_declaring_class_name: &str,
        _query_id: u64,
    ) -> Result<FilterMatch, MatchError> {
        let matched = match self.kind {
            TypeKind::Interface => self
                .metadata
                .implementation_class_names(&self.type_name)
                .iter()
                .any(|name| name == class_name),
            TypeKind::Class => {
                class_name == self.type_name
                    || self
                        .metadata
                        .sub_class_names(&self.type_name)
                        .iter()
                        .any(|name| name == class_name)
            }
        };
        Ok(FilterMatch::new(matched))
    }

    fn reduce_target_class_names(&self, index: &ClassNameIndex) -> ClassNameIndex {
        index.intersect(&ClassNameIndex::from_names(self.candidate_class_names()))
    }
}
