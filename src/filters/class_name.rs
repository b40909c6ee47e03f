use regex::Regex;

use crate::filters::{
    compile_anchored, literal_prefix, ConfigurationError, FilterMatch, MatchError, PointcutFilter,
};
use crate::index::ClassNameIndex;

/// Matches the fully qualified class name against an anchored pattern.
pub struct ClassNameFilter {
    pattern: Regex,
    prefix: String,
}

impl ClassNameFilter {
    /// Compiles the pattern; an uncompilable pattern is a configuration
    /// error at construction time, never at match time.
    pub fn new(class_pattern: &str) -> Result<Self, ConfigurationError> {
        Ok(ClassNameFilter {
            pattern: compile_anchored(class_pattern)?,
            prefix: literal_prefix(class_pattern),
        })
    }
}

impl PointcutFilter for ClassNameFilter {
    fn matches(
        &self,
        class_name: &str,
        _method_name: &str,
        _method_declaring_class_name: &str,
        _query_id: u64,
    ) -> Result<FilterMatch, MatchError> {
        Ok(FilterMatch::new(self.pattern.is_match(class_name)))
    }

    fn reduce_target_class_names(&self, index: &ClassNameIndex) -> ClassNameIndex {
        if self.prefix.is_empty() {
            index.clone()
        } else {
            index.filter_by_prefix(&self.prefix)
        }
    }
}
