//! Filter primitives and their composition.
//!
//! Every pointcut designator parses into a type implementing
//! [`PointcutFilter`]; a whole expression becomes a [`FilterComposite`]
//! combining child filters with `&&`, `&&!`, `||` and `||!`.

mod class_annotated_with;
mod class_name;
mod class_type;
mod composite;
mod method_annotated_with;
mod method_name;
mod reference;
mod setting;

pub use class_annotated_with::ClassAnnotatedWithFilter;
pub use class_name::ClassNameFilter;
pub use class_type::ClassTypeFilter;
pub use composite::FilterComposite;
pub use method_annotated_with::MethodAnnotatedWithFilter;
pub use method_name::MethodNameFilter;
pub use reference::PointcutReferenceFilter;
pub use setting::SettingFilter;

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use thiserror::Error;

use crate::index::ClassNameIndex;
use crate::runtime::condition::ConditionGroup;

/// Boolean connective between two adjacent terms of a pointcut expression.
///
/// `!` folds into the preceding connective, so `a && !b` carries `AndNot`
/// on the second term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PointcutOperator {
    And,
    AndNot,
    Or,
    OrNot,
}

impl PointcutOperator {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PointcutOperator::And => "&&",
            PointcutOperator::AndNot => "&&!",
            PointcutOperator::Or => "||",
            PointcutOperator::OrNot => "||!",
        }
    }

    /// Whether the term this operator introduces is negated.
    #[must_use]
    pub fn is_negated(self) -> bool {
        matches!(self, PointcutOperator::AndNot | PointcutOperator::OrNot)
    }

    /// The connective with negation stripped.
    #[must_use]
    pub fn base(self) -> PointcutOperator {
        match self {
            PointcutOperator::And | PointcutOperator::AndNot => PointcutOperator::And,
            PointcutOperator::Or | PointcutOperator::OrNot => PointcutOperator::Or,
        }
    }
}

impl fmt::Display for PointcutOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visibility restriction of a `method(...)` designator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodVisibility {
    Public,
    Protected,
}

impl MethodVisibility {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MethodVisibility::Public => "public",
            MethodVisibility::Protected => "protected",
        }
    }
}

impl FromStr for MethodVisibility {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(MethodVisibility::Public),
            "protected" => Ok(MethodVisibility::Protected),
            other => Err(ConfigurationError::InvalidVisibility {
                token: other.to_owned(),
            }),
        }
    }
}

impl fmt::Display for MethodVisibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single `matches` call: the static verdict plus the runtime
/// conditions this filter wants re-checked per invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterMatch {
    pub matched: bool,
    pub runtime: ConditionGroup,
}

impl FilterMatch {
    /// A plain verdict with no runtime conditions attached.
    #[must_use]
    pub fn new(matched: bool) -> Self {
        FilterMatch {
            matched,
            runtime: ConditionGroup::default(),
        }
    }

    /// A verdict carrying conditions to defer to invocation time.
    #[must_use]
    pub fn with_runtime(matched: bool, runtime: ConditionGroup) -> Self {
        FilterMatch { matched, runtime }
    }
}

/// A filter was built from settings or metadata that cannot support it.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("invalid pattern \"{pattern}\": {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("\"{name}\" is neither a known class nor a known interface")]
    UnknownType { name: String },
    #[error("\"{token}\" is not a valid method visibility modifier")]
    InvalidVisibility { token: String },
    #[error("the setting \"{path}\" does not exist")]
    UnresolvableSetting { path: String },
    #[error("the setting comparison value {raw} must be a quoted string")]
    MalformedSettingLiteral { raw: String },
}

/// Matching failed in a way that cannot be interpreted as "no match".
#[derive(Debug, Error)]
pub enum MatchError {
    #[error(
        "the pointcut \"{aspect_class_name}->{pointcut_method_name}\" referenced in a pointcut \
         expression could not be resolved"
    )]
    UnknownPointcut {
        aspect_class_name: String,
        pointcut_method_name: String,
    },
    #[error(
        "circular reference detected while matching the pointcut \
         \"{aspect_class_name}->{pointcut_method_name}\""
    )]
    CircularReference {
        aspect_class_name: String,
        pointcut_method_name: String,
    },
}

/// A single pointcut filter: answers whether a class/method pair is a
/// candidate join point, and helps narrow the candidate class set up front.
pub trait PointcutFilter: Send + Sync {
    /// Decides whether the given method could be advised by this filter.
    ///
    /// `query_id` identifies one matching query across a whole filter tree,
    /// so sibling filters can correlate their per-query bookkeeping.
    fn matches(
        &self,
        class_name: &str,
        method_name: &str,
        method_declaring_class_name: &str,
        query_id: u64,
    ) -> Result<FilterMatch, MatchError>;

    /// Whether this filter can contribute conditions that must be
    /// re-evaluated on every invocation.
    fn has_runtime_evaluations(&self) -> bool {
        false
    }

    /// Narrows a candidate class-name index to the classes this filter
    /// could possibly match. The result is always a subset of `index`
    /// (the identity fallback keeps filters that cannot narrow safe).
    fn reduce_target_class_names(&self, index: &ClassNameIndex) -> ClassNameIndex {
        index.clone()
    }
}

// ---- pattern helpers ----

const REGEX_META: &[char] = &[
    '.', '*', '+', '?', '[', ']', '(', ')', '{', '}', '|', '^', '$',
];

fn is_meta(c: char) -> bool {
    REGEX_META.contains(&c)
}

/// Rewrites a class/method pattern so that a backslash followed by a regex
/// metacharacter stays an escape while any other backslash is taken
/// literally. Namespace separators therefore need no double escaping.
fn normalize_pattern(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(next) if is_meta(next) || next == '\\' => {
                out.push('\\');
                out.push(next);
            }
            Some(next) => {
                out.push_str("\\\\");
                out.push(next);
            }
            None => out.push_str("\\\\"),
        }
    }
    out
}

/// Compiles a pattern anchored at both ends, so `Foo` never matches
/// `FooBar`.
pub(crate) fn compile_anchored(pattern: &str) -> Result<Regex, ConfigurationError> {
    Regex::new(&format!("^(?:{})$", normalize_pattern(pattern))).map_err(|source| {
        ConfigurationError::InvalidPattern {
            pattern: pattern.to_owned(),
            source,
        }
    })
}

/// The longest literal prefix of a pattern, used for index range scans.
/// Stops at the first unescaped metacharacter; an empty result means the
/// pattern cannot narrow anything.
pub(crate) fn literal_prefix(pattern: &str) -> String {
    let mut prefix = String::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) if is_meta(next) || next == '\\' => prefix.push(next),
                Some(next) => {
                    prefix.push('\\');
                    prefix.push(next);
                }
                None => break,
            }
        } else if is_meta(c) {
            break;
        } else {
            prefix.push(c);
        }
    }
    prefix
}
