//! Pointcut expression engine: parses join-point selection expressions
//! like `class(Acme\.Shop\..*) && method(.*->checkout())` into filter
//! composites that decide at compile time which classes and methods are
//! advised, and defers what cannot be decided statically to runtime
//! condition evaluation.

mod error;
mod index;
mod services;
mod value;

pub mod filters;
pub mod parse;
pub mod runtime;

pub use error::PointcutError;
pub use filters::{
    FilterComposite, FilterMatch, MatchError, MethodVisibility, PointcutFilter, PointcutOperator,
};
pub use index::ClassNameIndex;
pub use parse::ExpressionParser;
pub use runtime::{
    ConditionGroup, GlobalObjectResolver, JoinPoint, RuntimeExpr, RuntimeExpressionEvaluator,
};
pub use services::{
    Annotation, ConfigurationProvider, CustomFilterResolver, FilterServices, MetadataProvider,
    MetadataUnavailable, ParameterInfo, PointcutRegistry, StaticCustomFilters, StaticMetadata,
    StaticPointcutRegistry, StaticSettings,
};
pub use value::Value;
