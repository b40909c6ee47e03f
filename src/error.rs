use thiserror::Error;

use crate::filters::{ConfigurationError, MatchError};
use crate::parse::ParseError;
use crate::runtime::EvaluationError;

/// Unified error type covering expression parsing, filter configuration,
/// matching, and runtime evaluation.
///
/// Returned by the outer entry points like
/// [`ExpressionParser::parse()`](crate::ExpressionParser::parse); the
/// narrower error types stay available on the individual modules.
#[derive(Debug, Error)]
pub enum PointcutError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}
