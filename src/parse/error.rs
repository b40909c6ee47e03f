use thiserror::Error;

/// Errors produced while parsing a pointcut expression.
///
/// Every variant carries the caller's source hint (where the expression
/// was defined), so a failing compile pass can point at the offending
/// declaration.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("syntax error: {detail} in \"{offending}\", defined in {source_hint}")]
    Syntax {
        detail: String,
        offending: String,
        source_hint: String,
    },

    #[error("unsupported pointcut designator \"{designator}\", defined in {source_hint}")]
    UnsupportedDesignator {
        designator: String,
        source_hint: String,
    },

    #[error("no custom filter is registered under the name \"{name}\", defined in {source_hint}")]
    UnknownCustomFilter { name: String, source_hint: String },

    #[error("the pointcut expression defined in {source_hint} is empty")]
    EmptyExpression { source_hint: String },
}

impl ParseError {
    pub(crate) fn syntax(
        detail: impl Into<String>,
        offending: impl Into<String>,
        source_hint: &str,
    ) -> Self {
        ParseError::Syntax {
            detail: detail.into(),
            offending: offending.into(),
            source_hint: source_hint.to_owned(),
        }
    }
}
