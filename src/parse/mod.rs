mod error;
mod grammar;
mod parser;

pub use error::ParseError;
pub use parser::ExpressionParser;
