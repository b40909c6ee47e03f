//! Runtime-evaluation machinery: conditions that cannot be decided at
//! compile time are collected while matching, compiled into an expression
//! tree and re-checked on every intercepted invocation.

pub mod condition;
pub mod context;
pub mod evaluator;
pub mod expr;
pub mod serial;

pub use condition::{
    ArgumentConstraint, ConditionGroup, ConditionOperand, RuntimeCondition, RuntimeOp,
};
pub use context::{GlobalObjectResolver, JoinPoint, PropertySet, StaticGlobals, StaticJoinPoint};
pub use evaluator::{
    EvaluationError, ExpressionCache, InMemoryExpressionCache, RuntimeExpressionEvaluator,
};
pub use expr::RuntimeExpr;
pub use serial::{DeserializeError, SerializeError};
