use serde::{Deserialize, Serialize};

use crate::runtime::condition::{ConditionOperand, RuntimeCondition};
use crate::runtime::context::{GlobalObjectResolver, JoinPoint};
use crate::value::Value;

/// A compiled runtime expression: the evaluable tree a runtime-evaluations
/// definition compiles into. Interpreted directly against an invocation
/// context; serializable so the durable expression cache can store it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RuntimeExpr {
    Condition(RuntimeCondition),
    Not(Box<RuntimeExpr>),
    All(Vec<RuntimeExpr>),
    Any(Vec<RuntimeExpr>),
}

impl RuntimeExpr {
    /// Evaluates the expression against one method invocation. A condition
    /// whose operands cannot be resolved evaluates to false.
    #[must_use]
    pub fn evaluate(
        &self,
        join_point: &dyn JoinPoint,
        globals: &dyn GlobalObjectResolver,
    ) -> bool {
        match self {
            RuntimeExpr::Condition(condition) => {
                match (
                    resolve_operand(&condition.left, join_point, globals),
                    resolve_operand(&condition.right, join_point, globals),
                ) {
                    (Some(left), Some(right)) => condition.operator.apply(&left, &right),
                    _ => false,
                }
            }
            RuntimeExpr::Not(inner) => !inner.evaluate(join_point, globals),
            RuntimeExpr::All(terms) => terms.iter().all(|t| t.evaluate(join_point, globals)),
            RuntimeExpr::Any(terms) => terms.iter().any(|t| t.evaluate(join_point, globals)),
        }
    }
}

fn resolve_operand(
    operand: &ConditionOperand,
    join_point: &dyn JoinPoint,
    globals: &dyn GlobalObjectResolver,
) -> Option<Value> {
    match operand {
        ConditionOperand::Literal(value) => Some(value.clone()),
        ConditionOperand::List(items) => items
            .iter()
            .map(|item| resolve_operand(item, join_point, globals))
            .collect::<Option<Vec<Value>>>()
            .map(Value::List),
        ConditionOperand::SelfPath(path) => join_point.proxy_property(path),
        ConditionOperand::GlobalPath { object, path } => {
            globals.global_property(object, path.as_deref())
        }
        ConditionOperand::ArgumentPath { argument, path } => {
            join_point.method_argument(argument, path.as_deref())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::condition::RuntimeOp;
    use crate::runtime::context::{StaticGlobals, StaticJoinPoint};

    fn cond(left: &str, operator: RuntimeOp, right: &str) -> RuntimeExpr {
        RuntimeExpr::Condition(RuntimeCondition {
            left: ConditionOperand::from_token(left),
            operator,
            right: ConditionOperand::from_token(right),
        })
    }

    #[test]
    fn condition_against_proxy_property() {
        let jp = StaticJoinPoint::new().with_proxy_property("active", Value::Bool(true));
        let globals = StaticGlobals::default();
        assert!(cond("this.active", RuntimeOp::Eq, "true").evaluate(&jp, &globals));
        assert!(!cond("this.active", RuntimeOp::Neq, "true").evaluate(&jp, &globals));
    }

    #[test]
    fn condition_against_method_argument_path() {
        let jp = StaticJoinPoint::new()
            .with_argument_property("identifier.uuid", Value::String("abc-123".into()));
        let globals = StaticGlobals::default();
        assert!(cond("identifier.uuid", RuntimeOp::Eq, "abc-123").evaluate(&jp, &globals));
    }

    #[test]
    fn condition_against_global_object() {
        let jp = StaticJoinPoint::new();
        let globals =
            StaticGlobals::new().with_property("party.name", Value::String("Andi".into()));
        assert!(cond("current.party.name", RuntimeOp::Eq, "Andi").evaluate(&jp, &globals));
    }

    #[test]
    fn unresolvable_operand_is_false_even_negated_op() {
        let jp = StaticJoinPoint::new();
        let globals = StaticGlobals::default();
        // `!=` would be trivially true, but an unresolvable operand wins
        assert!(!cond("this.missing", RuntimeOp::Neq, "whatever").evaluate(&jp, &globals));
    }

    #[test]
    fn boolean_connectives() {
        let jp = StaticJoinPoint::new().with_proxy_property("a", Value::Int(1));
        let globals = StaticGlobals::default();
        let t = cond("this.a", RuntimeOp::Eq, "1");
        let f = cond("this.a", RuntimeOp::Eq, "2");

        assert!(RuntimeExpr::All(vec![t.clone(), t.clone()]).evaluate(&jp, &globals));
        assert!(!RuntimeExpr::All(vec![t.clone(), f.clone()]).evaluate(&jp, &globals));
        assert!(RuntimeExpr::Any(vec![f.clone(), t.clone()]).evaluate(&jp, &globals));
        assert!(!RuntimeExpr::Any(vec![f.clone(), f.clone()]).evaluate(&jp, &globals));
        assert!(RuntimeExpr::Not(Box::new(f)).evaluate(&jp, &globals));
        assert!(!RuntimeExpr::Not(Box::new(t)).evaluate(&jp, &globals));
    }

    #[test]
    fn list_operand_with_property_paths() {
        let jp = StaticJoinPoint::new()
            .with_argument_property("customer.type", Value::String("vip".into()));
        let globals = StaticGlobals::default();
        let expr = RuntimeExpr::Condition(RuntimeCondition {
            left: ConditionOperand::from_token("customer.type"),
            operator: RuntimeOp::In,
            right: ConditionOperand::List(vec![
                ConditionOperand::Literal(Value::String("vip".into())),
                ConditionOperand::Literal(Value::String("staff".into())),
            ]),
        });
        assert!(expr.evaluate(&jp, &globals));
    }
}
