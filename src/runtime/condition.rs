use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::filters::PointcutOperator;
use crate::runtime::expr::RuntimeExpr;
use crate::value::Value;

/// Comparison operator inside an `evaluate(...)` condition or a method
/// argument constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuntimeOp {
    Eq,
    EqStrict,
    Neq,
    NeqStrict,
    Lte,
    Gte,
    Lt,
    Gt,
    In,
    Contains,
    Matches,
}

impl RuntimeOp {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RuntimeOp::Eq => "==",
            RuntimeOp::EqStrict => "===",
            RuntimeOp::Neq => "!=",
            RuntimeOp::NeqStrict => "!==",
            RuntimeOp::Lte => "<=",
            RuntimeOp::Gte => ">=",
            RuntimeOp::Lt => "<",
            RuntimeOp::Gt => ">",
            RuntimeOp::In => "in",
            RuntimeOp::Contains => "contains",
            RuntimeOp::Matches => "matches",
        }
    }

    /// Applies the operator to two resolved values. Incompatible operand
    /// types compare as false rather than erroring.
    #[must_use]
    pub fn apply(self, left: &Value, right: &Value) -> bool {
        use std::cmp::Ordering;

        match self {
            RuntimeOp::Eq => left.loose_eq(right),
            RuntimeOp::Neq => !left.loose_eq(right),
            RuntimeOp::EqStrict => left.strict_eq(right),
            RuntimeOp::NeqStrict => !left.strict_eq(right),
            RuntimeOp::Lt => left.partial_cmp_value(right) == Some(Ordering::Less),
            RuntimeOp::Gt => left.partial_cmp_value(right) == Some(Ordering::Greater),
            RuntimeOp::Lte => matches!(
                left.partial_cmp_value(right),
                Some(Ordering::Less | Ordering::Equal)
            ),
            RuntimeOp::Gte => matches!(
                left.partial_cmp_value(right),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            RuntimeOp::In => right
                .as_list()
                .is_some_and(|items| items.iter().any(|item| item.loose_eq(left))),
            RuntimeOp::Contains => left
                .as_list()
                .is_some_and(|items| items.iter().any(|item| item.loose_eq(right))),
            RuntimeOp::Matches => match (left.as_list(), right.as_list()) {
                (Some(a), Some(b)) => a.iter().any(|x| b.iter().any(|y| x.loose_eq(y))),
                _ => false,
            },
        }
    }
}

impl fmt::Display for RuntimeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One side of a runtime condition, classified from its token shape at
/// parse time and resolved against an invocation context at evaluation
/// time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConditionOperand {
    /// A literal value (quoted string, number, boolean or bare word).
    Literal(Value),
    /// A parenthesized value list.
    List(Vec<ConditionOperand>),
    /// A `this.…` property path on the advised object.
    SelfPath(String),
    /// A `current.…` path into a named global object.
    GlobalPath {
        object: String,
        path: Option<String>,
    },
    /// A dotted path whose first segment names a method argument.
    ArgumentPath {
        argument: String,
        path: Option<String>,
    },
}

impl ConditionOperand {
    /// Classifies a bare (unquoted) token.
    #[must_use]
    pub fn from_token(token: &str) -> Self {
        if token == "true" {
            return ConditionOperand::Literal(Value::Bool(true));
        }
        if token == "false" {
            return ConditionOperand::Literal(Value::Bool(false));
        }
        if let Ok(int) = token.parse::<i64>() {
            return ConditionOperand::Literal(Value::Int(int));
        }
        if token.contains('.') {
            if let Ok(float) = token.parse::<f64>() {
                return ConditionOperand::Literal(Value::Float(float));
            }
            let (head, tail) = match token.split_once('.') {
                Some((head, tail)) => (head, tail),
                None => (token, ""),
            };
            let path = if tail.is_empty() {
                None
            } else {
                Some(tail.to_owned())
            };
            return match head {
                "this" => ConditionOperand::SelfPath(tail.to_owned()),
                "current" => match tail.split_once('.') {
                    Some((object, rest)) => ConditionOperand::GlobalPath {
                        object: object.to_owned(),
                        path: Some(rest.to_owned()),
                    },
                    None => ConditionOperand::GlobalPath {
                        object: tail.to_owned(),
                        path: None,
                    },
                },
                argument => ConditionOperand::ArgumentPath {
                    argument: argument.to_owned(),
                    path,
                },
            };
        }
        ConditionOperand::Literal(Value::String(token.to_owned()))
    }

    /// The operand as a constant value, if it contains no property paths.
    #[must_use]
    pub fn to_literal(&self) -> Option<Value> {
        match self {
            ConditionOperand::Literal(value) => Some(value.clone()),
            ConditionOperand::List(items) => items
                .iter()
                .map(ConditionOperand::to_literal)
                .collect::<Option<Vec<Value>>>()
                .map(Value::List),
            _ => None,
        }
    }
}

/// A fully parsed `left OP right` condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeCondition {
    pub left: ConditionOperand,
    pub operator: RuntimeOp,
    pub right: ConditionOperand,
}

/// Accumulated constraints on a single method argument. Repeated
/// constraints on the same argument accumulate positionally.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgumentConstraint {
    pub operators: Vec<RuntimeOp>,
    pub values: Vec<ConditionOperand>,
}

impl ArgumentConstraint {
    pub fn push(&mut self, operator: RuntimeOp, value: ConditionOperand) {
        self.operators.push(operator);
        self.values.push(value);
    }

    pub fn merge(&mut self, other: &ArgumentConstraint) {
        self.operators.extend(other.operators.iter().copied());
        self.values.extend(other.values.iter().cloned());
    }
}

/// The runtime-evaluations definition a filter tree accumulates while
/// matching: conditions from `evaluate(...)`, per-argument constraints
/// from `method(...)`, and nested groups keyed by the operator that joined
/// the contributing filter into its composite.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionGroup {
    pub evaluate_conditions: Vec<RuntimeCondition>,
    pub method_argument_constraints: BTreeMap<String, ArgumentConstraint>,
    pub subgroups: BTreeMap<PointcutOperator, ConditionGroup>,
}

impl ConditionGroup {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.evaluate_conditions.is_empty()
            && self.method_argument_constraints.is_empty()
            && self.subgroups.is_empty()
    }

    /// A group holding only evaluate conditions.
    #[must_use]
    pub fn from_conditions(conditions: Vec<RuntimeCondition>) -> Self {
        ConditionGroup {
            evaluate_conditions: conditions,
            ..ConditionGroup::default()
        }
    }

    /// A group holding only method argument constraints.
    #[must_use]
    pub fn from_argument_constraints(
        constraints: BTreeMap<String, ArgumentConstraint>,
    ) -> Self {
        ConditionGroup {
            method_argument_constraints: constraints,
            ..ConditionGroup::default()
        }
    }

    /// A group with a single subgroup under the given operator.
    #[must_use]
    pub fn subgroup(operator: PointcutOperator, group: ConditionGroup) -> Self {
        let mut subgroups = BTreeMap::new();
        subgroups.insert(operator, group);
        ConditionGroup {
            subgroups,
            ..ConditionGroup::default()
        }
    }

    /// Deep merge: condition vectors concatenate, constraint maps and
    /// subgroup maps merge recursively. Nothing is ever overwritten.
    pub fn merge(&mut self, other: &ConditionGroup) {
        self.evaluate_conditions
            .extend(other.evaluate_conditions.iter().cloned());
        for (argument, constraint) in &other.method_argument_constraints {
            self.method_argument_constraints
                .entry(argument.clone())
                .or_default()
                .merge(constraint);
        }
        for (operator, subgroup) in &other.subgroups {
            self.subgroups
                .entry(*operator)
                .or_default()
                .merge(subgroup);
        }
    }

    /// Compiles the definition into an evaluable expression tree.
    ///
    /// Sibling terms inside one group join with the group's own connective;
    /// when a group carries several subgroups, their chain folds with AND
    /// binding tighter than OR. A negated connective wraps the subgroup's
    /// whole expression in a negation. Returns `None` for an empty
    /// definition.
    #[must_use]
    pub fn compile(&self) -> Option<RuntimeExpr> {
        compile_group(self, PointcutOperator::And)
    }
}

fn condition_expr(condition: &RuntimeCondition) -> RuntimeExpr {
    RuntimeExpr::Condition(condition.clone())
}

fn argument_constraint_exprs(
    constraints: &BTreeMap<String, ArgumentConstraint>,
) -> Vec<RuntimeExpr> {
    let mut exprs = Vec::new();
    for (argument, constraint) in constraints {
        let (name, path) = match argument.split_once('.') {
            Some((name, path)) => (name.to_owned(), Some(path.to_owned())),
            None => (argument.clone(), None),
        };
        let left = ConditionOperand::ArgumentPath {
            argument: name,
            path,
        };
        for (operator, value) in constraint.operators.iter().zip(&constraint.values) {
            exprs.push(RuntimeExpr::Condition(RuntimeCondition {
                left: left.clone(),
                operator: *operator,
                right: value.clone(),
            }));
        }
    }
    exprs
}

fn join_terms(mut terms: Vec<RuntimeExpr>, connective: PointcutOperator) -> RuntimeExpr {
    if terms.len() == 1 {
        return terms.remove(0);
    }
    match connective.base() {
        PointcutOperator::And => RuntimeExpr::All(terms),
        _ => RuntimeExpr::Any(terms),
    }
}

/// Folds an operator-interleaved chain of terms, AND binding tighter
/// than OR. The first term's operator only carries its negation.
fn fold_chain(chain: Vec<(PointcutOperator, RuntimeExpr)>) -> Option<RuntimeExpr> {
    let mut any_terms: Vec<RuntimeExpr> = Vec::new();
    let mut all_run: Vec<RuntimeExpr> = Vec::new();
    for (i, (operator, expr)) in chain.into_iter().enumerate() {
        if i > 0 && operator.base() == PointcutOperator::Or {
            any_terms.push(join_terms(std::mem::take(&mut all_run), PointcutOperator::And));
        }
        all_run.push(expr);
    }
    if all_run.is_empty() {
        return None;
    }
    any_terms.push(join_terms(all_run, PointcutOperator::And));
    Some(join_terms(any_terms, PointcutOperator::Or))
}

fn compile_group(group: &ConditionGroup, operator: PointcutOperator) -> Option<RuntimeExpr> {
    let mut terms: Vec<RuntimeExpr> = Vec::new();

    if !group.evaluate_conditions.is_empty() {
        terms.push(join_terms(
            group.evaluate_conditions.iter().map(condition_expr).collect(),
            PointcutOperator::And,
        ));
    }
    if !group.method_argument_constraints.is_empty() {
        terms.push(join_terms(
            argument_constraint_exprs(&group.method_argument_constraints),
            PointcutOperator::And,
        ));
    }

    if group.subgroups.len() == 1 {
        if let Some((sub_operator, subgroup)) = group.subgroups.iter().next() {
            if let Some(expr) = compile_group(subgroup, *sub_operator) {
                terms.push(expr);
            }
        }
    } else if group.subgroups.len() > 1 {
        let chain: Vec<(PointcutOperator, RuntimeExpr)> = group
            .subgroups
            .iter()
            .filter_map(|(sub_operator, subgroup)| {
                compile_group(subgroup, *sub_operator).map(|expr| (*sub_operator, expr))
            })
            .collect();
        if let Some(expr) = fold_chain(chain) {
            terms.push(expr);
        }
    }

    if terms.is_empty() {
        return None;
    }
    let expr = join_terms(terms, operator);
    Some(if operator.is_negated() {
        RuntimeExpr::Not(Box::new(expr))
    } else {
        expr
    })
}
