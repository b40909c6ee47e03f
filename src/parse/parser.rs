use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::PointcutError;
use crate::filters::{
    ClassAnnotatedWithFilter, ClassNameFilter, ClassTypeFilter, FilterComposite,
    MethodAnnotatedWithFilter, MethodNameFilter, MethodVisibility, PointcutOperator,
    PointcutReferenceFilter, SettingFilter,
};
use crate::parse::error::ParseError;
use crate::parse::grammar;
use crate::runtime::condition::{ArgumentConstraint, ConditionGroup};
use crate::services::FilterServices;

/// Designator keywords, matched prefix-wise against each term: the longer
/// keyword must come before any keyword that is its prefix.
const DESIGNATORS: &[&str] = &[
    "classAnnotatedWith",
    "class",
    "methodAnnotatedWith",
    "method",
    "within",
    "filter",
    "setting",
    "evaluate",
];

/// Parses pointcut expressions into filter composites.
///
/// The top-level grammar splits on `&&`/`||` across the whole expression
/// before any parenthesis balancing, so operator tokens inside quoted
/// designator arguments are unsupported; each term is then dispatched on
/// its designator keyword and its parenthesized signature.
pub struct ExpressionParser {
    services: FilterServices,
}

impl ExpressionParser {
    #[must_use]
    pub fn new(services: FilterServices) -> Self {
        ExpressionParser { services }
    }

    /// Parses one pointcut expression. `source_hint` names where the
    /// expression was defined and is carried into every error message.
    pub fn parse(
        &self,
        expression: &str,
        source_hint: &str,
    ) -> Result<FilterComposite, PointcutError> {
        if expression.trim().is_empty() {
            return Err(ParseError::EmptyExpression {
                source_hint: source_hint.to_owned(),
            }
            .into());
        }

        let mut composite = FilterComposite::new();
        for (connective, raw_term) in split_on_operators(expression) {
            let mut term = raw_term.trim();
            let mut operator_token = connective.unwrap_or("&&").to_owned();
            if let Some(rest) = term.strip_prefix('!') {
                operator_token.push('!');
                term = rest.trim_start();
            }
            let operator = match operator_token.as_str() {
                "&&" => PointcutOperator::And,
                "&&!" => PointcutOperator::AndNot,
                "||" => PointcutOperator::Or,
                _ => PointcutOperator::OrNot,
            };

            if !term.contains('(') {
                self.add_pointcut_reference(operator, term, &mut composite, source_hint)?;
                continue;
            }

            let Some(designator) = DESIGNATORS.iter().find(|d| term.starts_with(**d)) else {
                let keyword: String = term
                    .chars()
                    .take_while(|c| c.is_ascii_alphanumeric())
                    .collect();
                if keyword.is_empty() {
                    return Err(ParseError::syntax(
                        "pointcut designator expected",
                        term,
                        source_hint,
                    )
                    .into());
                }
                return Err(ParseError::UnsupportedDesignator {
                    designator: keyword,
                    source_hint: source_hint.to_owned(),
                }
                .into());
            };

            let signature = substring_between_parentheses(term, source_hint)?;
            match *designator {
                "class" => composite.add_filter(
                    operator,
                    Arc::new(ClassNameFilter::new(signature.trim())?),
                ),
                "within" => composite.add_filter(
                    operator,
                    Arc::new(ClassTypeFilter::new(
                        signature.trim(),
                        self.services.metadata.clone(),
                    )?),
                ),
                "classAnnotatedWith" => {
                    let (annotation_type, constraints) =
                        self.parse_annotation_signature(&signature, source_hint)?;
                    composite.add_filter(
                        operator,
                        Arc::new(ClassAnnotatedWithFilter::new(
                            &annotation_type,
                            constraints,
                            self.services.metadata.clone(),
                        )),
                    );
                }
                "methodAnnotatedWith" => {
                    let (annotation_type, constraints) =
                        self.parse_annotation_signature(&signature, source_hint)?;
                    composite.add_filter(
                        operator,
                        Arc::new(MethodAnnotatedWithFilter::new(
                            &annotation_type,
                            constraints,
                            self.services.metadata.clone(),
                        )),
                    );
                }
                "method" => {
                    self.add_method_filters(operator, &signature, &mut composite, source_hint)?;
                }
                "filter" => {
                    let name = signature.trim();
                    let filter = self.services.custom_filters.custom_filter(name).ok_or_else(
                        || ParseError::UnknownCustomFilter {
                            name: name.to_owned(),
                            source_hint: source_hint.to_owned(),
                        },
                    )?;
                    composite.add_filter(operator, filter);
                }
                "setting" => composite.add_filter(
                    operator,
                    Arc::new(SettingFilter::new(
                        signature.trim(),
                        self.services.settings.as_ref(),
                    )?),
                ),
                // "evaluate": a later clause overwrites an earlier one
                _ => {
                    let conditions = grammar::parse_conditions(&signature).map_err(|detail| {
                        ParseError::syntax(detail, signature.trim(), source_hint)
                    })?;
                    composite.set_global_runtime_evaluations(ConditionGroup::subgroup(
                        operator,
                        ConditionGroup::from_conditions(conditions),
                    ));
                }
            }
        }
        Ok(composite)
    }

    fn add_pointcut_reference(
        &self,
        operator: PointcutOperator,
        term: &str,
        composite: &mut FilterComposite,
        source_hint: &str,
    ) -> Result<(), PointcutError> {
        let Some((aspect, method)) = term.split_once("->") else {
            return Err(ParseError::syntax("\"->\" expected", term, source_hint).into());
        };
        composite.add_filter(
            operator,
            Arc::new(PointcutReferenceFilter::new(
                aspect.trim(),
                method.trim(),
                self.services.pointcuts.clone(),
            )),
        );
        Ok(())
    }

    /// Splits `AnnotationType(property == value, …)` into the type name
    /// and accumulated property constraints; without parentheses the whole
    /// signature is the type name.
    fn parse_annotation_signature(
        &self,
        signature: &str,
        source_hint: &str,
    ) -> Result<(String, BTreeMap<String, ArgumentConstraint>), PointcutError> {
        let signature = signature.trim();
        if !signature.contains('(') {
            return Ok((signature.to_owned(), BTreeMap::new()));
        }
        let (name, arguments) = split_name_and_arguments(signature)
            .ok_or_else(|| ParseError::syntax("\")\" expected", signature, source_hint))?;
        let constraints = grammar::parse_argument_constraints(arguments)
            .map_err(|detail| ParseError::syntax(detail, arguments, source_hint))?;
        Ok((name.trim().to_owned(), constraints))
    }

    fn add_method_filters(
        &self,
        operator: PointcutOperator,
        signature: &str,
        composite: &mut FilterComposite,
        source_hint: &str,
    ) -> Result<(), PointcutError> {
        if !signature.contains("->") {
            return Err(ParseError::syntax("\"->\" expected", signature.trim(), source_hint).into());
        }
        let (visibility, signature) = extract_visibility(signature.trim(), source_hint)?;
        let (class_pattern, method_part) = match signature.split_once("->") {
            Some(parts) => parts,
            None => {
                return Err(
                    ParseError::syntax("\"->\" expected", signature, source_hint).into(),
                )
            }
        };
        if !method_part.contains('(') {
            return Err(ParseError::syntax("\"(\" expected", method_part, source_hint).into());
        }
        let (method_name_pattern, argument_pattern) = split_name_and_arguments(method_part)
            .ok_or_else(|| ParseError::syntax("\")\" expected", method_part, source_hint))?;
        let constraints = if argument_pattern.trim().is_empty() {
            BTreeMap::new()
        } else {
            grammar::parse_argument_constraints(argument_pattern)
                .map_err(|detail| ParseError::syntax(detail, argument_pattern, source_hint))?
        };

        let class_filter = Arc::new(ClassNameFilter::new(class_pattern.trim())?);
        let method_filter = Arc::new(MethodNameFilter::new(
            method_name_pattern.trim(),
            visibility,
            constraints,
            self.services.metadata.clone(),
        )?);

        // A class+method pair joined into the parent with anything but
        // plain && must stay one unit, so it gets its own sub-composite
        if operator == PointcutOperator::And {
            composite.add_filter(PointcutOperator::And, class_filter);
            composite.add_filter(PointcutOperator::And, method_filter);
        } else {
            let mut sub_composite = FilterComposite::new();
            sub_composite.add_filter(PointcutOperator::And, class_filter);
            sub_composite.add_filter(PointcutOperator::And, method_filter);
            composite.add_filter(operator, Arc::new(sub_composite));
        }
        Ok(())
    }
}

/// Splits the whole expression on `&&`/`||` occurrences, left to right.
/// The first term carries no connective. Runs before any parenthesis
/// balancing, faithfully including the operators' blindness to quoting.
fn split_on_operators(expression: &str) -> Vec<(Option<&str>, &str)> {
    let mut parts = Vec::new();
    let mut connective: Option<&str> = None;
    let mut rest = expression;
    loop {
        let next_and = rest.find("&&");
        let next_or = rest.find("||");
        let next = match (next_and, next_or) {
            (Some(a), Some(o)) => Some(a.min(o)),
            (Some(a), None) => Some(a),
            (None, Some(o)) => Some(o),
            (None, None) => None,
        };
        match next {
            Some(pos) => {
                parts.push((connective, &rest[..pos]));
                connective = Some(&rest[pos..pos + 2]);
                rest = &rest[pos + 2..];
            }
            None => {
                parts.push((connective, rest));
                return parts;
            }
        }
    }
}

/// Extracts the substring between the first `(` and its balanced closing
/// `)`, counting only first-level balance. Unbalanced parentheses name the
/// missing or surplus count.
fn substring_between_parentheses(
    term: &str,
    source_hint: &str,
) -> Result<String, ParseError> {
    let mut open: i32 = 0;
    let mut out = String::new();
    for c in term.chars() {
        if c == ')' {
            open -= 1;
        }
        if open > 0 {
            out.push(c);
        }
        if c == '(' {
            open += 1;
        }
    }
    if open < 0 {
        let surplus = -open;
        return Err(ParseError::syntax(
            format!(
                "the expression is in excess of {surplus} closing parenthesis/es"
            ),
            term,
            source_hint,
        ));
    }
    if open > 0 {
        return Err(ParseError::syntax(
            format!("the expression lacks of {open} closing parenthesis/es"),
            term,
            source_hint,
        ));
    }
    Ok(out)
}

/// Splits `name(args)` at the *last* opening parenthesis, mirroring a
/// greedy name match; the signature must end with `)`.
fn split_name_and_arguments(signature: &str) -> Option<(&str, &str)> {
    let signature = signature.trim();
    let rest = signature.strip_suffix(')')?;
    let open = rest.rfind('(')?;
    Some((&rest[..open], &rest[open + 1..]))
}

/// Strips one optional leading `public ` / `protected ` modifier off a
/// `method(...)` signature. Two modifiers in a row are a syntax error.
fn extract_visibility<'a>(
    signature: &'a str,
    source_hint: &str,
) -> Result<(Option<MethodVisibility>, &'a str), ParseError> {
    for (keyword, visibility) in [
        ("public", MethodVisibility::Public),
        ("protected", MethodVisibility::Protected),
    ] {
        let Some(rest) = signature.strip_prefix(keyword) else {
            continue;
        };
        let Some(rest) = rest.strip_prefix(' ') else {
            continue;
        };
        let rest = rest.trim_start();
        if rest.starts_with("public ") || rest.starts_with("protected ") {
            return Err(ParseError::syntax(
                "method name expected after visibility modifier",
                signature,
                source_hint,
            ));
        }
        return Ok((Some(visibility), rest));
    }
    Ok((None, signature))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_finds_every_operator_token() {
        let parts = split_on_operators("class(Foo) && method(Bar->baz()) || within(Quux)");
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], (None, "class(Foo) "));
        assert_eq!(parts[1], (Some("&&"), " method(Bar->baz()) "));
        assert_eq!(parts[2], (Some("||"), " within(Quux)"));
    }

    #[test]
    fn split_is_blind_to_quoting() {
        // Deliberate: the splitter sees operators inside quoted arguments
        let parts = split_on_operators("setting(a = 'x && y')");
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn balanced_extraction() {
        assert_eq!(
            substring_between_parentheses("method(Foo->bar(baz == 1))", "test").unwrap(),
            "Foo->bar(baz == 1)"
        );
    }

    #[test]
    fn missing_closing_parenthesis_is_counted() {
        let err = substring_between_parentheses("class(Foo", "test").unwrap_err();
        assert!(err.to_string().contains("lacks of 1 closing parenthesis"));

        let err = substring_between_parentheses("method(Foo->bar(", "test").unwrap_err();
        assert!(err.to_string().contains("lacks of 2 closing parenthesis"));
    }

    #[test]
    fn surplus_closing_parenthesis_is_counted() {
        let err = substring_between_parentheses("class(Foo))", "test").unwrap_err();
        assert!(err
            .to_string()
            .contains("in excess of 1 closing parenthesis"));
    }

    #[test]
    fn name_and_arguments_split_at_the_last_opening_parenthesis() {
        assert_eq!(
            split_name_and_arguments("bar(arg1 == 1)"),
            Some(("bar", "arg1 == 1"))
        );
        assert_eq!(split_name_and_arguments("bar()"), Some(("bar", "")));
        assert_eq!(
            split_name_and_arguments("bar(arg3 in (1, 2)"),
            Some(("bar(arg3 in ", "1, 2"))
        );
        assert_eq!(split_name_and_arguments("bar"), None);
    }

    #[test]
    fn visibility_extraction() {
        let (vis, rest) = extract_visibility("public Foo->bar()", "test").unwrap();
        assert_eq!(vis, Some(MethodVisibility::Public));
        assert_eq!(rest, "Foo->bar()");

        let (vis, rest) = extract_visibility("Foo->bar()", "test").unwrap();
        assert_eq!(vis, None);
        assert_eq!(rest, "Foo->bar()");

        // "publicity" is a class pattern, not a modifier
        let (vis, rest) = extract_visibility("publicity->bar()", "test").unwrap();
        assert_eq!(vis, None);
        assert_eq!(rest, "publicity->bar()");

        assert!(extract_visibility("public protected Foo->bar()", "test").is_err());
    }
}
