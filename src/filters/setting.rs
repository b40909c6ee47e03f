use crate::filters::{ConfigurationError, FilterMatch, MatchError, PointcutFilter};
use crate::services::ConfigurationProvider;
use crate::value::Value;

/// Gates a pointcut on a configuration setting: `setting(a.b.c)` requires
/// a boolean `true`, `setting(a.b.c = 'literal')` requires string
/// equality. The setting is resolved once at construction and the verdict
/// memoized.
pub struct SettingFilter {
    matches_setting: bool,
}

impl SettingFilter {
    pub fn new(
        expression: &str,
        settings: &dyn ConfigurationProvider,
    ) -> Result<Self, ConfigurationError> {
        let (path, expected) = match expression.split_once('=') {
            Some((path, raw)) => {
                let raw = raw.trim();
                let literal = unquote(raw).ok_or_else(|| {
                    ConfigurationError::MalformedSettingLiteral {
                        raw: raw.to_owned(),
                    }
                })?;
                (path.trim(), Some(literal))
            }
            None => (expression.trim(), None),
        };

        let actual = settings
            .setting(path)
            .ok_or_else(|| ConfigurationError::UnresolvableSetting {
                path: path.to_owned(),
            })?;

        let matches_setting = match (&actual, &expected) {
            (Value::Bool(flag), None) => *flag,
            (actual, Some(literal)) => actual.loose_eq(&Value::String(literal.clone())),
            _ => false,
        };
        Ok(SettingFilter { matches_setting })
    }
}

/// Strips matching single or double quotes, honoring backslash-escaped
/// quotes inside. Anything unquoted is rejected.
fn unquote(raw: &str) -> Option<String> {
    let mut chars = raw.char_indices();
    let (_, quote) = chars.next()?;
    if quote != '\'' && quote != '"' {
        return None;
    }
    let mut out = String::with_capacity(raw.len());
    let mut escaped = false;
    for (i, c) in chars {
        if escaped {
            if c != quote && c != '\\' {
                out.push('\\');
            }
            out.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            // The closing quote must be the last character
            return (i + c.len_utf8() == raw.len()).then_some(out);
        } else {
            out.push(c);
        }
    }
    None
}

impl PointcutFilter for SettingFilter {
    fn matches(
        &self,
        _class_name: &str,
        _method_name: &str,
        _method_declaring_class_name: &str,
        _query_id: u64,
    ) -> Result<FilterMatch, MatchError> {
        Ok(FilterMatch::new(self.matches_setting))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::StaticSettings;

    fn settings() -> StaticSettings {
        StaticSettings::new()
            .with("acme.features.audit", Value::Bool(true))
            .with("acme.features.legacy", Value::Bool(false))
            .with("acme.mode", Value::String("strict".into()))
    }

    fn matched(filter: &SettingFilter) -> bool {
        filter.matches("Any", "any", "Any", 1).unwrap().matched
    }

    #[test]
    fn boolean_setting() {
        let on = SettingFilter::new("acme.features.audit", &settings()).unwrap();
        assert!(matched(&on));
        let off = SettingFilter::new("acme.features.legacy", &settings()).unwrap();
        assert!(!matched(&off));
    }

    #[test]
    fn string_comparison_single_and_double_quotes() {
        let hit = SettingFilter::new("acme.mode = 'strict'", &settings()).unwrap();
        assert!(matched(&hit));
        let hit = SettingFilter::new("acme.mode = \"strict\"", &settings()).unwrap();
        assert!(matched(&hit));
        let miss = SettingFilter::new("acme.mode = 'lenient'", &settings()).unwrap();
        assert!(!matched(&miss));
    }

    #[test]
    fn non_boolean_setting_without_literal_is_no_match() {
        let filter = SettingFilter::new("acme.mode", &settings()).unwrap();
        assert!(!matched(&filter));
    }

    #[test]
    fn unresolvable_path_is_a_configuration_error() {
        assert!(matches!(
            SettingFilter::new("acme.nope", &settings()),
            Err(ConfigurationError::UnresolvableSetting { .. })
        ));
    }

    #[test]
    fn unquoted_literal_is_rejected() {
        assert!(matches!(
            SettingFilter::new("acme.mode = strict", &settings()),
            Err(ConfigurationError::MalformedSettingLiteral { .. })
        ));
    }

    #[test]
    fn escaped_quote_inside_literal() {
        let settings = StaticSettings::new().with("msg", Value::String("it's on".into()));
        let filter = SettingFilter::new("msg = 'it\\'s on'", &settings).unwrap();
        assert!(matched(&filter));
    }
}
