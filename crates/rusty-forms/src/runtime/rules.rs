//! Built-in process and validate rules

use super::{NodeId, Tree};
use crate::config::MessagesConfig;
use crate::element::rules::{Conversion, Rule};
use crate::error::HandlerError;
use crate::handler::State;
use crate::value::{is_empty, length, same_text, to_number, to_text, to_whole};
use serde_json::{Number, Value};

/// Why a handler did not pass
#[derive(Debug)]
pub(crate) enum Failure {
    /// A built-in rule rejected the value; `template` is the default message
    Rule {
        template: String,
        vars: Vec<(&'static str, String)>,
    },
    Handler(HandlerError),
}

impl Failure {
    fn rule(template: &str) -> Self {
        Failure::Rule {
            template: template.to_string(),
            vars: Vec::new(),
        }
    }

    fn with(mut self, key: &'static str, value: impl ToString) -> Self {
        if let Failure::Rule { vars, .. } = &mut self {
            vars.push((key, value.to_string()));
        }
        self
    }
}

fn format_bound(n: f64) -> String {
    to_text(&Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null))
}

fn convert(conversion: Conversion, value: &Value, messages: &MessagesConfig) -> Result<Value, Failure> {
    match conversion {
        Conversion::Bool => Ok(Value::Bool(match value {
            Value::Bool(b) => *b,
            other if is_empty(other) => false,
            other => !matches!(
                to_text(other).trim().to_ascii_lowercase().as_str(),
                "false" | "0" | "off" | "no"
            ),
        })),
        _ if is_empty(value) && !matches!(value, Value::Number(_)) => Ok(value.clone()),
        Conversion::Int => {
            to_whole(value)
                .map(Value::from)
                .ok_or_else(|| Failure::rule(&messages.int))
        }
        Conversion::Float => to_number(value)
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| Failure::rule(&messages.float)),
        Conversion::String => Ok(Value::String(to_text(value))),
    }
}

impl<'a> Tree<'a> {
    /// Apply a built-in rule to the state of element `id`.
    ///
    /// Validators other than `required` pass empty values unless the
    /// element is required.
    pub(crate) fn apply_rule(&self, id: NodeId, rule: &Rule, mut state: State) -> Result<State, Failure> {
        let messages = &self.form.settings.messages;

        if let Rule::Required = rule {
            state.require = true;
            return if is_empty(&state.value) {
                Err(Failure::rule(&messages.required))
            } else {
                Ok(state)
            };
        }
        if let Rule::Convert(conversion) = rule {
            state.value = convert(*conversion, &state.value, messages)?;
            return Ok(state);
        }
        if is_empty(&state.value) && !state.require {
            return Ok(state);
        }

        let value = &state.value;
        let outcome = match rule {
            Rule::Size { min, max } => {
                let len = length(value);
                if min.map_or(true, |m| len >= m) && max.map_or(true, |m| len <= m) {
                    Ok(())
                } else {
                    let template = match (min, max) {
                        (Some(_), Some(_)) => &messages.size,
                        (Some(_), None) => &messages.size_min,
                        _ => &messages.size_max,
                    };
                    Err(Failure::rule(template)
                        .with("min", min.map(|m| m.to_string()).unwrap_or_default())
                        .with("max", max.map(|m| m.to_string()).unwrap_or_default()))
                }
            }
            Rule::Min(min) => match to_number(value) {
                Some(n) if n >= *min => Ok(()),
                _ => Err(Failure::rule(&messages.min).with("min", format_bound(*min))),
            },
            Rule::Max(max) => match to_number(value) {
                Some(n) if n <= *max => Ok(()),
                _ => Err(Failure::rule(&messages.max).with("max", format_bound(*max))),
            },
            Rule::Options(options) => {
                let allowed = |v: &Value| options.iter().any(|o| same_text(&o.value, v));
                let ok = match value {
                    Value::Array(items) => items.iter().all(allowed),
                    other => allowed(other),
                };
                if ok {
                    Ok(())
                } else {
                    Err(Failure::rule(&messages.options))
                }
            }
            Rule::Blacklist(blocked) => {
                let hit = |v: &Value| {
                    let text = to_text(v);
                    blocked.iter().any(|b| b.eq_ignore_ascii_case(text.trim()))
                };
                let found = match value {
                    Value::Array(items) => items.iter().any(hit),
                    other => hit(other),
                };
                if found {
                    Err(Failure::rule(&messages.blacklist))
                } else {
                    Ok(())
                }
            }
            Rule::Match(target) => {
                let (other, label) = match self.find(target) {
                    Some(found) => (self.nodes[found].value.clone(), self.nodes[found].label.clone()),
                    None => (
                        state.values.get(target).cloned().unwrap_or(Value::Null),
                        target.clone(),
                    ),
                };
                if same_text(value, &other) {
                    Ok(())
                } else {
                    Err(Failure::rule(&messages.r#match).with("target", label))
                }
            }
            Rule::Is(kind) => match self.form.predicates.check(kind, &to_text(value)) {
                Some(true) => Ok(()),
                Some(false) => Err(Failure::rule(&messages.is).with("type", kind)),
                None => Err(Failure::Handler(HandlerError::Internal(anyhow::anyhow!(
                    "unknown predicate '{}' on element '{}'",
                    kind,
                    self.nodes[id].name
                )))),
            },
            Rule::Required | Rule::Convert(_) | Rule::Handler(_) => Ok(()),
        };
        outcome.map(|()| state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn messages() -> MessagesConfig {
        MessagesConfig::default()
    }

    #[rstest]
    #[case(Conversion::Int, json!("42"), json!(42))]
    #[case(Conversion::Int, json!("7.0"), json!(7))]
    #[case(Conversion::Float, json!("2.5"), json!(2.5))]
    #[case(Conversion::Bool, json!("on"), json!(true))]
    #[case(Conversion::Bool, json!("off"), json!(false))]
    #[case(Conversion::Bool, json!(""), json!(false))]
    #[case(Conversion::String, json!(12), json!("12"))]
    #[case(Conversion::Int, json!(""), json!(""))]
    fn test_convert(#[case] conversion: Conversion, #[case] input: Value, #[case] expected: Value) {
        assert_eq!(convert(conversion, &input, &messages()).unwrap(), expected);
    }

    #[rstest]
    #[case(Conversion::Int, json!("4.5"))]
    #[case(Conversion::Int, json!("four"))]
    #[case(Conversion::Int, json!("99999999999999999999"))]
    #[case(Conversion::Int, json!(1e20))]
    #[case(Conversion::Float, json!("x"))]
    fn test_convert_rejects(#[case] conversion: Conversion, #[case] input: Value) {
        assert!(matches!(convert(conversion, &input, &messages()), Err(Failure::Rule { .. })));
    }

    #[test]
    fn test_format_bound_drops_fraction() {
        assert_eq!(format_bound(18.0), "18");
        assert_eq!(format_bound(2.5), "2.5");
    }
}
