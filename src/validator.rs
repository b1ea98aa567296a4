//! Parameter validators handed to compiled routes.
//!
//! The route compiler merges path-level and operation-level parameters into a
//! [`ParameterMap`] and asks a [`ValidatorFactory`] for an ordered list of
//! [`ParameterValidator`]s. The stock factory, [`SchemaValidatorFactory`],
//! compiles each parameter's schema with `jsonschema`.
//!
//! Raw request values arrive as strings for every location except `body`.
//! Validation coerces them to the declared `type` first, so `?limit=10`
//! satisfies `type: integer` and is handed on as the number `10`.

use crate::compile::RouteDraft;
use crate::spec::{Parameter, ParameterLocation};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::sync::Arc;
use tracing::warn;

/// One problem found while checking a description or a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub location: String,
    pub kind: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(
        location: impl Into<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ValidationIssue {
            location: location.into(),
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.location, self.message)
    }
}

/// Print issues to stderr in the `check` command's format.
pub fn print_issues(issues: &[ValidationIssue]) {
    eprintln!("\n❌ API description check failed. {} issue(s) found:\n", issues.len());
    for issue in issues {
        eprintln!("{issue}");
    }
    eprintln!();
}

/// Merge key for parameters: (location, name).
pub type ParameterKey = (ParameterLocation, String);

/// Merged parameters of one route, in merge order.
pub type ParameterMap = IndexMap<ParameterKey, Parameter>;

/// A compiled check over a single, already coerced value.
pub type ValueCheck = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// Validator for one declared parameter.
#[derive(Clone)]
pub struct ParameterValidator {
    pub parameter: Parameter,
    check: Option<ValueCheck>,
}

impl ParameterValidator {
    /// Validator that only enforces `required` and `default`.
    #[must_use]
    pub fn presence(parameter: Parameter) -> Self {
        ParameterValidator {
            parameter,
            check: None,
        }
    }

    #[must_use]
    pub fn with_check(parameter: Parameter, check: ValueCheck) -> Self {
        ParameterValidator {
            parameter,
            check: Some(check),
        }
    }

    /// Whether a value check is attached beyond presence.
    #[must_use]
    pub fn has_check(&self) -> bool {
        self.check.is_some()
    }

    /// Validate a raw request value.
    ///
    /// Returns the coerced value, the declared default when the value is
    /// absent, or `None` for an absent optional parameter.
    ///
    /// # Errors
    ///
    /// `MissingParameter` for an absent required parameter without default,
    /// `InvalidParameter` when the value fails the check.
    pub fn validate(&self, value: Option<&Value>) -> Result<Option<Value>, ValidationIssue> {
        let Some(value) = value else {
            if let Some(default) = &self.parameter.default {
                return Ok(Some(default.clone()));
            }
            if self.parameter.required {
                return Err(ValidationIssue::new(
                    self.parameter.label(),
                    "MissingParameter",
                    format!("required parameter `{}` is missing", self.parameter.name),
                ));
            }
            return Ok(None);
        };

        let value = if self.parameter.location == ParameterLocation::Body {
            value.clone()
        } else {
            coerce(&self.parameter, value)
        };

        if let Some(check) = &self.check {
            check(&value).map_err(|message| {
                ValidationIssue::new(self.parameter.label(), "InvalidParameter", message)
            })?;
        }
        Ok(Some(value))
    }
}

impl std::fmt::Debug for ParameterValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterValidator")
            .field("parameter", &self.parameter.label())
            .field("check", &self.check.is_some())
            .finish()
    }
}

/// Validators compare by the parameter they were built for.
impl PartialEq for ParameterValidator {
    fn eq(&self, other: &Self) -> bool {
        self.parameter == other.parameter
    }
}

/// The validator aggregator consulted for every route.
pub trait ValidatorFactory {
    fn make_all(&self, parameters: &ParameterMap, route: &RouteDraft) -> Vec<ParameterValidator>;
}

impl<F> ValidatorFactory for F
where
    F: Fn(&ParameterMap, &RouteDraft) -> Vec<ParameterValidator>,
{
    fn make_all(&self, parameters: &ParameterMap, route: &RouteDraft) -> Vec<ParameterValidator> {
        self(parameters, route)
    }
}

/// Factory compiling parameter schemas with `jsonschema`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidatorFactory;

/// Inline keywords carried over from a non-body parameter into its schema.
const SCHEMA_KEYWORDS: [&str; 11] = [
    "maximum",
    "minimum",
    "exclusiveMaximum",
    "exclusiveMinimum",
    "maxLength",
    "minLength",
    "pattern",
    "maxItems",
    "minItems",
    "uniqueItems",
    "multipleOf",
];

/// JSON Schema for a parameter, or `None` when nothing beyond presence can
/// be checked.
#[must_use]
pub fn parameter_schema(parameter: &Parameter) -> Option<Value> {
    if parameter.location == ParameterLocation::Body {
        return parameter.schema.clone();
    }

    let kind = parameter.kind.as_deref();
    if kind == Some("file") {
        return None;
    }

    let mut schema = Map::new();
    if let Some(kind) = kind {
        schema.insert("type".into(), Value::String(kind.to_string()));
    }
    if let Some(items) = &parameter.items {
        schema.insert("items".into(), items.clone());
    }
    if let Some(allowed) = &parameter.allowed {
        schema.insert("enum".into(), Value::Array(allowed.clone()));
    }
    for keyword in SCHEMA_KEYWORDS {
        if let Some(v) = parameter.constraints.get(keyword) {
            schema.insert(keyword.to_string(), v.clone());
        }
    }
    exclusive_bound(&mut schema, "exclusiveMaximum", "maximum");
    exclusive_bound(&mut schema, "exclusiveMinimum", "minimum");

    (!schema.is_empty()).then_some(Value::Object(schema))
}

/// Swagger 2 spells exclusive bounds as a boolean next to the bound.
fn exclusive_bound(schema: &mut Map<String, Value>, exclusive: &str, bound: &str) {
    match schema.get(exclusive) {
        Some(Value::Bool(true)) => {
            if let Some(limit) = schema.remove(bound) {
                schema.insert(exclusive.to_string(), limit);
            } else {
                schema.remove(exclusive);
            }
        }
        Some(Value::Bool(false)) => {
            schema.remove(exclusive);
        }
        _ => {}
    }
}

impl ValidatorFactory for SchemaValidatorFactory {
    fn make_all(&self, parameters: &ParameterMap, route: &RouteDraft) -> Vec<ParameterValidator> {
        parameters
            .values()
            .map(|parameter| {
                let Some(schema) = parameter_schema(parameter) else {
                    return ParameterValidator::presence(parameter.clone());
                };
                match jsonschema::validator_for(&schema) {
                    Ok(compiled) => {
                        let check: ValueCheck = Arc::new(move |value: &Value| {
                            let errors: Vec<String> =
                                compiled.iter_errors(value).map(|e| e.to_string()).collect();
                            if errors.is_empty() {
                                Ok(())
                            } else {
                                Err(errors.join("; "))
                            }
                        });
                        ParameterValidator::with_check(parameter.clone(), check)
                    }
                    Err(e) => {
                        warn!(
                            path = %route.path,
                            method = %route.method,
                            parameter = %parameter.label(),
                            error = %e,
                            "Parameter schema does not compile; checking presence only"
                        );
                        ParameterValidator::presence(parameter.clone())
                    }
                }
            })
            .collect()
    }
}

fn separator(collection_format: Option<&str>) -> char {
    match collection_format {
        Some("ssv") => ' ',
        Some("tsv") => '\t',
        Some("pipes") => '|',
        _ => ',',
    }
}

fn coerce_scalar(kind: Option<&str>, raw: &str) -> Value {
    let parsed = match kind {
        Some("integer") => raw.parse::<i64>().ok().map(Value::from),
        Some("number") => raw
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        Some("boolean") => match raw {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    };
    parsed.unwrap_or_else(|| Value::String(raw.to_string()))
}

/// Convert a raw string to the parameter's declared type. Values that do
/// not parse are left as strings for the schema check to reject.
fn coerce(parameter: &Parameter, value: &Value) -> Value {
    let Value::String(raw) = value else {
        return value.clone();
    };
    match parameter.kind.as_deref() {
        Some("array") => {
            let item_kind = parameter
                .items
                .as_ref()
                .and_then(|items| items.get("type"))
                .and_then(Value::as_str);
            let sep = separator(parameter.collection_format.as_deref());
            Value::Array(
                raw.split(sep)
                    .map(|item| coerce_scalar(item_kind, item))
                    .collect(),
            )
        }
        kind => coerce_scalar(kind, raw),
    }
}
