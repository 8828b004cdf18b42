//! Per-field parameter rules and the validator that checks them.
//!
//! A rule set is a plain `Vec<FieldRule>`; [`validate`] evaluates every rule
//! and collects all violations instead of stopping at the first one.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::parameters::{Parameters, coerce_boolean, coerce_integer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Must be present and filled: not null, blank or an empty array.
    Required,
    /// Only validated when filled.
    Sometimes,
    /// Required when the named field is absent; otherwise only validated when present.
    RequiredWithout(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Any,
    Integer,
    String,
    Boolean,
    Array,
    /// Array whose elements are all integers.
    IntegerArray,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    pub field: &'static str,
    pub presence: Presence,
    pub kind: FieldType,
    /// Lower bound: value for integers, length for strings, size for arrays.
    pub min: Option<i64>,
    /// Upper bound, same units as `min`.
    pub max: Option<i64>,
    pub one_of: Option<&'static [&'static str]>,
}

impl FieldRule {
    fn new(field: &'static str, presence: Presence) -> Self {
        Self {
            field,
            presence,
            kind: FieldType::Any,
            min: None,
            max: None,
            one_of: None,
        }
    }

    pub fn required(field: &'static str) -> Self {
        Self::new(field, Presence::Required)
    }

    pub fn sometimes(field: &'static str) -> Self {
        Self::new(field, Presence::Sometimes)
    }

    pub fn required_without(field: &'static str, other: &'static str) -> Self {
        Self::new(field, Presence::RequiredWithout(other))
    }

    pub fn integer(self) -> Self {
        Self { kind: FieldType::Integer, ..self }
    }

    pub fn string(self) -> Self {
        Self { kind: FieldType::String, ..self }
    }

    pub fn boolean(self) -> Self {
        Self { kind: FieldType::Boolean, ..self }
    }

    pub fn array(self) -> Self {
        Self { kind: FieldType::Array, ..self }
    }

    pub fn integer_array(self) -> Self {
        Self { kind: FieldType::IntegerArray, ..self }
    }

    pub fn min(self, min: i64) -> Self {
        Self { min: Some(min), ..self }
    }

    pub fn max(self, max: i64) -> Self {
        Self { max: Some(max), ..self }
    }

    pub fn between(self, min: i64, max: i64) -> Self {
        self.min(min).max(max)
    }

    pub fn one_of(self, values: &'static [&'static str]) -> Self {
        Self { one_of: Some(values), ..self }
    }
}

/// Violations keyed by field, in field order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, thiserror::Error)]
#[serde(transparent)]
#[error("{} field(s) failed validation", .0.len())]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Checks `params` against every rule and reports all violations.
pub fn validate(params: &Parameters, rules: &[FieldRule]) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    for rule in rules {
        let Some(value) = params.filled(rule.field) else {
            check_missing(rule, params, &mut errors);
            continue;
        };

        if check_type(rule, value, &mut errors) {
            check_constraints(rule, value, &mut errors);
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn label(field: &str) -> String {
    field.replace('_', " ")
}

fn check_missing(rule: &FieldRule, params: &Parameters, errors: &mut ValidationErrors) {
    let name = label(rule.field);
    match rule.presence {
        Presence::Required => errors.add(rule.field, format!("The {name} field is required.")),
        Presence::RequiredWithout(other) if params.filled(other).is_none() => errors.add(
            rule.field,
            format!("The {name} field is required when {} is not present.", label(other)),
        ),
        _ => {}
    }
}

/// Returns true when the value has the declared type.
fn check_type(rule: &FieldRule, value: &Value, errors: &mut ValidationErrors) -> bool {
    let name = label(rule.field);
    let message = match rule.kind {
        FieldType::Any => return true,
        FieldType::Integer if coerce_integer(value).is_none() => format!("The {name} must be an integer."),
        FieldType::String if !value.is_string() => format!("The {name} must be a string."),
        FieldType::Boolean if coerce_boolean(value).is_none() => {
            format!("The {name} field must be true or false.")
        }
        FieldType::Array | FieldType::IntegerArray if !value.is_array() => {
            format!("The {name} must be an array.")
        }
        FieldType::IntegerArray => {
            let mut valid = true;
            for (index, element) in value.as_array().into_iter().flatten().enumerate() {
                if coerce_integer(element).is_none() {
                    let key = format!("{}.{index}", rule.field);
                    let message = format!("The {name}.{index} must be an integer.");
                    errors.add(key, message);
                    valid = false;
                }
            }
            return valid;
        }
        _ => return true,
    };

    errors.add(rule.field, message);
    false
}

fn check_constraints(rule: &FieldRule, value: &Value, errors: &mut ValidationErrors) {
    let name = label(rule.field);

    let (size, unit) = match (rule.kind, value) {
        (FieldType::Integer, _) => (coerce_integer(value), ""),
        (_, Value::String(s)) => (Some(s.chars().count() as i64), " characters"),
        (_, Value::Array(items)) => (Some(items.len() as i64), " items"),
        _ => (coerce_integer(value), ""),
    };

    if let Some(size) = size {
        if let Some(min) = rule.min.filter(|min| size < *min) {
            errors.add(rule.field, format!("The {name} must be at least {min}{unit}."));
        }
        if let Some(max) = rule.max.filter(|max| size > *max) {
            errors.add(rule.field, format!("The {name} may not be greater than {max}{unit}."));
        }
    }

    if let Some(allowed) = rule.one_of {
        let matches = value.as_str().is_some_and(|v| allowed.contains(&v));
        if !matches {
            errors.add(rule.field, format!("The selected {name} is invalid."));
        }
    }
}
