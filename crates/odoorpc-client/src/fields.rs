//! Client-side field checks against `fields_get` metadata
//!
//! A [`FieldMapper`] wraps the decoded `fields_get` result of one model. It
//! can reject a record before it is sent ([`FieldMapper::validate_record`])
//! and coerce loosely typed input into the shapes the backend expects
//! ([`FieldMapper::transform_record`]). Nothing here talks to the network.
//!
//! Dates travel as `YYYY-MM-DD` strings and datetimes as
//! `YYYY-MM-DD HH:MM:SS` strings.

use chrono::{NaiveDate, NaiveDateTime};
use odoorpc_common::protocol::error::{Result, RpcError};
use odoorpc_common::protocol::{Struct, Value};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const ISO8601_FORMAT: &str = "%Y%m%dT%H:%M:%S";
const ISO8601_TAG: &str = "dateTime.iso8601";

/// Field metadata of one model, keyed by field name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMapper {
    fields: Struct,
}

impl FieldMapper {
    pub fn new(fields: Struct) -> Self {
        Self { fields }
    }

    /// Metadata of one field (`type`, `required`, `readonly`, `selection`, ...)
    pub fn field_info(&self, name: &str) -> Option<&Struct> {
        self.fields.get(name).and_then(Value::as_struct)
    }

    pub fn field_type(&self, name: &str) -> Option<&str> {
        self.field_info(name)
            .and_then(|info| info.get("type"))
            .and_then(Value::as_str)
    }

    pub fn required_fields(&self) -> Vec<&str> {
        self.fields_with_flag("required")
    }

    pub fn readonly_fields(&self) -> Vec<&str> {
        self.fields_with_flag("readonly")
    }

    fn fields_with_flag(&self, flag: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(_, info)| is_flag_set(info.get(flag)))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Every problem found in `record`, one message per field
    pub fn record_errors(&self, record: &Struct) -> Vec<String> {
        let mut errors = Vec::new();

        for (name, value) in record {
            let Some(info) = self.field_info(name) else {
                errors.push(format!("Unknown field: {name}"));
                continue;
            };

            if is_flag_set(info.get("readonly")) {
                errors.push(format!("Field {name} is readonly"));
                continue;
            }

            if is_flag_set(info.get("required")) && is_blank(value) {
                errors.push(format!("Field {name} is required"));
                continue;
            }

            if let Some(error) = type_error(name, value, info) {
                errors.push(error);
            }
        }

        errors
    }

    /// Checks `record` before it is written
    ///
    /// # Errors
    ///
    /// A `Validation` error whose sub-messages name each offending field.
    pub fn validate_record(&self, record: &Struct) -> Result<()> {
        let errors = self.record_errors(record);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(RpcError::validation(
                format!("Validation error: {} invalid field(s)", errors.len()),
                errors,
            ))
        }
    }

    /// Coerces values to their field types
    ///
    /// Numeric and boolean strings are parsed, and `dateTime.iso8601`
    /// values are rendered in the backend's date/datetime string form.
    /// Unknown fields, `Nil` and values that do not parse pass through
    /// unchanged.
    pub fn transform_record(&self, record: Struct) -> Struct {
        record
            .into_iter()
            .map(|(name, value)| {
                let value = match self.field_type(&name) {
                    Some(field_type) => transform_value(field_type, value),
                    None => value,
                };
                (name, value)
            })
            .collect()
    }
}

fn is_flag_set(flag: Option<&Value>) -> bool {
    matches!(flag, Some(Value::Bool(true)))
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Nil => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn is_integer(value: &Value) -> bool {
    match value {
        Value::Int(_) => true,
        Value::Double(d) => d.is_finite() && d.fract() == 0.0,
        _ => false,
    }
}

fn is_date(value: &Value) -> bool {
    value.as_str().is_some_and(|s| {
        NaiveDate::parse_from_str(s, DATE_FORMAT)
            .is_ok_and(|date| date.format(DATE_FORMAT).to_string() == s)
    })
}

fn is_datetime(value: &Value) -> bool {
    value.as_str().is_some_and(|s| {
        NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
            .is_ok_and(|dt| dt.format(DATETIME_FORMAT).to_string() == s)
    })
}

/// Allowed keys of a selection field: the first element of each pair
fn selection_keys(info: &Struct) -> Option<Vec<&Value>> {
    let pairs = info.get("selection")?.as_array()?;
    Some(
        pairs
            .iter()
            .filter_map(|pair| pair.as_array().and_then(|p| p.first()))
            .collect(),
    )
}

fn selection_label(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Int(i) => i.to_string(),
        other => format!("{other:?}"),
    }
}

fn type_error(name: &str, value: &Value, info: &Struct) -> Option<String> {
    if value.is_nil() {
        return None;
    }

    let field_type = info.get("type").and_then(Value::as_str).unwrap_or_default();
    let message = match field_type {
        "char" | "text" | "html" if value.as_str().is_none() => "must be a string".to_string(),
        "integer" if !is_integer(value) => "must be an integer".to_string(),
        "float" | "monetary" if value.as_f64().is_none() => "must be a number".to_string(),
        "boolean" if value.as_bool().is_none() => "must be a boolean".to_string(),
        "date" if !is_date(value) => "must be a valid date (YYYY-MM-DD)".to_string(),
        "datetime" if !is_datetime(value) => {
            "must be a valid datetime (YYYY-MM-DD HH:MM:SS)".to_string()
        }
        "selection" => {
            let keys = selection_keys(info)?;
            if keys.contains(&value) {
                return None;
            }
            let listed: Vec<String> = keys.iter().map(|k| selection_label(k)).collect();
            format!("must be one of: {}", listed.join(", "))
        }
        "many2one" => match value {
            _ if is_integer(value) => return None,
            Value::Array(pair) => {
                let well_formed =
                    pair.len() == 2 && is_integer(&pair[0]) && pair[1].as_str().is_some();
                if well_formed {
                    return None;
                }
                "array must be [ID, name] format".to_string()
            }
            _ => "must be an integer (ID) or array [ID, name]".to_string(),
        },
        "one2many" | "many2many" => match value {
            Value::Array(items) => {
                let valid = items
                    .iter()
                    .all(|item| is_integer(item) || matches!(item, Value::Array(_)));
                if valid {
                    return None;
                }
                "array items must be integers (IDs) or command arrays".to_string()
            }
            _ => "must be an array".to_string(),
        },
        "binary" if value.as_str().is_none() => "must be a base64 encoded string".to_string(),
        _ => return None,
    };

    Some(format!("Field {name} {message}"))
}

fn transform_value(field_type: &str, value: Value) -> Value {
    match (field_type, value) {
        (_, Value::Nil) => Value::Nil,
        ("integer", Value::String(s)) => match s.trim().parse::<i64>() {
            Ok(i) => Value::Int(i),
            Err(_) => Value::String(s),
        },
        ("float" | "monetary", Value::String(s)) => match s.trim().parse::<f64>() {
            Ok(d) => Value::Double(d),
            Err(_) => Value::String(s),
        },
        ("boolean", value) => Value::Bool(truthy(&value)),
        ("date", Value::Opaque { tag, text }) if tag == ISO8601_TAG => {
            match NaiveDateTime::parse_from_str(text.trim(), ISO8601_FORMAT) {
                Ok(dt) => Value::String(dt.format(DATE_FORMAT).to_string()),
                Err(_) => Value::Opaque { tag, text },
            }
        }
        ("datetime", Value::Opaque { tag, text }) if tag == ISO8601_TAG => {
            match NaiveDateTime::parse_from_str(text.trim(), ISO8601_FORMAT) {
                Ok(dt) => Value::String(dt.format(DATETIME_FORMAT).to_string()),
                Err(_) => Value::Opaque { tag, text },
            }
        }
        (_, value) => value,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Nil => false,
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Double(d) => *d != 0.0 && !d.is_nan(),
        Value::String(s) => s.eq_ignore_ascii_case("true") || s == "1",
        Value::Array(_) | Value::Struct(_) => true,
        Value::Opaque { text, .. } => !text.is_empty(),
    }
}
