//! Request body validation.
//!
//! Write payloads are checked against the shape of the target table before
//! anything touches the database. Every problem is collected so the client
//! gets the full list in one response.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

use crate::types::{EntryInput, KeyKind, SpecialKind, Table};

/// A single problem with a request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

/// Parse a date written exactly as YYYY-MM-DD
pub fn parse_date(path: &str, raw: &str) -> Result<NaiveDate, ValidationIssue> {
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) if date.format("%Y-%m-%d").to_string() == raw => Ok(date),
        _ => Err(ValidationIssue::new(path, "Invalid date, expected YYYY-MM-DD")),
    }
}

/// Validate a natural key (a date or a special type) for `table`
pub fn validate_key(table: &Table, raw: &str) -> Result<String, ValidationIssue> {
    match table.key_kind {
        KeyKind::Date => parse_date(table.key, raw).map(|_| raw.to_string()),
        KeyKind::SpecialType => match SpecialKind::parse(raw) {
            Some(kind) => Ok(kind.as_str().to_string()),
            None => {
                let allowed: Vec<&str> = SpecialKind::ALL.iter().map(|k| k.as_str()).collect();
                Err(ValidationIssue::new(
                    table.key,
                    format!("Invalid type, expected one of: {}", allowed.join(", ")),
                ))
            }
        },
    }
}

/// Validate a JSON body against `table` and turn it into an upsert payload.
///
/// The key is required. Text fields may be strings or null (stored as an
/// empty string). Unknown keys, including `id`, are rejected.
pub fn validate_entry(
    table: &'static Table,
    body: &Value,
) -> Result<EntryInput, Vec<ValidationIssue>> {
    let Some(object) = body.as_object() else {
        return Err(vec![ValidationIssue::new(
            "",
            format!("Expected object, received {}", json_type(body)),
        )]);
    };

    let mut issues = Vec::new();

    let key = match object.get(table.key) {
        None | Some(Value::Null) => {
            issues.push(ValidationIssue::new(table.key, "Required"));
            None
        }
        Some(Value::String(raw)) => match validate_key(table, raw) {
            Ok(key) => Some(key),
            Err(issue) => {
                issues.push(issue);
                None
            }
        },
        Some(other) => {
            issues.push(ValidationIssue::new(
                table.key,
                format!("Expected string, received {}", json_type(other)),
            ));
            None
        }
    };

    let mut values = Vec::new();
    for (name, value) in object {
        if name == table.key {
            continue;
        }
        let Some(field) = table.field(name) else {
            issues.push(ValidationIssue::new(name, "Unrecognized key"));
            continue;
        };
        match value {
            Value::String(text) => values.push((field.name, text.clone())),
            Value::Null => values.push((field.name, String::new())),
            other => issues.push(ValidationIssue::new(
                name,
                format!("Expected string, received {}", json_type(other)),
            )),
        }
    }

    match key {
        Some(key) if issues.is_empty() => Ok(EntryInput { table, key, values }),
        _ => Err(issues),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
