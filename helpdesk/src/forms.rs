//! Schema-driven form validation
//!
//! Every create/edit form is described by a [`FormSchema`]: a list of
//! fields and the rules each must satisfy. A schema validates any
//! serializable draft, so one validator serves every entity.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// A single validation rule applied to one field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Present and, for strings, not blank
    Required,
    MinLength(usize),
    MaxLength(usize),
    /// Looks like an email address (local@domain.tld)
    Email,
    /// A numeric identifier greater than zero
    PositiveId,
}

/// Field description within a schema
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub rules: &'static [Rule],
}

/// Validation description of one entity form
#[derive(Debug, Clone, Copy)]
pub struct FormSchema {
    pub entity: &'static str,
    pub fields: &'static [FieldSpec],
}

/// A field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// All field errors collected during one submission
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// First message recorded for a field, if any
    pub fn for_field(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    /// Ok when nothing was recorded
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl FormSchema {
    /// Validate a draft against this schema
    pub fn validate<T: Serialize>(&self, draft: &T) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let value = match serde_json::to_value(draft) {
            Ok(value) => value,
            Err(e) => {
                errors.add(self.entity, format!("Could not read form: {}", e));
                return Err(errors);
            }
        };

        for field in self.fields {
            let field_value = value.get(field.name).unwrap_or(&Value::Null);
            if let Some(message) = check_field(field, field_value) {
                errors.add(field.name, message);
            }
        }

        errors.into_result()
    }
}

/// Returns the first failing rule's message
fn check_field(field: &FieldSpec, value: &Value) -> Option<String> {
    let present = match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    };

    for rule in field.rules {
        match rule {
            Rule::Required => {
                if !present {
                    return Some(format!("{} is required", field.label));
                }
            }
            // Optional fields skip the remaining rules when empty
            _ if !present => return None,
            Rule::MinLength(min) => {
                if let Value::String(s) = value {
                    if s.trim().chars().count() < *min {
                        return Some(format!(
                            "{} must be at least {} characters",
                            field.label, min
                        ));
                    }
                }
            }
            Rule::MaxLength(max) => {
                if let Value::String(s) = value {
                    if s.chars().count() > *max {
                        return Some(format!(
                            "{} must be at most {} characters",
                            field.label, max
                        ));
                    }
                }
            }
            Rule::Email => {
                let ok = value.as_str().map(is_email).unwrap_or(false);
                if !ok {
                    return Some(format!("{} must be a valid email address", field.label));
                }
            }
            Rule::PositiveId => {
                let ok = value.as_i64().map(|id| id > 0).unwrap_or(false);
                if !ok {
                    return Some(format!("{} must be selected", field.label));
                }
            }
        }
    }

    None
}

fn is_email(s: &str) -> bool {
    let s = s.trim();
    match s.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .map(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
                    .unwrap_or(false)
                && !s.contains(char::is_whitespace)
        }
        None => false,
    }
}
