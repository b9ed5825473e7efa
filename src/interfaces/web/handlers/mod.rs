pub mod agent;
pub mod callback;
pub mod system;

use axum::body::Bytes;
use serde_json::{Map, Value};

use crate::core::requests::ValidationErrors;

/// Top-level fields of a JSON object body, decoded regardless of the
/// declared content type. Type mismatches are collected per field.
struct JsonFields {
    object: Map<String, Value>,
    errors: ValidationErrors,
}

impl JsonFields {
    fn decode(body: &Bytes) -> Result<Self, ValidationErrors> {
        match serde_json::from_slice(body) {
            Ok(Value::Object(object)) => Ok(Self {
                object,
                errors: ValidationErrors::default(),
            }),
            Ok(_) => Err(ValidationErrors::single("body", "must be a JSON object")),
            Err(e) => Err(ValidationErrors::single("body", e.to_string())),
        }
    }

    /// Missing and `null` both read as absent.
    fn text(&mut self, field: &str) -> Option<String> {
        match self.object.remove(field) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(_) => {
                self.errors.push(field, "must be a string");
                None
            }
        }
    }

    /// Combine type errors with the outcome of field validation. A field
    /// with the wrong type is reported once, as a type error.
    fn finish<T>(self, parsed: Result<T, ValidationErrors>) -> Result<T, ValidationErrors> {
        let mut errors = self.errors;
        match parsed {
            Ok(value) if errors.is_empty() => Ok(value),
            Ok(_) => Err(errors),
            Err(rest) => {
                errors.merge(rest);
                Err(errors)
            }
        }
    }
}
