// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! Structural validation of flight plan documents.
//!
//! Shapes are plain values composed from a handful of primitives, so each
//! historical record format is described once and checked by the same walker.
//! A check either succeeds or returns every failing field, not just the first.

use serde_json::Value;

use crate::error::FieldError;
use crate::plan::CURRENT_VERSION;

/// First format, written before legs carried an id.
pub const LEGACY_VERSION: u32 = 0;

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    String,
    /// A number, or `null` for a field the pilot left empty
    Number,
    /// A non-negative integer
    Integer,
    Boolean,
    Object(Vec<Field>),
    Elements(Box<Shape>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: &'static str,
    pub shape: Shape,
    pub optional: bool,
}

pub fn required(name: &'static str, shape: Shape) -> Field {
    Field {
        name,
        shape,
        optional: false,
    }
}

pub fn optional(name: &'static str, shape: Shape) -> Field {
    Field {
        name,
        shape,
        optional: true,
    }
}

fn child_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", parent, name)
    }
}

impl Shape {
    pub fn check(&self, value: &Value) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        self.collect(value, "", &mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn collect(&self, value: &Value, path: &str, errors: &mut Vec<FieldError>) {
        let matches = match self {
            Shape::String => value.is_string(),
            Shape::Number => value.is_number() || value.is_null(),
            Shape::Integer => value.is_u64(),
            Shape::Boolean => value.is_boolean(),
            Shape::Object(fields) => match value.as_object() {
                Some(object) => {
                    for field in fields {
                        let field_path = child_path(path, field.name);
                        match object.get(field.name) {
                            Some(inner) => field.shape.collect(inner, &field_path, errors),
                            None if field.optional => {}
                            None => errors.push(FieldError::new(field_path, "missing field")),
                        }
                    }
                    true
                }
                None => false,
            },
            Shape::Elements(element) => match value.as_array() {
                Some(items) => {
                    for (index, item) in items.iter().enumerate() {
                        element.collect(item, &format!("{}[{}]", path, index), errors);
                    }
                    true
                }
                None => false,
            },
        };

        if !matches {
            errors.push(FieldError::new(
                path,
                format!("expected {}, found {}", self.describe(), describe_value(value)),
            ));
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Shape::String => "a string",
            Shape::Number => "a number",
            Shape::Integer => "a non-negative integer",
            Shape::Boolean => "a boolean",
            Shape::Object(_) => "an object",
            Shape::Elements(_) => "an array",
        }
    }
}

fn describe_value(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn leg_shape(with_id: bool) -> Shape {
    let mut fields = Vec::with_capacity(6);
    if with_id {
        fields.push(required("id", Shape::String));
    }
    fields.extend([
        required("name", Shape::String),
        required(
            "alt",
            Shape::Object(vec![
                required("desired", Shape::Number),
                required("minimal", Shape::Number),
            ]),
        ),
        required("magneticRoute", Shape::Number),
        required("distance", Shape::Number),
        required(
            "wind",
            Shape::Object(vec![
                required("direction", Shape::Number),
                required("velocity", Shape::Number),
            ]),
        ),
    ]);
    Shape::Object(fields)
}

fn envelope(version: Field, leg: Shape) -> Shape {
    let airfield = || Shape::Object(vec![required("icao", Shape::String)]);
    Shape::Object(vec![
        version,
        required(
            "state",
            Shape::Object(vec![
                required(
                    "aircraft",
                    Shape::Object(vec![
                        required("registration", Shape::String),
                        required("cruiseSpeed", Shape::Number),
                    ]),
                ),
                required("departureAirfield", airfield()),
                required("arrivalAirfield", airfield()),
                required("date", Shape::String),
                required("legs", Shape::Elements(Box::new(leg))),
                required("hideWind", Shape::Boolean),
            ]),
        ),
    ])
}

/// Shape of a stored envelope for a given format version.
pub fn envelope_shape(version: u32) -> Option<Shape> {
    match version {
        // Records written before versioning may lack the field entirely
        LEGACY_VERSION => Some(envelope(
            optional("version", Shape::Integer),
            leg_shape(false),
        )),
        CURRENT_VERSION => Some(envelope(
            required("version", Shape::Integer),
            leg_shape(true),
        )),
        _ => None,
    }
}

/// Reads the envelope's `version`. A missing version means the legacy format.
pub fn declared_version(document: &Value) -> Result<u32, FieldError> {
    match document.get("version") {
        None => Ok(LEGACY_VERSION),
        Some(raw) => raw
            .as_u64()
            .and_then(|version| u32::try_from(version).ok())
            .ok_or_else(|| {
                FieldError::new(
                    "version",
                    format!("expected a non-negative integer, found {}", describe_value(raw)),
                )
            }),
    }
}

/// Checks a whole document against the shape of the version it declares.
/// Returns that version on success.
pub fn validate_document(document: &Value) -> Result<u32, Vec<FieldError>> {
    if !document.is_object() {
        return Err(vec![FieldError::new(
            "",
            format!("expected an object, found {}", describe_value(document)),
        )]);
    }

    let version = declared_version(document).map_err(|err| vec![err])?;
    let shape = envelope_shape(version).ok_or_else(|| {
        vec![FieldError::new(
            "version",
            format!(
                "unsupported version {} (this build reads {} to {})",
                version, LEGACY_VERSION, CURRENT_VERSION
            ),
        )]
    })?;
    shape.check(document)?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn legacy_document() -> Value {
        json!({
            "version": 0,
            "state": {
                "aircraft": { "registration": "F-GKQR", "cruiseSpeed": 95 },
                "departureAirfield": { "icao": "LFPN" },
                "arrivalAirfield": { "icao": "LFAQ" },
                "date": "Mon Oct 19 2026 10:00:00 GMT+0200 (CEST)",
                "legs": [
                    {
                        "name": "Rambouillet",
                        "alt": { "desired": 2500, "minimal": 1500 },
                        "magneticRoute": 213,
                        "distance": 12.5,
                        "wind": { "direction": 270, "velocity": 15 }
                    }
                ],
                "hideWind": false
            }
        })
    }

    #[test]
    fn test_legacy_document_is_valid() {
        assert_eq!(validate_document(&legacy_document()), Ok(LEGACY_VERSION));
    }

    #[test]
    fn test_current_version_requires_leg_ids() {
        let mut document = legacy_document();
        document["version"] = json!(1);

        let errors = validate_document(&document).unwrap_err();
        assert_eq!(errors, vec![FieldError::new("state.legs[0].id", "missing field")]);

        document["state"]["legs"][0]["id"] = json!("a1");
        assert_eq!(validate_document(&document), Ok(CURRENT_VERSION));
    }

    #[test]
    fn test_reports_every_failing_field() {
        let mut document = legacy_document();
        document["state"]
            .as_object_mut()
            .unwrap()
            .remove("legs");
        document["state"]["aircraft"]["cruiseSpeed"] = json!("fast");
        document["state"]["hideWind"] = json!(null);

        let errors = validate_document(&document).unwrap_err();
        let paths: Vec<&str> = errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            ["state.aircraft.cruiseSpeed", "state.legs", "state.hideWind"]
        );
    }

    #[test]
    fn test_null_numbers_are_empty_fields() {
        let mut document = legacy_document();
        document["state"]["legs"][0]["distance"] = json!(null);
        assert!(validate_document(&document).is_ok());
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let mut document = legacy_document();
        document["version"] = json!(7);
        let errors = validate_document(&document).unwrap_err();
        assert_eq!(errors[0].path, "version");

        document["version"] = json!(-1);
        let errors = validate_document(&document).unwrap_err();
        assert_eq!(errors[0].path, "version");
    }

    #[test]
    fn test_non_object_document() {
        let errors = validate_document(&json!([1, 2])).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "");
    }

    #[test]
    fn test_element_errors_are_indexed() {
        let mut document = legacy_document();
        let first = document["state"]["legs"][0].clone();
        document["state"]["legs"] = json!([first, "oops"]);
        let errors = validate_document(&document).unwrap_err();
        assert_eq!(errors[0].path, "state.legs[1]");
    }
}
