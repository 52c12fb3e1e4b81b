//! Request validation for `/predict`.
//!
//! Works on a raw `serde_json::Value` rather than a typed extractor so every
//! rejection names the offending field.

use preservion_core::{PipelineError, SensorReading};
use serde_json::{Map, Value};

/// Parse and validate a request body into a [`SensorReading`].
pub fn parse_reading(body: &[u8]) -> Result<SensorReading, PipelineError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| PipelineError::invalid("body", format!("not valid JSON ({e})")))?;
    let obj = value
        .as_object()
        .ok_or_else(|| PipelineError::invalid("body", "expected a JSON object"))?;

    let reading = SensorReading {
        temperature: number(obj, "temperature")?,
        humidity: number(obj, "humidity")?,
        ethylene: number(obj, "ethylene")?,
        co2: number(obj, "co2")?,
        onion_type: text(obj, "onion_type")?,
    };
    reading.validate()?;
    Ok(reading)
}

/// JSON numbers and numeric strings are both accepted.
fn number(obj: &Map<String, Value>, field: &str) -> Result<f64, PipelineError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(PipelineError::invalid(field, "is required")),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| PipelineError::invalid(field, "is not representable as a number")),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| PipelineError::invalid(field, format!("'{s}' is not a number"))),
        Some(_) => Err(PipelineError::invalid(field, "must be a number")),
    }
}

fn text(obj: &Map<String, Value>, field: &str) -> Result<String, PipelineError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(PipelineError::invalid(field, "is required")),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(PipelineError::invalid(field, "must be a string")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// The reference reading with `field` replaced (or removed when `None`).
    fn body_with(field: &str, value: Option<Value>) -> Vec<u8> {
        let mut body = json!({
            "temperature": 18,
            "humidity": 80,
            "ethylene": 3.2,
            "co2": 620,
            "onion_type": "red"
        });
        let obj = body.as_object_mut().unwrap();
        match value {
            Some(v) => obj.insert(field.to_string(), v),
            None => obj.remove(field),
        };
        serde_json::to_vec(&body).unwrap()
    }

    fn field_of(err: PipelineError) -> String {
        match err {
            PipelineError::InvalidInput { field, .. } => field,
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    fn rejected_field(field: &str, value: Option<Value>) -> String {
        field_of(parse_reading(&body_with(field, value)).unwrap_err())
    }

    #[test]
    fn parses_numbers_and_numeric_strings() {
        let mut body: Value =
            serde_json::from_slice(&body_with("humidity", Some(json!("80")))).unwrap();
        body["onion_type"] = json!("Red");
        let r = parse_reading(&serde_json::to_vec(&body).unwrap()).unwrap();
        assert_eq!(r.temperature, 18.0);
        assert_eq!(r.humidity, 80.0);
        assert_eq!(r.onion_type, "Red");
    }

    #[test]
    fn missing_field_named() {
        assert_eq!(rejected_field("co2", None), "co2");
    }

    #[test]
    fn null_field_is_missing() {
        assert_eq!(rejected_field("temperature", Some(Value::Null)), "temperature");
    }

    #[test]
    fn non_numeric_rejected() {
        assert_eq!(rejected_field("humidity", Some(json!("damp"))), "humidity");
        assert_eq!(rejected_field("ethylene", Some(json!([3.2]))), "ethylene");
    }

    #[test]
    fn non_finite_string_rejected() {
        assert_eq!(rejected_field("temperature", Some(json!("inf"))), "temperature");
    }

    #[test]
    fn onion_type_must_be_string() {
        assert_eq!(rejected_field("onion_type", Some(json!(2))), "onion_type");
    }

    #[test]
    fn malformed_body_rejected() {
        assert_eq!(field_of(parse_reading(b"{not json").unwrap_err()), "body");
        assert_eq!(field_of(parse_reading(b"[1, 2]").unwrap_err()), "body");
    }
}
