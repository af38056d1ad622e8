use crate::{
    error::{Error, JsonError},
    factory::EventFactory,
    types::{Event, FieldMap},
};
use serde_json::Value;
use std::sync::Arc;
use tracing::trace;

/// A JSON payload parser producing events through an [`EventFactory`].
#[derive(Debug, Clone)]
pub struct JsonParser {
    factory: Arc<dyn EventFactory>,
}

impl JsonParser {
    pub fn new(factory: Arc<dyn EventFactory>) -> Self {
        Self { factory }
    }

    pub fn factory(&self) -> &Arc<dyn EventFactory> {
        &self.factory
    }

    pub fn parse(&self, json: &str) -> Result<Vec<Event>, Error> {
        events_from_json(json, self.factory.as_ref())
    }

    /// Same as [`JsonParser::parse`] for UTF-8 encoded bytes.
    pub fn parse_slice(&self, json: &[u8]) -> Result<Vec<Event>, Error> {
        if is_blank(json) {
            return Ok(Vec::new());
        }
        let value = serde_json::from_slice(json).map_err(JsonError::from)?;
        events_from_value(value, self.factory.as_ref())
    }
}

/// Decodes a JSON object, or an array of objects, into events.
///
/// Blank input yields no events. Anything else that is not an object or an
/// array of objects fails, and no events are returned for that input.
pub fn events_from_json(json: &str, factory: &dyn EventFactory) -> Result<Vec<Event>, Error> {
    if is_blank(json.as_bytes()) {
        return Ok(Vec::new());
    }
    let value = serde_json::from_str(json).map_err(JsonError::from)?;
    events_from_value(value, factory)
}

fn events_from_value(value: Value, factory: &dyn EventFactory) -> Result<Vec<Event>, Error> {
    let events = match value {
        Value::Object(data) => vec![factory.new_event(data)?],
        Value::Array(items) => {
            let objects = items
                .into_iter()
                .map(|item| match item {
                    Value::Object(data) => Ok(data),
                    other => Err(JsonError::UnexpectedType {
                        expected: "object",
                        found: json_type(&other),
                    }),
                })
                .collect::<Result<Vec<FieldMap>, _>>()?;
            objects
                .into_iter()
                .map(|data| factory.new_event(data))
                .collect::<Result<Vec<_>, _>>()?
        }
        other => {
            return Err(JsonError::UnexpectedType {
                expected: "object or array of objects",
                found: json_type(&other),
            }
            .into())
        }
    };
    trace!(events = events.len(), "Decoded JSON payload");
    Ok(events)
}

/// Only JSON whitespace (space, tab, CR, LF) counts as blank.
fn is_blank(json: &[u8]) -> bool {
    json.iter().all(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
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
