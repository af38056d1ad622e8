use crate::error::Error;
use chrono::{DateTime, SecondsFormat, Utc};
use derive_more::{Display, From, Into};
use serde_json::Value;

pub use event::Event;
pub use field_ref::FieldRef;

pub mod event;
pub mod field_ref;

/// Insertion-ordered field mapping of an event.
pub type FieldMap = serde_json::Map<String, Value>;

/// The event timestamp field.
pub const TIMESTAMP: &str = "@timestamp";

/// The event metadata field, never serialized with normal output.
pub const METADATA: &str = "@metadata";

pub const TAGS: &str = "tags";

/// Set by the normalizing event factory when an event is first created.
pub const EVENT_CREATED: &str = "event.created";

/// Tag added to events built from data carrying an unparseable `@timestamp`.
pub const TIMESTAMP_FAILURE_TAG: &str = "_timestampparsefailure";

/// Field holding the raw `@timestamp` value that failed to parse.
pub const TIMESTAMP_FAILURE_FIELD: &str = "_@timestamp";

/// Leading character of every internal field name.
pub const INTERNAL_MARKER: char = '@';

/// Returns true if the reference addresses an internal field (`@timestamp`, `@metadata`, ...).
///
/// Internal references are never relocated into a namespace.
pub fn is_internal_reference(reference: &str) -> bool {
    reference.starts_with(INTERNAL_MARKER) || reference.starts_with("[@")
}

/// Wall-clock instant of an event, displayed as RFC 3339 with millisecond precision.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, From, Into)]
#[display("{}", _0.to_rfc3339_opts(SecondsFormat::Millis, true))]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn parse(s: &str) -> Result<Self, Error> {
        DateTime::parse_from_rfc3339(s.trim())
            .map(|t| Self(t.with_timezone(&Utc)))
            .map_err(|_| Error::InvalidTimestamp(s.to_owned()))
    }

    /// Only string values are accepted.
    pub fn from_value(value: &Value) -> Result<Self, Error> {
        match value {
            Value::String(s) => Self::parse(s),
            other => Err(Error::InvalidTimestamp(other.to_string())),
        }
    }

    pub fn to_value(&self) -> Value {
        Value::String(self.to_string())
    }

    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }
}

/// The field-access contract shared by raw events and namespace-targeted views.
pub trait EventLike {
    /// Returns a copy of the value at `reference`, if present.
    fn get(&self, reference: &str) -> Result<Option<Value>, Error>;

    fn set(&mut self, reference: &str, value: Value) -> Result<(), Error>;

    fn includes(&self, reference: &str) -> Result<bool, Error>;

    /// Removes and returns the value at `reference`.
    fn remove(&mut self, reference: &str) -> Result<Option<Value>, Error>;

    /// Merges the data of `other` into this event, the last write wins on conflicting leaves.
    fn append(&mut self, other: &Event) -> Result<&mut Self, Error>
    where
        Self: Sized;

    /// Replaces the whole content with that of `other`.
    fn overwrite(&mut self, other: &Event) -> &mut Self
    where
        Self: Sized;

    fn cancel(&mut self);

    fn uncancel(&mut self);

    fn is_cancelled(&self) -> bool;

    fn timestamp(&self) -> Timestamp;

    fn set_timestamp(&mut self, timestamp: Timestamp);

    /// Adds `tag` to the `tags` field unless already present.
    fn tag(&mut self, tag: &str);

    /// Event data including `@timestamp`, excluding `@metadata`.
    fn to_map(&self) -> FieldMap;

    fn to_map_with_metadata(&self) -> FieldMap;

    fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string(&self.to_map()).map_err(|e| crate::error::JsonError::Syntax(e).into())
    }

    /// Substitutes `%{field}` and `%{+strftime}` placeholders.
    fn sprintf(&self, format: &str) -> Result<String, Error>;

    /// Returns an owned copy of the underlying event.
    fn snapshot(&self) -> Event;
}
