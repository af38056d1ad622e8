use crate::{
    error::Error,
    types::{
        EventLike, FieldMap, FieldRef, Timestamp, METADATA, TAGS, TIMESTAMP,
        TIMESTAMP_FAILURE_FIELD, TIMESTAMP_FAILURE_TAG,
    },
};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use regex::{Captures, Regex};
use serde_json::Value;
use std::{
    fmt::{self, Write},
    sync::LazyLock,
};
use tracing::warn;

// `%{field}` or `%{+strftime}`
#[allow(clippy::expect_used)]
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%\{([^}]*)\}").expect("constant regex pattern is valid"));

/// A structured pipeline event.
///
/// Ordinary fields live in an insertion-ordered nested mapping, next to the
/// `@timestamp`, the `@metadata` side channel and a cancellation flag.
#[derive(Clone, PartialEq, Debug)]
pub struct Event {
    data: FieldMap,
    metadata: FieldMap,
    timestamp: Timestamp,
    cancelled: bool,
}

impl Event {
    pub fn new() -> Self {
        Self::with_timestamp(Timestamp::now())
    }

    /// An event without any data, stamped with `timestamp`.
    pub fn with_timestamp(timestamp: Timestamp) -> Self {
        Self {
            data: FieldMap::new(),
            metadata: FieldMap::new(),
            timestamp,
            cancelled: false,
        }
    }

    /// Builds an event from an initial mapping, keys are stored literally.
    ///
    /// An unparseable `@timestamp` does not fail construction: the event is
    /// stamped with the current time, keeps the raw value in `_@timestamp`
    /// and gets tagged `_timestampparsefailure`.
    pub fn from_map(mut data: FieldMap) -> Self {
        let mut timestamp_failure = false;
        let timestamp = match data.shift_remove(TIMESTAMP) {
            None => Timestamp::now(),
            Some(raw) => match Timestamp::from_value(&raw) {
                Ok(ts) => ts,
                Err(e) => {
                    warn!(error = %e, "Unparseable @timestamp, falling back to the current time");
                    data.insert(TIMESTAMP_FAILURE_FIELD.to_owned(), raw);
                    timestamp_failure = true;
                    Timestamp::now()
                }
            },
        };

        let metadata = match data.shift_remove(METADATA) {
            None => FieldMap::new(),
            Some(Value::Object(m)) => m,
            Some(other) => {
                warn!(value = %other, "Dropping @metadata that is not an object");
                FieldMap::new()
            }
        };

        let mut event = Self {
            data,
            metadata,
            timestamp,
            cancelled: false,
        };
        if timestamp_failure {
            event.tag(TIMESTAMP_FAILURE_TAG);
        }
        event
    }

    /// Ordinary fields, without `@timestamp` and `@metadata`.
    pub fn data(&self) -> &FieldMap {
        &self.data
    }

    pub fn metadata(&self) -> &FieldMap {
        &self.metadata
    }

    /// Writes a top-level field without parsing `key` as a reference.
    pub(crate) fn insert_field(&mut self, key: &str, value: Value) {
        self.data.insert(key.to_owned(), value);
    }

    /// The text of a `%{...}` placeholder body, `None` for a missing field.
    fn placeholder(&self, key: &str) -> Result<Option<String>, Error> {
        if let Some(pattern) = key.strip_prefix('+') {
            let ts: DateTime<Utc> = self.timestamp.into();
            let mut out = String::new();
            let res = if pattern == "s" {
                write!(out, "{}", ts.timestamp())
            } else {
                write!(out, "{}", ts.format(pattern))
            };
            return res
                .map(|_| Some(out))
                .map_err(|_| Error::InvalidFormat(pattern.to_owned()));
        }
        Ok(self.get(key)?.as_ref().map(value_to_text))
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = |key: &str| {
            self.data
                .get(key)
                .map(value_to_text)
                .unwrap_or_else(|| format!("%{{{key}}}"))
        };
        write!(f, "{} {} {}", self.timestamp, text("host"), text("message"))
    }
}

/// Where a parsed reference points to.
enum Root<'f> {
    Timestamp(&'f [String]),
    Metadata(&'f [String]),
    Data(&'f [String]),
}

impl<'f> Root<'f> {
    fn of(field: &'f FieldRef) -> Self {
        match field.segments().split_first() {
            Some((first, rest)) if first == TIMESTAMP => Root::Timestamp(rest),
            Some((first, rest)) if first == METADATA => Root::Metadata(rest),
            _ => Root::Data(field.segments()),
        }
    }
}

impl EventLike for Event {
    fn get(&self, reference: &str) -> Result<Option<Value>, Error> {
        let field = FieldRef::parse(reference)?;
        Ok(match Root::of(&field) {
            Root::Timestamp([]) => Some(self.timestamp.to_value()),
            Root::Timestamp(_) => None,
            Root::Metadata([]) => Some(Value::Object(self.metadata.clone())),
            Root::Metadata(path) => lookup(&self.metadata, path).cloned(),
            Root::Data(path) => lookup(&self.data, path).cloned(),
        })
    }

    fn set(&mut self, reference: &str, value: Value) -> Result<(), Error> {
        let field = FieldRef::parse(reference)?;
        match Root::of(&field) {
            Root::Timestamp([]) => self.timestamp = Timestamp::from_value(&value)?,
            Root::Timestamp(_) => {
                return Err(Error::conflict(reference, "@timestamp has no sub-fields"))
            }
            Root::Metadata([]) => match value {
                Value::Object(m) => self.metadata = m,
                _ => return Err(Error::conflict(reference, "@metadata must be an object")),
            },
            Root::Metadata(path) => insert(&mut self.metadata, path, value, reference)?,
            Root::Data(path) => insert(&mut self.data, path, value, reference)?,
        }
        Ok(())
    }

    fn includes(&self, reference: &str) -> Result<bool, Error> {
        let field = FieldRef::parse(reference)?;
        Ok(match Root::of(&field) {
            Root::Timestamp([]) => true,
            Root::Timestamp(_) => false,
            Root::Metadata([]) => !self.metadata.is_empty(),
            Root::Metadata(path) => lookup(&self.metadata, path).is_some(),
            Root::Data(path) => lookup(&self.data, path).is_some(),
        })
    }

    fn remove(&mut self, reference: &str) -> Result<Option<Value>, Error> {
        let field = FieldRef::parse(reference)?;
        Ok(match Root::of(&field) {
            Root::Timestamp(_) => return Err(Error::not_supported("removing @timestamp")),
            Root::Metadata([]) => Some(Value::Object(std::mem::take(&mut self.metadata))),
            Root::Metadata(path) => remove_from(&mut self.metadata, path),
            Root::Data(path) => remove_from(&mut self.data, path),
        })
    }

    fn append(&mut self, other: &Event) -> Result<&mut Self, Error> {
        merge(&mut self.data, &other.data);
        Ok(self)
    }

    fn overwrite(&mut self, other: &Event) -> &mut Self {
        self.data = other.data.clone();
        self.metadata = other.metadata.clone();
        self.timestamp = other.timestamp;
        self.cancelled = other.cancelled;
        self
    }

    fn cancel(&mut self) {
        self.cancelled = true;
    }

    fn uncancel(&mut self) {
        self.cancelled = false;
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    fn set_timestamp(&mut self, timestamp: Timestamp) {
        self.timestamp = timestamp;
    }

    fn tag(&mut self, tag: &str) {
        let tag = Value::String(tag.to_owned());
        match self.data.get_mut(TAGS) {
            Some(Value::Array(tags)) => {
                if !tags.contains(&tag) {
                    tags.push(tag);
                }
            }
            Some(existing) if *existing == tag => {}
            Some(existing) => {
                let previous = existing.take();
                *existing = Value::Array(vec![previous, tag]);
            }
            None => {
                self.data.insert(TAGS.to_owned(), Value::Array(vec![tag]));
            }
        }
    }

    fn to_map(&self) -> FieldMap {
        let mut map = FieldMap::with_capacity(self.data.len() + 1);
        map.insert(TIMESTAMP.to_owned(), self.timestamp.to_value());
        map.extend(self.data.clone());
        map
    }

    fn to_map_with_metadata(&self) -> FieldMap {
        let mut map = self.to_map();
        if !self.metadata.is_empty() {
            map.insert(METADATA.to_owned(), Value::Object(self.metadata.clone()));
        }
        map
    }

    fn sprintf(&self, format: &str) -> Result<String, Error> {
        let mut failure = None;
        let out = PLACEHOLDER.replace_all(format, |caps: &Captures| {
            match self.placeholder(&caps[1]) {
                Ok(Some(text)) => text,
                Ok(None) => caps[0].to_owned(),
                Err(e) => {
                    failure.get_or_insert(e);
                    String::new()
                }
            }
        });
        match failure {
            Some(e) => Err(e),
            None => Ok(out.into_owned()),
        }
    }

    fn snapshot(&self) -> Event {
        self.clone()
    }
}

/// Strings render unquoted, arrays comma-joined, anything else as JSON.
fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(value_to_text).join(","),
        other => other.to_string(),
    }
}

/// Resolves an array segment, negative indices count from the end.
fn array_index(len: usize, segment: &str) -> Option<usize> {
    let idx: i64 = segment.parse().ok()?;
    if idx >= 0 {
        let idx = usize::try_from(idx).ok()?;
        (idx < len).then_some(idx)
    } else {
        len.checked_sub(usize::try_from(idx.unsigned_abs()).ok()?)
    }
}

fn child<'v>(value: &'v Value, segment: &str) -> Option<&'v Value> {
    match value {
        Value::Object(m) => m.get(segment),
        Value::Array(items) => array_index(items.len(), segment).and_then(|i| items.get(i)),
        _ => None,
    }
}

fn lookup<'v>(map: &'v FieldMap, path: &[String]) -> Option<&'v Value> {
    let (first, rest) = path.split_first()?;
    rest.iter()
        .try_fold(map.get(first)?, |value, segment| child(value, segment))
}

fn insert(map: &mut FieldMap, path: &[String], value: Value, reference: &str) -> Result<(), Error> {
    match path {
        [] => Err(Error::invalid_ref(reference)),
        [last] => {
            map.insert(last.clone(), value);
            Ok(())
        }
        [first, rest @ ..] => {
            let slot = map
                .entry(first.clone())
                .or_insert_with(|| Value::Object(FieldMap::new()));
            insert_into_value(slot, rest, value, reference)
        }
    }
}

fn insert_into_value(
    slot: &mut Value,
    path: &[String],
    value: Value,
    reference: &str,
) -> Result<(), Error> {
    match slot {
        Value::Object(map) => insert(map, path, value, reference),
        Value::Array(items) => {
            let Some((segment, rest)) = path.split_first() else {
                return Err(Error::invalid_ref(reference));
            };
            let idx = array_index(items.len(), segment).ok_or_else(|| {
                Error::conflict(reference, format!("index '{segment}' is out of bounds"))
            })?;
            match items.get_mut(idx) {
                Some(item) if rest.is_empty() => {
                    *item = value;
                    Ok(())
                }
                Some(item) => insert_into_value(item, rest, value, reference),
                None => Err(Error::conflict(reference, "index out of bounds")),
            }
        }
        Value::Null => {
            *slot = Value::Object(FieldMap::new());
            insert_into_value(slot, path, value, reference)
        }
        _ => Err(Error::conflict(reference, "an intermediate field is not an object")),
    }
}

fn remove_from(map: &mut FieldMap, path: &[String]) -> Option<Value> {
    match path {
        [] => None,
        [last] => map.shift_remove(last),
        [first, rest @ ..] => remove_from_value(map.get_mut(first)?, rest),
    }
}

fn remove_from_value(value: &mut Value, path: &[String]) -> Option<Value> {
    match value {
        Value::Object(map) => remove_from(map, path),
        Value::Array(items) => {
            let (segment, rest) = path.split_first()?;
            let idx = array_index(items.len(), segment)?;
            if rest.is_empty() {
                Some(items.remove(idx))
            } else {
                remove_from_value(items.get_mut(idx)?, rest)
            }
        }
        _ => None,
    }
}

/// Recursive merge of object values, the source wins on every other conflict.
fn merge(target: &mut FieldMap, source: &FieldMap) {
    for (key, value) in source {
        if let (Some(Value::Object(existing)), Value::Object(incoming)) =
            (target.get_mut(key), value)
        {
            merge(existing, incoming);
            continue;
        }
        target.insert(key.clone(), value.clone());
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn event(v: Value) -> Event {
        match v {
            Value::Object(m) => Event::from_map(m),
            _ => unreachable!(),
        }
    }

    #[test]
    fn get_set_nested() {
        let mut e = event(json!({"foo": "bar"}));
        assert_eq!(e.get("foo").unwrap(), Some(json!("bar")));
        assert_eq!(e.get("[foo]").unwrap(), Some(json!("bar")));

        e.set("[a][b][c]", json!(1)).unwrap();
        assert_eq!(e.get("[a][b]").unwrap(), Some(json!({"c": 1})));
        assert!(e.includes("[a][b][c]").unwrap());
        assert!(!e.includes("[a][x]").unwrap());
    }

    #[test]
    fn set_through_scalar_conflicts() {
        let mut e = event(json!({"foo": "bar"}));
        assert!(matches!(
            e.set("[foo][baz]", json!(1)),
            Err(Error::FieldConflict { .. })
        ));
    }

    #[test]
    fn array_indices() {
        let mut e = event(json!({"list": [1, {"x": 2}, 3]}));
        assert_eq!(e.get("[list][0]").unwrap(), Some(json!(1)));
        assert_eq!(e.get("[list][-1]").unwrap(), Some(json!(3)));
        assert_eq!(e.get("[list][1][x]").unwrap(), Some(json!(2)));
        assert_eq!(e.get("[list][7]").unwrap(), None);

        e.set("[list][1][x]", json!(20)).unwrap();
        assert_eq!(e.get("[list][1][x]").unwrap(), Some(json!(20)));
        assert!(e.set("[list][9]", json!(0)).is_err());

        assert_eq!(e.remove("[list][0]").unwrap(), Some(json!(1)));
        assert_eq!(e.get("[list]").unwrap(), Some(json!([{"x": 20}, 3])));
    }

    #[test]
    fn timestamp_and_metadata_are_not_data() {
        let e = event(json!({
            "@timestamp": "2024-01-02T03:04:05.678Z",
            "@metadata": {"foo": "bar"},
            "message": "hi",
        }));
        assert_eq!(e.data().len(), 1);
        assert_eq!(
            e.get("@timestamp").unwrap(),
            Some(json!("2024-01-02T03:04:05.678Z"))
        );
        assert_eq!(e.get("[@metadata][foo]").unwrap(), Some(json!("bar")));

        let map = e.to_map();
        assert_eq!(
            map.keys().collect::<Vec<_>>(),
            vec!["@timestamp", "message"]
        );
        assert_eq!(
            e.to_map_with_metadata().get("@metadata"),
            Some(&json!({"foo": "bar"}))
        );
    }

    #[test]
    fn unparseable_timestamp_is_tagged() {
        let e = event(json!({"@timestamp": "not a time"}));
        assert_eq!(e.get("_@timestamp").unwrap(), Some(json!("not a time")));
        assert_eq!(e.get("tags").unwrap(), Some(json!(["_timestampparsefailure"])));
    }

    #[test]
    fn set_timestamp_field() {
        let mut e = Event::new();
        e.set("@timestamp", json!("2020-05-06T07:08:09Z")).unwrap();
        assert_eq!(e.timestamp().to_string(), "2020-05-06T07:08:09.000Z");
        assert!(matches!(
            e.set("@timestamp", json!(12)),
            Err(Error::InvalidTimestamp(_))
        ));
        assert!(matches!(
            e.remove("@timestamp"),
            Err(Error::NotSupportedOperation(_))
        ));
    }

    #[test]
    fn metadata_must_be_an_object() {
        let mut e = Event::new();
        e.set("[@metadata][a]", json!(1)).unwrap();
        assert!(e.includes("@metadata").unwrap());
        assert!(e.set("@metadata", json!("nope")).is_err());
        assert_eq!(e.remove("@metadata").unwrap(), Some(json!({"a": 1})));
        assert!(!e.includes("@metadata").unwrap());
    }

    #[test]
    fn append_merges_last_write_wins() {
        let mut e = event(json!({"a": {"x": 1, "y": 2}, "b": "old"}));
        let other = event(json!({
            "a": {"y": 20, "z": 30},
            "b": "new",
            "@metadata": {"skip": true},
        }));
        let ts = e.timestamp();
        e.append(&other).unwrap();
        assert_eq!(e.get("a").unwrap(), Some(json!({"x": 1, "y": 20, "z": 30})));
        assert_eq!(e.get("b").unwrap(), Some(json!("new")));
        assert!(!e.includes("@metadata").unwrap());
        assert_eq!(e.timestamp(), ts);
    }

    #[test]
    fn overwrite_replaces_everything() {
        let mut e = event(json!({"a": 1}));
        let mut other = event(json!({"b": 2, "@metadata": {"m": 1}}));
        other.cancel();
        e.overwrite(&other);
        assert_eq!(e, other);
        assert!(e.is_cancelled());
    }

    #[test]
    fn tags() {
        let mut e = event(json!({"tags": "first"}));
        e.tag("second");
        e.tag("second");
        assert_eq!(e.get("tags").unwrap(), Some(json!(["first", "second"])));
    }

    #[test]
    fn sprintf_placeholders() {
        let e = event(json!({
            "@timestamp": "2021-02-03T04:05:06Z",
            "host": "web-1",
            "nested": {"n": 3},
            "list": ["a", "b"],
        }));
        assert_eq!(
            e.sprintf("%{host} %{[nested][n]} %{list} %{missing} %{+%Y-%m-%d} %{+s} %{open")
                .unwrap(),
            "web-1 3 a,b %{missing} 2021-02-03 1612325106 %{open"
        );
        assert_eq!(e.to_string(), "2021-02-03T04:05:06.000Z web-1 %{message}");
    }

    #[test]
    fn sprintf_errors() {
        let e = event(json!({"host": "web-1"}));
        assert!(matches!(
            e.sprintf("%{host} %{[a][}"),
            Err(Error::InvalidFieldReference(_))
        ));
        assert_eq!(e.sprintf("no placeholders").unwrap(), "no placeholders");
        assert_eq!(e.sprintf("%{host}%{host}").unwrap(), "web-1web-1");
    }
}
