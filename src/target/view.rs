use crate::{
    error::Error,
    target::Namespace,
    types::{Event, EventLike, FieldMap, Timestamp},
};
use serde_json::Value;

/// An [`Event`] decorator storing values in a target namespace.
///
/// Every get, set, include and remove goes through [`Namespace::resolve`],
/// so internal references (`@timestamp`, `@metadata`) are NOT namespaced.
/// An empty namespace makes the view a pass-through.
#[derive(Debug)]
pub struct TargetedEvent<'e> {
    event: &'e mut Event,
    namespace: Namespace,
}

impl<'e> TargetedEvent<'e> {
    pub fn wrap<N: Into<Namespace>>(event: &'e mut Event, namespace: N) -> Self {
        Self {
            event,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// The decorated event, bypassing the namespace.
    pub fn event(&self) -> &Event {
        self.event
    }

    pub fn unwrap(self) -> &'e mut Event {
        self.event
    }
}

impl EventLike for TargetedEvent<'_> {
    fn get(&self, reference: &str) -> Result<Option<Value>, Error> {
        self.event.get(&self.namespace.resolve(reference))
    }

    fn set(&mut self, reference: &str, value: Value) -> Result<(), Error> {
        self.event.set(&self.namespace.resolve(reference), value)
    }

    fn includes(&self, reference: &str) -> Result<bool, Error> {
        self.event.includes(&self.namespace.resolve(reference))
    }

    fn remove(&mut self, reference: &str) -> Result<Option<Value>, Error> {
        self.event.remove(&self.namespace.resolve(reference))
    }

    /// The whole data of `other`, `@timestamp` included, lands under the
    /// namespace. Only data gets appended.
    fn append(&mut self, other: &Event) -> Result<&mut Self, Error> {
        if self.namespace.is_empty() {
            self.event.append(other)?;
        } else {
            let mut namespaced = Event::new();
            namespaced.set(self.namespace.as_str(), Value::Object(other.to_map()))?;
            self.event.append(&namespaced)?;
        }
        Ok(self)
    }

    /// The namespace is not applied to the overwritten content.
    fn overwrite(&mut self, other: &Event) -> &mut Self {
        self.event.overwrite(other);
        self
    }

    fn cancel(&mut self) {
        self.event.cancel()
    }

    fn uncancel(&mut self) {
        self.event.uncancel()
    }

    fn is_cancelled(&self) -> bool {
        self.event.is_cancelled()
    }

    fn timestamp(&self) -> Timestamp {
        self.event.timestamp()
    }

    fn set_timestamp(&mut self, timestamp: Timestamp) {
        self.event.set_timestamp(timestamp)
    }

    fn tag(&mut self, tag: &str) {
        self.event.tag(tag)
    }

    fn to_map(&self) -> FieldMap {
        self.event.to_map()
    }

    fn to_map_with_metadata(&self) -> FieldMap {
        self.event.to_map_with_metadata()
    }

    fn sprintf(&self, _format: &str) -> Result<String, Error> {
        Err(Error::not_supported(format!(
            "sprintf on an event targeted at '{}'",
            self.namespace
        )))
    }

    fn snapshot(&self) -> Event {
        self.event.clone()
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
    fn namespaced_field_access() {
        let mut e = event(json!({"foo": "top"}));
        let mut view = TargetedEvent::wrap(&mut e, "[the][baz]");

        view.set("foo", json!("bar")).unwrap();
        view.set("[nested][x]", json!(1)).unwrap();
        assert_eq!(view.get("foo").unwrap(), Some(json!("bar")));
        assert!(view.includes("[nested][x]").unwrap());
        assert_eq!(view.remove("[nested][x]").unwrap(), Some(json!(1)));
        assert!(!view.includes("[nested][x]").unwrap());

        let e = view.unwrap();
        assert_eq!(e.get("foo").unwrap(), Some(json!("top")));
        assert_eq!(e.get("[the][baz][foo]").unwrap(), Some(json!("bar")));
    }

    #[test]
    fn internal_fields_are_not_namespaced() {
        let mut e = Event::new();
        let mut view = TargetedEvent::wrap(&mut e, "target");
        view.set("[@metadata][id]", json!("abc")).unwrap();
        view.set("@timestamp", json!("2022-02-02T02:02:02Z")).unwrap();
        assert_eq!(view.get("[@metadata][id]").unwrap(), Some(json!("abc")));

        assert_eq!(e.get("[@metadata][id]").unwrap(), Some(json!("abc")));
        assert_eq!(e.timestamp().to_string(), "2022-02-02T02:02:02.000Z");
        assert!(!e.includes("target").unwrap());
    }

    #[test]
    fn append_nests_everything_including_timestamp() {
        let mut e = event(json!({"keep": true}));
        let other = event(json!({
            "@timestamp": "2023-03-03T03:03:03Z",
            "foo": "bar",
        }));
        let ts = e.timestamp();

        let mut view = TargetedEvent::wrap(&mut e, "ns");
        view.append(&other).unwrap();

        assert_eq!(e.timestamp(), ts);
        assert_eq!(e.get("keep").unwrap(), Some(json!(true)));
        assert_eq!(e.get("[ns][foo]").unwrap(), Some(json!("bar")));
        assert_eq!(
            e.get("[ns][@timestamp]").unwrap(),
            Some(json!("2023-03-03T03:03:03.000Z"))
        );
    }

    #[test]
    fn append_without_namespace_is_plain() {
        let mut e = event(json!({"a": 1}));
        let other = event(json!({"b": 2}));
        TargetedEvent::wrap(&mut e, "").append(&other).unwrap();
        assert_eq!(e.get("b").unwrap(), Some(json!(2)));
    }

    #[test]
    fn overwrite_ignores_namespace() {
        let mut e = event(json!({"a": 1}));
        let other = event(json!({"b": 2}));
        let mut view = TargetedEvent::wrap(&mut e, "ns");
        view.overwrite(&other);
        assert_eq!(view.namespace().as_str(), "[ns]");
        assert_eq!(view.get("b").unwrap(), None);
        assert_eq!(view.event().get("b").unwrap(), Some(json!(2)));
        assert_eq!(view.event().get("a").unwrap(), None);
    }

    #[test]
    fn passthrough_operations() {
        let mut e = Event::new();
        let mut view = TargetedEvent::wrap(&mut e, "ns");
        view.cancel();
        assert!(view.is_cancelled());
        view.uncancel();
        view.tag("seen");
        assert_eq!(view.snapshot().get("tags").unwrap(), Some(json!(["seen"])));
        assert!(view.to_json().unwrap().contains("\"tags\":[\"seen\"]"));
        assert!(!e.is_cancelled());

        let ts = Timestamp::parse("2020-01-02T03:04:05Z").unwrap();
        let mut view = TargetedEvent::wrap(&mut e, "ns");
        view.set_timestamp(ts);
        assert_eq!(view.timestamp(), ts);
        assert_eq!(e.timestamp(), ts);
        assert!(!e.includes("[ns][@timestamp]").unwrap());
    }

    #[test]
    fn sprintf_is_not_supported() {
        let mut e = Event::new();
        let view = TargetedEvent::wrap(&mut e, "ns");
        assert!(matches!(
            view.sprintf("%{foo}"),
            Err(Error::NotSupportedOperation(_))
        ));
    }
}
