use crate::{
    error::Error,
    target::Namespace,
    types::{Event, EventLike, FieldMap, INTERNAL_MARKER, METADATA, TIMESTAMP},
};
use serde_json::Value;
use tracing::debug;

/// Moves all event data under the given namespace, in place.
///
/// Every field except internal ones (`@timestamp`, `@metadata`, any other
/// `@`-prefixed key) ends up one level under `namespace`, e.g.
/// `foo => bar` becomes `[target][foo] => bar`. The cancellation flag is kept.
pub fn move_data_into_namespace(event: &mut Event, namespace: &str) -> Result<(), Error> {
    let namespace = Namespace::new(namespace);
    if namespace.is_empty() {
        return Ok(());
    }
    namespace.validate()?;

    let (internal, data): (FieldMap, FieldMap) = event
        .to_map_with_metadata()
        .into_iter()
        .partition(|(key, _)| key.starts_with(INTERNAL_MARKER));

    let mut proto = Event::with_timestamp(event.timestamp());
    if event.is_cancelled() {
        proto.cancel();
    }
    for (key, value) in internal {
        match key.as_str() {
            TIMESTAMP => (),
            METADATA => proto.set(METADATA, value)?,
            _ => proto.insert_field(&key, value),
        }
    }

    debug!(%namespace, fields = data.len(), "Moving event data into namespace");
    event.overwrite(&proto);
    event.set(namespace.as_str(), Value::Object(data))
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use test_log::test;

    fn event(v: Value) -> Event {
        match v {
            Value::Object(m) => Event::from_map(m),
            _ => unreachable!(),
        }
    }

    #[test]
    fn moves_ordinary_fields() {
        let mut e = event(json!({
            "@timestamp": "2019-09-09T09:09:09Z",
            "@metadata": {"m": 1},
            "@version": "1",
            "foo": "bar",
            "nested": {"a": [1, 2]},
        }));
        let ts = e.timestamp();
        e.cancel();

        move_data_into_namespace(&mut e, "ns").unwrap();

        assert_eq!(e.timestamp(), ts);
        assert!(e.is_cancelled());
        assert_eq!(e.get("[ns][foo]").unwrap(), Some(json!("bar")));
        assert_eq!(e.get("[ns][nested][a][1]").unwrap(), Some(json!(2)));
        assert_eq!(e.get("[@metadata][m]").unwrap(), Some(json!(1)));
        assert_eq!(e.get("@version").unwrap(), Some(json!("1")));
        assert!(!e.includes("foo").unwrap());
        assert!(!e.includes("[ns][@timestamp]").unwrap());
        assert_eq!(
            e.data().keys().collect::<Vec<_>>(),
            vec!["@version", "ns"]
        );
    }

    #[test]
    fn nested_namespace() {
        let mut e = event(json!({"foo": "bar"}));
        move_data_into_namespace(&mut e, "[a][b]").unwrap();
        assert_eq!(e.get("[a][b][foo]").unwrap(), Some(json!("bar")));
    }

    #[test]
    fn empty_namespace_is_a_no_op() {
        let mut e = event(json!({"foo": "bar"}));
        let before = e.clone();
        move_data_into_namespace(&mut e, "").unwrap();
        move_data_into_namespace(&mut e, "  ").unwrap();
        assert_eq!(e, before);
    }

    #[test]
    fn invalid_namespace_leaves_event_untouched() {
        let mut e = event(json!({"foo": "bar", "@metadata": {"m": 1}}));
        let before = e.clone();
        for ns in ["[a][", "a]b"] {
            assert!(matches!(
                move_data_into_namespace(&mut e, ns),
                Err(Error::InvalidFieldReference(_))
            ));
            assert_eq!(e, before);
        }
        assert_eq!(e.get("foo").unwrap(), Some(json!("bar")));
    }
}
