use crate::{
    error::Error,
    target::Namespace,
    types::{
        is_internal_reference, Event, EventLike, FieldMap, Timestamp, EVENT_CREATED, TIMESTAMP,
    },
};
use std::{
    fmt,
    sync::{Arc, LazyLock},
};

/// Creates events for a plugin.
pub trait EventFactory: fmt::Debug + Send + Sync {
    fn new_event(&self, data: FieldMap) -> Result<Event, Error>;

    /// Applies this factory's normalization to an existing event.
    ///
    /// `data` is the mapping the event was built from, if known.
    fn normalize(&self, event: &mut Event, data: Option<&FieldMap>);
}

static ECS_EVENT_FACTORY: LazyLock<Arc<dyn EventFactory>> =
    LazyLock::new(|| Arc::new(EcsEventFactory));

static LEGACY_EVENT_FACTORY: LazyLock<Arc<dyn EventFactory>> =
    LazyLock::new(|| Arc::new(LegacyEventFactory));

/// Event factory stamping `event.created` on new events.
#[derive(Copy, Clone, Eq, PartialEq, Default, Debug)]
pub struct EcsEventFactory;

impl EcsEventFactory {
    /// The shared instance.
    pub fn instance() -> Arc<dyn EventFactory> {
        Arc::clone(&ECS_EVENT_FACTORY)
    }

    fn stamp_created(event: &mut Event, explicit_timestamp: bool) {
        if event.data().contains_key(EVENT_CREATED) {
            return;
        }
        let created = if explicit_timestamp {
            event.timestamp()
        } else {
            Timestamp::now()
        };
        event.insert_field(EVENT_CREATED, created.to_value());
    }
}

impl EventFactory for EcsEventFactory {
    fn new_event(&self, data: FieldMap) -> Result<Event, Error> {
        let explicit_timestamp = data.contains_key(TIMESTAMP);
        let mut event = Event::from_map(data);
        Self::stamp_created(&mut event, explicit_timestamp);
        Ok(event)
    }

    fn normalize(&self, event: &mut Event, data: Option<&FieldMap>) {
        Self::stamp_created(event, data.is_some_and(|d| d.contains_key(TIMESTAMP)))
    }
}

/// Event factory building events as-is, without normalization.
#[derive(Copy, Clone, Eq, PartialEq, Default, Debug)]
pub struct LegacyEventFactory;

impl LegacyEventFactory {
    /// The shared instance.
    pub fn instance() -> Arc<dyn EventFactory> {
        Arc::clone(&LEGACY_EVENT_FACTORY)
    }
}

impl EventFactory for LegacyEventFactory {
    fn new_event(&self, data: FieldMap) -> Result<Event, Error> {
        Ok(Event::from_map(data))
    }

    fn normalize(&self, _event: &mut Event, _data: Option<&FieldMap>) {}
}

/// Event factory storing event data under a namespace.
///
/// Internal keys (`@timestamp`, `@metadata`, `[@metadata][...]`) stay at the
/// top level, normalization is delegated to the inner factory.
#[derive(Debug)]
pub struct TargetedEventFactory {
    inner: Arc<dyn EventFactory>,
    namespace: Namespace,
}

impl TargetedEventFactory {
    pub fn new(inner: Arc<dyn EventFactory>, namespace: Namespace) -> Self {
        Self { inner, namespace }
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn inner(&self) -> &Arc<dyn EventFactory> {
        &self.inner
    }
}

impl EventFactory for TargetedEventFactory {
    fn new_event(&self, data: FieldMap) -> Result<Event, Error> {
        new_event_with_target(self.inner.as_ref(), data, self.namespace)
    }

    fn normalize(&self, event: &mut Event, data: Option<&FieldMap>) {
        self.inner.normalize(event, data)
    }
}

/// Creates an event with `factory`, placing non-internal data under `namespace`.
///
/// With an empty namespace this is plain `factory.new_event(data)`.
pub fn new_event_with_target(
    factory: &dyn EventFactory,
    data: FieldMap,
    namespace: Namespace,
) -> Result<Event, Error> {
    if namespace.is_empty() {
        return factory.new_event(data);
    }

    let (internal, data): (FieldMap, FieldMap) = data
        .into_iter()
        .partition(|(key, _)| is_internal_reference(key));
    // Bracketed internal keys are references, bare ones are literal keys
    let (internal_refs, init): (FieldMap, FieldMap) = internal
        .into_iter()
        .partition(|(key, _)| key.starts_with('['));

    let mut event = factory.new_event(init)?;
    for (key, value) in internal_refs {
        event.set(&key, value)?;
    }
    for (key, value) in data {
        event.set(&namespace.resolve(&key), value)?;
    }
    Ok(event)
}
