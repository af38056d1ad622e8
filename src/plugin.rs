use crate::{
    config::{EcsCompatibility, PluginConfig},
    error::Error,
    factory::{
        new_event_with_target, EcsEventFactory, EventFactory, LegacyEventFactory,
        TargetedEventFactory,
    },
    parser::events_from_json,
    target::{move_data_into_namespace, Namespace},
    types::{Event, FieldMap},
};
use std::{
    fmt,
    sync::{Arc, OnceLock},
};
use tracing::debug;

/// Supplies the event factories of a plugin.
///
/// A host with its own factory support injects its implementation, otherwise
/// [`FallbackEventFactoryProvider`] is used.
pub trait EventFactoryProvider: fmt::Debug + Send + Sync {
    fn event_factory(&self, ecs_compatibility: EcsCompatibility) -> Arc<dyn EventFactory>;

    fn targeted_event_factory(
        &self,
        inner: Arc<dyn EventFactory>,
        namespace: Namespace,
    ) -> Arc<dyn EventFactory>;
}

/// Built-in provider: the normalizing factory when ECS compatibility is
/// enabled, the legacy one otherwise.
#[derive(Copy, Clone, Eq, PartialEq, Default, Debug)]
pub struct FallbackEventFactoryProvider;

impl EventFactoryProvider for FallbackEventFactoryProvider {
    fn event_factory(&self, ecs_compatibility: EcsCompatibility) -> Arc<dyn EventFactory> {
        if ecs_compatibility.is_enabled() {
            EcsEventFactory::instance()
        } else {
            LegacyEventFactory::instance()
        }
    }

    fn targeted_event_factory(
        &self,
        inner: Arc<dyn EventFactory>,
        namespace: Namespace,
    ) -> Arc<dyn EventFactory> {
        Arc::new(TargetedEventFactory::new(inner, namespace))
    }
}

/// Event support owned by a plugin instance.
///
/// Factories are resolved on first use and memoized for the lifetime of
/// the instance.
#[derive(Debug)]
pub struct EventSupport {
    config: PluginConfig,
    provider: Arc<dyn EventFactoryProvider>,
    event_factory: OnceLock<Arc<dyn EventFactory>>,
    targeted_event_factory: OnceLock<Arc<dyn EventFactory>>,
}

impl EventSupport {
    pub fn new(config: PluginConfig) -> Self {
        Self::with_provider(config, Arc::new(FallbackEventFactoryProvider))
    }

    pub fn with_provider(config: PluginConfig, provider: Arc<dyn EventFactoryProvider>) -> Self {
        Self {
            config,
            provider,
            event_factory: OnceLock::new(),
            targeted_event_factory: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub fn event_factory(&self) -> Arc<dyn EventFactory> {
        let factory = self.event_factory.get_or_init(|| {
            debug!(
                plugin = self.config.display_name(),
                ecs_compatibility = %self.config.ecs_compatibility,
                "Resolving event factory"
            );
            self.provider.event_factory(self.config.ecs_compatibility)
        });
        Arc::clone(factory)
    }

    /// Replaces the event factory, the targeted factory is rebuilt on next use.
    pub fn set_event_factory(&mut self, factory: Arc<dyn EventFactory>) {
        self.event_factory = OnceLock::from(factory);
        self.targeted_event_factory = OnceLock::new();
    }

    /// The event factory storing data under the configured `target`.
    ///
    /// Fails with [`Error::MissingTarget`] when no target is configured.
    pub fn targeted_event_factory(&self) -> Result<Arc<dyn EventFactory>, Error> {
        let namespace = self
            .config
            .namespace()
            .ok_or_else(|| Error::MissingTarget(self.config.display_name().to_owned()))?;
        let factory = self.targeted_event_factory.get_or_init(|| {
            debug!(
                plugin = self.config.display_name(),
                %namespace,
                "Resolving targeted event factory"
            );
            self.provider.targeted_event_factory(self.event_factory(), namespace)
        });
        Ok(Arc::clone(factory))
    }

    /// Creates an event with this plugin's event factory.
    ///
    /// With a `target_namespace`, internal keys stay at the top level and
    /// all other data is stored under the namespace.
    pub fn new_event(
        &self,
        data: FieldMap,
        target_namespace: Option<&str>,
    ) -> Result<Event, Error> {
        let factory = self.event_factory();
        self.new_event_with(factory.as_ref(), data, target_namespace)
    }

    pub fn new_event_with(
        &self,
        factory: &dyn EventFactory,
        data: FieldMap,
        target_namespace: Option<&str>,
    ) -> Result<Event, Error> {
        let namespace = Namespace::new(target_namespace.unwrap_or_default());
        new_event_with_target(factory, data, namespace)
    }

    /// Moves all non-internal event data under `target_namespace`, in place.
    pub fn move_event_data(
        &self,
        event: &mut Event,
        target_namespace: Option<&str>,
    ) -> Result<(), Error> {
        match target_namespace {
            Some(ns) => move_data_into_namespace(event, ns),
            None => Ok(()),
        }
    }

    pub fn events_from_json(
        &self,
        json: &str,
        factory: &dyn EventFactory,
    ) -> Result<Vec<Event>, Error> {
        events_from_json(json, factory)
    }
}
