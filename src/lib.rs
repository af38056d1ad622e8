#![doc = include_str!("../README.md")]

pub use crate::config::*;
pub use crate::error::{Error, JsonError};
pub use crate::factory::{
    new_event_with_target, EcsEventFactory, EventFactory, LegacyEventFactory, TargetedEventFactory,
};
pub use crate::parser::{events_from_json, JsonParser};
pub use crate::plugin::{EventFactoryProvider, EventSupport, FallbackEventFactoryProvider};
pub use crate::target::{
    move_data_into_namespace, resolve, with_namespace, Namespace, TargetedEvent,
};
pub use crate::types::*;

pub mod config;
pub mod error;
pub mod factory;
pub mod parser;
pub mod plugin;
pub mod target;
pub mod types;
