use crate::{
    error::Error,
    types::{is_internal_reference, Event, FieldRef},
};
use derive_more::Display;
use internment::Intern;

pub use mover::move_data_into_namespace;
pub use view::TargetedEvent;

pub mod mover;
pub mod view;

/// A normalized target namespace, e.g. `[the][baz]`.
///
/// Bare names are wrapped in brackets (`foo` becomes `[foo]`), bracketed
/// forms pass through and an empty namespace means "no namespace".
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display)]
#[display("{}", _0.as_str())]
pub struct Namespace(Intern<String>);

impl Namespace {
    pub fn new(target: &str) -> Self {
        let ns = target.trim();
        let normalized = if ns.is_empty() || ns.starts_with('[') {
            ns.to_owned()
        } else {
            format!("[{ns}]")
        };
        Self(Intern::new(normalized))
    }

    pub fn empty() -> Self {
        Self::new("")
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// The storage path of `reference` within this namespace.
    pub fn resolve(&self, reference: &str) -> String {
        resolve(self.as_str(), reference)
    }

    /// Checks that a non-empty namespace is itself a valid field reference.
    pub fn validate(&self) -> Result<(), Error> {
        if self.is_empty() {
            return Ok(());
        }
        FieldRef::parse(self.as_str()).map(|_| ())
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<&str> for Namespace {
    fn from(target: &str) -> Self {
        Self::new(target)
    }
}

/// Computes the effective reference of `reference` under an already
/// normalized `namespace`.
///
/// Internal references (`@timestamp`, `[@metadata][...]`) are returned
/// unchanged.
pub fn resolve(namespace: &str, reference: &str) -> String {
    if is_internal_reference(reference) {
        reference.to_owned()
    } else if reference.starts_with('[') {
        format!("{namespace}{reference}")
    } else {
        format!("{namespace}[{reference}]")
    }
}

/// Runs `f` against `event` viewed through an optional namespace.
pub fn with_namespace<R>(
    event: &mut Event,
    namespace: Option<&str>,
    f: impl FnOnce(&mut TargetedEvent<'_>) -> R,
) -> R {
    let mut view = TargetedEvent::wrap(event, Namespace::new(namespace.unwrap_or_default()));
    f(&mut view)
}
