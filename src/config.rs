use crate::{error::Error, target::Namespace};
use derive_more::Display;
use serde::Deserialize;

/// Elastic Common Schema compatibility mode of a plugin.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Display, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum EcsCompatibility {
    #[default]
    #[display("disabled")]
    Disabled,
    #[display("v1")]
    V1,
    #[display("v8")]
    V8,
}

impl EcsCompatibility {
    pub fn is_enabled(self) -> bool {
        self != EcsCompatibility::Disabled
    }
}

/// The event-related options of a plugin instance.
///
/// Unknown keys are ignored, so this can be read straight from a plugin's
/// full option set.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PluginConfig {
    /// Plugin instance identifier.
    #[serde(default)]
    pub id: Option<String>,
    /// Selects the event factory.
    #[serde(default)]
    pub ecs_compatibility: EcsCompatibility,
    /// Namespace under which produced event data is stored, e.g. `[the][baz]`.
    #[serde(default)]
    pub target: Option<String>,
}

impl PluginConfig {
    /// Reads and validates the options from a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, Error> {
        let cfg: Self = serde_yaml::from_str(yaml)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if let Some(ns) = self.namespace() {
            ns.validate()?;
        }
        Ok(())
    }

    pub fn with_target<S: Into<String>>(mut self, target: S) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_ecs_compatibility(mut self, ecs_compatibility: EcsCompatibility) -> Self {
        self.ecs_compatibility = ecs_compatibility;
        self
    }

    /// The normalized target, `None` when absent or blank.
    pub fn namespace(&self) -> Option<Namespace> {
        self.target
            .as_deref()
            .map(Namespace::new)
            .filter(|ns| !ns.is_empty())
    }

    /// Identifier used in log records and error messages.
    pub fn display_name(&self) -> &str {
        self.id.as_deref().unwrap_or("plugin")
    }
}
