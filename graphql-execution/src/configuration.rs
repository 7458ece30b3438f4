//! Logic for loading configuration in to an object model
use std::str::FromStr;

use schemars::JsonSchema;
use schemars::schema::RootSchema;
use serde::Deserialize;
use serde::Serialize;

use crate::error::ConfigurationError;

/// The configuration for the execution core.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct Configuration {
    /// Resolution engine options
    pub execution: Execution,

    /// Connection shaping options
    pub connections: Connections,
}

#[buildstructor::buildstructor]
impl Configuration {
    #[builder(visibility = "pub")]
    fn new(execution: Option<Execution>, connections: Option<Connections>) -> Self {
        Self {
            execution: execution.unwrap_or_default(),
            connections: connections.unwrap_or_default(),
        }
    }

    /// Parses and validates a YAML configuration document.
    pub fn from_yaml(raw_yaml: &str) -> Result<Self, ConfigurationError> {
        let configuration: Configuration = if raw_yaml.trim().is_empty() {
            Configuration::default()
        } else {
            serde_yaml::from_str(raw_yaml).map_err(|e| {
                ConfigurationError::InvalidConfiguration {
                    message: "failed to parse yaml",
                    error: e.to_string(),
                }
            })?
        };
        configuration.validate()?;
        Ok(configuration)
    }

    /// The JSON schema of the configuration file.
    pub fn json_schema() -> RootSchema {
        schemars::schema_for!(Configuration)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigurationError> {
        if self.execution.recursion_limit == 0 {
            return Err(ConfigurationError::InvalidConfiguration {
                message: "execution.recursion_limit",
                error: "must be greater than 0".to_string(),
            });
        }
        if self.execution.max_drain_steps == Some(0) {
            return Err(ConfigurationError::InvalidConfiguration {
                message: "execution.max_drain_steps",
                error: "must be greater than 0".to_string(),
            });
        }
        if self.connections.max_page_size == Some(0) {
            return Err(ConfigurationError::InvalidConfiguration {
                message: "connections.max_page_size",
                error: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Parse configuration from a string in YAML syntax
impl FromStr for Configuration {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Configuration::from_yaml(s)
    }
}

/// How the pending deferred values of one drain step are forced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DrainMode {
    /// Poll every pending value of the step together. Results are still applied in
    /// enqueue order.
    #[default]
    Concurrent,

    /// Await pending values one at a time, in enqueue order.
    Sequential,
}

/// Resolution engine options.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Execution {
    /// How pending deferred values are forced
    /// default: concurrent
    #[serde(default)]
    pub drain_mode: DrainMode,

    /// Abort the execution after this many drain steps
    /// default: unlimited
    #[serde(default)]
    pub max_drain_steps: Option<usize>,

    /// Maximum nesting of selections while building the selection tree
    /// default: 512
    #[serde(default = "default_recursion_limit")]
    pub recursion_limit: usize,
}

// The limit is chosen to be:
//   < # expected to cause stack overflow &&
//   > # expected in a legitimate query
fn default_recursion_limit() -> usize {
    512
}

impl Default for Execution {
    fn default() -> Self {
        Self {
            drain_mode: DrainMode::default(),
            max_drain_steps: None,
            recursion_limit: default_recursion_limit(),
        }
    }
}

#[buildstructor::buildstructor]
impl Execution {
    #[builder(visibility = "pub")]
    fn new(
        drain_mode: Option<DrainMode>,
        max_drain_steps: Option<usize>,
        recursion_limit: Option<usize>,
    ) -> Self {
        Self {
            drain_mode: drain_mode.unwrap_or_default(),
            max_drain_steps,
            recursion_limit: recursion_limit.unwrap_or_else(default_recursion_limit),
        }
    }
}

/// Connection shaping options.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct Connections {
    /// Maximum number of edges returned by a connection, applied after its declared
    /// operations
    /// default: unlimited
    pub max_page_size: Option<usize>,
}

#[buildstructor::buildstructor]
impl Connections {
    #[builder(visibility = "pub")]
    fn new(max_page_size: Option<usize>) -> Self {
        Self { max_page_size }
    }
}
