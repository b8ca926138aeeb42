//! Engine configuration.

use materia_compiler::{CompileLimits, CompileOptions, DEFAULT_CAPACITY};
use materia_core::{CoercionOptions, SingletonPolicy};
use serde::{Deserialize, Serialize};

/// Errors raised while loading a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {field} {reason}")]
    Invalid { field: &'static str, reason: &'static str },
}

/// Settings shared by every session an [`Engine`](crate::Engine) opens.
///
/// Missing fields take their defaults, so `{}` is a valid configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MaterializerConfig {
    /// Number of compiled routines kept by the routine cache.
    pub cache_capacity: usize,
    /// How sequences are reduced to a single value.
    pub singleton_policy: SingletonPolicy,
    /// Read null from a non-nullable value column as the type default.
    pub null_substitution: bool,
    /// Deepest plan the compiler accepts.
    pub max_plan_depth: usize,
    /// Leave cursors open when a session lets go of them.
    pub retain_cursor: bool,
}

impl Default for MaterializerConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CAPACITY,
            singleton_policy: SingletonPolicy::default(),
            null_substitution: false,
            max_plan_depth: CompileLimits::default().get_max_depth(),
            retain_cursor: false,
        }
    }
}

impl MaterializerConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "cache_capacity",
                reason: "must be at least 1",
            });
        }
        if self.max_plan_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "max_plan_depth",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }

    /// Compile options carrying this configuration.
    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions::new()
            .coercion(CoercionOptions::new().singleton_policy(self.singleton_policy))
            .null_substitution(self.null_substitution)
            .limits(CompileLimits::new().max_depth(self.max_plan_depth))
    }
}
