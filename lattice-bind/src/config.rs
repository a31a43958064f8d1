//! Runtime Configuration
//!
//! Knobs for the binding runtime. Every field has a default, so a partial
//! JSON document is enough:
//!
//! ```rust,ignore
//! let config = RuntimeConfig::from_json(r#"{"cache_expressions": false}"#)?;
//! let runtime = BindingRuntime::with_config(config);
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Memoize compiled expressions by source text.
    pub cache_expressions: bool,

    /// Evaluate identifier-free expressions once at compile time.
    pub fold_constants: bool,

    /// Revert an intercepted slot to plain data on the first write after its
    /// last observer went away.
    pub revert_unused_slots: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            cache_expressions: true,
            fold_constants: true,
            revert_unused_slots: true,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
