//! Composer configuration.
//!
//! Deserialized from the `composer` section of `dcstruct.config.json`; every
//! field has a default so an empty object is valid.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LazyOptions {
    /// Children loaded up front
    pub num: usize,
    /// Children added per scroll-to-bottom
    pub step: usize,
}

impl Default for LazyOptions {
    fn default() -> Self {
        Self { num: 8, step: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComposerConfig {
    pub cache_capacity: usize,
    pub lazy: LazyOptions,
    /// Delay used when `debounce`/`throttle` is enabled without a number
    pub default_rate_limit_ms: u64,
    pub max_resolve_depth: usize,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            cache_capacity: dcstruct_store::DEFAULT_CAPACITY,
            lazy: LazyOptions::default(),
            default_rate_limit_ms: 300,
            max_resolve_depth: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_object() {
        let config: ComposerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ComposerConfig::default());
        assert_eq!(config.lazy, LazyOptions { num: 8, step: 3 });
        assert_eq!(config.cache_capacity, 1000);
    }

    #[test]
    fn test_partial_override() {
        let config: ComposerConfig =
            serde_json::from_str(r#"{ "lazy": { "step": 5 }, "defaultRateLimitMs": 100 }"#)
                .unwrap();
        assert_eq!(config.lazy.num, 8);
        assert_eq!(config.lazy.step, 5);
        assert_eq!(config.default_rate_limit_ms, 100);
    }
}
