//! Configuration from the environment and pipeline options.
//!
//! The CLI loads a `.env` file from the working directory (if present) at
//! startup, then these variables are read:
//!
//! | Variable              | Default                  | Meaning                          |
//! |-----------------------|--------------------------|----------------------------------|
//! | `ARCGIS_PORTAL_URL`   | `https://www.arcgis.com` | Portal hosting the item          |
//! | `ARCGIS_ITEM_ID`      |                          | Hosted feature layer item id     |
//! | `ARCGIS_LAYER_URL`    |                          | Layer URL, skips the item lookup |
//! | `ARCGIS_LAYER_INDEX`  | `0`                      | Layer within the service         |
//! | `ARCGIS_TOKEN`        |                          | Pre-issued access token          |
//! | `ARCGIS_TIMEOUT_SECS` | `60`                     | Per-request timeout              |

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::models::{CountFields, InputColumns, DEFAULT_MAX_COUNT};
use crate::transform::FailurePolicy;
use crate::upload::DEFAULT_BATCH_SIZE;

pub const DEFAULT_PORTAL_URL: &str = "https://www.arcgis.com";

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Where and how to reach the feature layer.
#[derive(Debug, Clone)]
pub struct ArcGisConfig {
    pub portal_url: String,
    pub item_id: Option<String>,
    pub layer_url: Option<String>,
    pub layer_index: usize,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Default for ArcGisConfig {
    fn default() -> Self {
        Self {
            portal_url: DEFAULT_PORTAL_URL.to_string(),
            item_id: None,
            layer_url: None,
            layer_index: 0,
            token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ArcGisConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let config = Self {
            portal_url: get("ARCGIS_PORTAL_URL")
                .unwrap_or_else(|| DEFAULT_PORTAL_URL.to_string()),
            item_id: get("ARCGIS_ITEM_ID"),
            layer_url: get("ARCGIS_LAYER_URL"),
            layer_index: parse_var("ARCGIS_LAYER_INDEX", get("ARCGIS_LAYER_INDEX"))?
                .unwrap_or(0),
            token: get("ARCGIS_TOKEN"),
            timeout: Duration::from_secs(
                parse_var("ARCGIS_TIMEOUT_SECS", get("ARCGIS_TIMEOUT_SECS"))?
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
        };

        if config.item_id.is_none() && config.layer_url.is_none() {
            return Err(ConfigError::MissingTarget);
        }
        Ok(config)
    }
}

fn parse_var<T: FromStr>(name: &str, value: Option<String>) -> Result<Option<T>, ConfigError> {
    value
        .map(|v| {
            v.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
                name: name.to_string(),
                value: v.clone(),
            })
        })
        .transpose()
}

/// Options for the expand/publish pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOptions {
    /// Count columns driving the expansion
    pub count_fields: CountFields,

    /// Pass-through columns read by the feature builder
    pub columns: InputColumns,

    /// Largest accepted value in a count column
    pub max_count: usize,

    /// What to do with records whose counts cannot be read
    pub failure_policy: FailurePolicy,

    /// Features per upload request
    pub batch_size: usize,

    /// Expand records on the rayon pool
    pub parallel: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            count_fields: CountFields::default(),
            columns: InputColumns::default(),
            max_count: DEFAULT_MAX_COUNT,
            failure_policy: FailurePolicy::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            parallel: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_with_item_id() {
        let config = ArcGisConfig::from_lookup(lookup(&[("ARCGIS_ITEM_ID", "abc123")])).unwrap();

        assert_eq!(config.portal_url, DEFAULT_PORTAL_URL);
        assert_eq!(config.item_id.as_deref(), Some("abc123"));
        assert_eq!(config.layer_index, 0);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(config.token.is_none());
    }

    #[test]
    fn test_missing_target() {
        let result = ArcGisConfig::from_lookup(lookup(&[("ARCGIS_TOKEN", "t")]));
        assert!(matches!(result, Err(ConfigError::MissingTarget)));
    }

    #[test]
    fn test_empty_values_are_unset() {
        let result = ArcGisConfig::from_lookup(lookup(&[("ARCGIS_ITEM_ID", "  ")]));
        assert!(matches!(result, Err(ConfigError::MissingTarget)));
    }

    #[test]
    fn test_invalid_layer_index() {
        let result = ArcGisConfig::from_lookup(lookup(&[
            ("ARCGIS_LAYER_URL", "https://example.com/FeatureServer/0"),
            ("ARCGIS_LAYER_INDEX", "first"),
        ]));

        match result {
            Err(ConfigError::InvalidValue { name, value }) => {
                assert_eq!(name, "ARCGIS_LAYER_INDEX");
                assert_eq!(value, "first");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_from_env_reads_process_environment() {
        // only this test touches the process environment
        env::set_var("ARCGIS_LAYER_URL", "https://example.com/FeatureServer/2");
        env::set_var("ARCGIS_TIMEOUT_SECS", "5");

        let config = ArcGisConfig::from_env().unwrap();

        assert_eq!(
            config.layer_url.as_deref(),
            Some("https://example.com/FeatureServer/2")
        );
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_default_options() {
        let opts = PipelineOptions::default();
        assert_eq!(opts.batch_size, 200);
        assert_eq!(opts.failure_policy, FailurePolicy::Skip);
        assert_eq!(opts.count_fields.len(), 10);
        assert_eq!(opts.max_count, DEFAULT_MAX_COUNT);
        assert!(!opts.parallel);
    }
}
