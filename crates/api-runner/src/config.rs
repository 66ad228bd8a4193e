//! # Runner Configuration
//!
//! Knobs for the parts of dispatching that key off specific event or action
//! names. `RunnerConfig::default()` is the stock behavior; hosts can override
//! any field from JSON.
//!
//! ```rust
//! use api_runner::config::RunnerConfig;
//!
//! let config = RunnerConfig::from_json_str(r#"{ "lateCallGuard": null }"#).unwrap();
//! assert!(config.late_call_guard.is_none());
//! assert!(config.removal_watch.is_some());
//! ```

use crate::error::RunnerError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RunnerConfig {
    /// Events whose run id uses one cheap payload field (a JSON pointer)
    /// instead of the whole serialized payload.
    pub run_id_fields: BTreeMap<String, String>,
    pub late_call_guard: Option<LateCallGuardConfig>,
    pub removal_watch: Option<RemovalWatchConfig>,
    pub site_plugin: Option<SitePluginConfig>,
}

/// Warn when `action` fires after a handler of `event` already settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LateCallGuardConfig {
    pub event: String,
    pub action: String,
}

/// Stop queued plugins of `event` once the entity at `path_pointer` is removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovalWatchConfig {
    pub event: String,
    pub path_pointer: String,
}

/// The project's own plugin, reported under `label` instead of its name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SitePluginConfig {
    pub name: String,
    pub label: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        let run_id_fields = [
            ("setFieldsOnGraphQLNodeType", "/type/name"),
            ("onCreateNode", "/node/internal/contentDigest"),
            ("preprocessSource", "/filename"),
            ("onCreatePage", "/page/path"),
        ]
        .into_iter()
        .map(|(event, pointer)| (event.to_string(), pointer.to_string()))
        .collect();

        Self {
            run_id_fields,
            late_call_guard: Some(LateCallGuardConfig {
                event: "createPages".into(),
                action: "createPage".into(),
            }),
            removal_watch: Some(RemovalWatchConfig {
                event: "onCreatePage".into(),
                path_pointer: "/page/path".into(),
            }),
            site_plugin: Some(SitePluginConfig {
                name: "default-site-plugin".into(),
                label: "gatsby-node.js".into(),
            }),
        }
    }
}

impl RunnerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, RunnerError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RunnerError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Name plugins are reported under.
    pub fn display_name<'a>(&'a self, plugin_name: &'a str) -> &'a str {
        match &self.site_plugin {
            Some(site) if site.name == plugin_name => &site.label,
            _ => plugin_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = RunnerConfig::from_json_str(
            r#"{ "runIdFields": { "onCreateNode": "/node/id" } }"#,
        )
        .unwrap();
        assert_eq!(config.run_id_fields.len(), 1);
        assert_eq!(config.run_id_fields["onCreateNode"], "/node/id");
        assert_eq!(config.late_call_guard, RunnerConfig::default().late_call_guard);
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let err = RunnerConfig::from_json_str("{ nope").unwrap_err();
        assert!(matches!(err, RunnerError::Config(_)));
    }

    #[test]
    fn test_display_name_maps_site_plugin() {
        let config = RunnerConfig::default();
        assert_eq!(config.display_name("default-site-plugin"), "gatsby-node.js");
        assert_eq!(config.display_name("gatsby-plugin-sharp"), "gatsby-plugin-sharp");
    }
}
