//! Option resolution across the host's override sources
//!
//! A logical option can arrive through several channels depending on how the
//! product was configured on the host. [`SOURCES`] lists them highest priority
//! first; an empty string counts as absent everywhere, so resolution falls
//! through to the next source. The caller's default applies last.

use thiserror::Error;

use crate::config::find_option;
use crate::params::ServiceParams;

#[derive(Error, Debug, PartialEq)]
pub enum OptionError {
    #[error("Option {key} must be a number, got {value:?}")]
    NotNumeric { key: String, value: String },
}

/// What is being looked up: the option key plus, for options in the canonical
/// schema, its friendly label and 1-based position
#[derive(Debug, Clone, PartialEq)]
pub struct OptionQuery<'a> {
    pub key: &'a str,
    pub label: Option<&'static str>,
    pub position: Option<usize>,
}

impl<'a> OptionQuery<'a> {
    pub fn new(key: &'a str) -> Self {
        match find_option(key) {
            Some((position, spec)) => Self {
                key,
                label: Some(spec.label),
                position: Some(position),
            },
            None => Self {
                key,
                label: None,
                position: None,
            },
        }
    }
}

type Lookup = fn(&ServiceParams, &OptionQuery<'_>) -> Option<String>;

/// A named place an option value can come from
pub struct OptionSource {
    pub name: &'static str,
    lookup: Lookup,
}

impl OptionSource {
    pub fn lookup(&self, params: &ServiceParams, query: &OptionQuery<'_>) -> Option<String> {
        (self.lookup)(params, query).filter(|value| !value.is_empty())
    }
}

fn config_by_label(params: &ServiceParams, query: &OptionQuery<'_>) -> Option<String> {
    query
        .label
        .and_then(|label| params.config_options.get(label).cloned())
}

fn config_by_key(params: &ServiceParams, query: &OptionQuery<'_>) -> Option<String> {
    params.config_options.get(query.key).cloned()
}

fn custom_field_by_label(params: &ServiceParams, query: &OptionQuery<'_>) -> Option<String> {
    query
        .label
        .and_then(|label| params.custom_fields.get(label).cloned())
}

fn custom_field_by_key(params: &ServiceParams, query: &OptionQuery<'_>) -> Option<String> {
    params.custom_fields.get(query.key).cloned()
}

fn positional(params: &ServiceParams, query: &OptionQuery<'_>) -> Option<String> {
    query.position.and_then(|n| params.legacy_option(n))
}

pub const SOURCES: &[OptionSource] = &[
    OptionSource {
        name: "config option by label",
        lookup: config_by_label,
    },
    OptionSource {
        name: "config option by key",
        lookup: config_by_key,
    },
    OptionSource {
        name: "custom field by label",
        lookup: custom_field_by_label,
    },
    OptionSource {
        name: "custom field by key",
        lookup: custom_field_by_key,
    },
    OptionSource {
        name: "positional option",
        lookup: positional,
    },
];

/// Resolves options for one lifecycle call
#[derive(Clone, Copy)]
pub struct OptionResolver<'p> {
    params: &'p ServiceParams,
}

impl<'p> OptionResolver<'p> {
    pub fn new(params: &'p ServiceParams) -> Self {
        Self { params }
    }

    /// First non-empty value and the name of the source it came from
    pub fn resolve_with_source(&self, key: &str) -> Option<(String, &'static str)> {
        let query = OptionQuery::new(key);
        SOURCES.iter().find_map(|source| {
            source
                .lookup(self.params, &query)
                .map(|value| (value, source.name))
        })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.resolve_with_source(key).map(|(value, _)| value)
    }

    pub fn get_or(&self, key: &str, default: impl Into<String>) -> String {
        self.get(key).unwrap_or_else(|| default.into())
    }

    pub fn get_or_else<F: FnOnce() -> String>(&self, key: &str, default: F) -> String {
        self.get(key).unwrap_or_else(default)
    }

    pub fn get_i64(&self, key: &str) -> Result<Option<i64>, OptionError> {
        self.get(key)
            .map(|value| {
                value.trim().parse::<i64>().map_err(|_| OptionError::NotNumeric {
                    key: key.to_string(),
                    value,
                })
            })
            .transpose()
    }

    pub fn get_i64_or(&self, key: &str, default: i64) -> Result<i64, OptionError> {
        Ok(self.get_i64(key)?.unwrap_or(default))
    }

    pub fn get_u64(&self, key: &str) -> Result<Option<u64>, OptionError> {
        self.get(key)
            .map(|value| {
                value.trim().parse::<u64>().map_err(|_| OptionError::NotNumeric {
                    key: key.to_string(),
                    value,
                })
            })
            .transpose()
    }

    /// Yes/no option; anything but an explicit "off" value is on
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(|value| {
            !matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "0" | "off" | "no" | "false"
            )
        })
    }

    /// Comma separated list option, blanks dropped
    pub fn list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: serde_json::Value) -> ServiceParams {
        let mut base = json!({"serviceid": 1});
        base.as_object_mut()
            .unwrap()
            .extend(value.as_object().unwrap().clone());
        serde_json::from_value(base).unwrap()
    }

    #[test]
    fn test_label_wins_over_every_other_source() {
        let p = params(json!({
            "configoptions": {"Memory (MB)": "4096", "memory": "2048"},
            "customfields": {"Memory (MB)": "1024", "memory": "512"},
            "configoption3": "256"
        }));
        let resolver = OptionResolver::new(&p);
        assert_eq!(
            resolver.resolve_with_source("memory"),
            Some(("4096".to_string(), "config option by label"))
        );
    }

    #[test]
    fn test_precedence_order() {
        let p = params(json!({
            "configoptions": {"memory": "2048"},
            "customfields": {"Memory (MB)": "1024", "memory": "512"},
            "configoption3": "256"
        }));
        assert_eq!(OptionResolver::new(&p).get("memory").as_deref(), Some("2048"));

        let p = params(json!({
            "customfields": {"Memory (MB)": "1024", "memory": "512"},
            "configoption3": "256"
        }));
        assert_eq!(OptionResolver::new(&p).get("memory").as_deref(), Some("1024"));

        let p = params(json!({
            "customfields": {"memory": "512"},
            "configoption3": "256"
        }));
        assert_eq!(OptionResolver::new(&p).get("memory").as_deref(), Some("512"));

        let p = params(json!({"configoption3": "256"}));
        assert_eq!(
            OptionResolver::new(&p).resolve_with_source("memory"),
            Some(("256".to_string(), "positional option"))
        );
    }

    #[test]
    fn test_empty_strings_fall_through() {
        let p = params(json!({
            "configoptions": {"Memory (MB)": "", "memory": ""},
            "customfields": {"Memory (MB)": ""},
            "configoption3": "768"
        }));
        assert_eq!(OptionResolver::new(&p).get("memory").as_deref(), Some("768"));
    }

    #[test]
    fn test_default_returned_unchanged_when_absent() {
        let p = params(json!({"configoptions": {"memory": ""}}));
        let resolver = OptionResolver::new(&p);
        assert_eq!(resolver.get("memory"), None);
        assert_eq!(resolver.get_or("memory", "fallback"), "fallback");
        assert_eq!(resolver.get_i64_or("io", 500).unwrap(), 500);
    }

    #[test]
    fn test_unlisted_options_resolve_by_key_only() {
        let p = params(json!({
            "configoptions": {"SERVER_JARFILE": "paper.jar"},
            "configoption1": "ignored"
        }));
        let resolver = OptionResolver::new(&p);
        assert_eq!(resolver.get("SERVER_JARFILE").as_deref(), Some("paper.jar"));
        assert_eq!(resolver.get("username"), None);
    }

    #[test]
    fn test_numeric_options() {
        let p = params(json!({"configoptions": {"cpu": " 150 ", "disk": "lots"}}));
        let resolver = OptionResolver::new(&p);
        assert_eq!(resolver.get_i64("cpu").unwrap(), Some(150));
        assert_eq!(resolver.get_u64("cpu").unwrap(), Some(150));
        assert_eq!(
            resolver.get_i64("disk"),
            Err(OptionError::NotNumeric {
                key: "disk".to_string(),
                value: "lots".to_string()
            })
        );
        assert_eq!(resolver.get_i64("swap").unwrap(), None);
    }

    #[test]
    fn test_flags_and_lists() {
        let p = params(json!({
            "configoptions": {"dedicated_ip": "on", "oom_disabled": "0", "tags": "eu, ssd,,"}
        }));
        let resolver = OptionResolver::new(&p);
        assert!(resolver.flag("dedicated_ip"));
        assert!(!resolver.flag("oom_disabled"));
        assert!(!resolver.flag("backups"));
        assert_eq!(resolver.list("tags"), vec!["eu", "ssd"]);
    }
}
