//! The parameter bag the billing host passes to every lifecycle call
//!
//! The host serializes numbers as strings more often than not, and toggles as
//! `"on"`/`""`, so the deserializers here are lenient.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

/// Value of `moduletype` for services provisioned by this module
pub const MODULE_NAME: &str = "pelican";

#[derive(Error, Debug, PartialEq)]
pub enum ParamsError {
    #[error("Could not find the panel's hostname - did you configure server group for the product?")]
    MissingHostname,

    #[error("Invalid parameters: {0}")]
    Invalid(String),
}

/// Customer placing the order
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientDetails {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub id: u64,
    #[serde(default)]
    pub email: String,
    #[serde(default, rename = "firstname")]
    pub first_name: String,
    #[serde(default, rename = "lastname")]
    pub last_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceParams {
    #[serde(rename = "serviceid", deserialize_with = "lenient_u64")]
    pub service_id: u64,

    #[serde(default, rename = "moduletype")]
    pub module_type: String,

    #[serde(default, rename = "clientsdetails")]
    pub client: ClientDetails,

    /// Plaintext password the host holds for the service
    #[serde(default)]
    pub password: String,

    #[serde(default, rename = "serverhostname")]
    pub server_hostname: String,

    #[serde(default, rename = "serversecure", deserialize_with = "lenient_bool")]
    pub server_secure: bool,

    /// Application API key
    #[serde(default, rename = "serverpassword")]
    pub server_token: String,

    /// Product options keyed by friendly label or key
    #[serde(default, rename = "configoptions", deserialize_with = "string_map")]
    pub config_options: HashMap<String, String>,

    /// Per-order custom fields keyed by label or key
    #[serde(default, rename = "customfields", deserialize_with = "string_map")]
    pub custom_fields: HashMap<String, String>,

    /// Everything else, including positional `configoptionN` fields
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl ServiceParams {
    /// Parse the host's JSON parameter bag
    pub fn from_json(content: &str) -> Result<Self, ParamsError> {
        serde_json::from_str(content).map_err(|e| ParamsError::Invalid(e.to_string()))
    }

    /// Positional legacy option `configoptionN` (1-based)
    pub fn legacy_option(&self, position: usize) -> Option<String> {
        self.extra
            .get(&format!("configoption{}", position))
            .and_then(value_to_string)
    }

    /// Whether the host routed a service of this module here
    pub fn is_own_module(&self) -> bool {
        self.module_type == MODULE_NAME
    }

    /// Normalized panel base URL
    pub fn panel_url(&self) -> Result<String, ParamsError> {
        normalize_hostname(&self.server_hostname, self.server_secure)
    }
}

// ============================================================================
// SBIO: Pure functions (no I/O)
// ============================================================================

/// Build the panel base URL from the host's server record.
///
/// The host mangles some characters into words (`DOT`, `DASH`); those are
/// restored. Bare IPv4 addresses are always plain `http`.
pub fn normalize_hostname(hostname: &str, secure: bool) -> Result<String, ParamsError> {
    let hostname = hostname.trim();
    if hostname.is_empty() {
        return Err(ParamsError::MissingHostname);
    }

    let hostname = hostname.replace("DOT", ".").replace("DASH", "-");
    let hostname = hostname.trim_end_matches('/');

    if hostname.starts_with("http://") || hostname.starts_with("https://") {
        return Ok(hostname.to_string());
    }

    let scheme = if hostname.parse::<Ipv4Addr>().is_ok() || !secure {
        "http"
    } else {
        "https"
    };
    Ok(format!("{}://{}", scheme, hostname))
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(if *b { "on".to_string() } else { String::new() }),
        other => Some(other.to_string()),
    }
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| serde::de::Error::custom(format!("expected an unsigned id, got {}", n))),
        Value::String(s) if s.trim().is_empty() => Ok(0),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("expected a numeric id, got {:?}", s))),
        Value::Null => Ok(0),
        other => Err(serde::de::Error::custom(format!("expected an id, got {}", other))),
    }
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_i64().unwrap_or(0) != 0,
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "on" | "1" | "true" | "yes"),
        _ => false,
    })
}

fn string_map<'de, D: Deserializer<'de>>(deserializer: D) -> Result<HashMap<String, String>, D::Error> {
    // The host sends an empty list instead of an empty object
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => map
            .into_iter()
            .filter_map(|(k, v)| value_to_string(&v).map(|v| (k, v)))
            .collect(),
        _ => HashMap::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_params() {
        let json = r#"{
            "serviceid": "42",
            "moduletype": "pelican",
            "password": "hunter2",
            "serverhostname": "panelDOTexampleDOTcom",
            "serversecure": "on",
            "serverpassword": "papp_token",
            "clientsdetails": {"id": 7, "email": "jo@example.com", "firstname": "Jo", "lastname": "Doe"},
            "configoptions": {"Memory (MB)": "1024", "dedicated_ip": true},
            "customfields": [],
            "configoption1": "100",
            "configoption3": 2048
        }"#;

        let params = ServiceParams::from_json(json).unwrap();
        assert_eq!(params.service_id, 42);
        assert_eq!(params.client.id, 7);
        assert_eq!(params.client.first_name, "Jo");
        assert!(params.server_secure);
        assert_eq!(params.config_options["Memory (MB)"], "1024");
        assert_eq!(params.config_options["dedicated_ip"], "on");
        assert!(params.custom_fields.is_empty());
        assert_eq!(params.legacy_option(1).as_deref(), Some("100"));
        assert_eq!(params.legacy_option(3).as_deref(), Some("2048"));
        assert_eq!(params.legacy_option(2), None);
        assert_eq!(params.panel_url().unwrap(), "https://panel.example.com");
        assert!(params.is_own_module());
    }

    #[test]
    fn test_foreign_module_type() {
        let params = ServiceParams::from_json(r#"{"serviceid": 1, "moduletype": "cpanel"}"#).unwrap();
        assert!(!params.is_own_module());

        let params = ServiceParams::from_json(r#"{"serviceid": 1}"#).unwrap();
        assert!(!params.is_own_module());
    }

    #[test]
    fn test_missing_service_id_is_invalid() {
        let result = ServiceParams::from_json(r#"{"password": "x"}"#);
        assert!(matches!(result, Err(ParamsError::Invalid(_))));
    }

    #[test]
    fn test_normalize_hostname() {
        assert_eq!(
            normalize_hostname("panel.example.com/", false).unwrap(),
            "http://panel.example.com"
        );
        assert_eq!(
            normalize_hostname("gameDASHpanelDOTio", true).unwrap(),
            "https://game-panel.io"
        );
        assert_eq!(
            normalize_hostname("10.0.0.5", true).unwrap(),
            "http://10.0.0.5"
        );
        assert_eq!(
            normalize_hostname("https://panel.example.com", false).unwrap(),
            "https://panel.example.com"
        );
    }

    #[test]
    fn test_empty_hostname() {
        assert_eq!(normalize_hostname("  ", true), Err(ParamsError::MissingHostname));
    }
}
