//! Product configuration options exposed to the billing admin
//!
//! The order of [`CONFIG_OPTIONS`] is part of the contract: hosts that only
//! pass positional `configoptionN` fields address an option by its 1-based
//! position in this list.

use serde::ser::SerializeMap;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Text,
    YesNo,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptionSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub kind: OptionKind,
    pub default: Option<&'static str>,
    /// Input width in the host's admin form; yes/no options have none
    pub size: Option<u32>,
}

const fn text(key: &'static str, label: &'static str, description: &'static str) -> OptionSpec {
    OptionSpec {
        key,
        label,
        description,
        kind: OptionKind::Text,
        default: None,
        size: Some(10),
    }
}

const fn wide_text(key: &'static str, label: &'static str, description: &'static str) -> OptionSpec {
    OptionSpec {
        size: Some(25),
        ..text(key, label, description)
    }
}

const fn yes_no(key: &'static str, label: &'static str, description: &'static str) -> OptionSpec {
    OptionSpec {
        key,
        label,
        description,
        kind: OptionKind::YesNo,
        default: None,
        size: None,
    }
}

pub const CONFIG_OPTIONS: &[OptionSpec] = &[
    text("cpu", "CPU Limit (%)", "Amount of CPU to assign to the created server."),
    text("disk", "Disk Space (MB)", "Amount of Disk Space to assign to the created server."),
    text("memory", "Memory (MB)", "Amount of Memory to assign to the created server."),
    text("swap", "Swap (MB)", "Amount of Swap to assign to the created server."),
    text("location_id", "Location ID", "ID of the Location to automatically deploy to."),
    yes_no("dedicated_ip", "Dedicated IP", "Assign dedicated ip to the server (optional)"),
    text("egg_id", "Egg ID", "ID of the Egg for the server to use."),
    OptionSpec {
        default: Some("500"),
        ..text("io", "Block IO Weight", "Block IO Adjustment number (10-1000)")
    },
    // Unused, keeps the positions of the options after it stable
    text("pack_id", "Pack ID", "ID of the Pack to install the server with (optional)"),
    wide_text(
        "port_range",
        "Port Range",
        "Port ranges seperated by comma to assign to the server (Example: 25565-25570,25580-25590) (optional)",
    ),
    wide_text("startup", "Startup", "Custom startup command to assign to the created server (optional)"),
    wide_text("image", "Image", "Custom Docker image to assign to the created server (optional)"),
    text(
        "databases",
        "Databases",
        "Client will be able to create this amount of databases for their server (optional)",
    ),
    wide_text("server_name", "Server Name", "The name of the server as shown on the panel (optional)"),
    yes_no("oom_disabled", "Disable OOM Killer", "Should the Out Of Memory Killer be disabled (optional)"),
    text(
        "backups",
        "Backups",
        "Client will be able to create this amount of backups for their server (optional)",
    ),
    text(
        "allocations",
        "Allocations",
        "Client will be able to create this amount of allocations for their server (optional)",
    ),
    text("tags", "Node Tags", "Comma separated node tags to deploy to instead of a location (optional)"),
];

/// Look up an option and its 1-based position
pub fn find_option(key: &str) -> Option<(usize, &'static OptionSpec)> {
    CONFIG_OPTIONS
        .iter()
        .enumerate()
        .find(|(_, spec)| spec.key == key)
        .map(|(idx, spec)| (idx + 1, spec))
}

/// Config-option schema keyed the way the host expects it, in canonical order
pub struct ConfigOptionSchema;

impl Serialize for ConfigOptionSchema {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(CONFIG_OPTIONS.len()))?;
        for spec in CONFIG_OPTIONS {
            map.serialize_entry(spec.key, &SchemaEntry::from(spec))?;
        }
        map.end()
    }
}

#[derive(Serialize)]
struct SchemaEntry {
    #[serde(rename = "FriendlyName")]
    label: &'static str,
    #[serde(rename = "Description")]
    description: &'static str,
    #[serde(rename = "Type")]
    kind: OptionKind,
    #[serde(rename = "Size", skip_serializing_if = "Option::is_none")]
    size: Option<u32>,
    #[serde(rename = "Default", skip_serializing_if = "Option::is_none")]
    default: Option<&'static str>,
}

impl From<&OptionSpec> for SchemaEntry {
    fn from(spec: &OptionSpec) -> Self {
        Self {
            label: spec.label,
            description: spec.description,
            kind: spec.kind,
            size: spec.size,
            default: spec.default,
        }
    }
}

pub fn config_options() -> ConfigOptionSchema {
    ConfigOptionSchema
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ModuleMetadata {
    #[serde(rename = "DisplayName")]
    pub display_name: &'static str,
    #[serde(rename = "APIVersion")]
    pub api_version: &'static str,
    #[serde(rename = "RequiresServer")]
    pub requires_server: bool,
}

pub fn metadata() -> ModuleMetadata {
    ModuleMetadata {
        display_name: "Pelican",
        api_version: "1.1",
        requires_server: true,
    }
}
