//! Typed views of the panel's application API resources
//!
//! The panel wraps every resource as `{ "object": ..., "attributes": {...} }`
//! and every list as `{ "data": [ ... ], "meta": { "pagination": {...} } }`.
//! Only the fields the provisioning flows read are modelled here.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A list relationship or listing body: `{ "data": [ { "attributes": T } ] }`
#[derive(Debug, Clone, Deserialize)]
pub struct List<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<Item<T>>,
}

impl<T> Default for List<T> {
    fn default() -> Self {
        Self { data: Vec::new() }
    }
}

impl<T> List<T> {
    pub fn into_attributes(self) -> Vec<T> {
        self.data.into_iter().map(|item| item.attributes).collect()
    }

    pub fn first(&self) -> Option<&T> {
        self.data.first().map(|item| &item.attributes)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Item<T> {
    pub attributes: T,
}

/// `meta.pagination` of a listing response
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Pagination {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub per_page: u64,
    #[serde(default)]
    pub current_page: u64,
    #[serde(default)]
    pub total_pages: u64,
}

impl Pagination {
    pub fn has_next_page(&self) -> bool {
        self.current_page < self.total_pages
    }
}

/// Panel user account
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct User {
    pub id: u64,
    #[serde(default)]
    pub external_id: Option<String>,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Resource limits of a server build
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Limits {
    #[serde(default)]
    pub memory: i64,
    /// -1 means unlimited swap
    #[serde(default)]
    pub swap: i64,
    #[serde(default)]
    pub disk: i64,
    #[serde(default)]
    pub io: i64,
    #[serde(default)]
    pub cpu: i64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct FeatureLimits {
    #[serde(default)]
    pub databases: Option<u64>,
    #[serde(default)]
    pub allocations: Option<u64>,
    #[serde(default)]
    pub backups: Option<u64>,
}

/// Container state of a server
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Container {
    #[serde(default)]
    pub startup_command: String,
    #[serde(default)]
    pub image: String,
    /// Values may arrive as strings, numbers or booleans
    #[serde(default)]
    pub environment: HashMap<String, Value>,
}

impl Container {
    /// Current value of an environment variable rendered as a string
    pub fn env_value(&self, key: &str) -> Option<String> {
        match self.environment.get(key)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerRelationships {
    #[serde(default)]
    pub allocations: List<Allocation>,
}

/// Panel server
#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub id: u64,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub name: String,
    pub user: u64,
    #[serde(default)]
    pub egg: u64,
    #[serde(default)]
    pub node: u64,
    /// Primary allocation id
    #[serde(default)]
    pub allocation: u64,
    #[serde(default)]
    pub suspended: bool,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub feature_limits: FeatureLimits,
    #[serde(default)]
    pub container: Container,
    #[serde(default)]
    pub relationships: ServerRelationships,
}

impl Server {
    pub fn is_suspended(&self) -> bool {
        self.suspended || self.status.as_deref() == Some("suspended")
    }

    /// The primary allocation, when the response included allocations
    pub fn primary_allocation(&self) -> Option<&Allocation> {
        let allocations = &self.relationships.allocations.data;
        allocations
            .iter()
            .map(|item| &item.attributes)
            .find(|a| a.id == self.allocation)
            .or_else(|| allocations.first().map(|item| &item.attributes))
    }
}

/// Environment variable definition of an egg
#[derive(Debug, Clone, Deserialize)]
pub struct EggVariable {
    pub name: String,
    pub env_variable: String,
    #[serde(default)]
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EggRelationships {
    #[serde(default)]
    pub variables: List<EggVariable>,
}

/// Software template a server is built from
#[derive(Debug, Clone, Deserialize)]
pub struct Egg {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub docker_image: Option<String>,
    #[serde(default)]
    pub docker_images: BTreeMap<String, String>,
    #[serde(default)]
    pub startup: String,
    #[serde(default)]
    pub relationships: EggRelationships,
}

impl Egg {
    /// `docker_image`, else the first entry of `docker_images`
    pub fn default_image(&self) -> String {
        self.docker_image
            .clone()
            .filter(|image| !image.is_empty())
            .or_else(|| self.docker_images.values().next().cloned())
            .unwrap_or_default()
    }

    pub fn variables(&self) -> impl Iterator<Item = &EggVariable> {
        self.relationships
            .variables
            .data
            .iter()
            .map(|item| &item.attributes)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Node {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A single IP:port pair owned by a node
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Allocation {
    pub id: u64,
    pub ip: String,
    #[serde(default)]
    pub alias: Option<String>,
    pub port: u16,
    /// Missing flag means the allocation is free
    #[serde(default)]
    pub assigned: bool,
}
