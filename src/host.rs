//! The billing host's own database, as far as this module touches it
//!
//! Three narrow uses: blank the credential display fields of a service, set
//! or clear its dedicated-IP display field, and read the legacy
//! service-to-server mapping table that older module versions maintained.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HostError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse host database: {0}")]
    Parse(String),

    #[error("Host database lock poisoned")]
    Poisoned,
}

/// Display fields of one service row
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServiceRecord {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub dedicated_ip: String,
}

/// Row of the legacy mapping table
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LegacyMapping {
    #[serde(default)]
    pub user_id: Option<u64>,
    #[serde(default)]
    pub server_id: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HostSnapshot {
    #[serde(default)]
    pub services: BTreeMap<u64, ServiceRecord>,
    /// `None` means the legacy table does not exist
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_products: Option<BTreeMap<u64, LegacyMapping>>,
}

impl HostSnapshot {
    fn clear_credentials(&mut self, service_id: u64) {
        let record = self.services.entry(service_id).or_default();
        record.username.clear();
        record.password.clear();
    }

    fn set_dedicated_ip(&mut self, service_id: u64, value: &str) {
        self.services.entry(service_id).or_default().dedicated_ip = value.to_string();
    }

    fn legacy_server_id(&self, service_id: u64) -> Option<u64> {
        self.legacy_products
            .as_ref()?
            .get(&service_id)?
            .server_id
    }
}

// ============================================================================
// SBIO: Trait for abstraction
// ============================================================================

#[async_trait]
pub trait HostDatabase: Send + Sync {
    /// Blank the stored username/password of a service
    async fn clear_credentials(&self, service_id: u64) -> Result<(), HostError>;

    /// Set the dedicated-IP display field; an empty value clears it
    async fn set_dedicated_ip(&self, service_id: u64, value: &str) -> Result<(), HostError>;

    /// Server id recorded by the legacy mapping table. `None` when the table
    /// is absent or has no usable row.
    async fn legacy_server_id(&self, service_id: u64) -> Result<Option<u64>, HostError>;
}

// ============================================================================
// In-memory implementation
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryHostDatabase {
    state: Mutex<HostSnapshot>,
}

impl MemoryHostDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: HostSnapshot) -> Self {
        Self {
            state: Mutex::new(snapshot),
        }
    }

    /// Create the legacy table (if needed) with one mapping row
    pub fn with_legacy_mapping(self, service_id: u64, server_id: u64) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.legacy_products.get_or_insert_with(BTreeMap::new).insert(
                service_id,
                LegacyMapping {
                    user_id: None,
                    server_id: Some(server_id),
                },
            );
        }
        self
    }

    pub fn with_service(self, service_id: u64, record: ServiceRecord) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.services.insert(service_id, record);
        }
        self
    }

    pub fn snapshot(&self) -> HostSnapshot {
        self.state
            .lock()
            .map(|state| state.clone())
            .unwrap_or_default()
    }

    pub fn service(&self, service_id: u64) -> Option<ServiceRecord> {
        self.snapshot().services.get(&service_id).cloned()
    }
}

#[async_trait]
impl HostDatabase for MemoryHostDatabase {
    async fn clear_credentials(&self, service_id: u64) -> Result<(), HostError> {
        self.state
            .lock()
            .map_err(|_| HostError::Poisoned)?
            .clear_credentials(service_id);
        Ok(())
    }

    async fn set_dedicated_ip(&self, service_id: u64, value: &str) -> Result<(), HostError> {
        self.state
            .lock()
            .map_err(|_| HostError::Poisoned)?
            .set_dedicated_ip(service_id, value);
        Ok(())
    }

    async fn legacy_server_id(&self, service_id: u64) -> Result<Option<u64>, HostError> {
        Ok(self
            .state
            .lock()
            .map_err(|_| HostError::Poisoned)?
            .legacy_server_id(service_id))
    }
}

// ============================================================================
// JSON file implementation (used by the CLI)
// ============================================================================

/// Host database persisted as a JSON snapshot, rewritten after every change
#[derive(Debug)]
pub struct FileHostDatabase {
    path: PathBuf,
    state: Mutex<HostSnapshot>,
}

impl FileHostDatabase {
    /// Open a snapshot file; a missing file starts empty
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, HostError> {
        let path = path.into();
        let snapshot = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                HostSnapshot::default()
            } else {
                serde_json::from_str(&content).map_err(|e| HostError::Parse(e.to_string()))?
            }
        } else {
            HostSnapshot::default()
        };
        Ok(Self {
            path,
            state: Mutex::new(snapshot),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update<F: FnOnce(&mut HostSnapshot)>(&self, change: F) -> Result<(), HostError> {
        let mut state = self.state.lock().map_err(|_| HostError::Poisoned)?;
        change(&mut state);
        let content =
            serde_json::to_string_pretty(&*state).map_err(|e| HostError::Parse(e.to_string()))?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

#[async_trait]
impl HostDatabase for FileHostDatabase {
    async fn clear_credentials(&self, service_id: u64) -> Result<(), HostError> {
        self.update(|state| state.clear_credentials(service_id))
    }

    async fn set_dedicated_ip(&self, service_id: u64, value: &str) -> Result<(), HostError> {
        self.update(|state| state.set_dedicated_ip(service_id, value))
    }

    async fn legacy_server_id(&self, service_id: u64) -> Result<Option<u64>, HostError> {
        Ok(self
            .state
            .lock()
            .map_err(|_| HostError::Poisoned)?
            .legacy_server_id(service_id))
    }
}
