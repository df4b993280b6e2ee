//! Provisioning module connecting a WHMCS-style billing host to a Pelican
//! game-server panel.
//!
//! Each host lifecycle hook maps to one [`lifecycle::Provisioner`] operation
//! that talks to the panel's application API and returns the literal
//! `"success"` or a human-readable error string.

pub mod cli;
pub mod client;
pub mod config;
pub mod host;
pub mod lifecycle;
pub mod params;
pub mod ports;
pub mod resolver;

pub use client::{ApiRequest, ApiResponse, PanelApi, PanelClient};
pub use config::{load_config, ModuleConfig};
pub use host::{FileHostDatabase, HostDatabase, MemoryHostDatabase};
pub use lifecycle::{dispatch, LifecycleError, Operation, Provisioner, SUCCESS};
pub use params::ServiceParams;
