//! Create: user, ports, egg, server, then host bookkeeping

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{info, warn};

use super::account::generate_username;
use super::environment::{build_environment, EnvironmentBase};
use super::identity::resolve_server_ref;
use super::state::{Operation, ServiceState};
use super::{LifecycleError, Provisioner};
use crate::client::{ApiRequest, Limits, Server};
use crate::params::ServiceParams;
use crate::ports::{allocate_ports, parse_port_ranges, DeploymentFilter, PortAssignment};
use crate::resolver::{OptionError, OptionResolver};

/// Outcome of a successful create
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatedServer {
    pub server_id: u64,
    pub identifier: String,
    /// `ip:port` recorded as the service's dedicated IP
    pub address: Option<String>,
    pub ports: Vec<PortAssignment>,
}

/// The two meanings of "allocations": the quota the customer may add
/// themselves, and how many ports were allocated here
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AllocationQuota {
    pub configured: Option<u64>,
    pub allocated: usize,
}

impl AllocationQuota {
    pub fn feature_limit(&self) -> u64 {
        self.configured.unwrap_or(self.allocated as u64)
    }
}

#[derive(Debug, Serialize)]
struct CreateFeatureLimits {
    databases: Option<u64>,
    allocations: u64,
    backups: Option<u64>,
}

#[derive(Debug, Serialize)]
struct AllocationTarget {
    default: u64,
}

#[derive(Debug, Serialize)]
struct Deployment {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    locations: Vec<u64>,
    dedicated_ip: bool,
    port_range: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ServerCreate {
    name: String,
    user: u64,
    egg: u64,
    docker_image: String,
    startup: String,
    environment: BTreeMap<String, String>,
    limits: Limits,
    feature_limits: CreateFeatureLimits,
    oom_disabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    allocation: Option<AllocationTarget>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deploy: Option<Deployment>,
    external_id: String,
    start_on_completion: bool,
}

#[derive(Debug, Serialize)]
struct AttachAllocations {
    allocation: u64,
    add_allocations: Vec<u64>,
}

fn required_i64(resolver: &OptionResolver<'_>, key: &'static str) -> Result<i64, LifecycleError> {
    resolver.get_i64(key)?.ok_or(LifecycleError::MissingOption(key))
}

fn create_limits(resolver: &OptionResolver<'_>) -> Result<Limits, LifecycleError> {
    Ok(Limits {
        memory: required_i64(resolver, "memory")?,
        swap: resolver.get_i64_or("swap", 0)?,
        disk: required_i64(resolver, "disk")?,
        io: resolver.get_i64_or("io", 500)?,
        cpu: required_i64(resolver, "cpu")?,
    })
}

fn deployment(resolver: &OptionResolver<'_>, port_range: Vec<String>) -> Result<Deployment, OptionError> {
    Ok(Deployment {
        tags: resolver.list("tags"),
        locations: resolver.get_u64("location_id")?.into_iter().collect(),
        dedicated_ip: resolver.flag("dedicated_ip"),
        port_range,
    })
}

impl Provisioner {
    pub async fn create(&self, params: &ServiceParams) -> Result<CreatedServer, LifecycleError> {
        let service_id = params.service_id;
        let existing = resolve_server_ref(self.api(), self.host(), service_id, false).await?;
        ServiceState::observe(existing.as_ref()).transition(Operation::Create)?;

        let resolver = OptionResolver::new(params);
        let egg_id = resolver
            .get_u64("egg_id")?
            .ok_or(LifecycleError::MissingOption("egg_id"))?;
        let limits = create_limits(&resolver)?;

        let user_id = self.resolve_user(params, &resolver).await?;

        let ranges = parse_port_ranges(&resolver.get_or("port_range", ""));
        let filter = DeploymentFilter {
            memory: limits.memory,
            disk: limits.disk,
            cpu: limits.cpu,
            tags: resolver.list("tags"),
        };
        let ports = allocate_ports(self.api(), ranges.clone(), &filter).await?;

        let egg = self.fetch_egg(egg_id).await?;
        let quota = AllocationQuota {
            configured: resolver.get_u64("allocations")?,
            allocated: ports.len(),
        };

        let (allocation, deploy) = match ports.first() {
            Some(primary) => (
                Some(AllocationTarget {
                    default: primary.allocation_id,
                }),
                None,
            ),
            None => (
                None,
                Some(deployment(
                    &resolver,
                    ranges.iter().map(ToString::to_string).collect(),
                )?),
            ),
        };

        let body = ServerCreate {
            name: resolver.get_or_else("server_name", || {
                format!("{}_{}", generate_username(), service_id)
            }),
            user: user_id,
            egg: egg.id,
            docker_image: resolver.get_or_else("image", || egg.default_image()),
            startup: resolver.get_or_else("startup", || egg.startup.clone()),
            environment: build_environment(&egg, &resolver, EnvironmentBase::EggDefaults),
            limits,
            feature_limits: CreateFeatureLimits {
                databases: resolver.get_u64("databases")?,
                allocations: quota.feature_limit(),
                backups: resolver.get_u64("backups")?,
            },
            oom_disabled: resolver.flag("oom_disabled"),
            allocation,
            deploy,
            external_id: service_id.to_string(),
            start_on_completion: true,
        };
        let body =
            serde_json::to_value(&body).map_err(|e| LifecycleError::decode("create the server", e))?;

        let response = self
            .api()
            .call(ApiRequest::post("servers", body).query("include", "allocations"))
            .await;
        if response.is(400) {
            return Err(LifecycleError::NoDeployableNodes);
        }
        if !response.is(201) {
            return Err(LifecycleError::ServerCreateFailed(response.status_code));
        }
        let server: Server = response
            .attributes()
            .map_err(|e| LifecycleError::decode("create the server", e))?;
        info!(server_id = server.id, identifier = %server.identifier, "Server created");

        if ports.len() > 1 {
            self.attach_extra_allocations(&server, &ports).await;
        }

        let address = server
            .relationships
            .allocations
            .first()
            .map(|a| format!("{}:{}", a.ip, a.port))
            .or_else(|| ports.first().map(PortAssignment::address));
        if let Some(address) = &address {
            if let Err(e) = self.host().set_dedicated_ip(service_id, address).await {
                warn!(service_id, error = %e, "Failed to record dedicated IP");
            }
        }
        if let Err(e) = self.host().clear_credentials(service_id).await {
            warn!(service_id, error = %e, "Failed to clear stored credentials");
        }

        Ok(CreatedServer {
            server_id: server.id,
            identifier: server.identifier,
            address,
            ports,
        })
    }

    /// Best effort: the server exists either way
    async fn attach_extra_allocations(&self, server: &Server, ports: &[PortAssignment]) {
        let Some((primary, extra)) = ports.split_first() else {
            return;
        };
        let body = AttachAllocations {
            allocation: primary.allocation_id,
            add_allocations: extra.iter().map(|p| p.allocation_id).collect(),
        };
        let body = match serde_json::to_value(&body) {
            Ok(body) => body,
            Err(e) => {
                warn!(server_id = server.id, error = %e, "Failed to encode extra allocations");
                return;
            }
        };

        let response = self
            .api()
            .call(ApiRequest::patch(format!("servers/{}/build", server.id), body))
            .await;
        if !response.is(200) {
            warn!(
                server_id = server.id,
                status = response.status_code,
                "Failed to attach extra allocations"
            );
        }
    }
}
