//! Change package: push new build limits and startup configuration

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use super::environment::{build_environment, EnvironmentBase};
use super::state::Operation;
use super::{LifecycleError, Provisioner};
use crate::client::{ApiRequest, Egg, FeatureLimits, Limits, Server};
use crate::params::ServiceParams;
use crate::resolver::{OptionError, OptionResolver};

#[derive(Debug, Serialize)]
struct BuildUpdate {
    allocation: u64,
    #[serde(flatten)]
    limits: Limits,
    oom_disabled: bool,
    feature_limits: FeatureLimits,
}

#[derive(Debug, Serialize)]
struct StartupUpdate {
    startup: String,
    environment: BTreeMap<String, String>,
    egg: u64,
    image: String,
    skip_scripts: bool,
}

/// Limits from options, each falling back to the server's current value
fn updated_limits(resolver: &OptionResolver<'_>, current: &Limits) -> Result<Limits, OptionError> {
    Ok(Limits {
        memory: resolver.get_i64_or("memory", current.memory)?,
        swap: resolver.get_i64_or("swap", current.swap)?,
        disk: resolver.get_i64_or("disk", current.disk)?,
        io: resolver.get_i64_or("io", current.io)?,
        cpu: resolver.get_i64_or("cpu", current.cpu)?,
    })
}

/// Quotas from options. `allocations` here is the customer's allocation
/// quota, never a port count.
fn updated_feature_limits(
    resolver: &OptionResolver<'_>,
    current: &FeatureLimits,
) -> Result<FeatureLimits, OptionError> {
    Ok(FeatureLimits {
        databases: resolver.get_u64("databases")?.or(current.databases),
        allocations: resolver.get_u64("allocations")?.or(current.allocations),
        backups: resolver.get_u64("backups")?.or(current.backups),
    })
}

impl Provisioner {
    pub async fn change_package(&self, params: &ServiceParams) -> Result<(), LifecycleError> {
        let server = self
            .guard_record(Operation::ChangePackage, params.service_id)
            .await?;
        let resolver = OptionResolver::new(params);

        self.update_build(&server, &resolver).await?;
        self.update_startup(&server, &resolver).await?;

        info!(server_id = server.id, "Package changed");
        Ok(())
    }

    async fn update_build(
        &self,
        server: &Server,
        resolver: &OptionResolver<'_>,
    ) -> Result<(), LifecycleError> {
        let body = BuildUpdate {
            allocation: server.allocation,
            limits: updated_limits(resolver, &server.limits)?,
            oom_disabled: resolver.flag("oom_disabled"),
            feature_limits: updated_feature_limits(resolver, &server.feature_limits)?,
        };
        let body = serde_json::to_value(&body)
            .map_err(|e| LifecycleError::decode("update build of the server", e))?;

        let response = self
            .api()
            .call(ApiRequest::patch(format!("servers/{}/build", server.id), body))
            .await;
        if !response.is(200) {
            return Err(LifecycleError::UnexpectedStatus {
                context: "update build of the server",
                status: response.status_code,
            });
        }
        Ok(())
    }

    async fn update_startup(
        &self,
        server: &Server,
        resolver: &OptionResolver<'_>,
    ) -> Result<(), LifecycleError> {
        let egg_id = resolver.get_u64("egg_id")?.unwrap_or(server.egg);
        let egg = self.fetch_egg(egg_id).await?;

        let body = StartupUpdate {
            startup: resolver.get_or_else("startup", || current_startup(server, &egg)),
            environment: build_environment(
                &egg,
                resolver,
                EnvironmentBase::Current(&server.container),
            ),
            egg: egg.id,
            image: resolver.get_or_else("image", || server.container.image.clone()),
            skip_scripts: false,
        };
        let body = serde_json::to_value(&body)
            .map_err(|e| LifecycleError::decode("update startup of the server", e))?;

        let response = self
            .api()
            .call(ApiRequest::patch(format!("servers/{}/startup", server.id), body))
            .await;
        if !response.is(200) {
            return Err(LifecycleError::UnexpectedStatus {
                context: "update startup of the server",
                status: response.status_code,
            });
        }
        Ok(())
    }
}

/// The server's own startup command, or the egg's when the panel reports none
fn current_startup(server: &Server, egg: &Egg) -> String {
    if server.container.startup_command.is_empty() {
        egg.startup.clone()
    } else {
        server.container.startup_command.clone()
    }
}
