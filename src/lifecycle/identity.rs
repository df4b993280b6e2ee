//! Resolve a host service to its panel server
//!
//! The panel stores the service id as the server's external id. Services
//! provisioned by older module versions are only known through the host's
//! legacy mapping table.

use tracing::debug;

use super::LifecycleError;
use crate::client::{ApiRequest, PanelApi, Server};
use crate::host::HostDatabase;

/// A resolved server: the full record, or just its id when it came from the
/// legacy table and the record was not requested
#[derive(Debug, Clone)]
pub enum ServerRef {
    Id(u64),
    Record(Box<Server>),
}

impl ServerRef {
    pub fn id(&self) -> u64 {
        match self {
            Self::Id(id) => *id,
            Self::Record(server) => server.id,
        }
    }

    pub fn record(&self) -> Option<&Server> {
        match self {
            Self::Id(_) => None,
            Self::Record(server) => Some(server),
        }
    }

    pub fn into_record(self) -> Option<Server> {
        match self {
            Self::Id(_) => None,
            Self::Record(server) => Some(*server),
        }
    }
}

/// Look up the server of `service_id`.
///
/// A 404 from the external-id lookup means "not created yet" and falls back
/// to the legacy table; a 500 is fatal. `None` means not created.
pub async fn resolve_server_ref(
    api: &dyn PanelApi,
    host: &dyn HostDatabase,
    service_id: u64,
    want_record: bool,
) -> Result<Option<ServerRef>, LifecycleError> {
    let response = api
        .call(
            ApiRequest::get(format!("servers/external/{}", service_id))
                .query("include", "allocations")
                .silent(),
        )
        .await;

    if response.is(200) {
        let server: Server = response
            .attributes()
            .map_err(|e| LifecycleError::decode("get server", e))?;
        return Ok(Some(ServerRef::Record(Box::new(server))));
    }
    if response.is(500) {
        return Err(LifecycleError::PanelErrored);
    }

    let Some(server_id) = host.legacy_server_id(service_id).await? else {
        return Ok(None);
    };
    debug!(service_id, server_id, "Server resolved through legacy mapping");

    if !want_record {
        return Ok(Some(ServerRef::Id(server_id)));
    }

    let response = api
        .call(ApiRequest::get(format!("servers/{}", server_id)).query("include", "allocations"))
        .await;
    if !response.is(200) {
        return Err(LifecycleError::UnexpectedStatus {
            context: "get server",
            status: response.status_code,
        });
    }
    let server: Server = response
        .attributes()
        .map_err(|e| LifecycleError::decode("get server", e))?;
    Ok(Some(ServerRef::Record(Box::new(server))))
}

pub async fn resolve_server_id(
    api: &dyn PanelApi,
    host: &dyn HostDatabase,
    service_id: u64,
) -> Result<Option<u64>, LifecycleError> {
    Ok(resolve_server_ref(api, host, service_id, false)
        .await?
        .map(|server| server.id()))
}

pub async fn resolve_server(
    api: &dyn PanelApi,
    host: &dyn HostDatabase,
    service_id: u64,
) -> Result<Option<Server>, LifecycleError> {
    Ok(resolve_server_ref(api, host, service_id, true)
        .await?
        .and_then(ServerRef::into_record))
}
