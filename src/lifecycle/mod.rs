//! Lifecycle operations invoked by the billing host
//!
//! Every operation is a short script against the panel with one failure
//! boundary: [`Provisioner::run`] converts any [`LifecycleError`] into the
//! message string the host shows verbatim, or returns [`SUCCESS`].

pub mod account;
pub mod connection;
pub mod create;
pub mod environment;
pub mod identity;
pub mod package;
pub mod render;
pub mod state;
pub mod suspension;

pub use connection::ConnectionReport;
pub use create::CreatedServer;
pub use environment::{build_environment, EnvironmentBase};
pub use identity::{resolve_server, resolve_server_id, resolve_server_ref, ServerRef};
pub use render::ClientAreaView;
pub use state::{Operation, ServiceState};

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info};

use crate::client::{ApiRequest, Egg, PanelApi, PanelClient, Server, MODULE_LOG};
use crate::config::ModuleConfig;
use crate::host::{HostDatabase, HostError};
use crate::params::{ParamsError, ServiceParams};
use crate::ports::PortError;
use crate::resolver::OptionError;

/// Literal marker the host treats as success
pub const SUCCESS: &str = "success";

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Failed to create server because it is already created.")]
    AlreadyCreated,

    #[error("{}", .0.missing_server_message())]
    ServerMissing(Operation),

    #[error("The password cannot be empty.")]
    EmptyPassword,

    #[error("Missing required option: {0}")]
    MissingOption(&'static str),

    #[error("Failed to {context}, received error code: {status}. Enable module debug log for more info.")]
    UnexpectedStatus { context: &'static str, status: u16 },

    #[error("Failed to get server, panel errored. Check panel logs for more info.")]
    PanelErrored,

    #[error("Couldn't find any nodes satisfying the request.")]
    NoDeployableNodes,

    #[error("Failed to create the server, received the error code: {0}. Enable module debug log for more info.")]
    ServerCreateFailed(u16),

    #[error("Failed to {context}: unexpected response from panel ({message})")]
    Decode { context: &'static str, message: String },

    #[error("Failed to set up panel client: {0}")]
    Client(String),

    #[error(transparent)]
    Ports(#[from] PortError),

    #[error(transparent)]
    InvalidOption(#[from] OptionError),

    #[error(transparent)]
    Params(#[from] ParamsError),

    #[error("Host database error: {0}")]
    Host(#[from] HostError),
}

impl LifecycleError {
    pub(crate) fn decode(context: &'static str, err: serde_json::Error) -> Self {
        Self::Decode {
            context,
            message: err.to_string(),
        }
    }
}

/// Message string for the host
pub fn outcome_message(result: Result<(), LifecycleError>) -> String {
    match result {
        Ok(()) => SUCCESS.to_string(),
        Err(e) => e.to_string(),
    }
}

/// Runs lifecycle operations against one panel
#[derive(Clone)]
pub struct Provisioner {
    api: Arc<dyn PanelApi>,
    host: Arc<dyn HostDatabase>,
}

impl Provisioner {
    pub fn new(api: Arc<dyn PanelApi>, host: Arc<dyn HostDatabase>) -> Self {
        Self { api, host }
    }

    /// Build a provisioner talking to the panel named in the host's params
    pub fn from_params(
        params: &ServiceParams,
        config: &ModuleConfig,
        host: Arc<dyn HostDatabase>,
    ) -> Result<Self, LifecycleError> {
        let url = params.panel_url()?;
        let client = PanelClient::new(url, params.server_token.clone(), config)
            .map_err(|e| LifecycleError::Client(e.to_string()))?;
        Ok(Self::new(Arc::new(client), host))
    }

    pub fn api(&self) -> &dyn PanelApi {
        self.api.as_ref()
    }

    pub fn host(&self) -> &dyn HostDatabase {
        self.host.as_ref()
    }

    /// The single failure boundary of a state-changing operation
    pub async fn run(&self, operation: Operation, params: &ServiceParams) -> String {
        let result = match operation {
            Operation::Create => self.create(params).await.map(|_| ()),
            Operation::Suspend => self.suspend(params).await,
            Operation::Unsuspend => self.unsuspend(params).await,
            Operation::Terminate => self.terminate(params).await,
            Operation::ChangePassword => self.change_password(params).await,
            Operation::ChangePackage => self.change_package(params).await,
        };

        match &result {
            Ok(()) => info!(
                operation = operation.name(),
                service_id = params.service_id,
                "Operation succeeded"
            ),
            Err(e) => error!(
                target: MODULE_LOG,
                operation = operation.name(),
                service_id = params.service_id,
                error = %e,
                "Operation failed"
            ),
        }
        outcome_message(result)
    }

    /// Resolve the service's server and check `operation` is valid against
    /// the state it implies. Nothing state-changing has happened yet.
    pub(crate) async fn guard(
        &self,
        operation: Operation,
        service_id: u64,
        want_record: bool,
    ) -> Result<ServerRef, LifecycleError> {
        let server =
            resolve_server_ref(self.api(), self.host(), service_id, want_record).await?;
        ServiceState::observe(server.as_ref()).transition(operation)?;
        server.ok_or(LifecycleError::ServerMissing(operation))
    }

    /// [`Provisioner::guard`] for operations that need the full record
    pub(crate) async fn guard_record(
        &self,
        operation: Operation,
        service_id: u64,
    ) -> Result<Server, LifecycleError> {
        self.guard(operation, service_id, true)
            .await?
            .into_record()
            .ok_or(LifecycleError::ServerMissing(operation))
    }

    pub(crate) async fn fetch_egg(&self, egg_id: u64) -> Result<Egg, LifecycleError> {
        let response = self
            .api
            .call(ApiRequest::get(format!("eggs/{}", egg_id)).query("include", "variables"))
            .await;
        if !response.is(200) {
            return Err(LifecycleError::UnexpectedStatus {
                context: "get egg data",
                status: response.status_code,
            });
        }
        response
            .attributes()
            .map_err(|e| LifecycleError::decode("get egg data", e))
    }
}

/// Build a provisioner from the host's params and run one operation.
/// Never fails: setup errors become the returned message as well.
pub async fn dispatch(
    operation: Operation,
    params: &ServiceParams,
    config: &ModuleConfig,
    host: Arc<dyn HostDatabase>,
) -> String {
    match Provisioner::from_params(params, config, host) {
        Ok(provisioner) => provisioner.run(operation, params).await,
        Err(e) => {
            error!(
                target: MODULE_LOG,
                operation = operation.name(),
                service_id = params.service_id,
                error = %e,
                "Operation failed"
            );
            e.to_string()
        }
    }
}
