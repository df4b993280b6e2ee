//! Suspend, unsuspend and terminate

use tracing::{info, warn};

use super::state::Operation;
use super::{LifecycleError, Provisioner};
use crate::client::{ApiRequest, ApiResponse};
use crate::params::ServiceParams;

fn expect_no_content(response: &ApiResponse, context: &'static str) -> Result<(), LifecycleError> {
    if response.is(204) {
        Ok(())
    } else {
        Err(LifecycleError::UnexpectedStatus {
            context,
            status: response.status_code,
        })
    }
}

impl Provisioner {
    pub async fn suspend(&self, params: &ServiceParams) -> Result<(), LifecycleError> {
        let server_id = self
            .guard(Operation::Suspend, params.service_id, false)
            .await?
            .id();
        let response = self
            .api()
            .call(ApiRequest::post(format!("servers/{}/suspend", server_id), serde_json::json!({})))
            .await;
        expect_no_content(&response, "suspend the server")?;
        info!(server_id, "Server suspended");
        Ok(())
    }

    pub async fn unsuspend(&self, params: &ServiceParams) -> Result<(), LifecycleError> {
        let server_id = self
            .guard(Operation::Unsuspend, params.service_id, false)
            .await?
            .id();
        let response = self
            .api()
            .call(ApiRequest::post(format!("servers/{}/unsuspend", server_id), serde_json::json!({})))
            .await;
        expect_no_content(&response, "unsuspend the server")?;
        info!(server_id, "Server unsuspended");
        Ok(())
    }

    /// Delete the server. The dedicated-IP field is cleared whatever the
    /// panel answered.
    pub async fn terminate(&self, params: &ServiceParams) -> Result<(), LifecycleError> {
        let server_id = self
            .guard(Operation::Terminate, params.service_id, false)
            .await?
            .id();
        let response = self
            .api()
            .call(ApiRequest::delete(format!("servers/{}", server_id)))
            .await;

        if let Err(e) = self.host().set_dedicated_ip(params.service_id, "").await {
            warn!(service_id = params.service_id, error = %e, "Failed to clear dedicated IP");
        }

        expect_no_content(&response, "terminate the server")?;
        info!(server_id, "Server terminated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockPanel;
    use crate::client::HttpMethod;
    use crate::host::{MemoryHostDatabase, ServiceRecord};
    use crate::lifecycle::testing::{params, provisioner, server_body};
    use serde_json::json;

    fn host_with_ip() -> MemoryHostDatabase {
        MemoryHostDatabase::new().with_service(
            42,
            ServiceRecord {
                dedicated_ip: "10.0.0.3:25565".to_string(),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_missing_server_makes_no_state_change() {
        for (operation, message) in [
            ("suspend", "Failed to suspend server because it doesn't exist."),
            ("unsuspend", "Failed to unsuspend server because it doesn't exist."),
            ("terminate", "Failed to terminate server because it doesn't exist."),
        ] {
            let (provisioner, panel, _) = provisioner(MockPanel::new(), MemoryHostDatabase::new());
            let p = params(json!({}));
            let err = match operation {
                "suspend" => provisioner.suspend(&p).await,
                "unsuspend" => provisioner.unsuspend(&p).await,
                _ => provisioner.terminate(&p).await,
            }
            .unwrap_err();
            assert_eq!(err.to_string(), message);
            assert!(panel.mutating_calls().is_empty());
        }
    }

    #[tokio::test]
    async fn test_suspend_via_legacy_mapping() {
        let panel = MockPanel::new().on(HttpMethod::Post, "servers/1234/suspend", 204, json!({}));
        let host = MemoryHostDatabase::new().with_legacy_mapping(42, 1234);
        let (provisioner, panel, _) = provisioner(panel, host);

        provisioner.suspend(&params(json!({}))).await.unwrap();
        assert!(panel.find_call(HttpMethod::Post, "servers/1234/suspend").is_some());
        assert!(panel.find_call(HttpMethod::Get, "servers/1234").is_none());
    }

    #[tokio::test]
    async fn test_suspend_requires_no_content() {
        let panel = MockPanel::new()
            .on(HttpMethod::Get, "servers/external/42", 200, server_body(9, 2))
            .on(HttpMethod::Post, "servers/9/suspend", 200, json!({}));
        let (provisioner, _, _) = provisioner(panel, MemoryHostDatabase::new());

        let err = provisioner.suspend(&params(json!({}))).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to suspend the server, received error code: 200. Enable module debug log for more info."
        );
    }

    #[tokio::test]
    async fn test_terminate_clears_dedicated_ip() {
        let panel = MockPanel::new()
            .on(HttpMethod::Get, "servers/external/42", 200, server_body(9, 2))
            .on(HttpMethod::Delete, "servers/9", 204, json!({}));
        let (provisioner, _, host) = provisioner(panel, host_with_ip());

        provisioner.terminate(&params(json!({}))).await.unwrap();
        assert!(host.service(42).unwrap().dedicated_ip.is_empty());
    }

    #[tokio::test]
    async fn test_terminate_failure_still_clears_dedicated_ip() {
        let panel = MockPanel::new()
            .on(HttpMethod::Get, "servers/external/42", 200, server_body(9, 2))
            .on(HttpMethod::Delete, "servers/9", 500, json!({}));
        let (provisioner, _, host) = provisioner(panel, host_with_ip());

        let err = provisioner.terminate(&params(json!({}))).await.unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::UnexpectedStatus { context: "terminate the server", status: 500 }
        ));
        assert!(host.service(42).unwrap().dedicated_ip.is_empty());
    }
}
