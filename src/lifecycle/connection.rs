//! Connectivity check run from the host's server configuration screen

use serde::Serialize;
use tracing::info;

use super::Provisioner;
use crate::client::ApiRequest;

/// `{ success, error }` as the host expects it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionReport {
    pub success: bool,
    pub error: String,
}

impl ConnectionReport {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: String::new(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

/// What to suggest for a failing status
pub fn status_hint(status: u16) -> &'static str {
    match status {
        0 => "Check module debug log for more detailed error.",
        401 => "Authorization header either missing or not provided.",
        403 => "Double check the password (which should be the Application Key).",
        404 => "Result not found.",
        422 => "Validation error.",
        500 => "Panel errored, check panel logs.",
        _ => "None.",
    }
}

impl Provisioner {
    pub async fn test_connection(&self) -> ConnectionReport {
        let response = self.api().call(ApiRequest::get("nodes")).await;

        if !response.is(200) {
            return ConnectionReport::failed(format!(
                "Invalid status_code received: {}. Possible solutions: {}",
                response.status_code,
                status_hint(response.status_code)
            ));
        }
        if response.pagination().count == 0 {
            return ConnectionReport::failed("Authentication successful, but no nodes are available.");
        }

        info!(base_url = self.api().base_url(), "Panel connection verified");
        ConnectionReport::ok()
    }
}
