//! Read-only views rendered by the host: client area data and admin link
//!
//! Never fail. When no server resolves, or the lookup errors, they degrade to
//! the panel's landing URL. Services of another module render nothing.

use serde::Serialize;
use tracing::debug;

use super::identity::resolve_server;
use super::Provisioner;
use crate::client::Server;
use crate::params::ServiceParams;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClientAreaVars {
    pub serviceurl: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientAreaView {
    pub templatefile: &'static str,
    pub vars: ClientAreaVars,
}

impl ClientAreaView {
    pub fn landing(base_url: &str) -> Self {
        Self {
            templatefile: "clientarea",
            vars: ClientAreaVars {
                serviceurl: base_url.to_string(),
                ..Default::default()
            },
        }
    }

    pub fn for_server(base_url: &str, server: &Server) -> Self {
        let primary = server.primary_allocation();
        Self {
            templatefile: "clientarea",
            vars: ClientAreaVars {
                serviceurl: format!("{}/server/{}", base_url, server.identifier),
                ip: primary.map(|a| a.ip.clone()),
                port: primary.map(|a| a.port),
            },
        }
    }
}

fn link(href: &str) -> String {
    format!(r#"<a href="{}" target="_blank">[Go to Service]</a>"#, href)
}

impl Provisioner {
    async fn lookup_for_view(&self, params: &ServiceParams) -> Option<Server> {
        match resolve_server(self.api(), self.host(), params.service_id).await {
            Ok(server) => server,
            Err(e) => {
                debug!(service_id = params.service_id, error = %e, "Server lookup failed, rendering landing view");
                None
            }
        }
    }

    pub async fn client_area(&self, params: &ServiceParams) -> Option<ClientAreaView> {
        if !params.is_own_module() {
            return None;
        }
        let base_url = self.api().base_url();
        let view = match self.lookup_for_view(params).await {
            Some(server) => ClientAreaView::for_server(base_url, &server),
            None => ClientAreaView::landing(base_url),
        };
        Some(view)
    }

    /// Admin-side link to the server's edit page
    pub async fn login_link(&self, params: &ServiceParams) -> Option<String> {
        if !params.is_own_module() {
            return None;
        }
        let base_url = self.api().base_url();
        let href = match self.lookup_for_view(params).await {
            Some(server) => link(&format!("{}/admin/servers/{}/edit", base_url, server.id)),
            None => link(base_url),
        };
        Some(href)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockPanel;
    use crate::client::HttpMethod;
    use crate::host::MemoryHostDatabase;
    use crate::lifecycle::testing::{params, provisioner, server_body};
    use serde_json::json;

    #[tokio::test]
    async fn test_client_area_for_server() {
        let panel = MockPanel::new().on(HttpMethod::Get, "servers/external/42", 200, server_body(9, 2));
        let (provisioner, _, _) = provisioner(panel, MemoryHostDatabase::new());

        let view = provisioner.client_area(&params(json!({}))).await.unwrap();
        assert_eq!(view.templatefile, "clientarea");
        assert_eq!(view.vars.serviceurl, "https://panel.example.com/server/1a7ce997");
        assert_eq!(view.vars.ip.as_deref(), Some("10.0.0.3"));
        assert_eq!(view.vars.port, Some(25565));
    }

    #[tokio::test]
    async fn test_client_area_degrades_on_panel_error() {
        let panel = MockPanel::new().on(HttpMethod::Get, "servers/external/42", 500, json!({}));
        let (provisioner, _, _) = provisioner(panel, MemoryHostDatabase::new());

        let view = provisioner.client_area(&params(json!({}))).await.unwrap();
        assert_eq!(view, ClientAreaView::landing("https://panel.example.com"));
        let rendered = serde_json::to_value(&view).unwrap();
        assert!(rendered["vars"].get("ip").is_none());
    }

    #[tokio::test]
    async fn test_login_link() {
        let panel = MockPanel::new().on(HttpMethod::Get, "servers/external/42", 200, server_body(9, 2));
        let (provisioner, _, _) = provisioner(panel, MemoryHostDatabase::new());
        assert_eq!(
            provisioner.login_link(&params(json!({}))).await.as_deref(),
            Some(r#"<a href="https://panel.example.com/admin/servers/9/edit" target="_blank">[Go to Service]</a>"#)
        );
    }

    #[tokio::test]
    async fn test_login_link_without_server() {
        let (provisioner, _, _) = provisioner(MockPanel::new(), MemoryHostDatabase::new());
        assert_eq!(
            provisioner.login_link(&params(json!({}))).await.as_deref(),
            Some(r#"<a href="https://panel.example.com" target="_blank">[Go to Service]</a>"#)
        );
    }

    #[tokio::test]
    async fn test_views_skip_other_modules() {
        let panel = MockPanel::new().on(HttpMethod::Get, "servers/external/42", 200, server_body(9, 2));
        let (provisioner, panel, _) = provisioner(panel, MemoryHostDatabase::new());
        let p = params(json!({"moduletype": "pterodactyl"}));

        assert!(provisioner.client_area(&p).await.is_none());
        assert!(provisioner.login_link(&p).await.is_none());
        assert_eq!(panel.call_count(), 0);
    }
}
