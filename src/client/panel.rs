use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{error, info, warn};

use super::models::{Item, List, Pagination};
use crate::config::ModuleConfig;

/// Tracing target of the module-call audit log
pub const MODULE_LOG: &str = "module_call";

// ============================================================================
// Data structures (pure, no I/O)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// POST and PATCH carry a JSON body
    pub fn carries_body(&self) -> bool {
        matches!(self, Self::Post | Self::Patch)
    }

    fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Patch => reqwest::Method::PATCH,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One call against the application API, relative to `/api/application/`
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub endpoint: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Silent calls skip the module-call log (existence checks)
    pub silent: bool,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            query: Vec::new(),
            body: None,
            silent: false,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, endpoint)
    }

    pub fn post(endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Post, endpoint).with_body(body)
    }

    pub fn patch(endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Patch, endpoint).with_body(body)
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, endpoint)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }
}

/// Parsed response body with the HTTP status merged in as `status_code`.
///
/// A status of `0` means no HTTP status could be obtained (connection refused,
/// timeout, TLS failure).
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status_code: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status_code: u16, body: Value) -> Self {
        let mut object = match body {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("body".to_string(), other);
                map
            }
        };
        object.insert("status_code".to_string(), json!(status_code));
        Self {
            status_code,
            body: Value::Object(object),
        }
    }

    pub fn transport_failure() -> Self {
        Self::new(0, Value::Null)
    }

    pub fn is(&self, status: u16) -> bool {
        self.status_code == status
    }

    pub fn is_transport_failure(&self) -> bool {
        self.status_code == 0
    }

    /// Deserialize the `attributes` object of a single-resource response
    pub fn attributes<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(self.body.get("attributes").unwrap_or(&Value::Null))
    }

    /// Deserialize `data[].attributes` of a listing response
    pub fn data<T: DeserializeOwned>(&self) -> Result<Vec<T>, serde_json::Error> {
        match self.body.get("data") {
            Some(data) => {
                let items: Vec<Item<T>> = Vec::deserialize(data)?;
                Ok(List { data: items }.into_attributes())
            }
            None => Ok(Vec::new()),
        }
    }

    pub fn pagination(&self) -> Pagination {
        self.body
            .pointer("/meta/pagination")
            .and_then(|p| Pagination::deserialize(p).ok())
            .unwrap_or_default()
    }

    /// `errors[].detail` strings
    pub fn error_details(&self) -> Vec<String> {
        self.body
            .get("errors")
            .and_then(Value::as_array)
            .map(|errors| {
                errors
                    .iter()
                    .filter_map(|e| e.get("detail").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

// ============================================================================
// SBIO: Trait for abstraction (allows mocking in tests)
// ============================================================================

#[async_trait]
pub trait PanelApi: Send + Sync {
    /// Perform one call. Never fails: transport errors surface as status 0.
    async fn call(&self, request: ApiRequest) -> ApiResponse;

    /// Base URL of the panel, used to build links
    fn base_url(&self) -> &str;
}

/// Failure to read a paginated listing
#[derive(Error, Debug, PartialEq)]
pub enum ListError {
    #[error("received status {0}")]
    Status(u16),

    #[error("malformed listing: {0}")]
    Decode(String),
}

/// Fetch every page of a listing, following `meta.pagination`
pub async fn list_all<T: DeserializeOwned>(
    api: &dyn PanelApi,
    request: ApiRequest,
) -> Result<Vec<T>, ListError> {
    let mut items = Vec::new();
    let mut page = 1;
    let mut response = api.call(request.clone()).await;

    loop {
        if !response.is(200) {
            return Err(ListError::Status(response.status_code));
        }
        let batch: Vec<T> = response
            .data()
            .map_err(|e| ListError::Decode(e.to_string()))?;
        items.extend(batch);

        let pagination = response.pagination();
        if !pagination.has_next_page() {
            break;
        }
        // Pages are only trusted while the panel moves along with us
        if page > 1 && pagination.current_page != page {
            warn!(
                endpoint = %request.endpoint,
                requested = page,
                received = pagination.current_page,
                "Panel did not advance pagination, stopping"
            );
            break;
        }
        page += 1;
        response = api.call(request.clone().query("page", page.to_string())).await;
    }

    Ok(items)
}

// ============================================================================
// SBIO: I/O implementation (real HTTP client)
// ============================================================================

#[derive(Clone)]
pub struct PanelClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl PanelClient {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        config: &ModuleConfig,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    pub fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/api/application/{}",
            self.base_url,
            endpoint.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl PanelApi for PanelClient {
    async fn call(&self, request: ApiRequest) -> ApiResponse {
        let url = self.url(&request.endpoint);

        let mut req = self
            .client
            .request(request.method.to_reqwest(), &url)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/json");

        if !request.query.is_empty() {
            req = req.query(&request.query);
        }

        if request.method.carries_body() {
            let body = request.body.clone().unwrap_or_else(|| json!({}));
            req = req.json(&body);
        }

        let response = match req.send().await {
            Ok(response) => response,
            Err(e) => {
                if !request.silent {
                    error!(
                        target: MODULE_LOG,
                        method = %request.method,
                        url = %url,
                        "transport error: {}",
                        e
                    );
                }
                return ApiResponse::transport_failure();
            }
        };

        let status = response.status().as_u16();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                warn!(target: MODULE_LOG, url = %url, "failed to read response body: {}", e);
                String::new()
            }
        };

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        let result = ApiResponse::new(status, body);

        if !request.silent {
            let request_body = request
                .body
                .as_ref()
                .map(Value::to_string)
                .unwrap_or_default();
            info!(
                target: MODULE_LOG,
                method = %request.method,
                url = %url,
                request = %request_body,
                response = %result.body,
                "panel call"
            );
        }

        result
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}

// ============================================================================
// SBIO: Mock implementation for testing (no I/O)
// ============================================================================


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_merged_into_body() {
        let resp = ApiResponse::new(200, json!({"attributes": {"id": 4}}));
        assert_eq!(resp.body["status_code"], 200);
        assert_eq!(resp.body["attributes"]["id"], 4);
    }

    #[test]
    fn test_transport_failure_is_status_zero() {
        let resp = ApiResponse::transport_failure();
        assert!(resp.is_transport_failure());
        assert_eq!(resp.body["status_code"], 0);
    }

    #[test]
    fn test_non_object_body_is_wrapped() {
        let resp = ApiResponse::new(502, Value::String("Bad Gateway".to_string()));
        assert_eq!(resp.body["body"], "Bad Gateway");
        assert_eq!(resp.body["status_code"], 502);
    }

    #[test]
    fn test_pagination_and_errors() {
        let resp = ApiResponse::new(
            422,
            json!({
                "meta": {"pagination": {"total": 3, "count": 2, "current_page": 1, "total_pages": 2}},
                "errors": [{"detail": "The email field is required."}, {"code": "x"}]
            }),
        );
        let page = resp.pagination();
        assert_eq!(page.total, 3);
        assert!(page.has_next_page());
        assert_eq!(resp.error_details(), vec!["The email field is required."]);
    }

    #[test]
    fn test_missing_pagination_defaults_to_empty() {
        let resp = ApiResponse::new(200, json!({}));
        assert_eq!(resp.pagination(), Pagination::default());
        assert!(resp.data::<serde_json::Value>().unwrap().is_empty());
    }

    #[test]
    fn test_request_builders() {
        let req = ApiRequest::get("users")
            .query("filter[email]", "a@b.c")
            .silent();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.query, vec![("filter[email]".to_string(), "a@b.c".to_string())]);
        assert!(req.silent);
        assert!(!req.method.carries_body());
        assert!(HttpMethod::Patch.carries_body());
    }

    #[test]
    fn test_url_joins_application_base() {
        let client = PanelClient::new(
            "https://panel.example.com/",
            "token",
            &ModuleConfig::default(),
        )
        .unwrap();
        assert_eq!(
            client.url("servers/external/12"),
            "https://panel.example.com/api/application/servers/external/12"
        );
    }

    #[tokio::test]
    async fn test_list_all_stops_when_page_does_not_advance() {
        let panel = mock::MockPanel::new().on(
            HttpMethod::Get,
            "nodes",
            200,
            json!({
                "data": [{"attributes": {"id": 1}}],
                "meta": {"pagination": {"current_page": 1, "total_pages": 2}}
            }),
        );

        let ids: Vec<Value> = list_all(&panel, ApiRequest::get("nodes")).await.unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(panel.call_count(), 2);
        assert!(panel.calls()[1]
            .query
            .contains(&("page".to_string(), "2".to_string())));
    }

    #[tokio::test]
    async fn test_list_all_follows_pages() {
        let panel = mock::MockPanel::new()
            .on(
                HttpMethod::Get,
                "nodes",
                200,
                json!({
                    "data": [{"attributes": {"id": 1}}],
                    "meta": {"pagination": {"current_page": 1, "total_pages": 2}}
                }),
            )
            .on(
                HttpMethod::Get,
                "nodes",
                200,
                json!({
                    "data": [{"attributes": {"id": 2}}],
                    "meta": {"pagination": {"current_page": 2, "total_pages": 2}}
                }),
            );

        let ids: Vec<Value> = list_all(&panel, ApiRequest::get("nodes")).await.unwrap();
        assert_eq!(ids, vec![json!({"id": 1}), json!({"id": 2})]);

        let calls = panel.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].query, vec![("page".to_string(), "2".to_string())]);
    }

    #[tokio::test]
    async fn test_list_all_status_error() {
        let panel = mock::MockPanel::new().on(HttpMethod::Get, "nodes", 403, json!({}));
        let result: Result<Vec<Value>, _> = list_all(&panel, ApiRequest::get("nodes")).await;
        assert_eq!(result, Err(ListError::Status(403)));
    }

    #[tokio::test]
    async fn test_mock_panel_scripted_responses() {
        let panel = mock::MockPanel::new()
            .on(HttpMethod::Get, "nodes", 500, json!({}))
            .on(HttpMethod::Get, "nodes", 200, json!({"data": []}));

        assert_eq!(panel.call(ApiRequest::get("nodes")).await.status_code, 500);
        assert_eq!(panel.call(ApiRequest::get("nodes")).await.status_code, 200);
        assert_eq!(panel.call(ApiRequest::get("nodes")).await.status_code, 200);
        assert_eq!(panel.call(ApiRequest::get("eggs/1")).await.status_code, 404);
        assert_eq!(panel.call_count(), 4);
    }
}
