//! Panel user accounts: resolution at create time and password changes

use serde::Serialize;
use tracing::{debug, info, warn};

use super::state::Operation;
use super::{LifecycleError, Provisioner};
use crate::client::{ApiRequest, User};
use crate::params::ServiceParams;
use crate::resolver::OptionResolver;

const USERNAME_LEN: usize = 8;

/// Random lowercase name for new panel accounts and default server names
pub fn generate_username() -> String {
    uuid::Uuid::new_v4()
        .as_bytes()
        .iter()
        .take(USERNAME_LEN)
        .map(|b| char::from(b'a' + b % 26))
        .collect()
}

#[derive(Debug, Serialize)]
struct NewUser<'a> {
    username: String,
    email: &'a str,
    first_name: &'a str,
    last_name: &'a str,
    external_id: String,
}

/// Full user record; the panel rejects partial updates
#[derive(Debug, Serialize)]
struct UserUpdate<'a> {
    username: &'a str,
    email: &'a str,
    first_name: &'a str,
    last_name: &'a str,
    password: &'a str,
}

impl Provisioner {
    /// Find the panel account of the ordering customer, creating it if needed.
    ///
    /// Lookup order: external id (the host's client id), then an email
    /// search preferring an exact match, then a new account.
    pub(crate) async fn resolve_user(
        &self,
        params: &ServiceParams,
        resolver: &OptionResolver<'_>,
    ) -> Result<u64, LifecycleError> {
        let client = &params.client;
        let response = self
            .api()
            .call(ApiRequest::get(format!("users/external/{}", client.id)).silent())
            .await;

        if response.is(200) {
            let user: User = response
                .attributes()
                .map_err(|e| LifecycleError::decode("get user", e))?;
            return Ok(user.id);
        }
        if !response.is(404) {
            return Err(LifecycleError::UnexpectedStatus {
                context: "create user",
                status: response.status_code,
            });
        }

        let response = self
            .api()
            .call(ApiRequest::get("users").query("filter[email]", client.email.clone()))
            .await;
        if !response.is(200) {
            return Err(LifecycleError::UnexpectedStatus {
                context: "create user",
                status: response.status_code,
            });
        }
        let users: Vec<User> = response
            .data()
            .map_err(|e| LifecycleError::decode("search users", e))?;
        let matched = users
            .iter()
            .find(|user| user.email == client.email)
            .or_else(|| users.first());
        if let Some(user) = matched {
            debug!(user_id = user.id, "Found panel user by email");
            return Ok(user.id);
        }

        let body = NewUser {
            username: resolver.get_or_else("username", generate_username),
            email: &client.email,
            first_name: &client.first_name,
            last_name: &client.last_name,
            external_id: client.id.to_string(),
        };
        let body = serde_json::to_value(&body).map_err(|e| LifecycleError::decode("create user", e))?;
        let response = self.api().call(ApiRequest::post("users", body)).await;
        if !(response.is(200) || response.is(201)) {
            return Err(LifecycleError::UnexpectedStatus {
                context: "create user",
                status: response.status_code,
            });
        }
        let user: User = response
            .attributes()
            .map_err(|e| LifecycleError::decode("create user", e))?;
        info!(user_id = user.id, username = %user.username, "Created panel user");
        Ok(user.id)
    }

    pub async fn change_password(&self, params: &ServiceParams) -> Result<(), LifecycleError> {
        if params.password.is_empty() {
            return Err(LifecycleError::EmptyPassword);
        }

        let server = self
            .guard_record(Operation::ChangePassword, params.service_id)
            .await?;

        let response = self
            .api()
            .call(ApiRequest::get(format!("users/{}", server.user)))
            .await;
        if !response.is(200) {
            return Err(LifecycleError::UnexpectedStatus {
                context: "retrieve user",
                status: response.status_code,
            });
        }
        let user: User = response
            .attributes()
            .map_err(|e| LifecycleError::decode("retrieve user", e))?;

        let body = UserUpdate {
            username: &user.username,
            email: &user.email,
            first_name: &user.first_name,
            last_name: &user.last_name,
            password: &params.password,
        };
        let body =
            serde_json::to_value(&body).map_err(|e| LifecycleError::decode("change password", e))?;
        let response = self
            .api()
            .call(ApiRequest::patch(format!("users/{}", user.id), body))
            .await;
        if !response.is(200) {
            return Err(LifecycleError::UnexpectedStatus {
                context: "change password",
                status: response.status_code,
            });
        }

        if let Err(e) = self.host().clear_credentials(params.service_id).await {
            warn!(service_id = params.service_id, error = %e, "Failed to clear stored credentials");
        }
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

    fn user_body(id: u64, email: &str) -> serde_json::Value {
        json!({
            "object": "user",
            "attributes": {
                "id": id,
                "external_id": "7",
                "username": "jodoe",
                "email": email,
                "first_name": "Jo",
                "last_name": "Doe"
            }
        })
    }

    #[test]
    fn test_generate_username() {
        let name = generate_username();
        assert_eq!(name.len(), 8);
        assert!(name.chars().all(|c| c.is_ascii_lowercase()));
    }

    #[tokio::test]
    async fn test_resolve_user_by_external_id() {
        let panel = MockPanel::new().on(HttpMethod::Get, "users/external/7", 200, user_body(3, "jo@example.com"));
        let (provisioner, panel, _) = provisioner(panel, MemoryHostDatabase::new());
        let p = params(json!({}));

        let id = provisioner.resolve_user(&p, &OptionResolver::new(&p)).await.unwrap();
        assert_eq!(id, 3);
        assert_eq!(panel.call_count(), 1);
    }

    #[tokio::test]
    async fn test_resolve_user_prefers_exact_email_match() {
        let panel = MockPanel::new().on(
            HttpMethod::Get,
            "users",
            200,
            json!({"data": [
                user_body(11, "jo@example.com.au"),
                user_body(12, "jo@example.com")
            ]}),
        );
        let (provisioner, panel, _) = provisioner(panel, MemoryHostDatabase::new());
        let p = params(json!({}));

        let id = provisioner.resolve_user(&p, &OptionResolver::new(&p)).await.unwrap();
        assert_eq!(id, 12);
        let search = panel.find_call(HttpMethod::Get, "users").unwrap();
        assert!(search
            .query
            .contains(&("filter[email]".to_string(), "jo@example.com".to_string())));
        assert!(panel.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_user_creates_account() {
        let panel = MockPanel::new()
            .on(HttpMethod::Get, "users", 200, json!({"data": []}))
            .on(HttpMethod::Post, "users", 201, user_body(20, "jo@example.com"));
        let (provisioner, panel, _) = provisioner(panel, MemoryHostDatabase::new());
        let p = params(json!({"customfields": {"username": "jo_mc"}}));

        let id = provisioner.resolve_user(&p, &OptionResolver::new(&p)).await.unwrap();
        assert_eq!(id, 20);

        let body = panel.find_call(HttpMethod::Post, "users").unwrap().body.unwrap();
        assert_eq!(body["username"], "jo_mc");
        assert_eq!(body["email"], "jo@example.com");
        assert_eq!(body["external_id"], "7");
    }

    #[tokio::test]
    async fn test_resolve_user_creation_failure() {
        let panel = MockPanel::new()
            .on(HttpMethod::Get, "users", 200, json!({"data": []}))
            .on(HttpMethod::Post, "users", 422, json!({}));
        let (provisioner, _, _) = provisioner(panel, MemoryHostDatabase::new());
        let p = params(json!({}));

        let err = provisioner
            .resolve_user(&p, &OptionResolver::new(&p))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to create user, received error code: 422. Enable module debug log for more info."
        );
    }

    #[tokio::test]
    async fn test_change_password_rejects_empty_password() {
        let (provisioner, panel, _) = provisioner(MockPanel::new(), MemoryHostDatabase::new());
        let err = provisioner
            .change_password(&params(json!({"password": ""})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "The password cannot be empty.");
        assert_eq!(panel.call_count(), 0);
    }

    #[tokio::test]
    async fn test_change_password_without_server() {
        let (provisioner, panel, _) = provisioner(MockPanel::new(), MemoryHostDatabase::new());
        let err = provisioner.change_password(&params(json!({}))).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to change password because linked server doesn't exist."
        );
        assert!(panel.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn test_change_password_sends_full_user() {
        let panel = MockPanel::new()
            .on(HttpMethod::Get, "servers/external/42", 200, server_body(9, 3))
            .on(HttpMethod::Get, "users/3", 200, user_body(3, "jo@example.com"))
            .on(HttpMethod::Patch, "users/3", 200, user_body(3, "jo@example.com"));
        let host = MemoryHostDatabase::new().with_service(
            42,
            ServiceRecord {
                username: "jodoe".to_string(),
                password: "hunter2".to_string(),
                dedicated_ip: String::new(),
            },
        );
        let (provisioner, panel, host) = provisioner(panel, host);

        provisioner.change_password(&params(json!({}))).await.unwrap();

        let body = panel.find_call(HttpMethod::Patch, "users/3").unwrap().body.unwrap();
        assert_eq!(body["username"], "jodoe");
        assert_eq!(body["email"], "jo@example.com");
        assert_eq!(body["first_name"], "Jo");
        assert_eq!(body["password"], "hunter2");
        assert!(host.service(42).unwrap().password.is_empty());
    }
}
