//! HTTP client for the users service.
//!
//! The gateway owns no user data; every resolver forwards here. The service
//! speaks a JSON envelope (`{ success, data, error, count }`) over REST and
//! verifies the bearer token itself on every call.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

use crate::config::UpstreamConfig;

/// Errors from the upstream users service.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Transport-level failure (connect, timeout, malformed body)
    #[error("users service transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered but reported failure
    #[error("users service error: {0}")]
    Service(String),
}

/// Wire representation of a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub address: Option<AddressRecord>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressRecord {
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// Token plus user, returned by register and login.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthRecord {
    pub token: String,
    pub user: UserRecord,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsRecord {
    pub total_users: i64,
    pub total_admins: i64,
    pub regular_users: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStatsRecord {
    pub stats: StatsRecord,
    pub recent_users: Vec<UserRecord>,
}

/// Gateway-local health payload; also what `/health` on the service returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthRecord {
    pub status: String,
    pub timestamp: String,
    pub service: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<AddressRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub type CreateUserRequest = RegisterRequest;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<AddressRecord>,
}

/// The service's JSON envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    count: Option<u64>,
}

/// Abstraction over the users service so resolvers can be tested against a
/// fake backend.
#[async_trait]
pub trait UsersBackend: Send + Sync {
    async fn health(&self) -> Result<HealthRecord, UpstreamError>;
    async fn register(&self, input: RegisterRequest) -> Result<AuthRecord, UpstreamError>;
    async fn login(&self, input: LoginRequest) -> Result<AuthRecord, UpstreamError>;
    async fn current_user(&self, token: &str) -> Result<UserRecord, UpstreamError>;
    async fn list_users(&self, token: &str) -> Result<Vec<UserRecord>, UpstreamError>;
    async fn get_user(&self, id: &str, token: &str) -> Result<UserRecord, UpstreamError>;
    async fn create_user(
        &self,
        input: CreateUserRequest,
        token: &str,
    ) -> Result<UserRecord, UpstreamError>;
    async fn update_user(
        &self,
        id: &str,
        input: UpdateUserRequest,
        token: &str,
    ) -> Result<UserRecord, UpstreamError>;
    async fn delete_user(&self, id: &str, token: &str) -> Result<UserRecord, UpstreamError>;
    async fn promote_user(&self, id: &str, token: &str) -> Result<UserRecord, UpstreamError>;
    async fn demote_user(&self, id: &str, token: &str) -> Result<UserRecord, UpstreamError>;
    async fn admin_stats(&self, token: &str) -> Result<AdminStatsRecord, UpstreamError>;
}

/// reqwest-backed client for the real service.
pub struct HttpUsersClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpUsersClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        info!(url = %config.users_service_url, "Connecting users service client");
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.users_service_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and unwrap the service envelope.
    async fn envelope<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
        what: &'static str,
    ) -> Result<T, UpstreamError> {
        let response = builder.send().await.map_err(|e| {
            error!(what, error = %e, "Users service request failed");
            UpstreamError::Transport(e)
        })?;

        let status = response.status();
        let envelope: Envelope<T> = response.json().await.map_err(|e| {
            error!(what, %status, error = %e, "Users service returned an unreadable body");
            UpstreamError::Transport(e)
        })?;

        match envelope {
            Envelope {
                success: true,
                data: Some(data),
                ..
            } => Ok(data),
            Envelope { error, .. } => {
                let message = error.unwrap_or_else(|| format!("{what} failed"));
                error!(what, %status, error = %message, "Users service reported failure");
                Err(UpstreamError::Service(message))
            }
        }
    }
}

#[async_trait]
impl UsersBackend for HttpUsersClient {
    async fn health(&self) -> Result<HealthRecord, UpstreamError> {
        // The health endpoint answers bare, without the envelope.
        let response = self
            .client
            .get(self.url("/health"))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn register(&self, input: RegisterRequest) -> Result<AuthRecord, UpstreamError> {
        let builder = self.client.post(self.url("/api/auth/register")).json(&input);
        self.envelope(builder, "register").await
    }

    async fn login(&self, input: LoginRequest) -> Result<AuthRecord, UpstreamError> {
        let builder = self.client.post(self.url("/api/auth/login")).json(&input);
        self.envelope(builder, "login").await
    }

    async fn current_user(&self, token: &str) -> Result<UserRecord, UpstreamError> {
        let builder = self.client.get(self.url("/api/auth/me")).bearer_auth(token);
        self.envelope(builder, "current_user").await
    }

    async fn list_users(&self, token: &str) -> Result<Vec<UserRecord>, UpstreamError> {
        let builder = self.client.get(self.url("/api/users")).bearer_auth(token);
        self.envelope(builder, "list_users").await
    }

    async fn get_user(&self, id: &str, token: &str) -> Result<UserRecord, UpstreamError> {
        let builder = self
            .client
            .get(self.url(&format!("/api/users/{id}")))
            .bearer_auth(token);
        self.envelope(builder, "get_user").await
    }

    async fn create_user(
        &self,
        input: CreateUserRequest,
        token: &str,
    ) -> Result<UserRecord, UpstreamError> {
        let builder = self
            .client
            .post(self.url("/api/users"))
            .bearer_auth(token)
            .json(&input);
        self.envelope(builder, "create_user").await
    }

    async fn update_user(
        &self,
        id: &str,
        input: UpdateUserRequest,
        token: &str,
    ) -> Result<UserRecord, UpstreamError> {
        let builder = self
            .client
            .put(self.url(&format!("/api/users/{id}")))
            .bearer_auth(token)
            .json(&input);
        self.envelope(builder, "update_user").await
    }

    async fn delete_user(&self, id: &str, token: &str) -> Result<UserRecord, UpstreamError> {
        let builder = self
            .client
            .delete(self.url(&format!("/api/users/{id}")))
            .bearer_auth(token);
        self.envelope(builder, "delete_user").await
    }

    async fn promote_user(&self, id: &str, token: &str) -> Result<UserRecord, UpstreamError> {
        let builder = self
            .client
            .patch(self.url(&format!("/api/admin/{id}/promote")))
            .bearer_auth(token);
        self.envelope(builder, "promote_user").await
    }

    async fn demote_user(&self, id: &str, token: &str) -> Result<UserRecord, UpstreamError> {
        let builder = self
            .client
            .patch(self.url(&format!("/api/admin/{id}/demote")))
            .bearer_auth(token);
        self.envelope(builder, "demote_user").await
    }

    async fn admin_stats(&self, token: &str) -> Result<AdminStatsRecord, UpstreamError> {
        let builder = self.client.get(self.url("/api/admin/stats")).bearer_auth(token);
        self.envelope(builder, "admin_stats").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = HttpUsersClient::new(&UpstreamConfig {
            users_service_url: "http://localhost:3000/".to_string(),
            timeout_secs: 10,
        })
        .unwrap();

        assert_eq!(client.url("/api/users"), "http://localhost:3000/api/users");
    }

    #[test]
    fn test_envelope_shapes_parse() {
        let ok: Envelope<UserRecord> = serde_json::from_str(
            r#"{
                "success": true,
                "data": {
                    "id": "1",
                    "email": "a@b.c",
                    "firstName": "Ada",
                    "lastName": "Lovelace",
                    "role": "admin",
                    "createdAt": "2024-01-01T00:00:00Z",
                    "updatedAt": "2024-01-01T00:00:00Z"
                }
            }"#,
        )
        .unwrap();
        assert!(ok.success);
        let user = ok.data.unwrap();
        assert_eq!(user.first_name, "Ada");
        assert!(user.address.is_none());

        let failed: Envelope<UserRecord> =
            serde_json::from_str(r#"{ "success": false, "error": "User not found" }"#).unwrap();
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("User not found"));
    }

    #[test]
    fn test_update_request_omits_unset_fields() {
        let update = UpdateUserRequest {
            email: None,
            first_name: Some("Grace".to_string()),
            last_name: None,
            phone_number: None,
            address: None,
        };
        let body = serde_json::to_value(&update).unwrap();
        assert_eq!(body, serde_json::json!({ "firstName": "Grace" }));
    }
}
