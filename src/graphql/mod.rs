//! GraphQL surface: schema types, resolvers, and auth guards.

pub mod mutation;
pub mod query;
pub mod schema;

pub use schema::{build_schema, field_catalog, GatewaySchema};

use async_graphql::{Context, Error, ErrorExtensions, Result};
use std::sync::Arc;
use tracing::warn;

use crate::session::Session;
use crate::upstream::UsersBackend;

/// Build a GraphQL error with a machine-readable `code` extension.
pub(crate) fn coded_error(message: impl Into<String>, code: &'static str) -> Error {
    Error::new(message).extend_with(|_, ext| ext.set("code", code))
}

pub(crate) fn backend<'a>(ctx: &'a Context<'_>) -> Result<&'a Arc<dyn UsersBackend>> {
    ctx.data::<Arc<dyn UsersBackend>>()
}

/// The session attached at request time, or an UNAUTHENTICATED error.
pub(crate) fn require_auth<'a>(ctx: &'a Context<'_>) -> Result<&'a Session> {
    ctx.data_opt::<Session>()
        .ok_or_else(|| coded_error("Authentication required", "UNAUTHENTICATED"))
}

/// Authenticated and admin, verified against the upstream.
///
/// The gateway's token decode is unverified, so the admin check always
/// round-trips to the users service.
pub(crate) async fn require_admin<'a>(ctx: &'a Context<'_>) -> Result<&'a Session> {
    let session = require_auth(ctx)?;
    let current = backend(ctx)?
        .current_user(&session.token)
        .await
        .map_err(|e| {
            warn!(error = %e, "Admin verification failed");
            coded_error("Failed to verify admin status", "FORBIDDEN")
        })?;

    if current.role != "admin" {
        return Err(coded_error("Admin access required", "FORBIDDEN"));
    }
    Ok(session)
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;

    use crate::upstream::{
        AdminStatsRecord, AuthRecord, CreateUserRequest, HealthRecord, LoginRequest,
        RegisterRequest, StatsRecord, UpdateUserRequest, UpstreamError, UserRecord, UsersBackend,
    };

    pub const USER_TOKEN: &str = "user-token";
    pub const ADMIN_TOKEN: &str = "admin-token";

    pub fn user(id: &str, role: &str) -> UserRecord {
        UserRecord {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            role: role.to_string(),
            phone_number: None,
            address: None,
            created_at: "2024-01-01T00:00:00Z".to_string(),
            updated_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    /// In-memory stand-in for the users service.
    pub struct FakeUsers {
        pub healthy: bool,
    }

    impl FakeUsers {
        pub fn new() -> Self {
            Self { healthy: true }
        }

        fn authorize(&self, token: &str) -> Result<UserRecord, UpstreamError> {
            match token {
                USER_TOKEN => Ok(user("1", "user")),
                ADMIN_TOKEN => Ok(user("2", "admin")),
                _ => Err(UpstreamError::Service("Invalid token".to_string())),
            }
        }
    }

    #[async_trait]
    impl UsersBackend for FakeUsers {
        async fn health(&self) -> Result<HealthRecord, UpstreamError> {
            if self.healthy {
                Ok(HealthRecord {
                    status: "OK".to_string(),
                    timestamp: "2024-01-01T00:00:00Z".to_string(),
                    service: "users-service".to_string(),
                })
            } else {
                Err(UpstreamError::Service("unavailable".to_string()))
            }
        }

        async fn register(&self, input: RegisterRequest) -> Result<AuthRecord, UpstreamError> {
            let mut created = user("3", "user");
            created.email = input.email;
            Ok(AuthRecord {
                token: USER_TOKEN.to_string(),
                user: created,
            })
        }

        async fn login(&self, input: LoginRequest) -> Result<AuthRecord, UpstreamError> {
            if input.password == "correct" {
                Ok(AuthRecord {
                    token: USER_TOKEN.to_string(),
                    user: user("1", "user"),
                })
            } else {
                Err(UpstreamError::Service("Invalid credentials".to_string()))
            }
        }

        async fn current_user(&self, token: &str) -> Result<UserRecord, UpstreamError> {
            self.authorize(token)
        }

        async fn list_users(&self, token: &str) -> Result<Vec<UserRecord>, UpstreamError> {
            self.authorize(token)?;
            Ok(vec![user("1", "user"), user("2", "admin")])
        }

        async fn get_user(&self, id: &str, token: &str) -> Result<UserRecord, UpstreamError> {
            self.authorize(token)?;
            Ok(user(id, "user"))
        }

        async fn create_user(
            &self,
            input: CreateUserRequest,
            token: &str,
        ) -> Result<UserRecord, UpstreamError> {
            self.authorize(token)?;
            let mut created = user("9", "user");
            created.email = input.email;
            Ok(created)
        }

        async fn update_user(
            &self,
            id: &str,
            input: UpdateUserRequest,
            token: &str,
        ) -> Result<UserRecord, UpstreamError> {
            self.authorize(token)?;
            let mut updated = user(id, "user");
            if let Some(first_name) = input.first_name {
                updated.first_name = first_name;
            }
            Ok(updated)
        }

        async fn delete_user(&self, id: &str, token: &str) -> Result<UserRecord, UpstreamError> {
            self.authorize(token)?;
            Ok(user(id, "user"))
        }

        async fn promote_user(&self, id: &str, token: &str) -> Result<UserRecord, UpstreamError> {
            self.authorize(token)?;
            Ok(user(id, "admin"))
        }

        async fn demote_user(&self, id: &str, token: &str) -> Result<UserRecord, UpstreamError> {
            self.authorize(token)?;
            Ok(user(id, "user"))
        }

        async fn admin_stats(&self, token: &str) -> Result<AdminStatsRecord, UpstreamError> {
            self.authorize(token)?;
            Ok(AdminStatsRecord {
                stats: StatsRecord {
                    total_users: 2,
                    total_admins: 1,
                    regular_users: 1,
                },
                recent_users: vec![user("1", "user")],
            })
        }
    }
}
