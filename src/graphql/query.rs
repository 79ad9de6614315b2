//! Query resolvers.

use async_graphql::{Context, Object, Result, ID};
use tracing::warn;

use super::schema::{AdminStatsResponse, HealthStatus, User};
use super::{backend, coded_error, require_admin, require_auth};

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// Health check; reports the gateway itself when the upstream is down.
    async fn health(&self, ctx: &Context<'_>) -> Result<HealthStatus> {
        match backend(ctx)?.health().await {
            Ok(health) => Ok(health.into()),
            Err(e) => {
                warn!(error = %e, "Users service unavailable, returning gateway health");
                Ok(HealthStatus {
                    status: "OK".to_string(),
                    timestamp: chrono::Utc::now().to_rfc3339(),
                    service: "turnstile (users-service unavailable)".to_string(),
                })
            }
        }
    }

    /// The currently authenticated user.
    async fn me(&self, ctx: &Context<'_>) -> Result<User> {
        let session = require_auth(ctx)?;
        backend(ctx)?
            .current_user(&session.token)
            .await
            .map(Into::into)
            .map_err(|e| {
                warn!(error = %e, "Failed to fetch current user");
                coded_error("Failed to get current user", "USER_FETCH_ERROR")
            })
    }

    /// All users visible to the caller.
    async fn users(&self, ctx: &Context<'_>) -> Result<Vec<User>> {
        let session = require_auth(ctx)?;
        backend(ctx)?
            .list_users(&session.token)
            .await
            .map(|users| users.into_iter().map(Into::into).collect())
            .map_err(|e| {
                warn!(error = %e, "Failed to list users");
                coded_error("Failed to fetch users", "USERS_FETCH_ERROR")
            })
    }

    /// A single user by id.
    async fn user(&self, ctx: &Context<'_>, id: ID) -> Result<User> {
        let session = require_auth(ctx)?;
        backend(ctx)?
            .get_user(&id, &session.token)
            .await
            .map(Into::into)
            .map_err(|e| {
                warn!(error = %e, user_id = %*id, "Failed to fetch user");
                coded_error(
                    format!("Failed to fetch user with id: {}", *id),
                    "USER_FETCH_ERROR",
                )
            })
    }

    /// Aggregate statistics, admin only.
    async fn admin_stats(&self, ctx: &Context<'_>) -> Result<AdminStatsResponse> {
        let session = require_admin(ctx).await?;
        backend(ctx)?
            .admin_stats(&session.token)
            .await
            .map(Into::into)
            .map_err(|e| {
                warn!(error = %e, "Failed to fetch admin statistics");
                coded_error("Failed to fetch admin statistics", "ADMIN_STATS_ERROR")
            })
    }
}
