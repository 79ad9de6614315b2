//! Mutation resolvers.

use async_graphql::{Context, Object, Result, ID};
use tracing::warn;

use super::schema::{
    AuthPayload, CreateUserInput, LoginInput, RegisterInput, UpdateUserInput, User,
};
use super::{backend, coded_error, require_admin, require_auth};

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Register a new account. Public.
    async fn register(&self, ctx: &Context<'_>, input: RegisterInput) -> Result<AuthPayload> {
        backend(ctx)?
            .register(input.into())
            .await
            .map(Into::into)
            .map_err(|e| {
                warn!(error = %e, "Registration failed");
                coded_error("Registration failed", "REGISTRATION_ERROR")
            })
    }

    /// Exchange credentials for a token. Public.
    async fn login(&self, ctx: &Context<'_>, input: LoginInput) -> Result<AuthPayload> {
        backend(ctx)?
            .login(input.into())
            .await
            .map(Into::into)
            .map_err(|e| {
                warn!(error = %e, "Login failed");
                coded_error("Login failed", "LOGIN_ERROR")
            })
    }

    async fn create_user(&self, ctx: &Context<'_>, input: CreateUserInput) -> Result<User> {
        let session = require_auth(ctx)?;
        backend(ctx)?
            .create_user(input.into(), &session.token)
            .await
            .map(Into::into)
            .map_err(|e| {
                warn!(error = %e, "User creation failed");
                coded_error("Failed to create user", "USER_CREATE_ERROR")
            })
    }

    async fn update_user(
        &self,
        ctx: &Context<'_>,
        id: ID,
        input: UpdateUserInput,
    ) -> Result<User> {
        let session = require_auth(ctx)?;
        backend(ctx)?
            .update_user(&id, input.into(), &session.token)
            .await
            .map(Into::into)
            .map_err(|e| {
                warn!(error = %e, user_id = %*id, "User update failed");
                coded_error(
                    format!("Failed to update user with id: {}", *id),
                    "USER_UPDATE_ERROR",
                )
            })
    }

    async fn delete_user(&self, ctx: &Context<'_>, id: ID) -> Result<User> {
        let session = require_auth(ctx)?;
        backend(ctx)?
            .delete_user(&id, &session.token)
            .await
            .map(Into::into)
            .map_err(|e| {
                warn!(error = %e, user_id = %*id, "User deletion failed");
                coded_error(
                    format!("Failed to delete user with id: {}", *id),
                    "USER_DELETE_ERROR",
                )
            })
    }

    /// Grant the admin role. Admin only.
    async fn promote_user(&self, ctx: &Context<'_>, id: ID) -> Result<User> {
        let session = require_admin(ctx).await?;
        backend(ctx)?
            .promote_user(&id, &session.token)
            .await
            .map(Into::into)
            .map_err(|e| {
                warn!(error = %e, user_id = %*id, "User promotion failed");
                coded_error(
                    format!("Failed to promote user with id: {}", *id),
                    "USER_PROMOTE_ERROR",
                )
            })
    }

    /// Revoke the admin role. Admin only.
    async fn demote_user(&self, ctx: &Context<'_>, id: ID) -> Result<User> {
        let session = require_admin(ctx).await?;
        backend(ctx)?
            .demote_user(&id, &session.token)
            .await
            .map(Into::into)
            .map_err(|e| {
                warn!(error = %e, user_id = %*id, "User demotion failed");
                coded_error(
                    format!("Failed to demote user with id: {}", *id),
                    "USER_DEMOTE_ERROR",
                )
            })
    }
}
