//! Schema types and construction.

use async_graphql::{EmptySubscription, Enum, InputObject, Schema, SimpleObject, ID};
use std::sync::Arc;

use crate::admission::FieldCatalog;
use crate::upstream::{self, UsersBackend};

use super::mutation::MutationRoot;
use super::query::QueryRoot;

pub type GatewaySchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// Build the executable schema with the upstream backend attached.
pub fn build_schema(backend: Arc<dyn UsersBackend>) -> GatewaySchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(backend)
        .finish()
}

/// Analysis metadata for the schema's fields.
///
/// List-valued fields fan out under the cost estimator; `adminStats`
/// carries a declared weight because it aggregates over the whole user
/// table upstream.
pub fn field_catalog() -> FieldCatalog {
    FieldCatalog::new()
        .list_field("users")
        .list_field("recentUsers")
        .weighted_field("adminStats", 10)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Clone, SimpleObject)]
pub struct Address {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, SimpleObject)]
pub struct User {
    pub id: ID,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub phone_number: Option<String>,
    pub address: Option<Address>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, SimpleObject)]
pub struct AuthPayload {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, SimpleObject)]
pub struct AdminStats {
    pub total_users: i64,
    pub total_admins: i64,
    pub regular_users: i64,
}

#[derive(Debug, Clone, SimpleObject)]
pub struct AdminStatsResponse {
    pub stats: AdminStats,
    pub recent_users: Vec<User>,
}

#[derive(Debug, Clone, SimpleObject)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
    pub service: String,
}

#[derive(Debug, Clone, InputObject)]
pub struct AddressInput {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, InputObject)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub address: Option<AddressInput>,
}

#[derive(Debug, Clone, InputObject)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, InputObject)]
pub struct CreateUserInput {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub address: Option<AddressInput>,
}

#[derive(Debug, Clone, InputObject)]
pub struct UpdateUserInput {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<AddressInput>,
}

impl From<upstream::UserRecord> for User {
    fn from(record: upstream::UserRecord) -> Self {
        Self {
            id: ID(record.id),
            email: record.email,
            first_name: record.first_name,
            last_name: record.last_name,
            role: if record.role == "admin" {
                Role::Admin
            } else {
                Role::User
            },
            phone_number: record.phone_number,
            address: record.address.map(Into::into),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

impl From<upstream::AddressRecord> for Address {
    fn from(record: upstream::AddressRecord) -> Self {
        Self {
            street: record.street,
            city: record.city,
            state: record.state,
            zip_code: record.zip_code,
            country: record.country,
        }
    }
}

impl From<upstream::AuthRecord> for AuthPayload {
    fn from(record: upstream::AuthRecord) -> Self {
        Self {
            token: record.token,
            user: record.user.into(),
        }
    }
}

impl From<upstream::AdminStatsRecord> for AdminStatsResponse {
    fn from(record: upstream::AdminStatsRecord) -> Self {
        Self {
            stats: AdminStats {
                total_users: record.stats.total_users,
                total_admins: record.stats.total_admins,
                regular_users: record.stats.regular_users,
            },
            recent_users: record.recent_users.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<upstream::HealthRecord> for HealthStatus {
    fn from(record: upstream::HealthRecord) -> Self {
        Self {
            status: record.status,
            timestamp: record.timestamp,
            service: record.service,
        }
    }
}

impl From<AddressInput> for upstream::AddressRecord {
    fn from(input: AddressInput) -> Self {
        Self {
            street: input.street,
            city: input.city,
            state: input.state,
            zip_code: input.zip_code,
            country: input.country,
        }
    }
}

impl From<RegisterInput> for upstream::RegisterRequest {
    fn from(input: RegisterInput) -> Self {
        Self {
            email: input.email,
            password: input.password,
            first_name: input.first_name,
            last_name: input.last_name,
            phone_number: input.phone_number,
            address: input.address.map(Into::into),
        }
    }
}

impl From<CreateUserInput> for upstream::CreateUserRequest {
    fn from(input: CreateUserInput) -> Self {
        Self {
            email: input.email,
            password: input.password,
            first_name: input.first_name,
            last_name: input.last_name,
            phone_number: input.phone_number,
            address: input.address.map(Into::into),
        }
    }
}

impl From<LoginInput> for upstream::LoginRequest {
    fn from(input: LoginInput) -> Self {
        Self {
            email: input.email,
            password: input.password,
        }
    }
}

impl From<UpdateUserInput> for upstream::UpdateUserRequest {
    fn from(input: UpdateUserInput) -> Self {
        Self {
            email: input.email,
            first_name: input.first_name,
            last_name: input.last_name,
            phone_number: input.phone_number,
            address: input.address.map(Into::into),
        }
    }
}
