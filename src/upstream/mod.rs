//! Upstream users-service integration.

mod users;

pub use users::{
    AddressRecord, AdminStatsRecord, AuthRecord, CreateUserRequest, HealthRecord,
    HttpUsersClient, LoginRequest, RegisterRequest, StatsRecord, UpdateUserRequest,
    UpstreamError, UserRecord, UsersBackend,
};
