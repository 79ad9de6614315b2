//! The GraphQL request handler.
//!
//! Implements the per-operation control flow: resolve the session, derive
//! the client identity, parse, run the admission pipeline, execute, settle,
//! and attach quota headers to every response.

use async_graphql::{ErrorExtensionValues, ServerError, Variables};
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use tracing::{error, info_span, Instrument};
use uuid::Uuid;

use crate::admission::{selection, Admission, ClientId, Quota, Rejection};
use crate::session::Session;

use super::server::AppState;

/// The GraphQL-over-HTTP request body.
#[derive(Debug, Deserialize)]
pub struct GraphQLHttpRequest {
    pub query: String,
    #[serde(default, rename = "operationName")]
    pub operation_name: Option<String>,
    #[serde(default)]
    pub variables: Option<serde_json::Value>,
}

pub async fn graphql_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<GraphQLHttpRequest>,
) -> impl IntoResponse {
    let request_id = Uuid::new_v4();
    let span = info_span!("graphql_request", request_id = %request_id);
    let (quota, response) = process(&state, &headers, request).instrument(span).await;

    (quota_headers(&quota), Json(response))
}

enum AdmitOutcome {
    Admitted(Admission),
    /// The document failed to parse; the executor reports that itself and
    /// nothing is charged against the client's window.
    Unparsed,
    Rejected(Rejection),
}

fn admit(state: &AppState, identity: &ClientId, request: &GraphQLHttpRequest) -> AdmitOutcome {
    let doc = match async_graphql::parser::parse_query(&request.query) {
        Ok(doc) => doc,
        Err(_) => return AdmitOutcome::Unparsed,
    };

    let operations = match selection::build(&doc, request.operation_name.as_deref(), &state.catalog)
    {
        Ok(operations) => operations,
        Err(rejection) => {
            log_rejection(identity, &rejection);
            return AdmitOutcome::Rejected(rejection);
        }
    };

    match state.pipeline.pre_check(&operations, identity) {
        Ok(admission) => AdmitOutcome::Admitted(admission),
        Err(rejection) => {
            log_rejection(identity, &rejection);
            AdmitOutcome::Rejected(rejection)
        }
    }
}

/// Run one operation through admission, execution, and settlement.
pub(crate) async fn process(
    state: &AppState,
    headers: &HeaderMap,
    request: GraphQLHttpRequest,
) -> (Quota, async_graphql::Response) {
    let session = Session::from_headers(headers);
    let identity = ClientId::derive(session.as_ref(), headers);

    let admission = match admit(state, &identity, &request) {
        AdmitOutcome::Admitted(admission) => Some(admission),
        AdmitOutcome::Unparsed => None,
        AdmitOutcome::Rejected(rejection) => {
            // Headers are attached on rejections too, so clients can
            // self-throttle.
            let quota = state.pipeline.quota_snapshot(&identity);
            return (quota, rejection_response(&rejection));
        }
    };

    let mut gql_request = async_graphql::Request::new(request.query);
    if let Some(name) = request.operation_name {
        gql_request = gql_request.operation_name(name);
    }
    if let Some(variables) = request.variables {
        gql_request = gql_request.variables(Variables::from_json(variables));
    }
    if let Some(session) = session {
        gql_request = gql_request.data(session);
    }

    let response = state.schema.execute(gql_request).await;
    let had_errors = !response.errors.is_empty();

    let quota = match admission {
        Some(admission) => state.pipeline.settle(&identity, &admission, had_errors),
        None => state.pipeline.quota_snapshot(&identity),
    };

    (quota, response)
}

fn log_rejection(identity: &ClientId, rejection: &Rejection) {
    match rejection {
        Rejection::Analysis { detail } => {
            error!(client = %identity, detail = %detail, "Operation analysis failed");
        }
        other => {
            tracing::debug!(client = %identity, code = other.code(), "Operation rejected");
        }
    }
}

fn rejection_response(rejection: &Rejection) -> async_graphql::Response {
    let mut server_error = ServerError::new(rejection.to_string(), None);
    let mut extensions = ErrorExtensionValues::default();
    for (key, value) in rejection.extensions() {
        if let Ok(value) = async_graphql::Value::from_json(value) {
            extensions.set(key, value);
        }
    }
    server_error.extensions = Some(extensions);

    async_graphql::Response::from_errors(vec![server_error])
}

pub(crate) fn quota_headers(quota: &Quota) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("x-ratelimit-limit", HeaderValue::from(quota.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(quota.remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(quota.reset_epoch_secs));
    headers
}
