//! Primary authentication: credentials in, granting ticket out.

use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use tracing::error;

use crate::api::types::{CredentialPayload, LoginFailure, LoginResponse};
use crate::api::{unix_seconds, SsoState};
use crate::authn::AuthnError;

#[utoipa::path(
    post,
    path = "/v1/login",
    request_body = CredentialPayload,
    responses(
        (status = 201, description = "Granting ticket issued", body = LoginResponse),
        (status = 400, description = "No configured handler supports this credential kind", body = LoginFailure),
        (status = 401, description = "Authentication failed", body = LoginFailure),
        (status = 503, description = "Every supporting backend was unreachable", body = LoginFailure)
    ),
    tag = "sso"
)]
pub async fn login(
    state: Extension<Arc<SsoState>>,
    payload: Option<Json<CredentialPayload>>,
) -> axum::response::Response {
    let Some(Json(payload)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };
    let credential = payload.into_credential();

    let authentication = match state.dispatcher.authenticate(&credential).await {
        Ok(authentication) => authentication,
        Err(err @ AuthnError::UnsupportedCredentials { .. }) => {
            return (StatusCode::BAD_REQUEST, Json(LoginFailure::from(&err))).into_response();
        }
        Err(err @ AuthnError::PrincipalUnresolved { .. }) => {
            error!("Resolver mismatch: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        Err(err) => {
            // An all-prevented chain is an infrastructure outage, not a bad
            // password; callers and alerting get a different status for it.
            let status = if err.prevented_only() {
                StatusCode::SERVICE_UNAVAILABLE
            } else {
                StatusCode::UNAUTHORIZED
            };
            return (status, Json(LoginFailure::from(&err))).into_response();
        }
    };

    match state
        .registry
        .issue_granting_ticket(authentication.principal)
        .await
    {
        Ok(ticket) => (
            StatusCode::CREATED,
            Json(LoginResponse {
                ticket: ticket.id,
                handler: authentication.handler,
                expires_at: unix_seconds(ticket.expires_at),
            }),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to issue granting ticket: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
