//! Service-ticket issuance and logout.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::{debug, error};

use crate::api::types::{ServiceTicketRequest, ServiceTicketResponse, ValidationFailure};
use crate::api::{unix_seconds, SsoState};
use crate::ticket::TicketError;

#[utoipa::path(
    post,
    path = "/v1/tickets/{ticket}/service-tickets",
    params(("ticket" = String, Path, description = "Granting ticket id")),
    request_body = ServiceTicketRequest,
    responses(
        (status = 201, description = "Service ticket issued", body = ServiceTicketResponse),
        (status = 403, description = "Service is not registered", body = ValidationFailure),
        (status = 404, description = "Granting ticket not found", body = ValidationFailure),
        (status = 410, description = "Granting ticket expired", body = ValidationFailure)
    ),
    tag = "sso"
)]
pub async fn grant_service_ticket(
    state: Extension<Arc<SsoState>>,
    Path(ticket): Path<String>,
    payload: Option<Json<ServiceTicketRequest>>,
) -> axum::response::Response {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };

    match state
        .registry
        .grant_service_ticket(&ticket, &request.service)
        .await
    {
        Ok(ticket) => (
            StatusCode::CREATED,
            Json(ServiceTicketResponse {
                expires_at: unix_seconds(ticket.expires_at),
                ticket: ticket.id,
            }),
        )
            .into_response(),
        Err(err) => {
            let status = match &err {
                TicketError::NotFound => StatusCode::NOT_FOUND,
                TicketError::Expired => StatusCode::GONE,
                TicketError::ServiceNotRegistered(_) => StatusCode::FORBIDDEN,
                other => {
                    error!("Failed to grant service ticket: {other}");
                    return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                }
            };
            (
                status,
                Json(ValidationFailure {
                    code: err.code().to_string(),
                    description: err.to_string(),
                }),
            )
                .into_response()
        }
    }
}

#[utoipa::path(
    delete,
    path = "/v1/tickets/{ticket}",
    params(("ticket" = String, Path, description = "Granting ticket id")),
    responses(
        (status = 204, description = "Session ended")
    ),
    tag = "sso"
)]
pub async fn logout(
    state: Extension<Arc<SsoState>>,
    Path(ticket): Path<String>,
) -> impl IntoResponse {
    // Logout is idempotent; destroying an already-gone ticket is still a 204.
    match state.registry.destroy_granting_ticket(&ticket).await {
        Ok(removed) => {
            debug!(removed, "logout processed");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => {
            error!("Failed to destroy granting ticket: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
