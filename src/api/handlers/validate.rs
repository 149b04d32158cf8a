//! Service-side ticket validation. The first successful call consumes the
//! ticket; every failure reports its precise reason for auditing.

use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use tracing::error;

use crate::api::types::{ValidateRequest, ValidateResponse, ValidationFailure};
use crate::api::SsoState;
use crate::ticket::TicketError;

#[utoipa::path(
    post,
    path = "/v1/validate",
    request_body = ValidateRequest,
    responses(
        (status = 200, description = "Ticket valid; principal returned", body = ValidateResponse),
        (status = 403, description = "Ticket bound to a different service", body = ValidationFailure),
        (status = 404, description = "Ticket not found", body = ValidationFailure),
        (status = 409, description = "Ticket already consumed", body = ValidationFailure),
        (status = 410, description = "Ticket expired", body = ValidationFailure)
    ),
    tag = "sso"
)]
pub async fn validate(
    state: Extension<Arc<SsoState>>,
    payload: Option<Json<ValidateRequest>>,
) -> axum::response::Response {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };

    match state
        .registry
        .validate_service_ticket(&request.ticket, &request.service)
        .await
    {
        Ok(principal) => (
            StatusCode::OK,
            Json(ValidateResponse {
                principal: principal.id,
                attributes: principal.attributes,
            }),
        )
            .into_response(),
        Err(err) => {
            let status = match &err {
                TicketError::NotFound => StatusCode::NOT_FOUND,
                TicketError::Expired => StatusCode::GONE,
                TicketError::AlreadyConsumed => StatusCode::CONFLICT,
                TicketError::ServiceMismatch => StatusCode::FORBIDDEN,
                other => {
                    error!("Ticket validation failed: {other}");
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
