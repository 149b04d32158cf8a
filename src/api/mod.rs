//! HTTP surface: a thin JSON API over the dispatcher and the registry.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Method, Request},
    Extension,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{debug_span, info, Span};
use ulid::Ulid;
use utoipa::openapi::{InfoBuilder, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

mod handlers;
pub mod types;

use crate::authn::AuthenticationDispatcher;
use crate::ticket::TicketRegistry;

/// Everything a request handler needs, assembled once at startup.
///
/// The registry is shared with the background eviction sweep.
pub struct SsoState {
    pub dispatcher: AuthenticationDispatcher,
    pub registry: Arc<TicketRegistry>,
}

impl SsoState {
    #[must_use]
    pub fn new(dispatcher: AuthenticationDispatcher, registry: Arc<TicketRegistry>) -> Self {
        Self {
            dispatcher,
            registry,
        }
    }
}

/// Seconds since the epoch, saturating at zero for pre-epoch clocks.
pub(crate) fn unix_seconds(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI spec.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Add new endpoints here via `.routes(routes!(...))` so they are both served
/// and included in the generated `OpenAPI` spec.
fn api_router() -> OpenApiRouter {
    let mut sso_tag = Tag::new("sso");
    sso_tag.description = Some("Ticket-based single sign-on API".to_string());

    let mut openapi = cargo_openapi();
    openapi.tags = Some(vec![sso_tag]);

    // `routes!` reads #[utoipa::path] to bind HTTP method + path and add the route to OpenAPI.
    let router = OpenApiRouter::with_openapi(openapi)
        .routes(routes!(handlers::health::health))
        .routes(routes!(handlers::login::login))
        .routes(routes!(handlers::tickets::grant_service_ticket))
        .routes(routes!(handlers::tickets::logout))
        .routes(routes!(handlers::validate::validate));

    router
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    let info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(Some(env!("CARGO_PKG_DESCRIPTION")))
        .build();
    OpenApiBuilder::new().info(info).build()
}

/// Serve the API until the cancellation token fires.
///
/// # Errors
/// Returns an error if the listener cannot bind or the server fails.
pub async fn serve(port: u16, state: Arc<SsoState>, shutdown: CancellationToken) -> Result<()> {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_origin(Any);

    let (router, _openapi) = api_router().split_for_parts();
    let app = router.layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(cors)
            .layer(Extension(state)),
    );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let headers = request.headers();
    let path = request.uri().path();
    let request_id = headers
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!("http-request", path, ?headers, request_id)
}
