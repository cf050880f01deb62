use std::time::Duration;

use axum::{
    error_handling::HandleErrorLayer,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    BoxError, Router,
};
use http::{HeaderValue, Method};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

use crate::{error::AppError, request_tracing, ServerState};

use super::handlers::weekly;

pub struct AppRouter;

impl AppRouter {
    pub fn create(state: ServerState) -> Router {
        let cors_layer = CorsLayer::new()
            .allow_origin(
                ["http://localhost:3000", "https://localhost:3000"]
                    .into_iter()
                    .map(HeaderValue::from_static)
                    .collect::<Vec<_>>(),
            )
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any);

        let request_timeout = Duration::from_secs(state.config.server.request_timeout_secs);

        Router::new()
            .route("/", get(|| async { "Weekly ops report server" }))
            .nest(
                "/weekly",
                Router::new()
                    .route("/connected-users", get(weekly::connected_users))
                    .route("/report", post(weekly::weekly_report))
                    .route("/email-report", post(weekly::email_weekly_report))
                    .layer(
                        ServiceBuilder::new()
                            .layer(HandleErrorLayer::new(handle_timeout_error))
                            .timeout(request_timeout),
                    ),
            )
            .layer(request_tracing::trace_with_request_id_layer())
            .layer(cors_layer)
            .with_state(state)
            .fallback(handler_404)
    }
}

async fn handle_timeout_error(err: BoxError) -> AppError {
    if err.is::<tower::timeout::error::Elapsed>() {
        AppError::RequestTimeout
    } else {
        AppError::Internal(anyhow::anyhow!("Unhandled service error: {}", err))
    }
}

pub async fn handler_404() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Route does not exist")
}
