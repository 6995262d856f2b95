//! HTTP front-end for contributors.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /challenges/:challenge/highscores` - Ranked highscore list
//! - `POST /challenges/:challenge/submit` - Multipart form with `name` and `source`

use crate::config::MAX_BODY_BYTES;
use crate::server::{GolfServer, SubmitForm};
use crate::types::{ErrorResponse, SubmitResponse};
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use golf_core::SubmitStatus;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Build the HTTP router.
///
/// The returned router can be served directly with axum or composed
/// into a larger application.
pub fn build_router(server: GolfServer) -> Router {
    tracing::debug!("Building HTTP router");

    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/challenges/:challenge/highscores", get(highscores_handler))
        .route("/challenges/:challenge/submit", post(submit_handler))
        .with_state(server)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    tracing::debug!("HTTP router built with routes: /health, /challenges/:challenge/highscores, /challenges/:challenge/submit");
    router
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (status, Json(ErrorResponse::new(error))).into_response()
}

fn unknown_challenge(challenge: &str) -> Response {
    error_response(StatusCode::NOT_FOUND, format!("unknown challenge: {challenge}"))
}

/// Health check endpoint.
async fn health_handler() -> impl IntoResponse {
    tracing::trace!("Health check request");
    Json(serde_json::json!({
        "status": "healthy",
        "service": "golf-server"
    }))
}

async fn highscores_handler(
    State(server): State<GolfServer>,
    Path(challenge): Path<String>,
) -> Response {
    if !server.serves(&challenge) {
        return unknown_challenge(&challenge);
    }
    match server.highscores().await {
        Ok(highscores) => Json(highscores).into_response(),
        Err(e) => {
            tracing::error!(challenge = %challenge, error = %e, "Failed to load highscores");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to load highscores")
        }
    }
}

async fn submit_handler(
    State(server): State<GolfServer>,
    Path(challenge): Path<String>,
    mut multipart: Multipart,
) -> Response {
    if !server.serves(&challenge) {
        return unknown_challenge(&challenge);
    }

    let mut form = SubmitForm::default();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return error_response(e.status(), e.body_text()),
        };
        let field_name = field.name().map(str::to_owned);
        let read = match field_name.as_deref() {
            Some("name") => field.text().await.map(|text| form.name = Some(text)),
            Some("source") => {
                form.file_name = field.file_name().map(str::to_owned);
                field.bytes().await.map(|bytes| form.source = Some(bytes.to_vec()))
            }
            other => {
                tracing::trace!(field = ?other, "Ignoring unknown form field");
                Ok(())
            }
        };
        if let Err(e) = read {
            return error_response(e.status(), e.body_text());
        }
    }

    let submission = match form.validate() {
        Ok(submission) => submission,
        Err(msg) => {
            tracing::debug!(challenge = %challenge, error = %msg, "Rejected submission form");
            return error_response(StatusCode::UNPROCESSABLE_ENTITY, msg);
        }
    };

    let name = submission.name.clone();
    let result = server.submit(submission).await;
    let status = match result.status {
        SubmitStatus::SandboxUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        SubmitStatus::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::OK,
    };

    (
        status,
        Json(SubmitResponse {
            challenge,
            name,
            result,
        }),
    )
        .into_response()
}

/// Start the HTTP server.
///
/// This function runs until the server is shut down via the provided
/// shutdown signal.
pub async fn serve(
    server: GolfServer,
    addr: std::net::SocketAddr,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let router = build_router(server);

    tracing::info!(%addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::debug!(%addr, "TCP listener bound");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}
