//! HTTP surface: the HTML shell and the JSON API.

mod error;
pub mod extract;
pub mod handlers;

use crate::app::AppState;
use crate::utils::error::Result;
use crate::utils::validation::validate_socket_addr;
use axum::routing::{get, post, put};
use axum::Router;
use handlers::*;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the axum Router with every endpoint.
pub fn router(state: Arc<AppState>) -> Router {
    let cors_allow_any = state.config.server.cors_allow_any;

    let router = Router::new()
        .route("/", get(index))
        .route("/pr-card-form", get(index))
        .route("/health", get(health))
        .route("/api/languages", get(list_languages))
        .route("/api/forms", get(list_forms))
        .route("/api/forms/:form_id", get(get_form))
        .route("/api/forms/:form_id/fields/:field_id/terms", get(field_terms))
        .route("/api/glossary", get(get_glossary))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        .route("/api/sessions/:id/language", put(set_session_language))
        .route(
            "/api/sessions/:id/fields/:field_id",
            put(set_field).delete(clear_field),
        )
        .route("/api/sessions/:id/assist", post(assist))
        .route("/api/sessions/:id/export.pdf", get(export_pdf))
        .route("/api/sessions/:id/export.zip", get(export_zip))
        .layer(TraceLayer::new_for_http());

    let router = if cors_allow_any {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}

/// Serve until the process receives Ctrl-C.
pub async fn serve(state: Arc<AppState>) -> Result<()> {
    let addr = validate_socket_addr("server.bind", &state.config.server.bind)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("🚀 Listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;
    Ok(())
}
