//! Axum router setup.

use crate::auth::{require_identity, wholesale_gate};
use crate::config::ServerConfig;
use crate::handlers::{auth, backup, categories, customers, presets, settings};
use crate::state::AppState;
use crate::uploads::UPLOADS_URL_PREFIX;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    // Mutations behind the wholesale gate
    let gated = Router::new()
        .route("/api/categories", post(categories::create))
        .route(
            "/api/categories/{id}",
            put(categories::update).delete(categories::delete),
        )
        .route("/api/customers", post(customers::create))
        .route(
            "/api/customers/{id}",
            put(customers::update).delete(customers::delete),
        )
        .route("/api/customers/bulk-delete", post(customers::bulk_delete))
        .route(
            "/api/customers/upload",
            post(customers::upload).layer(DefaultBodyLimit::max(config.max_upload_size)),
        )
        .route("/api/presets", post(presets::create))
        .route("/api/presets/{id}/fields", put(presets::update_fields))
        .route("/api/presets/{id}/activate", post(presets::activate))
        .route(
            "/api/restore",
            post(backup::restore).layer(DefaultBodyLimit::max(config.max_backup_size)),
        )
        .route(
            "/api/settings/reset-master-once",
            post(settings::reset_master_once),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            wholesale_gate,
        ));

    let open = Router::new()
        .route("/api/settings", get(settings::status))
        .route("/api/settings/setup", post(settings::setup))
        .route("/api/settings/verify", post(settings::verify))
        .route(
            "/api/settings/change-password",
            post(settings::change_password),
        )
        .route("/api/settings/reset", post(settings::reset))
        .route(
            "/api/settings/master-password",
            post(settings::master_password),
        )
        .route("/api/categories", get(categories::list))
        .route("/api/categories/tree", get(categories::tree))
        .route("/api/categories/{id}", get(categories::get))
        .route("/api/customers", get(customers::list))
        .route("/api/customers/{id}", get(customers::get))
        .route("/api/presets", get(presets::list))
        .route("/api/presets/active", get(presets::active))
        .route("/api/presets/{id}", get(presets::get))
        .route("/api/backup", get(backup::export));

    // Everything under /api except the current-user endpoint
    let api = gated.merge(open).route_layer(middleware::from_fn_with_state(
        state.clone(),
        require_identity,
    ));

    let body_limit = config.max_upload_size.max(config.max_backup_size);

    Router::new()
        .merge(api)
        .route("/api/auth/user", get(auth::current_user))
        .route("/health", get(health))
        .nest_service(UPLOADS_URL_PREFIX, ServeDir::new(&config.uploads_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
