#![allow(dead_code)]

use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod registry;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

/// CSP middleware adds Content-Security-Policy header to all responses
async fn csp_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(
            "default-src 'self'; \
             script-src 'self' 'unsafe-inline'; \
             style-src 'self' 'unsafe-inline'; \
             img-src 'self' data: https:; \
             connect-src 'self'",
        ),
    );
    response
}

pub fn create_router(app_state: std::sync::Arc<services::AppState>) -> Router {
    // CORS configuration for the frontend consuming progress endpoints
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any); // TODO: restrict to specific origins in production

    Router::new()
        // Public endpoints (no auth required)
        .route("/health", get(handlers::health_check))
        // Metrics endpoint with Basic Auth protection
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        .nest("/api/v1", api_routes().layer(cors))
        .nest("/admin", admin_routes())
        .with_state(app_state)
        .layer(middleware::from_fn(csp_middleware)) // Apply CSP to all responses
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn api_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        // View tracking and completion aggregates
        .route(
            "/content/{kind}/{id}/view",
            post(handlers::progress::mark_content_viewed),
        )
        .route(
            "/modules/{id}/completed-content",
            get(handlers::progress::completed_content),
        )
        .route(
            "/modules/{id}/progress/recompute",
            post(handlers::progress::recompute_progress),
        )
        // Likes and pins
        .route(
            "/modules/{id}/interaction",
            put(handlers::interaction::set_interaction),
        )
        // Time-on-page sessions
        .route("/page-sessions", post(handlers::engagement::start_session))
        .route(
            "/page-sessions/{id}/activity",
            post(handlers::engagement::record_activity),
        )
        .route(
            "/page-sessions/{id}/end",
            post(handlers::engagement::end_session),
        )
        .route("/time-logs", post(handlers::engagement::add_time))
}

fn admin_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route("/progress", post(handlers::admin::create_progress))
        .route(
            "/progress/{user_id}/{module_id}",
            axum::routing::patch(handlers::admin::patch_progress),
        )
}
