//! Slotbook API Server Library

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod security;

use axum::extract::FromRef;
use axum::{Router, middleware as axum_middleware};
use moka::future::Cache;
use security::TokenClaims;
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub auth_cache: Cache<String, TokenClaims>,
    pub config: config::Config,
}

impl AppState {
    /// Build application state with a fresh auth cache
    pub fn new(pool: PgPool, config: config::Config) -> Self {
        let auth_cache = Cache::builder()
            .time_to_live(std::time::Duration::from_secs(300))
            .build();

        Self {
            pool,
            auth_cache,
            config,
        }
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let cors = if state.config.cors_allowed_origin == "*" {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        match state.config.cors_allowed_origin.parse::<axum::http::HeaderValue>() {
            Ok(origin) => CorsLayer::new()
                .allow_origin(origin)
                .allow_methods(Any)
                .allow_headers(Any),
            Err(e) => {
                // Startup configuration error.
                panic!("Invalid CORS origin configuration: {}", e);
            }
        }
    };

    Router::new()
        .merge(routes::health::routes())
        .nest("/auth", routes::auth::routes())
        .merge(routes::availability::routes())
        .merge(routes::providers::routes(state.clone()))
        .merge(
            routes::appointments::routes().layer(axum_middleware::from_fn_with_state(
                state.clone(),
                middleware::bearer_auth::bearer_auth,
            )),
        )
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let remote_addr = request
                        .extensions()
                        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
                        .map(|ci| ci.0.to_string())
                        .unwrap_or_else(|| "unknown".into());

                    let user_agent = request
                        .headers()
                        .get(axum::http::header::USER_AGENT)
                        .and_then(|h| h.to_str().ok())
                        .unwrap_or("unknown");

                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                        remote_addr = %remote_addr,
                        user_agent = %user_agent,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::info!(
                            latency_ms = %latency.as_millis(),
                            status = %response.status(),
                            "finished processing request"
                        );
                    },
                ),
        )
        .with_state(state)
}

/// Run the API server
///
/// This function starts the HTTP server and blocks until it exits.
pub async fn run_api(state: AppState, config: &config::Config) -> Result<(), std::io::Error> {
    let app = create_router(state);
    let addr = format!("{}:{}", config.host, config.port);

    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
}
