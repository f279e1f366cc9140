pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod services;
pub mod utils;

use service_core::axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;

use crate::config::FaceAuthConfig;
use crate::services::{FaceAuthService, FaceEncoder, UserStore};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health_check,
        handlers::health::readiness,
        handlers::auth::signup,
        handlers::auth::login,
    ),
    components(
        schemas(
            dtos::auth::SignupRequest,
            dtos::auth::SignupResponse,
            dtos::auth::LoginRequest,
            dtos::auth::LoginResponse,
            dtos::ErrorResponse,
        )
    ),
    tags(
        (name = "Authentication", description = "Face-based signup and login"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub config: FaceAuthConfig,
    pub store: Arc<dyn UserStore>,
    pub encoder: Arc<dyn FaceEncoder>,
    pub auth_service: FaceAuthService,
    pub signup_rate_limiter: IpRateLimiter,
    pub login_rate_limiter: IpRateLimiter,
    pub ip_rate_limiter: IpRateLimiter,
}

impl AppState {
    /// Wire the service and rate limiters from configuration.
    pub fn new(
        config: FaceAuthConfig,
        store: Arc<dyn UserStore>,
        encoder: Arc<dyn FaceEncoder>,
    ) -> Self {
        let auth_service = FaceAuthService::new(
            store.clone(),
            encoder.clone(),
            config.recognition.match_threshold,
        );
        let limits = &config.rate_limit;
        let trust = limits.trust_forwarded_for;
        let signup_rate_limiter =
            create_ip_rate_limiter(limits.signup_attempts, limits.signup_window_seconds, trust);
        let login_rate_limiter =
            create_ip_rate_limiter(limits.login_attempts, limits.login_window_seconds, trust);
        let ip_rate_limiter = create_ip_rate_limiter(
            limits.global_ip_limit,
            limits.global_ip_window_seconds,
            trust,
        );

        Self {
            config,
            store,
            encoder,
            auth_service,
            signup_rate_limiter,
            login_rate_limiter,
            ip_rate_limiter,
        }
    }

    /// Start background eviction of idle client keys on every limiter.
    pub fn spawn_rate_limit_eviction(&self) -> Vec<JoinHandle<()>> {
        let every = Duration::from_secs(self.config.rate_limit.eviction_interval_seconds);
        [
            &self.signup_rate_limiter,
            &self.login_rate_limiter,
            &self.ip_rate_limiter,
        ]
        .into_iter()
        .map(|limiter| limiter.spawn_eviction(every))
        .collect()
    }
}

pub fn build_router(state: AppState) -> Result<Router, AppError> {
    let signup_route = Router::new()
        .route("/signup", post(handlers::auth::signup))
        .layer(from_fn_with_state(
            state.signup_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let login_route = Router::new()
        .route("/login", post(handlers::auth::login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let cors = cors_layer(&state.config.security.allowed_origins)?;
    let ip_limiter = state.ip_rate_limiter.clone();
    let max_body_bytes = state.config.security.max_body_bytes;

    let app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness))
        .route("/metrics", get(handlers::metrics::metrics))
        .route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .merge(signup_route)
        .merge(login_route)
        .fallback(|| async { AppError::NotFound(anyhow::anyhow!("Route not found")) })
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        // Global IP rate limiting
        .layer(from_fn_with_state(ip_limiter, ip_rate_limit_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors);

    Ok(app)
}

fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer, AppError> {
    let origin = if allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins = allowed_origins
            .iter()
            .map(|o| {
                o.parse::<HeaderValue>().map_err(|e| {
                    AppError::ConfigError(anyhow::anyhow!("Invalid CORS origin '{}': {}", o, e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::HeaderName::from_static(REQUEST_ID_HEADER),
        ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_accepts_wildcard_and_explicit_origins() {
        assert!(cors_layer(&["*".to_string()]).is_ok());
        assert!(cors_layer(&["https://app.example.com".to_string()]).is_ok());
    }

    #[test]
    fn cors_rejects_malformed_origin() {
        assert!(cors_layer(&["bad\norigin".to_string()]).is_err());
    }

    #[test]
    fn openapi_lists_both_auth_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/signup"));
        assert!(doc.paths.paths.contains_key("/login"));
    }
}
