use face_auth_service::{
    build_router,
    config::FaceAuthConfig,
    services::{build_encoder, init_metrics, MongoDb, UserStore},
    AppState,
};
use service_core::observability::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let config = FaceAuthConfig::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );
    init_metrics();

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        encoder = ?config.recognition.backend,
        match_threshold = config.recognition.match_threshold,
        "Starting face-auth-service"
    );

    let db = MongoDb::connect(&config.mongodb.uri, &config.mongodb.database)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            std::io::Error::other(format!("Database connection error: {}", e))
        })?;

    db.initialize_indexes().await.map_err(|e| {
        tracing::error!("Failed to initialize database indexes: {}", e);
        std::io::Error::other(format!("Database initialization error: {}", e))
    })?;

    let encoder = build_encoder(&config.recognition).map_err(|e| {
        tracing::error!("Failed to initialize face encoder: {}", e);
        std::io::Error::other(format!("Face encoder error: {}", e))
    })?;
    tracing::info!(encoder = encoder.name(), "Face encoder ready");

    let store: Arc<dyn UserStore> = Arc::new(db);
    let port = config.common.port;
    let state = AppState::new(config, store, encoder);
    state.spawn_rate_limit_eviction();

    let app = build_router(state).map_err(|e| {
        tracing::error!("Failed to build router: {}", e);
        std::io::Error::other(format!("Router error: {}", e))
    })?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("face-auth-service listening on {}", addr);

    service_core::axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("face-auth-service stopped");
    Ok(())
}
