pub mod api;
mod config;
mod providers;
mod sync;

use axum::{routing::get, Router};
use tokio::sync::broadcast;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use config::Config;
use providers::feed::FeedClient;
use sync::Collector;

#[derive(OpenApi)]
#[openapi(
    info(title = "Live Bus API", version = "0.1.0"),
    paths(
        api::vehicles::get_current_snapshot,
        api::vehicles::get_vehicles_by_route,
        api::vehicles::get_vehicle_by_id,
        api::vehicles::get_snapshot_history,
        api::health::health_check,
    ),
    components(schemas(
        api::ErrorResponse,
        api::vehicles::SnapshotView,
        api::vehicles::CurrentSnapshotResponse,
        api::vehicles::VehiclesByRouteRequest,
        api::vehicles::VehiclesByRouteResponse,
        api::vehicles::VehicleByIdRequest,
        api::vehicles::VehicleByIdResponse,
        api::vehicles::SnapshotSummary,
        api::vehicles::HistoryResponse,
        api::health::HealthResponse,
        sync::VehicleRecord,
        sync::FeedStatus,
        sync::SnapshotUpdate,
    )),
    tags(
        (name = "vehicles", description = "Live vehicle position snapshots"),
        (name = "health", description = "Service health and feed staleness")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .init();

    // Load config
    let config = Config::load("config.yaml").expect("Failed to load config");
    config.validate().expect("Invalid config");
    tracing::info!(
        routes = config.feed.routes.len(),
        endpoint = %config.feed.endpoint,
        interval_secs = config.poll.interval_secs,
        "Loaded configuration"
    );

    // Build CORS layer based on config
    let cors_layer = if config.cors_permissive {
        tracing::warn!("CORS: Permissive mode explicitly enabled (all origins allowed) - DO NOT USE IN PRODUCTION");
        CorsLayer::permissive()
    } else if !config.cors_origins.is_empty() {
        tracing::info!(origins = ?config.cors_origins, "CORS: Restricting to configured origins");
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers([axum::http::header::CONTENT_TYPE])
    } else {
        panic!("CORS configuration error: Either set 'cors_origins' with allowed origins, or set 'cors_permissive: true' for development");
    };

    // Start the collector in the background
    let feed_client =
        FeedClient::new(config.feed.clone()).expect("Failed to initialize feed client");
    let collector = Collector::new(feed_client, config.feed.routes.clone(), config.poll.clone());
    let store = collector.snapshot_store();
    let status = collector.status_store();
    let updates_tx = collector.updates_sender();

    // One shutdown signal stops both the collector and the server
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let collector_handle = tokio::spawn(collector.run(shutdown_rx));

    // Build the app
    let app = Router::new()
        .route("/", get(root))
        .nest("/api", api::router(store, status, updates_tx))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer);

    // Start server
    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000")
        .await
        .expect("Failed to bind to port 3000");

    tracing::info!("Server running on http://localhost:3000");
    tracing::info!("Swagger UI: http://localhost:3000/swagger-ui");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await
        .expect("Failed to start server");

    if let Err(e) = collector_handle.await {
        tracing::error!(error = %e, "Collector task panicked");
    }
}

async fn shutdown_signal(shutdown_tx: broadcast::Sender<()>) {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for shutdown signal");
    tracing::info!("Shutdown signal received");
    let _ = shutdown_tx.send(());
}

async fn root() -> &'static str {
    "Live Bus API"
}
