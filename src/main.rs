mod core;
mod features;
mod modules;
mod shared;

use crate::core::config::{Config, StorageBackend};
use crate::core::openapi::{ApiDoc, SwaggerInfoModifier};
use crate::core::{database, middleware};
use crate::features::accounts::{routes as accounts_routes, AccountLifecycleService};
use crate::features::audit::{routes as audit_routes, AuditService};
use crate::features::file_requests::FileRequestService;
use crate::features::files::{routes as files_routes, FileLifecycleService, QuotaService};
use crate::features::sweeps::{routes as sweeps_routes, SweepScheduler, SweepService};
use crate::modules::retention_store::{PgRetentionStore, RetentionStore};
use crate::modules::storage::{BlobStore, LocalBlobStore, MinIOClient};
use crate::shared::clock::{Clock, SystemClock};
use axum::{middleware::from_fn, Router};
use std::sync::Arc;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::Modify;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

const ADMIN_REALM: &str = "Admin API";
const SWAGGER_REALM: &str = "Swagger UI";

fn main() -> anyhow::Result<()> {
    // Build Tokio runtime with configurable worker threads
    let worker_threads = std::env::var("TOKIO_WORKER_THREADS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .max_blocking_threads(worker_threads * 4)
        .enable_all()
        .build()?;

    runtime.block_on(async_main(worker_threads))
}

async fn async_main(worker_threads: usize) -> anyhow::Result<()> {
    // Load .env file BEFORE initializing logger so RUST_LOG is available
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    tracing::info!(
        "System info: tokio_worker_threads={}, pid={}",
        worker_threads,
        std::process::id()
    );
    tracing::info!("Configuration loaded successfully");

    // Create database connection pool
    let pool = database::create_pool(&config.database).await?;
    tracing::info!("Database connection pool created");

    tracing::info!("Running database migrations...");
    database::run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;
    tracing::info!("Database migrations completed successfully");

    let store: Arc<dyn RetentionStore> = Arc::new(PgRetentionStore::new(pool.clone()));

    // Initialize blob storage
    let blobs: Arc<dyn BlobStore> = match config.storage.backend {
        StorageBackend::Local => Arc::new(
            LocalBlobStore::new(config.storage.local_dir.clone())
                .await
                .map_err(|e| anyhow::anyhow!("Failed to initialize local blob store: {}", e))?,
        ),
        StorageBackend::MinIO => Arc::new(
            MinIOClient::new(config.storage.minio.clone())
                .await
                .map_err(|e| anyhow::anyhow!("Failed to initialize MinIO client: {}", e))?,
        ),
    };
    tracing::info!("Blob store initialized (backend: {})", blobs.backend_name());

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let batch_size = config.retention.sweep_batch_size;

    // Initialize lifecycle services
    let audit_service = Arc::new(AuditService::new(Arc::clone(&store), Arc::clone(&clock)));
    let quota_service = Arc::new(QuotaService::new(
        Arc::clone(&store),
        Arc::clone(&audit_service),
    ));
    let file_service = Arc::new(FileLifecycleService::new(
        Arc::clone(&store),
        Arc::clone(&blobs),
        Arc::clone(&quota_service),
        Arc::clone(&audit_service),
        Arc::clone(&clock),
        batch_size,
    ));
    let account_service = Arc::new(AccountLifecycleService::new(
        Arc::clone(&store),
        Arc::clone(&file_service),
        Arc::clone(&audit_service),
        Arc::clone(&clock),
        batch_size,
    ));
    let file_request_service = Arc::new(FileRequestService::new(
        Arc::clone(&store),
        Arc::clone(&audit_service),
        Arc::clone(&clock),
        batch_size,
    ));
    let sweep_service = Arc::new(SweepService::new(
        Arc::clone(&file_service),
        Arc::clone(&account_service),
        Arc::clone(&file_request_service),
        Arc::clone(&audit_service),
        config.retention.clone(),
    ));
    tracing::info!("Lifecycle services initialized");

    // Spawn background sweep workers
    if config.retention.sweeps_enabled {
        let handles = SweepScheduler::new(Arc::clone(&sweep_service), &config.retention).spawn();
        tracing::info!(
            "{} sweep workers spawned (expiration every {:?}, maintenance every {:?})",
            handles.len(),
            config.retention.expiration_sweep_interval,
            config.retention.maintenance_sweep_interval
        );
    } else {
        tracing::warn!("Background sweeps disabled (SWEEPS_ENABLED=false)");
    }

    // Build application router with dynamic swagger config
    let swagger_modifier = SwaggerInfoModifier {
        title: config.swagger.title.clone(),
        version: config.swagger.version.clone(),
        description: config.swagger.description.clone(),
    };

    let mut openapi = ApiDoc::openapi();
    swagger_modifier.modify(&mut openapi);

    // Admin routes and Swagger UI share the admin credentials; without
    // credentials neither is exposed
    let admin = match config.admin.credentials() {
        Some(credentials) => {
            let credentials = Arc::new(credentials);
            tracing::info!("Admin API enabled with basic auth");

            let swagger = Router::new()
                .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
                .layer(from_fn(middleware::basic_auth_middleware(
                    Arc::clone(&credentials),
                    SWAGGER_REALM,
                )));

            let admin_routes = Router::new()
                .merge(files_routes::routes(
                    Arc::clone(&file_service),
                    Arc::clone(&quota_service),
                    config.retention.trash_retention_days,
                ))
                .merge(accounts_routes::routes(Arc::clone(&account_service)))
                .merge(audit_routes::routes(Arc::clone(&audit_service)))
                .merge(sweeps_routes::routes(Arc::clone(&sweep_service)))
                .route_layer(from_fn(middleware::basic_auth_middleware(
                    credentials,
                    ADMIN_REALM,
                )));

            Router::new().merge(swagger).merge(admin_routes)
        }
        None => {
            tracing::warn!(
                "Admin API disabled (ADMIN_USERNAME/ADMIN_PASSWORD not set); only sweeps run"
            );
            Router::new()
        }
    };

    // Simple health check endpoint (no auth required)
    async fn health_check() -> axum::http::StatusCode {
        axum::http::StatusCode::OK
    }
    let health_route = Router::new().route("/health", axum::routing::get(health_check));

    let app = Router::new()
        .merge(admin)
        .merge(health_route)
        .layer(middleware::cors_layer(
            config.app.cors_allowed_origins.clone(),
        ))
        // Propagate X-Request-Id to response headers
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(middleware::MakeSpanWithRequestId)
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Generate X-Request-Id using UUID v7 (or use client-provided one)
        .layer(SetRequestIdLayer::x_request_id(middleware::MakeRequestUuid));

    // Start server
    let addr = config.app.server_address();
    let socket_addr: std::net::SocketAddr = addr
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid address: {}", e))?;

    // Use socket2 for TCP listener configuration
    let socket = socket2::Socket::new(
        socket2::Domain::for_address(socket_addr),
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_nodelay(true)?;

    #[cfg(target_os = "linux")]
    {
        let keepalive = socket2::TcpKeepalive::new()
            .with_time(std::time::Duration::from_secs(60))
            .with_interval(std::time::Duration::from_secs(10))
            .with_retries(3);
        socket.set_tcp_keepalive(&keepalive)?;
    }
    #[cfg(not(target_os = "linux"))]
    {
        let keepalive = socket2::TcpKeepalive::new().with_time(std::time::Duration::from_secs(60));
        socket.set_tcp_keepalive(&keepalive)?;
    }

    socket.set_nonblocking(true)?;
    socket.bind(&socket_addr.into())?;
    socket.listen(1024)?;

    let listener = tokio::net::TcpListener::from_std(socket.into())?;
    tracing::info!("Server listening on {}", format!("http://{}", addr));

    axum::serve(listener, app).await?;

    Ok(())
}
