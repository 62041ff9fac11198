use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use geopoints::config::{LoggingSettings, Settings, StoreBackend};
use geopoints::core::{OwnershipPolicy, PointFacade, ProximityPlanner};
use geopoints::routes::{self, AppState, PrincipalConfig};
use geopoints::services::{MemoryStore, PointStore, PostgresStore};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Initialize logging. RUST_LOG takes precedence over the configured level.
fn init_tracing(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    match logging.format.as_str() {
        "pretty" => subscriber.pretty().init(),
        "compact" => subscriber.compact().init(),
        _ => subscriber.json().init(),
    }
}

async fn build_store(settings: &Settings) -> Result<Arc<dyn PointStore>, std::io::Error> {
    match settings.store.backend {
        StoreBackend::Memory => {
            info!("Using in-memory store");
            Ok(Arc::new(MemoryStore::new(settings.store.spatial)))
        }
        StoreBackend::Postgres => {
            let store = PostgresStore::from_settings(&settings.database, settings.store.spatial)
                .await
                .map_err(|e| {
                    error!("Failed to connect to PostgreSQL: {}", e);
                    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
                })?;

            info!(
                "PostgreSQL store initialized (max: {} connections)",
                settings.database.max_connections
            );
            Ok(Arc::new(store))
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = Settings::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    init_tracing(&settings.logging);

    info!("Starting geopoints service...");

    let store = build_store(&settings).await?;

    let ownership: OwnershipPolicy = settings.points.ownership;
    let facade = PointFacade::new(store)
        .with_planner(ProximityPlanner::new(settings.search.fallback_on_query_error))
        .with_ownership(ownership);

    info!(
        "Facade ready (spatial index: {}, ownership: {:?})",
        facade.spatial_support().is_available(),
        ownership
    );

    let app_state = AppState { facade };
    let principal_config = PrincipalConfig {
        header: settings.auth.principal_header.clone(),
    };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::Data::new(principal_config.clone()))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
