use smartmadrassa_gate::{
    AppState, ContentState, DirectoryState, InMemoryDirectory, MockAuthProvider, PostgresDirectory,
    RouteTable, StaticContentLoader, SupabaseAuthProvider,
    config::{AppConfig, Env},
    create_router,
    provider::AuthProviderState,
};
use sqlx::postgres::PgPoolOptions;
use std::{process, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, sets up logging, wires the directory, identity
/// provider and content services into the shared state, and serves HTTP.
#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {e}");
            process::exit(1);
        }
    };

    // RUST_LOG wins over the defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "smartmadrassa_gate=debug,tower_http=info,axum=trace".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // JSON lines for the log aggregator.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    let directory: DirectoryState = match &config.db_url {
        Some(db_url) => {
            let pool = match PgPoolOptions::new().max_connections(5).connect(db_url).await {
                Ok(pool) => pool,
                Err(e) => {
                    tracing::error!(error = %e, "failed to connect to Postgres; check DATABASE_URL");
                    process::exit(1);
                }
            };
            Arc::new(PostgresDirectory::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using an empty in-memory profile directory");
            Arc::new(InMemoryDirectory::default())
        }
    };

    let auth: AuthProviderState = match (&config.auth_url, &config.auth_anon_key) {
        (Some(url), Some(key)) => Arc::new(SupabaseAuthProvider::new(url, key)),
        _ => {
            tracing::warn!("AUTH_URL not set; sign-in goes through the local mock provider");
            Arc::new(MockAuthProvider::new(&config.jwt_secret))
        }
    };

    let content = Arc::new(StaticContentLoader::new(config.content_dir.clone())) as ContentState;

    let app_state = AppState {
        directory,
        auth,
        routes: Arc::new(RouteTable::school()),
        content,
        config: config.clone(),
    };

    let app = create_router(app_state);

    let listener = match TcpListener::bind(&config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, addr = %config.bind_addr, "failed to bind");
            process::exit(1);
        }
    };

    tracing::info!("Listening on {}", config.bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server stopped");
        process::exit(1);
    }
}
