use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use clap::{Parser, Subcommand};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

use lazzato_server::{
    auth::{AuthConfig, GoogleIdentityProvider},
    db::{self, PgUserStore},
    repository::{MemoryUserStore, UserStore},
    router, AppState,
};

#[derive(Parser)]
#[command(name = "lazzato-server")]
#[command(about = "Google sign-in and session service for the restaurant back office")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Address to listen on
        #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
        bind: SocketAddr,

        /// Postgres connection string.
        /// Append `sslmode=disable` for a local database without TLS.
        #[arg(long, env = "DATABASE_URL", required_unless_present = "memory_store")]
        database_url: Option<String>,

        /// Keep users in process memory instead of Postgres.
        /// Everything is lost on restart; meant for local frontend work.
        #[arg(long)]
        memory_store: bool,
    },
    /// Create the users and restaurants tables if they do not exist
    Migrate {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            bind,
            database_url,
            memory_store,
        } => serve(bind, database_url, memory_store).await,
        Commands::Migrate { database_url } => {
            let pool = db::establish_connection_pool(&database_url)?;
            db::run_migrations(&pool).await
        }
    }
}

async fn serve(
    bind: SocketAddr,
    database_url: Option<String>,
    memory_store: bool,
) -> anyhow::Result<()> {
    let config = AuthConfig::from_env().map_err(|e| anyhow::anyhow!(e.to_string()))?;
    tracing::info!("Loaded auth config: {:?}", config);

    let identity = GoogleIdentityProvider::new(&config).context("Failed to build HTTP client")?;

    let store: Arc<dyn UserStore> = match database_url {
        Some(url) if !memory_store => {
            let pool = db::establish_connection_pool(&url)?;
            db::run_migrations(&pool).await?;
            Arc::new(PgUserStore::new(pool))
        }
        _ => {
            tracing::warn!("Using in-memory user store; users are lost on restart");
            Arc::new(MemoryUserStore::new())
        }
    };

    let state = AppState::new(config, Arc::new(identity), store);
    let app = router(state).layer(build_cors_layer());

    tracing::info!("Server listening on {}", bind);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build CORS layer based on environment configuration.
///
/// If CORS_ALLOWED_ORIGINS is set, only those origins are allowed and
/// credentialed requests carry the session cookies.
/// If not set, defaults to permissive CORS (for development only).
fn build_cors_layer() -> CorsLayer {
    let origins: Vec<HeaderValue> = std::env::var("CORS_ALLOWED_ORIGINS")
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    if origins.is_empty() {
        tracing::warn!(
            "CORS_ALLOWED_ORIGINS not set, using permissive CORS (not recommended for production)"
        );
        return CorsLayer::permissive();
    }

    tracing::info!("CORS configured for origins: {:?}", origins);
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
