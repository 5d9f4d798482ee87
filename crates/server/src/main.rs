mod routes;

use axum::Router;
use pcb_assemble::PadAliasTable;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Generation runs are synchronous and bounded by library size.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };
    tracing::info!(
        "Runs stored in {}, {} extra footprint roots",
        config.output_dir.display(),
        config.footprint_paths.len()
    );
    let state = AppState {
        config: Arc::new(config),
    };

    let app = Router::new()
        .merge(routes::router())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Cannot bind {bind_addr}: {e}");
            std::process::exit(1);
        }
    };
    tracing::info!("Listening on {bind_addr}");
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {e}");
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Each run gets `<output_dir>/<run id>/`.
    pub output_dir: PathBuf,
    pub footprint_paths: Vec<PathBuf>,
    pub system_libraries: bool,
    pub pad_aliases: PadAliasTable,
    pub base_url: String,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, pcb_assemble::AssembleError> {
        let output_dir = std::env::var_os("OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./runs"));
        let footprint_paths = std::env::var_os("FOOTPRINT_PATHS")
            .map(|paths| std::env::split_paths(&paths).collect())
            .unwrap_or_default();
        let system_libraries = std::env::var("SYSTEM_LIBRARIES")
            .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "no"))
            .unwrap_or(true);

        let mut pad_aliases = PadAliasTable::default();
        if let Some(path) = std::env::var_os("PAD_ALIASES") {
            pad_aliases.extend(PadAliasTable::load(&PathBuf::from(path))?);
        }

        let base_url =
            std::env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());

        Ok(Self {
            output_dir,
            footprint_paths,
            system_libraries,
            pad_aliases,
            base_url,
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
}
