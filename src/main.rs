use tracing_subscriber::EnvFilter;

use cx_coach::api::{build_router, AppState};
use cx_coach::config::{self, Settings};
use cx_coach::db::sqlite::open_database;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    let settings = Settings::from_env();
    if settings.openai_api_key.is_empty() {
        tracing::warn!("OPENAI_API_KEY is not set; model calls will fail");
    }

    if let Some(parent) = settings.database_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = open_database(&settings.database_path)?;
    tracing::info!(path = %settings.database_path.display(), "Database ready");

    let state = AppState::new(&settings, conn);
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!(
        addr = %settings.bind_addr,
        version = config::APP_VERSION,
        "{} listening",
        config::APP_NAME
    );
    axum::serve(listener, router).await?;

    Ok(())
}
