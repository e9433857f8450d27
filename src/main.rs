use tetatet::config::Config;
use tetatet::mail::Mailer;
use tetatet::{AppState, db};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    let db_pool = db::connect(&config.database_url).await?;
    db::init(&db_pool).await?;

    let mailer = Mailer::from_config(&config);
    let bind_addr = config.bind_addr.clone();
    let app = tetatet::router(AppState::new(db_pool, mailer, config));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(%bind_addr, "tetatet is listening");
    axum::serve(listener, app).await?;
    Ok(())
}
