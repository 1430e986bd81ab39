use std::sync::Arc;

use clap::Parser;
use redline_api::config::Config;
use redline_api::suggest::{HttpSuggester, Suggester};
use redline_api::{db, ledger, router, AppState};
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();

    let pool = db::create_pool(&config.database_url)?;
    db::run_migrations(&pool)?;

    if config.rebuild_counts {
        let mut conn = pool.get()?;
        let drifted = ledger::rebuild_counts(&mut conn)?;
        tracing::info!(drifted, "Rebuilt vote counts from ledger");
    }

    let suggester = config.suggest_url.clone().map(|url| {
        tracing::info!("Suggestions enabled via {}", url);
        Arc::new(HttpSuggester::new(url)) as Arc<dyn Suggester>
    });

    let state = AppState {
        db: pool,
        jwt_secret: config.jwt_secret.clone(),
        best_choice: config.best_choice,
        suggester,
    };

    let cors = CorsLayer::new()
        .allow_origin(config.cors_origin.parse::<axum::http::HeaderValue>()?)
        .allow_methods(AllowMethods::any())
        .allow_headers(AllowHeaders::any());

    let app = router(state).layer(cors);

    tracing::info!("API server listening on {}", config.bind);
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
