use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use garagebook::config::AppConfig;
use garagebook::handlers;
use garagebook::services::ai::groq::GroqProvider;
use garagebook::services::ai::ollama::OllamaProvider;
use garagebook::services::ai::CompletionProvider;
use garagebook::services::backend::http::HttpBackend;
use garagebook::services::registry::SessionRegistry;
use garagebook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let completion: Box<dyn CompletionProvider> = match config.llm_provider.as_str() {
        "groq" => {
            anyhow::ensure!(
                !config.groq_api_key.is_empty(),
                "GROQ_API_KEY must be set when LLM_PROVIDER=groq"
            );
            tracing::info!("using Groq completion provider (model: {})", config.groq_model);
            Box::new(GroqProvider::new(
                config.groq_api_key.clone(),
                config.groq_model.clone(),
            ))
        }
        _ => {
            tracing::info!("using Ollama completion provider (url: {})", config.ollama_url);
            Box::new(OllamaProvider::new(
                config.ollama_url.clone(),
                config.ollama_model.clone(),
            ))
        }
    };

    let backend = HttpBackend::new(
        config.backend_url.clone(),
        config.backend_email.clone(),
        config.backend_password.clone(),
    );

    let state = Arc::new(AppState {
        config: config.clone(),
        completion,
        backend: Box::new(backend),
        sessions: SessionRegistry::new(),
    });

    let app = Router::new()
        .route("/chat", post(handlers::chat::chat))
        .route("/reset", post(handlers::chat::reset))
        .route("/status", get(handlers::chat::status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
