use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::errors::AppError;
use crate::services::engine;
use crate::state::AppState;

pub const GREETING: &str =
    "Bonjour ! Je suis BOB, votre assistant de réservation auto. Comment puis-je vous aider aujourd'hui ?";

#[derive(Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

#[derive(Serialize)]
pub struct ProcessState {
    #[serde(rename = "currentStep")]
    pub current_step: u8,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub success: bool,
    #[serde(rename = "botResponse")]
    pub bot_response: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "processState")]
    pub process_state: ProcessState,
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let message = payload.message.trim().to_string();
    if message.is_empty() {
        return Err(AppError::InvalidRequest("le message est requis".to_string()));
    }

    let session_id = payload
        .session_id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    tracing::info!(session = %session_id, message = %message, "incoming message");

    let outcome = engine::process_turn(&state, &session_id, &message).await;

    Ok(Json(ChatResponse {
        success: true,
        bot_response: outcome.reply,
        session_id,
        process_state: ProcessState {
            current_step: outcome.step.index(),
        },
    }))
}

#[derive(Deserialize)]
pub struct ResetRequest {
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

#[derive(Serialize)]
pub struct ResetResponse {
    pub success: bool,
    #[serde(rename = "botResponse")]
    pub bot_response: String,
}

pub async fn reset(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ResetRequest>,
) -> Result<Json<ResetResponse>, AppError> {
    let session_id = payload.session_id.trim().to_string();
    if session_id.is_empty() {
        return Err(AppError::InvalidRequest(
            "l'identifiant de session est requis".to_string(),
        ));
    }

    state.sessions.reset(&session_id).await;
    tracing::info!(session = %session_id, "session reset");

    Ok(Json(ResetResponse {
        success: true,
        bot_response: GREETING.to_string(),
    }))
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "message": "Le serveur du chatbot est en ligne",
        "sessions": state.sessions.len(),
        "config": {
            "port": state.config.port,
            "api": state.config.backend_url,
            "llmProvider": state.config.llm_provider,
            "ollama": state.config.ollama_url,
        }
    }))
}
