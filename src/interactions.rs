//! In-memory store of practice sessions and their interactions.
//!
//! Process-lifetime only; nothing is persisted.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    pub user_id: String,
    pub language: String,
    pub proficiency_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub language: String,
    pub proficiency_level: String,
    /// Seconds since the Unix epoch.
    pub created_at: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInteraction {
    pub session_id: String,
    pub user_message: String,
    pub ai_response: String,
    #[serde(default)]
    pub audio_url: String,
    /// Defaults to now.
    pub timestamp: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    pub id: String,
    pub session_id: String,
    pub user_message: String,
    pub ai_response: String,
    pub audio_url: String,
    pub timestamp: f64,
}

#[derive(Default)]
pub struct InteractionStore {
    sessions: RwLock<HashMap<String, Session>>,
    interactions: RwLock<Vec<Interaction>>,
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

impl InteractionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_session(&self, request: NewSession) -> Session {
        let session = Session {
            id: format!("session-{}", uuid::Uuid::new_v4()),
            user_id: request.user_id,
            language: request.language,
            proficiency_level: request.proficiency_level,
            created_at: now_secs(),
        };
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        tracing::debug!(id = %session.id, user = %session.user_id, "session created");
        session
    }

    /// Sessions of one user, oldest first.
    pub async fn sessions_for_user(&self, user_id: &str) -> Vec<Session> {
        let mut sessions: Vec<Session> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| a.created_at.total_cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        sessions
    }

    /// Record an interaction. Unknown session ids are accepted.
    pub async fn save_interaction(&self, request: NewInteraction) -> Interaction {
        let interaction = Interaction {
            id: format!("interaction-{}", uuid::Uuid::new_v4()),
            session_id: request.session_id,
            user_message: request.user_message,
            ai_response: request.ai_response,
            audio_url: request.audio_url,
            timestamp: request.timestamp.unwrap_or_else(now_secs),
        };
        self.interactions.write().await.push(interaction.clone());
        interaction
    }

    /// Interactions of one session ordered by timestamp.
    pub async fn interactions_for_session(&self, session_id: &str) -> Vec<Interaction> {
        let mut interactions: Vec<Interaction> = self
            .interactions
            .read()
            .await
            .iter()
            .filter(|i| i.session_id == session_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps.
        interactions.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        interactions
    }
}
