//! WebSocket adaptor for streaming sessions.

use crate::error::{Result, VoxgateError};
use crate::service::SpeechService;
use crate::streaming::{Incoming, ServerFrame, SessionTransport, StreamingSession};
use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use std::sync::Arc;

pub struct WebSocketTransport {
    socket: WebSocket,
}

impl WebSocketTransport {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

fn transport_error(e: axum::Error) -> VoxgateError {
    VoxgateError::Transport {
        message: e.to_string(),
    }
}

#[async_trait]
impl SessionTransport for WebSocketTransport {
    async fn recv(&mut self) -> Option<Result<Incoming>> {
        loop {
            match self.socket.recv().await? {
                Ok(Message::Text(text)) => return Some(Ok(Incoming::Text(text.as_str().to_string()))),
                Ok(Message::Binary(bytes)) => return Some(Ok(Incoming::Binary(bytes.to_vec()))),
                // axum answers pings itself.
                Ok(Message::Ping(_) | Message::Pong(_)) => continue,
                Ok(Message::Close(_)) => return None,
                Err(e) => return Some(Err(transport_error(e))),
            }
        }
    }

    async fn send(&mut self, frame: &ServerFrame) -> Result<()> {
        self.socket
            .send(Message::Text(frame.to_json().into()))
            .await
            .map_err(transport_error)
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<()> {
        self.socket
            .send(Message::Close(Some(CloseFrame {
                code,
                reason: reason.into(),
            })))
            .await
            .map_err(transport_error)
    }
}

/// Run one streaming session over an upgraded socket.
pub async fn serve_socket(socket: WebSocket, service: Arc<SpeechService>, language: Option<String>) {
    let session = StreamingSession::new(service, language.as_deref());
    let connection_id = session.connection_id().to_string();
    let mut transport = WebSocketTransport::new(socket);
    let state = session.run(&mut transport).await;
    tracing::debug!(%connection_id, ?state, "websocket finished");
}
