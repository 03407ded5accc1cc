//! One streaming transcription connection.
//!
//! ```text
//! Connecting ─▶ AwaitingConfig ─▶ Active ─▶ Closing ─▶ Closed
//!                                   │
//!                                   └─▶ Degraded (closed with 1011)
//! ```
//!
//! Every binary frame is a self-contained chunk: it is acknowledged,
//! truncated to the session's chunk limit, normalized, transcribed and
//! answered with exactly one result frame before the next frame is read.

use crate::audio::{NormalizedAudio, SourceHint};
use crate::engine::PriorityHint;
use crate::error::{Result, VoxgateError};
use crate::language::canonicalize;
use crate::service::{BoundTranscriber, SpeechService, TranscriptOutcome};
use crate::streaming::frame::{ClientConfig, ServerFrame};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Close code sent when no transcriber can be bound.
pub const CLOSE_NO_ENGINE: u16 = 1011;
pub const CLOSE_NO_ENGINE_REASON: &str = "No transcription model available";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    AwaitingConfig,
    Active,
    Closing,
    Closed,
    Degraded,
}

/// A message from the client.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Text(String),
    Binary(Vec<u8>),
}

/// The bidirectional channel a session runs over.
#[async_trait]
pub trait SessionTransport: Send {
    /// Next client message; `None` once the client has gone away.
    async fn recv(&mut self) -> Option<Result<Incoming>>;

    async fn send(&mut self, frame: &ServerFrame) -> Result<()>;

    async fn close(&mut self, code: u16, reason: &str) -> Result<()>;
}

enum Flow {
    Continue,
    Disconnected,
    Degraded,
}

pub struct StreamingSession {
    service: Arc<SpeechService>,
    connection_id: String,
    language: String,
    priority: PriorityHint,
    hint: SourceHint,
    buffer: Vec<u8>,
    chunk_limit: u32,
    engine: Option<BoundTranscriber>,
    last_activity: Instant,
    state: SessionState,
}

impl StreamingSession {
    /// A session for `language`, or the configured default when `None`.
    pub fn new(service: Arc<SpeechService>, language: Option<&str>) -> Self {
        let config = service.config();
        let language = canonicalize(language.unwrap_or(&config.default_language));
        let chunk_limit = config.streaming.chunk_size_limit;
        Self {
            connection_id: uuid::Uuid::new_v4().to_string(),
            language,
            priority: PriorityHint::default(),
            hint: SourceHint::default(),
            buffer: Vec::new(),
            chunk_limit,
            engine: None,
            last_activity: Instant::now(),
            state: SessionState::Connecting,
            service,
        }
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn chunk_limit(&self) -> u32 {
        self.chunk_limit
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Time since the last client frame.
    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    /// Drive the session until the client disconnects or it degrades.
    pub async fn run<T: SessionTransport>(mut self, transport: &mut T) -> SessionState {
        let _active = self.service.session_guard();
        tracing::info!(connection_id = %self.connection_id, language = %self.language, "stream opened");

        self.state = SessionState::AwaitingConfig;
        let first_chunk = match self.await_config(transport).await {
            Some(first_chunk) => first_chunk,
            None => return self.shut_down(),
        };

        self.state = SessionState::Active;
        if let Some(chunk) = first_chunk {
            match self.handle_chunk(transport, chunk).await {
                Flow::Continue => {}
                Flow::Disconnected => return self.shut_down(),
                Flow::Degraded => return self.degrade(),
            }
        }

        while let Some(message) = transport.recv().await {
            match message {
                Ok(Incoming::Binary(chunk)) => match self.handle_chunk(transport, chunk).await {
                    Flow::Continue => {}
                    Flow::Disconnected => break,
                    Flow::Degraded => return self.degrade(),
                },
                Ok(Incoming::Text(text)) => {
                    self.last_activity = Instant::now();
                    tracing::debug!(connection_id = %self.connection_id, len = text.len(), "ignoring text frame");
                }
                Err(e) => {
                    tracing::warn!(connection_id = %self.connection_id, error = %e, "receive failed");
                    break;
                }
            }
        }

        self.shut_down()
    }

    /// Wait for the optional config frame.
    ///
    /// `None` means the client left; `Some(Some(chunk))` carries a binary
    /// frame that arrived before any config.
    async fn await_config<T: SessionTransport>(&mut self, transport: &mut T) -> Option<Option<Vec<u8>>> {
        let timeout = Duration::from_millis(self.service.config().streaming.config_timeout_ms);
        match tokio::time::timeout(timeout, transport.recv()).await {
            Err(_) => {
                tracing::debug!(connection_id = %self.connection_id, "no config frame, using defaults");
                Some(None)
            }
            Ok(None) => None,
            Ok(Some(Err(e))) => {
                tracing::warn!(connection_id = %self.connection_id, error = %e, "receive failed");
                None
            }
            Ok(Some(Ok(Incoming::Text(text)))) => {
                self.last_activity = Instant::now();
                match ClientConfig::parse(&text) {
                    Some(config) => self.apply_config(config),
                    None => tracing::warn!(connection_id = %self.connection_id, "malformed config frame, using defaults"),
                }
                Some(None)
            }
            Ok(Some(Ok(Incoming::Binary(chunk)))) => Some(Some(chunk)),
        }
    }

    fn apply_config(&mut self, config: ClientConfig) {
        if let Some(language) = config.language.as_deref() {
            self.language = canonicalize(language);
        }
        match config.chunk_size_limit {
            Some(0) => tracing::warn!(connection_id = %self.connection_id, "ignoring zero chunk limit"),
            Some(limit) => self.chunk_limit = limit,
            None => {}
        }
        if let Some(hint) = config.source_hint() {
            self.hint = hint;
        }
        if let Some(priority) = config.priority.as_deref() {
            match priority.parse() {
                Ok(priority) => self.priority = priority,
                Err(e) => tracing::warn!(connection_id = %self.connection_id, error = %e, "ignoring priority"),
            }
        }
        tracing::info!(
            connection_id = %self.connection_id,
            language = %self.language,
            chunk_limit = self.chunk_limit,
            "stream configured"
        );
    }

    async fn handle_chunk<T: SessionTransport>(&mut self, transport: &mut T, chunk: Vec<u8>) -> Flow {
        self.last_activity = Instant::now();
        let size = chunk.len();
        let streaming = &self.service.config().streaming;

        if streaming.ack_chunks && transport.send(&ServerFrame::chunk_received(size)).await.is_err() {
            return Flow::Disconnected;
        }

        self.buffer = chunk;
        let limit = self.chunk_limit as usize;
        if self.buffer.len() > limit {
            tracing::info!(connection_id = %self.connection_id, from = size, to = limit, "truncating chunk");
            self.buffer.truncate(limit);
        }

        // Checked after truncation: a small client limit can shrink a chunk below it.
        if self.buffer.len() < streaming.min_chunk_bytes {
            self.buffer.clear();
            return match transport.send(&ServerFrame::need_more_audio()).await {
                Ok(()) => Flow::Continue,
                Err(_) => Flow::Disconnected,
            };
        }

        let frame = match self.transcribe_buffer().await {
            Ok(frame) => frame,
            Err(e @ VoxgateError::NoEngineAvailable { .. }) => {
                tracing::error!(connection_id = %self.connection_id, error = %e, "no transcriber for stream");
                let messages = self.service.config().messages(&self.language);
                let frame = ServerFrame::error(e.code(), e.user_message(&messages));
                if transport.send(&frame).await.is_ok()
                    && let Err(e) = transport.close(CLOSE_NO_ENGINE, CLOSE_NO_ENGINE_REASON).await
                {
                    tracing::debug!(connection_id = %self.connection_id, error = %e, "close failed");
                }
                return Flow::Degraded;
            }
            Err(e) => self.error_frame(&e),
        };
        self.buffer.clear();

        match transport.send(&frame).await {
            Ok(()) => Flow::Continue,
            Err(e) => {
                tracing::debug!(connection_id = %self.connection_id, error = %e, "result dropped, client gone");
                Flow::Disconnected
            }
        }
    }

    async fn transcribe_buffer(&mut self) -> Result<ServerFrame> {
        let pcm = match self.service.pipeline().normalize(&self.buffer, self.hint).await? {
            NormalizedAudio::Pcm(pcm) => pcm,
            NormalizedAudio::TooShort { .. } => return Ok(ServerFrame::need_more_audio()),
        };

        let bound = match &self.engine {
            Some(bound) => bound.clone(),
            None => {
                let bound = self
                    .service
                    .bind_transcriber(&self.language, self.priority)
                    .await?;
                tracing::info!(connection_id = %self.connection_id, engine = %bound.key, "stream engine bound");
                self.engine = Some(bound.clone());
                bound
            }
        };

        let transcription = self
            .service
            .run_inference(&bound, pcm, &self.language)
            .await?;

        Ok(match self.service.finish(&bound.key, transcription, &self.language) {
            TranscriptOutcome::Transcript {
                text,
                segments,
                engine,
            } => ServerFrame::success(text, segments, engine, &self.language),
            TranscriptOutcome::NoSpeech { .. } => ServerFrame::no_speech_detected(None),
            TranscriptOutcome::NoiseRejected { message } => ServerFrame::no_speech_detected(Some(message)),
            TranscriptOutcome::TooShort { .. } => ServerFrame::need_more_audio(),
        })
    }

    fn error_frame(&self, error: &VoxgateError) -> ServerFrame {
        let messages = self.service.config().messages(&self.language);
        match error {
            VoxgateError::CorruptAudio { .. } | VoxgateError::ConversionFailed { .. } => {
                tracing::warn!(connection_id = %self.connection_id, error = %error, "invalid audio chunk");
                ServerFrame::invalid_audio_data(error.user_message(&messages))
            }
            _ => {
                tracing::error!(connection_id = %self.connection_id, error = %error, "chunk failed");
                ServerFrame::error(error.code(), error.user_message(&messages))
            }
        }
    }

    fn shut_down(mut self) -> SessionState {
        self.state = SessionState::Closing;
        self.release();
        self.state = SessionState::Closed;
        tracing::info!(connection_id = %self.connection_id, "stream closed");
        self.state
    }

    fn degrade(mut self) -> SessionState {
        self.release();
        self.state = SessionState::Degraded;
        tracing::warn!(connection_id = %self.connection_id, "stream degraded");
        self.state
    }

    fn release(&mut self) {
        self.buffer.clear();
        self.engine = None;
    }
}

/// What a [`ChannelTransport`] hands back to its client side.
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    Frame(ServerFrame),
    Close { code: u16, reason: String },
}

/// In-memory transport for tests and in-process clients.
pub struct ChannelTransport {
    incoming: mpsc::UnboundedReceiver<Incoming>,
    outgoing: mpsc::UnboundedSender<Outgoing>,
}

/// Client half of a [`ChannelTransport`]. Dropping `sender` disconnects.
pub struct ChannelClient {
    pub sender: mpsc::UnboundedSender<Incoming>,
    pub receiver: mpsc::UnboundedReceiver<Outgoing>,
}

impl ChannelTransport {
    pub fn pair() -> (ChannelTransport, ChannelClient) {
        let (client_tx, incoming) = mpsc::unbounded_channel();
        let (outgoing, client_rx) = mpsc::unbounded_channel();
        (
            ChannelTransport { incoming, outgoing },
            ChannelClient {
                sender: client_tx,
                receiver: client_rx,
            },
        )
    }

    fn push(&self, message: Outgoing) -> Result<()> {
        self.outgoing
            .send(message)
            .map_err(|_| VoxgateError::Transport {
                message: "client receiver dropped".to_string(),
            })
    }
}

#[async_trait]
impl SessionTransport for ChannelTransport {
    async fn recv(&mut self) -> Option<Result<Incoming>> {
        self.incoming.recv().await.map(Ok)
    }

    async fn send(&mut self, frame: &ServerFrame) -> Result<()> {
        self.push(Outgoing::Frame(frame.clone()))
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<()> {
        self.incoming.close();
        self.push(Outgoing::Close {
            code,
            reason: reason.to_string(),
        })
    }
}
