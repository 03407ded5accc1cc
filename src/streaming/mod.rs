//! Streaming transcription over a long-lived bidirectional channel.
//!
//! ```text
//! client ──binary chunk──▶ StreamingSession ──▶ AudioPipeline ──▶ engine ──▶ normalizer
//!    ▲                            │
//!    └────── JSON ServerFrame ────┘
//! ```

pub mod frame;
pub mod session;

pub use frame::{ClientConfig, FrameStatus, ServerFrame};
pub use session::{
    ChannelClient, ChannelTransport, Incoming, Outgoing, SessionState, SessionTransport,
    StreamingSession,
};
