pub mod pipeline;
pub mod transcoder;
pub mod wav;

pub use pipeline::{AudioPipeline, NormalizedAudio, SourceHint};
pub use transcoder::{FfmpegTranscoder, MockTranscoder, Transcoder};
