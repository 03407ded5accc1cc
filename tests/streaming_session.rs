use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use voxgate::audio::Transcoder;
use voxgate::audio::wav::encode_wav;
use voxgate::config::Config;
use voxgate::engine::Capabilities;
use voxgate::engine::loader::MockEngineLoader;
use voxgate::models::{ArtifactStore, OfflineFetcher, StorePolicy};
use voxgate::streaming::{
    ChannelClient, ChannelTransport, FrameStatus, Incoming, Outgoing, ServerFrame, SessionState,
    StreamingSession,
};
use voxgate::{Result, SpeechService};

/// Records the size of every file it is asked to convert.
#[derive(Clone, Default)]
struct RecordingTranscoder {
    inputs: Arc<Mutex<Vec<u64>>>,
}

impl RecordingTranscoder {
    fn input_sizes(&self) -> Vec<u64> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcoder for RecordingTranscoder {
    async fn probe(&self, _input: &Path) -> Result<()> {
        Ok(())
    }

    async fn convert(&self, input: &Path, output: &Path) -> Result<()> {
        let size = std::fs::metadata(input)?.len();
        self.inputs.lock().unwrap().push(size);
        std::fs::write(output, encode_wav(&vec![300i16; 8000], 16000)?)?;
        Ok(())
    }
}

fn service(dir: &TempDir, loader: Arc<MockEngineLoader>, transcoder: Arc<dyn Transcoder>) -> Arc<SpeechService> {
    let store = ArtifactStore::new(dir.path(), Arc::new(OfflineFetcher), StorePolicy::default());
    Arc::new(
        SpeechService::builder(Config::default())
            .capabilities(Capabilities::all())
            .loader(loader)
            .transcoder(transcoder)
            .store(Arc::new(store))
            .build()
            .unwrap(),
    )
}

async fn next_frame(client: &mut ChannelClient) -> ServerFrame {
    match client.receiver.recv().await {
        Some(Outgoing::Frame(frame)) => frame,
        other => panic!("expected frame, got {other:?}"),
    }
}

#[tokio::test]
async fn small_chunk_needs_more_audio_without_inference() {
    let dir = TempDir::new().unwrap();
    let loader = Arc::new(MockEngineLoader::new());
    let transcoder = RecordingTranscoder::default();
    let service = service(&dir, loader.clone(), Arc::new(transcoder.clone()));

    let (mut transport, mut client) = ChannelTransport::pair();
    let session = StreamingSession::new(service, Some("en"));
    let task = tokio::spawn(async move { session.run(&mut transport).await });

    client.sender.send(Incoming::Binary(vec![7; 100])).unwrap();
    assert_eq!(next_frame(&mut client).await.status, FrameStatus::ChunkReceived);
    assert_eq!(next_frame(&mut client).await.status, FrameStatus::NeedMoreAudio);

    drop(client.sender);
    assert_eq!(task.await.unwrap(), SessionState::Closed);
    assert_eq!(loader.total_loads(), 0);
    assert!(transcoder.input_sizes().is_empty());
}

#[tokio::test]
async fn oversized_chunk_is_truncated_to_client_limit() {
    let dir = TempDir::new().unwrap();
    let transcoder = RecordingTranscoder::default();
    let service = service(&dir, Arc::new(MockEngineLoader::new()), Arc::new(transcoder.clone()));

    let (mut transport, mut client) = ChannelTransport::pair();
    let session = StreamingSession::new(Arc::clone(&service), None);
    let task = tokio::spawn(async move { session.run(&mut transport).await });

    client
        .sender
        .send(Incoming::Text(r#"{"language":"xx","chunkSizeLimit":20000}"#.to_string()))
        .unwrap();
    client.sender.send(Incoming::Binary(vec![0x1a; 30000])).unwrap();

    assert_eq!(next_frame(&mut client).await, ServerFrame::chunk_received(30000));
    let result = next_frame(&mut client).await;
    assert!(
        matches!(result.status, FrameStatus::Success | FrameStatus::NoSpeechDetected),
        "{result:?}"
    );
    assert_eq!(transcoder.input_sizes(), vec![20000]);

    drop(client.sender);
    assert_eq!(task.await.unwrap(), SessionState::Closed);
    assert_eq!(service.active_sessions(), 0);
}

#[tokio::test]
async fn chunk_truncated_below_minimum_needs_more_audio() {
    let dir = TempDir::new().unwrap();
    let loader = Arc::new(MockEngineLoader::new());
    let transcoder = RecordingTranscoder::default();
    let service = service(&dir, loader.clone(), Arc::new(transcoder.clone()));

    let (mut transport, mut client) = ChannelTransport::pair();
    let session = StreamingSession::new(service, None);
    let task = tokio::spawn(async move { session.run(&mut transport).await });

    client
        .sender
        .send(Incoming::Text(r#"{"language":"en","chunkSizeLimit":1000}"#.to_string()))
        .unwrap();
    client.sender.send(Incoming::Binary(vec![5; 5000])).unwrap();

    assert_eq!(next_frame(&mut client).await, ServerFrame::chunk_received(5000));
    assert_eq!(next_frame(&mut client).await.status, FrameStatus::NeedMoreAudio);

    drop(client.sender);
    assert_eq!(task.await.unwrap(), SessionState::Closed);
    assert_eq!(loader.total_loads(), 0);
    assert!(transcoder.input_sizes().is_empty());
}

#[tokio::test]
async fn sessions_share_one_cached_engine() {
    let dir = TempDir::new().unwrap();
    let loader = Arc::new(MockEngineLoader::new());
    let service = service(&dir, loader.clone(), Arc::new(RecordingTranscoder::default()));

    let mut clients = Vec::new();
    let mut tasks = Vec::new();
    for _ in 0..4 {
        let (mut transport, client) = ChannelTransport::pair();
        let session = StreamingSession::new(Arc::clone(&service), Some("en"));
        tasks.push(tokio::spawn(async move { session.run(&mut transport).await }));
        clients.push(client);
    }

    for client in &mut clients {
        client.sender.send(Incoming::Binary(vec![1; 6000])).unwrap();
    }
    for client in &mut clients {
        assert_eq!(next_frame(client).await.status, FrameStatus::ChunkReceived);
        assert_eq!(next_frame(client).await.status, FrameStatus::Success);
    }
    assert_eq!(service.active_sessions(), 4);

    drop(clients);
    for task in tasks {
        assert_eq!(task.await.unwrap(), SessionState::Closed);
    }
    assert_eq!(loader.total_loads(), 1);
    assert_eq!(service.active_sessions(), 0);
}
