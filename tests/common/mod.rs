// Shared harness: boot a relay on an ephemeral port and talk to it over a real WebSocket

#![allow(dead_code)]

use focuscam_api::{decode_payload, encode_payload};
use focuscam_core::RelayConfig;
use focuscam_eye::{BoundingBox, DetectError, Detection, Detector, Frame, FrameCodec, JpegCodec};
use focuscam_server::{RelayServer, RelayState};
use futures_util::{SinkExt, StreamExt};
use image::{Rgb, RgbImage};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

pub const TIMEOUT: Duration = Duration::from_secs(10);

pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

pub fn test_config() -> RelayConfig {
    let mut config = RelayConfig::default();
    config.network.bind_address = "127.0.0.1".to_string();
    config.network.port = 0;
    config.dispatcher.workers = 2;
    config
}

/// Start a relay in the background; returns the WebSocket URL and shared state
pub async fn boot(config: RelayConfig, detector: Arc<dyn Detector>) -> (String, Arc<RelayState>) {
    let server = RelayServer::new(config, detector);
    let state = server.state().clone();
    let listener = server.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server.serve(listener, std::future::pending()));
    (format!("ws://{}/ws", addr), state)
}

/// Like `boot`, but the relay stops when the returned sender fires
pub async fn boot_stoppable(
    config: RelayConfig,
    detector: Arc<dyn Detector>,
) -> (
    String,
    Arc<RelayState>,
    tokio::sync::oneshot::Sender<()>,
    tokio::task::JoinHandle<focuscam_server::Result<()>>,
) {
    let server = RelayServer::new(config, detector);
    let state = server.state().clone();
    let listener = server.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let handle = tokio::spawn(server.serve(listener, async move {
        let _ = stop_rx.await;
    }));
    (format!("ws://{}/ws", addr), state, stop_tx, handle)
}

pub async fn connect(url: &str) -> WsStream {
    let (ws, _) = connect_async(url).await.unwrap();
    ws
}

pub async fn send_json(ws: &mut WsStream, value: Value) {
    ws.send(Message::Text(value.to_string())).await.unwrap();
}

/// Next text message as JSON, skipping control frames
pub async fn read_json(ws: &mut WsStream) -> Value {
    loop {
        let message = timeout(TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for a reply")
            .expect("connection ended")
            .expect("transport error");
        match message {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected message {:?}", other),
        }
    }
}

/// Whether the server ended the connection within the timeout
pub async fn is_closed_by_server(ws: &mut WsStream) -> bool {
    loop {
        match timeout(TIMEOUT, ws.next()).await {
            Err(_) => return false,
            Ok(None) | Ok(Some(Err(_))) | Ok(Some(Ok(Message::Close(_)))) => return true,
            Ok(Some(Ok(_))) => continue,
        }
    }
}

pub async fn handshake(ws: &mut WsStream) {
    send_json(ws, json!({"type": "start"})).await;
    assert_eq!(read_json(ws).await, json!({"type": "ready"}));
}

/// Solid-color JPEG whose width encodes `seq`, so replies can be matched to requests
pub fn jpeg_bytes(seq: u32) -> Vec<u8> {
    let frame = Frame::new(RgbImage::from_pixel(32 + seq, 24, Rgb([70, 70, 70])));
    JpegCodec::default().encode(&frame).unwrap()
}

pub fn frame_message(seq: u32) -> Value {
    json!({"type": "frame", "data": encode_payload(&jpeg_bytes(seq))})
}

/// Decode the image of a `frame` reply
pub fn reply_frame(reply: &Value) -> Frame {
    assert_eq!(reply["type"], "frame", "expected a frame reply, got {}", reply);
    let image = reply["image"].as_str().unwrap();
    JpegCodec::default()
        .decode(&decode_payload(image).unwrap())
        .unwrap()
}

pub fn reply_seq(reply: &Value) -> u32 {
    reply_frame(reply).width() - 32
}

/// Waits until `predicate` holds or the timeout passes
pub async fn eventually(mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    predicate()
}

// ============================================================================
// Detectors
// ============================================================================

fn phone() -> Detection {
    Detection {
        label: "cell phone".to_string(),
        confidence: 0.9,
        bbox: BoundingBox {
            x1: 2.0,
            y1: 2.0,
            x2: 20.0,
            y2: 20.0,
        },
    }
}

/// Sees the target in every frame
pub struct AlwaysPhone;

impl Detector for AlwaysPhone {
    fn infer(&self, _frame: &Frame) -> Result<Vec<Detection>, DetectError> {
        Ok(vec![phone()])
    }
}

/// Sleeps per call and records the peak number of concurrent calls
#[derive(Default)]
pub struct CountingDetector {
    pub delay: Duration,
    pub running: AtomicUsize,
    pub peak: AtomicUsize,
    pub calls: AtomicUsize,
}

impl CountingDetector {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Detector for CountingDetector {
    fn infer(&self, _frame: &Frame) -> Result<Vec<Detection>, DetectError> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.running.fetch_sub(1, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![])
    }
}

/// Fails every call
pub struct BrokenDetector;

impl Detector for BrokenDetector {
    fn infer(&self, _frame: &Frame) -> Result<Vec<Detection>, DetectError> {
        Err(DetectError::Inference("model unavailable".to_string()))
    }
}
