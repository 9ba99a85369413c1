// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! End-to-end tests for the streaming server
//!
//! 真实 TCP 监听 + tokio-tungstenite 客户端

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use pose_kinematics::config::StreamConfig;
use pose_kinematics::detection::{Detector, NullDetector, ReplayDetector};
use pose_kinematics::input::{Frame, FrameSource, MemorySource, SequenceOpener, SourceOpener};
use pose_kinematics::stream::{serve, SharedDetector};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// 记录每个打开的采集源是否已释放
#[derive(Default)]
struct TrackingOpener {
    released: Mutex<Vec<Arc<AtomicBool>>>,
}

impl TrackingOpener {
    fn opens(&self) -> usize {
        self.released.lock().unwrap().len()
    }

    fn all_released(&self) -> bool {
        let flags = self.released.lock().unwrap();
        !flags.is_empty() && flags.iter().all(|f| f.load(Ordering::SeqCst))
    }
}

impl SourceOpener for TrackingOpener {
    fn open(&self) -> pose_kinematics::Result<Box<dyn FrameSource>> {
        let frames = (0..10_000).map(|i| Frame::blank(i, 0.0)).collect();
        let source = MemorySource::new(frames);
        self.released.lock().unwrap().push(source.release_flag());
        Ok(Box::new(source))
    }
}

fn config() -> StreamConfig {
    StreamConfig {
        frame_interval_ms: 5,
        ..Default::default()
    }
}

fn shared(detector: impl Detector + 'static) -> SharedDetector {
    let boxed: Box<dyn Detector> = Box::new(detector);
    Arc::new(Mutex::new(boxed))
}

async fn start_server(opener: Arc<dyn SourceOpener>, detector: SharedDetector) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, opener, detector, config()));
    format!("ws://{addr}")
}

async fn connect(url: &str) -> Client {
    let (ws, _) = connect_async(url).await.expect("Failed to connect");
    ws
}

async fn send_action(ws: &mut Client, action: &str) {
    let text = serde_json::json!({ "action": action }).to_string();
    ws.send(Message::Text(text.into())).await.unwrap();
}

async fn next_json(ws: &mut Client) -> Value {
    loop {
        let msg = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for message")
            .expect("connection closed")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// 跳过画面帧, 返回下一条非 frame 消息
async fn next_control(ws: &mut Client) -> Value {
    loop {
        let json = next_json(ws).await;
        if json["type"] != "frame" {
            return json;
        }
    }
}

async fn next_frame(ws: &mut Client) -> Value {
    loop {
        let json = next_json(ws).await;
        if json["type"] == "frame" {
            return json;
        }
    }
}

#[tokio::test]
async fn test_greeting_start_stop() {
    let opener = Arc::new(TrackingOpener::default());
    let url = start_server(opener.clone(), shared(NullDetector)).await;
    let mut ws = connect(&url).await;

    let hello = next_json(&mut ws).await;
    assert_eq!(hello["type"], "info");
    assert_eq!(hello["message"], "Connected to Video Processor");

    send_action(&mut ws, "start").await;
    let ack = next_control(&mut ws).await;
    assert_eq!(ack["type"], "response");
    assert_eq!(ack["message"], "Camera streaming started");

    let frame = next_frame(&mut ws).await;
    let bytes = STANDARD.decode(frame["data"].as_str().unwrap()).unwrap();
    let image = image::load_from_memory(&bytes).unwrap();
    assert_eq!((image.width(), image.height()), (64, 64));
    assert!(frame["timestamp"].as_str().unwrap().contains('T'));

    send_action(&mut ws, "stop").await;
    let ack = next_control(&mut ws).await;
    assert_eq!(ack["message"], "Camera streaming stopped");
    assert!(opener.all_released());

    // 确认之后不应再收到画面
    let quiet = timeout(Duration::from_millis(100), ws.next()).await;
    assert!(quiet.is_err(), "unexpected message after stop: {:?}", quiet);
}

#[tokio::test]
async fn test_double_start_opens_once() {
    let opener = Arc::new(TrackingOpener::default());
    let url = start_server(opener.clone(), shared(NullDetector)).await;
    let mut ws = connect(&url).await;
    next_json(&mut ws).await;

    send_action(&mut ws, "start").await;
    send_action(&mut ws, "start").await;
    assert_eq!(next_control(&mut ws).await["message"], "Camera streaming started");
    assert_eq!(
        next_control(&mut ws).await["message"],
        "Camera streaming already active"
    );
    assert_eq!(opener.opens(), 1);
}

#[tokio::test]
async fn test_unknown_and_malformed_commands() {
    let url = start_server(Arc::new(TrackingOpener::default()), shared(NullDetector)).await;
    let mut ws = connect(&url).await;
    next_json(&mut ws).await;

    send_action(&mut ws, "dance").await;
    let err = next_json(&mut ws).await;
    assert_eq!(err["type"], "error");
    assert_eq!(err["message"], "Unknown command: dance");

    ws.send(Message::Text("{not json".into())).await.unwrap();
    let err = next_json(&mut ws).await;
    assert_eq!(err["message"], "Invalid JSON format");

    // 会话仍然可用
    send_action(&mut ws, "stop").await;
    assert_eq!(next_json(&mut ws).await["message"], "Camera streaming stopped");
}

#[tokio::test]
async fn test_disconnect_releases_source() {
    let opener = Arc::new(TrackingOpener::default());
    let url = start_server(opener.clone(), shared(NullDetector)).await;
    let mut ws = connect(&url).await;
    next_json(&mut ws).await;

    send_action(&mut ws, "start").await;
    next_frame(&mut ws).await;
    let _ = ws.close(None).await;
    drop(ws);

    let released = timeout(Duration::from_secs(5), async {
        while !opener.all_released() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(released.is_ok(), "source not released after disconnect");
}

#[tokio::test]
async fn test_clients_are_independent() {
    let opener = Arc::new(TrackingOpener::default());
    let url = start_server(opener.clone(), shared(NullDetector)).await;
    let mut a = connect(&url).await;
    let mut b = connect(&url).await;
    next_json(&mut a).await;
    next_json(&mut b).await;

    send_action(&mut a, "start").await;
    assert_eq!(next_control(&mut a).await["message"], "Camera streaming started");

    send_action(&mut b, "stop").await;
    assert_eq!(next_json(&mut b).await["message"], "Camera streaming stopped");

    // b 的 stop 不影响 a
    next_frame(&mut a).await;
    assert_eq!(opener.opens(), 1);
    assert!(!opener.all_released());
}

#[tokio::test]
async fn test_stream_image_sequence_with_annotations() {
    let tmp = tempfile::tempdir().unwrap();
    let frames = tmp.path().join("frames");
    let annotations = tmp.path().join("detections.jsonl");
    common::write_frames(&frames, 3);
    common::write_linear_annotations(&annotations, 3, 1.0, 0.0);

    let detector = ReplayDetector::load(&annotations, 0.5).unwrap();
    let url = start_server(Arc::new(SequenceOpener::new(&frames)), shared(detector)).await;
    let mut ws = connect(&url).await;
    next_json(&mut ws).await;

    send_action(&mut ws, "start").await;
    // 序列循环播放, 超过帧数仍持续推送
    for _ in 0..5 {
        let frame = next_frame(&mut ws).await;
        let bytes = STANDARD.decode(frame["data"].as_str().unwrap()).unwrap();
        let image = image::load_from_memory(&bytes).unwrap();
        assert_eq!((image.width(), image.height()), (32, 24));
    }

    send_action(&mut ws, "stop").await;
    assert_eq!(next_control(&mut ws).await["message"], "Camera streaming stopped");
}

#[tokio::test]
async fn test_missing_camera_reports_error() {
    let tmp = tempfile::tempdir().unwrap();
    let url = start_server(
        Arc::new(SequenceOpener::new(tmp.path().join("missing"))),
        shared(NullDetector),
    )
    .await;
    let mut ws = connect(&url).await;
    next_json(&mut ws).await;

    send_action(&mut ws, "start").await;
    let err = next_json(&mut ws).await;
    assert_eq!(err["type"], "error");
    assert!(err["message"].as_str().unwrap().contains("source unavailable"));

    // 仍为 Idle, 可以再次尝试
    send_action(&mut ws, "stop").await;
    assert_eq!(next_json(&mut ws).await["message"], "Camera streaming stopped");
}
