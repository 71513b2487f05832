// Ordering, backpressure and worker-pool isolation across sessions

mod common;

use common::*;
use focuscam_eye::NullDetector;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_fifty_back_to_back_frames_arrive_in_order() {
    let (url, _state) = boot(test_config(), Arc::new(NullDetector)).await;
    let mut ws = connect(&url).await;
    handshake(&mut ws).await;

    // The client ignores backpressure and fires everything at once.
    for seq in 0..50 {
        send_json(&mut ws, frame_message(seq)).await;
    }

    for expected in 0..50 {
        let reply = read_json(&mut ws).await;
        assert_eq!(reply_seq(&reply), expected);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_one_detection_in_flight_per_session() {
    let detector = Arc::new(CountingDetector::new(Duration::from_millis(15)));
    let mut config = test_config();
    config.dispatcher.workers = 4;
    let (url, _state) = boot(config, detector.clone()).await;
    let mut ws = connect(&url).await;
    handshake(&mut ws).await;

    for seq in 0..10 {
        send_json(&mut ws, frame_message(seq)).await;
    }
    for expected in 0..10 {
        assert_eq!(reply_seq(&read_json(&mut ws).await), expected);
    }

    // Four idle workers, yet a single session never overlaps its own detections.
    assert_eq!(detector.calls(), 10);
    assert_eq!(detector.peak(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pool_bounds_concurrency_across_sessions() {
    let detector = Arc::new(CountingDetector::new(Duration::from_millis(20)));
    let mut config = test_config();
    config.dispatcher.workers = 2;
    let (url, state) = boot(config, detector.clone()).await;

    let mut clients = Vec::new();
    for _ in 0..4 {
        let url = url.clone();
        clients.push(tokio::spawn(async move {
            let mut ws = connect(&url).await;
            handshake(&mut ws).await;
            for seq in 0..5 {
                send_json(&mut ws, frame_message(seq)).await;
            }
            for expected in 0..5 {
                assert_eq!(reply_seq(&read_json(&mut ws).await), expected);
            }
        }));
    }
    for client in clients {
        client.await.unwrap();
    }

    // Saturation queues rather than rejects: every frame was processed.
    assert_eq!(detector.calls(), 20);
    assert!(detector.peak() <= 2);
    assert_eq!(state.pipeline.dispatcher().in_flight(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_slow_inference_does_not_stall_other_sessions() {
    let detector = Arc::new(CountingDetector::new(Duration::from_millis(400)));
    let mut config = test_config();
    config.dispatcher.workers = 1;
    let (url, _state) = boot(config, detector).await;

    let mut busy = connect(&url).await;
    handshake(&mut busy).await;
    send_json(&mut busy, frame_message(1)).await;

    // While the only worker is busy, another session still gets its handshake promptly.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let started = Instant::now();
    let mut other = connect(&url).await;
    send_json(&mut other, json!({"type": "start"})).await;
    assert_eq!(read_json(&mut other).await, json!({"type": "ready"}));
    assert!(started.elapsed() < Duration::from_millis(300));

    assert_eq!(reply_seq(&read_json(&mut busy).await), 1);
}
