//! Per-frame processing: payload -> decode -> detect -> annotate -> encode -> reply

use crate::annotation::Annotator;
use crate::codec::{FrameCodec, JpegCodec};
use crate::dispatcher::{DetectionDispatcher, Detected, InFlight};
use crate::error::{CodecError, DetectError, VisionError};
use crate::frame::Frame;
use crate::models::Detector;
use focuscam_api::{FramePayload, OutboundMessage};
use focuscam_core::RelayConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Shared by every session. Holds no per-session state; the caller owns the
/// session's `InFlight` slot and passes it in.
pub struct FramePipeline {
    codec: Arc<dyn FrameCodec>,
    dispatcher: Arc<DetectionDispatcher>,
    annotator: Annotator,
    max_frame_bytes: Option<usize>,
    detection_timeout: Option<Duration>,
}

impl FramePipeline {
    pub fn new(
        codec: Arc<dyn FrameCodec>,
        dispatcher: Arc<DetectionDispatcher>,
        annotator: Annotator,
    ) -> Self {
        Self {
            codec,
            dispatcher,
            annotator,
            max_frame_bytes: None,
            detection_timeout: None,
        }
    }

    /// Build the JPEG pipeline and its dispatcher from configuration
    pub fn from_config(config: &RelayConfig, detector: Arc<dyn Detector>) -> Self {
        let dispatcher = DetectionDispatcher::new(
            detector,
            config.dispatcher.workers,
            config.detection.target_label.clone(),
            config.detection.min_confidence,
        );
        Self::new(
            Arc::new(JpegCodec::new(config.codec.jpeg_quality)),
            Arc::new(dispatcher),
            Annotator::new(&config.annotation),
        )
        .with_max_frame_bytes(config.codec.max_frame_bytes)
        .with_detection_timeout(config.dispatcher.detection_timeout_ms.map(Duration::from_millis))
    }

    pub fn with_max_frame_bytes(mut self, limit: Option<usize>) -> Self {
        self.max_frame_bytes = limit;
        self
    }

    pub fn with_detection_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.detection_timeout = timeout;
        self
    }

    pub fn dispatcher(&self) -> &Arc<DetectionDispatcher> {
        &self.dispatcher
    }

    /// Process one inbound frame into exactly one reply.
    ///
    /// Failures never escape: they come back as an `error` message and the
    /// session carries on with the next frame.
    pub async fn process(&self, in_flight: &mut InFlight, payload: FramePayload) -> OutboundMessage {
        let started = Instant::now();
        let outcome = self.run(in_flight, payload).await;
        metrics::histogram!("focuscam_frame_seconds").record(started.elapsed().as_secs_f64());

        match outcome {
            Ok(encoded) => {
                metrics::counter!("focuscam_frames_total", "outcome" => "ok").increment(1);
                debug!("frame processed in {:?}", started.elapsed());
                OutboundMessage::frame(&encoded)
            }
            Err(e) => {
                metrics::counter!("focuscam_frames_total", "outcome" => outcome_label(&e))
                    .increment(1);
                warn!("frame dropped: {}", e);
                OutboundMessage::error(e.to_string())
            }
        }
    }

    async fn run(&self, in_flight: &mut InFlight, payload: FramePayload) -> Result<Vec<u8>, VisionError> {
        if let Some(limit) = self.max_frame_bytes {
            let size = payload.wire_len();
            if size > limit {
                return Err(VisionError::FrameTooLarge { size, limit });
            }
        }

        let bytes = payload.into_bytes()?;
        let frame = self.codec.decode(&bytes)?;

        // One outstanding detection per session: finish any abandoned one first.
        in_flight.settle().await;
        let (frame, result) = self.detect(in_flight, frame).await?;

        let annotated = self.annotator.annotate(frame, &result);
        Ok(self.codec.encode(&annotated)?)
    }

    async fn detect(&self, in_flight: &mut InFlight, frame: Frame) -> Result<Detected, DetectError> {
        let mut ticket = self.dispatcher.submit(frame);
        let Some(limit) = self.detection_timeout else {
            return ticket.await;
        };

        match tokio::time::timeout(limit, &mut ticket).await {
            Ok(result) => result,
            Err(_) => {
                in_flight.hold(ticket);
                Err(DetectError::TimedOut(limit))
            }
        }
    }
}

fn outcome_label(error: &VisionError) -> &'static str {
    match error {
        VisionError::Payload(_) => "bad_payload",
        VisionError::FrameTooLarge { .. } => "too_large",
        VisionError::Codec(CodecError::Decode(_)) => "decode_error",
        VisionError::Codec(CodecError::Encode(_)) => "encode_error",
        VisionError::Detection(DetectError::TimedOut(_)) => "detect_timeout",
        VisionError::Detection(_) => "detect_error",
    }
}
