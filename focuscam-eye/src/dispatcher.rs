//! Detection dispatcher: a bounded pool that keeps blocking inference off the
//! connection event loop.
//!
//! Each submission waits for a permit (FIFO, never rejected), then runs the
//! detector on tokio's blocking pool while holding that permit. The permit is
//! released by the blocking closure itself, so a slot is returned exactly when
//! the detector call returns, no matter what happened to the caller.

use crate::error::DetectError;
use crate::frame::Frame;
use crate::models::{Detection, Detector};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Whether the target class is in the frame, plus its boxes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionResult {
    pub present: bool,
    pub matches: Vec<Detection>,
}

impl DetectionResult {
    /// Keep only detections of `label` with at least `min_confidence`
    pub fn from_detections(detections: Vec<Detection>, label: &str, min_confidence: f32) -> Self {
        let matches: Vec<Detection> = detections
            .into_iter()
            .filter(|d| d.label == label && d.confidence >= min_confidence)
            .collect();
        Self {
            present: !matches.is_empty(),
            matches,
        }
    }
}

/// The frame handed back together with its detection result
pub type Detected = (Frame, DetectionResult);

#[derive(Debug, Clone)]
struct TargetFilter {
    label: String,
    min_confidence: f32,
}

pub struct DetectionDispatcher {
    detector: Arc<dyn Detector>,
    permits: Arc<Semaphore>,
    workers: usize,
    target: TargetFilter,
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl DetectionDispatcher {
    pub fn new(
        detector: Arc<dyn Detector>,
        workers: usize,
        target_label: impl Into<String>,
        min_confidence: f32,
    ) -> Self {
        let workers = workers.max(1);
        Self {
            detector,
            permits: Arc::new(Semaphore::new(workers)),
            workers,
            target: TargetFilter {
                label: target_label.into(),
                min_confidence,
            },
            in_flight: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(Notify::new()),
        }
    }

    /// Queue a frame for detection. Never blocks; await the ticket for the result.
    pub fn submit(&self, frame: Frame) -> DetectionTicket {
        let detector = self.detector.clone();
        let permits = self.permits.clone();
        let target = self.target.clone();
        let in_flight = self.in_flight.clone();
        let idle = self.idle.clone();

        in_flight.fetch_add(1, Ordering::SeqCst);
        let handle = tokio::spawn(async move {
            let result = run_detection(detector, permits, frame, target).await;
            if in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
                idle.notify_waiters();
            }
            result
        });

        DetectionTicket { handle }
    }

    /// Submit and wait
    pub async fn detect(&self, frame: Frame) -> Result<Detected, DetectError> {
        self.submit(frame).await
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Submissions not yet completed (queued or running)
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Stop admitting work. Queued submissions fail with `DispatcherClosed`;
    /// running detector calls finish normally.
    pub fn shutdown(&self) {
        self.permits.close();
    }

    pub fn is_shut_down(&self) -> bool {
        self.permits.is_closed()
    }

    /// Resolve once no submission is outstanding
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

async fn run_detection(
    detector: Arc<dyn Detector>,
    permits: Arc<Semaphore>,
    frame: Frame,
    target: TargetFilter,
) -> Result<Detected, DetectError> {
    let queued_at = Instant::now();
    let permit = permits
        .acquire_owned()
        .await
        .map_err(|_| DetectError::DispatcherClosed)?;
    let waited = queued_at.elapsed();

    let joined = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        let started = Instant::now();
        let result = detector.infer(&frame);
        (frame, result, started.elapsed())
    })
    .await;

    match joined {
        Ok((frame, Ok(detections), elapsed)) => {
            metrics::histogram!("focuscam_detection_seconds").record(elapsed.as_secs_f64());
            debug!(
                "detection finished in {:?} (queued {:?}), {} raw detections",
                elapsed,
                waited,
                detections.len()
            );
            let result =
                DetectionResult::from_detections(detections, &target.label, target.min_confidence);
            Ok((frame, result))
        }
        Ok((_, Err(e), _)) => Err(e),
        Err(join_error) => {
            error!("detector worker panicked: {}", join_error);
            Err(DetectError::Panicked(join_error.to_string()))
        }
    }
}

/// Handle to one submitted detection.
///
/// The work runs in its own task, so dropping or timing out on a ticket never
/// cancels the detector call or leaks its worker slot.
pub struct DetectionTicket {
    handle: JoinHandle<Result<Detected, DetectError>>,
}

impl DetectionTicket {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Future for DetectionTicket {
    type Output = Result<Detected, DetectError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx).map(|joined| match joined {
            Ok(result) => result,
            Err(join_error) => Err(DetectError::Panicked(join_error.to_string())),
        })
    }
}

/// A session's single outstanding-detection slot.
///
/// Holds a ticket whose result nobody wants any more (e.g. after a detection
/// timeout) until it has been awaited.
#[derive(Default)]
pub struct InFlight {
    ticket: Option<DetectionTicket>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ticket.is_none()
    }

    pub fn hold(&mut self, ticket: DetectionTicket) {
        debug_assert!(self.ticket.is_none(), "session already has a detection in flight");
        self.ticket = Some(ticket);
    }

    /// Await and discard the held detection, if any
    pub async fn settle(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            if let Err(e) = ticket.await {
                debug!("discarded detection ended with error: {}", e);
            }
        }
    }
}
