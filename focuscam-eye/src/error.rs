//! Error types for focuscam-eye

use focuscam_api::PayloadError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("failed to encode image: {0}")]
    Encode(String),
}

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("inference failed: {0}")]
    Inference(String),

    #[error("detector panicked: {0}")]
    Panicked(String),

    #[error("detection dispatcher is shut down")]
    DispatcherClosed,

    #[error("detection timed out after {0:?}")]
    TimedOut(Duration),

    #[error("model error: {0}")]
    Model(String),
}

/// Everything that can go wrong with a single frame. None of these end the session.
#[derive(Error, Debug)]
pub enum VisionError {
    #[error("invalid frame payload: {0}")]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("detection failed: {0}")]
    Detection(#[from] DetectError),

    #[error("frame too large: {size} bytes (limit {limit})")]
    FrameTooLarge { size: usize, limit: usize },
}
