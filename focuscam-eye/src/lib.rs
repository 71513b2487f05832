//! focuscam-eye: the per-frame vision path of the camera relay
//!
//! decode -> detect (off the event loop) -> annotate -> encode.
//! The detector and codec are consumed through the `Detector` and
//! `FrameCodec` traits; everything else here is plumbing around them.

pub mod annotation;
pub mod codec;
pub mod dispatcher;
pub mod error;
pub mod frame;
pub mod models;
pub mod pipeline;

pub use annotation::Annotator;
pub use codec::{FrameCodec, JpegCodec};
pub use dispatcher::{DetectionDispatcher, DetectionResult, DetectionTicket, InFlight};
pub use error::{CodecError, DetectError, VisionError};
pub use frame::Frame;
pub use models::{BoundingBox, Detection, Detector, NullDetector};
pub use pipeline::FramePipeline;
