//! Detector adapter boundary and the models behind it

#[cfg(feature = "onnx")]
pub mod yolo;

#[cfg(feature = "onnx")]
pub use yolo::{YoloDetector, COCO_CLASSES};

use crate::error::DetectError;
use crate::frame::Frame;

/// Axis-aligned box in pixel coordinates of the source frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over union; 0.0 for disjoint or degenerate boxes
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - inter;
        if inter.is_nan() || union.is_nan() || inter <= 0.0 || union <= 0.0 {
            return 0.0;
        }
        inter / union
    }
}

/// One labeled detection
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Opaque object detector.
///
/// Calls are synchronous and may take hundreds of milliseconds; they are only
/// ever made from the dispatcher's blocking workers.
#[cfg_attr(test, mockall::automock)]
pub trait Detector: Send + Sync {
    fn infer(&self, frame: &Frame) -> Result<Vec<Detection>, DetectError>;
}

/// Installed when no model is configured: never detects anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDetector;

impl Detector for NullDetector {
    fn infer(&self, _frame: &Frame) -> Result<Vec<Detection>, DetectError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x1: f32, y1: f32, x2: f32, y2: f32) -> BoundingBox {
        BoundingBox { x1, y1, x2, y2 }
    }

    #[test]
    fn test_iou_identical() {
        let a = bbox(10.0, 10.0, 50.0, 50.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_disjoint() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let b = bbox(20.0, 20.0, 30.0, 30.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_iou_half_overlap() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let b = bbox(5.0, 0.0, 15.0, 10.0);
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_nan_is_zero() {
        let a = bbox(f32::NAN, 0.0, 10.0, 10.0);
        let b = bbox(0.0, 0.0, 10.0, 10.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_null_detector_finds_nothing() {
        let frame = Frame::from_raw(2, 2, vec![0; 12]).unwrap();
        assert!(NullDetector.infer(&frame).unwrap().is_empty());
    }
}
