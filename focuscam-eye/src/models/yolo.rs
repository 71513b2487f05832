//! YOLOv8 object detection over ONNX Runtime

use super::{BoundingBox, Detection, Detector};
use crate::error::DetectError;
use crate::frame::Frame;
use focuscam_core::DetectionConfig;
use image::imageops::{self, FilterType};
use ort::session::Session;
use ort::value::Tensor;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

/// COCO class names (80 classes)
pub const COCO_CLASSES: &[&str] = &[
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat",
    "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack",
    "umbrella", "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball",
    "kite", "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket",
    "bottle", "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple",
    "sandwich", "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair",
    "couch", "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse",
    "remote", "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator",
    "book", "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

/// YOLOv8 detector.
///
/// `Session::run` needs exclusive access, so each loaded session sits behind
/// its own mutex and calls are spread round-robin across them.
pub struct YoloDetector {
    sessions: Vec<Mutex<Session>>,
    next: AtomicUsize,
    input_name: String,
    output_name: String,
    input_size: u32,
    confidence_threshold: f32,
    iou_threshold: f32,
}

impl YoloDetector {
    /// Load `config.model_sessions` sessions from an ONNX file
    pub fn load(model_path: &Path, config: &DetectionConfig) -> Result<Self, DetectError> {
        let count = config.model_sessions.max(1);
        let mut sessions = Vec::with_capacity(count);
        for _ in 0..count {
            let session = Session::builder()
                .and_then(|builder| builder.commit_from_file(model_path))
                .map_err(|e| {
                    DetectError::Model(format!(
                        "failed to load YOLO model {}: {}",
                        model_path.display(),
                        e
                    ))
                })?;
            sessions.push(session);
        }

        let first = &sessions[0];
        let input_name = first
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| DetectError::Model("model declares no inputs".to_string()))?;
        let output_name = first
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| DetectError::Model("model declares no outputs".to_string()))?;

        info!(
            "YOLO model loaded from {:?} ({} session(s), input '{}', output '{}')",
            model_path, count, input_name, output_name
        );

        Ok(Self {
            sessions: sessions.into_iter().map(Mutex::new).collect(),
            next: AtomicUsize::new(0),
            input_name,
            output_name,
            input_size: config.input_size,
            confidence_threshold: config.min_confidence,
            iou_threshold: config.iou_threshold,
        })
    }

    /// Resize to the model input and lay out as a [1, 3, S, S] tensor in 0..1
    fn preprocess(&self, frame: &Frame) -> Result<ort::value::DynValue, DetectError> {
        let size = self.input_size;
        let resized = imageops::resize(frame.pixels(), size, size, FilterType::Triangle);

        let plane = (size * size) as usize;
        let mut data = vec![0f32; 3 * plane];
        for (idx, px) in resized.pixels().enumerate() {
            data[idx] = px[0] as f32 / 255.0;
            data[plane + idx] = px[1] as f32 / 255.0;
            data[2 * plane + idx] = px[2] as f32 / 255.0;
        }

        let shape = [1usize, 3, size as usize, size as usize];
        Tensor::from_array((shape, data.into_boxed_slice()))
            .map(|tensor| tensor.into_dyn())
            .map_err(|e| DetectError::Inference(format!("failed to build input tensor: {}", e)))
    }
}

impl Detector for YoloDetector {
    fn infer(&self, frame: &Frame) -> Result<Vec<Detection>, DetectError> {
        let input = self.preprocess(frame)?;

        let slot = self.next.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        let mut session = self.sessions[slot].lock();
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(|e| DetectError::Inference(format!("YOLO inference failed: {}", e)))?;

        let (shape, data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectError::Inference(format!("failed to read YOLO output: {}", e)))?;
        let dims: Vec<i64> = shape.iter().copied().collect();

        let scale = (
            frame.width() as f32 / self.input_size as f32,
            frame.height() as f32 / self.input_size as f32,
        );
        let detections = decode_output(
            &dims,
            data,
            scale,
            self.confidence_threshold,
            self.iou_threshold,
        )?;
        debug!("YOLO produced {} detections", detections.len());
        Ok(detections)
    }
}

/// Decode a YOLOv8 head of shape [1, 4 + classes, proposals].
///
/// Rows 0..4 hold cx, cy, w, h in model-input pixels; the remaining rows hold
/// per-class scores. Boxes are scaled back to the source frame and reduced
/// with per-class NMS.
fn decode_output(
    dims: &[i64],
    data: &[f32],
    scale: (f32, f32),
    confidence_threshold: f32,
    iou_threshold: f32,
) -> Result<Vec<Detection>, DetectError> {
    if dims.len() != 3 || dims[0] != 1 || dims[1] <= 4 || dims[2] <= 0 {
        return Err(DetectError::Inference(format!(
            "unexpected YOLO output shape {:?}",
            dims
        )));
    }
    let rows = dims[1] as usize;
    let proposals = dims[2] as usize;
    if data.len() < rows * proposals {
        return Err(DetectError::Inference(format!(
            "YOLO output has {} values, expected {}",
            data.len(),
            rows * proposals
        )));
    }
    let classes = rows - 4;

    let mut candidates: Vec<(usize, Detection)> = Vec::new();
    for i in 0..proposals {
        let mut best_class = 0;
        let mut best_score = f32::MIN;
        for class in 0..classes {
            let score = data[(4 + class) * proposals + i];
            if score > best_score {
                best_score = score;
                best_class = class;
            }
        }
        if best_score < confidence_threshold {
            continue;
        }

        let cx = data[i];
        let cy = data[proposals + i];
        let w = data[2 * proposals + i];
        let h = data[3 * proposals + i];
        let bbox = BoundingBox {
            x1: (cx - w / 2.0) * scale.0,
            y1: (cy - h / 2.0) * scale.1,
            x2: (cx + w / 2.0) * scale.0,
            y2: (cy + h / 2.0) * scale.1,
        };
        let label = COCO_CLASSES
            .get(best_class)
            .map(|name| name.to_string())
            .unwrap_or_else(|| format!("class_{}", best_class));

        candidates.push((
            best_class,
            Detection {
                label,
                confidence: best_score,
                bbox,
            },
        ));
    }

    Ok(non_max_suppression(candidates, iou_threshold))
}

fn non_max_suppression(
    mut candidates: Vec<(usize, Detection)>,
    iou_threshold: f32,
) -> Vec<Detection> {
    candidates.sort_by(|a, b| b.1.confidence.total_cmp(&a.1.confidence));

    let mut kept: Vec<(usize, Detection)> = Vec::new();
    for (class, detection) in candidates {
        let suppressed = kept.iter().any(|(kept_class, kept_detection)| {
            *kept_class == class && kept_detection.bbox.iou(&detection.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push((class, detection));
        }
    }
    kept.into_iter().map(|(_, detection)| detection).collect()
}
