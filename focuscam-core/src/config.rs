// Layered configuration for the FocusCam relay
// defaults -> file (JSON / TOML / YAML) -> FOCUSCAM_* environment -> CLI

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Listener and HTTP surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub bind_address: String,
    pub port: u16,
    /// Route the streaming WebSocket is mounted on
    pub ws_path: String,
    /// Allow-all CORS layer on every route
    pub cors_permissive: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8000,
            ws_path: "/ws".to_string(),
            cors_permissive: true,
        }
    }
}

/// Detection worker pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Maximum detector calls running at once across all sessions
    pub workers: usize,
    /// Per-frame detection deadline. `None` waits indefinitely.
    pub detection_timeout_ms: Option<u64>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: (num_cpus::get() * 2).max(1),
            detection_timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// ONNX model file. Without one, frames are relayed un-annotated.
    pub model_path: Option<PathBuf>,
    pub target_label: String,
    pub min_confidence: f32,
    pub iou_threshold: f32,
    /// Square model input edge in pixels
    pub input_size: u32,
    /// Independent inference sessions loaded from the same model
    pub model_sessions: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            target_label: "cell phone".to_string(),
            min_confidence: 0.25,
            iou_threshold: 0.45,
            input_size: 640,
            model_sessions: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    pub marker_text: String,
    /// Top-left corner of the marker text (x, y)
    pub marker_origin: (u32, u32),
    /// Pixel scale applied to the 5x7 glyphs
    pub marker_scale: u32,
    pub marker_color: [u8; 3],
    /// Outline the boxes of matching detections as well
    pub draw_boxes: bool,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            marker_text: "PHONE DETECTED".to_string(),
            marker_origin: (30, 50),
            marker_scale: 3,
            marker_color: [255, 0, 0],
            draw_boxes: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    pub jpeg_quality: u8,
    /// Largest accepted encoded frame. `None` accepts any size.
    pub max_frame_bytes: Option<usize>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: 80,
            max_frame_bytes: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Close a session after this long without an inbound message
    pub idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete relay configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub network: NetworkConfig,
    pub dispatcher: DispatcherConfig,
    pub detection: DetectionConfig,
    pub annotation: AnnotationConfig,
    pub codec: CodecConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

impl RelayConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::Io(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_str(&content)
    }

    /// Parse configuration, trying JSON, then TOML, then YAML
    pub fn from_str(content: &str) -> Result<Self> {
        let json = match serde_json::from_str::<RelayConfig>(content) {
            Ok(config) => return Ok(config),
            Err(e) => e,
        };
        let toml = match toml::from_str::<RelayConfig>(content) {
            Ok(config) => return Ok(config),
            Err(e) => e,
        };
        serde_yaml::from_str::<RelayConfig>(content).map_err(|yaml| {
            ConfigError::Parse(format!(
                "not valid JSON ({}), TOML ({}) or YAML ({})",
                json,
                toml.to_string().trim(),
                yaml
            ))
        })
    }

    /// Apply `FOCUSCAM_*` overrides from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(std::env::vars())
    }

    /// Apply `FOCUSCAM_*` overrides from an explicit set of variables
    pub fn apply_env_from<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            let value: String = value.into();
            match key.as_ref() {
                "FOCUSCAM_HOST" => self.network.bind_address = value,
                "FOCUSCAM_PORT" => {
                    self.network.port = value.parse().map_err(|_| {
                        ConfigError::Parse(format!("FOCUSCAM_PORT is not a port: {}", value))
                    })?;
                }
                "FOCUSCAM_MODEL" => self.detection.model_path = Some(PathBuf::from(value)),
                "FOCUSCAM_WORKERS" => {
                    self.dispatcher.workers = value.parse().map_err(|_| {
                        ConfigError::Parse(format!("FOCUSCAM_WORKERS is not a number: {}", value))
                    })?;
                }
                "FOCUSCAM_TARGET" => self.detection.target_label = value,
                "FOCUSCAM_LOG_LEVEL" => self.logging.level = value,
                _ => {}
            }
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !self.network.ws_path.starts_with('/') {
            return Err(invalid("network.ws_path must start with '/'"));
        }
        if self.dispatcher.workers == 0 {
            return Err(invalid("dispatcher.workers must be > 0"));
        }
        if self.dispatcher.detection_timeout_ms == Some(0) {
            return Err(invalid("dispatcher.detection_timeout_ms must be > 0 when set"));
        }
        if self.detection.target_label.trim().is_empty() {
            return Err(invalid("detection.target_label cannot be empty"));
        }
        if !(0.0..=1.0).contains(&self.detection.min_confidence) {
            return Err(invalid("detection.min_confidence must be within 0..=1"));
        }
        if !(0.0..=1.0).contains(&self.detection.iou_threshold) {
            return Err(invalid("detection.iou_threshold must be within 0..=1"));
        }
        if self.detection.input_size == 0 {
            return Err(invalid("detection.input_size must be > 0"));
        }
        if self.detection.model_sessions == 0 {
            return Err(invalid("detection.model_sessions must be > 0"));
        }
        if self.annotation.marker_scale == 0 {
            return Err(invalid("annotation.marker_scale must be > 0"));
        }
        if !(1..=100).contains(&self.codec.jpeg_quality) {
            return Err(invalid("codec.jpeg_quality must be within 1..=100"));
        }
        if self.codec.max_frame_bytes == Some(0) {
            return Err(invalid("codec.max_frame_bytes must be > 0 when set"));
        }
        if self.session.idle_timeout_secs == Some(0) {
            return Err(invalid("session.idle_timeout_secs must be > 0 when set"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::Validation(msg.to_string())
}
