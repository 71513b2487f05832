pub mod config;
pub mod error;

pub use config::{
    AnnotationConfig, CodecConfig, DetectionConfig, DispatcherConfig, LoggingConfig,
    NetworkConfig, RelayConfig, SessionConfig,
};
pub use error::{ConfigError, Result};
