// Server assembly: detector selection, router, listener, graceful shutdown

use crate::error::{Result, ServerError};
use crate::http::create_router;
use crate::websocket::RelayState;
use axum::Router;
use focuscam_core::RelayConfig;
use focuscam_eye::{Detector, FramePipeline, NullDetector};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Load the configured model once for the whole process.
///
/// Without a model path (or without the `onnx` feature) a `NullDetector` is
/// installed and frames are relayed un-annotated.
pub fn build_detector(config: &RelayConfig) -> Result<Arc<dyn Detector>> {
    match &config.detection.model_path {
        #[cfg(feature = "onnx")]
        Some(path) => {
            let detector = focuscam_eye::models::YoloDetector::load(path, &config.detection)?;
            Ok(Arc::new(detector))
        }
        #[cfg(not(feature = "onnx"))]
        Some(path) => {
            warn!(
                "built without the onnx feature, ignoring model {:?}; frames will not be annotated",
                path
            );
            Ok(Arc::new(NullDetector))
        }
        None => {
            warn!("no detection model configured; frames will not be annotated");
            Ok(Arc::new(NullDetector))
        }
    }
}

pub struct RelayServer {
    config: RelayConfig,
    state: Arc<RelayState>,
}

impl RelayServer {
    pub fn new(config: RelayConfig, detector: Arc<dyn Detector>) -> Self {
        let pipeline = FramePipeline::from_config(&config, detector);
        Self::with_pipeline(config, pipeline)
    }

    pub fn with_pipeline(config: RelayConfig, pipeline: FramePipeline) -> Self {
        let idle_timeout = config.session.idle_timeout_secs.map(Duration::from_secs);
        let state = RelayState::new(Arc::new(pipeline)).with_idle_timeout(idle_timeout);
        Self {
            config,
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> &Arc<RelayState> {
        &self.state
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone(), &self.config.network)
    }

    pub async fn bind(&self) -> Result<TcpListener> {
        let host = self.config.network.bind_address.as_str();
        let port = self.config.network.port;
        TcpListener::bind((host, port))
            .await
            .map_err(|source| ServerError::Bind {
                addr: format!("{}:{}", host, port),
                source,
            })
    }

    /// Serve until `shutdown` resolves, then drain the detection pool
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local = listener.local_addr()?;
        info!(
            "🌐 Relay listening on http://{} (WebSocket at {}, {} detection workers)",
            local,
            self.config.network.ws_path,
            self.state.pipeline.dispatcher().workers()
        );

        let state = self.state.clone();
        let stop = async move {
            shutdown.await;
            state.close_sessions();
        };
        axum::serve(listener, self.router())
            .with_graceful_shutdown(stop)
            .await?;

        // Upgraded connections outlive the HTTP server; let each session close itself.
        info!("🔄 Closing {} open session(s)...", self.state.registry.count());
        self.state.registry.wait_empty().await;

        info!("🔄 Draining detection workers...");
        let dispatcher = self.state.pipeline.dispatcher();
        dispatcher.shutdown();
        dispatcher.wait_idle().await;
        info!("✅ Relay stopped");
        Ok(())
    }
}
