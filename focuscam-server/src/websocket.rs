// Connection manager: one session-driving task per WebSocket

use crate::registry::SessionRegistry;
use crate::session::{Action, Session};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use focuscam_api::{InboundMessage, OutboundMessage};
use focuscam_eye::FramePipeline;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{FutureExt, SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Shared by every connection
#[derive(Clone)]
pub struct RelayState {
    pub pipeline: Arc<FramePipeline>,
    pub registry: Arc<SessionRegistry>,
    pub idle_timeout: Option<Duration>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl RelayState {
    pub fn new(pipeline: Arc<FramePipeline>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            pipeline,
            registry: Arc::new(SessionRegistry::new()),
            idle_timeout: None,
            shutdown: Arc::new(shutdown),
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Ask every open session to close once its current frame is answered
    pub fn close_sessions(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_closing_sessions(&self) -> bool {
        *self.shutdown.borrow()
    }
}

/// WebSocket upgrade handler. A failed upgrade never creates a session.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<RelayState>>,
) -> Response {
    ws.on_failed_upgrade(|e| warn!("WebSocket upgrade failed: {}", e))
        .on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drive one connection from accept to teardown
pub async fn handle_socket(socket: WebSocket, state: Arc<RelayState>) {
    let session = Session::new(Uuid::new_v4());
    let span = info_span!("session", id = %session.id());
    run_session(socket, state, session).instrument(span).await
}

enum Inbound {
    Message(InboundMessage),
    Skip,
    Closed,
}

async fn run_session(socket: WebSocket, state: Arc<RelayState>, mut session: Session) {
    session.accept();
    state.registry.register(&session);
    metrics::counter!("focuscam_sessions_opened_total").increment(1);
    info!("connection opened ({} active)", state.registry.count());

    let (mut sender, mut receiver) = socket.split();
    let mut shutdown = state.shutdown.subscribe();
    let mut pending: Option<Message> = None;

    loop {
        // A frame that timed out still owns a detection; finish it before reading on.
        session.in_flight_mut().settle().await;

        let next = match pending.take() {
            Some(message) => Some(Ok(message)),
            None => tokio::select! {
                next = read(&mut receiver, state.idle_timeout) => match next {
                    Some(next) => next,
                    None => break,
                },
                _ = shutdown.wait_for(|closing| *closing).map(|_| ()) => {
                    info!("server shutting down, closing session");
                    break;
                }
            },
        };

        let inbound = match next {
            Some(Ok(message)) => classify(message),
            Some(Err(e)) => {
                warn!("transport error: {}", e);
                Inbound::Closed
            }
            None => Inbound::Closed,
        };

        let message = match inbound {
            Inbound::Message(message) => message,
            Inbound::Skip => continue,
            Inbound::Closed => break,
        };

        let reply = match session.on_inbound(message) {
            Action::Reply(reply) => reply,
            Action::Process(payload) => {
                state.registry.update(&session);
                let reply = state.pipeline.process(session.in_flight_mut(), payload).await;
                // The peer may have left while the frame was being processed.
                if peer_gone(&mut receiver, &mut pending) {
                    debug!("dropping reply for a closed connection");
                    break;
                }
                reply
            }
            Action::Ignore => {
                metrics::counter!("focuscam_messages_ignored_total").increment(1);
                continue;
            }
        };
        state.registry.update(&session);

        if let Err(e) = send(&mut sender, &reply).await {
            debug!("client gone while sending: {}", e);
            break;
        }
    }

    session.begin_close();
    state.registry.update(&session);

    if let Err(e) = sender.close().await {
        debug!("close handshake not completed: {}", e);
    }
    drop(receiver);
    session.finish().await;

    state.registry.unregister(&session.id());
    metrics::counter!("focuscam_sessions_closed_total").increment(1);
    info!(
        "connection closed after {} frame(s) ({} active)",
        session.frames(),
        state.registry.count()
    );
}

type Receiver = SplitStream<WebSocket>;

/// Next transport event, or `None` once the idle limit passes
async fn read(
    receiver: &mut Receiver,
    idle_timeout: Option<Duration>,
) -> Option<Option<Result<Message, axum::Error>>> {
    match idle_timeout {
        Some(limit) => match tokio::time::timeout(limit, receiver.next()).await {
            Ok(next) => Some(next),
            Err(_) => {
                debug!("no message for {:?}, closing", limit);
                None
            }
        },
        None => Some(receiver.next().await),
    }
}

/// Drain what the peer already sent without waiting. The first data message
/// is parked in `pending` for the next loop turn; nothing past it is read.
fn peer_gone(receiver: &mut Receiver, pending: &mut Option<Message>) -> bool {
    while let Some(next) = receiver.next().now_or_never() {
        match next {
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(Message::Close(frame))) => {
                debug!("client closed mid-frame: {:?}", frame);
                return true;
            }
            Some(Ok(message)) => {
                *pending = Some(message);
                return false;
            }
            Some(Err(e)) => {
                warn!("transport error: {}", e);
                return true;
            }
            None => return true,
        }
    }
    false
}

fn classify(message: Message) -> Inbound {
    match message {
        Message::Text(text) => match InboundMessage::from_json(&text) {
            Ok(message) => Inbound::Message(message),
            Err(e) => {
                error!("protocol violation, closing: {}", e);
                Inbound::Closed
            }
        },
        Message::Binary(bytes) => Inbound::Message(InboundMessage::binary_frame(bytes)),
        Message::Ping(_) | Message::Pong(_) => Inbound::Skip,
        Message::Close(frame) => {
            debug!("client closed: {:?}", frame);
            Inbound::Closed
        }
    }
}

async fn send(
    sender: &mut SplitSink<WebSocket, Message>,
    reply: &OutboundMessage,
) -> Result<(), axum::Error> {
    let json = match reply.to_json() {
        Ok(json) => json,
        Err(e) => {
            error!("failed to serialize reply: {}", e);
            return Ok(());
        }
    };
    sender.send(Message::Text(json)).await
}
