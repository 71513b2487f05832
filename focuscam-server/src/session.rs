// Per-connection session state machine

use focuscam_api::{FramePayload, InboundMessage, OutboundMessage};
use focuscam_eye::InFlight;
use serde::Serialize;
use std::fmt;
use std::time::SystemTime;
use tracing::debug;
use uuid::Uuid;

pub type SessionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Connecting,
    AwaitingStart,
    Ready,
    Streaming,
    Closing,
    Closed,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Connecting, AwaitingStart)
                | (AwaitingStart, Ready)
                | (Ready, Streaming)
                | (Streaming, Streaming)
                | (Connecting | AwaitingStart | Ready | Streaming, Closing)
                | (Closing, Closed)
        )
    }

    /// Whether inbound messages are still being read
    pub fn is_open(self) -> bool {
        matches!(
            self,
            SessionState::AwaitingStart | SessionState::Ready | SessionState::Streaming
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Connecting => "connecting",
            SessionState::AwaitingStart => "awaiting_start",
            SessionState::Ready => "ready",
            SessionState::Streaming => "streaming",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// What the connection loop must do with one inbound message
#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    Reply(OutboundMessage),
    Process(FramePayload),
    Ignore,
}

/// Server-side state of one connection.
///
/// Owned by the task driving the connection; nothing else mutates it.
pub struct Session {
    id: SessionId,
    state: SessionState,
    last_activity: SystemTime,
    frames: u64,
    in_flight: InFlight,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            state: SessionState::Connecting,
            last_activity: SystemTime::now(),
            frames: 0,
            in_flight: InFlight::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// When the last inbound message arrived
    pub fn last_activity(&self) -> SystemTime {
        self.last_activity
    }

    pub fn in_flight_mut(&mut self) -> &mut InFlight {
        &mut self.in_flight
    }

    fn transition(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal session transition {} -> {}",
            self.state,
            next
        );
        if self.state != next {
            debug!("session {} -> {}", self.state, next);
        }
        self.state = next;
    }

    /// Channel accepted
    pub fn accept(&mut self) {
        self.transition(SessionState::AwaitingStart);
    }

    /// Apply one inbound message and decide the response.
    ///
    /// Anything that is not the expected message for the current state is
    /// ignored, never an error.
    pub fn on_inbound(&mut self, message: InboundMessage) -> Action {
        self.last_activity = SystemTime::now();
        match (self.state, message) {
            (SessionState::AwaitingStart, InboundMessage::Start) => {
                self.transition(SessionState::Ready);
                Action::Reply(OutboundMessage::Ready)
            }
            (SessionState::Ready | SessionState::Streaming, InboundMessage::Frame { payload }) => {
                self.transition(SessionState::Streaming);
                self.frames += 1;
                Action::Process(payload)
            }
            (state, message) => {
                debug!("ignoring '{}' message in state {}", message.kind(), state);
                Action::Ignore
            }
        }
    }

    /// Transport closed, transport error, or protocol violation
    pub fn begin_close(&mut self) {
        if self.state.is_open() || self.state == SessionState::Connecting {
            self.transition(SessionState::Closing);
        }
    }

    /// Await any outstanding detection, then mark the session closed
    pub async fn finish(&mut self) {
        self.begin_close();
        self.in_flight.settle().await;
        if self.state == SessionState::Closing {
            self.transition(SessionState::Closed);
        }
    }
}
