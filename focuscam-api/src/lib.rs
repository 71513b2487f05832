//! Wire protocol spoken on the camera relay socket.

pub mod payload;
pub mod websocket;

pub use payload::{decode_payload, encode_payload, PayloadError};
pub use websocket::{FramePayload, InboundMessage, OutboundMessage, ProtocolError};
