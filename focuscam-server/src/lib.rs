pub mod error;
pub mod http;
pub mod registry;
pub mod session;
pub mod startup;
pub mod websocket;

pub use error::{Result, ServerError};
pub use registry::{SessionInfo, SessionRegistry};
pub use session::{Action, Session, SessionId, SessionState};
pub use startup::{build_detector, RelayServer};
pub use websocket::RelayState;
