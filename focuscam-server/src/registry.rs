// Session registry
// Bookkeeping of live sessions for health reporting; never on the frame path

use crate::session::{Session, SessionId, SessionState};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub state: SessionState,
    pub frames: u64,
    pub opened_at: u64,
    pub last_activity: u64,
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionInfo>>,
    closed: AtomicU64,
    drained: Notify,
}

fn epoch_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, session: &Session) {
        let info = SessionInfo {
            id: session.id(),
            state: session.state(),
            frames: session.frames(),
            opened_at: epoch_secs(SystemTime::now()),
            last_activity: epoch_secs(session.last_activity()),
        };
        self.sessions.write().insert(session.id(), info);
    }

    pub fn update(&self, session: &Session) {
        if let Some(info) = self.sessions.write().get_mut(&session.id()) {
            info.state = session.state();
            info.frames = session.frames();
            info.last_activity = epoch_secs(session.last_activity());
        }
    }

    /// Drop a session that reached `Closed`
    pub fn unregister(&self, id: &SessionId) {
        if self.sessions.write().remove(id).is_some() {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
        if self.count() == 0 {
            self.drained.notify_waiters();
        }
    }

    /// Resolves once every registered session has been unregistered
    pub async fn wait_empty(&self) {
        loop {
            let drained = self.drained.notified();
            if self.count() == 0 {
                return;
            }
            drained.await;
        }
    }

    /// Live sessions
    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Sessions that have been torn down since startup
    pub fn closed_total(&self) -> u64 {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self, id: &SessionId) -> Option<SessionInfo> {
        self.sessions.read().get(id).cloned()
    }

    pub fn list(&self) -> Vec<SessionInfo> {
        self.sessions.read().values().cloned().collect()
    }
}
