use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::models::Message;
use super::session::{ChatSession, SubmitError};

const EVENT_CAPACITY: usize = 64;

/// Idle sessions older than this are dropped on the next new session.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_MAX_SESSIONS: usize = 1024;

/// What the page needs to render a chat.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub transcript: Vec<Message>,
    pub pending: bool,
}

struct StoredSession {
    session: ChatSession,
    touched: Instant,
}

/// Chat sessions keyed by the id the browser generates on page load,
/// so a reload starts a fresh transcript. Nothing is persisted.
///
/// A reload leaves the old session behind, so idle sessions expire
/// after `ttl` and the oldest idle one makes room once `max_sessions`
/// is reached. A session waiting on a reply is never dropped.
///
/// Every state transition publishes a snapshot so subscribers can
/// re-render.
pub struct SessionStore {
    sessions: HashMap<String, StoredSession>,
    events: broadcast::Sender<SessionSnapshot>,
    ttl: Duration,
    max_sessions: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_TTL)
    }

    pub fn with_limits(max_sessions: usize, ttl: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            sessions: HashMap::new(),
            events,
            ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    pub fn get(&self, session_id: &str) -> Option<&ChatSession> {
        self.sessions.get(session_id).map(|stored| &stored.session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn snapshot(&self, session_id: &str) -> Option<SessionSnapshot> {
        self.get(session_id)
            .map(|session| Self::snapshot_of(session_id, session))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionSnapshot> {
        self.events.subscribe()
    }

    /// Submit a question to a session, creating the session on first
    /// use. Returns the trimmed question to send to the gateway along
    /// with the session as it is now.
    pub fn submit(
        &mut self,
        session_id: &str,
        text: &str,
    ) -> Result<(String, SessionSnapshot), SubmitError> {
        let now = Instant::now();
        let (question, snapshot) = match self.sessions.get_mut(session_id) {
            Some(stored) => {
                let question = stored.session.submit_text(text)?;
                stored.touched = now;
                (question, Self::snapshot_of(session_id, &stored.session))
            }
            None => {
                // Only keep the session once something was submitted
                let mut session = ChatSession::new();
                let question = session.submit_text(text)?;
                self.make_room(now)?;
                let snapshot = Self::snapshot_of(session_id, &session);
                self.sessions.insert(
                    session_id.to_string(),
                    StoredSession {
                        session,
                        touched: now,
                    },
                );
                (question, snapshot)
            }
        };
        self.publish(&snapshot);
        Ok((question, snapshot))
    }

    /// Apply the gateway's reply to a session. Returns `None` when the
    /// session is unknown or wasn't waiting for a reply.
    pub fn resolve(&mut self, session_id: &str, reply: &str) -> Option<SessionSnapshot> {
        let stored = self.sessions.get_mut(session_id)?;
        if !stored.session.resolve(reply) {
            return None;
        }
        stored.touched = Instant::now();
        let snapshot = Self::snapshot_of(session_id, &stored.session);
        self.publish(&snapshot);
        Some(snapshot)
    }

    /// Drop expired idle sessions, then the oldest idle one if the
    /// store is still full.
    fn make_room(&mut self, now: Instant) -> Result<(), SubmitError> {
        let ttl = self.ttl;
        let before = self.sessions.len();
        self.sessions.retain(|_, stored| {
            stored.session.is_pending() || now.duration_since(stored.touched) < ttl
        });
        let expired = before - self.sessions.len();
        if expired > 0 {
            tracing::debug!("Dropped {} idle chat sessions", expired);
        }

        if self.sessions.len() < self.max_sessions {
            return Ok(());
        }

        let oldest = self
            .sessions
            .iter()
            .filter(|(_, stored)| !stored.session.is_pending())
            .min_by_key(|(_, stored)| stored.touched)
            .map(|(id, _)| id.clone());

        match oldest {
            Some(id) => {
                tracing::debug!("Chat session limit reached, dropping {}", id);
                self.sessions.remove(&id);
                Ok(())
            }
            None => {
                tracing::warn!(
                    "All {} chat sessions are waiting for a reply",
                    self.sessions.len()
                );
                Err(SubmitError::Busy)
            }
        }
    }

    fn publish(&self, snapshot: &SessionSnapshot) {
        // No subscribers is fine, the page may not be listening
        let _ = self.events.send(snapshot.clone());
    }

    fn snapshot_of(session_id: &str, session: &ChatSession) -> SessionSnapshot {
        SessionSnapshot {
            session_id: session_id.to_string(),
            transcript: session.transcript().messages().to_vec(),
            pending: session.is_pending(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_creates_session() {
        let mut store = SessionStore::new();
        assert!(store.is_empty());
        assert!(store.snapshot("abc").is_none());

        let (question, snapshot) = store.submit("abc", " Hola ").unwrap();

        assert_eq!(question, "Hola");
        assert_eq!(store.len(), 1);
        assert_eq!(
            snapshot,
            SessionSnapshot {
                session_id: String::from("abc"),
                transcript: vec![Message::user("Hola")],
                pending: true,
            }
        );
    }

    #[test]
    fn test_sessions_are_independent() {
        let mut store = SessionStore::new();
        store.submit("a", "uno").unwrap();

        // Another tab isn't blocked by the first one's pending reply
        assert!(store.submit("b", "dos").is_ok());
        assert_eq!(store.submit("a", "tres"), Err(SubmitError::Pending));

        store.resolve("a", "respuesta").unwrap();
        assert_eq!(store.snapshot("a").unwrap().transcript.len(), 2);
        assert_eq!(store.snapshot("b").unwrap().transcript.len(), 1);
    }

    #[test]
    fn test_resolve_unknown_or_idle_session() {
        let mut store = SessionStore::new();
        assert!(store.resolve("missing", "hola").is_none());

        store.submit("a", "uno").unwrap();
        store.resolve("a", "dos").unwrap();
        assert!(store.resolve("a", "tres").is_none());
        assert_eq!(store.snapshot("a").unwrap().transcript.len(), 2);
    }

    #[test]
    fn test_rejected_submit_publishes_nothing() {
        let mut store = SessionStore::new();
        let mut rx = store.subscribe();

        assert_eq!(store.submit("a", "   "), Err(SubmitError::Empty));
        assert!(rx.try_recv().is_err());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_every_transition_is_published() {
        let mut store = SessionStore::new();
        let mut rx = store.subscribe();

        store.submit("a", "Hola").unwrap();
        store.resolve("a", "¡Hola!").unwrap();

        let first = rx.recv().await.unwrap();
        assert!(first.pending);
        assert_eq!(first.transcript, vec![Message::user("Hola")]);

        let second = rx.recv().await.unwrap();
        assert!(!second.pending);
        assert_eq!(
            second.transcript,
            vec![Message::user("Hola"), Message::model("¡Hola!")]
        );
    }

    #[test]
    fn test_idle_sessions_expire() {
        let mut store = SessionStore::with_limits(10, Duration::ZERO);

        store.submit("reloaded", "uno").unwrap();
        store.resolve("reloaded", "dos").unwrap();
        store.submit("waiting", "tres").unwrap();
        store.submit("fresh", "cuatro").unwrap();

        // The idle one is gone, the one waiting on a reply stays
        assert!(store.snapshot("reloaded").is_none());
        assert!(store.snapshot("waiting").unwrap().pending);
        assert!(store.snapshot("fresh").is_some());

        // Its reply still lands
        assert!(store.resolve("waiting", "cinco").is_some());
    }

    #[test]
    fn test_full_store_drops_oldest_idle_session() {
        let mut store = SessionStore::with_limits(2, DEFAULT_SESSION_TTL);

        store.submit("a", "uno").unwrap();
        store.resolve("a", "respuesta").unwrap();
        store.submit("b", "dos").unwrap();
        store.resolve("b", "respuesta").unwrap();

        store.submit("c", "tres").unwrap();

        assert_eq!(store.len(), 2);
        assert!(store.snapshot("a").is_none());
        assert!(store.snapshot("b").is_some());
        assert!(store.snapshot("c").is_some());

        // Existing sessions keep working at capacity
        assert!(store.submit("b", "cuatro").is_ok());
    }

    #[test]
    fn test_full_store_of_pending_sessions_is_busy() {
        let mut store = SessionStore::with_limits(1, DEFAULT_SESSION_TTL);
        store.submit("a", "uno").unwrap();

        assert_eq!(store.submit("b", "dos"), Err(SubmitError::Busy));
        assert!(store.snapshot("b").is_none());
        assert!(store.snapshot("a").unwrap().pending);

        store.resolve("a", "respuesta").unwrap();
        assert!(store.submit("b", "dos").is_ok());
        assert!(store.snapshot("a").is_none());
    }
}
