//! Per-user session state.
//!
//! Everything that must survive between two page renders of the same user
//! lives in a [`Session`]: the chat transcript and the upload form's sticky
//! submitted flag. Sessions are kept in a [`SessionStore`] keyed by a random
//! id carried in a cookie. A session is created on first use and cleared by
//! [`SessionStore::end`]; sessions never share state.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::models::Message;
use crate::upload::UploadForm;

pub type SessionId = Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    transcript: Vec<Message>,
    pub upload: UploadForm,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages in append order.
    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn push(&mut self, message: Message) {
        self.transcript.push(message);
    }

    /// Append a prompt and its answer, user first.
    pub fn record_exchange(&mut self, prompt: &str, answer: &str) {
        self.push(Message::user(prompt));
        self.push(Message::assistant(answer));
    }
}

/// Shared map of live sessions.
///
/// The lock is never held across an `.await`: callers mutate through
/// [`with_session`](SessionStore::with_session) synchronously and do their
/// backend I/O outside of it.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<SessionId, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<SessionId, Session>> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<SessionId, Session>> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn create(&self) -> SessionId {
        let id = Uuid::new_v4();
        self.write().insert(id, Session::new());
        tracing::debug!(session = %id, "session created");
        id
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.read().contains_key(id)
    }

    /// Run `f` against the session, creating it first if it does not exist.
    pub fn with_session<R>(&self, id: SessionId, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut sessions = self.write();
        f(sessions.entry(id).or_default())
    }

    /// A copy of the session for rendering; empty if unknown.
    pub fn snapshot(&self, id: &SessionId) -> Session {
        self.read().get(id).cloned().unwrap_or_default()
    }

    /// Drop the session. Returns whether it existed.
    pub fn end(&self, id: &SessionId) -> bool {
        let removed = self.write().remove(id).is_some();
        if removed {
            tracing::debug!(session = %id, "session ended");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn test_record_exchange_appends_user_then_assistant() {
        let mut session = Session::new();
        session.record_exchange("first?", "one");
        session.record_exchange("second?", "two");

        let roles: Vec<Role> = session.transcript().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
        assert_eq!(session.transcript()[2].content, "second?");
    }

    #[test]
    fn test_sessions_are_isolated() {
        let store = SessionStore::new();
        let a = store.create();
        let b = store.create();

        store.with_session(a, |s| s.record_exchange("q", "a"));
        store.with_session(b, |s| s.upload.submit());

        assert_eq!(store.snapshot(&a).transcript().len(), 2);
        assert!(!store.snapshot(&a).upload.is_submitted());
        assert!(store.snapshot(&b).transcript().is_empty());
        assert!(store.snapshot(&b).upload.is_submitted());
    }

    #[test]
    fn test_with_session_creates_unknown_id() {
        let store = SessionStore::new();
        let id = Uuid::new_v4();
        assert!(!store.contains(&id));
        store.with_session(id, |s| s.push(Message::user("hi")));
        assert!(store.contains(&id));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_end_clears_session() {
        let store = SessionStore::new();
        let id = store.create();
        store.with_session(id, |s| s.record_exchange("q", "a"));

        assert!(store.end(&id));
        assert!(!store.end(&id));
        assert!(store.is_empty());
        assert!(store.snapshot(&id).transcript().is_empty());
    }
}
