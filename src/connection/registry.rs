use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError},
};

use log::debug;

use super::{SharedSession, Session};

/// Persistent sessions, one per persistence key.
///
/// Cloning a registry yields a handle on the same set of sessions.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    sessions: Arc<Mutex<HashMap<String, SharedSession>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry shared by every client of this process that asks for persistence
    /// without naming a registry.
    pub fn process() -> &'static ConnectionRegistry {
        static REGISTRY: OnceLock<ConnectionRegistry> = OnceLock::new();
        REGISTRY.get_or_init(ConnectionRegistry::new)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SharedSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The session slot for `key`, created closed on first use.
    pub(crate) fn session(&self, key: &str) -> SharedSession {
        let mut sessions = self.lock();
        Arc::clone(sessions.entry(key.to_string()).or_insert_with(|| {
            debug!("registering persistent session '{key}'");
            Arc::new(Mutex::new(None::<Session>))
        }))
    }

    pub fn is_open(&self, key: &str) -> bool {
        self.lock().get(key).is_some_and(|session| {
            session
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_some()
        })
    }

    /// Closes the session stored under `key`, if any.
    pub fn close(&self, key: &str) {
        if let Some(session) = self.lock().get(key) {
            session.lock().unwrap_or_else(PoisonError::into_inner).take();
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sessions = self.lock();
        let mut keys = sessions.keys().collect::<Vec<_>>();
        keys.sort();
        f.debug_struct("ConnectionRegistry")
            .field("keys", &keys)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::mock::MockServer;

    use super::*;

    #[test]
    fn same_key_same_slot() {
        let registry = ConnectionRegistry::new();
        let a = registry.session("k");
        let b = registry.session("k");
        let c = registry.session("other");

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn close_by_key() {
        let server = MockServer::new();
        let registry = ConnectionRegistry::new();
        let connection = server.persistent_connection("k", &registry);

        connection.open().unwrap();
        assert!(registry.is_open("k"));

        registry.close("k");
        assert!(connection.is_closed());
        assert!(!registry.is_open("k"));
    }

    #[test]
    fn clones_share_sessions() {
        let registry = ConnectionRegistry::new();
        let clone = registry.clone();
        registry.session("k");

        assert_eq!(clone.len(), 1);
    }
}
