use std::collections::HashMap;
use std::time::{Duration, Instant};

use base64::Engine;
use parking_lot::RwLock;

use crate::tprintln;

#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub username: String,
    /// Per-session token required on every mutating admin request.
    pub csrf_token: String,
    pub issued_at: Instant,
    pub expires_at: Instant,
}

fn gen_id() -> String {
    // 256-bit random token, base64url without padding
    let mut buf = [0u8; 32];
    let _ = getrandom::getrandom(&mut buf);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

/// In-process admin session table. State lives on the manager itself and is
/// shared through the server's `AppState`; there is no module-level registry.
pub struct SessionManager {
    pub ttl: Duration,
    sessions: RwLock<HashMap<String, Session>>,
}

impl Default for SessionManager {
    fn default() -> Self {
        // Matches the admin cookie lifetime: five days.
        Self::with_ttl(Duration::from_secs(60 * 60 * 24 * 5))
    }
}

impl SessionManager {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl, sessions: RwLock::new(HashMap::new()) }
    }

    pub fn issue(&self, username: &str) -> Session {
        let now = Instant::now();
        let sess = Session {
            session_id: gen_id(),
            username: username.to_string(),
            csrf_token: gen_id(),
            issued_at: now,
            expires_at: now + self.ttl,
        };
        self.sessions.write().insert(sess.session_id.clone(), sess.clone());
        tprintln!("session.issue user={} ttl_secs={}", username, self.ttl.as_secs());
        sess
    }

    /// Look up a session by id, dropping it if expired.
    pub fn validate(&self, session_id: &str) -> Option<Session> {
        let now = Instant::now();
        let expired = {
            let map = self.sessions.read();
            match map.get(session_id) {
                Some(s) if s.expires_at > now => return Some(s.clone()),
                Some(_) => true,
                None => false,
            }
        };
        if expired {
            self.sessions.write().remove(session_id);
        }
        None
    }

    pub fn csrf_matches(&self, session_id: &str, provided: &str) -> bool {
        match self.validate(session_id) {
            Some(s) => s.csrf_token == provided,
            None => false,
        }
    }

    pub fn logout(&self, session_id: &str) -> bool {
        let removed = self.sessions.write().remove(session_id).is_some();
        if removed {
            tprintln!("session.logout sid={}", session_id);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_validate_logout() {
        let sm = SessionManager::default();
        let sess = sm.issue("admin");
        assert_eq!(sm.validate(&sess.session_id).unwrap().username, "admin");
        assert!(sm.csrf_matches(&sess.session_id, &sess.csrf_token));
        assert!(!sm.csrf_matches(&sess.session_id, "forged"));

        assert!(sm.logout(&sess.session_id));
        assert!(sm.validate(&sess.session_id).is_none());
        assert!(!sm.logout(&sess.session_id));
    }

    #[test]
    fn expired_sessions_are_pruned() {
        let sm = SessionManager::with_ttl(Duration::from_secs(0));
        let sess = sm.issue("admin");
        assert!(sm.validate(&sess.session_id).is_none());
        assert!(!sm.csrf_matches(&sess.session_id, &sess.csrf_token));
    }

    #[test]
    fn session_ids_are_unique() {
        let sm = SessionManager::default();
        let a = sm.issue("admin");
        let b = sm.issue("admin");
        assert_ne!(a.session_id, b.session_id);
        assert_ne!(a.csrf_token, b.csrf_token);
    }
}
