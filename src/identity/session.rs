use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use parking_lot::RwLock;
use tracing::debug;

use super::principal::Principal;
use crate::error::{AppError, AppResult};

pub type SessionToken = String;

#[derive(Debug, Clone)]
pub struct Session {
    pub token: SessionToken,
    pub principal: Principal,
    pub expires_at: Instant,
}

fn gen_token() -> Result<SessionToken, getrandom::Error> {
    // 256-bit random token base64url without padding
    let mut buf = [0u8; 32];
    getrandom::getrandom(&mut buf)?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}

/// In-process session store keyed by the cookie token.
/// Lookups touch only their own entry; `issue` also drops every expired one.
#[derive(Clone)]
pub struct SessionManager {
    ttl: Duration,
    sessions: Arc<RwLock<HashMap<SessionToken, Session>>>,
}

impl Default for SessionManager {
    fn default() -> Self { Self::new(Duration::from_secs(60 * 60)) }
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self { Self { ttl, sessions: Arc::new(RwLock::new(HashMap::new())) } }

    /// Start a session. Expired entries of other callers are swept while the write lock is held.
    pub fn issue(&self, principal: Principal) -> AppResult<Session> {
        let token = gen_token().map_err(|e| AppError::internal("session_token".to_string(), e.to_string()))?;
        let now = Instant::now();
        let sess = Session { token, principal, expires_at: now + self.ttl };
        let mut map = self.sessions.write();
        let before = map.len();
        map.retain(|_, s| s.expires_at > now);
        let swept = before - map.len();
        map.insert(sess.token.clone(), sess.clone());
        debug!(target: "session", ttl_secs = self.ttl.as_secs(), swept, "session.issue");
        Ok(sess)
    }

    /// Principal for a live session. Expired entries are dropped on sight.
    pub fn get(&self, token: &str) -> Option<Principal> {
        let now = Instant::now();
        let expired = {
            let map = self.sessions.read();
            match map.get(token) {
                Some(s) if s.expires_at > now => return Some(s.principal.clone()),
                Some(_) => true,
                None => false,
            }
        };
        if expired {
            self.sessions.write().remove(token);
        }
        None
    }

    /// Push the expiry forward; false when the session is gone or already expired.
    pub fn touch(&self, token: &str) -> bool {
        let now = Instant::now();
        let mut map = self.sessions.write();
        match map.get_mut(token) {
            Some(s) if s.expires_at > now => {
                s.expires_at = now + self.ttl;
                true
            }
            Some(_) => {
                map.remove(token);
                false
            }
            None => false,
        }
    }

    pub fn logout(&self, token: &str) -> bool {
        let removed = self.sessions.write().remove(token).is_some();
        debug!(target: "session", removed, "session.logout");
        removed
    }

    pub fn len(&self) -> usize { self.sessions.read().len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::principal::{Attrs, ATTR_USER_ID};

    fn principal() -> Principal {
        let mut attributes = Attrs::new();
        attributes.insert(ATTR_USER_ID.into(), vec!["user@example.org".into()]);
        Principal { attributes, name_id: Some("nid".into()), session_index: Some("idx".into()) }
    }

    #[test]
    fn issue_get_logout() {
        let sm = SessionManager::default();
        let s = sm.issue(principal()).unwrap();
        assert_eq!(sm.get(&s.token).and_then(|p| p.user_id().map(str::to_string)), Some("user@example.org".into()));
        assert!(sm.logout(&s.token));
        assert!(sm.get(&s.token).is_none());
        assert!(!sm.logout(&s.token));
    }

    #[test]
    fn tokens_are_unique() {
        let sm = SessionManager::default();
        let a = sm.issue(principal()).unwrap();
        let b = sm.issue(principal()).unwrap();
        assert_ne!(a.token, b.token);
        assert_eq!(sm.len(), 2);
    }

    #[test]
    fn expired_sessions_are_dropped() {
        let sm = SessionManager::new(Duration::from_secs(0));
        let s = sm.issue(principal()).unwrap();
        assert!(sm.get(&s.token).is_none());
        assert!(sm.is_empty());
        assert!(!sm.touch(&s.token));
    }

    #[test]
    fn issue_sweeps_abandoned_sessions() {
        let sm = SessionManager::new(Duration::from_millis(1));
        for _ in 0..1000 {
            sm.issue(principal()).unwrap();
        }
        std::thread::sleep(Duration::from_millis(5));
        sm.issue(principal()).unwrap();
        assert_eq!(sm.len(), 1);
    }

    #[test]
    fn tokens_are_random_256_bit() {
        let sm = SessionManager::default();
        let s = sm.issue(principal()).unwrap();
        assert_eq!(s.token.len(), 43);
        assert_ne!(s.token, base64::engine::general_purpose::URL_SAFE_NO_PAD.encode([0u8; 32]));
    }

    #[test]
    fn touch_extends_live_session() {
        let sm = SessionManager::default();
        let s = sm.issue(principal()).unwrap();
        assert!(sm.touch(&s.token));
        assert!(!sm.touch("unknown"));
    }
}
