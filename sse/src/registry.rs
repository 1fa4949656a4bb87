use auth::AuthContext;
use dashmap::DashMap;
use log::*;

use crate::connection::{SessionId, SseSession};

/// Binds an open session to the identity of the caller that opened it.
/// Only a hash of the bearer token is kept.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub session: SseSession,
    pub subject: Option<String>,
    pub token_hash: Option<String>,
    pub scopes: Vec<String>,
}

impl SessionRecord {
    fn matches(&self, subject: Option<&str>, token_hash: Option<&str>) -> bool {
        if let Some(subject) = subject {
            if self.subject.as_deref() == Some(subject) {
                return true;
            }
        }
        token_hash.is_some() && self.token_hash.as_deref() == token_hash
    }
}

/// Correlates later stateless requests with the SSE sessions their caller opened.
pub struct SessionRegistry {
    records: DashMap<SessionId, SessionRecord>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    pub fn register(&self, session: SseSession, ctx: &AuthContext) {
        let record = SessionRecord {
            subject: ctx.subject().map(str::to_string),
            token_hash: ctx.token_hash(),
            scopes: ctx.scopes().to_vec(),
            session,
        };
        debug!(
            "Registered SSE session {} ({})",
            record.session.id,
            if ctx.is_anonymous() {
                "anonymous"
            } else {
                "authenticated"
            }
        );
        self.records.insert(record.session.id.clone(), record);
    }

    pub fn unregister(&self, session_id: &SessionId) -> Option<SessionRecord> {
        self.records.remove(session_id).map(|(_, record)| record)
    }

    /// Sessions belonging to the caller behind `ctx`.
    ///
    /// A record matches when its subject equals the caller's subject, so one
    /// user's sessions stay correlated across freshly minted tokens. Without a
    /// subject match the token hashes must be equal. Anonymous callers match
    /// nothing.
    pub fn find_matching_sessions(&self, ctx: &AuthContext) -> Vec<SessionRecord> {
        if ctx.is_anonymous() {
            return Vec::new();
        }
        let subject = ctx.subject();
        let token_hash = ctx.token_hash();

        self.records
            .iter()
            .filter(|entry| entry.value().matches(subject, token_hash.as_deref()))
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn get(&self, session_id: &SessionId) -> Option<SessionRecord> {
        self.records
            .get(session_id)
            .map(|entry| entry.value().clone())
    }

    /// Ends every registered stream and forgets all records.
    pub fn terminate_all(&self) {
        let count = self.records.len();
        for entry in self.records.iter() {
            entry.value().session.end();
        }
        self.records.clear();
        info!("Terminated {count} registered SSE session(s)");
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::{Manager, ManagerConfig};
    use auth::ValidatedAccessToken;
    use secrecy::SecretString;
    use serde_json::{json, Value};
    use tokio::sync::mpsc::unbounded_channel;

    fn ctx(token: &str, subject: Option<&str>) -> AuthContext {
        let payload = match subject {
            Some(sub) => json!({ "sub": sub }),
            None => json!({}),
        };
        let Value::Object(payload) = payload else {
            unreachable!()
        };
        ValidatedAccessToken::new(
            SecretString::new(token.to_string()),
            payload,
            vec!["neonpanel.mcp".to_string()],
        )
        .into()
    }

    fn session(manager: &Manager) -> SseSession {
        let (tx, _rx) = unbounded_channel();
        manager.connect(tx).unwrap()
    }

    fn ids(records: &[SessionRecord]) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = records.iter().map(|r| r.session.id.clone()).collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids
    }

    #[tokio::test]
    async fn test_record_stores_hash_not_token() {
        let manager = Manager::new(ManagerConfig::default());
        let registry = SessionRegistry::new();
        let s = session(&manager);

        registry.register(s.clone(), &ctx("secret-token", Some("u1")));

        let record = registry.get(&s.id).unwrap();
        assert_eq!(record.subject.as_deref(), Some("u1"));
        assert_eq!(record.token_hash, Some(auth::context::hash_token("secret-token")));
        assert_ne!(record.token_hash.as_deref(), Some("secret-token"));
        assert_eq!(record.scopes, vec!["neonpanel.mcp"]);
    }

    #[tokio::test]
    async fn test_subject_match_wins_even_when_token_hash_differs() {
        let manager = Manager::new(ManagerConfig::default());
        let registry = SessionRegistry::new();
        let tab_one = session(&manager);
        let tab_two = session(&manager);
        let other_user = session(&manager);
        registry.register(tab_one.clone(), &ctx("T1", Some("u1")));
        registry.register(tab_two.clone(), &ctx("T3", Some("u1")));
        registry.register(other_user, &ctx("T9", Some("u2")));

        let matches = registry.find_matching_sessions(&ctx("T2", Some("u1")));

        let mut expected = vec![tab_one.id, tab_two.id];
        expected.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        assert_eq!(ids(&matches), expected);
    }

    #[tokio::test]
    async fn test_falls_back_to_token_hash() {
        let manager = Manager::new(ManagerConfig::default());
        let registry = SessionRegistry::new();
        let without_subject = session(&manager);
        let different_subject = session(&manager);
        registry.register(without_subject.clone(), &ctx("T1", None));
        registry.register(different_subject.clone(), &ctx("T2", Some("u1")));

        let by_hash = registry.find_matching_sessions(&ctx("T1", None));
        assert_eq!(ids(&by_hash), vec![without_subject.id]);

        let by_hash_despite_subject = registry.find_matching_sessions(&ctx("T2", Some("u7")));
        assert_eq!(ids(&by_hash_despite_subject), vec![different_subject.id]);

        assert!(registry
            .find_matching_sessions(&ctx("T3", Some("u9")))
            .is_empty());
    }

    #[tokio::test]
    async fn test_anonymous_sessions_never_correlate() {
        let manager = Manager::new(ManagerConfig::default());
        let registry = SessionRegistry::new();
        let anonymous = session(&manager);
        registry.register(anonymous.clone(), &AuthContext::anonymous());

        assert!(registry
            .find_matching_sessions(&AuthContext::anonymous())
            .is_empty());
        assert!(registry
            .find_matching_sessions(&ctx("T1", Some("u1")))
            .is_empty());
        assert!(registry.get(&anonymous.id).unwrap().token_hash.is_none());
    }

    #[tokio::test]
    async fn test_unregister_and_terminate_all() {
        let manager = Manager::new(ManagerConfig::default());
        let registry = SessionRegistry::new();
        let a = session(&manager);
        let b = session(&manager);
        registry.register(a.clone(), &ctx("T1", Some("u1")));
        registry.register(b.clone(), &ctx("T2", Some("u2")));

        assert!(registry.unregister(&a.id).is_some());
        assert!(registry.unregister(&a.id).is_none());
        assert_eq!(registry.len(), 1);

        registry.terminate_all();

        assert!(registry.is_empty());
        assert!(b.is_ended());
        assert!(!a.is_ended());
    }
}
