use crate::observable::Observable;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Credentials for the signed-in user. Replaced as a whole, never edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at_epoch_seconds: Option<i64>,
    pub user_id: Option<String>,
}

impl Session {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at_epoch_seconds: None,
            user_id: None,
        }
    }

    /// A session without a known expiry is treated as valid.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at_epoch_seconds {
            Some(expires) => now.timestamp() >= expires,
            None => false,
        }
    }

    pub fn with_user_id(&self, user_id: Option<String>) -> Self {
        Self {
            user_id,
            ..self.clone()
        }
    }
}

/// Process-lifetime holder for the current session.
///
/// Cloning the store shares the same underlying value.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<Observable<Option<Arc<Session>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        let store = Self::new();
        store.replace(session);
        store
    }

    pub fn current(&self) -> Option<Arc<Session>> {
        self.inner.get()
    }

    pub fn replace(&self, session: Session) {
        log::info!(
            "Session replaced (user={})",
            session.user_id.as_deref().unwrap_or("unknown")
        );
        self.inner.set(Some(Arc::new(session)));
    }

    pub fn clear(&self) {
        self.inner.set(None);
    }

    pub fn access_token(&self) -> Option<String> {
        self.current()
            .map(|s| s.access_token.clone())
            .filter(|t| !t.is_empty())
    }

    pub fn user_id(&self) -> Option<String> {
        self.current().and_then(|s| s.user_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn expiry_is_inclusive() {
        let session = Session {
            expires_at_epoch_seconds: Some(1_700_000_000),
            ..Session::new("tok")
        };
        let before = Utc.timestamp_opt(1_699_999_999, 0).unwrap();
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert!(!session.is_expired(before));
        assert!(session.is_expired(at));
        assert!(!Session::new("tok").is_expired(at));
    }

    #[test]
    fn clones_share_the_same_session() {
        let store = SessionStore::new();
        let view = store.clone();
        assert!(view.access_token().is_none());

        store.replace(Session::new("abc").with_user_id(Some("me".into())));
        assert_eq!(view.access_token().as_deref(), Some("abc"));
        assert_eq!(view.user_id().as_deref(), Some("me"));

        store.clear();
        assert!(view.current().is_none());
    }

    #[test]
    fn empty_token_is_not_usable() {
        let store = SessionStore::with_session(Session::new(""));
        assert!(store.access_token().is_none());
    }
}
