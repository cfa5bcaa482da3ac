use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use time::{Duration, OffsetDateTime};
use ulid::Ulid;
use url::Url;

use super::config::VaultSettings;
use crate::audit::AuditSink;
use crate::auth::Authenticator;
use crate::flow::{AuthorizationFlow, Session};

struct SessionEntry {
    session: Session,
    touched: OffsetDateTime,
}

/// Shared state for consent route handlers.
///
/// Sessions are *checked out* of the registry for the duration of one
/// handler and put back afterwards, so each session sees at most one
/// in-flight operation at a time (per-session exclusion without
/// cross-session locking). Entries untouched for longer than the
/// session TTL are evicted lazily.
pub(super) struct VaultState<A, S> {
    pub(super) flow: Arc<AuthorizationFlow<A, S>>,
    pub(super) return_url: Url,
    pub(super) settings: VaultSettings,
    sessions: Arc<Mutex<HashMap<Ulid, SessionEntry>>>,
}

impl<A, S> VaultState<A, S> {
    pub(super) fn new(
        flow: Arc<AuthorizationFlow<A, S>>,
        return_url: Url,
        settings: VaultSettings,
    ) -> Self {
        Self {
            flow,
            return_url,
            settings,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub(super) fn insert_session(&self, session: Session) -> Ulid {
        let id = Ulid::new();
        let mut sessions = self.lock_sessions();

        let ttl = Duration::minutes(self.settings.session_ttl_minutes);
        let now = OffsetDateTime::now_utc();
        sessions.retain(|_, entry| now - entry.touched < ttl);

        sessions.insert(
            id,
            SessionEntry {
                session,
                touched: now,
            },
        );
        id
    }

    pub(super) fn take_session(&self, id: Ulid) -> Option<Session> {
        self.lock_sessions().remove(&id).map(|entry| entry.session)
    }

    pub(super) fn put_session(&self, id: Ulid, session: Session) {
        self.lock_sessions().insert(
            id,
            SessionEntry {
                session,
                touched: OffsetDateTime::now_utc(),
            },
        );
    }

    fn lock_sessions(&self) -> MutexGuard<'_, HashMap<Ulid, SessionEntry>> {
        match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

// Manual Clone: avoid derive adding `A: Clone, S: Clone` bounds.
impl<A, S> Clone for VaultState<A, S> {
    fn clone(&self) -> Self {
        Self {
            flow: self.flow.clone(),
            return_url: self.return_url.clone(),
            settings: self.settings.clone(),
            sessions: self.sessions.clone(),
        }
    }
}

// PrivateCookieJar requires Key to be extractable from state
impl<A: Authenticator, S: AuditSink> FromRef<VaultState<A, S>> for Key {
    fn from_ref(state: &VaultState<A, S>) -> Self {
        state.settings.cookie_key.clone()
    }
}
