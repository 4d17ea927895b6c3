//! Reactive session state shared across the process.
//!
//! `SessionProvider` fetches the session from the auth service once,
//! caches it, and publishes immutable snapshots over a watch channel.
//! Consumers either grab the current snapshot (`state`) or subscribe and
//! await changes. Snapshots are only republished when the session, the
//! loading flag, or the error actually changed, so subscribers are never
//! woken for identical state and callers holding an `Arc<SessionState>`
//! can cheaply compare by pointer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::auth::{AuthBackend, Session, SessionData, SessionError, UserSummary};
use crate::store::{CredentialStore, LEGACY_TOKEN_KEY, LEGACY_USER_ID_KEY};

/// Point-in-time view of the session. Either `session` and `user` are both
/// present or both absent; partial sessions are not representable.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub user: Option<UserSummary>,
    pub session: Option<Session>,
    /// True only while the first fetch is still in flight
    pub is_loading: bool,
    pub error: Option<SessionError>,
}

impl SessionState {
    pub fn loading() -> Self {
        Self {
            user: None,
            session: None,
            is_loading: true,
            error: None,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            user: None,
            session: None,
            is_loading: false,
            error: None,
        }
    }

    pub fn authenticated(data: SessionData) -> Self {
        Self {
            user: Some(data.user),
            session: Some(data.session),
            is_loading: false,
            error: None,
        }
    }

    pub fn failed(error: SessionError) -> Self {
        Self {
            user: None,
            session: None,
            is_loading: false,
            error: Some(error),
        }
    }

    /// Id of the signed-in user, when there is one
    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }

    /// Bearer token of the live session, when there is one
    pub fn access_token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.token.as_str())
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some() && self.user.is_some()
    }
}

/// Cached access to the current credentials. The gateway reads these on
/// every call instead of asking the auth service again, so implementations
/// must answer from memory.
pub trait SessionSource: Send + Sync {
    fn access_token(&self) -> Option<String>;
    fn current_user_id(&self) -> Option<String>;
}

/// Fixed credentials, for the CLI's explicit-token mode and for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSession {
    token: Option<String>,
    user_id: Option<String>,
}

impl StaticSession {
    pub fn new(token: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            user_id: Some(user_id.into()),
        }
    }

    /// A source with no credentials at all
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A source that knows the acting user but carries no token, for
    /// backends that run with authentication disabled.
    pub fn user_only(user_id: impl Into<String>) -> Self {
        Self {
            token: None,
            user_id: Some(user_id.into()),
        }
    }
}

impl SessionSource for StaticSession {
    fn access_token(&self) -> Option<String> {
        self.token.clone()
    }

    fn current_user_id(&self) -> Option<String> {
        self.user_id.clone()
    }
}

/// Owns the cached session and its refresh lifecycle.
pub struct SessionProvider {
    backend: Arc<dyn AuthBackend>,
    state_tx: watch::Sender<Arc<SessionState>>,
    /// Bumped by every refresh and sign-out; fetches that finish under an
    /// older epoch are discarded instead of published
    epoch: AtomicU64,
    store: Option<Arc<dyn CredentialStore>>,
}

impl SessionProvider {
    pub fn new(backend: Arc<dyn AuthBackend>) -> Self {
        let (state_tx, _) = watch::channel(Arc::new(SessionState::loading()));
        Self {
            backend,
            state_tx,
            epoch: AtomicU64::new(0),
            store: None,
        }
    }

    /// Mirror credential artifacts into the given store: written when a
    /// session loads, cleared when it ends.
    pub fn with_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Current snapshot. Cheap; no network.
    pub fn state(&self) -> Arc<SessionState> {
        self.state_tx.borrow().clone()
    }

    /// Subscribe to state changes. The receiver immediately holds the
    /// current snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<SessionState>> {
        self.state_tx.subscribe()
    }

    /// Re-query the auth service and publish the outcome. Call after
    /// anything that may have changed the auth state.
    pub async fn refresh(&self) -> Arc<SessionState> {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;

        let next = match self.backend.fetch_session().await {
            Ok(Some(data)) => {
                debug!(user_id = %data.user.id, "Session refreshed");
                SessionState::authenticated(data)
            }
            Ok(None) => SessionState::anonymous(),
            Err(e) => {
                warn!(error = %e, "Session refresh failed");
                SessionState::failed(e)
            }
        };

        // The epoch comparison runs inside the channel lock, together with
        // the store sync and the publish itself: a sign-out that completes
        // while this fetch was in flight can never be overwritten by it.
        let mut superseded = false;
        self.state_tx.send_if_modified(|current| {
            if self.epoch.load(Ordering::SeqCst) != epoch {
                // A newer refresh or a sign-out finished first
                superseded = true;
                return false;
            }
            self.sync_store(&next);
            if **current == next {
                return false;
            }
            *current = Arc::new(next);
            true
        });

        if superseded {
            debug!("Discarding superseded session fetch");
        }
        self.state()
    }

    /// Revoke the session upstream (best effort) and clear local state.
    /// Any in-flight refresh is superseded.
    pub async fn sign_out(&self) -> Arc<SessionState> {
        self.epoch.fetch_add(1, Ordering::SeqCst);

        if let Err(e) = self.backend.revoke_session().await {
            warn!(error = %e, "Upstream sign-out failed, clearing local session anyway");
        }

        let next = SessionState::anonymous();
        self.sync_store(&next);
        self.publish(next);
        info!("Signed out");
        self.state()
    }

    fn publish(&self, next: SessionState) {
        self.state_tx.send_if_modified(|current| {
            if **current == next {
                return false;
            }
            *current = Arc::new(next);
            true
        });
    }

    fn sync_store(&self, next: &SessionState) {
        let Some(store) = &self.store else {
            return;
        };
        // Fetch errors leave the artifacts alone: the session may still be
        // fine and the gateway clears them itself on a definitive 401
        let result = match (&next.session, &next.error) {
            (Some(session), _) => store
                .put(LEGACY_TOKEN_KEY, &session.token)
                .and_then(|_| store.put(LEGACY_USER_ID_KEY, &session.user_id)),
            (None, None) => store.clear_legacy_artifacts(),
            (None, Some(_)) => Ok(()),
        };
        if let Err(e) = result {
            warn!(error = %e, "Failed to sync credential artifacts");
        }
    }
}

impl SessionSource for SessionProvider {
    fn access_token(&self) -> Option<String> {
        self.state_tx.borrow().access_token().map(str::to_string)
    }

    fn current_user_id(&self) -> Option<String> {
        self.state_tx.borrow().user_id().map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCredentialStore;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio_test::{assert_pending, assert_ready_ok};

    fn sample_data(user_id: &str) -> SessionData {
        SessionData {
            session: Session {
                token: format!("tok-{}", user_id),
                user_id: user_id.to_string(),
                expires_at: "2099-01-01T00:00:00Z".to_string(),
            },
            user: UserSummary {
                id: user_id.to_string(),
                name: "Test User".to_string(),
                email: format!("{}@example.com", user_id),
                role: "user".to_string(),
                is_active: true,
            },
        }
    }

    /// Backend that serves a scripted sequence of fetch results.
    struct ScriptedBackend {
        responses: Mutex<VecDeque<Result<Option<SessionData>, SessionError>>>,
        fetch_delay: Option<Duration>,
        revocations: AtomicUsize,
    }

    impl ScriptedBackend {
        fn new(responses: Vec<Result<Option<SessionData>, SessionError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                fetch_delay: None,
                revocations: AtomicUsize::new(0),
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.fetch_delay = Some(delay);
            self
        }
    }

    #[async_trait::async_trait]
    impl AuthBackend for ScriptedBackend {
        async fn fetch_session(&self) -> Result<Option<SessionData>, SessionError> {
            if let Some(delay) = self.fetch_delay {
                tokio::time::sleep(delay).await;
            }
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(None))
        }

        async fn revoke_session(&self) -> Result<(), SessionError> {
            self.revocations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn starts_loading_with_no_user() {
        let provider = SessionProvider::new(Arc::new(ScriptedBackend::new(vec![])));
        let state = provider.state();
        assert!(state.is_loading);
        assert!(state.user.is_none());
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn refresh_publishes_the_session() {
        let backend = ScriptedBackend::new(vec![Ok(Some(sample_data("u-1")))]);
        let provider = SessionProvider::new(Arc::new(backend));

        let state = provider.refresh().await;
        assert!(!state.is_loading);
        assert!(state.is_authenticated());
        assert_eq!(state.user_id(), Some("u-1"));
        assert_eq!(state.access_token(), Some("tok-u-1"));
    }

    #[tokio::test]
    async fn fetch_failure_populates_error_and_keeps_user_empty() {
        let backend = ScriptedBackend::new(vec![Err(SessionError::Unreachable(
            "connection refused".to_string(),
        ))]);
        let provider = SessionProvider::new(Arc::new(backend));

        let state = provider.refresh().await;
        assert!(!state.is_loading);
        assert!(state.user.is_none());
        assert!(matches!(state.error, Some(SessionError::Unreachable(_))));
        // No automatic retry: the scripted queue is untouched afterwards
        assert_eq!(provider.access_token(), None);
    }

    #[tokio::test]
    async fn identical_refreshes_reuse_the_snapshot() {
        let backend = ScriptedBackend::new(vec![
            Ok(Some(sample_data("u-1"))),
            Ok(Some(sample_data("u-1"))),
        ]);
        let provider = SessionProvider::new(Arc::new(backend));

        let first = provider.refresh().await;
        let mut rx = provider.subscribe();
        rx.borrow_and_update();

        let second = provider.refresh().await;
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn subscribers_wake_on_real_changes() {
        let backend = ScriptedBackend::new(vec![Ok(Some(sample_data("u-1"))), Ok(None)]);
        let provider = SessionProvider::new(Arc::new(backend));
        let mut rx = provider.subscribe();
        rx.borrow_and_update();

        provider.refresh().await;
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_authenticated());

        provider.refresh().await;
        assert!(rx.has_changed().unwrap());
        assert!(!rx.borrow_and_update().is_authenticated());
    }

    #[tokio::test]
    async fn sign_out_revokes_and_clears() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok(Some(sample_data("u-1")))]));
        let store = Arc::new(MemoryCredentialStore::new());
        let store_dyn: Arc<dyn CredentialStore> = store.clone();
        let provider = SessionProvider::new(backend.clone()).with_store(store_dyn);

        provider.refresh().await;
        assert_eq!(store.get(LEGACY_TOKEN_KEY), Some("tok-u-1".to_string()));
        assert_eq!(store.get(LEGACY_USER_ID_KEY), Some("u-1".to_string()));

        let state = provider.sign_out().await;
        assert!(!state.is_authenticated());
        assert_eq!(backend.revocations.load(Ordering::SeqCst), 1);
        assert_eq!(store.get(LEGACY_TOKEN_KEY), None);
        assert_eq!(store.get(LEGACY_USER_ID_KEY), None);
    }

    #[tokio::test]
    async fn slow_refresh_loses_to_sign_out() {
        let backend = Arc::new(
            ScriptedBackend::new(vec![Ok(Some(sample_data("u-1")))])
                .with_delay(Duration::from_millis(50)),
        );
        let provider = Arc::new(SessionProvider::new(backend));

        let slow = {
            let provider = provider.clone();
            tokio::spawn(async move { provider.refresh().await })
        };
        // Give the refresh a head start so its fetch is in flight
        tokio::time::sleep(Duration::from_millis(10)).await;
        provider.sign_out().await;

        let settled = slow.await.unwrap();
        assert!(!settled.is_authenticated());
        assert!(!provider.state().is_authenticated());
    }

    #[tokio::test]
    async fn superseded_refresh_cannot_resurrect_artifacts() {
        let backend = Arc::new(
            ScriptedBackend::new(vec![Ok(Some(sample_data("u-1")))])
                .with_delay(Duration::from_millis(50)),
        );
        let store = Arc::new(MemoryCredentialStore::new());
        let store_dyn: Arc<dyn CredentialStore> = store.clone();
        let provider = Arc::new(SessionProvider::new(backend).with_store(store_dyn));

        let slow = {
            let provider = provider.clone();
            tokio::spawn(async move { provider.refresh().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        provider.sign_out().await;
        slow.await.unwrap();

        // The stale fetch lost: nothing published, nothing written back
        assert!(!provider.state().is_authenticated());
        assert_eq!(store.get(LEGACY_TOKEN_KEY), None);
        assert_eq!(store.get(LEGACY_USER_ID_KEY), None);
    }

    #[tokio::test]
    async fn unchanged_refresh_leaves_waiters_parked() {
        let backend = ScriptedBackend::new(vec![
            Ok(Some(sample_data("u-1"))),
            Ok(Some(sample_data("u-1"))),
            Ok(None),
        ]);
        let provider = SessionProvider::new(Arc::new(backend));
        provider.refresh().await;

        let mut rx = provider.subscribe();
        rx.borrow_and_update();
        let mut waiter = tokio_test::task::spawn(rx.changed());
        assert_pending!(waiter.poll());

        // Same session again: nobody gets woken
        provider.refresh().await;
        assert_pending!(waiter.poll());

        // Signed out upstream: the snapshot really changed
        provider.refresh().await;
        assert_ready_ok!(waiter.poll());
    }

    #[tokio::test]
    async fn fetch_error_leaves_stored_artifacts_alone() {
        let backend = ScriptedBackend::new(vec![
            Ok(Some(sample_data("u-1"))),
            Err(SessionError::Unreachable("timeout".to_string())),
        ]);
        let store = Arc::new(MemoryCredentialStore::new());
        let store_dyn: Arc<dyn CredentialStore> = store.clone();
        let provider = SessionProvider::new(Arc::new(backend)).with_store(store_dyn);

        provider.refresh().await;
        provider.refresh().await;

        assert!(provider.state().error.is_some());
        assert_eq!(store.get(LEGACY_TOKEN_KEY), Some("tok-u-1".to_string()));
    }

    #[test]
    fn static_session_answers_from_memory() {
        let source = StaticSession::new("tok-abc", "u-9");
        assert_eq!(source.access_token(), Some("tok-abc".to_string()));
        assert_eq!(source.current_user_id(), Some("u-9".to_string()));

        let empty = StaticSession::anonymous();
        assert_eq!(empty.access_token(), None);
        assert_eq!(empty.current_user_id(), None);

        let tokenless = StaticSession::user_only("u-3");
        assert_eq!(tokenless.access_token(), None);
        assert_eq!(tokenless.current_user_id(), Some("u-3".to_string()));
    }
}
