//! Route-guard state machine.
//!
//! Pure decisions over a session snapshot: no I/O, no side effects. The
//! caller (a UI shell, the CLI, an API layer) renders, blocks, or
//! redirects based on the returned state.

use crate::client::models::Role;
use crate::session::SessionState;

/// Where unauthenticated visitors are sent
pub const SIGN_IN_PATH: &str = "/auth/signin";

/// Where authenticated-but-unauthorized visitors are sent by default
pub const DEFAULT_FALLBACK_PATH: &str = "/dashboard";

/// Outcome of evaluating a session snapshot against a guarded route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    /// Session still loading; show nothing yet and do not redirect
    Pending,
    /// No session; redirect to sign-in
    Unauthenticated,
    /// Signed in with the user role
    AuthorizedUser,
    /// Signed in with the admin role
    AuthorizedAdmin,
    /// Signed in, but the route requires admin; redirect to the fallback
    Forbidden,
}

impl GuardState {
    /// Whether the guarded content may be shown
    pub fn allows_access(&self) -> bool {
        matches!(self, GuardState::AuthorizedUser | GuardState::AuthorizedAdmin)
    }
}

/// Access policy for one route.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    require_admin: bool,
    fallback_path: String,
}

impl RouteGuard {
    /// Guard that only requires a signed-in user
    pub fn new() -> Self {
        Self {
            require_admin: false,
            fallback_path: DEFAULT_FALLBACK_PATH.to_string(),
        }
    }

    /// Guard that requires the admin role
    pub fn require_admin() -> Self {
        Self {
            require_admin: true,
            fallback_path: DEFAULT_FALLBACK_PATH.to_string(),
        }
    }

    /// Override where Forbidden visitors are sent
    pub fn with_fallback_path(mut self, path: impl Into<String>) -> Self {
        self.fallback_path = path.into();
        self
    }

    /// Classify the session snapshot for this route.
    ///
    /// A loading session always wins: no redirect decision is made until
    /// the first fetch settles. A fetch error counts as unauthenticated,
    /// never as a grant.
    pub fn evaluate(&self, state: &SessionState) -> GuardState {
        if state.is_loading {
            return GuardState::Pending;
        }
        if !state.is_authenticated() {
            return GuardState::Unauthenticated;
        }

        let role = state
            .user
            .as_ref()
            .map(|u| u.role_enum())
            .unwrap_or(Role::User);

        if self.require_admin && role != Role::Admin {
            return GuardState::Forbidden;
        }

        match role {
            Role::Admin => GuardState::AuthorizedAdmin,
            Role::User => GuardState::AuthorizedUser,
        }
    }

    /// Redirect target for the given decision, if any
    pub fn redirect_target(&self, decision: GuardState) -> Option<&str> {
        match decision {
            GuardState::Unauthenticated => Some(SIGN_IN_PATH),
            GuardState::Forbidden => Some(&self.fallback_path),
            _ => None,
        }
    }
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Session, SessionData, SessionError, UserSummary};

    fn signed_in(role: &str) -> SessionState {
        SessionState::authenticated(SessionData {
            session: Session {
                token: "tok".to_string(),
                user_id: "u-1".to_string(),
                expires_at: "2099-01-01T00:00:00Z".to_string(),
            },
            user: UserSummary {
                id: "u-1".to_string(),
                name: "Test".to_string(),
                email: "test@example.com".to_string(),
                role: role.to_string(),
                is_active: true,
            },
        })
    }

    #[test]
    fn loading_session_is_pending_everywhere() {
        let state = SessionState::loading();
        assert_eq!(RouteGuard::new().evaluate(&state), GuardState::Pending);
        assert_eq!(
            RouteGuard::require_admin().evaluate(&state),
            GuardState::Pending
        );
        assert!(!GuardState::Pending.allows_access());
    }

    #[test]
    fn missing_session_redirects_to_sign_in() {
        let guard = RouteGuard::new();
        let decision = guard.evaluate(&SessionState::anonymous());
        assert_eq!(decision, GuardState::Unauthenticated);
        assert_eq!(guard.redirect_target(decision), Some(SIGN_IN_PATH));
    }

    #[test]
    fn fetch_error_is_never_a_grant() {
        let state = SessionState::failed(SessionError::Unreachable("down".to_string()));
        assert_eq!(
            RouteGuard::new().evaluate(&state),
            GuardState::Unauthenticated
        );
    }

    #[test]
    fn user_role_passes_plain_routes() {
        let guard = RouteGuard::new();
        let decision = guard.evaluate(&signed_in("user"));
        assert_eq!(decision, GuardState::AuthorizedUser);
        assert!(decision.allows_access());
        assert_eq!(guard.redirect_target(decision), None);
    }

    #[test]
    fn admin_role_is_recognized_on_plain_routes() {
        let decision = RouteGuard::new().evaluate(&signed_in("admin"));
        assert_eq!(decision, GuardState::AuthorizedAdmin);
        assert!(decision.allows_access());
    }

    #[test]
    fn non_admin_is_forbidden_on_admin_routes() {
        let guard = RouteGuard::require_admin();
        let decision = guard.evaluate(&signed_in("user"));
        assert_eq!(decision, GuardState::Forbidden);
        assert!(!decision.allows_access());
        assert_eq!(guard.redirect_target(decision), Some(DEFAULT_FALLBACK_PATH));
    }

    #[test]
    fn unknown_role_strings_do_not_reach_admin_routes() {
        let guard = RouteGuard::require_admin();
        assert_eq!(guard.evaluate(&signed_in("owner")), GuardState::Forbidden);
    }

    #[test]
    fn admin_passes_admin_routes() {
        let guard = RouteGuard::require_admin();
        let decision = guard.evaluate(&signed_in("admin"));
        assert_eq!(decision, GuardState::AuthorizedAdmin);
        assert_eq!(guard.redirect_target(decision), None);
    }

    #[test]
    fn fallback_path_is_configurable() {
        let guard = RouteGuard::require_admin().with_fallback_path("/home");
        let decision = guard.evaluate(&signed_in("user"));
        assert_eq!(guard.redirect_target(decision), Some("/home"));
    }
}
