//! View state machine
//!
//! `Unknown -> Loading -> {Authenticated(profile), Anonymous}`. The session check
//! runs once per mount. Failures of any kind end in `Anonymous`; there
//! is no error state. Logout always ends in `Anonymous`, whatever the
//! gateway answered.

use crate::profile::Profile;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ViewState {
    /// Not mounted yet
    #[default]
    Unknown,
    /// `/api/me` request in flight
    Loading,
    Authenticated(Profile),
    Anonymous,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    /// View attached to the page
    Mounted,
    /// `/api/me` answered 200 with a profile
    ProfileLoaded(Profile),
    /// Any other `/api/me` outcome; the reason is only logged
    ProfileUnavailable(String),
    LoginRequested,
    LogoutRequested,
    /// Logout call finished, successfully or not
    LogoutCompleted,
}

/// What the driver must do after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewAction {
    /// `GET /api/me`
    CheckSession,
    /// Full-page navigation to `/auth/login`
    NavigateToLogin,
    /// `GET /auth/logout`
    CallLogout,
    None,
}

pub fn handle_event(state: ViewState, event: ViewEvent) -> (ViewState, ViewAction) {
    match (state, event) {
        // --- Mount ---
        (ViewState::Unknown, ViewEvent::Mounted) => (ViewState::Loading, ViewAction::CheckSession),

        // --- Session check result ---
        (ViewState::Loading, ViewEvent::ProfileLoaded(profile)) => {
            (ViewState::Authenticated(profile), ViewAction::None)
        }
        (ViewState::Loading, ViewEvent::ProfileUnavailable(_)) => (ViewState::Anonymous, ViewAction::None),

        // --- User intents, valid from any state ---
        (state, ViewEvent::LoginRequested) => (state, ViewAction::NavigateToLogin),
        (state, ViewEvent::LogoutRequested) => (state, ViewAction::CallLogout),
        (_, ViewEvent::LogoutCompleted) => (ViewState::Anonymous, ViewAction::None),

        // Repeated mounts and stale session results change nothing
        (state, _) => (state, ViewAction::None),
    }
}
