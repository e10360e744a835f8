//! HTTP driver for the view state machine

use reqwest::{StatusCode, Url};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::machine::{ViewAction, ViewEvent, ViewState, handle_event};
use crate::profile::Profile;

/// Full-page navigation, owned by the host environment.
///
/// Login needs a real navigation because the provider round-trip leaves the
/// application entirely.
pub trait Navigator {
    fn navigate(&mut self, url: &Url);
}

/// Session state for one page, driven against the gateway origin.
///
/// The `reqwest::Client` is expected to carry the browser's cookies.
pub struct SessionView<N> {
    origin: Url,
    http: reqwest::Client,
    navigator: N,
    state: ViewState,
}

impl<N: Navigator> SessionView<N> {
    pub fn new(origin: &str, http: reqwest::Client, navigator: N) -> Result<Self> {
        let origin_url = Url::parse(origin).map_err(|e| Error::InvalidOrigin {
            origin: origin.to_owned(),
            reason: e.to_string(),
        })?;
        if origin_url.scheme() != "https" && origin_url.scheme() != "http" {
            return Err(Error::InvalidOrigin {
                origin: origin.to_owned(),
                reason: format!("unsupported scheme {}", origin_url.scheme()),
            });
        }
        Ok(Self {
            origin: origin_url,
            http,
            navigator,
            state: ViewState::Unknown,
        })
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    /// The signed-in profile, if any.
    pub fn profile(&self) -> Option<&Profile> {
        match &self.state {
            ViewState::Authenticated(profile) => Some(profile),
            _ => None,
        }
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    /// Ask `/api/me` once and settle on `Authenticated` or `Anonymous`.
    pub async fn mount(&mut self) {
        self.dispatch(ViewEvent::Mounted).await;
    }

    pub async fn login(&mut self) {
        self.dispatch(ViewEvent::LoginRequested).await;
    }

    /// Best effort: the view is `Anonymous` afterwards even if the gateway
    /// could not be reached.
    pub async fn logout(&mut self) {
        self.dispatch(ViewEvent::LogoutRequested).await;
    }

    /// Feed `event` into the machine and keep executing actions until one
    /// produces no follow-up event.
    async fn dispatch(&mut self, mut event: ViewEvent) {
        loop {
            let (state, action) = handle_event(std::mem::take(&mut self.state), event);
            self.state = state;
            debug!(?action, "session view transition");

            event = match action {
                ViewAction::CheckSession => self.check_session().await,
                ViewAction::NavigateToLogin => {
                    let url = self.endpoint("/auth/login");
                    info!(url = %url, "navigating to login");
                    self.navigator.navigate(&url);
                    return;
                }
                ViewAction::CallLogout => {
                    self.call_logout().await;
                    ViewEvent::LogoutCompleted
                }
                ViewAction::None => return,
            };
        }
    }

    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.origin.clone();
        url.set_path(path);
        url.set_query(None);
        url.set_fragment(None);
        url
    }

    async fn check_session(&self) -> ViewEvent {
        let response = match self.http.get(self.endpoint("/api/me")).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "session check failed");
                return ViewEvent::ProfileUnavailable(e.to_string());
            }
        };

        let status = response.status();
        if status != StatusCode::OK {
            warn!(status = status.as_u16(), "session check rejected");
            return ViewEvent::ProfileUnavailable(format!("status {status}"));
        }

        match response.json::<Profile>().await {
            Ok(profile) => ViewEvent::ProfileLoaded(profile),
            Err(e) => {
                warn!(error = %e, "session check returned an unreadable profile");
                ViewEvent::ProfileUnavailable(e.to_string())
            }
        }
    }

    async fn call_logout(&self) {
        match self.http.get(self.endpoint("/auth/logout")).send().await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                warn!(status = response.status().as_u16(), "logout call rejected");
            }
            Err(e) => warn!(error = %e, "logout call failed"),
        }
    }
}
