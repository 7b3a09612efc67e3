//! Client-side session context.
//!
//! Holds the current token and user for an admin client, and drives login,
//! logout, silent refresh and the redirect back to the login page when the
//! session ends. The server keeps no session state; everything here lives on
//! the client.

mod transport;

use chrono::{DateTime, TimeDelta, Utc};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::auth::LOGIN_PAGE_PATH;

pub use transport::{
    AuthTransport, HttpTransport, LoginReply, RefreshReply, SessionUser, TransportError,
};

/// Refresh this long before expiry.
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(5 * 60);

/// Shortest wait between scheduler checks.
const MIN_SCHEDULER_WAIT: Duration = Duration::from_secs(1);

/// Wait before retrying a refresh that failed on the network.
const NETWORK_RETRY_WAIT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user: SessionUser,
    pub expires_at: DateTime<Utc>,
}

/// What the client should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Navigate to the login page
    RedirectToLogin(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No session is held
    NotLoggedIn,
    /// The session could not be renewed and has been dropped
    Expired,
    Transport(TransportError),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::NotLoggedIn => write!(f, "Not logged in"),
            SessionError::Expired => write!(f, "Session expired"),
            SessionError::Transport(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<TransportError> for SessionError {
    fn from(e: TransportError) -> Self {
        SessionError::Transport(e)
    }
}

fn expiry_from_now(expires_in: u64) -> DateTime<Utc> {
    let secs = i64::try_from(expires_in).unwrap_or(i64::MAX);
    TimeDelta::try_seconds(secs)
        .and_then(|delta| Utc::now().checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

pub struct SessionContext<T: AuthTransport> {
    transport: T,
    session: RwLock<Option<Session>>,
    refresh_margin: Duration,
}

impl<T: AuthTransport> SessionContext<T> {
    pub fn new(transport: T) -> Self {
        Self::with_refresh_margin(transport, DEFAULT_REFRESH_MARGIN)
    }

    pub fn with_refresh_margin(transport: T, refresh_margin: Duration) -> Self {
        Self {
            transport,
            session: RwLock::new(None),
            refresh_margin,
        }
    }

    /// Copy of the current session, if any.
    pub fn session(&self) -> Option<Session> {
        self.session.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session().is_some()
    }

    fn set(&self, session: Option<Session>) {
        *self.session.write().unwrap_or_else(|e| e.into_inner()) = session;
    }

    /// Log in and hold the resulting session. A failed login leaves any
    /// existing session untouched.
    pub async fn login(&self, email: &str, password: &str) -> Result<SessionUser, SessionError> {
        let reply = self.transport.login(email, password).await?;
        let user = reply.user.clone();

        info!(user_id = %user.id, "Session started");
        self.set(Some(Session {
            token: reply.token,
            user: reply.user,
            expires_at: expiry_from_now(reply.expires_in),
        }));
        Ok(user)
    }

    /// End the session. The local session is dropped even if the server call
    /// fails.
    pub async fn logout(&self) -> SessionEvent {
        let token = self.session().map(|s| s.token);
        self.set(None);

        if let Err(e) = self.transport.logout(token.as_deref()).await {
            warn!(error = %e, "Logout request failed; local session cleared");
        }
        SessionEvent::RedirectToLogin(LOGIN_PAGE_PATH)
    }

    /// Exchange the held token for a fresh one.
    ///
    /// A rejection from the server drops the session. A network failure keeps
    /// it so the caller can retry. The reply is discarded if the session was
    /// ended or replaced while the request was in flight.
    pub async fn refresh(&self) -> Result<(), SessionError> {
        let Some(current) = self.session() else {
            return Err(SessionError::NotLoggedIn);
        };

        let result = self.transport.refresh(&current.token).await;

        let mut held = self.session.write().unwrap_or_else(|e| e.into_inner());
        if held.as_ref().map(|s| s.token.as_str()) != Some(current.token.as_str()) {
            debug!("Session changed during refresh; reply discarded");
            return match held.as_ref() {
                Some(_) => Ok(()),
                None => Err(SessionError::NotLoggedIn),
            };
        }

        match result {
            Ok(reply) => {
                debug!(user_id = %current.user.id, "Session refreshed");
                *held = Some(Session {
                    token: reply.token,
                    user: current.user,
                    expires_at: expiry_from_now(reply.expires_in),
                });
                Ok(())
            }
            Err(e @ TransportError::Network(_)) => {
                warn!(error = %e, "Session refresh failed; keeping session");
                Err(SessionError::Transport(e))
            }
            Err(e) => {
                warn!(error = %e, "Session refresh rejected");
                *held = None;
                Err(SessionError::Expired)
            }
        }
    }

    fn needs_refresh(&self, session: &Session) -> bool {
        let margin = TimeDelta::from_std(self.refresh_margin).unwrap_or(TimeDelta::MAX);
        session.expires_at.signed_duration_since(Utc::now()) <= margin
    }

    /// Token to attach to an API call, refreshed first if it is within the
    /// refresh margin of expiry.
    pub async fn authorized_token(&self) -> Result<String, SessionError> {
        let Some(session) = self.session() else {
            return Err(SessionError::NotLoggedIn);
        };

        if self.needs_refresh(&session) {
            self.refresh().await?;
            return self
                .session()
                .map(|s| s.token)
                .ok_or(SessionError::Expired);
        }
        Ok(session.token)
    }

    /// React to a 401 from the admin API: drop the session and go to login.
    pub fn handle_unauthorized(&self) -> SessionEvent {
        if self.session().is_some() {
            info!("Session rejected by server");
        }
        self.set(None);
        SessionEvent::RedirectToLogin(LOGIN_PAGE_PATH)
    }

    /// How long until the session enters its refresh margin. `None` when no
    /// session is held.
    fn time_until_refresh(&self) -> Option<Duration> {
        let session = self.session()?;
        let margin = TimeDelta::from_std(self.refresh_margin).unwrap_or(TimeDelta::MAX);
        let due = session
            .expires_at
            .checked_sub_signed(margin)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let wait = due
            .signed_duration_since(Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        Some(wait.max(MIN_SCHEDULER_WAIT))
    }

    /// Keep the session fresh in the background. The task ends when the
    /// session is gone, either by logout or by a rejected refresh. Network
    /// failures are retried.
    pub fn spawn_refresh_scheduler(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(wait) = self.time_until_refresh() {
                debug!("Next session refresh check in {} seconds", wait.as_secs());
                tokio::time::sleep(wait).await;

                if !self.session().is_some_and(|s| self.needs_refresh(&s)) {
                    continue;
                }
                match self.refresh().await {
                    Ok(()) => {}
                    Err(SessionError::Transport(_)) => {
                        tokio::time::sleep(NETWORK_RETRY_WAIT).await;
                    }
                    Err(_) => break,
                }
            }
            debug!("Session refresh scheduler stopped");
        })
    }
}
