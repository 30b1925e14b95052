//! Auth context: the single owner of session state.
//!
//! Lifecycle: `start` subscribes to the backend's session changes, a listener task applies
//! each event (the only writer), and dropping the context aborts the listener. The rest of
//! the service sees the state through read accessors and the sign-in / sign-out actions.

pub mod extract;
pub mod handlers;
pub mod magic_link;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::backend::credentials::is_valid_code_format;
use crate::backend::{
    AuthBackend, AuthEvent, AuthSubscription, AuthUser, BackendError, Session, TableStore,
};
use crate::errors::AppError;
use crate::models::ProfileRow;
use crate::notify::Notifier;

/// How long a request waits for a pending profile lookup before proceeding without it.
const PROFILE_SETTLE: Duration = Duration::from_secs(2);
/// How long sign-in / sign-out wait for the listener to observe their own event.
const EVENT_SETTLE: Duration = Duration::from_secs(5);
/// How often expired sessions are dropped from the snapshot.
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    pub user: AuthUser,
    pub session: Session,
    pub profile: Option<ProfileRow>,
    #[serde(skip)]
    pub profile_resolved: bool,
}

impl SessionState {
    pub fn is_admin(&self) -> bool {
        self.profile.as_ref().is_some_and(ProfileRow::is_admin)
    }
}

#[derive(Debug, Clone)]
pub struct AuthSnapshot {
    pub loading: bool,
    sessions: HashMap<String, SessionState>,
}

impl AuthSnapshot {
    pub fn session(&self, access_token: &str) -> Option<&SessionState> {
        self.sessions.get(access_token)
    }

    pub fn live_sessions(&self) -> usize {
        self.sessions.len()
    }
}

pub struct AuthContext {
    state: watch::Receiver<AuthSnapshot>,
    backend: Arc<dyn AuthBackend>,
    notifier: Notifier,
    redirect_to: String,
    listener: JoinHandle<()>,
}

impl AuthContext {
    pub async fn start(
        backend: Arc<dyn AuthBackend>,
        store: Arc<dyn TableStore>,
        notifier: Notifier,
        redirect_to: String,
    ) -> Result<Self, BackendError> {
        let subscription = backend.subscribe().await?;
        let (tx, rx) = watch::channel(AuthSnapshot {
            loading: true,
            sessions: HashMap::new(),
        });
        let listener = tokio::spawn(listen(
            Arc::new(tx),
            Arc::clone(&backend),
            subscription,
            store,
        ));

        Ok(Self {
            state: rx,
            backend,
            notifier,
            redirect_to,
            listener,
        })
    }

    /// True until the initial session set has been processed.
    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// The live, unexpired session for `access_token`.
    pub fn session(&self, access_token: &str) -> Option<SessionState> {
        let now = Utc::now();
        self.state
            .borrow()
            .session(access_token)
            .filter(|s| !s.session.is_expired(now))
            .cloned()
    }

    pub fn user(&self, access_token: &str) -> Option<AuthUser> {
        self.session(access_token).map(|s| s.user)
    }

    pub fn profile(&self, access_token: &str) -> Option<ProfileRow> {
        self.session(access_token).and_then(|s| s.profile)
    }

    pub fn watch(&self) -> watch::Receiver<AuthSnapshot> {
        self.state.clone()
    }

    /// Like `session`, but first gives a pending profile lookup a moment to finish.
    pub async fn settled_session(&self, access_token: &str) -> Option<SessionState> {
        let mut rx = self.state.clone();
        let timed_out = tokio::time::timeout(
            PROFILE_SETTLE,
            rx.wait_for(|s| {
                s.session(access_token)
                    .map_or(true, |entry| entry.profile_resolved)
            }),
        )
        .await
        .is_err();
        if timed_out {
            debug!("Profile lookup still pending; continuing without a profile");
        }
        self.session(access_token)
    }

    /// Requests a one-time code / magic link email. Outcome is also notified.
    pub async fn sign_in_with_email(&self, email: &str) -> Result<(), AppError> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            self.notifier
                .failure(None, "Error", "Please enter a valid email address");
            return Err(AppError::Validation(
                "A valid email address is required".to_string(),
            ));
        }

        match self
            .backend
            .send_one_time_code(email, &self.redirect_to)
            .await
        {
            Ok(()) => {
                self.notifier.success(
                    None,
                    "Check your email",
                    "We sent you a magic link to sign in",
                );
                Ok(())
            }
            Err(e) => {
                self.notifier.failure(None, "Error", e.to_string());
                Err(e.into())
            }
        }
    }

    /// Exchanges an emailed code for a session and waits until the session is visible here.
    pub async fn complete_sign_in(&self, email: &str, code: &str) -> Result<SessionState, AppError> {
        let code = code.trim();
        if !is_valid_code_format(code) {
            return Err(AppError::Validation(
                "Sign-in code must be 6 digits".to_string(),
            ));
        }

        let session = match self.backend.verify_one_time_code(email, code).await {
            Ok(session) => session,
            Err(e) => {
                self.notifier.failure(None, "Error", e.to_string());
                return Err(e.into());
            }
        };

        let token = session.access_token.clone();
        let mut rx = self.state.clone();
        let observed = tokio::time::timeout(
            EVENT_SETTLE,
            rx.wait_for(|s| s.session(&token).is_some_and(|e| e.profile_resolved)),
        )
        .await
        .map(|r| r.is_ok())
        .unwrap_or(false);
        if !observed {
            return Err(AppError::Internal(anyhow!(
                "session for user {} was not observed by the auth listener",
                session.user.id
            )));
        }

        self.session(&token).ok_or(AppError::Unauthorized)
    }

    pub async fn sign_out(&self, access_token: &str) -> Result<(), AppError> {
        let recipient = self.user(access_token).map(|u| u.id);
        if let Err(e) = self.backend.sign_out(access_token).await {
            self.notifier.failure(recipient, "Error", e.to_string());
            return Err(e.into());
        }

        let mut rx = self.state.clone();
        let observed = tokio::time::timeout(
            EVENT_SETTLE,
            rx.wait_for(|s| s.session(access_token).is_none()),
        )
        .await
        .map(|r| r.is_ok())
        .unwrap_or(false);
        if !observed {
            warn!("Sign-out not yet observed by the auth listener");
        }

        self.notifier.success(
            recipient,
            "Signed out",
            "You have been signed out successfully",
        );
        Ok(())
    }
}

impl Drop for AuthContext {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

async fn listen(
    tx: Arc<watch::Sender<AuthSnapshot>>,
    backend: Arc<dyn AuthBackend>,
    subscription: AuthSubscription,
    store: Arc<dyn TableStore>,
) {
    let AuthSubscription {
        initial,
        mut events,
    } = subscription;

    let initial_count = initial.len();
    resync_sessions(&tx, &store, initial);
    tx.send_modify(|s| s.loading = false);
    info!("Auth context ready ({initial_count} live sessions)");

    let mut prune = tokio::time::interval(PRUNE_INTERVAL);
    prune.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut resync_pending = false;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(AuthEvent::SignedIn(session)) => apply_signed_in(&tx, &store, session),
                Ok(AuthEvent::SignedOut { access_token }) => {
                    tx.send_modify(|s| {
                        s.sessions.remove(&access_token);
                    });
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Auth listener lagged; {skipped} session events dropped, resynchronising");
                    resync_pending = !resubscribe(backend.as_ref(), &tx, &store, &mut events).await;
                }
                Err(RecvError::Closed) => {
                    debug!("Auth event stream closed");
                    break;
                }
            },
            _ = prune.tick() => {
                if resync_pending {
                    resync_pending = !resubscribe(backend.as_ref(), &tx, &store, &mut events).await;
                }
                let now = Utc::now();
                tx.send_if_modified(|s| prune_expired(&mut s.sessions, now) > 0);
            }
        }
    }
}

/// Swaps in a fresh subscription and reconciles against its live set. False when the
/// backend could not be reached; the old receiver is kept.
async fn resubscribe(
    backend: &dyn AuthBackend,
    tx: &Arc<watch::Sender<AuthSnapshot>>,
    store: &Arc<dyn TableStore>,
    events: &mut broadcast::Receiver<AuthEvent>,
) -> bool {
    match backend.subscribe().await {
        Ok(fresh) => {
            *events = fresh.events;
            resync_sessions(tx, store, fresh.initial);
            true
        }
        Err(e) => {
            warn!("Auth resync failed, retrying on next prune: {e}");
            false
        }
    }
}

/// Makes the session map match `live`: unknown tokens are dropped, tokens already held keep
/// their resolved profile, new ones go through the normal sign-in path.
fn resync_sessions(
    tx: &Arc<watch::Sender<AuthSnapshot>>,
    store: &Arc<dyn TableStore>,
    live: Vec<Session>,
) {
    let live_tokens: HashSet<String> = live.iter().map(|s| s.access_token.clone()).collect();
    let mut added = Vec::new();
    tx.send_modify(|s| {
        s.sessions.retain(|token, _| live_tokens.contains(token));
        added = live
            .into_iter()
            .filter(|session| !s.sessions.contains_key(&session.access_token))
            .collect();
    });
    for session in added {
        apply_signed_in(tx, store, session);
    }
}

/// Drops expired sessions; returns how many were removed.
fn prune_expired(sessions: &mut HashMap<String, SessionState>, now: DateTime<Utc>) -> usize {
    let before = sessions.len();
    sessions.retain(|_, entry| !entry.session.is_expired(now));
    before - sessions.len()
}

/// Records the session now and resolves its profile in a deferred lookup.
fn apply_signed_in(
    tx: &Arc<watch::Sender<AuthSnapshot>>,
    store: &Arc<dyn TableStore>,
    session: Session,
) {
    let token = session.access_token.clone();
    let user_id = session.user.id;
    tx.send_modify(|s| {
        s.sessions.insert(
            token.clone(),
            SessionState {
                user: session.user.clone(),
                session,
                profile: None,
                profile_resolved: false,
            },
        );
    });

    let tx = Arc::clone(tx);
    let store = Arc::clone(store);
    tokio::spawn(async move {
        let profile = match store.profile_by_user(user_id).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!("Profile lookup for user {user_id} failed: {e}");
                None
            }
        };
        tx.send_modify(|s| {
            // The session may have signed out while the lookup ran.
            if let Some(entry) = s.sessions.get_mut(&token) {
                entry.profile = profile;
                entry.profile_resolved = true;
            }
        });
    });
}
