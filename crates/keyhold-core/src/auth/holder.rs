//! Single owner of "who is logged in" for this process.
//!
//! `SessionHolder` mirrors the durable store into memory and broadcasts
//! every state change to its subscribers. External store changes (another
//! process logging in or out) come in through `on_storage_change`; local
//! changes broadcast right after the durable write.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::api::RequestContext;

use super::session::Session;
use super::store::KeyValueStore;

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type Listener = Box<dyn FnMut(&AuthEvent) + Send>;

/// What caused a broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthChange {
    LoggedIn,
    LoggedOut,
    /// The durable store changed underneath us
    Reloaded,
    /// Someone asked for a re-check; the data may be unchanged
    Refreshed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
    pub change: AuthChange,
    pub authenticated: bool,
    pub revision: u64,
    pub at: DateTime<Utc>,
}

pub struct SessionHolder {
    store: Box<dyn KeyValueStore>,
    session: Option<Session>,
    revision: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl SessionHolder {
    /// Create a holder over `store` and load whatever session it holds
    pub fn open(store: Box<dyn KeyValueStore>) -> Self {
        let mut holder = Self {
            store,
            session: None,
            revision: 0,
            listeners: Vec::new(),
            next_subscription: 0,
        };
        if let Err(e) = holder.load() {
            warn!(error = %e, "Failed to load session, starting logged out");
        }
        holder
    }

    /// Re-read the session from the store.
    ///
    /// Returns whether the held session changed. A store that cannot be read
    /// leaves the holder logged out and reports the error.
    pub fn load(&mut self) -> Result<bool> {
        let loaded = match Session::read_from(self.store.as_ref()) {
            Ok(loaded) => loaded,
            Err(e) => {
                let changed = self.session.take().is_some();
                return Err(e.context(if changed {
                    "Session dropped: store unreadable"
                } else {
                    "Store unreadable"
                }));
            }
        };

        let changed = loaded != self.session;
        debug!(authenticated = loaded.is_some(), changed, "Session loaded");
        self.session = loaded;
        Ok(changed)
    }

    /// Persist `session` and make it the active one.
    ///
    /// On a failed write the previous state is kept and nothing is broadcast.
    pub fn login(&mut self, session: Session) -> Result<()> {
        self.store
            .apply(&session.store_changes())
            .context("Failed to persist session")?;

        info!(user_id = %session.user_id, access = %session.access_level, "Session started");
        self.session = Some(session);
        self.broadcast(AuthChange::LoggedIn);
        Ok(())
    }

    /// Remove the session from the store and from memory.
    ///
    /// Memory is cleared and the change broadcast even if the store refuses
    /// the removal; that error is returned afterwards.
    pub fn logout(&mut self) -> Result<()> {
        let removed = self.store.apply(&Session::clear_changes());

        info!(had_session = self.session.is_some(), "Session ended");
        self.session = None;
        self.broadcast(AuthChange::LoggedOut);
        removed.context("Failed to remove session from store")
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Number of broadcasts so far
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Context for authenticated API calls, built from the current session
    pub fn request_context(&self) -> RequestContext {
        RequestContext::for_session(self.session.as_ref())
    }

    /// Handle a change of the durable store made elsewhere.
    /// Broadcasts only if the session actually changed.
    pub fn on_storage_change(&mut self) {
        self.reevaluate(AuthChange::Reloaded, false);
    }

    /// Re-check the store and broadcast regardless of the outcome
    pub fn request_refresh(&mut self) {
        self.reevaluate(AuthChange::Refreshed, true);
    }

    pub fn subscribe(&mut self, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Returns false if `id` was not subscribed
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    fn reevaluate(&mut self, change: AuthChange, always_broadcast: bool) {
        let was_authenticated = self.session.is_some();
        let changed = match self.load() {
            Ok(changed) => changed,
            Err(e) => {
                warn!(error = %e, "Session re-evaluation failed");
                was_authenticated
            }
        };
        if changed || always_broadcast {
            self.broadcast(change);
        }
    }

    fn broadcast(&mut self, change: AuthChange) {
        self.revision += 1;
        let event = AuthEvent {
            change,
            authenticated: self.session.is_some(),
            revision: self.revision,
            at: Utc::now(),
        };
        debug!(
            ?change,
            revision = self.revision,
            listeners = self.listeners.len(),
            "Broadcasting auth change"
        );
        for (_, listener) in self.listeners.iter_mut() {
            listener(&event);
        }
    }
}
