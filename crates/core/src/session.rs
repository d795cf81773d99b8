//! The signed-in session: token, user and permissions as one value
//!
//! [`SessionState`] holds the current [`Session`] behind an atomic pointer.
//! Writers build a complete triple and swap it in, so a reader sees either the
//! old triple or the new one and never a mix. Reads take no lock; writers
//! are serialized so a conditional write acts on the token it checked.

use crate::access::PermissionSet;
use crate::errors::Result;
use crate::store::{PERMISSIONS_KEY, SESSION_KEYS, SessionStore, TOKEN_KEY, USER_INFO_KEY};
use crate::token::AccessToken;
use crate::types::SessionUser;
use arc_swap::ArcSwapOption;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Token, user and permissions, always replaced together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: AccessToken,
    pub user: SessionUser,
    pub permissions: PermissionSet,
}

impl Session {
    pub const fn new(token: AccessToken, user: SessionUser, permissions: PermissionSet) -> Self {
        Self {
            token,
            user,
            permissions,
        }
    }
}

/// Current session plus the store it is persisted to
pub struct SessionState {
    current: ArcSwapOption<Session>,
    store: Arc<dyn SessionStore>,
    writer: Mutex<()>,
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("current", &self.current.load_full())
            .finish_non_exhaustive()
    }
}

impl SessionState {
    /// Start without a session
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            current: ArcSwapOption::empty(),
            store,
            writer: Mutex::new(()),
        }
    }

    /// Load whatever session the store holds
    ///
    /// A token without user info or permissions still restores, with empty
    /// defaults. Unreadable user info or permissions discard the whole session.
    pub fn restore(store: Arc<dyn SessionStore>) -> Result<Self> {
        let state = Self::new(store);

        let Some(raw_token) = state.store.get(TOKEN_KEY)?.filter(|t| !t.is_empty()) else {
            return Ok(state);
        };

        let user = state.store.get(USER_INFO_KEY)?;
        let permissions = state.store.get(PERMISSIONS_KEY)?;
        let decoded = user
            .map(|raw| serde_json::from_str::<SessionUser>(&raw))
            .transpose()
            .and_then(|user| {
                permissions
                    .map(|raw| serde_json::from_str::<PermissionSet>(&raw))
                    .transpose()
                    .map(|permissions| (user, permissions))
            });

        match decoded {
            Ok((user, permissions)) => {
                let session = Session::new(
                    AccessToken::new(raw_token),
                    user.unwrap_or_default(),
                    permissions.unwrap_or_default(),
                );
                debug!(user = %session.user.username, "Restored session from store");
                state.current.store(Some(Arc::new(session)));
            }
            Err(error) => {
                warn!(%error, "Stored session is unreadable, discarding it");
                state.store.remove_many(&SESSION_KEYS)?;
            }
        }

        Ok(state)
    }

    /// Snapshot of the current session
    pub fn current(&self) -> Option<Arc<Session>> {
        self.current.load_full()
    }

    pub fn token(&self) -> Option<AccessToken> {
        self.current.load().as_ref().map(|s| s.token.clone())
    }

    pub fn user(&self) -> Option<SessionUser> {
        self.current.load().as_ref().map(|s| s.user.clone())
    }

    pub fn permissions(&self) -> PermissionSet {
        self.current
            .load()
            .as_ref()
            .map(|s| s.permissions.clone())
            .unwrap_or_default()
    }

    pub fn is_active(&self) -> bool {
        self.current.load().is_some()
    }

    /// Replace the whole triple
    ///
    /// The in-memory session is swapped before it is persisted; a persistence
    /// failure is returned after the swap.
    pub fn establish(&self, session: Session) -> Result<Arc<Session>> {
        let _writer = self.write_lock();
        self.install(session)
    }

    /// Replace the whole triple only while `expected` is the current token
    ///
    /// Returns `Ok(false)` and changes nothing when the session was cleared
    /// or replaced in the meantime. An error means the swap happened but the
    /// store could not be written.
    pub fn replace_if_token(&self, expected: &AccessToken, session: Session) -> Result<bool> {
        let _writer = self.write_lock();
        if !self.holds_token(expected) {
            return Ok(false);
        }
        self.install(session)?;
        Ok(true)
    }

    /// Replace user and permissions, keeping the current token
    ///
    /// Returns `Ok(None)` when there is no session to update.
    pub fn update_profile(
        &self,
        user: SessionUser,
        permissions: PermissionSet,
    ) -> Result<Option<Arc<Session>>> {
        let _writer = self.write_lock();
        let Some(current) = self.current.load_full() else {
            return Ok(None);
        };

        let session = Arc::new(Session::new(current.token.clone(), user, permissions));
        self.current.store(Some(Arc::clone(&session)));
        self.persist(&session)?;
        Ok(Some(session))
    }

    /// Drop the session from memory and from the store
    pub fn clear(&self) -> Result<()> {
        let _writer = self.write_lock();
        self.remove_all()
    }

    /// Drop the session only while `expected` is the current token
    ///
    /// Returns `Ok(false)` and changes nothing when another session took its
    /// place. An error means memory was cleared but the store was not.
    pub fn clear_if_token(&self, expected: &AccessToken) -> Result<bool> {
        let _writer = self.write_lock();
        if !self.holds_token(expected) {
            return Ok(false);
        }
        self.remove_all()?;
        Ok(true)
    }

    fn write_lock(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn holds_token(&self, expected: &AccessToken) -> bool {
        self.current
            .load()
            .as_ref()
            .is_some_and(|s| &s.token == expected)
    }

    fn install(&self, session: Session) -> Result<Arc<Session>> {
        let session = Arc::new(session);
        self.current.store(Some(Arc::clone(&session)));
        info!(user = %session.user.username, "Session established");
        self.persist(&session)?;
        Ok(session)
    }

    fn remove_all(&self) -> Result<()> {
        if self.current.swap(None).is_some() {
            info!("Session cleared");
        }
        self.store.remove_many(&SESSION_KEYS)
    }

    fn persist(&self, session: &Session) -> Result<()> {
        self.store.set_many(&[
            (TOKEN_KEY, session.token.as_str().to_string()),
            (USER_INFO_KEY, serde_json::to_string(&session.user)?),
            (PERMISSIONS_KEY, serde_json::to_string(&session.permissions)?),
        ])
    }
}
