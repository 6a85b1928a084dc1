//! The persistent multi-provider credential store.

use crate::{
    session::{self, FederatedSession, LegacySession, ProviderSession},
    storage::{FileStorage, StorageError, StoreBackend},
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashSet},
    fmt,
    path::PathBuf,
};
#[cfg(feature = "tracing")]
use tracing::{debug, error, warn};
use uuid::Uuid;

/// The persisted form of a [`CredentialStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreState {
    #[serde(default = "new_client_token")]
    client_token: String,
    #[serde(default)]
    saved_users: BTreeMap<String, LegacySession>,
    #[serde(default)]
    saved_live_users: BTreeMap<String, FederatedSession>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_user: Option<String>,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            client_token: new_client_token(),
            saved_users: BTreeMap::new(),
            saved_live_users: BTreeMap::new(),
            last_user: None,
        }
    }
}

fn new_client_token() -> String {
    Uuid::new_v4().to_string()
}

struct StoreInner {
    state: StoreState,
    backend: Box<dyn StoreBackend>,
}

impl StoreInner {
    /// Writes the whole state to the backend. Failures are logged and swallowed;
    /// the in-memory state stays authoritative.
    fn persist(&mut self) {
        let result = serde_json::to_vec_pretty(&self.state)
            .map_err(StorageError::from)
            .and_then(|bytes| self.backend.write(&bytes));
        if let Err(_e) = result {
            #[cfg(feature = "tracing")]
            error!(
                location = %self.backend.location(),
                "failed to persist credential store: {}",
                _e
            );
        }
    }
}

/// Saved accounts of both providers under one client token.
///
/// Every mutation persists the entire store before returning. Mutations and the
/// write that follows them happen under one lock, so concurrent callers never
/// interleave partial states on disk.
pub struct CredentialStore {
    inner: Mutex<StoreInner>,
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CredentialStore")
            .field("location", &inner.backend.location())
            .field("saved_users", &inner.state.saved_users.len())
            .field("saved_live_users", &inner.state.saved_live_users.len())
            .field("last_user", &inner.state.last_user)
            .finish()
    }
}

impl CredentialStore {
    /// Creates an empty store with a fresh client token. Nothing is written until
    /// the first mutation or [`save`](Self::save).
    pub fn new<B>(backend: B) -> Self
    where
        B: Into<Box<dyn StoreBackend>>,
    {
        Self::from_parts(StoreState::default(), backend.into())
    }

    /// Loads a store from `backend`.
    ///
    /// This never fails: if the backend is empty, unreadable or holds malformed
    /// content, a fresh store bound to the same backend is returned and a warning
    /// is logged.
    pub fn load<B>(backend: B) -> Self
    where
        B: Into<Box<dyn StoreBackend>>,
    {
        let mut backend = backend.into();
        let state = match backend.read() {
            Ok(Some(bytes)) => match serde_json::from_slice::<StoreState>(&bytes) {
                Ok(state) => state,
                Err(_e) => {
                    #[cfg(feature = "tracing")]
                    warn!(
                        location = %backend.location(),
                        "credential store is malformed, starting fresh: {}",
                        _e
                    );
                    StoreState::default()
                }
            },
            Ok(None) => {
                #[cfg(feature = "tracing")]
                warn!(
                    location = %backend.location(),
                    "no saved credential store, starting fresh"
                );
                StoreState::default()
            }
            Err(_e) => {
                #[cfg(feature = "tracing")]
                warn!(
                    location = %backend.location(),
                    "credential store could not be read, starting fresh: {}",
                    _e
                );
                StoreState::default()
            }
        };
        Self::from_parts(state, backend)
    }

    /// Loads a store kept in the JSON file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::load(FileStorage::new(path))
    }

    fn from_parts(state: StoreState, backend: Box<dyn StoreBackend>) -> Self {
        Self {
            inner: Mutex::new(StoreInner { state, backend }),
        }
    }

    /// Writes the current state to the backend. Failures are logged, not returned.
    pub fn save(&self) {
        self.inner.lock().persist();
    }

    /// Adds or updates a saved account, then persists.
    ///
    /// A legacy session replacing one with the same username is [merged](session::merge)
    /// with it first. A federated session replaces its predecessor outright.
    pub fn add_user<S>(&self, account: S)
    where
        S: Into<ProviderSession>,
    {
        let mut inner = self.inner.lock();
        match account.into() {
            ProviderSession::Legacy(new) => {
                let merged = match inner.state.saved_users.get(&new.username) {
                    Some(old) => session::merge(new, old),
                    None => new,
                };
                #[cfg(feature = "tracing")]
                debug!(username = %merged.username, "saving legacy account");
                inner
                    .state
                    .saved_users
                    .insert(merged.username.clone(), merged);
            }
            ProviderSession::Federated(new) => {
                #[cfg(feature = "tracing")]
                debug!(username = %new.username, "saving federated account");
                inner
                    .state
                    .saved_live_users
                    .insert(new.username.clone(), new);
            }
        }
        inner.persist();
    }

    /// Removes `username` from both provider namespaces, then persists. Removing an
    /// unknown username is not an error.
    pub fn remove_user(&self, username: &str) {
        let mut inner = self.inner.lock();
        inner.state.saved_users.remove(username);
        inner.state.saved_live_users.remove(username);
        inner.persist();
    }

    /// Looks up a saved account, preferring the legacy namespace.
    pub fn user(&self, username: &str) -> Option<ProviderSession> {
        let inner = self.inner.lock();
        if let Some(session) = inner.state.saved_users.get(username) {
            return Some(session.clone().into());
        }
        inner
            .state
            .saved_live_users
            .get(username)
            .cloned()
            .map(ProviderSession::from)
    }

    /// Usernames across both namespaces. A name saved under both providers appears
    /// once.
    pub fn usernames(&self) -> HashSet<String> {
        let inner = self.inner.lock();
        inner
            .state
            .saved_users
            .keys()
            .chain(inner.state.saved_live_users.keys())
            .cloned()
            .collect()
    }

    /// Every saved account, one per username.
    ///
    /// When a username exists in both namespaces only the legacy session is
    /// returned, matching [`user`](Self::user).
    pub fn saved_users(&self) -> HashSet<ProviderSession> {
        let inner = self.inner.lock();
        let legacy = inner
            .state
            .saved_users
            .values()
            .cloned()
            .map(ProviderSession::from);
        let federated = inner
            .state
            .saved_live_users
            .iter()
            .filter(|(username, _)| !inner.state.saved_users.contains_key(*username))
            .map(|(_, session)| ProviderSession::from(session.clone()));
        legacy.chain(federated).collect()
    }

    /// The client token every legacy session of this store is bound to.
    pub fn client_token(&self) -> String {
        self.inner.lock().state.client_token.clone()
    }

    /// Records the most recently used account, then persists. The username is not
    /// required to be saved.
    pub fn set_last_user(&self, username: impl Into<String>) {
        let mut inner = self.inner.lock();
        inner.state.last_user = Some(username.into());
        inner.persist();
    }

    pub fn last_user(&self) -> Option<String> {
        self.inner.lock().state.last_user.clone()
    }

    /// Where the store is persisted, for diagnostics.
    pub fn location(&self) -> String {
        self.inner.lock().backend.location()
    }
}
