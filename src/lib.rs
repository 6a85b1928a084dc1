//! Account authentication and credential persistence for game launchers.
//!
//! Two identity providers are supported:
//!
//! * the legacy provider, where one request turns a username and password into a
//!   [`LegacySession`] ([`LegacyAuthenticator`]);
//! * the federated provider, where an OAuth authorization code is walked through
//!   device-cloud, security token, game entitlement and profile exchanges into a
//!   [`FederatedSession`] ([`FederatedAuthenticator`]).
//!
//! Sessions of both kinds are kept in a [`CredentialStore`], which persists every
//! change through a [`StoreBackend`] so users need not sign in again on the next
//! launch.
//!
//! ```no_run
//! use launcher_auth::{CredentialStore, FederatedAuthOptions, FederatedAuthenticator};
//!
//! # async fn run(code: &str) -> Result<(), Box<dyn std::error::Error>> {
//! let store = CredentialStore::open("users.json");
//! let options = FederatedAuthOptions::builder()
//!     .client_id("00000000-0000-0000-0000-000000000000")
//!     .redirect_uri("http://localhost:8000/callback")
//!     .build();
//! let authenticator = FederatedAuthenticator::with_http(options)?;
//!
//! let session = authenticator.authenticate(code).await?;
//! store.set_last_user(session.username.clone());
//! store.add_user(session);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod federated;
pub mod legacy;
pub mod option;
pub mod session;
pub mod storage;
pub mod store;
pub mod util;

pub use federated::{
    AuthFailure, AuthStage, ExchangeError, FederatedAuthenticator, FederatedTransport,
    HttpFederatedTransport,
};
pub use legacy::{HttpLegacyTransport, LegacyAuthError, LegacyAuthenticator, LegacyTransport};
pub use option::{FederatedAuthOptions, LegacyAuthOptions};
pub use session::{
    FederatedSession, GameProfile, LegacySession, ProviderKind, ProviderSession, merge,
};
pub use storage::{FileStorage, MemoryStorage, StorageError, StoreBackend};
pub use store::CredentialStore;
pub use util::cancel::{CancelHandle, CancelSignal};
