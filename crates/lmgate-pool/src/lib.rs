mod credential;
mod pool;
mod refresh;
mod store;

pub use credential::{Credential, CredentialState, UnavailableReason};
pub use pool::{CredentialPool, Lease, Outcome, PoolError};
pub use refresh::{RefreshError, RefreshedToken, TokenRefresher, REFRESH_SKEW};
pub use store::{CredentialStore, StoreError};
