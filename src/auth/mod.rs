//! Bearer token authentication and scope enforcement.

pub mod clock;
pub mod error;
pub mod models;
pub mod password;
pub mod principal;
pub mod repo;
pub mod scope;
pub mod service;
pub mod state;
pub mod store;
pub mod token;

#[cfg(test)]
pub(crate) mod test_support;

pub use clock::{Clock, SystemClock};
pub use error::{AuthError, StoreError};
pub use models::{NewUser, User, UserChanges, WriteOutcome};
pub use principal::AuthenticatedUser;
pub use scope::{Capability, Scope};
pub use service::{Authenticator, IssueRequest};
pub use state::{AuthConfig, AuthState};
