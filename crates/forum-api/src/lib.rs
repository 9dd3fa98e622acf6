pub mod auth;
pub mod credentials;
pub mod error;
pub mod extract;
pub mod identity;
pub mod ledger;
pub mod middleware;
pub mod routes;
pub mod sessions;
pub mod votes;

pub use credentials::CredentialStore;
pub use error::ForumError;
pub use identity::IdentityResolver;
pub use ledger::VoteLedger;
pub use sessions::SessionManager;
