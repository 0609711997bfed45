pub mod authenticator;
pub mod cache;
pub mod models;
pub mod retry;
pub mod tokens;

pub use authenticator::TokenAuthenticator;
pub use cache::AuthCache;
pub use tokens::TokenLifecycleManager;
