pub mod oauth;
pub mod pkce;
pub mod storage;
pub mod token;
pub mod token_manager;

pub use oauth::OAuthClient;
pub use pkce::{PkceChallenge, PkceStateStore};
pub use storage::TokenFileStore;
pub use token::{Token, TokenKind};
pub use token_manager::{RefreshFailurePolicy, TokenManager};
