pub mod refresh_tokens;
pub mod users;

pub use refresh_tokens::Entity as RefreshTokens;
pub use users::Entity as Users;

// Type aliases
pub type RefreshTokenRecord = refresh_tokens::Model;
pub type RevokeReason = refresh_tokens::RevokeReason;
pub type UserRecord = users::Model;
