pub mod refresh_tokens;
pub mod users;

pub use refresh_tokens::RefreshTokensDao;
pub use users::UsersDao;
