pub mod password;
pub mod session;
pub mod token;

pub use self::password::PasswordHasher;
pub use self::session::{Session, SessionError, SessionManager};
pub use self::token::{Claims, TokenCodec, TokenError};
