mod posts;
mod sessions;
mod users;

pub use self::posts::MemoryPostRepository;
pub use self::sessions::MemorySessionStore;
pub use self::users::MemoryUserRepository;
