mod posts;
mod sessions;
mod users;

pub use self::posts::PgPostRepository;
pub use self::sessions::PgSessionStore;
pub use self::users::PgUserRepository;

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use super::PgUserRepository;
    use crate::auth::password::tests::cheap_hasher;
    use crate::model::User;
    use crate::storage::UserRepository;
    use crate::types::form::Credentials;
    use crate::util::Snowflake;

    pub(crate) fn users(pool: &sqlx::PgPool) -> PgUserRepository {
        let snowflake = Arc::new(Snowflake::new(0).unwrap());
        PgUserRepository::new(pool.clone().into(), cheap_hasher(), snowflake)
    }

    pub(crate) async fn register(users: &PgUserRepository, username: &str) -> User {
        users
            .register(&Credentials::new(username, "wonderland"))
            .await
            .unwrap()
    }
}
