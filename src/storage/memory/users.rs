use async_trait::async_trait;
use error_stack::{Report, Result, ResultExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::auth::PasswordHasher;
use crate::model::{User, UserError};
use crate::storage::UserRepository;
use crate::types::form::Credentials;
use crate::types::id::{marker::UserMarker, Id};
use crate::util::Snowflake;

/// Users keyed by their username.
#[derive(Debug)]
pub struct MemoryUserRepository {
    users: RwLock<HashMap<String, User>>,
    hasher: PasswordHasher,
    snowflake: Arc<Snowflake>,
}

impl MemoryUserRepository {
    #[must_use]
    pub fn new(hasher: PasswordHasher, snowflake: Arc<Snowflake>) -> Self {
        Self {
            users: RwLock::default(),
            hasher,
            snowflake,
        }
    }
}

fn already_exists(username: &str) -> Report<UserError> {
    Report::new(UserError::AlreadyExists).attach_printable(format!("username {username:?} is taken"))
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    #[tracing::instrument(skip_all, fields(username = %credentials.username), name = "memory.users.register")]
    async fn register(&self, credentials: &Credentials) -> Result<User, UserError> {
        if self.users.read().await.contains_key(&credentials.username) {
            return Err(already_exists(&credentials.username));
        }

        let password_hash = self
            .hasher
            .hash(credentials.password.as_str())
            .await
            .change_context(UserError::Internal)?;

        // someone may have taken the name while hashing
        let mut users = self.users.write().await;
        if users.contains_key(&credentials.username) {
            return Err(already_exists(&credentials.username));
        }

        let user = User {
            id: self.snowflake.next_id(),
            username: credentials.username.clone(),
            password_hash: password_hash.into(),
        };
        users.insert(user.username.clone(), user.clone());
        Ok(user)
    }

    #[tracing::instrument(skip_all, fields(username = %credentials.username), name = "memory.users.authorize")]
    async fn authorize(&self, credentials: &Credentials) -> Result<User, UserError> {
        let user = self
            .users
            .read()
            .await
            .get(&credentials.username)
            .cloned()
            .ok_or_else(|| Report::new(UserError::NoSuchUser))?;

        let matched = self
            .hasher
            .verify(credentials.password.as_str(), user.password_hash.as_str())
            .await
            .change_context(UserError::Internal)?;

        if matched {
            Ok(user)
        } else {
            Err(Report::new(UserError::BadCredentials))
        }
    }

    #[tracing::instrument(skip(self), name = "memory.users.by_id")]
    async fn by_id(&self, id: Id<UserMarker>) -> Result<User, UserError> {
        let users = self.users.read().await;
        users
            .values()
            .find(|u| u.id == id)
            .cloned()
            .ok_or_else(|| Report::new(UserError::NoSuchUser).attach_printable(format!("user {id} does not exist")))
    }
}
