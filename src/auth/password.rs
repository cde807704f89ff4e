use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher as _, PasswordVerifier};
use error_stack::{Result, ResultExt};
use thiserror::Error;
use tokio::task::spawn_blocking;

use crate::config;

#[derive(Debug, Error)]
#[error("Invalid password hashing parameters")]
pub struct InvalidHashParams;

#[derive(Debug, Error)]
#[error("Failed to generate password hash")]
pub struct HashPasswordError;

#[derive(Debug, Error)]
#[error("Failed to verify password")]
pub struct VerifyPasswordError;

/// Argon2id password hashing, performed outside of the async runtime
/// since it is deliberately slow.
#[derive(Clone)]
pub struct PasswordHasher {
    context: Argon2<'static>,
    params: argon2::Params,
}

impl PasswordHasher {
    pub fn new(cfg: &config::Password) -> Result<Self, InvalidHashParams> {
        let params = argon2::Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .change_context(InvalidHashParams)
            .attach_printable_lazy(|| format!("using {cfg:?}"))?;

        Ok(Self {
            context: Argon2::new(
                argon2::Algorithm::Argon2id,
                argon2::Version::V0x13,
                params.clone(),
            ),
            params,
        })
    }

    /// Produces a PHC formatted hash with a random salt.
    pub async fn hash(&self, password: &str) -> Result<String, HashPasswordError> {
        let context = self.context.clone();
        let password = password.to_owned();

        spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            context
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
        })
        .await
        .change_context(HashPasswordError)?
        .change_context(HashPasswordError)
    }

    pub async fn verify(&self, password: &str, hash: &str) -> Result<bool, VerifyPasswordError> {
        let context = self.context.clone();
        let password = password.to_owned();
        let hash = hash.to_owned();

        spawn_blocking(move || {
            let hash = PasswordHash::new(&hash)
                .change_context(VerifyPasswordError)
                .attach_printable("could not parse password hash")?;

            match context.verify_password(password.as_bytes(), &hash) {
                Ok(..) => Ok(true),
                Err(argon2::password_hash::Error::Password) => Ok(false),
                Err(error) => Err(error).change_context(VerifyPasswordError),
            }
        })
        .await
        .change_context(VerifyPasswordError)?
    }
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}
