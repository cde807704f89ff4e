use serde::Deserialize;
use std::num::NonZeroU64;

use crate::util::Sensitive;

#[derive(Debug, Deserialize)]
pub struct Auth {
    /// Secret used to sign session tokens.
    ///
    /// It must be between 12 and 1024 characters long.
    ///
    /// **Environment variables**:
    /// - `AGORA_AUTH_JWT_SECRET`
    pub jwt_secret: Sensitive<String>,
    /// How long a session stays valid after logging in or registering.
    ///
    /// **Environment variables**:
    /// - `AGORA_AUTH_SESSION_TTL_SECS`
    #[serde(default = "Auth::default_session_ttl_secs")]
    pub session_ttl_secs: NonZeroU64,
    #[serde(default)]
    pub password: Password,
}

impl Auth {
    pub const JWT_SECRET_MIN_LEN: usize = 12;
    pub const JWT_SECRET_MAX_LEN: usize = 1024;

    // 10 years
    pub const MAX_SESSION_TTL_SECS: u64 = 315_360_000;
    const DEFAULT_SESSION_TTL_SECS: u64 = 7 * 24 * 60 * 60;

    const fn default_session_ttl_secs() -> NonZeroU64 {
        match NonZeroU64::new(Self::DEFAULT_SESSION_TTL_SECS) {
            Some(n) => n,
            None => panic!("DEFAULT_SESSION_TTL_SECS is accidentally set to 0"),
        }
    }

    #[must_use]
    pub fn session_ttl(&self) -> chrono::Duration {
        let secs = self.session_ttl_secs.get().min(Self::MAX_SESSION_TTL_SECS);
        chrono::Duration::seconds(i64::try_from(secs).unwrap_or_default())
    }
}

/// Argon2id cost parameters for hashing passwords.
///
/// **Environment variables**:
/// - `AGORA_AUTH_PASSWORD_MEMORY_KIB`
/// - `AGORA_AUTH_PASSWORD_ITERATIONS`
/// - `AGORA_AUTH_PASSWORD_PARALLELISM`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Password {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for Password {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}
