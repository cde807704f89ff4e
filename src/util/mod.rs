pub mod figment;
pub mod fingerprint;
pub mod sensitive;
pub mod snowflake;

pub use self::fingerprint::fingerprint;
pub use self::sensitive::Sensitive;
pub use self::snowflake::Snowflake;
