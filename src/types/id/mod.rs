use chrono::{DateTime, Utc};
use serde::de::{Error as DeError, Unexpected};
use serde::Deserialize;
use std::{
    cmp::Ordering,
    fmt::{Debug, Display},
    hash::{Hash, Hasher},
    marker::PhantomData,
    num::NonZeroU64,
};

use self::marker::Marker;
use crate::util::snowflake;

pub mod marker;

/// A snowflake identifier tagged with the kind of entity it refers to.
///
/// The marker only exists at the type level, so an `Id<PostMarker>` cannot
/// be passed where an `Id<UserMarker>` is expected. Comparison and hashing
/// only look at the numeric value and never require anything of the marker.
pub struct Id<T: Marker> {
    value: NonZeroU64,
    phantom: PhantomData<T>,
}

impl<T: Marker> Id<T> {
    /// # Panics
    ///
    /// It will panic if the value is 0.
    #[must_use]
    #[track_caller]
    pub const fn new(n: u64) -> Self {
        match Self::new_checked(n) {
            Some(id) => id,
            None => panic!("snowflake ids cannot be zero"),
        }
    }

    #[must_use]
    pub const fn from_nonzero(value: NonZeroU64) -> Self {
        Self {
            value,
            phantom: PhantomData,
        }
    }

    #[must_use]
    pub const fn new_checked(n: u64) -> Option<Self> {
        match NonZeroU64::new(n) {
            Some(value) => Some(Self::from_nonzero(value)),
            None => None,
        }
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.value.get()
    }

    /// Reinterprets the id as one of another entity kind.
    #[must_use]
    pub const fn cast<M: Marker>(self) -> Id<M> {
        Id::from_nonzero(self.value)
    }

    /// Instant encoded in the snowflake when the ID was generated.
    #[must_use]
    pub fn created_at(self) -> DateTime<Utc> {
        snowflake::timestamp_of(self.value)
    }

    fn from_signed(raw: i64) -> Option<Self> {
        u64::try_from(raw).ok().and_then(Self::new_checked)
    }
}

impl<T: Marker> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Marker> Copy for Id<T> {}

impl<T: Marker> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: Marker> Eq for Id<T> {}

impl<T: Marker> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Marker> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl<T: Marker> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T: Marker> Debug for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // markers live in a sealed module, the last path segment is enough
        let full = std::any::type_name::<T>();
        let marker = full.rsplit("::").next().unwrap_or(full);
        write!(f, "Id::<{marker}>({})", self.value)
    }
}

impl<T: Marker> Display for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.value, f)
    }
}

const EXPECTED: &str = "a positive snowflake id";

/// Wire forms accepted for an id. JavaScript clients cannot hold
/// every u64, so ids are written out as strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Unsigned(u64),
    Signed(i64),
    Text(String),
}

impl<'de, T: Marker> serde::Deserialize<'de> for Id<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        match RawId::deserialize(deserializer)? {
            RawId::Unsigned(n) => Self::new_checked(n)
                .ok_or_else(|| DeError::invalid_value(Unexpected::Unsigned(n), &EXPECTED)),
            RawId::Signed(n) => Self::from_signed(n)
                .ok_or_else(|| DeError::invalid_value(Unexpected::Signed(n), &EXPECTED)),
            RawId::Text(text) => text
                .parse()
                .ok()
                .and_then(Self::new_checked)
                .ok_or_else(|| DeError::invalid_value(Unexpected::Str(&text), &EXPECTED)),
        }
    }
}

impl<T: Marker> serde::Serialize for Id<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

// Postgres has no unsigned bigint. Snowflakes never use the sign bit,
// so they are stored as plain `BIGINT`s.
impl<'q, T: Marker> sqlx::Encode<'q, sqlx::Postgres> for Id<T> {
    fn encode_by_ref(
        &self,
        buf: &mut <sqlx::Postgres as sqlx::database::HasArguments<'q>>::ArgumentBuffer,
    ) -> sqlx::encode::IsNull {
        match i64::try_from(self.get()) {
            Ok(raw) => <i64 as sqlx::Encode<'q, sqlx::Postgres>>::encode_by_ref(&raw, buf),
            Err(..) => sqlx::encode::IsNull::Yes,
        }
    }
}

impl<'r, T: Marker> sqlx::Decode<'r, sqlx::Postgres> for Id<T> {
    fn decode(
        value: <sqlx::Postgres as sqlx::database::HasValueRef<'r>>::ValueRef,
    ) -> Result<Self, sqlx::error::BoxDynError> {
        let raw = <i64 as sqlx::Decode<'r, sqlx::Postgres>>::decode(value)?;
        let id = Self::from_signed(raw).ok_or_else(|| format!("stored id {raw} is not positive"))?;
        Ok(id)
    }
}

impl<T: Marker> sqlx::Type<sqlx::Postgres> for Id<T> {
    fn type_info() -> <sqlx::Postgres as sqlx::Database>::TypeInfo {
        <i64 as sqlx::Type<sqlx::Postgres>>::type_info()
    }
}

impl<T: Marker> sqlx::postgres::PgHasArrayType for Id<T> {
    fn array_type_info() -> sqlx::postgres::PgTypeInfo {
        <i64 as sqlx::postgres::PgHasArrayType>::array_type_info()
    }
}
