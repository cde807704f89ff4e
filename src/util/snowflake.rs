use chrono::{DateTime, TimeZone, Utc};
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

use crate::types::id::{marker::Marker, Id};

// Agora epoch starts at January 1, 2024 at 00:00:00 UTC
const EPOCH: i64 = 1_704_067_200_000;

const WORKER_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;

pub const MAX_WORKER_ID: u16 = (1 << WORKER_BITS) - 1;

#[derive(Debug, Error)]
#[error("snowflake worker id must be within 0..={MAX_WORKER_ID}")]
pub struct InvalidWorkerId;

/// Process-local snowflake generator.
///
/// Layout (most significant bit first): 41 bits of milliseconds since
/// the agora epoch, 10 bits of worker id and 12 bits of sequence.
#[derive(Debug)]
pub struct Snowflake {
    worker: u64,
    // elapsed milliseconds shifted by `SEQUENCE_BITS`, or-ed with the sequence
    state: AtomicU64,
}

impl Snowflake {
    pub fn new(worker_id: u16) -> Result<Self, InvalidWorkerId> {
        if worker_id > MAX_WORKER_ID {
            return Err(InvalidWorkerId);
        }
        Ok(Self {
            worker: u64::from(worker_id),
            state: AtomicU64::new(0),
        })
    }

    /// Generates a new unique snowflake ID.
    ///
    /// IDs coming from the same generator are strictly increasing. If the
    /// sequence of the current millisecond is exhausted, the generator moves
    /// on to the next millisecond instead of waiting for it.
    pub fn next_id<M: Marker>(&self) -> Id<M> {
        let now = elapsed_millis();
        let mut current = self.state.load(Ordering::Relaxed);
        loop {
            let next = if (current >> SEQUENCE_BITS) < now {
                now << SEQUENCE_BITS
            } else {
                current + 1
            };

            match self
                .state
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(..) => return Id::from_nonzero(self.compose(next)),
                Err(actual) => current = actual,
            }
        }
    }

    fn compose(&self, state: u64) -> NonZeroU64 {
        let millis = state >> SEQUENCE_BITS;
        let sequence = state & SEQUENCE_MASK;
        let raw = (millis << (WORKER_BITS + SEQUENCE_BITS)) | (self.worker << SEQUENCE_BITS) | sequence;

        // `elapsed_millis` never returns 0 so `raw` is always nonzero
        NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN)
    }
}

pub(crate) fn timestamp_of(id: NonZeroU64) -> DateTime<Utc> {
    let millis = id.get() >> (WORKER_BITS + SEQUENCE_BITS);
    let millis = i64::try_from(millis).unwrap_or_default();
    Utc.timestamp_millis_opt(EPOCH + millis)
        .single()
        .unwrap_or_default()
}

fn elapsed_millis() -> u64 {
    let elapsed = Utc::now().timestamp_millis() - EPOCH;
    u64::try_from(elapsed).unwrap_or_default().max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::id::marker::{AnyMarker, PostMarker};
    use std::collections::HashSet;

    #[test]
    fn rejects_out_of_range_worker_ids() {
        assert!(Snowflake::new(MAX_WORKER_ID).is_ok());
        assert!(Snowflake::new(MAX_WORKER_ID + 1).is_err());
    }

    #[test]
    fn ids_are_strictly_increasing() {
        let snowflake = Snowflake::new(3).unwrap();
        let mut last = snowflake.next_id::<AnyMarker>();
        for _ in 0..10_000 {
            let next = snowflake.next_id::<AnyMarker>();
            assert!(next > last, "{next:?} must be greater than {last:?}");
            last = next;
        }
    }

    #[test]
    fn ids_are_unique_across_threads() {
        let snowflake = std::sync::Arc::new(Snowflake::new(0).unwrap());
        let handles = (0..4)
            .map(|_| {
                let snowflake = snowflake.clone();
                std::thread::spawn(move || {
                    (0..2_000)
                        .map(|_| snowflake.next_id::<PostMarker>())
                        .collect::<Vec<_>>()
                })
            })
            .collect::<Vec<_>>();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicated id {id:?}");
            }
        }
        assert_eq!(seen.len(), 8_000);
    }

    #[test]
    fn encodes_worker_and_creation_time() {
        let before = Utc::now();
        let snowflake = Snowflake::new(7).unwrap();
        let id = snowflake.next_id::<AnyMarker>();

        assert_eq!((id.get() >> SEQUENCE_BITS) & u64::from(MAX_WORKER_ID), 7);

        // snowflakes only keep millisecond precision
        let created_at = id.created_at();
        assert!(created_at >= before - chrono::Duration::milliseconds(1));
        assert!(created_at <= Utc::now() + chrono::Duration::seconds(1));
    }
}
