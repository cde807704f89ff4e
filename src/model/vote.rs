use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::id::{marker::UserMarker, Id};

#[derive(Debug, Error)]
#[error("vote value must be either 1 or -1 (got {0})")]
pub struct InvalidVoteValue(pub i64);

/// Direction of a single user's vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum VoteValue {
    Up,
    Down,
}

impl VoteValue {
    #[must_use]
    pub const fn get(self) -> i64 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
        }
    }
}

impl From<VoteValue> for i8 {
    fn from(value: VoteValue) -> Self {
        match value {
            VoteValue::Up => 1,
            VoteValue::Down => -1,
        }
    }
}

impl From<VoteValue> for i16 {
    fn from(value: VoteValue) -> Self {
        i8::from(value).into()
    }
}

impl TryFrom<i8> for VoteValue {
    type Error = InvalidVoteValue;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        Self::try_from(i16::from(value))
    }
}

impl TryFrom<i16> for VoteValue {
    type Error = InvalidVoteValue;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Up),
            -1 => Ok(Self::Down),
            n => Err(InvalidVoteValue(n.into())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Vote {
    #[serde(rename = "user")]
    pub user_id: Id<UserMarker>,
    #[serde(rename = "vote")]
    pub value: VoteValue,
}

/// What a user asks the ledger to do with their vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteAction {
    Upvote,
    Downvote,
    Unvote,
}

/// Describes the mutation [`Ledger::apply`] performed, so storage backends
/// only have to write the affected vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerChange {
    Unchanged,
    Inserted(Vote),
    /// The user's vote flipped to the opposite value (holds the new vote).
    Changed(Vote),
    /// The user's vote was taken back (holds the removed vote).
    Removed(Vote),
}

#[derive(Debug, Error)]
#[error("user {0} has more than one vote in the ledger")]
pub struct DuplicateVote(pub Id<UserMarker>);

/// Collection of votes of a post, at most one per user.
///
/// The score is maintained incrementally and always equals the sum of
/// all vote values. The upvote percentage is recomputed after every
/// mutation that affects either the score or the amount of votes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ledger {
    votes: Vec<Vote>,
    score: i64,
    upvote_percentage: i64,
}

impl Ledger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger of a freshly created post where the author
    /// automatically upvotes their own post.
    #[must_use]
    pub fn with_author(author: Id<UserMarker>) -> Self {
        let mut ledger = Self::new();
        ledger.upvote(author);
        ledger
    }

    /// Rebuilds a ledger out of previously stored votes.
    pub fn from_votes(votes: impl IntoIterator<Item = Vote>) -> Result<Self, DuplicateVote> {
        let mut ledger = Self::new();
        for vote in votes {
            if ledger.position(vote.user_id).is_some() {
                return Err(DuplicateVote(vote.user_id));
            }
            ledger.score += vote.value.get();
            ledger.votes.push(vote);
        }
        ledger.sync_upvote_percentage();
        Ok(ledger)
    }

    pub fn apply(&mut self, user_id: Id<UserMarker>, action: VoteAction) -> LedgerChange {
        match action {
            VoteAction::Upvote => self.set(user_id, VoteValue::Up),
            VoteAction::Downvote => self.set(user_id, VoteValue::Down),
            VoteAction::Unvote => self.remove(user_id),
        }
    }

    pub fn upvote(&mut self, user_id: Id<UserMarker>) -> LedgerChange {
        self.apply(user_id, VoteAction::Upvote)
    }

    pub fn downvote(&mut self, user_id: Id<UserMarker>) -> LedgerChange {
        self.apply(user_id, VoteAction::Downvote)
    }

    pub fn unvote(&mut self, user_id: Id<UserMarker>) -> LedgerChange {
        self.apply(user_id, VoteAction::Unvote)
    }

    fn set(&mut self, user_id: Id<UserMarker>, desired: VoteValue) -> LedgerChange {
        let change = match self.position(user_id) {
            None => {
                let vote = Vote {
                    user_id,
                    value: desired,
                };
                self.votes.push(vote);
                self.score += desired.get();
                LedgerChange::Inserted(vote)
            }
            Some(index) => {
                let vote = &mut self.votes[index];
                if vote.value == desired {
                    return LedgerChange::Unchanged;
                }
                self.score += desired.get() - vote.value.get();
                vote.value = desired;
                LedgerChange::Changed(*vote)
            }
        };
        self.sync_upvote_percentage();
        change
    }

    fn remove(&mut self, user_id: Id<UserMarker>) -> LedgerChange {
        let Some(index) = self.position(user_id) else {
            return LedgerChange::Unchanged;
        };

        // order of votes does not matter
        let vote = self.votes.swap_remove(index);
        self.score -= vote.value.get();
        self.sync_upvote_percentage();
        LedgerChange::Removed(vote)
    }

    fn position(&self, user_id: Id<UserMarker>) -> Option<usize> {
        self.votes.iter().position(|v| v.user_id == user_id)
    }

    fn sync_upvote_percentage(&mut self) {
        let count = self.count();
        self.upvote_percentage = if count == 0 {
            0
        } else {
            self.upvotes() * 100 / count
        };
    }

    #[must_use]
    pub fn votes(&self) -> &[Vote] {
        &self.votes
    }

    #[must_use]
    pub fn vote_of(&self, user_id: Id<UserMarker>) -> Option<VoteValue> {
        self.position(user_id).map(|index| self.votes[index].value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.votes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    #[must_use]
    pub fn score(&self) -> i64 {
        self.score
    }

    /// Since `score = upvotes - downvotes` and `count = upvotes + downvotes`,
    /// the amount of upvotes is exactly `(score + count) / 2`.
    #[must_use]
    pub fn upvotes(&self) -> i64 {
        (self.score + self.count()) / 2
    }

    #[must_use]
    pub fn upvote_percentage(&self) -> i64 {
        self.upvote_percentage
    }

    fn count(&self) -> i64 {
        i64::try_from(self.votes.len()).unwrap_or(i64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(n: u64) -> Id<UserMarker> {
        Id::new(n)
    }

    #[track_caller]
    fn assert_consistent(ledger: &Ledger) {
        let sum: i64 = ledger.votes().iter().map(|v| v.value.get()).sum();
        assert_eq!(ledger.score(), sum);

        let count = i64::try_from(ledger.len()).unwrap();
        assert!((0..=count).contains(&ledger.upvotes()));

        let mut users = ledger.votes().iter().map(|v| v.user_id).collect::<Vec<_>>();
        users.sort();
        users.dedup();
        assert_eq!(users.len(), ledger.len());
    }

    #[test]
    fn author_starts_with_an_upvote() {
        let ledger = Ledger::with_author(user(1));
        assert_eq!(
            ledger.votes(),
            &[Vote {
                user_id: user(1),
                value: VoteValue::Up
            }]
        );
        assert_eq!(ledger.score(), 1);
        assert_eq!(ledger.upvote_percentage(), 100);
    }

    #[test]
    fn upvote_is_idempotent() {
        let mut once = Ledger::with_author(user(1));
        assert!(matches!(once.upvote(user(2)), LedgerChange::Inserted(..)));

        let mut twice = once.clone();
        assert_eq!(twice.upvote(user(2)), LedgerChange::Unchanged);
        assert_eq!(once, twice);

        assert_eq!(once.downvote(user(3)), twice.downvote(user(3)));
        assert_eq!(twice.downvote(user(3)), LedgerChange::Unchanged);
        assert_eq!(once, twice);
    }

    #[test]
    fn opposite_vote_moves_score_by_two() {
        let mut ledger = Ledger::with_author(user(1));
        ledger.downvote(user(2));
        assert_eq!(ledger.score(), 0);
        assert_eq!(ledger.len(), 2);

        let change = ledger.upvote(user(2));
        assert_eq!(
            change,
            LedgerChange::Changed(Vote {
                user_id: user(2),
                value: VoteValue::Up
            })
        );
        assert_eq!(ledger.score(), 2);
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.upvote_percentage(), 100);

        ledger.downvote(user(2));
        assert_eq!(ledger.score(), 0);
        assert_eq!(ledger.upvote_percentage(), 50);
    }

    #[test]
    fn second_unvote_is_a_noop() {
        let mut ledger = Ledger::with_author(user(1));
        ledger.downvote(user(2));

        assert!(matches!(ledger.unvote(user(2)), LedgerChange::Removed(..)));
        let snapshot = ledger.clone();

        assert_eq!(ledger.unvote(user(2)), LedgerChange::Unchanged);
        assert_eq!(ledger, snapshot);
        assert_eq!(ledger.score(), 1);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn unvoting_the_only_vote_empties_the_ledger() {
        let mut ledger = Ledger::with_author(user(1));
        ledger.unvote(user(1));

        assert!(ledger.is_empty());
        assert_eq!(ledger.score(), 0);
        assert_eq!(ledger.upvote_percentage(), 0);
    }

    #[test]
    fn percentage_follows_score_and_count() {
        let mut ledger = Ledger::new();
        ledger.upvote(user(1));
        ledger.upvote(user(2));
        ledger.upvote(user(3));
        ledger.downvote(user(4));

        assert_eq!(ledger.score(), 2);
        assert_eq!(ledger.len(), 4);
        assert_eq!(ledger.upvotes(), 3);
        assert_eq!(ledger.upvote_percentage(), 75);

        ledger.downvote(user(5));
        ledger.downvote(user(6));
        // 3 of 6
        assert_eq!(ledger.upvote_percentage(), 50);

        ledger.downvote(user(7));
        // 3 of 7 rounds down
        assert_eq!(ledger.upvote_percentage(), 42);
    }

    #[test]
    fn invariants_hold_for_mixed_sequences() {
        let actions = [VoteAction::Upvote, VoteAction::Downvote, VoteAction::Unvote];
        let mut ledger = Ledger::with_author(user(1));

        // deterministic pseudo-random walk over users and actions
        let mut seed = 0x2545_f491_u64;
        for _ in 0..2_000 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;

            let who = user(seed % 25 + 1);
            let action = actions[usize::try_from(seed % 3).unwrap()];
            let before = ledger.clone();
            let change = ledger.apply(who, action);

            match change {
                LedgerChange::Unchanged => assert_eq!(before, ledger),
                LedgerChange::Inserted(vote) => {
                    assert_eq!(ledger.len(), before.len() + 1);
                    assert_eq!(ledger.score(), before.score() + vote.value.get());
                }
                LedgerChange::Changed(vote) => {
                    assert_eq!(ledger.len(), before.len());
                    assert_eq!((ledger.score() - before.score()).abs(), 2);
                    assert_eq!(ledger.vote_of(who), Some(vote.value));
                }
                LedgerChange::Removed(vote) => {
                    assert_eq!(ledger.len() + 1, before.len());
                    assert_eq!(ledger.score(), before.score() - vote.value.get());
                    assert_eq!(ledger.vote_of(who), None);
                }
            }
            assert_consistent(&ledger);
        }
    }

    #[test]
    fn rebuilding_recomputes_score() {
        let votes = [
            Vote {
                user_id: user(1),
                value: VoteValue::Up,
            },
            Vote {
                user_id: user(2),
                value: VoteValue::Down,
            },
            Vote {
                user_id: user(3),
                value: VoteValue::Up,
            },
        ];
        let ledger = Ledger::from_votes(votes).unwrap();
        assert_eq!(ledger.score(), 1);
        assert_eq!(ledger.upvote_percentage(), 66);

        let duplicated = [votes[0], votes[1], votes[0]];
        assert!(Ledger::from_votes(duplicated).is_err());
    }

    #[test]
    fn serializes_votes_as_plain_numbers() {
        let ledger = Ledger::with_author(user(42));
        let json = serde_json::to_value(&ledger).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "votes": [{ "user": "42", "vote": 1 }],
                "score": 1,
                "upvotePercentage": 100,
            })
        );

        let vote: Vote = serde_json::from_str(r#"{"user":"7","vote":-1}"#).unwrap();
        assert_eq!(vote.value, VoteValue::Down);
        assert!(serde_json::from_str::<Vote>(r#"{"user":"7","vote":2}"#).is_err());
    }
}
