pub mod comment;
pub mod post;
pub mod user;
pub mod vote;

pub use self::comment::Comment;
pub use self::post::{Post, PostContent, PostError, PostKind};
pub use self::user::{User, UserError, UserSnapshot};
pub use self::vote::{Ledger, LedgerChange, Vote, VoteAction, VoteValue};
