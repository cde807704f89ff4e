//! Operations performed on behalf of a caller, anonymous or
//! holding a [`Session`](crate::auth::Session).
pub mod posts;
pub mod users;
