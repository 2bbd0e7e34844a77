//! Membership role lifecycle and household consistency engine.
//!
//! Roles are time-bounded affiliations of a person with a section. This
//! crate validates role sets, answers membership questions, keeps family
//! households consistent, and plans the lifecycle operations (switch, join,
//! terminate, undo, promote) as atomic change sets.
//!
//! It is deliberately free of database dependencies; storage backends
//! implement [`store::RoleStore`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod config;
pub mod error;
pub mod household;
pub mod membership;
pub mod notify;
pub mod operations;
pub mod person;
pub mod role;
pub mod snapshot;
pub mod store;
pub mod validation;

pub use error::{Error, Result};

#[cfg(test)]
mod tests;
