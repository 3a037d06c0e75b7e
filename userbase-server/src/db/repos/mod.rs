//! Repository implementations for database access
//!
//! Repositories borrow a [`DbContext`](super::DbContext), build their SQL
//! through its shared statement builder and run it on its handle.

pub mod users;

pub use users::UserRepo;
