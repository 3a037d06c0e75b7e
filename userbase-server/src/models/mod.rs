//! Domain models with validation
//!
//! Payloads are validated explicitly with [`User::validate`]; invalid
//! input returns `ValidationErrors`, never a panic.

pub mod user;
pub mod validation;

pub use user::{User, UserStatus, MAX_EMAIL_LEN, MAX_NAME_LEN};
pub use validation::{ValidationError, ValidationErrors};
