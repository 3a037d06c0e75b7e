//! User record and its field rules
//!
//! The struct doubles as the JSON wire shape. Missing JSON fields
//! deserialize to empty values so they are reported as "required"
//! validation failures instead of parse errors.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{ValidationError, ValidationErrors};
use crate::db::Row;
use crate::error::DbResult;

/// Maximum length for user_name, first_name, last_name and department
pub const MAX_NAME_LEN: usize = 50;

/// Maximum length for email
pub const MAX_EMAIL_LEN: usize = 100;

/// Table holding users
pub const USERS_TABLE: &str = "users";

/// Columns written on insert and update, in table order after `user_id`
pub const WRITABLE_COLUMNS: [&str; 6] = [
    "user_name",
    "first_name",
    "last_name",
    "email",
    "user_status",
    "department",
];

/// Email syntax, as used by HTML `input type=email`, with a dotted domain
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
    )
    .expect("invalid email regex")
});

/// Employment status, stored as a one-letter code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStatus {
    Active,
    Inactive,
    Terminated,
}

impl UserStatus {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Active => "A",
            Self::Inactive => "I",
            Self::Terminated => "T",
        }
    }
}

impl FromStr for UserStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(Self::Active),
            "I" => Ok(Self::Inactive),
            "T" => Ok(Self::Terminated),
            other => Err(ValidationError::InvalidVariant {
                field: "user_status",
                value: other.to_owned(),
            }),
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A user of the directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    /// Assigned by the database on insert
    pub user_id: i64,
    pub user_name: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// One of "A", "I", "T"
    pub user_status: String,
    pub department: String,
}

fn check_text(errs: &mut ValidationErrors, field: &'static str, value: &str, max: usize) -> bool {
    if value.is_empty() {
        errs.push(ValidationError::Empty { field });
        return false;
    }
    if value.chars().count() > max {
        errs.push(ValidationError::TooLong { field, max });
        return false;
    }
    true
}

impl User {
    /// Check every field rule, collecting all failures.
    ///
    /// # Rules
    /// - every text field is required
    /// - names and department: max 50 characters
    /// - email: max 100 characters, valid syntax
    /// - user_status: one of A, I, T
    ///
    /// # Example
    /// ```
    /// use userbase_server::models::User;
    ///
    /// let user = User {
    ///     user_name: "alice".into(),
    ///     first_name: "A".into(),
    ///     last_name: "B".into(),
    ///     email: "a@b.com".into(),
    ///     user_status: "A".into(),
    ///     department: "Eng".into(),
    ///     ..User::default()
    /// };
    /// assert!(user.validate().is_ok());
    /// ```
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errs = ValidationErrors::new();

        check_text(&mut errs, "user_name", &self.user_name, MAX_NAME_LEN);
        check_text(&mut errs, "first_name", &self.first_name, MAX_NAME_LEN);
        check_text(&mut errs, "last_name", &self.last_name, MAX_NAME_LEN);
        if check_text(&mut errs, "email", &self.email, MAX_EMAIL_LEN)
            && !EMAIL_RE.is_match(&self.email)
        {
            errs.push(ValidationError::InvalidFormat {
                field: "email",
                reason: "must be a valid email address",
            });
        }
        if self.user_status.is_empty() {
            errs.push(ValidationError::Empty {
                field: "user_status",
            });
        } else if let Err(err) = self.user_status.parse::<UserStatus>() {
            errs.push(err);
        }
        check_text(&mut errs, "department", &self.department, MAX_NAME_LEN);

        errs.into_result()
    }

    /// Parsed status, if the stored code is valid
    pub fn status(&self) -> Option<UserStatus> {
        self.user_status.parse().ok()
    }

    /// Decode a `SELECT *` row (table column order)
    pub fn from_row(row: &Row) -> DbResult<Self> {
        Ok(Self {
            user_id: row.get_i64(0)?,
            user_name: row.get_str(1)?.to_owned(),
            first_name: row.get_str(2)?.to_owned(),
            last_name: row.get_str(3)?.to_owned(),
            email: row.get_str(4)?.to_owned(),
            user_status: row.get_str(5)?.to_owned(),
            department: row.get_str(6)?.to_owned(),
        })
    }
}
