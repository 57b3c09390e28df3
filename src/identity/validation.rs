//! Client-side form checks run before any network call. Failures carry one
//! message per field so a caller can show them inline.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use super::role::Role;
use crate::error::{AppError, AppResult};

static IIN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{12}$").expect("static IIN pattern"));

pub const MSG_EMAIL_REQUIRED: &str = "Email is required";
pub const MSG_PASSWORD_REQUIRED: &str = "Password is required";
pub const MSG_FULL_NAME_REQUIRED: &str = "Full name is required";
pub const MSG_IIN_FORMAT: &str = "IIN must be 12 digits";
pub const MSG_ROLE_REQUIRED: &str = "Please select your role";

/// National ID: exactly twelve ASCII digits.
pub fn is_valid_iin(iin: &str) -> bool { IIN_RE.is_match(iin) }

#[derive(Debug, Clone, Default)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

impl SignInForm {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self { email: email.into(), password: password.into() }
    }

    pub fn validate(&self) -> AppResult<()> {
        let mut errs = BTreeMap::new();
        if self.email.trim().is_empty() {
            errs.insert("email".to_string(), MSG_EMAIL_REQUIRED.to_string());
        }
        if self.password.is_empty() {
            errs.insert("password".to_string(), MSG_PASSWORD_REQUIRED.to_string());
        }
        finish(errs)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignUpForm {
    pub full_name: String,
    pub email: String,
    pub password: String,
    /// Optional; when present it must pass `is_valid_iin`.
    pub iin: Option<String>,
    pub role: Option<Role>,
}

impl SignUpForm {
    pub fn validate(&self) -> AppResult<()> {
        let mut errs = BTreeMap::new();
        if self.full_name.trim().is_empty() {
            errs.insert("fullName".to_string(), MSG_FULL_NAME_REQUIRED.to_string());
        }
        if self.email.trim().is_empty() {
            errs.insert("email".to_string(), MSG_EMAIL_REQUIRED.to_string());
        }
        if self.password.is_empty() {
            errs.insert("password".to_string(), MSG_PASSWORD_REQUIRED.to_string());
        }
        if let Some(iin) = self.iin_value() {
            if !is_valid_iin(iin) {
                errs.insert("iin".to_string(), MSG_IIN_FORMAT.to_string());
            }
        }
        if !self.role.map(|r| r.is_selectable()).unwrap_or(false) {
            errs.insert("role".to_string(), MSG_ROLE_REQUIRED.to_string());
        }
        finish(errs)
    }

    /// Trimmed IIN, `None` when blank.
    pub fn iin_value(&self) -> Option<&str> { self.iin.as_deref().map(str::trim).filter(|s| !s.is_empty()) }
}

fn finish(errs: BTreeMap<String, String>) -> AppResult<()> {
    if errs.is_empty() { Ok(()) } else { Err(AppError::validation(errs)) }
}
