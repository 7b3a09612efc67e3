//! Public form submissions: admission requests and contact messages.
//!
//! Requests are deserialized loosely, then validated into trimmed domain
//! values that both the primary store and the fallback store accept.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

const MAX_NAME_LEN: usize = 100;
const MAX_EMAIL_LEN: usize = 254;
const MAX_SHORT_TEXT_LEN: usize = 200;
const MAX_MESSAGE_LEN: usize = 2000;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9 ()\-.]{7,20}$").expect("valid phone regex"));

/// Basic syntactic email check.
pub fn is_valid_email(email: &str) -> bool {
    email.len() <= MAX_EMAIL_LEN && EMAIL_RE.is_match(email)
}

/// Field-level validation failure, rendered as a 400 message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError(pub String);

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ValidationError {}

fn required(field: &str, value: Option<&str>, max: usize) -> Result<String, ValidationError> {
    let value = value.map(str::trim).unwrap_or("");
    if value.is_empty() {
        return Err(ValidationError(format!("{} is required", field)));
    }
    if value.chars().count() > max {
        return Err(ValidationError(format!(
            "{} cannot be longer than {} characters",
            field, max
        )));
    }
    Ok(value.to_string())
}

fn optional(field: &str, value: Option<&str>, max: usize) -> Result<Option<String>, ValidationError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => required(field, Some(v), max).map(Some),
    }
}

fn email(value: Option<&str>) -> Result<String, ValidationError> {
    let value = required("Email", value, MAX_EMAIL_LEN)?.to_lowercase();
    if !is_valid_email(&value) {
        return Err(ValidationError("Email address is invalid".to_string()));
    }
    Ok(value)
}

fn phone(value: String) -> Result<String, ValidationError> {
    if !PHONE_RE.is_match(&value) {
        return Err(ValidationError("Phone number is invalid".to_string()));
    }
    Ok(value)
}

/// Raw admission form body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    pub student_name: Option<String>,
    pub parent_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub age: Option<u8>,
    pub program: Option<String>,
    pub experience: Option<String>,
    pub message: Option<String>,
}

/// A validated admission request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Admission {
    pub student_name: String,
    pub parent_name: Option<String>,
    pub email: String,
    pub phone: String,
    pub age: Option<u8>,
    pub program: String,
    pub experience: Option<String>,
    pub message: Option<String>,
}

impl AdmissionRequest {
    pub fn validate(self) -> Result<Admission, ValidationError> {
        if let Some(age) = self.age {
            if !(3..=99).contains(&age) {
                return Err(ValidationError("Age must be between 3 and 99".to_string()));
            }
        }

        Ok(Admission {
            student_name: required("Student name", self.student_name.as_deref(), MAX_NAME_LEN)?,
            parent_name: optional("Parent name", self.parent_name.as_deref(), MAX_NAME_LEN)?,
            email: email(self.email.as_deref())?,
            phone: phone(required("Phone", self.phone.as_deref(), MAX_SHORT_TEXT_LEN)?)?,
            age: self.age,
            program: required("Program", self.program.as_deref(), MAX_SHORT_TEXT_LEN)?,
            experience: optional("Experience", self.experience.as_deref(), MAX_SHORT_TEXT_LEN)?,
            message: optional("Message", self.message.as_deref(), MAX_MESSAGE_LEN)?,
        })
    }
}

/// Raw contact form body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
}

/// A validated contact message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: Option<String>,
    pub message: String,
}

impl ContactRequest {
    pub fn validate(self) -> Result<Contact, ValidationError> {
        let phone_number = optional("Phone", self.phone.as_deref(), MAX_SHORT_TEXT_LEN)?
            .map(phone)
            .transpose()?;

        Ok(Contact {
            name: required("Name", self.name.as_deref(), MAX_NAME_LEN)?,
            email: email(self.email.as_deref())?,
            phone: phone_number,
            subject: optional("Subject", self.subject.as_deref(), MAX_SHORT_TEXT_LEN)?,
            message: required("Message", self.message.as_deref(), MAX_MESSAGE_LEN)?,
        })
    }
}
