use lazy_static::lazy_static;
use regex::Regex;
use serde::{de, Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;
use validator::{Validate, ValidationError};

use crate::error::AppError;
use crate::users::repo_types::User;

lazy_static! {
    // Usernames end up as a path segment in /search/userid/:username.
    static ref USERNAME_RE: Regex = Regex::new(r"^[^\s/]+$").unwrap();
}

fn validate_username(username: &str) -> Result<(), ValidationError> {
    if USERNAME_RE.is_match(username) {
        Ok(())
    } else {
        let mut err = ValidationError::new("username_charset");
        err.message = Some("Username must not contain whitespace or '/'".into());
        Err(err)
    }
}

/// Request body for user registration.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[serde(deserialize_with = "trimmed")]
    #[validate(
        length(min = 3, max = 50, message = "Username must be 3-50 characters"),
        custom(function = "validate_username")
    )]
    pub username: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 50, message = "First name is required"))]
    pub firstname: String,
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 50, message = "Last name is required"))]
    pub lastname: String,
    #[serde(deserialize_with = "number")]
    #[validate(range(min = 0.0, message = "Salary must be a non-negative number"))]
    pub salary: f64,
    #[serde(deserialize_with = "integer")]
    #[validate(range(min = 0, max = 150, message = "Age must be between 0 and 150"))]
    pub age: i64,
}

/// Request body for sign-in.
#[derive(Debug, Deserialize, Validate)]
pub struct SignInRequest {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// `?firstname=&lastname=` (also accepted as `first` / `last`).
#[derive(Debug, Default, Deserialize)]
pub struct NameQuery {
    #[serde(alias = "first")]
    pub firstname: Option<String>,
    #[serde(alias = "last")]
    pub lastname: Option<String>,
}

/// `?min=&max=`, kept as text so that absence and bad numbers get distinct errors.
#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub min: Option<String>,
    pub max: Option<String>,
}

impl RangeQuery {
    pub fn salary_bounds(&self) -> Result<(f64, f64), AppError> {
        let parse = |name: &str, raw: &str| {
            raw.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| AppError::invalid(name, format!("{name} salary must be a number")))
        };
        let (min, max) = self.required()?;
        Ok((parse("min", min)?, parse("max", max)?))
    }

    pub fn age_bounds(&self) -> Result<(i32, i32), AppError> {
        let parse = |name: &str, raw: &str| {
            raw.parse::<i32>()
                .map_err(|_| AppError::invalid(name, format!("{name} age must be an integer")))
        };
        let (min, max) = self.required()?;
        Ok((parse("min", min)?, parse("max", max)?))
    }

    fn required(&self) -> Result<(&str, &str), AppError> {
        Ok((
            required_param(&self.min, "min")?,
            required_param(&self.max, "max")?,
        ))
    }
}

fn required_param<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, AppError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::MissingParameter(name.to_string()))
}

/// Response to register and sign-in.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: &'static str,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct UserList {
    pub users: Vec<User>,
    pub count: usize,
}

impl From<Vec<User>> for UserList {
    fn from(users: Vec<User>) -> Self {
        Self {
            count: users.len(),
            users,
        }
    }
}

/// Search relative to a reference user's registration time.
#[derive(Debug, Serialize)]
pub struct ReferencedUserList {
    #[serde(flatten)]
    pub list: UserList,
    #[serde(rename = "refRegisteredOn", with = "time::serde::rfc3339")]
    pub ref_registered_on: OffsetDateTime,
}

/// Search over one calendar day.
#[derive(Debug, Serialize)]
pub struct DatedUserList {
    #[serde(flatten)]
    pub list: UserList,
    /// `YYYY-MM-DD` in the configured day-boundary offset.
    pub date: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

fn trimmed<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    String::deserialize(d).map(|s| s.trim().to_string())
}

/// HTML forms post numbers as strings; accept both.
#[derive(Deserialize)]
#[serde(untagged)]
enum Numeric {
    Int(i64),
    Float(f64),
    Text(String),
}

fn number<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let v = match Numeric::deserialize(d)? {
        Numeric::Int(i) => i as f64,
        Numeric::Float(f) => f,
        Numeric::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| de::Error::custom(format!("expected a number, got {s:?}")))?,
    };
    if !v.is_finite() {
        return Err(de::Error::custom("expected a finite number"));
    }
    Ok(v)
}

fn integer<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    match Numeric::deserialize(d)? {
        Numeric::Int(i) => Ok(i),
        Numeric::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
        Numeric::Float(f) => Err(de::Error::custom(format!("expected an integer, got {f}"))),
        Numeric::Text(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| de::Error::custom(format!("expected an integer, got {s:?}"))),
    }
}
