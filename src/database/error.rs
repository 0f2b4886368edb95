use std::{
    collections::BTreeMap,
    fmt::{self, Display},
};

use serde::Serialize;
use serde_json::json;
use warp::{
    http::StatusCode,
    reject::{Reject, Rejection},
    reply::Response,
    Reply,
};

/// Error categories surfaced by the API, each bound to one status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidRequest,
    InvalidSession,
    NotFound,
    MethodNotAllowed,
    InternalServerError,
}

impl ErrorKind {
    pub fn code(&self) -> u16 {
        match self {
            ErrorKind::InvalidRequest => 400,
            ErrorKind::InvalidSession => 401,
            ErrorKind::NotFound => 404,
            ErrorKind::MethodNotAllowed => 405,
            ErrorKind::InternalServerError => 500,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "Invalid request.",
            ErrorKind::InvalidSession => "Authentication credentials were not provided.",
            ErrorKind::NotFound => "Not found.",
            ErrorKind::MethodNotAllowed => "Method not allowed.",
            ErrorKind::InternalServerError => "Internal server error.",
        }
    }

    pub fn new(self, info: &str) -> Error {
        Error {
            code: self.code(),
            info: Some(info.to_string()),
            fields: None,
        }
    }

    pub fn default(self) -> Error {
        self.new(self.message())
    }
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: u16,
    pub info: Option<String>,
    pub fields: Option<FieldErrors>,
}

impl Error {
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Field errors serialize as `{field: [messages]}`, everything else as `{detail}`.
    pub fn body(&self) -> serde_json::Value {
        match &self.fields {
            Some(fields) => json!(fields),
            None => json!({ "detail": self.info.as_deref().unwrap_or_default() }),
        }
    }

    pub fn into_response(self) -> Response {
        warp::reply::with_status(warp::reply::json(&self.body()), self.status()).into_response()
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code, self.info.as_deref().unwrap_or("-"))
    }
}

impl std::error::Error for Error {}
impl Reject for Error {}

/// Per-field validation messages, keyed by payload field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub const NON_FIELD: &'static str = "non_field_errors";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: &str) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(|messages| messages.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<FieldErrors> for Error {
    fn from(value: FieldErrors) -> Self {
        Error {
            code: ErrorKind::InvalidRequest.code(),
            info: Some(String::from("Validation failed")),
            fields: Some(value),
        }
    }
}

const EMAIL_CONSTRAINT: &str = "users_email_key";

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("{0}")]
    Sqlx(sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("user with this email already exists")]
    DuplicateEmail,
    #[error("store lock poisoned")]
    Poisoned,
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Database(e) if e.constraint() == Some(EMAIL_CONSTRAINT) => {
                Self::DuplicateEmail
            }
            other => Self::Sqlx(other),
        }
    }
}

impl From<QueryError> for Error {
    fn from(value: QueryError) -> Self {
        match value {
            QueryError::DuplicateEmail => {
                FieldErrors::single("email", "user with this email already exists.").into()
            }
            other => {
                log::error!("Store failure: {other}");
                ErrorKind::InternalServerError.default()
            }
        }
    }
}

impl From<QueryError> for Rejection {
    fn from(value: QueryError) -> Self {
        Error::from(value).into()
    }
}

#[derive(Debug)]
pub struct TypeError {
    info: String,
}

impl TypeError {
    pub fn new(info: &str) -> Self {
        Self {
            info: info.to_string(),
        }
    }
}

impl From<TypeError> for Error {
    fn from(value: TypeError) -> Self {
        ErrorKind::InvalidRequest.new(&value.info)
    }
}

impl From<TypeError> for Rejection {
    fn from(value: TypeError) -> Self {
        Error::from(value).into()
    }
}

impl Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.info)
    }
}

impl std::error::Error for TypeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_errors_render_as_message_lists() {
        let mut errors = FieldErrors::new();
        errors.add("email", "This field may not be blank.");
        errors.add("email", "Enter a valid email address.");
        errors.add("password", "This field is required.");

        let error: Error = errors.into();
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            error.body(),
            json!({
                "email": ["This field may not be blank.", "Enter a valid email address."],
                "password": ["This field is required."],
            })
        );
    }

    #[test]
    fn plain_errors_render_as_detail() {
        let error = ErrorKind::NotFound.default();
        assert_eq!(error.status(), StatusCode::NOT_FOUND);
        assert_eq!(error.body(), json!({ "detail": "Not found." }));
    }

    #[test]
    fn duplicate_email_is_a_validation_error() {
        let error = Error::from(QueryError::DuplicateEmail);
        assert_eq!(error.code, 400);
        assert!(error.fields.unwrap().get("email").is_some());
    }

    #[test]
    fn errors_survive_rejection() {
        let rejection: Rejection = ErrorKind::NotFound.default().into();
        let recovered = rejection.find::<Error>().unwrap();
        assert_eq!(recovered.code, 404);

        let rejection = Rejection::from(QueryError::DuplicateEmail);
        assert_eq!(rejection.find::<Error>().unwrap().code, 400);
    }

    #[test]
    fn store_failures_hide_details() {
        let error = Error::from(QueryError::Poisoned);
        assert_eq!(error.code, 500);
        assert_eq!(error.body(), json!({ "detail": "Internal server error." }));
    }
}
