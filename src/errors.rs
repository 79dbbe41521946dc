use serde_json::{json, Value};
use thiserror::Error;

/// Errors raised while loading, validating or evaluating feature definitions.
///
/// Every variant carries the HTTP status an admin API would answer with, so a
/// server embedding the evaluator can map errors straight onto responses.
#[derive(Debug, Error)]
pub enum EvalError {
    // Input that is well-formed JSON but semantically wrong (400)
    #[error("{0}")]
    BadData(String),

    // Caller is not authenticated (401)
    #[error("{0}")]
    AuthenticationRequired(String),

    // Caller lacks a permission (403)
    #[error("{0}")]
    PermissionDenied(String),

    // The requested change is not allowed in the current state (403)
    #[error("{0}")]
    OperationDenied(String),

    // The operation can never be performed on this object (403)
    #[error("{0}")]
    InvalidOperation(String),

    // Referenced feature, segment or strategy does not exist (404)
    #[error("{0}")]
    NotFound(String),

    // A name is already taken (409)
    #[error("{0}")]
    NameExists(String),

    // Unsupported input format (415)
    #[error("{0}")]
    ContentType(String),

    // A strategy implementation was rejected by the registry (422)
    #[error("{0}")]
    Unprocessable(String),

    // Evaluation request is too large to serve (429)
    #[error("{0}")]
    TooManyRequests(String),

    // Malformed input document
    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EvalError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            EvalError::BadData(_) | EvalError::Parse(_) | EvalError::Json(_) => 400,
            EvalError::AuthenticationRequired(_) => 401,
            EvalError::PermissionDenied(_)
            | EvalError::OperationDenied(_)
            | EvalError::InvalidOperation(_) => 403,
            EvalError::NotFound(_) => 404,
            EvalError::NameExists(_) => 409,
            EvalError::ContentType(_) => 415,
            EvalError::Unprocessable(_) => 422,
            EvalError::TooManyRequests(_) => 429,
            EvalError::Config(_) | EvalError::Io(_) => 500,
        }
    }

    /// Stable error name used in API error bodies.
    pub fn name(&self) -> &'static str {
        match self {
            EvalError::BadData(_) => "BadDataError",
            EvalError::AuthenticationRequired(_) => "AuthenticationRequired",
            EvalError::PermissionDenied(_) => "NoAccessError",
            EvalError::OperationDenied(_) => "OperationDeniedError",
            EvalError::InvalidOperation(_) => "InvalidOperationError",
            EvalError::NotFound(_) => "NotFoundError",
            EvalError::NameExists(_) => "NameExistsError",
            EvalError::ContentType(_) => "ContentTypeError",
            EvalError::Unprocessable(_) => "UnprocessableEntityError",
            EvalError::TooManyRequests(_) => "RateLimitError",
            EvalError::Parse(_) | EvalError::Json(_) => "ValidationError",
            EvalError::Config(_) | EvalError::Io(_) => "InternalError",
        }
    }

    /// Render as an API error body. `details` always holds at least the message.
    pub fn to_json(&self) -> Value {
        let message = self.to_string();
        json!({
            "id": crate::random_id(),
            "name": self.name(),
            "message": message,
            "details": [{ "message": message }],
        })
    }
}

// Type alias for results that use `EvalError` as the error type
pub type Result<T> = std::result::Result<T, EvalError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(EvalError::BadData("x".into()).status_code(), 400);
        assert_eq!(EvalError::AuthenticationRequired("x".into()).status_code(), 401);
        assert_eq!(EvalError::OperationDenied("x".into()).status_code(), 403);
        assert_eq!(EvalError::NotFound("x".into()).status_code(), 404);
        assert_eq!(EvalError::NameExists("x".into()).status_code(), 409);
        assert_eq!(EvalError::Unprocessable("x".into()).status_code(), 422);
        assert_eq!(EvalError::TooManyRequests("x".into()).status_code(), 429);
    }

    #[test]
    fn details_repeat_the_message() {
        let mut body = EvalError::NotFound("Could not find feature".into()).to_json();
        let id = body.as_object_mut().and_then(|o| o.remove("id"));
        assert_eq!(id.and_then(|v| v.as_str().map(str::len)), Some(32));
        assert_eq!(
            body,
            json!({
                "name": "NotFoundError",
                "message": "Could not find feature",
                "details": [{ "message": "Could not find feature" }],
            })
        );
    }
}
