//! Failures of business logic, and their normalization into `LambdaError`.
//!
//! Business logic returns `Result<T, Failure>`, and `?` converts any
//! `std::error::Error` or `anyhow::Error` (including a `LambdaError`) into a
//! `Failure`. A status code can be attached with `FailureExt::with_status`.
//! The handler then normalizes each Failure into a `LambdaError`, which is
//! what is logged, notified, and rendered as the response body.
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// LambdaError is the uniform shape of a failed invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LambdaError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::response::status_serde::option"
    )]
    pub status_code: Option<StatusCode>,
    pub is_framework_error: bool,
}

impl LambdaError {
    pub fn new(message: impl Into<String>, status_code: Option<StatusCode>) -> Self {
        Self {
            message: message.into(),
            stack: None,
            status_code,
            is_framework_error: true,
        }
    }

    /// Status code of the response which renders this error.
    pub fn response_status(&self) -> StatusCode {
        self.status_code.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl std::fmt::Display for LambdaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "status: {}, error: {}", code.as_u16(), self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for LambdaError {}

/// Failure is the error type of business logic.
#[derive(Debug)]
pub enum Failure {
    /// An already-normalized error, which passes through unchanged.
    Normalized(LambdaError),
    /// An error with an optional status code.
    Error {
        error: anyhow::Error,
        status: Option<StatusCode>,
    },
    /// A bare message with an optional status code.
    Message {
        message: String,
        status: Option<StatusCode>,
    },
    /// Business logic panicked with the given payload.
    Panic(String),
}

impl Failure {
    pub fn message(message: impl Into<String>) -> Self {
        Failure::Message {
            message: message.into(),
            status: None,
        }
    }
}

// Failure must not implement std::error::Error, which would conflict with this conversion.
impl<E> From<E> for Failure
where
    E: Into<anyhow::Error>,
{
    fn from(error: E) -> Self {
        Failure::Error {
            error: error.into(),
            status: None,
        }
    }
}

pub trait FailureExt {
    /// Sets the status code of the response which renders this failure.
    fn with_status(self, status: StatusCode) -> Failure;
}

impl<F: Into<Failure>> FailureExt for F {
    fn with_status(self, status: StatusCode) -> Failure {
        match self.into() {
            Failure::Normalized(mut error) => {
                error.status_code = Some(status);
                Failure::Normalized(error)
            }
            Failure::Error { error, .. } => Failure::Error {
                error,
                status: Some(status),
            },
            Failure::Message { message, .. } => Failure::Message {
                message,
                status: Some(status),
            },
            // Panics are always internal errors.
            panic @ Failure::Panic(_) => panic,
        }
    }
}

/// Normalize a Failure into a LambdaError, preserving its message,
/// stack, and status code.
pub fn normalize(failure: Failure) -> LambdaError {
    match failure {
        Failure::Normalized(error) => error,
        Failure::Error { error, status } => match error.downcast::<LambdaError>() {
            Ok(mut error) => {
                if status.is_some() {
                    error.status_code = status;
                }
                error
            }
            Err(error) => LambdaError {
                message: format!("{error:#}"), // Alternate renders nested causes.
                stack: Some(format!("{error:?}")),
                status_code: status,
                is_framework_error: true,
            },
        },
        Failure::Message { message, status } => LambdaError::new(message, status),
        Failure::Panic(payload) => LambdaError::new(
            format!("invocation panicked: {payload}"),
            Some(StatusCode::INTERNAL_SERVER_ERROR),
        ),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use anyhow::Context;
    use serde_json::json;

    #[test]
    fn test_normalized_errors_pass_through() {
        let error = LambdaError {
            message: "teapot".to_string(),
            stack: Some("at brew()".to_string()),
            status_code: Some(StatusCode::IM_A_TEAPOT),
            is_framework_error: true,
        };
        assert_eq!(normalize(error.clone().into()), error);
    }

    #[test]
    fn test_errors_keep_causes_and_status() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no such user",
        ));
        let failure: Failure = result.context("loading user").unwrap_err()
            .with_status(StatusCode::NOT_FOUND);
        let error = normalize(failure);

        assert_eq!(error.message, "loading user: no such user");
        assert_eq!(error.status_code, Some(StatusCode::NOT_FOUND));
        assert_eq!(error.response_status(), StatusCode::NOT_FOUND);
        assert!(error.stack.unwrap().contains("Caused by:"));
        assert!(error.is_framework_error);
    }

    #[test]
    fn test_default_status_is_internal_error() {
        let failure: Failure = std::fmt::Error.into();
        let error = normalize(failure);
        assert_eq!(error.status_code, None);
        assert_eq!(
            error.response_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let error = normalize(Failure::message("plain"));
        assert_eq!(error.message, "plain");
        assert_eq!(
            error.response_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let failure = Failure::Panic("boom".to_string()).with_status(StatusCode::BAD_REQUEST);
        let error = normalize(failure);
        assert_eq!(error.message, "invocation panicked: boom");
        assert_eq!(
            error.response_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_with_status_overrides_normalized_status() {
        let failure =
            LambdaError::new("gone", Some(StatusCode::NOT_FOUND)).with_status(StatusCode::GONE);
        assert_eq!(normalize(failure).status_code, Some(StatusCode::GONE));
    }

    #[test]
    fn test_wrapped_lambda_errors_keep_their_status() {
        let wrapped =
            anyhow::Error::new(LambdaError::new("forbidden", Some(StatusCode::FORBIDDEN)));
        assert_eq!(
            normalize(wrapped.into()),
            LambdaError::new("forbidden", Some(StatusCode::FORBIDDEN))
        );
    }

    #[test]
    fn test_serialized_shape() {
        let error = LambdaError::new("not found", Some(StatusCode::NOT_FOUND));
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            json!({"message": "not found", "statusCode": 404, "isFrameworkError": true})
        );
        assert_eq!(error.to_string(), "status: 404, error: not found");
    }
}
