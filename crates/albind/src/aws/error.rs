//! AWS error classification
//!
//! Classifies SDK operation failures by their error code so callers can tell
//! "resource absent" from transport failures, duplicates, throttling, and the
//! role-propagation window, instead of string-matching Debug output.

use aws_sdk_lambda::error::{ProvideErrorMetadata, SdkError};
use thiserror::Error;

/// Classified AWS failure categories
#[derive(Debug, Error)]
pub enum AwsError {
    /// Resource was not found (an existence answer, not a failure, for probes)
    #[error("resource not found: {message}")]
    NotFound { message: String },

    /// Resource already exists under that name
    #[error("resource already exists: {message}")]
    AlreadyExists { message: String },

    /// Execution role not yet assumable (eventual consistency, retryable)
    #[error("execution role not yet propagated")]
    RoleNotReady,

    /// Rate limit exceeded
    #[error("rate limit exceeded: {message}")]
    Throttled { message: String },

    /// Generic SDK error with code and message
    #[error("AWS error: {message}")]
    Sdk {
        code: Option<String>,
        message: String,
    },
}

impl AwsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AwsError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, AwsError::AlreadyExists { .. })
    }

    pub fn is_role_not_ready(&self) -> bool {
        matches!(self, AwsError::RoleNotReady)
    }
}

/// Known codes for "not found" conditions across the services this tool uses
const NOT_FOUND_CODES: &[&str] = &[
    "ResourceNotFoundException",
    "LoadBalancerNotFound",
    "TargetGroupNotFound",
    "ListenerNotFound",
    "RuleNotFound",
    "NoSuchEntity",
];

/// Known codes for "already exists" conditions
const ALREADY_EXISTS_CODES: &[&str] = &[
    "DuplicateLoadBalancerName",
    "DuplicateTargetGroupName",
    "DuplicateListener",
    "ResourceConflictException",
    "EntityAlreadyExists",
];

/// Known codes for throttling and rate limiting
const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "TooManyRequestsException",
    "RequestLimitExceeded",
];

/// Classify an AWS failure from its error code and message.
pub fn classify_aws_error(code: Option<&str>, message: Option<&str>) -> AwsError {
    let message = message.unwrap_or("unknown error").to_string();

    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => AwsError::NotFound { message },
        Some(c) if ALREADY_EXISTS_CODES.contains(&c) => AwsError::AlreadyExists { message },
        Some(c) if THROTTLING_CODES.contains(&c) => AwsError::Throttled { message },
        Some("InvalidParameterValueException")
            if message.contains("assumed") || message.contains("role") =>
        {
            AwsError::RoleNotReady
        }
        _ => AwsError::Sdk {
            code: code.map(str::to_string),
            message,
        },
    }
}

/// Classify a typed SDK operation failure via its error metadata.
pub fn classify_sdk_error<E, R>(err: &SdkError<E, R>) -> AwsError
where
    E: ProvideErrorMetadata,
{
    match err {
        SdkError::ServiceError(context) => {
            let meta = context.err().meta();
            classify_aws_error(meta.code(), meta.message())
        }
        // Dispatch, timeout, and construction failures carry no service code;
        // the full error still propagates through the caller's context chain.
        _ => AwsError::Sdk {
            code: None,
            message: "transport or dispatch failure".to_string(),
        },
    }
}

/// True when the failure is the service saying "no such resource".
pub fn is_not_found<E, R>(err: &SdkError<E, R>) -> bool
where
    E: ProvideErrorMetadata,
{
    classify_sdk_error(err).is_not_found()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_codes() {
        for code in NOT_FOUND_CODES {
            let err = classify_aws_error(Some(code), Some("gone"));
            assert!(err.is_not_found(), "expected NotFound for code: {code}");
        }
    }

    #[test]
    fn already_exists_codes() {
        for code in ALREADY_EXISTS_CODES {
            let err = classify_aws_error(Some(code), Some("dup"));
            assert!(err.is_already_exists(), "expected AlreadyExists for code: {code}");
        }
    }

    #[test]
    fn throttling_codes() {
        for code in THROTTLING_CODES {
            assert!(matches!(
                classify_aws_error(Some(code), Some("slow down")),
                AwsError::Throttled { .. }
            ));
        }
    }

    #[test]
    fn role_propagation_window() {
        let err = classify_aws_error(
            Some("InvalidParameterValueException"),
            Some("The role defined for the function cannot be assumed by Lambda."),
        );
        assert!(err.is_role_not_ready());

        // Same code with an unrelated message stays generic
        let err = classify_aws_error(
            Some("InvalidParameterValueException"),
            Some("Unzipped size must be smaller than the limit"),
        );
        assert!(matches!(err, AwsError::Sdk { .. }));
    }

    #[test]
    fn unknown_and_missing_codes_stay_generic() {
        assert!(matches!(
            classify_aws_error(Some("SomethingNew"), Some("detail")),
            AwsError::Sdk { code: Some(_), .. }
        ));
        assert!(matches!(
            classify_aws_error(None, None),
            AwsError::Sdk { code: None, .. }
        ));
    }
}
