/*!
 * Error types shared across services.
 *
 * `ServiceError` is the single failure taxonomy for the crate. Transient
 * conditions (rate limiting) are retried internally and should never
 * reach a caller; propagation entry points absorb everything into a
 * boolean outcome plus an audit record.
 */

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    /// Token bucket denial. Raised inside a retried client body so the
    /// retry executor re-attempts after the backoff; never surfaced to
    /// propagation callers.
    #[error("Rate limit exceeded for key: {0}")]
    RateLimited(String),

    /// Remote update still failing after the retry budget was spent.
    #[error("Remote sync failed after {attempts} attempts: {detail}")]
    SyncExhausted { attempts: u32, detail: String },

    #[error("Missing credential {kind} for channel {channel_id}")]
    MissingCredential { channel_id: Uuid, kind: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        ServiceError::NotFound(format!("{} {}", entity, id))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ServiceError::ValidationError(msg.into())
    }

    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        ServiceError::InvalidOperation(msg.into())
    }

    pub fn insufficient_stock(material_code: &str, requested: impl std::fmt::Display) -> Self {
        ServiceError::InsufficientStock(format!(
            "material {} cannot cover requested {}",
            material_code, requested
        ))
    }

    /// Transient failures are safe to re-attempt without operator action.
    pub fn is_transient(&self) -> bool {
        matches!(self, ServiceError::RateLimited(_))
    }
}

/// Convenience alias used by every service signature.
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    #[test]
    fn helper_constructors_format_messages() {
        let err = ServiceError::not_found("Material", "42");
        assert_eq!(err.to_string(), "Resource not found: Material 42");

        let err = ServiceError::insufficient_stock("RM-001", 15);
        assert_matches!(err, ServiceError::InsufficientStock(msg) => {
            assert!(msg.contains("RM-001"));
            assert!(msg.contains("15"));
        });
    }

    #[rstest]
    #[case::rate_limited(ServiceError::RateLimited("shop-eu".into()), true)]
    #[case::validation(ServiceError::validation("bad input"), false)]
    #[case::not_found(ServiceError::not_found("Material", "42"), false)]
    #[case::exhausted(ServiceError::SyncExhausted { attempts: 3, detail: "boom".into() }, false)]
    fn transience_by_variant(#[case] err: ServiceError, #[case] transient: bool) {
        assert_eq!(err.is_transient(), transient);
    }

    #[test]
    fn anyhow_errors_convert_via_other() {
        let err: ServiceError = anyhow::anyhow!("backend offline").into();
        assert_eq!(err.to_string(), "backend offline");
    }
}
