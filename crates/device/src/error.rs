use std::time::Duration;

/// Classified outcome of a call to the device backend (§4.5, §6.2), mirroring
/// the classification shape of the teacher's provider-adapter error taxonomy.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DeviceError {
    /// 401/403: never retried (§4.3 step 6).
    #[error("device backend rejected credentials")]
    Auth,
    /// 429, optionally carrying a parsed `Retry-After` hint.
    #[error("device backend rate-limited the request")]
    RateLimited { retry_after: Option<Duration> },
    /// 5xx.
    #[error("device backend returned server error {status}")]
    Server { status: u16 },
    /// Connection-level failure (DNS, TCP reset, TLS, …).
    #[error("network error talking to device backend: {0}")]
    Network(String),
    /// The request did not complete within its deadline.
    #[error("device backend request timed out")]
    Timeout,
    /// A response the adapter could not parse as the expected shape.
    #[error("device backend returned an unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl DeviceError {
    /// Whether the dispatcher's retry policy should retry this error
    /// (§4.3 step 6): network/timeout/5xx/429 retry with backoff, 401/403 never do.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Auth | Self::UnexpectedResponse(_) => false,
            Self::RateLimited { .. } | Self::Server { .. } | Self::Network(_) | Self::Timeout => true,
        }
    }

    /// `Retry-After` hint, if the error carries one, for the dispatcher's
    /// backoff policy to honor (§4.3 step 6).
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_are_not_retryable() {
        assert!(!DeviceError::Auth.is_retryable());
    }

    #[test]
    fn transient_errors_are_retryable() {
        assert!(DeviceError::Timeout.is_retryable());
        assert!(DeviceError::Network("reset".into()).is_retryable());
        assert!(DeviceError::Server { status: 503 }.is_retryable());
        assert!(DeviceError::RateLimited { retry_after: None }.is_retryable());
    }

    #[test]
    fn retry_after_surfaces_only_on_rate_limited() {
        let err = DeviceError::RateLimited {
            retry_after: Some(Duration::from_secs(5)),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(5)));
        assert_eq!(DeviceError::Timeout.retry_after(), None);
    }
}
