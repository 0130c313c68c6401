use std::time::Duration;

pub type ApiResult<T, E = ApiError> = std::result::Result<T, E>;

/// Coarse classification used to decide how an error is surfaced.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// Transport failure, timeout or unreadable payload. Retried by the round loop.
    NetworkFailure,
    /// Rejected on the client before anything was sent.
    ValidationFailure,
    /// Non-2xx answer from the backend carrying a reason.
    BackendRejection,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request to {endpoint} failed: {source}")]
    Network {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {endpoint} timed out after {after:?}")]
    Timeout { endpoint: String, after: Duration },
    #[error("backend rejected {endpoint} with status {status}: {reason}")]
    Rejected {
        endpoint: String,
        status: u16,
        reason: String,
    },
    #[error("invalid payload from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
}

impl ApiError {
    pub fn timeout(endpoint: impl Into<String>, after: Duration) -> Self {
        ApiError::Timeout {
            endpoint: endpoint.into(),
            after,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Network { .. } | ApiError::Timeout { .. } | ApiError::Decode { .. } => {
                ErrorKind::NetworkFailure
            }
            ApiError::Rejected { .. } => ErrorKind::BackendRejection,
        }
    }

    /// Short text for the status panel.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Rejected { reason, .. } => reason.clone(),
            ApiError::Timeout { .. } => "Backend did not answer in time".to_string(),
            ApiError::Network { .. } | ApiError::Decode { .. } => {
                "Backend unavailable".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn kind__rejection_and_timeout__are_classified_apart() {
        let rejected = ApiError::Rejected {
            endpoint: "/api/games/rolls/bet".to_string(),
            status: 400,
            reason: "Insufficient balance".to_string(),
        };
        let timeout = ApiError::timeout("/api/games/rolls/history", Duration::from_secs(5));

        assert_eq!(rejected.kind(), ErrorKind::BackendRejection);
        assert_eq!(rejected.user_message(), "Insufficient balance");
        assert_eq!(timeout.kind(), ErrorKind::NetworkFailure);
    }
}
