//! Send outcome classification.

use reqwest::StatusCode;

/// What happened to one send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Collector accepted the event.
    Delivered,
    /// Collector refused the event; resending will not help.
    Rejected { status: u16 },
    /// Transient failure; the pipeline should back off and retry.
    Retryable { reason: String },
    /// Transport is disabled by configuration; nothing was sent.
    Disabled,
}

impl SendOutcome {
    /// Whether the pipeline may move past the record.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SendOutcome::Retryable { .. })
    }
}

/// Classify an HTTP response status.
pub fn classify_status(status: StatusCode) -> SendOutcome {
    if status.is_success() {
        return SendOutcome::Delivered;
    }

    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        return SendOutcome::Retryable {
            reason: format!("HTTP {}", status.as_u16()),
        };
    }

    SendOutcome::Rejected {
        status: status.as_u16(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(code: u16) -> SendOutcome {
        classify_status(StatusCode::from_u16(code).unwrap())
    }

    #[test]
    fn test_success_delivered() {
        assert_eq!(classify(200), SendOutcome::Delivered);
        assert_eq!(classify(202), SendOutcome::Delivered);
    }

    #[test]
    fn test_client_errors_rejected() {
        for code in [400, 401, 403, 404, 413, 422] {
            assert_eq!(classify(code), SendOutcome::Rejected { status: code });
        }
    }

    #[test]
    fn test_transient_statuses_retryable() {
        for code in [408, 429, 500, 502, 503, 504] {
            assert!(
                matches!(classify(code), SendOutcome::Retryable { .. }),
                "{code} should be retryable"
            );
        }
    }

    #[test]
    fn test_terminal() {
        assert!(SendOutcome::Delivered.is_terminal());
        assert!(SendOutcome::Rejected { status: 400 }.is_terminal());
        assert!(SendOutcome::Disabled.is_terminal());
        assert!(!SendOutcome::Retryable {
            reason: "HTTP 500".into()
        }
        .is_terminal());
    }
}
