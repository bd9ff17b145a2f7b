use std::time::Duration;

use thiserror::Error;

/// Failure of a single backend request.
///
/// Display renders the text shown to users: a server-supplied detail is
/// passed through verbatim, everything else falls back to the transport text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error("{0}")]
    Transport(String),
    #[error("{detail}")]
    ServerDetail { status: u16, detail: String },
    #[error("{detail}")]
    NotFound { detail: String },
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error("invalid api base url: {0}")]
    InvalidBaseUrl(String),
    #[error("request cancelled")]
    Cancelled,
    #[error("request timed out after {0:?}")]
    TimedOut(Duration),
}

impl ApiError {
    /// Classifies a non-2xx response.
    ///
    /// The invoice backend re-raises its own 404s from inside a catch-all
    /// handler, so a 5xx whose detail reads "404: ..." is still a not-found.
    pub fn from_status(status: u16, detail: Option<String>) -> Self {
        match detail {
            Some(detail) if status == 404 || detail.trim_start().starts_with("404:") => {
                Self::NotFound { detail }
            }
            Some(detail) => Self::ServerDetail { status, detail },
            None if status == 404 => Self::NotFound {
                detail: status_text(status),
            },
            None => Self::Transport(status_text(status)),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

fn status_text(status: u16) -> String {
    format!("Request failed with status code {status}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_is_preferred_over_status_text() {
        let err = ApiError::from_status(400, Some("File too large".into()));
        assert_eq!(err.user_message(), "File too large");
        assert!(!err.is_not_found());
    }

    #[test]
    fn missing_detail_falls_back_to_transport_text() {
        let err = ApiError::from_status(502, None);
        assert_eq!(
            err,
            ApiError::Transport("Request failed with status code 502".into())
        );
    }

    #[test]
    fn rewrapped_not_found_is_recognised() {
        assert!(ApiError::from_status(404, Some("Match not found".into())).is_not_found());
        assert!(ApiError::from_status(500, Some("404: Match not found".into())).is_not_found());
        assert!(ApiError::from_status(404, None).is_not_found());
        assert!(!ApiError::from_status(500, Some("database locked".into())).is_not_found());
        assert!(!ApiError::from_status(500, Some("4040 rows locked".into())).is_not_found());
    }
}
