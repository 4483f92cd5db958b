use thiserror::Error;

/// Failure of a weather fetch, classified by how the dashboard reacts to it.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Bad or missing API key; polling is suspended until setup runs again.
    #[error("weather service rejected the API key (HTTP {status})")]
    Auth { status: u16 },

    /// Provider quota exceeded; the next scheduled tick tries again.
    #[error("weather service rate limit exceeded")]
    RateLimited,

    /// Network failure, timeout or server-side error.
    #[error("weather service unreachable: {0}")]
    Transient(String),

    /// 2xx response that does not have the expected shape.
    #[error("malformed weather response: {0}")]
    Parse(String),
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Auth { .. } => ErrorKind::Auth,
            FetchError::RateLimited => ErrorKind::RateLimited,
            FetchError::Transient(_) => ErrorKind::Transient,
            FetchError::Parse(_) => ErrorKind::Parse,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Transient("request timed out".to_string())
        } else {
            FetchError::Transient(err.to_string())
        }
    }
}

/// Fieldless mirror of [`FetchError`], carried in the sync status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Auth,
    RateLimited,
    Transient,
    Parse,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Auth => "auth",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Transient => "transient",
            ErrorKind::Parse => "parse",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a ZIP code lookup.
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("could not find ZIP code {0}")]
    NotFound(String),

    #[error("failed to connect to geocoding service: {0}")]
    Transient(String),

    #[error("malformed geocoding response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for GeocodeError {
    fn from(err: reqwest::Error) -> Self {
        GeocodeError::Transient(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_errors_report_their_kind() {
        assert_eq!(FetchError::Auth { status: 401 }.kind(), ErrorKind::Auth);
        assert_eq!(FetchError::RateLimited.kind(), ErrorKind::RateLimited);
        assert_eq!(FetchError::Transient("x".into()).kind(), ErrorKind::Transient);
        assert_eq!(FetchError::Parse("x".into()).kind(), ErrorKind::Parse);
    }

    #[test]
    fn not_found_message_names_the_zip() {
        let err = GeocodeError::NotFound("00000".into());
        assert!(err.to_string().contains("00000"));
    }
}
