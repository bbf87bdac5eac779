use std::fmt;

/// Error raised for outcomes a call site does not want represented as data.
///
/// The caller-supplied `context` prefixes the rendered message so failures can
/// be attributed to the action that triggered them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{context}: {kind} at {url}: {message}")]
pub struct RequestError {
    pub context: String,
    pub kind: FailureKind,
    pub url: String,
    pub message: String,
}

impl RequestError {
    pub fn new(
        context: impl Into<String>,
        kind: FailureKind,
        url: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            context: context.into(),
            kind,
            url: url.into(),
            message: message.into(),
        }
    }

    /// HTTP status behind this error, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self.kind {
            FailureKind::RateLimited { status, .. } => Some(status),
            FailureKind::AuthFailed => Some(401),
            FailureKind::Forbidden => Some(403),
            FailureKind::NotFound => Some(404),
            FailureKind::ServerError(status)
            | FailureKind::HttpStatus(status)
            | FailureKind::NonJsonResponse(status) => Some(status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    RateLimited { status: u16, attempts: u32 },
    AuthFailed,
    Forbidden,
    NotFound,
    ServerError(u16),
    HttpStatus(u16),
    NonJsonResponse(u16),
    MalformedJson,
    InvalidUrl,
    Timeout,
    Network,
    TooLarge { max_bytes: u64 },
    UnexpectedPayload,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::RateLimited { status, attempts } => {
                write!(f, "rate limited (http status {status}) after {attempts} attempts")
            }
            FailureKind::AuthFailed => write!(f, "authentication failed (http status 401)"),
            FailureKind::Forbidden => write!(f, "forbidden (http status 403)"),
            FailureKind::NotFound => write!(f, "http status 404"),
            FailureKind::ServerError(code) => write!(f, "server error (http status {code})"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::NonJsonResponse(code) => {
                write!(f, "non-json response (http status {code})")
            }
            FailureKind::MalformedJson => write!(f, "malformed json"),
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::TooLarge { max_bytes } => {
                write!(f, "response larger than {max_bytes} bytes")
            }
            FailureKind::UnexpectedPayload => write!(f, "unexpected payload"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CsvError {
    #[error("csv input contains no rows")]
    EmptyInput,
    #[error("csv header {0:?} appears more than once")]
    DuplicateHeader(String),
}
