//! Outcome Classifier: maps a raw HTTP response onto a typed [`RequestOutcome`].

use serde_json::Value;

use crate::error::{FailureKind, RequestError};

/// Longest body excerpt carried by failure outcomes.
pub const SNIPPET_LIMIT: usize = 200;

/// Status, content type, and fully read body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    Ok {
        url: String,
        payload: Value,
    },
    /// A JSON body describing a validation failure. Data, not an exception.
    SoftFailure {
        url: String,
        http_status: u16,
        payload: Value,
    },
    RateLimited {
        url: String,
        status: u16,
        message: String,
    },
    AuthFailed {
        url: String,
    },
    Forbidden {
        url: String,
    },
    NotFound {
        url: String,
        message: Option<String>,
    },
    ServerError {
        url: String,
        status: u16,
        message: Option<String>,
    },
    /// A 4xx without a JSON body.
    HttpFailure {
        url: String,
        status: u16,
        snippet: String,
    },
    NonJsonResponse {
        url: String,
        status: u16,
        snippet: String,
    },
    MalformedJson {
        url: String,
        snippet: String,
    },
}

/// Value-level result of a request: the outcomes callers branch on.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiReply {
    Ok(Value),
    SoftFailure { http_status: u16, payload: Value },
}

impl ApiReply {
    pub fn is_ok(&self) -> bool {
        matches!(self, ApiReply::Ok(_))
    }

    pub fn payload(&self) -> &Value {
        match self {
            ApiReply::Ok(payload) | ApiReply::SoftFailure { payload, .. } => payload,
        }
    }
}

impl RequestOutcome {
    pub fn url(&self) -> &str {
        match self {
            RequestOutcome::Ok { url, .. }
            | RequestOutcome::SoftFailure { url, .. }
            | RequestOutcome::RateLimited { url, .. }
            | RequestOutcome::AuthFailed { url }
            | RequestOutcome::Forbidden { url }
            | RequestOutcome::NotFound { url, .. }
            | RequestOutcome::ServerError { url, .. }
            | RequestOutcome::HttpFailure { url, .. }
            | RequestOutcome::NonJsonResponse { url, .. }
            | RequestOutcome::MalformedJson { url, .. } => url,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, RequestOutcome::RateLimited { .. })
    }

    /// Splits the outcome into returned data and raised errors.
    ///
    /// `attempts` is how many times the request was issued; it is reported on
    /// rate-limit errors only.
    pub fn into_reply(self, context: &str, attempts: u32) -> Result<ApiReply, RequestError> {
        match self {
            RequestOutcome::Ok { payload, .. } => Ok(ApiReply::Ok(payload)),
            RequestOutcome::SoftFailure {
                http_status,
                payload,
                ..
            } => Ok(ApiReply::SoftFailure {
                http_status,
                payload,
            }),
            RequestOutcome::RateLimited {
                url,
                status,
                message,
            } => Err(RequestError::new(
                context,
                FailureKind::RateLimited { status, attempts },
                url,
                message,
            )),
            RequestOutcome::AuthFailed { url } => Err(RequestError::new(
                context,
                FailureKind::AuthFailed,
                url,
                "session is not authenticated",
            )),
            RequestOutcome::Forbidden { url } => Err(RequestError::new(
                context,
                FailureKind::Forbidden,
                url,
                "operation not permitted for this account",
            )),
            RequestOutcome::NotFound { url, message } => Err(RequestError::new(
                context,
                FailureKind::NotFound,
                url,
                message.unwrap_or_else(|| "not found".to_string()),
            )),
            RequestOutcome::ServerError {
                url,
                status,
                message,
            } => Err(RequestError::new(
                context,
                FailureKind::ServerError(status),
                url,
                message.unwrap_or_else(|| "server error".to_string()),
            )),
            RequestOutcome::HttpFailure {
                url,
                status,
                snippet,
            } => Err(RequestError::new(
                context,
                FailureKind::HttpStatus(status),
                url,
                snippet,
            )),
            RequestOutcome::NonJsonResponse {
                url,
                status,
                snippet,
            } => Err(RequestError::new(
                context,
                FailureKind::NonJsonResponse(status),
                url,
                snippet,
            )),
            RequestOutcome::MalformedJson { url, snippet } => Err(RequestError::new(
                context,
                FailureKind::MalformedJson,
                url,
                snippet,
            )),
        }
    }
}

/// Classify a response. Rules apply in order; the first match wins.
pub fn classify(response: RawResponse) -> RequestOutcome {
    let RawResponse {
        url,
        status,
        content_type,
        body,
    } = response;

    if (200..300).contains(&status) {
        if !content_type.as_deref().is_some_and(is_json_content_type) {
            roster_logging::roster_debug!(
                "non-json success body from {} ({:?})",
                url,
                content_type
            );
            return RequestOutcome::NonJsonResponse {
                url,
                status,
                snippet: snippet(&body),
            };
        }
        return match serde_json::from_str::<Value>(&body) {
            Ok(payload) => RequestOutcome::Ok { url, payload },
            Err(_) => RequestOutcome::MalformedJson {
                url,
                snippet: snippet(&body),
            },
        };
    }

    let parsed = serde_json::from_str::<Value>(&body).ok();

    if status == 429 || body.to_ascii_lowercase().contains("too many requests") {
        let message = parsed
            .as_ref()
            .and_then(json_message)
            .unwrap_or_else(|| snippet(&body));
        return RequestOutcome::RateLimited {
            url,
            status,
            message,
        };
    }

    match status {
        401 => RequestOutcome::AuthFailed { url },
        403 => RequestOutcome::Forbidden { url },
        404 => RequestOutcome::NotFound {
            url,
            message: parsed.as_ref().and_then(json_message),
        },
        500.. => RequestOutcome::ServerError {
            url,
            status,
            message: parsed.as_ref().and_then(json_message),
        },
        _ => match parsed {
            Some(payload) => RequestOutcome::SoftFailure {
                payload: annotate_soft_failure(payload, status, &url),
                http_status: status,
                url,
            },
            None => RequestOutcome::HttpFailure {
                url,
                status,
                snippet: snippet(&body),
            },
        },
    }
}

/// Truncate a body to at most [`SNIPPET_LIMIT`] characters.
pub fn snippet(body: &str) -> String {
    body.chars().take(SNIPPET_LIMIT).collect()
}

fn is_json_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim();
    essence.eq_ignore_ascii_case("application/json")
        || essence.to_ascii_lowercase().ends_with("+json")
}

fn json_message(payload: &Value) -> Option<String> {
    ["message", "error"].iter().find_map(|key| {
        payload
            .get(*key)
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    })
}

// Object payloads gain `_httpStatus` and `_url`; other JSON values pass through.
fn annotate_soft_failure(mut payload: Value, status: u16, url: &str) -> Value {
    if let Value::Object(map) = &mut payload {
        map.insert("_httpStatus".to_string(), Value::from(status));
        map.insert("_url".to_string(), Value::from(url));
    }
    payload
}
