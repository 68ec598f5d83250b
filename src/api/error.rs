use std::error::Error as StdError;
use std::fmt;

/// Failure talking to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The request could not be sent or the body could not be read.
    Network(String),
    /// The server answered with a non-2xx status.
    Status { status: u16, body: String },
    /// The server answered without a body to stream.
    MissingBody,
    /// A body arrived but did not have the expected shape.
    InvalidResponse(String),
    /// The configured server address cannot be turned into a request URL.
    InvalidUrl(String),
}

impl ApiError {
    /// Short, human-readable description suitable for a chat bubble.
    pub fn summary(&self) -> String {
        match self {
            ApiError::Network(message) => format!("Could not reach the server: {message}"),
            ApiError::Status { status, body } => match extract_error_summary(body) {
                Some(summary) => format!("Server error {status}: {summary}"),
                None => format!("Server error {status}"),
            },
            ApiError::MissingBody => "The server sent an empty response.".to_string(),
            ApiError::InvalidResponse(message) => {
                format!("The server sent an unexpected response: {message}")
            }
            ApiError::InvalidUrl(message) => format!("Invalid server URL: {message}"),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Status { status, body } if !body.trim().is_empty() => {
                write!(f, "HTTP {status}: {}", body.trim())
            }
            ApiError::Status { status, .. } => write!(f, "HTTP {status}"),
            ApiError::Network(message) => write!(f, "network error: {message}"),
            ApiError::MissingBody => write!(f, "response had no body"),
            ApiError::InvalidResponse(message) => write!(f, "invalid response: {message}"),
            ApiError::InvalidUrl(message) => write!(f, "invalid server URL: {message}"),
        }
    }
}

impl StdError for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::InvalidResponse(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Pull a one-line message out of an error body. Understands FastAPI
/// (`detail`), OpenAI (`error.message`), and bare `message` shapes; a
/// short non-JSON body is used as-is.
pub fn extract_error_summary(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) else {
        return (trimmed.len() <= 200 && !trimmed.starts_with('<')).then(|| collapse(trimmed));
    };

    let summary = value
        .get("detail")
        .and_then(|v| match v {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Array(items) => items
                .first()
                .and_then(|item| item.get("msg"))
                .and_then(|msg| msg.as_str())
                .map(str::to_owned),
            _ => None,
        })
        .or_else(|| {
            value
                .pointer("/error/message")
                .and_then(|v| v.as_str())
                .map(str::to_owned)
        })
        .or_else(|| {
            value
                .get("error")
                .and_then(|v| v.as_str())
                .map(str::to_owned)
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str())
                .map(str::to_owned)
        })?;

    let collapsed = collapse(&summary);
    (!collapsed.is_empty()).then_some(collapsed)
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_reads_fastapi_detail() {
        let err = ApiError::Status {
            status: 404,
            body: r#"{"detail":"Chat not found"}"#.into(),
        };
        assert_eq!(err.summary(), "Server error 404: Chat not found");
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn summary_reads_validation_detail_lists() {
        let body = r#"{"detail":[{"loc":["body","message"],"msg":"field required"}]}"#;
        assert_eq!(extract_error_summary(body).as_deref(), Some("field required"));
    }

    #[test]
    fn summary_reads_openai_style_errors() {
        let body = r#"{"error":{"message":"model   overloaded","type":"server_error"}}"#;
        assert_eq!(extract_error_summary(body).as_deref(), Some("model overloaded"));
    }

    #[test]
    fn summary_handles_plain_and_html_bodies() {
        assert_eq!(
            extract_error_summary("Internal Server Error").as_deref(),
            Some("Internal Server Error")
        );
        assert_eq!(extract_error_summary("<html><body>502</body></html>"), None);
        assert_eq!(extract_error_summary("   "), None);

        let err = ApiError::Status {
            status: 502,
            body: "<html></html>".into(),
        };
        assert_eq!(err.summary(), "Server error 502");
    }
}
