//! URL helpers for the server address and backend endpoints.

use url::{ParseError, Url};

/// Strip trailing slashes so the configured address reads the same however it was typed.
///
/// ```
/// use bluechat::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("http://localhost:8000/"), "http://localhost:8000");
/// assert_eq!(normalize_base_url("http://localhost:8000///"), "http://localhost:8000");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Parse a server address, assuming plain HTTP for bare `host:port` input.
///
/// ```
/// use bluechat::utils::url::parse_server_url;
///
/// let url = parse_server_url("localhost:8000").unwrap();
/// assert_eq!(url.as_str(), "http://localhost:8000/");
/// assert!(parse_server_url("ftp://files.example").is_err());
/// ```
pub fn parse_server_url(input: &str) -> Result<Url, String> {
    let trimmed = input.trim();
    let url = match Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => url,
        // `localhost:8000` parses with `localhost` as an opaque scheme.
        Ok(url) if url.cannot_be_a_base() => with_http_scheme(trimmed)?,
        Ok(url) => return Err(format!("unsupported scheme `{}`", url.scheme())),
        Err(ParseError::RelativeUrlWithoutBase) => with_http_scheme(trimmed)?,
        Err(err) => return Err(err.to_string()),
    };
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    Ok(url)
}

fn with_http_scheme(input: &str) -> Result<Url, String> {
    Url::parse(&format!("http://{input}")).map_err(|err| err.to_string())
}

/// Canonical text form of a server address, used for display and storage.
pub fn canonical_server_url(input: &str) -> Result<String, String> {
    parse_server_url(input).map(|url| normalize_base_url(url.as_str()))
}

/// Append path segments to a base URL, percent-encoding each one.
///
/// ```
/// use bluechat::utils::url::endpoint_url;
///
/// let url = endpoint_url("http://localhost:8000/", &["api", "chat", "a b"]).unwrap();
/// assert_eq!(url.as_str(), "http://localhost:8000/api/chat/a%20b");
/// ```
pub fn endpoint_url(base_url: &str, segments: &[&str]) -> Result<Url, String> {
    let mut url = parse_server_url(&normalize_base_url(base_url))?;
    url.path_segments_mut()
        .map_err(|()| format!("`{base_url}` cannot carry a path"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
