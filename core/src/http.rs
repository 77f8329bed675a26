//! HTTP transport types shared by the request builder and the transports.
//!
//! # Design
//! Requests and responses are plain data. `DatasourceClient` builds
//! `HttpRequest` values and parses `HttpResponse` values without touching the
//! network; a `Transport` performs the round-trip in between. Keeping the two
//! halves apart makes the URL, header and error rules testable without a
//! server.

use std::fmt;

/// Header sent with every request unless the caller overrides it.
pub const DEFAULT_HEADERS: &[(&str, &str)] = &[("content-type", "application/json")];

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied options for a generic request.
///
/// `headers` are merged over `DEFAULT_HEADERS`; a caller header replaces a
/// default with the same name (compared case-insensitively).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    pub method: HttpMethod,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl RequestOptions {
    pub fn new(method: HttpMethod) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// An HTTP request described as plain data. `url` is absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// Look up a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// An HTTP response described as plain data, produced by a `Transport`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Look up a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Merge caller headers over the defaults. Defaults keep their position; an
/// overridden default takes the caller's name and value.
pub(crate) fn merge_headers(overrides: Vec<(String, String)>) -> Vec<(String, String)> {
    let mut merged: Vec<(String, String)> = DEFAULT_HEADERS
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();
    for (name, value) in overrides {
        match merged.iter_mut().find(|(key, _)| key.eq_ignore_ascii_case(&name)) {
            Some(slot) => *slot = (name, value),
            None => merged.push((name, value)),
        }
    }
    merged
}
