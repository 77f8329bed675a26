//! Stateless HTTP request builder and response parser for the datasource API.
//!
//! # Design
//! `DatasourceClient` holds only a `base_url` and carries no mutable state
//! between calls. Requests are produced by `build_*` methods and responses
//! are normalized by `parse_response`; `DatasourceApi` runs the round-trip in
//! between. Nothing here performs I/O.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::http::{merge_headers, HttpMethod, HttpRequest, HttpResponse, RequestOptions};
use crate::types::{Datasource, DatasourceId};

pub const DEFAULT_SKIP: u64 = 0;
pub const DEFAULT_LIMIT: u64 = 100;

/// Builds `HttpRequest` values and parses `HttpResponse` values for the
/// datasource endpoints.
#[derive(Debug, Clone)]
pub struct DatasourceClient {
    base_url: String,
}

impl DatasourceClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a request for an arbitrary endpoint path.
    pub fn build_request(&self, endpoint: &str, options: RequestOptions) -> HttpRequest {
        HttpRequest {
            method: options.method,
            url: format!("{}{endpoint}", self.base_url),
            headers: merge_headers(options.headers),
            body: options.body,
        }
    }

    pub fn build_get_all(&self, skip: u64, limit: u64) -> HttpRequest {
        self.build_request(
            &format!("/datasources/?skip={skip}&limit={limit}"),
            RequestOptions::default(),
        )
    }

    pub fn build_get_by_id(&self, id: DatasourceId) -> HttpRequest {
        self.build_request(&format!("/datasources/{id}"), RequestOptions::default())
    }

    pub fn build_create<T>(&self, entity: &T) -> Result<HttpRequest, ApiError>
    where
        T: Serialize + ?Sized,
    {
        let body = encode(entity)?;
        Ok(self.build_request(
            "/datasources/",
            RequestOptions::new(HttpMethod::Post).body(body),
        ))
    }

    pub fn build_update<T>(&self, id: DatasourceId, entity: &T) -> Result<HttpRequest, ApiError>
    where
        T: Serialize + ?Sized,
    {
        let body = encode(entity)?;
        Ok(self.build_request(
            &format!("/datasources/{id}"),
            RequestOptions::new(HttpMethod::Put).body(body),
        ))
    }

    pub fn build_delete(&self, id: DatasourceId) -> HttpRequest {
        self.build_request(
            &format!("/datasources/{id}"),
            RequestOptions::new(HttpMethod::Delete),
        )
    }

    /// Normalize a response into its decoded JSON body.
    ///
    /// Non-2xx responses become `ApiError::Status` carrying the body's
    /// `detail` string when there is one. A 204 yields `None` without looking
    /// at the body.
    pub fn parse_response(&self, response: HttpResponse) -> Result<Option<Value>, ApiError> {
        if !response.is_success() {
            let error_body: Value = serde_json::from_str(&response.body)
                .unwrap_or_else(|_| Value::Object(Map::new()));
            let detail = error_body.get("detail").and_then(Value::as_str);
            return Err(ApiError::status(response.status, detail));
        }
        if response.status == 204 {
            return Ok(None);
        }
        serde_json::from_str(&response.body)
            .map(Some)
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// Decode a collection body. A missing body is an empty collection.
pub fn decode_list(body: Option<Value>) -> Result<Vec<Datasource>, ApiError> {
    match body {
        Some(value) => serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string())),
        None => Ok(Vec::new()),
    }
}

/// Decode a single-entity body. A missing body stays absent.
pub fn decode_one(body: Option<Value>) -> Result<Option<Datasource>, ApiError> {
    body.map(|value| serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string())))
        .transpose()
}

fn encode<T: Serialize + ?Sized>(entity: &T) -> Result<String, ApiError> {
    serde_json::to_string(entity).map_err(|e| ApiError::Serialization(e.to_string()))
}
