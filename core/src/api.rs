//! Async datasource API: builds a request, runs it through a `Transport`,
//! parses the response.
//!
//! Every failure is logged at error level and then returned to the caller
//! unchanged. There is no retry.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};

use crate::client::{decode_list, decode_one, DatasourceClient};
use crate::config::Config;
use crate::error::ApiError;
use crate::http::{HttpRequest, RequestOptions};
use crate::transport::Transport;
use crate::types::{Datasource, DatasourceId};

/// Datasource endpoints bound to a base URL and a transport.
#[derive(Debug, Clone)]
pub struct DatasourceApi<T> {
    client: DatasourceClient,
    transport: T,
}

impl<T: Transport> DatasourceApi<T> {
    pub fn new(client: DatasourceClient, transport: T) -> Self {
        Self { client, transport }
    }

    pub fn from_config(config: &Config, transport: T) -> Self {
        Self::new(DatasourceClient::new(&config.api_base_url), transport)
    }

    /// Request `endpoint` relative to the base URL and return the decoded
    /// JSON body, or `None` for a 204.
    pub async fn request(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<Option<Value>, ApiError> {
        let request = self.client.build_request(endpoint, options);
        self.send(request).await
    }

    pub async fn get_all(&self, skip: u64, limit: u64) -> Result<Vec<Datasource>, ApiError> {
        let body = self.send(self.client.build_get_all(skip, limit)).await?;
        decode_list(body).inspect_err(log_failure)
    }

    pub async fn get_by_id(&self, id: DatasourceId) -> Result<Option<Datasource>, ApiError> {
        let body = self.send(self.client.build_get_by_id(id)).await?;
        decode_one(body).inspect_err(log_failure)
    }

    /// Create a datasource. The result is the record the backend stored, not
    /// `entity`.
    pub async fn create<E>(&self, entity: &E) -> Result<Option<Datasource>, ApiError>
    where
        E: Serialize + ?Sized,
    {
        let request = self.client.build_create(entity).inspect_err(log_failure)?;
        let body = self.send(request).await?;
        decode_one(body).inspect_err(log_failure)
    }

    pub async fn update<E>(
        &self,
        id: DatasourceId,
        entity: &E,
    ) -> Result<Option<Datasource>, ApiError>
    where
        E: Serialize + ?Sized,
    {
        let request = self.client.build_update(id, entity).inspect_err(log_failure)?;
        let body = self.send(request).await?;
        decode_one(body).inspect_err(log_failure)
    }

    /// Delete a datasource. Any response body is discarded.
    pub async fn delete(&self, id: DatasourceId) -> Result<(), ApiError> {
        self.send(self.client.build_delete(id)).await.map(|_| ())
    }

    async fn send(&self, request: HttpRequest) -> Result<Option<Value>, ApiError> {
        debug!(method = %request.method, url = %request.url, "sending request");
        let response = self
            .transport
            .execute(request)
            .await
            .inspect_err(log_failure)?;
        debug!(
            status = response.status,
            content_type = response.header("content-type").unwrap_or(""),
            "received response"
        );
        self.client.parse_response(response).inspect_err(log_failure)
    }
}

fn log_failure(err: &ApiError) {
    error!(kind = %err.kind(), error = %err, "API request failed");
}
