//! Client core for the datasource REST API.
//!
//! # Overview
//! Two layers:
//! - the HTTP client wrapper: `DatasourceClient` builds requests and
//!   normalizes responses without touching the network, and `DatasourceApi`
//!   runs each round-trip through a `Transport`;
//! - `DatasourceStore`, which mirrors every successful remote mutation into
//!   an in-memory list and exposes `loading`/`error` for UI binding.
//!
//! # Design
//! - The base URL is read once from `Config` (`DATAFETCH_API_BASE_URL`,
//!   default `http://localhost:8000`).
//! - The wrapper logs and returns every failure; the store is the only place
//!   failures are absorbed.
//! - Datasource records are opaque apart from `id`.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod store;
pub mod transport;
pub mod types;

pub use api::DatasourceApi;
pub use client::{DatasourceClient, DEFAULT_LIMIT, DEFAULT_SKIP};
pub use config::Config;
pub use error::{ApiError, ErrorKind, StoreError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, RequestOptions};
pub use store::{DatasourceStore, StoreState};
pub use transport::{Transport, UreqTransport};
pub use types::{Datasource, DatasourceId};
