use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;

pub const NOT_FOUND_DETAIL: &str = "Datenquelle nicht gefunden";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub description: Option<String>,
    pub start_time: NaiveTime,
    /// Fetch interval in seconds.
    pub frequency: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct CreateDataSource {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_time: NaiveTime,
    pub frequency: i64,
}

#[derive(Deserialize)]
pub struct UpdateDataSource {
    pub name: Option<String>,
    pub url: Option<String>,
    /// `None` leaves the description alone; `Some(None)` clears it.
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    pub start_time: Option<NaiveTime>,
    pub frequency: Option<i64>,
}

#[derive(Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    100
}

/// Marks a field as present even when its value is `null`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Default)]
pub struct Db {
    next_id: i64,
    rows: BTreeMap<i64, DataSource>,
}

impl Db {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&DataSource> {
        self.rows.get(&id)
    }
}

pub type SharedDb = Arc<RwLock<Db>>;

/// Request rejection rendered the way the backend does: a string `detail`
/// for missing records, a list of field errors for validation failures.
#[derive(Debug)]
pub enum ServerError {
    NotFound,
    Invalid { field: &'static str, message: String },
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        match self {
            ServerError::NotFound => {
                (StatusCode::NOT_FOUND, Json(json!({ "detail": NOT_FOUND_DETAIL }))).into_response()
            }
            ServerError::Invalid { field, message } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({
                    "detail": [{ "loc": ["body", field], "msg": message, "type": "value_error" }]
                })),
            )
                .into_response(),
        }
    }
}

pub fn app() -> Router {
    router(SharedDb::default())
}

pub fn router(db: SharedDb) -> Router {
    Router::new()
        .route("/datasources/", get(list_datasources).post(create_datasource))
        .route(
            "/datasources/{id}",
            get(get_datasource).put(update_datasource).delete(delete_datasource),
        )
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn validate_url(raw: &str) -> Result<(), ServerError> {
    let invalid = |message: &str| ServerError::Invalid {
        field: "url",
        message: message.to_string(),
    };
    let parsed = url::Url::parse(raw).map_err(|e| invalid(&format!("invalid URL: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid("only HTTP and HTTPS URLs are supported"));
    }
    if parsed.host_str().is_none() {
        return Err(invalid("URL is missing a host"));
    }
    Ok(())
}

fn validate_frequency(frequency: i64) -> Result<(), ServerError> {
    if frequency <= 0 {
        return Err(ServerError::Invalid {
            field: "frequency",
            message: "frequency must be greater than 0".to_string(),
        });
    }
    Ok(())
}

async fn list_datasources(
    State(db): State<SharedDb>,
    Query(page): Query<Pagination>,
) -> Json<Vec<DataSource>> {
    let db = db.read().await;
    Json(db.rows.values().skip(page.skip).take(page.limit).cloned().collect())
}

async fn create_datasource(
    State(db): State<SharedDb>,
    Json(input): Json<CreateDataSource>,
) -> Result<(StatusCode, Json<DataSource>), ServerError> {
    validate_url(&input.url)?;
    validate_frequency(input.frequency)?;

    let mut db = db.write().await;
    db.next_id += 1;
    let now = Utc::now();
    let datasource = DataSource {
        id: db.next_id,
        name: input.name,
        url: input.url,
        description: input.description,
        start_time: input.start_time,
        frequency: input.frequency,
        created_at: now,
        updated_at: now,
    };
    db.rows.insert(datasource.id, datasource.clone());
    debug!(id = datasource.id, "created datasource");
    Ok((StatusCode::CREATED, Json(datasource)))
}

async fn get_datasource(
    State(db): State<SharedDb>,
    Path(id): Path<i64>,
) -> Result<Json<DataSource>, ServerError> {
    let db = db.read().await;
    db.rows.get(&id).cloned().map(Json).ok_or(ServerError::NotFound)
}

async fn update_datasource(
    State(db): State<SharedDb>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateDataSource>,
) -> Result<Json<DataSource>, ServerError> {
    if let Some(url) = &input.url {
        validate_url(url)?;
    }
    if let Some(frequency) = input.frequency {
        validate_frequency(frequency)?;
    }

    let mut db = db.write().await;
    let datasource = db.rows.get_mut(&id).ok_or(ServerError::NotFound)?;
    if let Some(name) = input.name {
        datasource.name = name;
    }
    if let Some(url) = input.url {
        datasource.url = url;
    }
    if let Some(description) = input.description {
        datasource.description = description;
    }
    if let Some(start_time) = input.start_time {
        datasource.start_time = start_time;
    }
    if let Some(frequency) = input.frequency {
        datasource.frequency = frequency;
    }
    datasource.updated_at = Utc::now();
    Ok(Json(datasource.clone()))
}

async fn delete_datasource(
    State(db): State<SharedDb>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ServerError> {
    let mut db = db.write().await;
    db.rows.remove(&id).ok_or(ServerError::NotFound)?;
    debug!(id, "deleted datasource");
    Ok(StatusCode::NO_CONTENT)
}
