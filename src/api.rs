use std::convert::Infallible;
use std::path::PathBuf;

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;
use warp::filters::body::BodyDeserializeError;
use warp::http::StatusCode;
use warp::reject;
use warp::reply::{Reply, Response};
use warp::{Filter, Rejection};

use crate::db::{Entry, SharedStore, Store};

/// Body of `POST /api/entries`. Both fields are checked by hand so a missing
/// one gets the fixed validation message instead of a parser error.
#[derive(Debug, Clone, Deserialize)]
pub struct NewEntry {
    pub date: Option<String>,
    pub hours: Option<f64>,
}

impl NewEntry {
    fn into_parts(self) -> Result<(String, f64), ApiError> {
        match (self.date.filter(|date| !date.is_empty()), self.hours) {
            (Some(date), Some(hours)) => Ok((date, hours)),
            _ => Err(ApiError::MissingFields),
        }
    }
}

#[derive(Debug, Serialize)]
struct Saved {
    success: bool,
    date: String,
    hours: f64,
}

impl From<Entry> for Saved {
    fn from(entry: Entry) -> Self {
        Saved {
            success: true,
            date: entry.date,
            hours: entry.hours,
        }
    }
}

#[derive(Debug, Serialize)]
struct Success {
    success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Fields date and hours are required")]
    MissingFields,

    #[error("Date in path is not valid UTF-8: {0}")]
    InvalidDate(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingFields | ApiError::InvalidDate(_) => StatusCode::BAD_REQUEST,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn into_response(self) -> Response {
        match &self {
            ApiError::MissingFields => info!("rejected entry without date or hours"),
            ApiError::InvalidDate(segment) => info!(segment = %segment, "rejected undecodable date"),
            ApiError::Storage(e) => error!(error = %e, "storage failure"),
        }
        error_response(&self.to_string(), self.status())
    }
}

fn error_response(message: &str, status: StatusCode) -> Response {
    let body = ErrorBody {
        error: message.to_string(),
    };
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

/// Path segments arrive percent-encoded; stored dates do not.
fn decode_date(segment: &str) -> Result<String, ApiError> {
    percent_decode_str(segment)
        .decode_utf8()
        .map(|date| date.into_owned())
        .map_err(|_| ApiError::InvalidDate(segment.to_string()))
}

fn json_body() -> impl Filter<Extract = (NewEntry,), Error = Rejection> + Clone {
    warp::body::content_length_limit(1024 * 16).and(warp::body::json())
}

fn with_store(store: SharedStore) -> impl Filter<Extract = (SharedStore,), Error = Infallible> + Clone {
    warp::any().map(move || store.clone())
}

// Filters
pub fn list_entries(store: SharedStore) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "entries")
        .and(warp::get())
        .and(with_store(store))
        .and_then(list_entries_handler)
}

pub fn post_entry(store: SharedStore) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "entries")
        .and(warp::post())
        .and(json_body())
        .and(with_store(store))
        .and_then(post_entry_handler)
}

pub fn delete_entry(store: SharedStore) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "entries" / String)
        .and(warp::delete())
        .and(with_store(store))
        .and_then(delete_entry_handler)
}

/// The browser client, served at `/`.
pub fn index(file: PathBuf) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path::end().and(warp::get()).and(warp::fs::file(file))
}

/// Every endpoint, with CORS, JSON rejections and a request span.
pub fn routes(
    store: SharedStore,
    index_file: PathBuf,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let cors = warp::cors()
        .allow_any_origin()
        .allow_header("content-type")
        .allow_methods(vec!["GET", "POST", "DELETE"]);

    list_entries(store.clone())
        .or(post_entry(store.clone()))
        .or(delete_entry(store))
        .or(index(index_file))
        .recover(handle_rejection)
        .with(cors)
        .with(warp::trace(|info| {
            tracing::info_span!(
                "http_request",
                method = %info.method(),
                path = %info.path(),
                request_id = %Uuid::new_v4(),
            )
        }))
}

// Handlers
#[tracing::instrument(skip(store))]
async fn list_entries_handler(store: SharedStore) -> Result<Response, Infallible> {
    match store.list_entries().await {
        Ok(entries) => Ok(warp::reply::json(&entries).into_response()),
        Err(e) => Ok(ApiError::from(e).into_response()),
    }
}

#[tracing::instrument(skip(store))]
async fn post_entry_handler(new_entry: NewEntry, store: SharedStore) -> Result<Response, Infallible> {
    let (date, hours) = match new_entry.into_parts() {
        Ok(parts) => parts,
        Err(e) => return Ok(e.into_response()),
    };

    match store.upsert_entry(&date, hours).await {
        Ok(entry) => Ok(warp::reply::json(&Saved::from(entry)).into_response()),
        Err(e) => Ok(ApiError::from(e).into_response()),
    }
}

#[tracing::instrument(skip(store))]
async fn delete_entry_handler(segment: String, store: SharedStore) -> Result<Response, Infallible> {
    let date = match decode_date(&segment) {
        Ok(date) => date,
        Err(e) => return Ok(e.into_response()),
    };

    match store.delete_entry(&date).await {
        Ok(()) => Ok(warp::reply::json(&Success { success: true }).into_response()),
        Err(e) => Ok(ApiError::from(e).into_response()),
    }
}

/// Turn rejections into JSON errors. Anything unexpected is a 500.
async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if let Some(e) = err.find::<BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if let Some(e) = err.find::<reject::PayloadTooLarge>() {
        (StatusCode::PAYLOAD_TOO_LARGE, e.to_string())
    } else if let Some(e) = err.find::<reject::LengthRequired>() {
        (StatusCode::LENGTH_REQUIRED, e.to_string())
    } else if let Some(e) = err.find::<reject::UnsupportedMediaType>() {
        (StatusCode::UNSUPPORTED_MEDIA_TYPE, e.to_string())
    } else if let Some(e) = err.find::<reject::MethodNotAllowed>() {
        (StatusCode::METHOD_NOT_ALLOWED, e.to_string())
    } else {
        error!(rejection = ?err, "unhandled rejection");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Unhandled rejection: {:?}", err),
        )
    };

    Ok(error_response(&message, status))
}
