use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use thiserror::Error;
use tide::http::StatusCode;
use tide::{Next, Request, Response};

use crate::store::StoreError;
use imghost_api_structs::ErrorBody;

const ALLOW_METHODS: &str = "GET,OPTIONS,PATCH,DELETE,POST,PUT";
const ALLOW_HEADERS: &str = "X-CSRF-Token, X-Requested-With, Accept, Accept-Version, \
                             Content-Length, Content-MD5, Content-Type, Date, X-Api-Version";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Server configuration error")]
    Configuration,
    #[error("{0}")]
    Upstream(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BadRequest,
            ApiError::NotFound(_) => StatusCode::NotFound,
            ApiError::MethodNotAllowed => StatusCode::MethodNotAllowed,
            ApiError::Configuration => StatusCode::InternalServerError,
            ApiError::Upstream(_) => StatusCode::InternalServerError,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unauthorized(message) => {
                tracing::error!("GitHub rejected the server credentials: {}", message);
                ApiError::Configuration
            },
            err => ApiError::Upstream(err.to_string()),
        }
    }
}

/// Renders a handler outcome as JSON, errors as `{"error": ...}`.
pub(super) fn respond<T: Serialize>(result: Result<T, ApiError>) -> tide::Result<Response> {
    match result {
        Ok(body) => Ok(Response::builder(StatusCode::Ok)
            .body(tide::Body::from_json(&body)?)
            .build()),
        Err(err) => {
            let status = err.status();
            if status.is_server_error() {
                tracing::error!("request failed: {}", err);
            } else {
                tracing::debug!("request rejected: {}", err);
            }
            Ok(Response::builder(status)
                .body(tide::Body::from_json(&ErrorBody {
                    error: err.to_string(),
                })?)
                .build())
        },
    }
}

/// Adds permissive cross-origin headers to every API response.
pub(super) fn cors<'a>(
    req: Request<crate::State>,
    next: Next<'a, crate::State>,
) -> Pin<Box<dyn Future<Output = tide::Result> + Send + 'a>> {
    Box::pin(async move {
        let mut res = next.run(req).await;
        res.insert_header("Access-Control-Allow-Credentials", "true");
        res.insert_header("Access-Control-Allow-Origin", "*");
        res.insert_header("Access-Control-Allow-Methods", ALLOW_METHODS);
        res.insert_header("Access-Control-Allow-Headers", ALLOW_HEADERS);
        Ok(res)
    })
}

pub(super) async fn preflight(_req: Request<crate::State>) -> tide::Result<Response> {
    Ok(Response::new(StatusCode::Ok))
}

pub(super) async fn method_not_allowed(_req: Request<crate::State>) -> tide::Result<Response> {
    respond::<()>(Err(ApiError::MethodNotAllowed))
}

pub(super) fn invalid_body(err: tide::Error) -> ApiError {
    ApiError::Validation(format!("Invalid request body: {}", err))
}
