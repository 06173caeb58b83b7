//! JSON body extractor whose rejections use the crate's error body.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
};
use serde::de::DeserializeOwned;

use super::errors::ApiError;

/// Like [`axum::Json`], but a malformed or incomplete body becomes a
/// `400 {"error": ...}` naming the offending field.
#[derive(Debug, Clone)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(request, state).await?;
        Ok(Self(value))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            // "Failed to deserialize ...: missing field `password` at line 1 column 19"
            JsonRejection::JsonDataError(e) => {
                let text = e.body_text();
                let detail = text.split_once(": ").map_or(text.as_str(), |(_, d)| d);
                ApiError::new(
                    StatusCode::BAD_REQUEST,
                    format!("Invalid request body: {detail}"),
                )
            }
            JsonRejection::JsonSyntaxError(_) => {
                ApiError::new(StatusCode::BAD_REQUEST, "Malformed JSON body")
            }
            other => ApiError::new(other.status(), other.body_text()),
        }
    }
}
