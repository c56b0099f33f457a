use axum::{
    extract::rejection::JsonRejection,
    http::{header, StatusCode},
    response::IntoResponse,
};
use tracing::error;

pub(crate) const DECODE_ERROR_MESSAGE: &str = "Failed to decode request";

#[derive(Debug)]
/// An error returned before any admission semantics apply.
/// It is rendered as a plain text body, without any AdmissionReview
/// envelope.
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) message: String,
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        // The uid cannot be trusted, nor extracted, from a body that
        // cannot be decoded. Whatever the reason, this is a bad request.
        error!(
            error = rejection.body_text().as_str(),
            "Failed to decode admission review"
        );

        Self {
            status: StatusCode::BAD_REQUEST,
            message: DECODE_ERROR_MESSAGE.to_owned(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (
            self.status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.message,
        )
            .into_response()
    }
}
