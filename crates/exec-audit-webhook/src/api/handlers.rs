use std::sync::Arc;

use axum::{
    extract::{self, FromRequest},
    http::StatusCode,
    Json,
};
use tracing::debug;

use crate::{
    admission_review::AdmissionReview,
    api::{
        api_error::ApiError, populate_span_with_admission_response, service::review,
        state::ApiServerState,
    },
};

// create an extractor that internally uses `axum::Json` but has a custom rejection
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub(crate) struct JsonExtractor<T>(T);

#[tracing::instrument(
    name = "admission_review",
    fields(
        request_uid=tracing::field::Empty,
        host=crate::config::HOSTNAME.as_str(),
        name=tracing::field::Empty,
        namespace=tracing::field::Empty,
        operation=tracing::field::Empty,
        subresource=tracing::field::Empty,
        user=tracing::field::Empty,
        allowed=tracing::field::Empty,
        response_message=tracing::field::Empty,
    ),
    skip_all)]
/// Review an exec request, annotating the target Pod when needed.
pub(crate) async fn mutate_handler(
    extract::State(state): extract::State<Arc<ApiServerState>>,
    JsonExtractor(admission_review): JsonExtractor<AdmissionReview>,
) -> Json<AdmissionReview> {
    debug!(admission_review = ?admission_review, "admission review received");

    let response = review(&state, admission_review).await;

    populate_span_with_admission_response(&response);

    Json(AdmissionReview::new_with_response(response))
}

pub(crate) async fn readiness_handler() -> StatusCode {
    StatusCode::OK
}
