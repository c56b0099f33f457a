use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::admission_review::{AdmissionRequest, AdmissionResponse};

pub(crate) mod api_error;
pub(crate) mod handlers;
pub(crate) mod service;
pub(crate) mod state;

use handlers::{mutate_handler, readiness_handler};
use state::ApiServerState;

pub const MUTATE_PATH: &str = "/mutate";
pub const READINESS_PATH: &str = "/readiness";

pub(crate) fn router(state: Arc<ApiServerState>) -> Router {
    Router::new()
        .route(MUTATE_PATH, post(mutate_handler))
        .route(READINESS_PATH, get(readiness_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub(crate) fn populate_span_with_admission_request_data(adm_req: &AdmissionRequest) {
    Span::current().record("request_uid", adm_req.uid.as_str());
    Span::current().record(
        "namespace",
        adm_req.namespace.as_deref().unwrap_or_default(),
    );
    Span::current().record("name", adm_req.name.as_deref().unwrap_or_default());
    Span::current().record("operation", adm_req.operation.as_str());
    Span::current().record(
        "subresource",
        adm_req.sub_resource.as_deref().unwrap_or_default(),
    );
    Span::current().record(
        "user",
        adm_req.user_info.username.as_deref().unwrap_or_default(),
    );
}

pub(crate) fn populate_span_with_admission_response(response: &AdmissionResponse) {
    Span::current().record("allowed", response.allowed);
    if let Some(message) = response
        .status
        .as_ref()
        .and_then(|status| status.message.as_deref())
    {
        Span::current().record("response_message", message);
    }
}
