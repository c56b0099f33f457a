use tracing::{error, info, warn};

use crate::{
    admission_review::{AdmissionRequest, AdmissionResponse, AdmissionReview},
    annotator::Annotator,
    api::{populate_span_with_admission_request_data, state::ApiServerState},
    errors::{Result, StoreError},
    filter::{self, Scope},
    response::{self, Verdict, DEFAULT_DENIAL_MESSAGE},
};

/// Run an AdmissionReview through the decision pipeline and build the answer.
///
/// * no request inside of the review: allowed, nothing else happens
/// * anything but an exec connection: allowed, the store is not touched
/// * exec connection: the target Pod is annotated, the request is denied
///   when the annotation fails
pub(crate) async fn review(
    state: &ApiServerState,
    admission_review: AdmissionReview,
) -> AdmissionResponse {
    let Some(request) = admission_review.request else {
        warn!("No request found in admission review");
        return response::build(String::new(), Verdict::Allow);
    };

    populate_span_with_admission_request_data(&request);

    let verdict = match filter::classify(&request) {
        Scope::OutOfScope => {
            info!(
                operation = request.operation.as_str(),
                subresource = request.sub_resource.as_deref().unwrap_or_default(),
                "Skipping non-exec request"
            );
            Verdict::Allow
        }
        Scope::InScope => match annotate_target(&state.annotator, &request).await {
            Ok(()) => Verdict::Allow,
            Err(err) => {
                error!(
                    namespace = request.namespace.as_deref().unwrap_or_default(),
                    name = request.name.as_deref().unwrap_or_default(),
                    error = err.to_string().as_str(),
                    "Failed to annotate pod"
                );
                Verdict::Deny(DEFAULT_DENIAL_MESSAGE.to_owned())
            }
        },
    };

    response::build(request.uid, verdict)
}

async fn annotate_target(annotator: &Annotator, request: &AdmissionRequest) -> Result<()> {
    let (Some(namespace), Some(name)) = (request.namespace.as_deref(), request.name.as_deref())
    else {
        return Err(StoreError::MissingTarget);
    };
    let username = request.user_info.username.as_deref().unwrap_or_default();

    annotator.annotate(namespace, name, username).await
}
