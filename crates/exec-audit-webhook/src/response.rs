use crate::admission_review::{AdmissionResponse, AdmissionResponseStatus};

pub const DEFAULT_DENIAL_MESSAGE: &str = "Failed to process exec request";
const DENIAL_CODE: u16 = 500;

/// The outcome of a review, as decided by the caller
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny(String),
}

/// Build the AdmissionResponse for the request identified by `uid`.
///
/// The uid is always the one of the request being answered, it is never
/// generated here. Denials always carry a non-empty message, allowed
/// responses never carry a status.
pub fn build(uid: String, verdict: Verdict) -> AdmissionResponse {
    match verdict {
        Verdict::Allow => AdmissionResponse {
            uid,
            allowed: true,
            status: None,
        },
        Verdict::Deny(message) => {
            let message = if message.trim().is_empty() {
                DEFAULT_DENIAL_MESSAGE.to_owned()
            } else {
                message
            };

            AdmissionResponse {
                uid,
                allowed: false,
                status: Some(AdmissionResponseStatus {
                    message: Some(message),
                    code: Some(DENIAL_CODE),
                }),
            }
        }
    }
}
