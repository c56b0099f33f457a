use crate::admission_review::{AdmissionRequest, Operation};

pub const EXEC_SUBRESOURCE: &str = "exec";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    /// An interactive exec into a Pod: the target gets annotated
    InScope,
    /// Anything else, allowed without being looked at
    OutOfScope,
}

/// Decide whether the request is an exec connection. Only `CONNECT` on the
/// `exec` sub-resource is in scope; the match is case sensitive.
pub fn classify(request: &AdmissionRequest) -> Scope {
    match (&request.operation, request.sub_resource.as_deref()) {
        (Operation::Connect, Some(EXEC_SUBRESOURCE)) => Scope::InScope,
        _ => Scope::OutOfScope,
    }
}
