use crate::annotator::Annotator;

pub(crate) struct ApiServerState {
    pub(crate) annotator: Annotator,
}
