use std::{collections::BTreeMap, sync::Arc, time::Duration};

use chrono::{DateTime, SecondsFormat, Utc};
use k8s_openapi::api::core::v1::Pod;
use tracing::{debug, info};

use crate::{
    errors::{Result, StoreError},
    store::PodStore,
};

/// Annotation holding the name of the user who opened the exec session
pub const EXEC_USER_ANNOTATION: &str = "exec-user";
/// Annotation holding when the exec session was opened, RFC 3339 in UTC
pub const EXEC_TIME_ANNOTATION: &str = "exec-time";

/// Stamps the target Pod of an exec request with the audit annotations.
pub struct Annotator {
    store: Arc<dyn PodStore>,
    timeout: Duration,
}

impl Annotator {
    /// `timeout` bounds the whole read-modify-write sequence of a single
    /// annotation.
    pub fn new(store: Arc<dyn PodStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn annotate(&self, namespace: &str, name: &str, username: &str) -> Result<()> {
        self.annotate_at(namespace, name, username, Utc::now()).await
    }

    /// Fetch the Pod, set the `exec-user` and `exec-time` annotations and write
    /// it back. There are no retries: the first failure aborts the whole
    /// operation.
    pub async fn annotate_at(
        &self,
        namespace: &str,
        name: &str,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let exec_time = format_exec_time(now);

        tokio::time::timeout(
            self.timeout,
            self.read_modify_write(namespace, name, username, &exec_time),
        )
        .await
        .map_err(|_| StoreError::Timeout {
            namespace: namespace.to_owned(),
            name: name.to_owned(),
            timeout: self.timeout,
        })??;

        info!(
            namespace,
            name,
            exec_user = username,
            exec_time = exec_time.as_str(),
            "pod annotated"
        );

        Ok(())
    }

    async fn read_modify_write(
        &self,
        namespace: &str,
        name: &str,
        username: &str,
        exec_time: &str,
    ) -> Result<()> {
        let mut pod = self.store.get(namespace, name).await?;
        debug!(
            namespace,
            name,
            resource_version = pod.metadata.resource_version.as_deref().unwrap_or_default(),
            "pod fetched"
        );

        stamp(&mut pod, username, exec_time);

        self.store.update(&pod).await
    }
}

/// Set the audit annotations, creating the annotations map when the Pod has none.
/// Other annotations are left untouched.
fn stamp(pod: &mut Pod, username: &str, exec_time: &str) {
    let annotations = pod.metadata.annotations.get_or_insert_with(BTreeMap::new);
    annotations.insert(EXEC_USER_ANNOTATION.to_owned(), username.to_owned());
    annotations.insert(EXEC_TIME_ANNOTATION.to_owned(), exec_time.to_owned());
}

/// Render an instant the way it's stored inside of `exec-time`,
/// e.g. `2026-10-19T08:15:00Z`
pub fn format_exec_time(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}
