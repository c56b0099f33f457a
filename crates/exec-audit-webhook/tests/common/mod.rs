use std::{
    collections::{BTreeMap, HashMap},
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use axum::Router;
use exec_audit_webhook::{
    config::{Config, TlsConfig},
    errors::{Result, StoreError},
    store::PodStore,
    ExecAuditWebhook,
};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// A `PodStore` keeping the Pods in memory.
///
/// Writes are accepted only when the `resourceVersion` of the submitted Pod
/// matches the stored one, like the Kubernetes API server does.
#[derive(Default)]
pub(crate) struct InMemoryPodStore {
    pods: Mutex<HashMap<(String, String), Pod>>,
    gets: AtomicUsize,
    updates: AtomicUsize,
    fail_updates: AtomicBool,
}

impl InMemoryPodStore {
    pub(crate) fn with_pods(pods: Vec<Pod>) -> Self {
        let store = Self::default();
        for pod in pods {
            store.insert(pod);
        }
        store
    }

    pub(crate) fn insert(&self, pod: Pod) {
        let key = (
            pod.metadata.namespace.clone().unwrap_or_default(),
            pod.metadata.name.clone().unwrap_or_default(),
        );
        self.pods.lock().unwrap().insert(key, pod);
    }

    pub(crate) fn pod(&self, namespace: &str, name: &str) -> Option<Pod> {
        self.pods
            .lock()
            .unwrap()
            .get(&(namespace.to_owned(), name.to_owned()))
            .cloned()
    }

    pub(crate) fn annotations(&self, namespace: &str, name: &str) -> BTreeMap<String, String> {
        self.pod(namespace, name)
            .and_then(|pod| pod.metadata.annotations)
            .unwrap_or_default()
    }

    pub(crate) fn fail_updates(&self) {
        self.fail_updates.store(true, Ordering::SeqCst);
    }

    pub(crate) fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub(crate) fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PodStore for InMemoryPodStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Pod> {
        self.gets.fetch_add(1, Ordering::SeqCst);

        self.pod(namespace, name).ok_or_else(|| StoreError::NotFound {
            namespace: namespace.to_owned(),
            name: name.to_owned(),
        })
    }

    async fn update(&self, pod: &Pod) -> Result<()> {
        self.updates.fetch_add(1, Ordering::SeqCst);

        let namespace = pod.metadata.namespace.clone().unwrap_or_default();
        let name = pod.metadata.name.clone().unwrap_or_default();
        let write_error = |reason: &str| StoreError::Write {
            namespace: namespace.clone(),
            name: name.clone(),
            reason: reason.to_owned(),
        };

        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(write_error("the API server is unavailable"));
        }

        let mut pods = self.pods.lock().unwrap();
        let stored = pods
            .get_mut(&(namespace.clone(), name.clone()))
            .ok_or_else(|| write_error("the object has been deleted"))?;
        if stored.metadata.resource_version != pod.metadata.resource_version {
            return Err(write_error("the object has been modified"));
        }

        let next_version = stored
            .metadata
            .resource_version
            .as_deref()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or_default()
            + 1;
        let mut updated = pod.clone();
        updated.metadata.resource_version = Some(next_version.to_string());
        *stored = updated;

        Ok(())
    }
}

pub(crate) fn build_pod(namespace: &str, name: &str) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_owned()),
            namespace: Some(namespace.to_owned()),
            resource_version: Some("1".to_owned()),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub(crate) fn default_test_config() -> Config {
    Config {
        addr: "127.0.0.1:8443".parse().unwrap(),
        tls_config: TlsConfig {
            cert_file: PathBuf::from("/etc/webhook/certs/tls.crt"),
            key_file: PathBuf::from("/etc/webhook/certs/tls.key"),
            client_ca_file: vec![],
        },
        store_timeout: Duration::from_secs(5),
        ignore_kubernetes_connection_failure: false,
        log_level: "info".to_owned(),
        log_fmt: "json".to_owned(),
        log_no_color: false,
    }
}

pub(crate) fn app(store: Arc<InMemoryPodStore>) -> Router {
    ExecAuditWebhook::new_with_store(default_test_config(), store).router()
}
