use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, PostParams};
#[cfg(test)]
use mockall::automock;

use crate::errors::{Result, StoreError};

/// Access to the Pods being annotated.
///
/// `update` writes back the whole object. Implementations backed by the
/// Kubernetes API honour the object's `resourceVersion`, hence a concurrent
/// modification surfaces as a `StoreError::Write`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PodStore: Send + Sync {
    async fn get(&self, namespace: &str, name: &str) -> Result<Pod>;

    async fn update(&self, pod: &Pod) -> Result<()>;
}

/// A `PodStore` talking to the Kubernetes API server.
///
/// The `kube::Client` is created once and shared by all the requests.
#[derive(Clone)]
pub struct KubePodStore {
    client: kube::Client,
}

impl KubePodStore {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    /// Build the client from the environment: the in-cluster service account
    /// when running inside of a Pod, the local kubeconfig otherwise.
    pub async fn try_default() -> Result<Self> {
        kube::Client::try_default()
            .await
            .map(Self::new)
            .map_err(|e| StoreError::Config(e.to_string()))
    }
}

#[async_trait]
impl PodStore for KubePodStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Pod> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);

        match pods.get_opt(name).await {
            Ok(Some(pod)) => Ok(pod),
            Ok(None) => Err(StoreError::NotFound {
                namespace: namespace.to_owned(),
                name: name.to_owned(),
            }),
            Err(e) => Err(StoreError::Read {
                namespace: namespace.to_owned(),
                name: name.to_owned(),
                reason: e.to_string(),
            }),
        }
    }

    async fn update(&self, pod: &Pod) -> Result<()> {
        let (namespace, name) = match (
            pod.metadata.namespace.as_deref(),
            pod.metadata.name.as_deref(),
        ) {
            (Some(namespace), Some(name)) => (namespace, name),
            _ => return Err(StoreError::MissingTarget),
        };

        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        pods.replace(name, &PostParams::default(), pod)
            .await
            .map(|_| ())
            .map_err(|e| StoreError::Write {
                namespace: namespace.to_owned(),
                name: name.to_owned(),
                reason: e.to_string(),
            })
    }
}

/// Stand-in used when the Kubernetes client could not be built at startup
/// and the user asked to keep running anyway. Every call fails.
pub struct UnavailablePodStore {
    reason: String,
}

impl UnavailablePodStore {
    pub fn new(reason: String) -> Self {
        Self { reason }
    }
}

#[async_trait]
impl PodStore for UnavailablePodStore {
    async fn get(&self, _namespace: &str, _name: &str) -> Result<Pod> {
        Err(StoreError::Config(self.reason.clone()))
    }

    async fn update(&self, _pod: &Pod) -> Result<()> {
        Err(StoreError::Config(self.reason.clone()))
    }
}
