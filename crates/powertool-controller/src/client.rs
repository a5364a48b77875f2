//! Kubernetes operations used by the reconciliation engine
//!
//! The trait keeps the engine testable against mocks; [`KubeClientImpl`] is
//! the production implementation.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{EphemeralContainer, Pod};
use kube::api::{Api, ListParams, PostParams};
use kube::{Client, ResourceExt};
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use powertool_common::crd::PowerTool;

use crate::error::ReconcileError;

/// Trait abstracting Kubernetes client operations for PowerTool
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KubeClient: Send + Sync {
    /// Fetch a PowerTool; `None` when it no longer exists
    async fn get_power_tool(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<PowerTool>, ReconcileError>;

    /// Replace the status subresource.
    ///
    /// The object's resourceVersion makes this a compare-and-swap: a
    /// concurrent write fails with 409. Returns the stored object.
    async fn replace_status(&self, power_tool: &PowerTool) -> Result<PowerTool, ReconcileError>;

    /// List pods in `namespace` matching a label query (empty matches all)
    async fn list_pods(&self, namespace: &str, label_query: &str)
        -> Result<Vec<Pod>, ReconcileError>;

    /// List all PowerTools in `namespace`
    async fn list_power_tools(&self, namespace: &str) -> Result<Vec<PowerTool>, ReconcileError>;

    /// Append an ephemeral container to `pod` through the ephemeralcontainers
    /// subresource, conditional on the pod's resourceVersion
    async fn add_ephemeral_container(
        &self,
        pod: &Pod,
        container: &EphemeralContainer,
    ) -> Result<(), ReconcileError>;
}

/// Real Kubernetes client implementation
pub struct KubeClientImpl {
    client: Client,
}

impl KubeClientImpl {
    /// Create a new KubeClientImpl wrapping the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl KubeClient for KubeClientImpl {
    async fn get_power_tool(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<PowerTool>, ReconcileError> {
        let api: Api<PowerTool> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn replace_status(&self, power_tool: &PowerTool) -> Result<PowerTool, ReconcileError> {
        let namespace = power_tool
            .namespace()
            .ok_or(ReconcileError::MissingNamespace)?;
        let api: Api<PowerTool> = Api::namespaced(self.client.clone(), &namespace);
        let data = serde_json::to_vec(power_tool)?;
        let stored = api
            .replace_status(&power_tool.name_any(), &PostParams::default(), data)
            .await?;
        Ok(stored)
    }

    async fn list_pods(
        &self,
        namespace: &str,
        label_query: &str,
    ) -> Result<Vec<Pod>, ReconcileError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = if label_query.is_empty() {
            ListParams::default()
        } else {
            ListParams::default().labels(label_query)
        };
        let pods = api.list(&params).await?;
        debug!(namespace, label_query, count = pods.items.len(), "listed target pods");
        Ok(pods.items)
    }

    async fn list_power_tools(&self, namespace: &str) -> Result<Vec<PowerTool>, ReconcileError> {
        let api: Api<PowerTool> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn add_ephemeral_container(
        &self,
        pod: &Pod,
        container: &EphemeralContainer,
    ) -> Result<(), ReconcileError> {
        let namespace = pod.namespace().ok_or(ReconcileError::MissingNamespace)?;
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &namespace);

        let mut updated = pod.clone();
        if let Some(spec) = updated.spec.as_mut() {
            spec.ephemeral_containers
                .get_or_insert_with(Vec::new)
                .push(container.clone());
        }

        api.replace_ephemeral_containers(&pod.name_any(), &PostParams::default(), &updated)
            .await?;
        Ok(())
    }
}
