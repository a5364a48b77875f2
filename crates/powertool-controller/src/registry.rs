//! Tool registry lookup
//!
//! A tool name resolves to the `PowerToolConfig` named `<tool>-config`,
//! searched through an ordered list of namespaces. The first hit wins.

use async_trait::async_trait;
use kube::api::Api;
use kube::Client;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use powertool_common::crd::PowerToolConfig;
use powertool_common::tool_config_name;

use crate::error::ReconcileError;

/// Read-only lookup of tool registry entries
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    /// Find the registry entry for `tool` on behalf of a job in `job_namespace`
    async fn find(
        &self,
        tool: &str,
        job_namespace: &str,
    ) -> Result<Option<PowerToolConfig>, ReconcileError>;
}

/// One step of the registry search order
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SearchScope {
    /// A fixed namespace
    Namespace(String),
    /// The namespace of the job being reconciled
    JobNamespace,
}

impl SearchScope {
    fn resolve<'a>(&'a self, job_namespace: &'a str) -> &'a str {
        match self {
            Self::Namespace(ns) => ns,
            Self::JobNamespace => job_namespace,
        }
    }
}

/// Namespaces to search for a job in `job_namespace`, without repeats
pub fn search_namespaces<'a>(order: &'a [SearchScope], job_namespace: &'a str) -> Vec<&'a str> {
    let mut namespaces: Vec<&str> = Vec::with_capacity(order.len());
    for scope in order {
        let ns = scope.resolve(job_namespace);
        if !namespaces.contains(&ns) {
            namespaces.push(ns);
        }
    }
    namespaces
}

/// Registry backed by PowerToolConfig resources
pub struct KubeToolRegistry {
    client: Client,
    search_order: Vec<SearchScope>,
}

impl KubeToolRegistry {
    /// Create a registry with an explicit search order
    pub fn new(client: Client, search_order: Vec<SearchScope>) -> Self {
        Self {
            client,
            search_order,
        }
    }

    /// System namespace first, then the job's namespace
    pub fn with_system_namespace(client: Client, system_namespace: impl Into<String>) -> Self {
        Self::new(
            client,
            vec![
                SearchScope::Namespace(system_namespace.into()),
                SearchScope::JobNamespace,
            ],
        )
    }
}

#[async_trait]
impl ToolRegistry for KubeToolRegistry {
    async fn find(
        &self,
        tool: &str,
        job_namespace: &str,
    ) -> Result<Option<PowerToolConfig>, ReconcileError> {
        let name = tool_config_name(tool);
        for namespace in search_namespaces(&self.search_order, job_namespace) {
            let api: Api<PowerToolConfig> = Api::namespaced(self.client.clone(), namespace);
            if let Some(config) = api.get_opt(&name).await? {
                debug!(tool, namespace, config = %name, "resolved tool configuration");
                return Ok(Some(config));
            }
        }
        Ok(None)
    }
}
