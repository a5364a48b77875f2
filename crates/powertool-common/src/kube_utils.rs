//! Kubernetes client helpers

use std::path::Path;
use std::time::Duration;

use k8s_openapi::api::core::v1::ObjectReference;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config, Resource, ResourceExt};

use crate::Error;

/// Default connect timeout for API clients
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default read timeout for API clients
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Create a kube client from an optional kubeconfig path with default timeouts
pub async fn create_client(kubeconfig: Option<&Path>) -> Result<Client, Error> {
    create_client_with_timeout(kubeconfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT).await
}

/// Create a kube client from an optional kubeconfig path with custom timeouts
///
/// Without a path the config is inferred (in-cluster, then `KUBECONFIG`).
pub async fn create_client_with_timeout(
    kubeconfig: Option<&Path>,
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<Client, Error> {
    let mut config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                Error::internal_with_context(
                    "create_client",
                    format!("failed to read kubeconfig: {}", e),
                )
            })?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| {
                    Error::internal_with_context(
                        "create_client",
                        format!("failed to load kubeconfig: {}", e),
                    )
                })?
        }
        None => Config::infer().await.map_err(|e| {
            Error::internal_with_context("create_client", format!("failed to infer config: {}", e))
        })?,
    };
    config.connect_timeout = Some(connect_timeout);
    config.read_timeout = Some(read_timeout);
    Client::try_from(config).map_err(|e| {
        Error::internal_with_context("create_client", format!("failed to create client: {}", e))
    })
}

/// Build an ObjectReference for Events about `obj`
pub fn object_ref<K>(obj: &K) -> ObjectReference
where
    K: Resource<DynamicType = ()>,
{
    let mut reference = obj.object_ref(&());
    if reference.namespace.is_none() {
        reference.namespace = obj.namespace();
    }
    reference
}

/// Whether a kube error is an HTTP 404 from the API server
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 404)
}

/// Whether a kube error is an HTTP 409 (stale resourceVersion or already exists)
pub fn is_conflict(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 409)
}

/// Whether a kube error may succeed on retry
///
/// 4xx rejections need a changed request, except 409 which only means the
/// read was stale.
pub fn is_retryable(err: &kube::Error) -> bool {
    match err {
        kube::Error::Api(ae) if ae.code == 409 => true,
        kube::Error::Api(ae) => !(400..500).contains(&ae.code),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{PowerTool, PowerToolSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: "test".to_string(),
            reason: "Test".to_string(),
            code,
        })
    }

    #[test]
    fn classifies_api_errors() {
        assert!(is_not_found(&api_error(404)));
        assert!(!is_not_found(&api_error(409)));
        assert!(is_conflict(&api_error(409)));
        assert!(!is_conflict(&api_error(500)));
    }

    #[test]
    fn only_stale_writes_and_server_errors_are_retryable() {
        assert!(is_retryable(&api_error(409)));
        assert!(is_retryable(&api_error(503)));
        assert!(!is_retryable(&api_error(403)));
        assert!(!is_retryable(&api_error(422)));
    }

    #[test]
    fn object_ref_carries_identity() {
        let pt = PowerTool {
            metadata: ObjectMeta {
                name: Some("cpu".to_string()),
                namespace: Some("default".to_string()),
                uid: Some("abc".to_string()),
                ..Default::default()
            },
            spec: PowerToolSpec {
                targets: Default::default(),
                tool: Default::default(),
                output: Default::default(),
            },
            status: None,
        };
        let reference = object_ref(&pt);
        assert_eq!(reference.name.as_deref(), Some("cpu"));
        assert_eq!(reference.namespace.as_deref(), Some("default"));
        assert_eq!(reference.kind.as_deref(), Some("PowerTool"));
        assert_eq!(reference.uid.as_deref(), Some("abc"));
    }
}
