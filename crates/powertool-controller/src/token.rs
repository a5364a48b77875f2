//! Bearer tokens for collector uploads

use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::authentication::v1::{TokenRequest, TokenRequestSpec};
use k8s_openapi::api::core::v1::ServiceAccount;
use kube::api::{Api, PostParams};
use kube::Client;

#[cfg(test)]
use mockall::automock;

use powertool_common::Error;

use crate::error::ReconcileError;

/// Added to the profiling duration so the token outlives the upload
pub const TOKEN_BUFFER: Duration = Duration::from_secs(60);

/// Shortest token lifetime the API server issues
pub const MIN_TOKEN_LIFETIME: Duration = Duration::from_secs(600);

/// Token lifetime for a profiling run of `duration`
pub fn token_lifetime(duration: Duration) -> Duration {
    (duration + TOKEN_BUFFER).max(MIN_TOKEN_LIFETIME)
}

/// Issues bearer tokens that the collector accepts
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Issue a token for `job` valid for at least `lifetime`
    async fn issue(&self, job: &str, lifetime: Duration) -> Result<String, ReconcileError>;
}

/// Issues tokens through the TokenRequest API of a service account
pub struct KubeTokenIssuer {
    client: Client,
    namespace: String,
    service_account: String,
    audience: String,
}

impl KubeTokenIssuer {
    /// Create an issuer for `service_account` in `namespace`
    pub fn new(
        client: Client,
        namespace: impl Into<String>,
        service_account: impl Into<String>,
        audience: impl Into<String>,
    ) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            service_account: service_account.into(),
            audience: audience.into(),
        }
    }
}

#[async_trait]
impl TokenIssuer for KubeTokenIssuer {
    async fn issue(&self, job: &str, lifetime: Duration) -> Result<String, ReconcileError> {
        let api: Api<ServiceAccount> = Api::namespaced(self.client.clone(), &self.namespace);

        let request = TokenRequest {
            metadata: Default::default(),
            spec: TokenRequestSpec {
                audiences: vec![self.audience.clone()],
                expiration_seconds: Some(lifetime.as_secs() as i64),
                bound_object_ref: None,
            },
            status: None,
        };

        let response = api
            .create_token_request(&self.service_account, &PostParams::default(), &request)
            .await?;

        let token = response
            .status
            .map(|s| s.token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                Error::internal_with_context(
                    "token",
                    format!("empty token issued for PowerTool {}", job),
                )
            })?;

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::short_run_clamped(Duration::from_secs(30), MIN_TOKEN_LIFETIME)]
    #[case::at_boundary(Duration::from_secs(540), Duration::from_secs(600))]
    #[case::long_run_buffered(Duration::from_secs(1_800), Duration::from_secs(1_860))]
    #[case::zero(Duration::ZERO, MIN_TOKEN_LIFETIME)]
    fn lifetime_is_buffered_and_clamped(#[case] duration: Duration, #[case] expected: Duration) {
        assert_eq!(token_lifetime(duration), expected);
    }
}
