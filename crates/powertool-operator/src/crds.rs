//! CRD installation using server-side apply, so installed CRDs always match
//! the operator version

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, CustomResourceExt};

use powertool_common::crd::{PowerTool, PowerToolConfig};
use powertool_common::POWERTOOL_CONTROLLER_NAME;

/// CRD definition with name and resource
pub struct CrdDef {
    /// Fully qualified CRD name
    pub name: &'static str,
    /// Generated CRD
    pub crd: CustomResourceDefinition,
}

/// All CRDs owned by the operator
pub fn all_crds() -> Vec<CrdDef> {
    vec![
        CrdDef {
            name: "powertools.codriverlabs.ai.toe.run",
            crd: PowerTool::crd(),
        },
        CrdDef {
            name: "powertoolconfigs.codriverlabs.ai.toe.run",
            crd: PowerToolConfig::crd(),
        },
    ]
}

/// Render all CRDs as a multi-document YAML stream
pub fn render_crds() -> anyhow::Result<String> {
    let docs = all_crds()
        .iter()
        .map(|def| {
            serde_yaml::to_string(&def.crd)
                .map_err(|e| anyhow::anyhow!("Failed to serialize CRD {}: {}", def.name, e))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(docs.join("---\n"))
}

/// Install or update all CRDs
pub async fn ensure_crds_installed(client: &Client) -> anyhow::Result<()> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(POWERTOOL_CONTROLLER_NAME).force();

    for def in all_crds() {
        tracing::info!(crd = def.name, "Installing CRD");
        crds.patch(def.name, &params, &Patch::Apply(&def.crd))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to install {} CRD: {}", def.name, e))?;
    }

    tracing::info!("All PowerTool CRDs installed/updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crd_names_match_generated_metadata() {
        for def in all_crds() {
            assert_eq!(def.crd.metadata.name.as_deref(), Some(def.name));
        }
    }

    #[test]
    fn rendered_stream_contains_both_kinds() {
        let yaml = render_crds().expect("render");
        assert!(yaml.contains("kind: PowerTool\n"));
        assert!(yaml.contains("kind: PowerToolConfig\n"));
        assert_eq!(yaml.matches("---\n").count(), 1);
    }

    #[test]
    fn both_crds_are_namespaced_with_status() {
        for def in all_crds() {
            assert_eq!(def.crd.spec.scope, "Namespaced");
            let version = &def.crd.spec.versions[0];
            assert_eq!(version.name, "v1alpha1");
            assert!(version
                .subresources
                .as_ref()
                .and_then(|s| s.status.as_ref())
                .is_some());
        }
    }
}
