//! Target pod resolution
//!
//! A job's label selector is compiled once per pass into a [`TargetSelector`],
//! rendered as a label query for the API server and re-checked in-process
//! against each returned pod. A missing selector selects nothing.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;

use powertool_common::crd::{LabelSelector, LabelSelectorOperator};

use crate::client::KubeClient;
use crate::error::ReconcileError;

/// Value of `POD_MATCHING_LABELS` when no selector label matches the pod
pub const UNKNOWN_MATCHING_LABELS: &str = "unknown";

#[derive(Clone, Debug, PartialEq)]
struct Requirement {
    key: String,
    operator: LabelSelectorOperator,
    values: Vec<String>,
}

impl Requirement {
    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.operator
            .matches(labels.get(&self.key).map(String::as_str), &self.values)
    }

    fn to_query(&self) -> String {
        match self.operator {
            LabelSelectorOperator::In if self.values.len() == 1 => {
                format!("{}={}", self.key, self.values[0])
            }
            LabelSelectorOperator::In => format!("{} in ({})", self.key, self.values.join(",")),
            LabelSelectorOperator::NotIn => {
                format!("{} notin ({})", self.key, self.values.join(","))
            }
            LabelSelectorOperator::Exists => self.key.clone(),
            LabelSelectorOperator::DoesNotExist => format!("!{}", self.key),
        }
    }
}

/// A validated label selector
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TargetSelector {
    requirements: Vec<Requirement>,
}

impl TargetSelector {
    /// Compile a selector, rejecting unknown operators and malformed value lists
    pub fn compile(selector: &LabelSelector) -> Result<Self, ReconcileError> {
        let mut requirements = Vec::new();

        for (key, value) in &selector.match_labels {
            if key.is_empty() {
                return Err(ReconcileError::InvalidSelector(
                    "matchLabels key must not be empty".to_string(),
                ));
            }
            requirements.push(Requirement {
                key: key.clone(),
                operator: LabelSelectorOperator::In,
                values: vec![value.clone()],
            });
        }

        for expr in &selector.match_expressions {
            if expr.key.is_empty() {
                return Err(ReconcileError::InvalidSelector(
                    "matchExpressions key must not be empty".to_string(),
                ));
            }
            let operator: LabelSelectorOperator = expr
                .operator
                .parse()
                .map_err(ReconcileError::InvalidSelector)?;
            match (operator.requires_values(), expr.values.is_empty()) {
                (true, true) => {
                    return Err(ReconcileError::InvalidSelector(format!(
                        "operator {} on key {} requires values",
                        operator, expr.key
                    )))
                }
                (false, false) => {
                    return Err(ReconcileError::InvalidSelector(format!(
                        "operator {} on key {} takes no values",
                        operator, expr.key
                    )))
                }
                _ => {}
            }
            requirements.push(Requirement {
                key: expr.key.clone(),
                operator,
                values: expr.values.clone(),
            });
        }

        Ok(Self { requirements })
    }

    /// Evaluate against a label map
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }

    /// Render in the API server's label query syntax
    pub fn to_query(&self) -> String {
        self.requirements
            .iter()
            .map(Requirement::to_query)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Resolve the pods a job targets, in the order the API returns them.
///
/// `None` selects nothing and makes no API call.
pub async fn resolve_targets(
    client: &dyn KubeClient,
    namespace: &str,
    selector: Option<&LabelSelector>,
) -> Result<Vec<Pod>, ReconcileError> {
    let Some(selector) = selector else {
        return Ok(Vec::new());
    };
    let compiled = TargetSelector::compile(selector)?;

    let pods = client.list_pods(namespace, &compiled.to_query()).await?;
    Ok(pods
        .into_iter()
        .filter(|pod| compiled.matches(pod.labels()))
        .collect())
}

/// First `matchLabels` pair (in key order) that `labels` also carries,
/// rendered as `key-value`
pub fn matching_label(selector: Option<&LabelSelector>, labels: &BTreeMap<String, String>) -> String {
    selector
        .and_then(|s| {
            s.match_labels
                .iter()
                .find(|(k, v)| labels.get(*k) == Some(*v))
        })
        .map(|(k, v)| format!("{}-{}", k, v))
        .unwrap_or_else(|| UNKNOWN_MATCHING_LABELS.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockKubeClient;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use powertool_common::crd::LabelSelectorRequirement;
    use rstest::rstest;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn selector(match_labels: &[(&str, &str)], exprs: Vec<LabelSelectorRequirement>) -> LabelSelector {
        LabelSelector {
            match_labels: labels(match_labels),
            match_expressions: exprs,
        }
    }

    fn expr(key: &str, operator: &str, values: &[&str]) -> LabelSelectorRequirement {
        LabelSelectorRequirement {
            key: key.to_string(),
            operator: operator.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    fn pod(name: &str, pod_labels: &[(&str, &str)]) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                labels: Some(labels(pod_labels)),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    mod compile {
        use super::*;

        #[test]
        fn renders_label_query() {
            let compiled = TargetSelector::compile(&selector(
                &[("app", "web")],
                vec![
                    expr("tier", "In", &["frontend", "edge"]),
                    expr("env", "NotIn", &["dev"]),
                    expr("team", "Exists", &[]),
                    expr("canary", "DoesNotExist", &[]),
                ],
            ))
            .expect("valid selector");

            assert_eq!(
                compiled.to_query(),
                "app=web,tier in (frontend,edge),env notin (dev),team,!canary"
            );
        }

        #[test]
        fn empty_selector_matches_everything() {
            let compiled = TargetSelector::compile(&LabelSelector::default()).expect("valid");
            assert_eq!(compiled.to_query(), "");
            assert!(compiled.matches(&labels(&[("anything", "goes")])));
            assert!(compiled.matches(&BTreeMap::new()));
        }

        #[rstest]
        #[case::unknown_operator(expr("app", "Equals", &["web"]))]
        #[case::in_without_values(expr("app", "In", &[]))]
        #[case::notin_without_values(expr("app", "NotIn", &[]))]
        #[case::exists_with_values(expr("app", "Exists", &["web"]))]
        #[case::empty_key(expr("", "Exists", &[]))]
        fn rejects_malformed_expressions(#[case] bad: LabelSelectorRequirement) {
            let err = TargetSelector::compile(&selector(&[], vec![bad])).unwrap_err();
            assert!(matches!(err, ReconcileError::InvalidSelector(_)));
            assert!(err.to_string().starts_with("invalid label selector"));
        }

        #[test]
        fn evaluates_all_requirements() {
            let compiled = TargetSelector::compile(&selector(
                &[("app", "web")],
                vec![expr("env", "NotIn", &["dev"])],
            ))
            .expect("valid");

            assert!(compiled.matches(&labels(&[("app", "web"), ("env", "prod")])));
            assert!(compiled.matches(&labels(&[("app", "web")])));
            assert!(!compiled.matches(&labels(&[("app", "web"), ("env", "dev")])));
            assert!(!compiled.matches(&labels(&[("app", "api")])));
        }
    }

    mod resolve {
        use super::*;

        #[tokio::test]
        async fn missing_selector_selects_nothing_without_listing() {
            let mut client = MockKubeClient::new();
            client.expect_list_pods().never();

            let pods = resolve_targets(&client, "default", None).await.expect("resolve");
            assert!(pods.is_empty());
        }

        #[tokio::test]
        async fn invalid_selector_fails_before_listing() {
            let mut client = MockKubeClient::new();
            client.expect_list_pods().never();

            let bad = selector(&[], vec![expr("app", "Like", &["web"])]);
            let err = resolve_targets(&client, "default", Some(&bad)).await.unwrap_err();
            assert!(matches!(err, ReconcileError::InvalidSelector(_)));
        }

        #[tokio::test]
        async fn passes_query_and_keeps_api_order() {
            let mut client = MockKubeClient::new();
            client
                .expect_list_pods()
                .returning(|namespace, query| {
                    assert_eq!(namespace, "default");
                    assert_eq!(query, "app=web");
                    Ok(vec![
                        pod("web-b", &[("app", "web")]),
                        pod("stray", &[("app", "db")]),
                        pod("web-a", &[("app", "web")]),
                    ])
                });

            let sel = selector(&[("app", "web")], vec![]);
            let pods = resolve_targets(&client, "default", Some(&sel)).await.expect("resolve");
            let names: Vec<_> = pods.iter().map(|p| p.name_any()).collect();
            assert_eq!(names, vec!["web-b", "web-a"]);
        }
    }

    mod matching_labels {
        use super::*;

        #[test]
        fn first_shared_pair_in_key_order() {
            let sel = selector(&[("tier", "backend"), ("app", "web")], vec![]);
            let pod_labels = labels(&[("app", "web"), ("tier", "backend")]);
            assert_eq!(matching_label(Some(&sel), &pod_labels), "app-web");
        }

        #[test]
        fn skips_pairs_the_pod_lacks() {
            let sel = selector(&[("app", "web"), ("tier", "backend")], vec![]);
            let pod_labels = labels(&[("app", "api"), ("tier", "backend")]);
            assert_eq!(matching_label(Some(&sel), &pod_labels), "tier-backend");
        }

        #[rstest]
        #[case::no_selector(None)]
        #[case::empty_selector(Some(LabelSelector::default()))]
        #[case::no_overlap(Some(selector(&[("app", "db")], vec![])))]
        fn falls_back_to_unknown(#[case] sel: Option<LabelSelector>) {
            let pod_labels = labels(&[("app", "web")]);
            assert_eq!(matching_label(sel.as_ref(), &pod_labels), "unknown");
        }
    }
}
