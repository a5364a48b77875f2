//! Security context for diagnostic containers
//!
//! Translates a tool's security posture into container security fields.
//! Identity is inherited from the target pod and container unless the tool
//! demands root.

use k8s_openapi::api::core::v1::{Capabilities, Container, Pod, SecurityContext};

use powertool_common::crd::SecuritySpec;

/// Build the diagnostic container's security context.
///
/// With `runAsRoot`, uid is forced to 0 and `runAsNonRoot` to false while the
/// group comes from the target container, then the pod. Otherwise uid, gid
/// and `runAsNonRoot` are copied from the pod, then overridden by the target
/// container, only where explicitly set.
pub fn build_security_context(
    policy: &SecuritySpec,
    pod: &Pod,
    target: Option<&Container>,
) -> SecurityContext {
    let mut sc = SecurityContext {
        privileged: policy.allow_privileged,
        capabilities: capabilities(policy),
        ..Default::default()
    };

    let pod_sc = pod.spec.as_ref().and_then(|s| s.security_context.as_ref());
    let container_sc = target.and_then(|c| c.security_context.as_ref());

    if policy.run_as_root.unwrap_or(false) {
        sc.run_as_user = Some(0);
        sc.run_as_non_root = Some(false);
        sc.run_as_group = container_sc
            .and_then(|c| c.run_as_group)
            .or_else(|| pod_sc.and_then(|p| p.run_as_group));
        return sc;
    }

    if let Some(p) = pod_sc {
        sc.run_as_user = p.run_as_user;
        sc.run_as_group = p.run_as_group;
        sc.run_as_non_root = p.run_as_non_root;
    }
    if let Some(c) = container_sc {
        if c.run_as_user.is_some() {
            sc.run_as_user = c.run_as_user;
        }
        if c.run_as_group.is_some() {
            sc.run_as_group = c.run_as_group;
        }
        if c.run_as_non_root.is_some() {
            sc.run_as_non_root = c.run_as_non_root;
        }
    }
    sc
}

fn capabilities(policy: &SecuritySpec) -> Option<Capabilities> {
    let caps = policy.capabilities.as_ref()?;
    if caps.add.is_empty() && caps.drop.is_empty() {
        return None;
    }
    let list = |v: &Vec<String>| (!v.is_empty()).then(|| v.clone());
    Some(Capabilities {
        add: list(&caps.add),
        drop: list(&caps.drop),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{PodSecurityContext, PodSpec};
    use powertool_common::crd::CapabilitiesSpec;
    use rstest::rstest;

    #[derive(Default, Clone, Copy)]
    struct Ids {
        user: Option<i64>,
        group: Option<i64>,
        non_root: Option<bool>,
    }

    fn pod_with(ids: Ids) -> Pod {
        Pod {
            spec: Some(PodSpec {
                security_context: Some(PodSecurityContext {
                    run_as_user: ids.user,
                    run_as_group: ids.group,
                    run_as_non_root: ids.non_root,
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn container_with(ids: Ids) -> Container {
        Container {
            name: "app".to_string(),
            security_context: Some(SecurityContext {
                run_as_user: ids.user,
                run_as_group: ids.group,
                run_as_non_root: ids.non_root,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn root() -> SecuritySpec {
        SecuritySpec {
            run_as_root: Some(true),
            ..Default::default()
        }
    }

    #[rstest]
    #[case::container_group(
        Ids::default(),
        Ids { group: Some(2000), ..Default::default() },
        Some(2000)
    )]
    #[case::pod_group(
        Ids { group: Some(3000), ..Default::default() },
        Ids::default(),
        Some(3000)
    )]
    #[case::container_group_wins(
        Ids { group: Some(3000), ..Default::default() },
        Ids { group: Some(2000), ..Default::default() },
        Some(2000)
    )]
    #[case::no_group(Ids::default(), Ids::default(), None)]
    #[case::overrides_non_root_pod(
        Ids { user: Some(1000), non_root: Some(true), ..Default::default() },
        Ids::default(),
        None
    )]
    fn run_as_root_forces_uid_zero(
        #[case] pod_ids: Ids,
        #[case] container_ids: Ids,
        #[case] group: Option<i64>,
    ) {
        let container = container_with(container_ids);
        let sc = build_security_context(&root(), &pod_with(pod_ids), Some(&container));
        assert_eq!(sc.run_as_user, Some(0));
        assert_eq!(sc.run_as_non_root, Some(false));
        assert_eq!(sc.run_as_group, group);
    }

    #[rstest]
    #[case::disabled(Some(false))]
    #[case::unset(None)]
    fn passive_inheritance_prefers_container(#[case] run_as_root: Option<bool>) {
        let policy = SecuritySpec {
            run_as_root,
            ..Default::default()
        };
        let pod = pod_with(Ids {
            user: Some(1000),
            group: Some(1000),
            non_root: Some(true),
        });
        let container = container_with(Ids {
            user: Some(2000),
            ..Default::default()
        });

        let sc = build_security_context(&policy, &pod, Some(&container));
        assert_eq!(sc.run_as_user, Some(2000));
        assert_eq!(sc.run_as_group, Some(1000));
        assert_eq!(sc.run_as_non_root, Some(true));
    }

    #[test]
    fn nothing_set_means_nothing_copied() {
        let sc = build_security_context(&SecuritySpec::default(), &Pod::default(), None);
        assert_eq!(sc, SecurityContext::default());
    }

    #[test]
    fn privilege_and_capabilities_copied_verbatim() {
        let policy = SecuritySpec {
            allow_privileged: Some(true),
            capabilities: Some(CapabilitiesSpec {
                add: vec!["SYS_PTRACE".to_string(), "SYS_ADMIN".to_string()],
                drop: vec![],
            }),
            ..Default::default()
        };
        let sc = build_security_context(&policy, &Pod::default(), None);
        assert_eq!(sc.privileged, Some(true));
        let caps = sc.capabilities.expect("capabilities");
        assert_eq!(
            caps.add,
            Some(vec!["SYS_PTRACE".to_string(), "SYS_ADMIN".to_string()])
        );
        assert_eq!(caps.drop, None);
    }

    #[test]
    fn empty_capability_lists_produce_no_stanza() {
        let policy = SecuritySpec {
            allow_privileged: Some(false),
            capabilities: Some(CapabilitiesSpec::default()),
            ..Default::default()
        };
        let sc = build_security_context(&policy, &Pod::default(), None);
        assert_eq!(sc.privileged, Some(false));
        assert!(sc.capabilities.is_none());
    }
}
