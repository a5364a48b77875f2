//! Per-pod diagnostic container lifecycle
//!
//! Planning is pure: it takes the previous `activePods` snapshot and the
//! resolved pods and returns the new claim map plus the pods that still need
//! a container. Nothing here talks to the API server.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;

/// Deterministic diagnostic container name for a job
///
/// `powertool-<job>-<first 8 chars of uid>`
pub fn container_name(job_name: &str, uid: &str) -> String {
    let short: String = uid.chars().take(8).collect();
    format!("powertool-{}-{}", job_name, short)
}

/// Observed state of a named ephemeral container in a pod
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerState {
    /// Not declared in the pod spec
    Absent,
    /// Declared and running, waiting to start, or not yet reported
    Running,
    /// Declared and terminated
    Finished,
}

/// Inspect the pod for the ephemeral container `name`
pub fn container_state(pod: &Pod, name: &str) -> ContainerState {
    let declared = pod
        .spec
        .as_ref()
        .and_then(|s| s.ephemeral_containers.as_ref())
        .is_some_and(|ecs| ecs.iter().any(|ec| ec.name == name));
    if !declared {
        return ContainerState::Absent;
    }

    let status = pod
        .status
        .as_ref()
        .and_then(|s| s.ephemeral_container_statuses.as_ref())
        .and_then(|statuses| statuses.iter().find(|s| s.name == name));

    let Some(status) = status else {
        // Accepted by the API server but not yet scheduled by the kubelet.
        return ContainerState::Running;
    };

    match status.state.as_ref() {
        Some(state) if state.running.is_some() || state.waiting.is_some() => {
            ContainerState::Running
        }
        _ => ContainerState::Finished,
    }
}

/// What to do for one target pod
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PodDecision {
    /// Tracked container still running
    Keep,
    /// Tracked container finished; drop the claim
    Release,
    /// Untracked but our container is running; record it without recreating
    Adopt,
    /// Untracked and our container already finished; leave the pod alone
    AlreadyFinished,
    /// No container in the pod; create one. Covers new pods and tracked
    /// pods recreated under the same name.
    Create,
}

/// Decide for a single pod given whether it is tracked and its container state
pub fn decide(tracked: bool, state: ContainerState) -> PodDecision {
    match (tracked, state) {
        (true, ContainerState::Running) => PodDecision::Keep,
        (true, ContainerState::Finished) => PodDecision::Release,
        (_, ContainerState::Absent) => PodDecision::Create,
        (false, ContainerState::Running) => PodDecision::Adopt,
        (false, ContainerState::Finished) => PodDecision::AlreadyFinished,
    }
}

/// Result of planning a pass
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LifecyclePlan {
    /// Claims after this pass, before any creations
    pub active_pods: BTreeMap<String, String>,
    /// Indices into the resolved pod list that need a new container
    pub to_create: Vec<usize>,
}

/// Plan the pass over `pods` starting from `prior` claims.
///
/// Claims for pods not in `pods` are dropped, so the returned map only ever
/// names resolved pods.
pub fn plan(prior: &BTreeMap<String, String>, pods: &[Pod], container: &str) -> LifecyclePlan {
    let mut active_pods = BTreeMap::new();
    let mut to_create = Vec::new();

    for (index, pod) in pods.iter().enumerate() {
        let pod_name = pod.name_any();
        let tracked = prior.get(&pod_name);
        let observed = tracked.map(String::as_str).unwrap_or(container);

        match decide(tracked.is_some(), container_state(pod, observed)) {
            PodDecision::Keep => {
                active_pods.insert(pod_name, observed.to_string());
            }
            PodDecision::Adopt => {
                active_pods.insert(pod_name, container.to_string());
            }
            PodDecision::Create => to_create.push(index),
            PodDecision::Release | PodDecision::AlreadyFinished => {}
        }
    }

    LifecyclePlan {
        active_pods,
        to_create,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{
        ContainerState as K8sContainerState, ContainerStateRunning, ContainerStateTerminated,
        ContainerStateWaiting, ContainerStatus, EphemeralContainer, PodSpec, PodStatus,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use rstest::rstest;

    const NAME: &str = "powertool-cpu-01234567";

    #[derive(Clone, Copy)]
    enum Reported {
        Nothing,
        Running,
        Waiting,
        Terminated,
    }

    fn pod(name: &str, declared: Option<&str>, reported: Reported) -> Pod {
        let ephemeral = declared.map(|n| {
            vec![EphemeralContainer {
                name: n.to_string(),
                ..Default::default()
            }]
        });
        let state = match reported {
            Reported::Nothing => None,
            Reported::Running => Some(K8sContainerState {
                running: Some(ContainerStateRunning::default()),
                ..Default::default()
            }),
            Reported::Waiting => Some(K8sContainerState {
                waiting: Some(ContainerStateWaiting::default()),
                ..Default::default()
            }),
            Reported::Terminated => Some(K8sContainerState {
                terminated: Some(ContainerStateTerminated::default()),
                ..Default::default()
            }),
        };
        let statuses = match (declared, state) {
            (Some(n), Some(state)) => Some(vec![ContainerStatus {
                name: n.to_string(),
                state: Some(state),
                ..Default::default()
            }]),
            _ => None,
        };

        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec: Some(PodSpec {
                ephemeral_containers: ephemeral,
                ..Default::default()
            }),
            status: Some(PodStatus {
                ephemeral_container_statuses: statuses,
                ..Default::default()
            }),
        }
    }

    #[rstest]
    #[case::long_uid("cpu", "0123456789abcdef", "powertool-cpu-01234567")]
    #[case::short_uid("cpu", "abc", "powertool-cpu-abc")]
    fn names_are_deterministic(#[case] job: &str, #[case] uid: &str, #[case] expected: &str) {
        assert_eq!(container_name(job, uid), expected);
        assert_eq!(container_name(job, uid), container_name(job, uid));
    }

    #[rstest]
    #[case::not_declared(None, Reported::Nothing, ContainerState::Absent)]
    #[case::other_container(Some("someone-else"), Reported::Running, ContainerState::Absent)]
    #[case::declared_no_status(Some(NAME), Reported::Nothing, ContainerState::Running)]
    #[case::running(Some(NAME), Reported::Running, ContainerState::Running)]
    #[case::waiting(Some(NAME), Reported::Waiting, ContainerState::Running)]
    #[case::terminated(Some(NAME), Reported::Terminated, ContainerState::Finished)]
    fn observes_container_state(
        #[case] declared: Option<&str>,
        #[case] reported: Reported,
        #[case] expected: ContainerState,
    ) {
        assert_eq!(container_state(&pod("web-0", declared, reported), NAME), expected);
    }

    #[rstest]
    #[case(true, ContainerState::Running, PodDecision::Keep)]
    #[case(true, ContainerState::Finished, PodDecision::Release)]
    #[case(true, ContainerState::Absent, PodDecision::Create)]
    #[case(false, ContainerState::Running, PodDecision::Adopt)]
    #[case(false, ContainerState::Finished, PodDecision::AlreadyFinished)]
    #[case(false, ContainerState::Absent, PodDecision::Create)]
    fn decision_table(
        #[case] tracked: bool,
        #[case] state: ContainerState,
        #[case] expected: PodDecision,
    ) {
        assert_eq!(decide(tracked, state), expected);
    }

    #[test]
    fn plan_creates_for_new_pods() {
        let pods = vec![pod("web-0", None, Reported::Nothing), pod("web-1", None, Reported::Nothing)];
        let plan = plan(&BTreeMap::new(), &pods, NAME);
        assert!(plan.active_pods.is_empty());
        assert_eq!(plan.to_create, vec![0, 1]);
    }

    #[test]
    fn plan_adopts_container_left_by_crashed_pass() {
        let pods = vec![pod("web-0", Some(NAME), Reported::Nothing)];
        let plan = plan(&BTreeMap::new(), &pods, NAME);
        assert_eq!(plan.active_pods.get("web-0").map(String::as_str), Some(NAME));
        assert!(plan.to_create.is_empty());
    }

    #[test]
    fn plan_releases_finished_and_never_recreates() {
        let prior = BTreeMap::from([("web-0".to_string(), NAME.to_string())]);
        let pods = vec![pod("web-0", Some(NAME), Reported::Terminated)];

        let first = plan(&prior, &pods, NAME);
        assert!(first.active_pods.is_empty());
        assert!(first.to_create.is_empty());

        let second = plan(&first.active_pods, &pods, NAME);
        assert!(second.active_pods.is_empty());
        assert!(second.to_create.is_empty());
    }

    /// A pod deleted and recreated under the same name (StatefulSet restart)
    /// lost its container; the claim is dropped until a new one is created
    #[test]
    fn plan_recreates_for_tracked_pod_without_container() {
        let prior = BTreeMap::from([("web-0".to_string(), NAME.to_string())]);
        let pods = vec![pod("web-0", None, Reported::Nothing)];

        let plan = plan(&prior, &pods, NAME);
        assert!(plan.active_pods.is_empty());
        assert_eq!(plan.to_create, vec![0]);
    }

    #[test]
    fn plan_drops_claims_for_pods_no_longer_targeted() {
        let prior = BTreeMap::from([
            ("gone".to_string(), NAME.to_string()),
            ("web-0".to_string(), NAME.to_string()),
        ]);
        let pods = vec![pod("web-0", Some(NAME), Reported::Running)];

        let plan = plan(&prior, &pods, NAME);
        assert_eq!(plan.active_pods.keys().collect::<Vec<_>>(), vec!["web-0"]);
    }

    #[test]
    fn plan_is_idempotent_once_containers_exist() {
        let pods = vec![pod("web-0", Some(NAME), Reported::Running)];
        let first = plan(&BTreeMap::new(), &pods, NAME);
        let second = plan(&first.active_pods, &pods, NAME);
        assert_eq!(first, second);
        assert!(second.to_create.is_empty());
    }
}
