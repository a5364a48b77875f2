//! Cross-job conflict detection
//!
//! A pod claimed in the `activePods` of another non-terminal PowerTool in the
//! same namespace may not be instrumented again. This is advisory: two jobs
//! evaluated before either persists its claim can both see no conflict.

use std::collections::HashSet;

use kube::ResourceExt;

use powertool_common::crd::PowerTool;

/// A target pod already claimed by another job
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conflict {
    /// Contested pod
    pub pod: String,
    /// Name of the job holding the claim
    pub owner: String,
}

impl Conflict {
    /// Human-readable reason used in the Conflicted condition
    pub fn message(&self) -> String {
        format!(
            "Pod {} is already being profiled by PowerTool {}",
            self.pod, self.owner
        )
    }
}

fn is_same_job(a: &PowerTool, b: &PowerTool) -> bool {
    match (a.uid(), b.uid()) {
        (Some(x), Some(y)) => x == y,
        _ => a.name_any() == b.name_any() && a.namespace() == b.namespace(),
    }
}

/// Find the first target pod claimed by another active job in `job`'s namespace.
///
/// Jobs are visited in the given order and the first overlap is returned.
pub fn detect_conflict<'a, I>(job: &PowerTool, targets: I, others: &[PowerTool]) -> Option<Conflict>
where
    I: IntoIterator<Item = &'a str>,
{
    let targets: Vec<&str> = targets.into_iter().collect();
    if targets.is_empty() {
        return None;
    }
    let namespace = job.namespace();

    others
        .iter()
        .filter(|other| !is_same_job(job, other))
        .filter(|other| other.namespace() == namespace)
        .filter(|other| !other.is_terminal())
        .find_map(|other| {
            let claimed: HashSet<&str> = other.claimed_pods().collect();
            targets
                .iter()
                .find(|pod| claimed.contains(*pod))
                .map(|pod| Conflict {
                    pod: pod.to_string(),
                    owner: other.name_any(),
                })
        })
}
