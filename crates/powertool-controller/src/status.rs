//! Status projection for PowerTool
//!
//! Pure helpers folding each step's outcome into `PowerToolStatus`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use powertool_common::crd::{
    find_condition, set_condition, Condition, ConditionStatus, PowerToolPhase, PowerToolStatus,
};

use crate::conflict::Conflict;

/// Condition types
pub mod conditions {
    /// Job initialized and targets selected
    pub const READY: &str = "Ready";
    /// Diagnostic containers are running
    pub const RUNNING: &str = "Running";
    /// Every diagnostic container finished
    pub const COMPLETED: &str = "Completed";
    /// Reconciliation hit a configuration error
    pub const FAILED: &str = "Failed";
    /// A target pod is claimed by another job
    pub const CONFLICTED: &str = "Conflicted";
}

/// Condition reasons
pub mod reasons {
    /// Initialization
    pub const TARGETS_SELECTED: &str = "TargetsSelected";
    /// Containers running
    pub const RUNNING: &str = "Running";
    /// Containers finished
    pub const COMPLETED: &str = "Completed";
    /// Configuration error
    pub const FAILED: &str = "Failed";
    /// Pod claimed by another job
    pub const CONFLICT_DETECTED: &str = "ConflictDetected";
    /// A previous conflict no longer applies
    pub const CONFLICT_RESOLVED: &str = "ConflictResolved";
}

/// First-pass initialization: Pending, start time and a not-ready condition
pub fn initialize(status: &mut PowerToolStatus, now: DateTime<Utc>) {
    status.phase = Some(PowerToolPhase::Pending);
    status.started_at = Some(now);
    set_condition(
        &mut status.conditions,
        Condition::new(
            conditions::READY,
            ConditionStatus::False,
            reasons::TARGETS_SELECTED,
            "Initializing PowerTool",
        ),
    );
}

/// Record a configuration error without forcing a phase
pub fn mark_failed(status: &mut PowerToolStatus, message: impl Into<String>) {
    let message = message.into();
    status.last_error = Some(message.clone());
    set_condition(
        &mut status.conditions,
        Condition::new(
            conditions::FAILED,
            ConditionStatus::True,
            reasons::FAILED,
            message,
        ),
    );
}

/// Move to Conflicted with the conflict as the condition message
pub fn mark_conflicted(status: &mut PowerToolStatus, conflict: &Conflict) {
    status.phase = Some(PowerToolPhase::Conflicted);
    set_condition(
        &mut status.conditions,
        Condition::new(
            conditions::CONFLICTED,
            ConditionStatus::True,
            reasons::CONFLICT_DETECTED,
            conflict.message(),
        ),
    );
}

/// Flip a standing Conflicted condition to False
pub fn clear_conflict(status: &mut PowerToolStatus) {
    let standing = find_condition(&status.conditions, conditions::CONFLICTED)
        .is_some_and(|c| c.status == ConditionStatus::True);
    if standing {
        set_condition(
            &mut status.conditions,
            Condition::new(
                conditions::CONFLICTED,
                ConditionStatus::False,
                reasons::CONFLICT_RESOLVED,
                "No conflicting PowerTool",
            ),
        );
    }
}

/// Fold the lifecycle outcome into counts, phase and conditions.
///
/// With no selected pods the phase is left as it was.
pub fn project(
    status: &mut PowerToolStatus,
    selected: u32,
    active_pods: BTreeMap<String, String>,
    now: DateTime<Utc>,
) {
    let active = active_pods.len() as u32;
    status.selected_pods = selected;
    status.completed_pods = selected.saturating_sub(active);
    status.active_pods = active_pods;

    if active > 0 {
        let message = format!("Running on {} pods", active);
        status.phase = Some(PowerToolPhase::Running);
        set_condition(
            &mut status.conditions,
            Condition::new(
                conditions::RUNNING,
                ConditionStatus::True,
                reasons::RUNNING,
                message.clone(),
            ),
        );
        if find_condition(&status.conditions, conditions::COMPLETED).is_some() {
            set_condition(
                &mut status.conditions,
                Condition::new(
                    conditions::COMPLETED,
                    ConditionStatus::False,
                    reasons::RUNNING,
                    message,
                ),
            );
        }
    } else if selected > 0 {
        if status.phase != Some(PowerToolPhase::Completed) {
            status.finished_at = Some(now);
        }
        status.phase = Some(PowerToolPhase::Completed);
        set_condition(
            &mut status.conditions,
            Condition::new(
                conditions::COMPLETED,
                ConditionStatus::True,
                reasons::COMPLETED,
                "All containers completed",
            ),
        );
        if find_condition(&status.conditions, conditions::RUNNING).is_some() {
            set_condition(
                &mut status.conditions,
                Condition::new(
                    conditions::RUNNING,
                    ConditionStatus::False,
                    reasons::COMPLETED,
                    "All containers completed",
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(pods: &[&str]) -> BTreeMap<String, String> {
        pods.iter()
            .map(|p| (p.to_string(), "powertool-job-01234567".to_string()))
            .collect()
    }

    fn condition<'a>(status: &'a PowerToolStatus, type_: &str) -> Option<&'a Condition> {
        find_condition(&status.conditions, type_)
    }

    #[test]
    fn initialize_sets_pending_and_not_ready() {
        let mut status = PowerToolStatus::default();
        let now = Utc::now();
        initialize(&mut status, now);

        assert_eq!(status.phase, Some(PowerToolPhase::Pending));
        assert_eq!(status.started_at, Some(now));
        let ready = condition(&status, conditions::READY).expect("ready");
        assert_eq!(ready.status, ConditionStatus::False);
        assert_eq!(ready.reason, reasons::TARGETS_SELECTED);
        assert_eq!(ready.message, "Initializing PowerTool");
    }

    #[test]
    fn running_counts_and_condition() {
        let mut status = PowerToolStatus::default();
        project(&mut status, 3, claims(&["a", "b"]), Utc::now());

        assert_eq!(status.phase, Some(PowerToolPhase::Running));
        assert_eq!(status.selected_pods, 3);
        assert_eq!(status.completed_pods, 1);
        assert_eq!(
            condition(&status, conditions::RUNNING).map(|c| c.message.as_str()),
            Some("Running on 2 pods")
        );
    }

    #[test]
    fn completion_stamps_finish_once() {
        let mut status = PowerToolStatus::default();
        project(&mut status, 1, claims(&["a"]), Utc::now());

        let finished = Utc::now();
        project(&mut status, 1, BTreeMap::new(), finished);
        assert_eq!(status.phase, Some(PowerToolPhase::Completed));
        assert_eq!(status.finished_at, Some(finished));
        assert_eq!(status.completed_pods, 1);
        assert_eq!(
            condition(&status, conditions::RUNNING).map(|c| c.status),
            Some(ConditionStatus::False)
        );
        assert_eq!(
            condition(&status, conditions::COMPLETED).map(|c| c.message.as_str()),
            Some("All containers completed")
        );

        project(&mut status, 1, BTreeMap::new(), finished + chrono::Duration::minutes(5));
        assert_eq!(status.finished_at, Some(finished));
    }

    /// Running again after completion leaves exactly one True condition
    #[test]
    fn running_after_completion_clears_completed() {
        let mut status = PowerToolStatus::default();
        project(&mut status, 1, BTreeMap::new(), Utc::now());
        assert_eq!(
            condition(&status, conditions::COMPLETED).map(|c| c.status),
            Some(ConditionStatus::True)
        );

        project(&mut status, 1, claims(&["a"]), Utc::now());

        assert_eq!(status.phase, Some(PowerToolPhase::Running));
        let completed = condition(&status, conditions::COMPLETED).expect("completed");
        assert_eq!(completed.status, ConditionStatus::False);
        assert_eq!(completed.reason, reasons::RUNNING);
        assert_eq!(completed.message, "Running on 1 pods");
        assert_eq!(
            condition(&status, conditions::RUNNING).map(|c| c.status),
            Some(ConditionStatus::True)
        );
    }

    /// Nothing selected leaves the phase alone, whatever it was
    #[test]
    fn zero_selected_keeps_phase() {
        let mut status = PowerToolStatus::default();
        initialize(&mut status, Utc::now());
        project(&mut status, 0, BTreeMap::new(), Utc::now());
        assert_eq!(status.phase, Some(PowerToolPhase::Pending));
        assert_eq!(status.completed_pods, 0);
        assert!(status.finished_at.is_none());
    }

    #[test]
    fn failure_records_message_without_phase() {
        let mut status = PowerToolStatus::default();
        initialize(&mut status, Utc::now());
        mark_failed(&mut status, "tool configuration error: tool perf not found");

        assert_eq!(status.phase, Some(PowerToolPhase::Pending));
        assert_eq!(
            status.last_error.as_deref(),
            Some("tool configuration error: tool perf not found")
        );
        let failed = condition(&status, conditions::FAILED).expect("failed");
        assert_eq!(failed.status, ConditionStatus::True);
        assert_eq!(failed.reason, reasons::FAILED);
    }

    #[test]
    fn conflict_is_raised_then_cleared() {
        let mut status = PowerToolStatus::default();
        clear_conflict(&mut status);
        assert!(condition(&status, conditions::CONFLICTED).is_none());

        mark_conflicted(
            &mut status,
            &Conflict {
                pod: "shared".to_string(),
                owner: "j1".to_string(),
            },
        );
        assert_eq!(status.phase, Some(PowerToolPhase::Conflicted));
        let c = condition(&status, conditions::CONFLICTED).expect("conflicted");
        assert_eq!(c.status, ConditionStatus::True);
        assert!(c.message.contains("shared") && c.message.contains("j1"));

        clear_conflict(&mut status);
        let c = condition(&status, conditions::CONFLICTED).expect("conflicted");
        assert_eq!(c.status, ConditionStatus::False);
        assert_eq!(c.reason, reasons::CONFLICT_RESOLVED);
    }

    #[test]
    fn condition_types_stay_unique_across_projections() {
        let mut status = PowerToolStatus::default();
        initialize(&mut status, Utc::now());
        for _ in 0..3 {
            project(&mut status, 2, claims(&["a"]), Utc::now());
            project(&mut status, 2, BTreeMap::new(), Utc::now());
        }
        let mut types: Vec<_> = status.conditions.iter().map(|c| c.type_.clone()).collect();
        let total = types.len();
        types.sort();
        types.dedup();
        assert_eq!(types.len(), total);
    }
}
