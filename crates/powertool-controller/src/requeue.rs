//! Requeue intervals by phase

use std::time::Duration;

use powertool_common::crd::PowerToolPhase;

/// Poll interval while containers are running
pub const ACTIVE_RUNNING_INTERVAL: Duration = Duration::from_secs(5);

/// Poll interval for jobs being set up or torn down
pub const SETUP_TEARDOWN_INTERVAL: Duration = Duration::from_secs(15);

/// Poll interval for finished jobs
pub const COMPLETED_JOB_INTERVAL: Duration = Duration::from_secs(300);

/// Retry interval after a conflict is detected
pub const CONFLICT_RETRY_INTERVAL: Duration = Duration::from_secs(60);

/// Next poll delay for a job in `phase`
pub fn requeue_interval(phase: Option<PowerToolPhase>) -> Duration {
    match phase {
        Some(PowerToolPhase::Running) => ACTIVE_RUNNING_INTERVAL,
        Some(PowerToolPhase::Completed | PowerToolPhase::Failed) => COMPLETED_JOB_INTERVAL,
        Some(PowerToolPhase::Pending | PowerToolPhase::Conflicted) | None => {
            SETUP_TEARDOWN_INTERVAL
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::unset(None, SETUP_TEARDOWN_INTERVAL)]
    #[case::pending(Some(PowerToolPhase::Pending), SETUP_TEARDOWN_INTERVAL)]
    #[case::running(Some(PowerToolPhase::Running), ACTIVE_RUNNING_INTERVAL)]
    #[case::conflicted(Some(PowerToolPhase::Conflicted), SETUP_TEARDOWN_INTERVAL)]
    #[case::completed(Some(PowerToolPhase::Completed), COMPLETED_JOB_INTERVAL)]
    #[case::failed(Some(PowerToolPhase::Failed), COMPLETED_JOB_INTERVAL)]
    fn interval_by_phase(#[case] phase: Option<PowerToolPhase>, #[case] expected: Duration) {
        assert_eq!(requeue_interval(phase), expected);
    }

    #[test]
    fn running_polls_fastest() {
        assert!(ACTIVE_RUNNING_INTERVAL < SETUP_TEARDOWN_INTERVAL);
        assert!(SETUP_TEARDOWN_INTERVAL < CONFLICT_RETRY_INTERVAL);
        assert!(CONFLICT_RETRY_INTERVAL < COMPLETED_JOB_INTERVAL);
    }
}
