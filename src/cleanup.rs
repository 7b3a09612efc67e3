//! Scheduled housekeeping for in-memory state.

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::rate_limit::LoginPolicy;

/// Interval between cleanup runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60); // 1 hour

/// Run all cleanup tasks once.
pub fn run_cleanup(login_policy: &LoginPolicy) {
    let removed = login_policy.limiter.prune_expired(login_policy.window);
    if removed > 0 {
        debug!("Pruned {} elapsed login rate-limit windows", removed);
    }
}

/// Spawn a background task that runs cleanup periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_scheduler(login_policy: Arc<LoginPolicy>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

        loop {
            interval.tick().await;
            run_cleanup(&login_policy);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_cleanup_keeps_live_windows() {
        let policy = LoginPolicy::new(5, Duration::from_secs(900));
        policy.allow("10.0.0.1");
        run_cleanup(&policy);
        assert_eq!(policy.limiter.tracked_keys(), 1);

        let expired = LoginPolicy::new(5, Duration::ZERO);
        expired.allow("10.0.0.1");
        run_cleanup(&expired);
        assert_eq!(expired.limiter.tracked_keys(), 0);
    }
}
