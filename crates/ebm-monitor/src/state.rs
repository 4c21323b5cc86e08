/// Consecutive failed polls after which a failure alert is raised.
pub const ERROR_THRESHOLD: u32 = 3;

/// Result of one poll, reduced to what the state machine needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The API answered with an available count for the device.
    Available(i64),
    /// Any transport, status, parse or lookup failure.
    Failed(String),
}

/// A notification-worthy transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alert {
    Change { previous: i64, current: i64 },
    Failure { consecutive_errors: u32, reason: String },
    Recovery { failed_polls: u32 },
}

/// Derived phase of a monitor -- not stored.
///
/// - `Unknown`: no successful poll yet
/// - `Stable(n)`: healthy, last known count `n`
/// - `Degraded(k)`: `k` consecutive failures, below the threshold
/// - `Failed(k)`: `k >= ERROR_THRESHOLD`, alert already raised
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unknown,
    Stable(i64),
    Degraded(u32),
    Failed(u32),
}

/// Per-resource monitoring state, owned by exactly one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorState {
    last_available: Option<i64>,
    api_healthy: bool,
    consecutive_errors: u32,
}

impl Default for MonitorState {
    fn default() -> Self {
        Self {
            last_available: None,
            api_healthy: true,
            consecutive_errors: 0,
        }
    }
}

impl MonitorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_available(&self) -> Option<i64> {
        self.last_available
    }

    #[cfg(test)]
    pub fn api_healthy(&self) -> bool {
        self.api_healthy
    }

    #[cfg(test)]
    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn phase(&self) -> Phase {
        match (self.consecutive_errors, self.last_available) {
            (0, Some(n)) => Phase::Stable(n),
            (0, None) => Phase::Unknown,
            (k, _) if k >= ERROR_THRESHOLD => Phase::Failed(k),
            (k, _) => Phase::Degraded(k),
        }
    }

    /// Apply one poll result and return the alerts it raises, in order.
    pub fn observe(&mut self, outcome: &PollOutcome) -> Vec<Alert> {
        match outcome {
            PollOutcome::Available(available) => self.on_success(*available),
            PollOutcome::Failed(reason) => self.on_failure(reason),
        }
    }

    fn on_success(&mut self, available: i64) -> Vec<Alert> {
        let mut alerts = Vec::new();

        if !self.api_healthy {
            alerts.push(Alert::Recovery {
                failed_polls: self.consecutive_errors,
            });
            self.consecutive_errors = 0;
            self.api_healthy = true;
        }

        // No prior value means a fresh baseline: update silently.
        if let Some(previous) = self.last_available {
            if previous != available {
                alerts.push(Alert::Change {
                    previous,
                    current: available,
                });
            }
        }

        self.last_available = Some(available);
        alerts
    }

    fn on_failure(&mut self, reason: &str) -> Vec<Alert> {
        self.consecutive_errors = self.consecutive_errors.saturating_add(1);
        self.api_healthy = false;
        // Re-baseline after the outage instead of diffing against stale data.
        self.last_available = None;

        if self.consecutive_errors == ERROR_THRESHOLD {
            vec![Alert::Failure {
                consecutive_errors: self.consecutive_errors,
                reason: reason.to_string(),
            }]
        } else {
            Vec::new()
        }
    }
}
