use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use ebm_core::{MonitoredResource, StockSource};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::alerts;
use crate::interval::jittered;
use crate::mailer::Notifier;
use crate::state::{Alert, MonitorState, Phase, PollOutcome};

/// Polls one resource forever and notifies on state transitions.
///
/// Owns its [`MonitorState`] exclusively; nothing else reads or writes it.
pub struct ResourceMonitor {
    resource: MonitoredResource,
    source: Arc<dyn StockSource>,
    notifier: Arc<dyn Notifier>,
    recipients: Arc<[String]>,
    interval: Duration,
    state: MonitorState,
}

impl ResourceMonitor {
    pub fn new(
        resource: MonitoredResource,
        source: Arc<dyn StockSource>,
        notifier: Arc<dyn Notifier>,
        recipients: Arc<[String]>,
        interval: Duration,
    ) -> Self {
        Self {
            resource,
            source,
            notifier,
            recipients,
            interval,
            state: MonitorState::new(),
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    /// Run the poll loop until `cancel` fires.
    ///
    /// Cancellation is checked before each poll and during the sleep; an
    /// in-flight poll always completes so state is never half-updated.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            region_id = %self.resource.region_id,
            az_name = %self.resource.az_name,
            device_type = %self.resource.device_type,
            interval = ?self.interval,
            "monitor started"
        );

        while !cancel.is_cancelled() {
            self.poll_once().await;

            let delay = jittered(self.interval);
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("monitor stopped");
    }

    /// One poll cycle: fetch, update state, deliver any alerts.
    pub async fn poll_once(&mut self) -> Vec<Alert> {
        let outcome = match self.source.fetch_stock(&self.resource).await {
            Ok(entry) => {
                debug!(available = entry.available, "stock polled");
                PollOutcome::Available(entry.available)
            }
            Err(e) if e.is_not_found() => {
                info!(error = %e, "stock entry not available");
                PollOutcome::Failed(e.to_string())
            }
            Err(e) => {
                error!(error = %e, "stock API access failed");
                PollOutcome::Failed(e.to_string())
            }
        };

        let had_baseline = self.state.last_available().is_some();
        let raised = self.state.observe(&outcome);

        match self.state.phase() {
            Phase::Stable(n) if !had_baseline => {
                info!(available = n, "baseline established, no notification sent");
            }
            Phase::Degraded(k) => {
                warn!(consecutive_errors = k, "poll failed, within tolerance");
            }
            Phase::Failed(k) => {
                warn!(consecutive_errors = k, "poll failed, API considered down");
            }
            _ => {}
        }

        for alert in &raised {
            self.deliver(alert).await;
        }

        raised
    }

    async fn deliver(&self, alert: &Alert) {
        let notification =
            alerts::format_alert(alert, &self.resource.display_name, Local::now());

        let delivered = self
            .notifier
            .notify(
                &self.recipients,
                &self.resource.display_name,
                &notification.title,
                &notification.body,
            )
            .await;

        if delivered {
            info!(alert = ?alert, "notification sent");
        } else {
            warn!(alert = ?alert, "notification delivery failed");
        }
    }
}
