use chrono::{DateTime, Local};

use crate::state::Alert;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A rendered notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

/// Render an alert for the resource called `display_name`, observed at `at`.
pub fn format_alert(alert: &Alert, display_name: &str, at: DateTime<Local>) -> Notification {
    let at = at.format(TIME_FORMAT).to_string();
    match alert {
        Alert::Change { previous, current } => {
            format_change(display_name, *previous, *current, &at)
        }
        Alert::Failure {
            consecutive_errors,
            reason,
        } => format_failure(display_name, *consecutive_errors, reason, &at),
        Alert::Recovery { failed_polls } => format_recovery(display_name, *failed_polls, &at),
    }
}

/// Example title: [Notice] North 2 GPU-A stock changed!
fn format_change(display_name: &str, previous: i64, current: i64, at: &str) -> Notification {
    let direction = if current > previous { "up" } else { "down" };
    Notification {
        title: format!("[Notice] {display_name} stock changed!"),
        body: format!(
            "Hello,\n\n\
             The available stock of {display_name} has changed ({direction}), \
             please take a look.\n\n\
             \u{1f4ca} Previous available stock: {previous} units\n\
             \u{1f4ca} Current available stock: {current} units\n\n\
             \u{23f0} Observed at: {at}\n\n\
             Regards,\nStock Monitor"
        ),
    }
}

/// Example title: [Alert] North 2 GPU-A stock query failed!
fn format_failure(
    display_name: &str,
    consecutive_errors: u32,
    reason: &str,
    at: &str,
) -> Notification {
    Notification {
        title: format!("[Alert] {display_name} stock query failed!"),
        body: format!(
            "Hello,\n\n\
             The stock query for {display_name} has failed {consecutive_errors} times in a row. \
             The API service may be down or the network unreachable, \
             please check as soon as possible.\n\n\
             Last error: {reason}\n\n\
             \u{23f0} Failed at: {at}\n\n\
             Regards,\nStock Monitor"
        ),
    }
}

/// Example title: [Recovered] North 2 GPU-A stock query is working again
fn format_recovery(display_name: &str, failed_polls: u32, at: &str) -> Notification {
    Notification {
        title: format!("[Recovered] {display_name} stock query is working again"),
        body: format!(
            "Hello,\n\n\
             The stock query for {display_name} succeeded again \
             after {failed_polls} failed attempts. \
             Stock tracking resumes from the next observed value.\n\n\
             \u{23f0} Recovered at: {at}\n\n\
             Regards,\nStock Monitor"
        ),
    }
}
