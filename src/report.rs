use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::appointments;
use crate::models::{AppointmentRecord, NotificationRecord, StatusCount};

pub fn build_report(
    generated_at: DateTime<Utc>,
    status_counts: &[StatusCount],
    failures: &[NotificationRecord],
    appointments: &[AppointmentRecord],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Dermatology Notification Report");
    let _ = writeln!(output, "Generated at {}", generated_at.format("%Y-%m-%d %H:%M UTC"));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Outbox");

    if status_counts.is_empty() {
        let _ = writeln!(output, "No notifications queued.");
    } else {
        let total: i64 = status_counts.iter().map(|c| c.count).sum();
        for count in status_counts {
            let _ = writeln!(output, "- {}: {}", count.status, count.count);
        }
        let _ = writeln!(output, "- total: {total}");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Delivery Failures");

    if failures.is_empty() {
        let _ = writeln!(output, "No failed deliveries.");
    } else {
        for failure in failures {
            let _ = writeln!(
                output,
                "- {} to {} ({}): {}",
                failure.created_at.format("%Y-%m-%d %H:%M"),
                failure.to,
                failure.urgency_level.as_deref().unwrap_or("manual"),
                failure.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    let mut recent = appointments.to_vec();
    appointments::sort_by_recency(&mut recent);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Appointments");

    if recent.is_empty() {
        let _ = writeln!(output, "No appointments recorded.");
    } else {
        for appointment in recent.iter().take(10) {
            let _ = writeln!(
                output,
                "- {} {} {} [{}]: {}",
                appointment.appointment_date,
                appointment.appointment_time,
                appointment.user_name,
                appointment.status,
                appointment.complaint
            );
        }
    }

    output
}
