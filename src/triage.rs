use std::fmt::Write;

use crate::models::{AppointmentRecord, NewNotification};
use crate::urgency::Assessment;

/// Builds the patient notification for an assessment, if the tier calls for one.
pub fn triage_notification(
    assessment: &Assessment,
    appointment: &AppointmentRecord,
) -> Option<NewNotification> {
    if !assessment.tier.requires_notification() {
        return None;
    }

    let subject = format!(
        "Dermatology follow-up required ({} priority)",
        assessment.tier
    );

    let mut message = String::new();
    let _ = writeln!(message, "Dear {},", appointment.user_name);
    let _ = writeln!(message);
    let _ = writeln!(
        message,
        "Your lesion photographs from the appointment on {} {} were reviewed.",
        appointment.appointment_date, appointment.appointment_time
    );
    if !appointment.complaint.is_empty() {
        let _ = writeln!(message, "Reported complaint: {}", appointment.complaint);
    }
    let _ = writeln!(
        message,
        "Primary finding: {} ({:.0}% confidence)",
        assessment.primary.label,
        assessment.primary.confidence * 100.0
    );
    let _ = writeln!(message, "Urgency: {}", assessment.tier);
    let _ = writeln!(message);
    let _ = write!(message, "{}", assessment.guidance);

    Some(NewNotification {
        to: appointment.user_email.clone(),
        subject,
        message,
        photo_url: appointment.photos.first().cloned(),
        urgency_level: Some(assessment.tier),
    })
}

/// Notification for a doctor-initiated reschedule. Always produced.
pub fn reschedule_notification(
    appointment: &AppointmentRecord,
    date: &str,
    time: &str,
    note: Option<&str>,
) -> NewNotification {
    let mut message = String::new();
    let _ = writeln!(message, "Dear {},", appointment.user_name);
    let _ = writeln!(message);
    let _ = write!(
        message,
        "Your dermatology appointment has been moved from {} {} to {} {}.",
        appointment.appointment_date, appointment.appointment_time, date, time
    );
    if let Some(note) = note.filter(|n| !n.trim().is_empty()) {
        let _ = write!(message, "\n\nNote from your doctor: {}", note.trim());
    }

    NewNotification {
        to: appointment.user_email.clone(),
        subject: "Your appointment has been rescheduled".to_string(),
        message,
        photo_url: None,
        urgency_level: None,
    }
}
