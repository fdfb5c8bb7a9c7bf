use crate::models::{AppointmentRecord, PatientSummary};

/// Newest first. Missing timestamps are stored as 0 and sort last.
pub fn sort_by_recency(appointments: &mut [AppointmentRecord]) {
    appointments.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

pub fn patient_summary(appointment: &AppointmentRecord) -> PatientSummary {
    PatientSummary {
        id: appointment.id.clone(),
        name: appointment.user_name.clone(),
        phone: appointment.user_phone.clone(),
        email: appointment.user_email.clone(),
        last_appointment: format!(
            "{} {}",
            appointment.appointment_date, appointment.appointment_time
        ),
    }
}

/// Case-sensitive name prefix search, one summary per appointment id.
pub fn search_patients(appointments: &[AppointmentRecord], prefix: &str) -> Vec<PatientSummary> {
    if prefix.is_empty() {
        return Vec::new();
    }

    let mut matches: Vec<&AppointmentRecord> = appointments
        .iter()
        .filter(|a| a.user_name.starts_with(prefix))
        .collect();
    matches.sort_by(|a, b| a.user_name.cmp(&b.user_name));

    let mut patients: Vec<PatientSummary> = Vec::new();
    for appointment in matches {
        if !patients.iter().any(|p| p.id == appointment.id) {
            patients.push(patient_summary(appointment));
        }
    }
    patients
}
