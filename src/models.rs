use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One labelled score produced by the on-device lesion classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: String,
    pub confidence: f64,
}

impl ClassificationResult {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

impl FromStr for ClassificationResult {
    type Err = String;

    /// Parses `label=confidence`, e.g. `basal cell carcinoma=0.62`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (label, confidence) = s
            .rsplit_once('=')
            .ok_or_else(|| format!("expected LABEL=CONFIDENCE, got `{s}`"))?;
        let label = label.trim();
        if label.is_empty() {
            return Err(format!("missing label in `{s}`"));
        }
        let confidence = confidence
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid confidence in `{s}`: {e}"))?;
        Ok(Self::new(label, confidence))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrgencyTier {
    Low,
    Normal,
    High,
    Urgent,
}

impl UrgencyTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrgencyTier::Low => "low",
            UrgencyTier::Normal => "normal",
            UrgencyTier::High => "high",
            UrgencyTier::Urgent => "urgent",
        }
    }
}

impl fmt::Display for UrgencyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UrgencyTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(UrgencyTier::Low),
            "normal" => Ok(UrgencyTier::Normal),
            "high" => Ok(UrgencyTier::High),
            "urgent" => Ok(UrgencyTier::Urgent),
            other => Err(format!("unknown urgency tier `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Error,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Error => "error",
        }
    }

    /// Lenient parse for stored values. Anything unrecognised is treated as absent.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        match raw? {
            "pending" => Some(NotificationStatus::Pending),
            "sent" => Some(NotificationStatus::Sent),
            "error" => Some(NotificationStatus::Error),
            _ => None,
        }
    }
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queued outbound message as stored in `notifications`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub to: String,
    pub subject: String,
    pub message: String,
    pub photo_url: Option<String>,
    pub urgency_level: Option<String>,
    /// `None` when the stored value is missing or malformed.
    pub status: Option<NotificationStatus>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// Fields the client supplies when queueing a notification.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub to: String,
    pub subject: String,
    pub message: String,
    pub photo_url: Option<String>,
    pub urgency_level: Option<UrgencyTier>,
}

pub const DEFAULT_APPOINTMENT_STATUS: &str = "Beklemede";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppointmentRecord {
    pub id: String,
    pub user_name: String,
    pub user_email: String,
    pub user_phone: String,
    pub appointment_date: String,
    pub appointment_time: String,
    pub notes: String,
    pub status: String,
    pub complaint: String,
    pub photos: Vec<String>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientSummary {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub last_appointment: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}
