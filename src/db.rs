use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{
    AppointmentRecord, NewNotification, NotificationRecord, NotificationStatus, StatusCount,
    DEFAULT_APPOINTMENT_STATUS,
};
use crate::store::NotificationStore;

const APPOINTMENT_COLUMNS: &str = "id, user_name, user_email, user_phone, appointment_date, \
     appointment_time, notes, status, description, photos, timestamp";

const NOTIFICATION_COLUMNS: &str = "id, recipient, subject, message, photo_url, urgency_level, \
     status, created_at, sent_at, error";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(Debug, serde::Deserialize)]
struct AppointmentRow {
    id: String,
    user_name: String,
    user_email: String,
    user_phone: String,
    appointment_date: String,
    appointment_time: String,
    #[serde(default)]
    notes: String,
    status: Option<String>,
    #[serde(default)]
    description: String,
    photo_url: Option<String>,
    timestamp: Option<i64>,
}

async fn upsert_appointment(pool: &PgPool, row: &AppointmentRow) -> anyhow::Result<u64> {
    let photos: Vec<String> = row
        .photo_url
        .iter()
        .filter(|url| !url.is_empty())
        .cloned()
        .collect();

    let result = sqlx::query(
        r#"
        INSERT INTO dermatriage.appointments
        (id, user_name, user_email, user_phone, appointment_date, appointment_time,
         notes, status, description, photos, timestamp)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(&row.id)
    .bind(&row.user_name)
    .bind(&row.user_email)
    .bind(&row.user_phone)
    .bind(&row.appointment_date)
    .bind(&row.appointment_time)
    .bind(&row.notes)
    .bind(&row.status)
    .bind(&row.description)
    .bind(&photos)
    .bind(row.timestamp)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let appointments = vec![
        (
            "seed-apt-001",
            "Elif Kaya",
            "elif.kaya@example.com",
            "+90 555 010 2030",
            "2026-11-02",
            "10:30",
            "Mole on left shoulder changed colour over two months",
            Some("https://storage.example.com/lesions/seed-apt-001.jpg"),
            1_793_611_800_000_i64,
        ),
        (
            "seed-apt-002",
            "Mert Aydin",
            "mert.aydin@example.com",
            "+90 555 010 4411",
            "2026-11-03",
            "14:00",
            "Scaly patch on forehead that bleeds occasionally",
            None,
            1_793_714_400_000_i64,
        ),
        (
            "seed-apt-003",
            "Ayse Demir",
            "ayse.demir@example.com",
            "+90 555 010 7788",
            "2026-11-05",
            "09:15",
            "Routine mole check",
            None,
            1_793_870_100_000_i64,
        ),
    ];

    for (id, name, email, phone, date, time, complaint, photo, timestamp) in appointments {
        upsert_appointment(
            pool,
            &AppointmentRow {
                id: id.to_string(),
                user_name: name.to_string(),
                user_email: email.to_string(),
                user_phone: phone.to_string(),
                appointment_date: date.to_string(),
                appointment_time: time.to_string(),
                notes: String::new(),
                status: None,
                description: complaint.to_string(),
                photo_url: photo.map(str::to_string),
                timestamp: Some(timestamp),
            },
        )
        .await?;
    }

    Ok(())
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<AppointmentRow>() {
        let mut row = result?;
        if row.id.trim().is_empty() {
            row.id = format!("import-{}", Uuid::new_v4());
        }
        if upsert_appointment(pool, &row).await? > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}

fn appointment_from_row(row: &PgRow) -> AppointmentRecord {
    AppointmentRecord {
        id: row.get("id"),
        user_name: row.get("user_name"),
        user_email: row.get("user_email"),
        user_phone: row.get("user_phone"),
        appointment_date: row.get("appointment_date"),
        appointment_time: row.get("appointment_time"),
        notes: row.get("notes"),
        status: row
            .get::<Option<String>, _>("status")
            .unwrap_or_else(|| DEFAULT_APPOINTMENT_STATUS.to_string()),
        complaint: row.get("description"),
        photos: row
            .get::<Vec<String>, _>("photos")
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect(),
        timestamp: row.get::<Option<i64>, _>("timestamp").unwrap_or(0),
    }
}

pub async fn fetch_appointments(pool: &PgPool) -> anyhow::Result<Vec<AppointmentRecord>> {
    let query = format!("SELECT {APPOINTMENT_COLUMNS} FROM dermatriage.appointments");
    let rows = sqlx::query(&query).fetch_all(pool).await?;
    Ok(rows.iter().map(appointment_from_row).collect())
}

pub async fn fetch_appointment(
    pool: &PgPool,
    id: &str,
) -> anyhow::Result<Option<AppointmentRecord>> {
    let query = format!("SELECT {APPOINTMENT_COLUMNS} FROM dermatriage.appointments WHERE id = $1");
    let row = sqlx::query(&query).bind(id).fetch_optional(pool).await?;
    Ok(row.as_ref().map(appointment_from_row))
}

pub async fn fetch_appointments_by_name_prefix(
    pool: &PgPool,
    prefix: &str,
) -> anyhow::Result<Vec<AppointmentRecord>> {
    let query = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM dermatriage.appointments \
         WHERE starts_with(user_name, $1) ORDER BY user_name"
    );
    let rows = sqlx::query(&query).bind(prefix).fetch_all(pool).await?;
    Ok(rows.iter().map(appointment_from_row).collect())
}

fn notification_from_row(row: &PgRow) -> NotificationRecord {
    NotificationRecord {
        id: row.get("id"),
        to: row.get("recipient"),
        subject: row.get("subject"),
        message: row.get("message"),
        photo_url: row.get("photo_url"),
        urgency_level: row.get("urgency_level"),
        status: NotificationStatus::parse(row.get::<Option<String>, _>("status").as_deref()),
        created_at: row.get("created_at"),
        sent_at: row.get("sent_at"),
        error: row.get("error"),
    }
}

pub async fn notification_status_counts(pool: &PgPool) -> anyhow::Result<Vec<StatusCount>> {
    let rows = sqlx::query(
        r#"
        SELECT COALESCE(status, 'missing') AS status, COUNT(*) AS count
        FROM dermatriage.notifications
        GROUP BY 1
        ORDER BY 2 DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| StatusCount {
            status: row.get("status"),
            count: row.get("count"),
        })
        .collect())
}

pub async fn recent_failed_notifications(
    pool: &PgPool,
    limit: i64,
) -> anyhow::Result<Vec<NotificationRecord>> {
    let query = format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM dermatriage.notifications \
         WHERE status = 'error' ORDER BY created_at DESC LIMIT $1"
    );
    let rows = sqlx::query(&query).bind(limit).fetch_all(pool).await?;
    Ok(rows.iter().map(notification_from_row).collect())
}

/// Notification outbox stored in `dermatriage.notifications`.
#[derive(Clone)]
pub struct PgNotificationStore {
    pool: PgPool,
}

impl PgNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn insert(&self, notification: &NewNotification) -> anyhow::Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO dermatriage.notifications
            (id, recipient, subject, message, photo_url, urgency_level, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, now())
            "#,
        )
        .bind(id)
        .bind(&notification.to)
        .bind(&notification.subject)
        .bind(&notification.message)
        .bind(&notification.photo_url)
        .bind(notification.urgency_level.map(|tier| tier.to_string()))
        .bind(NotificationStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn load(&self, id: Uuid) -> anyhow::Result<Option<NotificationRecord>> {
        let query = format!("SELECT {NOTIFICATION_COLUMNS} FROM dermatriage.notifications WHERE id = $1");
        let row = sqlx::query(&query).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(notification_from_row))
    }

    async fn pending_ids(&self, limit: i64) -> anyhow::Result<Vec<Uuid>> {
        let rows = sqlx::query(
            r#"
            SELECT id FROM dermatriage.notifications
            WHERE status = 'pending'
            ORDER BY created_at
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|row| row.get("id")).collect())
    }

    async fn mark_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE dermatriage.notifications
            SET status = 'sent', sent_at = $2
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(sent_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_failed(&self, id: Uuid, reason: &str) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE dermatriage.notifications
            SET status = 'error', error = $2
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(reason)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
