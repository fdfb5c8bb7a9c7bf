use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

mod appointments;
mod config;
mod db;
mod error;
mod models;
mod relay;
mod report;
mod store;
mod transport;
mod triage;
mod urgency;

use crate::config::{DatabaseConfig, EmailConfig, RelayConfig};
use crate::models::{AppointmentRecord, ClassificationResult};
use crate::relay::{Relay, RelayOutcome};
use crate::store::NotificationStore;
use crate::transport::HttpEmailTransport;

#[derive(Parser)]
#[command(name = "dermatriage")]
#[command(about = "Lesion urgency triage and patient email relay for the dermatology clinic", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load sample appointments
    Seed,
    /// Import appointments from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Print the urgency tier for classifier output
    Assess {
        /// Classifier output as LABEL=CONFIDENCE, repeatable
        #[arg(long = "result", required = true)]
        results: Vec<ClassificationResult>,
    },
    /// Assess an appointment's lesion and queue a patient email when warranted
    Triage {
        #[arg(long)]
        appointment: String,
        #[arg(long = "result", required = true)]
        results: Vec<ClassificationResult>,
    },
    /// Queue a reschedule email for an appointment
    Reschedule {
        #[arg(long)]
        appointment: String,
        #[arg(long)]
        date: String,
        #[arg(long)]
        time: String,
        #[arg(long)]
        note: Option<String>,
    },
    /// Run the notification relay until interrupted
    Relay,
    /// Relay a single notification
    RelayOnce {
        #[arg(long)]
        id: Uuid,
    },
    /// List appointments, newest first
    Appointments {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Find patients by name prefix
    Patients {
        #[arg(long)]
        name: String,
    },
    /// Generate a markdown outbox report
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    if let Commands::Assess { results } = &cli.command {
        let assessment = urgency::assess(results)?;
        println!(
            "{} (primary: {} at {:.2})",
            assessment.tier, assessment.primary.label, assessment.primary.confidence
        );
        println!("{}", assessment.guidance);
        return Ok(());
    }

    let database = DatabaseConfig::from_env()?;
    let pool = PgPoolOptions::new()
        .max_connections(database.max_connections)
        .connect(&database.url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::Assess { .. } => {}
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} appointments from {}.", csv.display());
        }
        Commands::Triage {
            appointment,
            results,
        } => {
            let appointment = load_appointment(&pool, &appointment).await?;
            let assessment = urgency::assess(&results)?;
            println!("Urgency: {} ({})", assessment.tier, assessment.guidance);

            match triage::triage_notification(&assessment, &appointment) {
                Some(notification) => {
                    let id = db::PgNotificationStore::new(pool.clone())
                        .insert(&notification)
                        .await?;
                    tracing::info!(notification_id = %id, tier = %assessment.tier, "notification queued");
                    println!("Queued notification {id} to {}.", notification.to);
                }
                None => println!("No notification required."),
            }
        }
        Commands::Reschedule {
            appointment,
            date,
            time,
            note,
        } => {
            let appointment = load_appointment(&pool, &appointment).await?;
            let notification =
                triage::reschedule_notification(&appointment, &date, &time, note.as_deref());
            let id = db::PgNotificationStore::new(pool.clone())
                .insert(&notification)
                .await?;
            println!("Queued notification {id} to {}.", notification.to);
        }
        Commands::Relay => {
            let relay = build_relay(&pool)?;
            let relay_config = RelayConfig::from_env()?;
            relay::run_worker(&relay, &relay_config, async {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %err, "failed to listen for shutdown signal");
                }
            })
            .await?;
        }
        Commands::RelayOnce { id } => {
            let relay = build_relay(&pool)?;
            match relay.handle(id).await? {
                RelayOutcome::Sent => println!("Notification {id} sent."),
                RelayOutcome::Skipped => println!("Notification {id} is not pending; nothing to do."),
            }
        }
        Commands::Appointments { limit } => {
            let mut appointments = db::fetch_appointments(&pool).await?;
            if appointments.is_empty() {
                println!("No appointments found.");
                return Ok(());
            }
            appointments::sort_by_recency(&mut appointments);
            for appointment in appointments.iter().take(limit) {
                println!(
                    "- {} {} {} <{}> [{}] {} photo(s): {}",
                    appointment.appointment_date,
                    appointment.appointment_time,
                    appointment.user_name,
                    appointment.user_email,
                    appointment.status,
                    appointment.photos.len(),
                    appointment.complaint
                );
            }
        }
        Commands::Patients { name } => {
            let candidates = db::fetch_appointments_by_name_prefix(&pool, &name).await?;
            let patients = appointments::search_patients(&candidates, &name);
            if patients.is_empty() {
                println!("No patients match `{name}`.");
                return Ok(());
            }
            for patient in patients {
                println!(
                    "- {} ({}, {}) last appointment {}",
                    patient.name, patient.phone, patient.email, patient.last_appointment
                );
            }
        }
        Commands::Report { out } => {
            let counts = db::notification_status_counts(&pool).await?;
            let failures = db::recent_failed_notifications(&pool, 10).await?;
            let appointments = db::fetch_appointments(&pool).await?;
            let report = report::build_report(chrono::Utc::now(), &counts, &failures, &appointments);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

async fn load_appointment(pool: &PgPool, id: &str) -> anyhow::Result<AppointmentRecord> {
    db::fetch_appointment(pool, id)
        .await?
        .with_context(|| format!("appointment `{id}` not found"))
}

fn build_relay(pool: &PgPool) -> anyhow::Result<Relay<db::PgNotificationStore, HttpEmailTransport>> {
    let email = EmailConfig::from_env()?;
    let transport = HttpEmailTransport::new(&email)?;
    Ok(Relay::new(
        db::PgNotificationStore::new(pool.clone()),
        transport,
        email.from,
    ))
}
