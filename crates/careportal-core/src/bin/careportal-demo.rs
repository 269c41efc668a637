//! Walks through a guest visit and an account visit against the in-process
//! backend.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Duration, Local};
use clap::Parser;
use tracing::info;

use careportal_core::models::DOCTORS;
use careportal_core::remote::MemoryBackend;
use careportal_core::{
    logging, upcoming, AuthOutcome, BookingRequest, GuardView, Portal, PortalConfig,
};

/// careportal demo - guest and account walkthrough
#[derive(Parser, Debug)]
#[command(name = "careportal-demo")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to a JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter (overrides config and CAREPORTAL_LOG)
    #[arg(long)]
    log_level: Option<String>,

    /// Username registered during the account walkthrough
    #[arg(long, default_value = "demo_user")]
    username: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => PortalConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PortalConfig::default(),
    }
    .with_env_overrides();
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }
    logging::init(&config.log_level);

    let backend = Arc::new(MemoryBackend::new(config.backend_config()));
    let portal = Portal::open(config, backend.clone()).context("failed to open portal")?;
    let today = Local::now().date_naive();

    guest_visit(&portal, today).await?;
    account_visit(&portal, &args.username, today).await?;
    Ok(())
}

async fn guest_visit(portal: &Portal, today: chrono::NaiveDate) -> Result<()> {
    info!("guest walkthrough");
    portal.auth().enter_as_guest()?;

    let mut guard = portal.guard();
    if guard.mount().await != GuardView::Protected {
        bail!("guest was not let through");
    }

    for (offset, time) in [(3, "02:00 PM"), (1, "09:30 AM")] {
        portal
            .book(
                BookingRequest {
                    doctor_id: DOCTORS[0].id.to_string(),
                    date: Some(today + Duration::days(offset)),
                    time: time.to_string(),
                    notes: String::new(),
                },
                today,
            )
            .await?;
    }

    let stored = portal.appointments().fetch().await?;
    for apt in upcoming(&stored, today) {
        println!("guest  | {} {} with {}", apt.date, apt.time, apt.doctor);
    }

    portal.auth().logout().await?;
    Ok(())
}

async fn account_visit(portal: &Portal, username: &str, today: chrono::NaiveDate) -> Result<()> {
    info!("account walkthrough");
    let auth = portal.auth();
    match auth.sign_up(username, "demo@example.com", "demo-pass").await? {
        AuthOutcome::Redirect(route) => info!(to = route.path(), "signed up"),
        AuthOutcome::VerificationRequired => {
            println!("account | {}", careportal_core::auth::VERIFICATION_MESSAGE);
            return Ok(());
        }
    }

    let mut guard = portal.guard();
    let view = guard.mount().await;
    println!("account | guard view: {:?}", view);
    if view == GuardView::Onboarding {
        guard.submit_username(username).await?;
    }

    portal
        .book(
            BookingRequest {
                doctor_id: DOCTORS[1].id.to_string(),
                date: Some(today + Duration::days(2)),
                time: "10:00 AM".into(),
                notes: "Follow-up".into(),
            },
            today,
        )
        .await?;
    for apt in portal.appointments().fetch().await? {
        println!("account | {} {} with {} ({})", apt.date, apt.time, apt.doctor, apt.status);
    }

    auth.logout().await?;
    let view = guard.process_pending_events().await;
    println!("account | after logout: {:?}", view);
    Ok(())
}
