use anyhow::{Context, Result};
use chrono::Local;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod api;
mod camera;
mod config;
mod controller;
mod dbus_interface;
mod tracker;

use api::{AttendanceApi, HttpAttendanceClient};
use camera::{CameraSource, V4l2Camera};
use config::Config;
use dbus_interface::KioskService;
use tracker::AttendanceTracker;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("clockfaced starting");

    let config = Config::from_env();
    if config.employee_no.is_none() {
        tracing::warn!("CLOCKFACE_EMPLOYEE_NO unset; submissions will be skipped");
    }

    let camera: Arc<dyn CameraSource> = Arc::new(
        V4l2Camera::open(&config.camera_device)
            .with_context(|| format!("failed to open camera {}", config.camera_device))?,
    );

    let api: Arc<dyn AttendanceApi> = Arc::new(HttpAttendanceClient::new(
        &config.api_url,
        &config.api_token,
        config.api_timeout,
    ));

    let tracker = AttendanceTracker::load(api.as_ref(), Local::now().date_naive()).await;

    let handle = controller::spawn(
        controller::ControllerConfig {
            employee_no: config.employee_no.clone(),
            submit_interval: config.submit_interval,
            reissue_interval: config.reissue_interval,
            midnight_check_interval: config.midnight_check_interval,
        },
        camera,
        api,
        tracker,
        clockface_core::ChallengeRng::from_entropy(),
    );

    let service = KioskService {
        controller: handle,
    };

    let builder = if config.session_bus {
        zbus::connection::Builder::session()?
    } else {
        zbus::connection::Builder::system()?
    };
    let _conn = builder
        .name("org.clockface.Kiosk1")?
        .serve_at("/org/clockface/Kiosk1", service)?
        .build()
        .await
        .context("failed to register D-Bus service")?;

    tracing::info!("clockfaced ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("clockfaced shutting down");

    Ok(())
}
