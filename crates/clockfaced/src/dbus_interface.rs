use zbus::interface;

use crate::controller::{ControllerError, ControllerHandle};
use clockface_core::{LandmarkSample, LogType};

/// D-Bus interface for the Clockface kiosk daemon.
///
/// Bus name: org.clockface.Kiosk1
/// Object path: /org/clockface/Kiosk1
///
/// The landmark tracker delivers its per-frame callback through
/// `SubmitSample`; the kiosk frontend drives the attempt lifecycle through
/// `StartSession` / `CancelSession` and polls `Status`.
pub struct KioskService {
    pub controller: ControllerHandle,
}

fn to_fdo(e: ControllerError) -> zbus::fdo::Error {
    match e {
        ControllerError::AlreadyLogged(_) | ControllerError::SessionActive => {
            zbus::fdo::Error::Failed(e.to_string())
        }
        ControllerError::ChannelClosed => {
            zbus::fdo::Error::Failed("kiosk controller unavailable".to_string())
        }
    }
}

#[interface(name = "org.clockface.Kiosk1")]
impl KioskService {
    /// Start a capture attempt for "in" or "out". Returns the first side
    /// challenge the user must turn toward.
    async fn start_session(&self, log_type: &str) -> zbus::fdo::Result<String> {
        let log_type = LogType::parse(log_type).ok_or_else(|| {
            zbus::fdo::Error::InvalidArgs(format!("unknown log type '{log_type}' (want in|out)"))
        })?;
        tracing::info!(%log_type, "start_session requested");

        let challenge = self.controller.start(log_type).await.map_err(to_fdo)?;
        Ok(challenge.to_string())
    }

    /// Cancel the current capture attempt and stop the camera.
    async fn cancel_session(&self) -> zbus::fdo::Result<()> {
        tracing::info!("cancel_session requested");
        self.controller.cancel().await.map_err(to_fdo)
    }

    /// Per-frame landmark callback: whether a face was found, and the
    /// normalized horizontal nose-tip position.
    async fn submit_sample(&self, found: bool, nose_x: f64) -> zbus::fdo::Result<()> {
        let sample = if found {
            LandmarkSample::face(nose_x as f32)
        } else {
            LandmarkSample::no_face()
        };
        self.controller.sample(sample).await.map_err(to_fdo)
    }

    /// Return the controller state as JSON.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let snapshot = self.controller.status().await.map_err(to_fdo)?;
        serde_json::to_string(&snapshot).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }
}
