//! Attendance API client.
//!
//! The kiosk talks to the attendance service over HTTP: one multipart POST
//! to submit a capture, one GET to fetch the employee's last log. The
//! service signals a location denial through a literal detail string; that
//! string is recognized here, at the HTTP boundary, and surfaced as the
//! structured [`ApiError::IpDenied`] — nothing downstream pattern-matches
//! message text.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use clockface_core::LogType;

/// Detail string the attendance service uses for an IP-allowlist denial.
pub const IP_DENIED_DETAIL: &str = "Access denied from this IP address";

#[derive(Error, Debug, Clone)]
pub enum ApiError {
    /// The kiosk's address is not on the service allowlist. Terminal.
    /// Displays the service's own detail string so the frontend shows the
    /// exact wording the service chose.
    #[error("{}", IP_DENIED_DETAIL)]
    IpDenied,
    /// The submitted face did not match the enrolled image. Recoverable —
    /// the attempt retries on the next submit tick.
    #[error("face not recognized: {0}")]
    NotRecognized(String),
    /// Any other service-side rejection. Recoverable.
    #[error("attendance service rejected the request (HTTP {status}): {detail}")]
    Rejected { status: u16, detail: String },
    /// Auth token invalid or expired. Terminal.
    #[error("attendance service rejected the auth token")]
    Unauthorized,
    /// Network-level failure. Terminal: fail safe rather than leave the
    /// camera running with no feedback.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ApiError {
    /// Terminal errors tear down the capture attempt and the camera;
    /// recoverable ones leave the attempt alive for an automatic retry.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ApiError::IpDenied | ApiError::Unauthorized | ApiError::Transport(_)
        )
    }
}

/// Accepted submission: the log type now on record, plus the service's
/// user-facing message.
#[derive(Debug, Clone)]
pub struct AttendanceOutcome {
    pub log_type: LogType,
    pub message: String,
}

/// The attendance service, seen from the kiosk.
#[async_trait]
pub trait AttendanceApi: Send + Sync {
    /// Submit one still image for the requested log type.
    async fn recognize(
        &self,
        image: Vec<u8>,
        log_type: LogType,
    ) -> Result<AttendanceOutcome, ApiError>;

    /// Fetch the employee's most recent log type, if any.
    async fn last_log(&self) -> Result<Option<LogType>, ApiError>;
}

// ── HTTP implementation ──────────────────────────────────────────────────────

#[derive(Deserialize)]
struct SuccessBody {
    message: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

#[derive(Deserialize)]
struct LastLogBody {
    log_type: Option<String>,
}

/// `ureq`-backed client. Requests run on the blocking pool so the
/// controller loop keeps classifying frames while a submission is out.
#[derive(Clone)]
pub struct HttpAttendanceClient {
    agent: ureq::Agent,
    base_url: String,
    token: String,
}

impl HttpAttendanceClient {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            // Keep 4xx/5xx as responses so the detail body can be read.
            .http_status_as_error(false)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    fn recognize_blocking(
        &self,
        image: &[u8],
        log_type: LogType,
    ) -> Result<AttendanceOutcome, ApiError> {
        let boundary = format!("clockface-{:016x}", rand::random::<u64>());
        let body = multipart_body(&boundary, image, log_type.wire_code());
        let url = format!("{}/recognize_face/", self.base_url);

        let mut resp = self
            .agent
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .send(&body[..])
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = resp.status().as_u16();
        let text = resp
            .body_mut()
            .read_to_string()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        if (200..300).contains(&status) {
            let message = serde_json::from_str::<SuccessBody>(&text)
                .map(|b| b.message)
                .unwrap_or_else(|_| "attendance recorded".to_string());
            return Ok(AttendanceOutcome { log_type, message });
        }

        let detail = serde_json::from_str::<ErrorBody>(&text)
            .map(|b| b.detail)
            .unwrap_or(text);

        match status {
            403 if detail == IP_DENIED_DETAIL => Err(ApiError::IpDenied),
            401 => Err(ApiError::NotRecognized(detail)),
            _ => Err(ApiError::Rejected { status, detail }),
        }
    }

    fn last_log_blocking(&self) -> Result<Option<LogType>, ApiError> {
        let url = format!("{}/fetch_last_log/", self.base_url);

        let mut resp = self
            .agent
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .call()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = resp.status().as_u16();
        let text = resp
            .body_mut()
            .read_to_string()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        match status {
            200 => {
                let body: LastLogBody = serde_json::from_str(&text)
                    .map_err(|e| ApiError::Transport(format!("malformed last-log body: {e}")))?;
                Ok(body.log_type.as_deref().and_then(LogType::parse))
            }
            404 => Ok(None),
            401 => Err(ApiError::Unauthorized),
            _ => Err(ApiError::Rejected {
                status,
                detail: text,
            }),
        }
    }
}

#[async_trait]
impl AttendanceApi for HttpAttendanceClient {
    async fn recognize(
        &self,
        image: Vec<u8>,
        log_type: LogType,
    ) -> Result<AttendanceOutcome, ApiError> {
        let client = self.clone();
        tokio::task::spawn_blocking(move || client.recognize_blocking(&image, log_type))
            .await
            .map_err(|e| ApiError::Transport(format!("request task failed: {e}")))?
    }

    async fn last_log(&self) -> Result<Option<LogType>, ApiError> {
        let client = self.clone();
        tokio::task::spawn_blocking(move || client.last_log_blocking())
            .await
            .map_err(|e| ApiError::Transport(format!("request task failed: {e}")))?
    }
}

/// Build a two-part `multipart/form-data` body: the JPEG under `file`, the
/// log code under `log`. Matches what the attendance service's form parser
/// expects.
fn multipart_body(boundary: &str, image: &[u8], log_code: &str) -> Vec<u8> {
    let mut body = Vec::with_capacity(image.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"file\"; filename=\"face.jpg\"\r\n",
    );
    body.extend_from_slice(b"Content-Type: image/jpeg\r\n\r\n");
    body.extend_from_slice(image);
    body.extend_from_slice(format!("\r\n--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"log\"\r\n\r\n");
    body.extend_from_slice(log_code.as_bytes());
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}
