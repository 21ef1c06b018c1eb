use std::time::Duration;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Base URL of the attendance API.
    pub api_url: String,
    /// Bearer token for the attendance API.
    pub api_token: String,
    /// Employee number this kiosk is logged in as. Submissions are skipped
    /// while unset.
    pub employee_no: Option<String>,
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Interval between submit attempts while the attempt is verified.
    pub submit_interval: Duration,
    /// Interval between side-challenge reissues while unmatched.
    pub reissue_interval: Duration,
    /// Interval for the local-midnight rollover check.
    pub midnight_check_interval: Duration,
    /// Timeout for attendance API requests.
    pub api_timeout: Duration,
    /// Whether the daemon is running on the session bus (development mode).
    pub session_bus: bool,
}

impl Config {
    /// Load configuration from `CLOCKFACE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self {
            api_url: std::env::var("CLOCKFACE_API_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8000".to_string()),
            api_token: std::env::var("CLOCKFACE_API_TOKEN").unwrap_or_default(),
            employee_no: std::env::var("CLOCKFACE_EMPLOYEE_NO")
                .ok()
                .filter(|s| !s.is_empty()),
            camera_device: std::env::var("CLOCKFACE_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            submit_interval: Duration::from_secs(env_u64("CLOCKFACE_SUBMIT_INTERVAL_SECS", 2)),
            reissue_interval: Duration::from_secs(env_u64("CLOCKFACE_REISSUE_INTERVAL_SECS", 3)),
            midnight_check_interval: Duration::from_secs(env_u64(
                "CLOCKFACE_MIDNIGHT_CHECK_SECS",
                60,
            )),
            api_timeout: Duration::from_secs(env_u64("CLOCKFACE_API_TIMEOUT_SECS", 10)),
            session_bus: std::env::var("CLOCKFACE_SESSION_BUS").is_ok(),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
