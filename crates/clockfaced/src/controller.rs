//! Session controller: the single owner of all capture-attempt state.
//!
//! One task owns the liveness session, the challenge RNG, and the attendance
//! tracker, and is driven by exactly one `select!` loop: the command channel
//! (start/cancel/sample/status), the side-challenge reissue tick, the submit
//! tick, and the midnight rollover tick. Timer callbacks and frame callbacks
//! therefore never race — everything is serialized through the loop, and no
//! other component mutates the phase or the match flag.
//!
//! A submission runs as a spawned task and posts its outcome back into the
//! loop as a message, so classification keeps updating the match flag while
//! the request is out. The `in_flight` flag guarantees at most one
//! outstanding submission; it is released on every outcome path.

use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;

use crate::api::{ApiError, AttendanceApi, AttendanceOutcome};
use crate::camera::{CameraError, CameraSource};
use crate::tracker::AttendanceTracker;
use clockface_core::{
    classify, ChallengeRng, Direction, LandmarkSample, LivenessSession, LogType, Phase,
};

#[derive(Error, Debug, Clone)]
pub enum ControllerError {
    #[error("already clocked {0}; wait for the opposite action")]
    AlreadyLogged(LogType),
    #[error("a capture attempt is already in progress")]
    SessionActive,
    #[error("controller task exited")]
    ChannelClosed,
}

/// Why a submit tick did nothing. Checked in order; each is a distinct
/// no-op, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SkipReason {
    InFlight,
    CameraNotReady,
    Unauthenticated,
    NotMatched,
}

#[derive(Error, Debug)]
enum SubmitFailure {
    #[error("{0}")]
    Camera(#[from] CameraError),
    #[error("{0}")]
    Api(#[from] ApiError),
}

impl SubmitFailure {
    fn is_terminal(&self) -> bool {
        match self {
            // Sensor loss mid-submission aborts the attempt outright.
            SubmitFailure::Camera(_) => true,
            SubmitFailure::Api(e) => e.is_terminal(),
        }
    }
}

/// Point-in-time view of the controller, for the status surface.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub phase: Phase,
    pub expected_direction: Option<Direction>,
    pub direction_matched: bool,
    pub requested_log_type: Option<LogType>,
    pub current_log_type: Option<LogType>,
    pub camera_on: bool,
    pub submission_in_flight: bool,
    pub message: Option<String>,
}

enum ControllerMsg {
    Start {
        log_type: LogType,
        reply: oneshot::Sender<Result<Direction, ControllerError>>,
    },
    Cancel {
        reply: oneshot::Sender<()>,
    },
    Sample {
        sample: LandmarkSample,
    },
    Status {
        reply: oneshot::Sender<StatusSnapshot>,
    },
    SubmissionDone {
        result: Result<AttendanceOutcome, SubmitFailure>,
    },
}

/// Clone-safe handle to the controller task.
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<ControllerMsg>,
}

impl ControllerHandle {
    /// Begin a capture attempt; returns the first side challenge to display.
    pub async fn start(&self, log_type: LogType) -> Result<Direction, ControllerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ControllerMsg::Start { log_type, reply })
            .await
            .map_err(|_| ControllerError::ChannelClosed)?;
        rx.await.map_err(|_| ControllerError::ChannelClosed)?
    }

    /// Cancel the current attempt and stop the camera.
    pub async fn cancel(&self) -> Result<(), ControllerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ControllerMsg::Cancel { reply })
            .await
            .map_err(|_| ControllerError::ChannelClosed)?;
        rx.await.map_err(|_| ControllerError::ChannelClosed)
    }

    /// Deliver one frame's landmark sample (the tracker's per-frame callback).
    pub async fn sample(&self, sample: LandmarkSample) -> Result<(), ControllerError> {
        self.tx
            .send(ControllerMsg::Sample { sample })
            .await
            .map_err(|_| ControllerError::ChannelClosed)
    }

    pub async fn status(&self) -> Result<StatusSnapshot, ControllerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ControllerMsg::Status { reply })
            .await
            .map_err(|_| ControllerError::ChannelClosed)?;
        rx.await.map_err(|_| ControllerError::ChannelClosed)
    }
}

#[derive(Clone)]
pub struct ControllerConfig {
    pub employee_no: Option<String>,
    pub submit_interval: Duration,
    pub reissue_interval: Duration,
    pub midnight_check_interval: Duration,
}

type TodayFn = Box<dyn Fn() -> NaiveDate + Send>;

/// Spawn the controller task.
pub fn spawn(
    config: ControllerConfig,
    camera: Arc<dyn CameraSource>,
    api: Arc<dyn AttendanceApi>,
    tracker: AttendanceTracker,
    rng: ChallengeRng,
) -> ControllerHandle {
    spawn_with_today(
        config,
        camera,
        api,
        tracker,
        rng,
        Box::new(|| Local::now().date_naive()),
    )
}

pub(crate) fn spawn_with_today(
    config: ControllerConfig,
    camera: Arc<dyn CameraSource>,
    api: Arc<dyn AttendanceApi>,
    tracker: AttendanceTracker,
    rng: ChallengeRng,
    today: TodayFn,
) -> ControllerHandle {
    let (tx, rx) = mpsc::channel(32);

    let controller = Controller {
        session: LivenessSession::new(),
        rng,
        tracker,
        camera,
        api,
        employee_no: config.employee_no.clone(),
        camera_on: false,
        in_flight: false,
        message: None,
        tx: tx.clone(),
        today,
    };

    tokio::spawn(controller.run(config, rx));

    ControllerHandle { tx }
}

struct Controller {
    session: LivenessSession,
    rng: ChallengeRng,
    tracker: AttendanceTracker,
    camera: Arc<dyn CameraSource>,
    api: Arc<dyn AttendanceApi>,
    employee_no: Option<String>,
    camera_on: bool,
    in_flight: bool,
    message: Option<String>,
    tx: mpsc::Sender<ControllerMsg>,
    today: TodayFn,
}

impl Controller {
    async fn run(mut self, config: ControllerConfig, mut rx: mpsc::Receiver<ControllerMsg>) {
        let mut reissue = tokio::time::interval(config.reissue_interval);
        let mut submit = tokio::time::interval(config.submit_interval);
        let mut midnight = tokio::time::interval(config.midnight_check_interval);
        // Ticks re-check preconditions when they fire; a burst of missed
        // ticks has nothing extra to do.
        reissue.set_missed_tick_behavior(MissedTickBehavior::Skip);
        submit.set_missed_tick_behavior(MissedTickBehavior::Skip);
        midnight.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!("session controller started");

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let Some(msg) = msg else { break };
                    match msg {
                        ControllerMsg::Start { log_type, reply } => {
                            let result = self.handle_start(log_type);
                            if result.is_ok() {
                                // Align both timers with the fresh attempt.
                                reissue.reset();
                                submit.reset();
                            }
                            let _ = reply.send(result);
                        }
                        ControllerMsg::Cancel { reply } => {
                            self.handle_cancel();
                            let _ = reply.send(());
                        }
                        ControllerMsg::Sample { sample } => self.handle_sample(sample),
                        ControllerMsg::Status { reply } => {
                            let _ = reply.send(self.snapshot());
                        }
                        ControllerMsg::SubmissionDone { result } => {
                            self.handle_submission_done(result);
                        }
                    }
                }
                _ = reissue.tick() => {
                    if let Some(challenge) =
                        self.session.maybe_reissue(Instant::now(), &mut self.rng)
                    {
                        tracing::info!(%challenge, "issued fresh side challenge");
                    }
                }
                _ = submit.tick() => self.try_capture(),
                _ = midnight.tick() => {
                    let today = (self.today)();
                    self.tracker.roll_over(today);
                }
            }
        }

        tracing::info!("session controller exiting");
    }

    fn handle_start(&mut self, log_type: LogType) -> Result<Direction, ControllerError> {
        if self.session.is_active() {
            return Err(ControllerError::SessionActive);
        }
        if !self.tracker.can_start(log_type) {
            tracing::warn!(%log_type, "start refused: duplicate consecutive log");
            return Err(ControllerError::AlreadyLogged(log_type));
        }

        self.camera.start();
        self.camera_on = true;
        self.message = None;

        let challenge = self
            .session
            .start(log_type, Instant::now(), &mut self.rng)
            .map_err(|_| ControllerError::SessionActive)?;
        tracing::info!(%log_type, %challenge, "capture attempt started");
        Ok(challenge)
    }

    fn handle_cancel(&mut self) {
        if self.session.is_active() {
            tracing::info!(phase = %self.session.phase(), "attempt canceled");
        }
        // Stopping the camera also invalidates late frame callbacks: samples
        // arriving after this point are discarded in handle_sample.
        self.camera.stop();
        self.camera_on = false;
        self.session.reset();
    }

    fn handle_sample(&mut self, sample: LandmarkSample) {
        if !self.camera_on {
            return;
        }
        let before = self.session.phase();
        self.session.observe(classify(&sample), Instant::now());
        let after = self.session.phase();
        if before != after {
            tracing::debug!(%before, %after, "phase transition");
        }
    }

    /// Submit-timer tick: re-check every precondition at fire time, then
    /// launch at most one capture + submission.
    fn try_capture(&mut self) {
        if !self.session.is_active() {
            return;
        }

        let skip = if self.in_flight {
            Some(SkipReason::InFlight)
        } else if !self.camera.is_ready() {
            Some(SkipReason::CameraNotReady)
        } else if self.employee_no.is_none() {
            Some(SkipReason::Unauthenticated)
        } else if !self.session.ready_to_submit() {
            Some(SkipReason::NotMatched)
        } else {
            None
        };

        if let Some(reason) = skip {
            tracing::debug!(?reason, "submit tick skipped");
            return;
        }

        let Some(log_type) = self.session.requested_log_type() else {
            return;
        };
        if !self.session.begin_submission() {
            return;
        }
        self.in_flight = true;
        tracing::info!(%log_type, "capturing still for submission");

        let camera = self.camera.clone();
        let api = self.api.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = match camera.capture_still().await {
                Ok(image) => api
                    .recognize(image, log_type)
                    .await
                    .map_err(SubmitFailure::Api),
                Err(e) => Err(SubmitFailure::Camera(e)),
            };
            // The loop may have shut down; nothing to do then.
            let _ = tx.send(ControllerMsg::SubmissionDone { result }).await;
        });
    }

    fn handle_submission_done(&mut self, result: Result<AttendanceOutcome, SubmitFailure>) {
        self.in_flight = false;

        if self.session.phase() != Phase::Submitting {
            // Canceled (or torn down) while the request was out.
            tracing::debug!("submission outcome arrived after teardown; dropped");
            return;
        }

        match result {
            Ok(outcome) => {
                self.session.settle();
                self.tracker.record(outcome.log_type);
                tracing::info!(log_type = %outcome.log_type, "attendance recorded");
                self.message = Some(outcome.message);
                self.camera.stop();
                self.camera_on = false;
                self.session.reset();
            }
            Err(failure) if failure.is_terminal() => {
                tracing::warn!(error = %failure, "submission failed terminally; attempt torn down");
                self.session.terminal_failure();
                self.message = Some(failure.to_string());
                self.camera.stop();
                self.camera_on = false;
                self.session.reset();
            }
            Err(failure) => {
                tracing::info!(error = %failure, "submission rejected; will retry on next tick");
                self.session.recoverable_failure();
                self.message = Some(failure.to_string());
            }
        }
    }

    fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            phase: self.session.phase(),
            expected_direction: self.session.expected_direction(),
            direction_matched: self.session.direction_matched(),
            requested_log_type: self.session.requested_log_type(),
            current_log_type: self.tracker.current(),
            camera_on: self.camera_on,
            submission_in_flight: self.in_flight,
            message: self.message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Notify;
    use tokio::time::sleep;

    struct MockCamera {
        ready: AtomicBool,
        stills: AtomicUsize,
        allow_ready: bool,
        fail_capture: bool,
    }

    impl MockCamera {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                ready: AtomicBool::new(false),
                stills: AtomicUsize::new(0),
                allow_ready: true,
                fail_capture: false,
            })
        }

        fn never_ready() -> Arc<Self> {
            Arc::new(Self {
                ready: AtomicBool::new(false),
                stills: AtomicUsize::new(0),
                allow_ready: false,
                fail_capture: false,
            })
        }

        /// Reports ready but every capture fails (device yanked mid-attempt).
        fn failing_capture() -> Arc<Self> {
            Arc::new(Self {
                ready: AtomicBool::new(false),
                stills: AtomicUsize::new(0),
                allow_ready: true,
                fail_capture: true,
            })
        }

        fn stills(&self) -> usize {
            self.stills.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CameraSource for MockCamera {
        fn is_ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }

        fn start(&self) {
            if self.allow_ready {
                self.ready.store(true, Ordering::SeqCst);
            }
        }

        fn stop(&self) {
            self.ready.store(false, Ordering::SeqCst);
        }

        async fn capture_still(&self) -> Result<Vec<u8>, CameraError> {
            if !self.is_ready() {
                return Err(CameraError::NotReady);
            }
            if self.fail_capture {
                return Err(CameraError::CaptureFailed("device disconnected".into()));
            }
            self.stills.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0xff, 0xd8, 0xff, 0xd9])
        }
    }

    struct ScriptedApi {
        script: Mutex<VecDeque<Result<AttendanceOutcome, ApiError>>>,
        calls: AtomicUsize,
        gate: Option<Notify>,
    }

    impl ScriptedApi {
        fn new(script: Vec<Result<AttendanceOutcome, ApiError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
                gate: None,
            })
        }

        /// Responses held until `release` is called.
        fn gated(script: Vec<Result<AttendanceOutcome, ApiError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
                gate: Some(Notify::new()),
            })
        }

        fn release(&self) {
            if let Some(gate) = &self.gate {
                gate.notify_one();
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AttendanceApi for ScriptedApi {
        async fn recognize(
            &self,
            _image: Vec<u8>,
            _log_type: LogType,
        ) -> Result<AttendanceOutcome, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ApiError::Rejected {
                    status: 500,
                    detail: "script exhausted".into(),
                }))
        }

        async fn last_log(&self) -> Result<Option<LogType>, ApiError> {
            Ok(None)
        }
    }

    fn accepted(log_type: LogType) -> Result<AttendanceOutcome, ApiError> {
        Ok(AttendanceOutcome {
            log_type,
            message: "Face recognized successfully".into(),
        })
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn test_config(employee: bool) -> ControllerConfig {
        ControllerConfig {
            employee_no: employee.then(|| "E1042".to_string()),
            submit_interval: Duration::from_secs(2),
            reissue_interval: Duration::from_secs(3),
            midnight_check_interval: Duration::from_secs(60),
        }
    }

    fn spawn_test(
        config: ControllerConfig,
        camera: Arc<MockCamera>,
        api: Arc<ScriptedApi>,
        current: Option<LogType>,
        date: Arc<Mutex<NaiveDate>>,
    ) -> ControllerHandle {
        let tracker = AttendanceTracker::new(current, *date.lock().unwrap());
        spawn_with_today(
            config,
            camera,
            api,
            tracker,
            ChallengeRng::from_seed(7),
            Box::new(move || *date.lock().unwrap()),
        )
    }

    /// Nose-x that classifies as the given direction.
    fn nose(direction: Direction) -> LandmarkSample {
        LandmarkSample::face(match direction {
            Direction::Left => 0.2,
            Direction::Right => 0.8,
            Direction::Center => 0.5,
        })
    }

    /// Drive the attempt through side match and center match.
    async fn pass_challenges(handle: &ControllerHandle, challenge: Direction) {
        handle.sample(nose(challenge)).await.unwrap();
        handle.sample(nose(Direction::Center)).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn happy_path_clock_in() {
        let camera = MockCamera::new();
        let api = ScriptedApi::new(vec![accepted(LogType::In)]);
        let date = Arc::new(Mutex::new(day(1)));
        let handle = spawn_test(test_config(true), camera.clone(), api.clone(), None, date);

        let challenge = handle.start(LogType::In).await.unwrap();
        assert!(challenge == Direction::Left || challenge == Direction::Right);

        pass_challenges(&handle, challenge).await;
        let status = handle.status().await.unwrap();
        assert_eq!(status.phase, Phase::Verified);
        assert!(status.direction_matched);
        assert!(status.camera_on);

        // Next 2s tick fires one capture + submission.
        sleep(Duration::from_millis(2100)).await;

        let status = handle.status().await.unwrap();
        assert_eq!(status.phase, Phase::Idle);
        assert_eq!(status.current_log_type, Some(LogType::In));
        assert!(!status.camera_on);
        assert!(!status.submission_in_flight);
        assert_eq!(status.message.as_deref(), Some("Face recognized successfully"));
        assert_eq!(camera.stills(), 1);
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn at_most_one_submission_under_dense_ticks() {
        let camera = MockCamera::new();
        let api = ScriptedApi::gated(vec![accepted(LogType::In)]);
        let date = Arc::new(Mutex::new(day(1)));
        let handle = spawn_test(test_config(true), camera.clone(), api.clone(), None, date);

        let challenge = handle.start(LogType::In).await.unwrap();
        pass_challenges(&handle, challenge).await;

        // Many submit ticks pass while the first request is still out.
        sleep(Duration::from_secs(9)).await;

        let status = handle.status().await.unwrap();
        assert_eq!(status.phase, Phase::Submitting);
        assert!(status.submission_in_flight);
        assert_eq!(camera.stills(), 1);
        assert_eq!(api.calls(), 1);

        api.release();
        sleep(Duration::from_millis(100)).await;
        let status = handle.status().await.unwrap();
        assert_eq!(status.phase, Phase::Idle);
        assert_eq!(status.current_log_type, Some(LogType::In));
    }

    #[tokio::test(start_paused = true)]
    async fn ip_denial_tears_down_without_touching_log_state() {
        let camera = MockCamera::new();
        let api = ScriptedApi::new(vec![Err(ApiError::IpDenied)]);
        let date = Arc::new(Mutex::new(day(1)));
        let handle = spawn_test(
            test_config(true),
            camera.clone(),
            api.clone(),
            Some(LogType::Out),
            date,
        );

        let challenge = handle.start(LogType::In).await.unwrap();
        pass_challenges(&handle, challenge).await;
        sleep(Duration::from_millis(2100)).await;

        let status = handle.status().await.unwrap();
        assert_eq!(status.phase, Phase::Idle);
        assert!(!status.camera_on);
        // The recorded log type is untouched by a location denial.
        assert_eq!(status.current_log_type, Some(LogType::Out));
        // The message is the service's own detail string, verbatim.
        assert_eq!(
            status.message.as_deref(),
            Some("Access denied from this IP address")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn capture_failure_mid_submission_tears_down() {
        let camera = MockCamera::failing_capture();
        let api = ScriptedApi::new(vec![accepted(LogType::In)]);
        let date = Arc::new(Mutex::new(day(1)));
        let handle = spawn_test(
            test_config(true),
            camera.clone(),
            api.clone(),
            Some(LogType::Out),
            date,
        );

        let challenge = handle.start(LogType::In).await.unwrap();
        pass_challenges(&handle, challenge).await;
        sleep(Duration::from_millis(2100)).await;

        // Sensor loss aborts the attempt outright: no API call was made,
        // the camera is stopped, and the recorded log type survives.
        let status = handle.status().await.unwrap();
        assert_eq!(status.phase, Phase::Idle);
        assert!(!status.camera_on);
        assert!(!status.submission_in_flight);
        assert_eq!(status.current_log_type, Some(LogType::Out));
        assert_eq!(api.calls(), 0);
        assert!(status.message.as_deref().unwrap().contains("capture failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn recoverable_rejection_retries_and_succeeds() {
        let camera = MockCamera::new();
        let api = ScriptedApi::new(vec![
            Err(ApiError::NotRecognized("Face not recognized".into())),
            accepted(LogType::Out),
        ]);
        let date = Arc::new(Mutex::new(day(1)));
        let handle = spawn_test(
            test_config(true),
            camera.clone(),
            api.clone(),
            Some(LogType::In),
            date,
        );

        let challenge = handle.start(LogType::Out).await.unwrap();
        pass_challenges(&handle, challenge).await;
        sleep(Duration::from_millis(2100)).await;

        // First submission rejected recoverably: attempt alive, camera on.
        let status = handle.status().await.unwrap();
        assert_eq!(status.phase, Phase::AwaitCenter);
        assert!(status.camera_on);
        assert_eq!(status.requested_log_type, Some(LogType::Out));

        // Re-match center; the next tick retries and succeeds.
        handle.sample(nose(Direction::Center)).await.unwrap();
        sleep(Duration::from_millis(2100)).await;

        let status = handle.status().await.unwrap();
        assert_eq!(status.phase, Phase::Idle);
        assert_eq!(status.current_log_type, Some(LogType::Out));
        assert_eq!(api.calls(), 2);
        assert_eq!(camera.stills(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_consecutive_log_rejected() {
        let camera = MockCamera::new();
        let api = ScriptedApi::new(vec![]);
        let date = Arc::new(Mutex::new(day(1)));
        let handle = spawn_test(
            test_config(true),
            camera.clone(),
            api,
            Some(LogType::In),
            date,
        );

        let err = handle.start(LogType::In).await.unwrap_err();
        assert!(matches!(err, ControllerError::AlreadyLogged(LogType::In)));

        let status = handle.status().await.unwrap();
        assert_eq!(status.phase, Phase::Idle);
        assert!(!status.camera_on);

        // The opposite direction is fine.
        handle.start(LogType::Out).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn midnight_rollover_spares_verified_attempt() {
        let camera = MockCamera::new();
        let api = ScriptedApi::new(vec![]);
        let date = Arc::new(Mutex::new(day(1)));
        // No employee number: submit ticks skip, holding the attempt in
        // Verified across the rollover.
        let handle = spawn_test(
            test_config(false),
            camera.clone(),
            api.clone(),
            Some(LogType::Out),
            date.clone(),
        );

        let challenge = handle.start(LogType::In).await.unwrap();
        pass_challenges(&handle, challenge).await;

        *date.lock().unwrap() = day(2);
        sleep(Duration::from_secs(61)).await;

        let status = handle.status().await.unwrap();
        assert_eq!(status.current_log_type, None);
        assert_eq!(status.phase, Phase::Verified);
        assert!(status.direction_matched);
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unauthenticated_kiosk_never_submits() {
        let camera = MockCamera::new();
        let api = ScriptedApi::new(vec![accepted(LogType::In)]);
        let date = Arc::new(Mutex::new(day(1)));
        let handle = spawn_test(test_config(false), camera.clone(), api.clone(), None, date);

        let challenge = handle.start(LogType::In).await.unwrap();
        pass_challenges(&handle, challenge).await;
        sleep(Duration::from_secs(7)).await;

        assert_eq!(api.calls(), 0);
        assert_eq!(camera.stills(), 0);
        let status = handle.status().await.unwrap();
        assert_eq!(status.phase, Phase::Verified);
    }

    #[tokio::test(start_paused = true)]
    async fn no_submission_while_camera_not_ready() {
        let camera = MockCamera::never_ready();
        let api = ScriptedApi::new(vec![accepted(LogType::In)]);
        let date = Arc::new(Mutex::new(day(1)));
        let handle = spawn_test(test_config(true), camera.clone(), api.clone(), None, date);

        let challenge = handle.start(LogType::In).await.unwrap();
        pass_challenges(&handle, challenge).await;
        sleep(Duration::from_secs(5)).await;

        assert_eq!(api.calls(), 0);
        assert_eq!(camera.stills(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn center_loss_pauses_submissions() {
        let camera = MockCamera::new();
        let api = ScriptedApi::new(vec![accepted(LogType::In)]);
        let date = Arc::new(Mutex::new(day(1)));
        let handle = spawn_test(test_config(true), camera.clone(), api.clone(), None, date);

        let challenge = handle.start(LogType::In).await.unwrap();
        pass_challenges(&handle, challenge).await;

        // Look away before the submit tick: the tick is a no-op.
        handle.sample(nose(Direction::Right)).await.unwrap();
        sleep(Duration::from_millis(2100)).await;
        assert_eq!(api.calls(), 0);

        let status = handle.status().await.unwrap();
        assert_eq!(status.phase, Phase::AwaitCenter);
        assert!(!status.direction_matched);
    }

    #[tokio::test(start_paused = true)]
    async fn late_outcome_after_cancel_is_dropped() {
        let camera = MockCamera::new();
        let api = ScriptedApi::gated(vec![accepted(LogType::In)]);
        let date = Arc::new(Mutex::new(day(1)));
        let handle = spawn_test(test_config(true), camera.clone(), api.clone(), None, date);

        let challenge = handle.start(LogType::In).await.unwrap();
        pass_challenges(&handle, challenge).await;
        sleep(Duration::from_millis(2100)).await;
        assert_eq!(api.calls(), 1);

        handle.cancel().await.unwrap();
        api.release();
        sleep(Duration::from_millis(100)).await;

        let status = handle.status().await.unwrap();
        assert_eq!(status.phase, Phase::Idle);
        assert_eq!(status.current_log_type, None);
        assert!(!status.submission_in_flight);
        assert!(!status.camera_on);
    }

    #[tokio::test(start_paused = true)]
    async fn samples_while_camera_off_are_discarded() {
        let camera = MockCamera::new();
        let api = ScriptedApi::new(vec![]);
        let date = Arc::new(Mutex::new(day(1)));
        let handle = spawn_test(test_config(true), camera, api, None, date);

        handle.sample(nose(Direction::Center)).await.unwrap();
        let status = handle.status().await.unwrap();
        assert_eq!(status.phase, Phase::Idle);
        assert!(!status.direction_matched);
    }
}
