use chrono::Utc;
use log::{error, info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use crate::capture::classifier;
use crate::capture::decoder::FrameDecoder;
use crate::capture::source::{self, CaptureSource, PnetSource};
use crate::capture::store::RingBufferStore;
use crate::capture::writer::CaptureFileWriter;
use crate::models::config::AppConfig;
use crate::models::stats::CaptureStats;
use crate::utils::error::{AppError, AppResult};

/// Consecutive read errors tolerated before the loop gives up.
const MAX_CONSECUTIVE_ERRORS: u32 = 5;

/// Lifecycle state of the capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionState {
    Idle,
    Running,
    Stopping,
}

/// Why the background loop exited.
enum LoopExit {
    /// Stop was requested
    Stopped,
    /// The configured capture duration elapsed
    Completed,
    /// The source failed mid-loop
    Interrupted(String),
}

/// Options accepted by `start`.
#[derive(Debug, Default)]
pub struct StartOptions {
    /// Interface override; falls back to the configured default
    pub interface: Option<String>,

    /// Query-time IP filter to apply from the start
    pub filter_ip: Option<IpAddr>,

    /// Stop automatically after this many seconds
    pub duration_secs: Option<u64>,

    /// Also append records to this JSON-lines file
    pub capture_file: Option<PathBuf>,
}

/// Snapshot returned by `status`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub state: SessionState,
    pub interface: Option<String>,
    pub filter_ip: Option<IpAddr>,
    pub buffer_len: usize,
    pub last_seq: u64,
    pub stats: CaptureStats,
    pub last_error: Option<String>,
}

/// Coordinates the capture source and the background decode loop.
///
/// The session starts `IDLE`. `start` moves it to `RUNNING` and owns exactly
/// one background task running the read/decode/classify/insert loop. `stop`
/// passes through `STOPPING` and waits for that task to exit, so the source
/// handle is fully released before the session reports `IDLE` again.
pub struct CaptureSession {
    config: AppConfig,
    store: Arc<RingBufferStore>,
    stats: Arc<Mutex<CaptureStats>>,
    state: SessionState,
    interface: Option<String>,
    filter_ip: Option<IpAddr>,
    stop_flag: Arc<AtomicBool>,
    loop_task: Option<JoinHandle<LoopExit>>,
    last_error: Option<String>,
}

impl CaptureSession {
    /// Create a new idle session.
    pub fn new(config: AppConfig) -> Self {
        let store = Arc::new(RingBufferStore::new(config.capacity));
        let filter_ip = config.filter_ip;
        Self {
            config,
            store,
            stats: Arc::new(Mutex::new(CaptureStats::default())),
            state: SessionState::Idle,
            interface: None,
            filter_ip,
            stop_flag: Arc::new(AtomicBool::new(false)),
            loop_task: None,
            last_error: None,
        }
    }

    /// Start capturing on the requested (or configured default) interface.
    ///
    /// Open errors (missing privileges, unknown interface) surface to the
    /// caller synchronously and leave the session `IDLE`.
    pub async fn start(&mut self, opts: StartOptions) -> AppResult<()> {
        self.reap_finished_loop().await;

        if self.state != SessionState::Idle {
            return Err(AppError::AlreadyRunning);
        }

        let interface = opts
            .interface
            .clone()
            .or_else(|| self.config.interface.clone())
            .ok_or_else(|| AppError::BadRequest("no capture interface specified".to_string()))?;

        let source = PnetSource::open(&interface)?;
        self.start_with_source(Box::new(source), opts)
    }

    /// Start the background loop with an already-open source.
    ///
    /// Split out of `start` so the session can be driven by an in-memory
    /// source where live capture privileges are unavailable.
    pub(crate) fn start_with_source(
        &mut self,
        source: Box<dyn CaptureSource>,
        opts: StartOptions,
    ) -> AppResult<()> {
        if self.state != SessionState::Idle {
            return Err(AppError::AlreadyRunning);
        }

        let writer = match &opts.capture_file {
            Some(path) => Some(CaptureFileWriter::create(path)?),
            None => None,
        };

        if let Some(ip) = opts.filter_ip {
            self.filter_ip = Some(ip);
        }

        let interface = source.interface_name().to_string();
        *self.stats.lock() = CaptureStats::started(Utc::now());

        let stop_flag = Arc::new(AtomicBool::new(false));
        self.stop_flag = Arc::clone(&stop_flag);

        let deadline = opts
            .duration_secs
            .map(|secs| Instant::now() + Duration::from_secs(secs));
        let store = Arc::clone(&self.store);
        let stats = Arc::clone(&self.stats);

        info!("Starting capture on interface: {}", interface);
        self.loop_task = Some(tokio::task::spawn_blocking(move || {
            run_capture(source, store, stats, stop_flag, writer, deadline)
        }));
        self.interface = Some(interface);
        self.state = SessionState::Running;
        self.last_error = None;

        Ok(())
    }

    /// Stop the capture and wait for the background loop to fully exit.
    ///
    /// Stopping an idle session is a successful no-op.
    pub async fn stop(&mut self) -> AppResult<()> {
        self.reap_finished_loop().await;

        let task = match self.loop_task.take() {
            Some(task) => task,
            None => return Ok(()),
        };

        self.state = SessionState::Stopping;
        self.stop_flag.store(true, Ordering::SeqCst);
        info!("Stopping capture, waiting for the loop to exit");
        self.settle(task).await;

        Ok(())
    }

    /// Current session snapshot. Reaps a finished loop first, so an elapsed
    /// capture duration or a mid-loop failure surfaces on the next poll.
    pub async fn status(&mut self) -> SessionStatus {
        self.reap_finished_loop().await;

        SessionStatus {
            state: self.state,
            interface: self.interface.clone(),
            filter_ip: self.filter_ip,
            buffer_len: self.store.size(),
            last_seq: self.store.last_seq(),
            stats: self.stats.lock().clone(),
            last_error: self.last_error.clone(),
        }
    }

    /// Replace the query-time IP filter; captured history is unaffected.
    pub fn set_filter(&mut self, ip: Option<IpAddr>) {
        self.filter_ip = ip;
    }

    /// Current query-time IP filter.
    pub fn filter_ip(&self) -> Option<IpAddr> {
        self.filter_ip
    }

    /// Shared handle to the record store.
    pub fn store(&self) -> Arc<RingBufferStore> {
        Arc::clone(&self.store)
    }

    /// Interface in use while running.
    pub fn interface_name(&self) -> Option<&str> {
        self.interface.as_deref()
    }

    /// Fold a background loop that exited on its own back into session
    /// state. The loop finishes without a stop request when its duration
    /// elapses or the source fails.
    async fn reap_finished_loop(&mut self) {
        let finished = matches!(&self.loop_task, Some(task) if task.is_finished());
        if finished {
            if let Some(task) = self.loop_task.take() {
                self.settle(task).await;
            }
        }
    }

    /// Await the loop task and transition back to `IDLE`.
    async fn settle(&mut self, task: JoinHandle<LoopExit>) {
        match task.await {
            Ok(LoopExit::Stopped) => info!("Capture loop stopped"),
            Ok(LoopExit::Completed) => info!("Capture duration elapsed"),
            Ok(LoopExit::Interrupted(msg)) => {
                warn!("Capture interrupted: {}", msg);
                self.last_error = Some(AppError::CaptureInterrupted(msg).to_string());
            }
            Err(e) => {
                error!("Capture task failed to join: {}", e);
                self.last_error = Some(format!("capture task failed: {}", e));
            }
        }

        self.stats.lock().end_time = Some(Utc::now());
        self.interface = None;
        self.state = SessionState::Idle;
    }
}

/// The background read/decode/classify/insert loop.
///
/// Cancellation is cooperative at the granularity of one read: the stop flag
/// and the optional deadline are checked every time `read_next` returns, and
/// the read itself is bounded by the source's timeout. The source is dropped,
/// releasing the OS handle, when this function returns.
fn run_capture(
    mut source: Box<dyn CaptureSource>,
    store: Arc<RingBufferStore>,
    stats: Arc<Mutex<CaptureStats>>,
    stop_flag: Arc<AtomicBool>,
    mut writer: Option<CaptureFileWriter>,
    deadline: Option<Instant>,
) -> LoopExit {
    let decoder = FrameDecoder::new();
    let mut consecutive_errors = 0u32;

    let exit = loop {
        if stop_flag.load(Ordering::SeqCst) {
            break LoopExit::Stopped;
        }
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                break LoopExit::Completed;
            }
        }

        let frame = match source.read_next() {
            Ok(Some(frame)) => frame,
            Ok(None) => continue, // read timeout; loop back to the stop check
            Err(e) if source::is_fatal_read_error(&e) => {
                break LoopExit::Interrupted(format!("interface vanished: {}", e));
            }
            Err(e) => {
                consecutive_errors += 1;
                stats.lock().read_errors += 1;
                if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    break LoopExit::Interrupted(format!(
                        "{} consecutive read errors, last: {}",
                        consecutive_errors, e
                    ));
                }
                warn!("Transient capture read error: {}", e);
                continue;
            }
        };
        consecutive_errors = 0;

        let frame_len = frame.len();
        let partial = decoder.decode(&frame);
        let protocol = partial.protocol;
        let decoded_text = classifier::classify(&partial.payload);
        let sequence_id = store.insert(partial, decoded_text, Utc::now());
        stats.lock().record(protocol, frame_len);

        let mut sink_failed = false;
        if let Some(w) = writer.as_mut() {
            if let Some(record) = store.get(sequence_id) {
                if let Err(e) = w.write(&record) {
                    warn!("Capture file write failed, disabling the file sink: {}", e);
                    sink_failed = true;
                }
            }
        }
        if sink_failed {
            writer = None;
        }
    };

    if let Some(w) = writer.as_mut() {
        if let Err(e) = w.flush() {
            warn!("Capture file flush failed: {}", e);
        }
    }

    exit
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;

    /// In-memory source: yields the queued frames, then times out forever
    /// (or fails, when a fatal error is queued behind the frames).
    struct MockSource {
        frames: VecDeque<Vec<u8>>,
        fail_after: Option<i32>,
    }

    impl MockSource {
        fn with_frames(frames: &[&[u8]]) -> Box<Self> {
            Box::new(Self {
                frames: frames.iter().map(|f| f.to_vec()).collect(),
                fail_after: None,
            })
        }

        fn failing(frames: &[&[u8]], raw_os_error: i32) -> Box<Self> {
            Box::new(Self {
                frames: frames.iter().map(|f| f.to_vec()).collect(),
                fail_after: Some(raw_os_error),
            })
        }
    }

    impl CaptureSource for MockSource {
        fn read_next(&mut self) -> io::Result<Option<Vec<u8>>> {
            if let Some(frame) = self.frames.pop_front() {
                return Ok(Some(frame));
            }
            if let Some(code) = self.fail_after {
                return Err(io::Error::from_raw_os_error(code));
            }
            // emulate the channel read timeout
            std::thread::sleep(Duration::from_millis(5));
            Ok(None)
        }

        fn interface_name(&self) -> &str {
            "mock0"
        }
    }

    fn config() -> AppConfig {
        AppConfig {
            interface: None,
            port: 0,
            capacity: 64,
            filter_ip: None,
        }
    }

    async fn wait_for_records(session: &CaptureSession, n: usize) {
        for _ in 0..200 {
            if session.store().size() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("store never reached {} records", n);
    }

    async fn wait_for_idle(session: &mut CaptureSession) -> SessionStatus {
        for _ in 0..200 {
            let status = session.status().await;
            if status.state == SessionState::Idle {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("session never returned to IDLE");
    }

    #[tokio::test]
    async fn records_flow_and_stop_waits_for_the_loop() {
        let mut session = CaptureSession::new(config());
        session
            .start_with_source(
                MockSource::with_frames(&[b"one".as_slice(), b"two", b"three"]),
                StartOptions::default(),
            )
            .unwrap();
        assert_eq!(session.status().await.state, SessionState::Running);

        wait_for_records(&session, 3).await;
        session.stop().await.unwrap();

        let status = session.status().await;
        assert_eq!(status.state, SessionState::Idle);
        assert_eq!(status.interface, None);
        assert_eq!(status.buffer_len, 3);
        assert_eq!(status.stats.total_packets, 3);

        // exactly the records inserted before cancellation, in order
        let records = session.store().query(None, 0, 100);
        let ids: Vec<u64> = records.iter().map(|r| r.sequence_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn second_start_reports_already_running() {
        let mut session = CaptureSession::new(config());
        session
            .start_with_source(MockSource::with_frames(&[]), StartOptions::default())
            .unwrap();

        let err = session
            .start_with_source(MockSource::with_frames(&[]), StartOptions::default())
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyRunning));
        assert_eq!(session.status().await.state, SessionState::Running);

        session.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_on_idle_session_is_a_no_op() {
        let mut session = CaptureSession::new(config());

        session.stop().await.unwrap();
        session.stop().await.unwrap();

        let status = session.status().await;
        assert_eq!(status.state, SessionState::Idle);
        assert_eq!(status.buffer_len, 0);
    }

    #[tokio::test]
    async fn fatal_read_error_surfaces_on_the_next_poll() {
        let mut session = CaptureSession::new(config());
        session
            .start_with_source(
                MockSource::failing(&[b"only".as_slice()], 19), // ENODEV
                StartOptions::default(),
            )
            .unwrap();

        let status = wait_for_idle(&mut session).await;
        assert!(status.last_error.unwrap().contains("capture interrupted"));
        assert_eq!(status.buffer_len, 1);

        // a fresh start is allowed after the failure
        session
            .start_with_source(MockSource::with_frames(&[]), StartOptions::default())
            .unwrap();
        session.stop().await.unwrap();
    }

    #[tokio::test]
    async fn duration_limit_stops_the_capture() {
        let mut session = CaptureSession::new(config());
        session
            .start_with_source(
                MockSource::with_frames(&[]),
                StartOptions {
                    duration_secs: Some(0),
                    ..StartOptions::default()
                },
            )
            .unwrap();

        let status = wait_for_idle(&mut session).await;
        assert!(status.last_error.is_none());
    }

    #[tokio::test]
    async fn capture_file_receives_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.jsonl");

        let mut session = CaptureSession::new(config());
        session
            .start_with_source(
                MockSource::with_frames(&[b"alpha".as_slice(), b"beta"]),
                StartOptions {
                    capture_file: Some(path.clone()),
                    ..StartOptions::default()
                },
            )
            .unwrap();
        wait_for_records(&session, 2).await;
        session.stop().await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        let row: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert_eq!(row["sequence_id"], 1);
    }

    #[tokio::test]
    async fn start_filter_applies_and_can_be_changed() {
        let mut session = CaptureSession::new(config());
        let ip: IpAddr = "10.9.9.9".parse().unwrap();
        session
            .start_with_source(
                MockSource::with_frames(&[]),
                StartOptions {
                    filter_ip: Some(ip),
                    ..StartOptions::default()
                },
            )
            .unwrap();
        assert_eq!(session.filter_ip(), Some(ip));

        session.set_filter(None);
        assert_eq!(session.filter_ip(), None);

        session.stop().await.unwrap();
    }
}
