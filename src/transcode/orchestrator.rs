//! Transcode job orchestration: spawn the engine, stream its log into the
//! progress parser, and hand back the encoded blob.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use crate::foundation::error::{SyncError, SyncResult};

use super::command::build_transcode_args;
use super::params::GenerationParams;
use super::progress::{ProgressParser, ProgressState};

/// Options controlling engine invocation.
#[derive(Clone, Debug)]
pub struct TranscodeOpts {
    /// Engine binary to invoke.
    pub ffmpeg_path: PathBuf,
}

impl Default for TranscodeOpts {
    fn default() -> Self {
        Self { ffmpeg_path: PathBuf::from("ffmpeg") }
    }
}

/// Everything one job needs, captured by value at submission time. Later
/// parameter edits do not affect a job already submitted.
#[derive(Clone, Debug)]
pub struct TranscodeRequest {
    /// Raw GIF bytes; written to the job's scratch directory.
    pub gif_bytes: Vec<u8>,
    /// Parameter snapshot (trim range, speed, audio resource).
    pub params: GenerationParams,
    /// The GIF's nominal frame period in milliseconds.
    pub base_frame_delay_ms: f64,
    /// Expected output duration seeded into the progress parser. When
    /// `None`, the total is learned from the engine's log.
    pub total_time_hint: Option<f64>,
}

/// Coordinates job submission; at most one job is active at a time.
///
/// Submitting while a job is still running is rejected with a
/// [`SyncError::Concurrency`]; the caller re-submits after the active job
/// settles. Jobs are never queued or retried automatically.
#[derive(Default)]
pub struct TranscodeOrchestrator {
    opts: TranscodeOpts,
    active: Option<Arc<AtomicBool>>,
}

impl TranscodeOrchestrator {
    /// Orchestrator invoking the engine from `PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Orchestrator with explicit engine options.
    pub fn with_opts(opts: TranscodeOpts) -> Self {
        Self { opts, active: None }
    }

    /// Validate inputs and start a transcode job.
    ///
    /// Fails fast without spawning anything: missing inputs
    /// ([`SyncError::Resource`]), unusable timing
    /// ([`SyncError::Validation`]), an unfinished active job
    /// ([`SyncError::Concurrency`]), or an unavailable engine
    /// ([`SyncError::Engine`]).
    pub fn submit(&mut self, request: TranscodeRequest) -> SyncResult<Job> {
        if let Some(finished) = &self.active
            && !finished.load(Ordering::SeqCst)
        {
            return Err(SyncError::concurrency(
                "a transcode job is already running; re-submit after it settles",
            ));
        }

        if request.gif_bytes.is_empty() {
            return Err(SyncError::resource("no gif input provided"));
        }
        let Some(audio_path) = request.params.audio.clone() else {
            return Err(SyncError::resource("no audio input provided"));
        };
        if !audio_path.exists() {
            return Err(SyncError::resource(format!(
                "audio file '{}' does not exist",
                audio_path.display()
            )));
        }
        if !is_engine_on_path(&self.opts.ffmpeg_path) {
            return Err(SyncError::engine(format!(
                "'{}' is required for encoding, but was not found on PATH",
                self.opts.ffmpeg_path.display()
            )));
        }

        let scratch = tempfile::TempDir::new().map_err(|e| {
            SyncError::engine(format!("failed to create scratch directory: {e}"))
        })?;
        let gif_path = scratch.path().join("input.gif");
        std::fs::write(&gif_path, &request.gif_bytes)
            .map_err(|e| SyncError::resource(format!("failed to stage gif input: {e}")))?;
        let out_path = scratch.path().join("output.mp4");

        let args = build_transcode_args(
            &gif_path,
            &audio_path,
            &out_path,
            &request.params,
            request.base_frame_delay_ms,
        )?;

        let mut parser = ProgressParser::new();
        parser.initialize(request.total_time_hint.unwrap_or(0.0));

        let subscribers: Arc<Mutex<Vec<Sender<ProgressState>>>> = Arc::default();
        let child_slot: Arc<Mutex<Option<Child>>> = Arc::default();
        let cancelled = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));

        let worker = JobWorker {
            ffmpeg_path: self.opts.ffmpeg_path.clone(),
            args: args.clone(),
            out_path,
            _scratch: scratch,
            parser,
            subscribers: Arc::clone(&subscribers),
            child_slot: Arc::clone(&child_slot),
            cancelled: Arc::clone(&cancelled),
            finished: Arc::clone(&finished),
        };
        let handle = std::thread::spawn(move || worker.run());

        self.active = Some(Arc::clone(&finished));
        Ok(Job {
            command: args,
            handle: Some(handle),
            subscribers,
            child_slot,
            cancelled,
            finished,
        })
    }

    /// True while the most recently submitted job is still running.
    pub fn is_busy(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|finished| !finished.load(Ordering::SeqCst))
    }
}

/// Handle to one running transcode job.
pub struct Job {
    command: Vec<String>,
    handle: Option<JoinHandle<SyncResult<Vec<u8>>>>,
    subscribers: Arc<Mutex<Vec<Sender<ProgressState>>>>,
    child_slot: Arc<Mutex<Option<Child>>>,
    cancelled: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

impl Job {
    /// The exact ordered argument list handed to the engine.
    pub fn command(&self) -> &[String] {
        &self.command
    }

    /// Subscribe to progress snapshots; at least one update arrives per
    /// recognized log line that changes state.
    pub fn subscribe(&self) -> Receiver<ProgressState> {
        let (tx, rx) = channel();
        lock(&self.subscribers).push(tx);
        rx
    }

    /// True once the job has settled (success, failure, or cancellation).
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Kill the engine and stop log consumption. Idempotent; safe to call
    /// at any point, including after the job settled.
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!("cancelling transcode job");
        if let Some(child) = lock(&self.child_slot).as_mut() {
            let _ = child.kill();
        }
    }

    /// Block until the job settles and yield the encoded MP4 bytes.
    pub fn wait(mut self) -> SyncResult<Vec<u8>> {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| SyncError::engine("job already waited on"))?;
        handle
            .join()
            .map_err(|_| SyncError::engine("transcode job thread panicked"))?
    }
}

struct JobWorker {
    ffmpeg_path: PathBuf,
    args: Vec<String>,
    out_path: PathBuf,
    /// Keeps the staged gif and output file alive until the job settles.
    _scratch: tempfile::TempDir,
    parser: ProgressParser,
    subscribers: Arc<Mutex<Vec<Sender<ProgressState>>>>,
    child_slot: Arc<Mutex<Option<Child>>>,
    cancelled: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

impl JobWorker {
    fn run(mut self) -> SyncResult<Vec<u8>> {
        let result = self.transcode();
        self.finished.store(true, Ordering::SeqCst);
        if let Err(err) = &result {
            tracing::warn!(%err, "transcode job failed");
        }
        result
    }

    fn transcode(&mut self) -> SyncResult<Vec<u8>> {
        tracing::info!(command = ?self.args, "spawning transcode engine");
        let mut child = Command::new(&self.ffmpeg_path)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SyncError::engine(format!("failed to spawn transcode engine: {e}")))?;

        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| SyncError::engine("failed to open engine stderr"))?;
        *lock(&self.child_slot) = Some(child);
        // A cancel that raced the spawn has no child to kill; close that
        // window now that the handle is visible.
        if self.cancelled.load(Ordering::SeqCst)
            && let Some(child) = lock(&self.child_slot).as_mut()
        {
            let _ = child.kill();
        }

        // The engine's progress lines are `\r`-terminated; read raw chunks
        // and let the parser handle framing. The last 16 KiB of the log are
        // kept for failure messages.
        let mut log_tail: Vec<u8> = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            if self.cancelled.load(Ordering::SeqCst) {
                break;
            }
            let n = match stderr.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    return Err(SyncError::engine(format!("failed to read engine log: {e}")));
                }
            };
            log_tail.extend_from_slice(&buf[..n]);
            if log_tail.len() > 16 * 1024 {
                let cut = log_tail.len() - 16 * 1024;
                log_tail.drain(..cut);
            }
            let text = String::from_utf8_lossy(&buf[..n]);
            for snapshot in self.parser.push_chunk(&text) {
                self.broadcast(snapshot);
            }
        }
        if let Some(snapshot) = self.parser.finish() {
            self.broadcast(snapshot);
        }

        let status = {
            let mut slot = lock(&self.child_slot);
            let Some(child) = slot.as_mut() else {
                return Err(SyncError::engine("engine process handle lost"));
            };
            let status = child
                .wait()
                .map_err(|e| SyncError::engine(format!("failed to wait for engine: {e}")))?;
            *slot = None;
            status
        };

        if self.cancelled.load(Ordering::SeqCst) {
            return Err(SyncError::engine("transcode job cancelled"));
        }
        if !status.success() {
            return Err(SyncError::engine(format!(
                "engine exited with status {status}: {}",
                String::from_utf8_lossy(&log_tail).trim()
            )));
        }

        let bytes = std::fs::read(&self.out_path)
            .map_err(|e| SyncError::engine(format!("engine produced no output: {e}")))?;
        tracing::info!(bytes = bytes.len(), "transcode complete");
        Ok(bytes)
    }

    fn broadcast(&self, snapshot: ProgressState) {
        lock(&self.subscribers).retain(|tx| tx.send(snapshot.clone()).is_ok());
    }
}

/// Return `true` when the engine binary can be invoked.
pub fn is_engine_on_path(ffmpeg_path: &std::path::Path) -> bool {
    Command::new(ffmpeg_path)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Locking helper: a poisoned job mutex still guards valid state.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_audio(audio: PathBuf) -> TranscodeRequest {
        TranscodeRequest {
            gif_bytes: vec![0x47],
            params: GenerationParams {
                start_sec: 0.0,
                end_sec: 2.0,
                gif_speed_fps: 20.0,
                audio: Some(audio),
            },
            base_frame_delay_ms: 100.0,
            total_time_hint: None,
        }
    }

    #[test]
    fn missing_inputs_fail_fast() {
        let mut orchestrator = TranscodeOrchestrator::new();

        let mut no_gif = request_with_audio(PathBuf::from("/tmp/whatever.mp3"));
        no_gif.gif_bytes.clear();
        assert!(matches!(orchestrator.submit(no_gif), Err(SyncError::Resource(_))));

        let mut no_audio = request_with_audio(PathBuf::from("/tmp/whatever.mp3"));
        no_audio.params.audio = None;
        assert!(matches!(orchestrator.submit(no_audio), Err(SyncError::Resource(_))));

        let ghost = request_with_audio(PathBuf::from("/nonexistent/audio.mp3"));
        assert!(matches!(orchestrator.submit(ghost), Err(SyncError::Resource(_))));
    }

    #[test]
    fn orchestrator_starts_idle() {
        let orchestrator = TranscodeOrchestrator::new();
        assert!(!orchestrator.is_busy());
    }
}
