//! Typed progress over the transcoder's free-text log stream.
//!
//! Raw lines are converted into narrow [`LogEvent`]s at the parse boundary;
//! the state machine only ever sees typed events, keeping it independent of
//! the engine's log format.

use std::sync::LazyLock;

use regex::Regex;

use crate::foundation::time::hmsc_to_secs;

/// Marker token the engine prints on its final summary line.
const COMPLETION_MARKER: &str = "Lsize=";
/// Marker tokens for failed or aborted runs.
const ERROR_MARKERS: [&str; 2] = ["Error", "Aborted"];

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Duration:\s+(\d{2}):(\d{2}):(\d{2})\.(\d{2})").expect("duration pattern")
});

static PROGRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"frame=\s*(\d+)\s+fps=\s*([\d.]+)\s+q=([\d.-]+)\s+size=\s*(\d+)kB\s+time=(\d{2}):(\d{2}):(\d{2})\.(\d{2})\s+bitrate=\s*([\d.N/A]+)kbits/s(?:\s+dup=\d+\s+drop=\d+)?\s+speed=\s*([\d.]+)x",
    )
    .expect("progress pattern")
});

/// Transcode lifecycle status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    /// No progress information seen yet.
    #[default]
    Initializing,
    /// The engine is producing output.
    Processing,
    /// The engine printed its completion summary. Terminal.
    Completed,
    /// The engine reported an error or abort. Terminal.
    Error,
}

/// Snapshot of transcode progress, updated as log lines arrive.
///
/// Exactly one writer (the job's log thread); observers receive pushed
/// copies.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProgressState {
    /// Lifecycle status.
    pub status: ProgressStatus,
    /// Percent complete in [0, 100]; non-decreasing while Processing.
    pub percent: f64,
    /// Output timestamp the engine has reached, in seconds.
    pub current_time_sec: f64,
    /// Expected total output duration in seconds (0 when unknown).
    pub total_time_sec: f64,
    /// Engine processing speed multiplier.
    pub speed: f64,
    /// Encoded frames per second.
    pub fps: f64,
    /// Encoded frame count.
    pub frame: u64,
    /// Output bitrate in kbit/s (0 when the engine reports "N/A").
    pub bitrate_kbps: f64,
    /// Output size so far in kB.
    pub size_kb: f64,
    /// Raw engine line that triggered the Error status.
    pub error: Option<String>,
}

/// Typed event produced at the parse boundary.
#[derive(Clone, Debug, PartialEq)]
enum LogEvent {
    Duration(f64),
    Progress {
        frame: u64,
        fps: f64,
        size_kb: f64,
        time_sec: f64,
        bitrate_kbps: f64,
        speed: f64,
    },
    Completed,
    Errored(String),
}

/// Stateful line machine over the transcoder's log output.
///
/// Tolerates arbitrary chunking through [`push_chunk`](Self::push_chunk);
/// terminal states ignore further lines until [`reset`](Self::reset).
#[derive(Debug, Default)]
pub struct ProgressParser {
    state: ProgressState,
    duration_matches: u32,
    line_buf: String,
}

impl ProgressParser {
    /// Parser in the Initializing state with zeroed metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset and seed the expected total duration (e.g. the trimmed audio
    /// span). A caller-set total takes precedence over durations found in
    /// the log.
    pub fn initialize(&mut self, total_time_sec: f64) {
        self.reset();
        if total_time_sec.is_finite() && total_time_sec > 0.0 {
            self.state.total_time_sec = total_time_sec;
        }
    }

    /// Clear all counters and metrics and return to Initializing.
    pub fn reset(&mut self) {
        self.state = ProgressState::default();
        self.duration_matches = 0;
        self.line_buf.clear();
    }

    /// Current progress snapshot.
    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    /// Feed an arbitrarily-chunked piece of the log stream. Complete lines
    /// (`\n` or `\r` terminated) are processed; a trailing partial line is
    /// buffered until its terminator arrives. Returns a snapshot per line
    /// that changed the state.
    pub fn push_chunk(&mut self, chunk: &str) -> Vec<ProgressState> {
        let mut snapshots = Vec::new();
        for ch in chunk.chars() {
            if ch == '\n' || ch == '\r' {
                if !self.line_buf.is_empty() {
                    let line = std::mem::take(&mut self.line_buf);
                    if let Some(snapshot) = self.push_line(&line) {
                        snapshots.push(snapshot);
                    }
                }
            } else {
                self.line_buf.push(ch);
            }
        }
        snapshots
    }

    /// Process any buffered partial line (call at end of stream).
    pub fn finish(&mut self) -> Option<ProgressState> {
        if self.line_buf.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.line_buf);
        self.push_line(&line)
    }

    /// Feed one whole log line. Returns a snapshot when the line changed
    /// the state.
    pub fn push_line(&mut self, line: &str) -> Option<ProgressState> {
        let mut changed = false;
        for event in self.classify(line) {
            changed |= self.apply(event);
        }
        changed.then(|| self.state.clone())
    }

    /// Parse boundary: extract every event a line carries, in the order
    /// the state machine should see them.
    fn classify(&mut self, line: &str) -> Vec<LogEvent> {
        let mut events = Vec::new();

        if let Some(caps) = DURATION_RE.captures(line) {
            // Count every occurrence; `apply` honors only the second.
            self.duration_matches += 1;
            events.push(LogEvent::Duration(hmsc_to_secs(
                parse_u32(&caps[1]),
                parse_u32(&caps[2]),
                parse_u32(&caps[3]),
                parse_u32(&caps[4]),
            )));
        }

        if let Some(caps) = PROGRESS_RE.captures(line) {
            let bitrate = &caps[9];
            events.push(LogEvent::Progress {
                frame: caps[1].parse().unwrap_or(0),
                fps: caps[2].parse().unwrap_or(0.0),
                size_kb: caps[4].parse().unwrap_or(0.0),
                time_sec: hmsc_to_secs(
                    parse_u32(&caps[5]),
                    parse_u32(&caps[6]),
                    parse_u32(&caps[7]),
                    parse_u32(&caps[8]),
                ),
                bitrate_kbps: if bitrate == "N/A" { 0.0 } else { bitrate.parse().unwrap_or(0.0) },
                speed: caps[10].parse().unwrap_or(0.0),
            });
        }

        if line.contains(COMPLETION_MARKER) {
            events.push(LogEvent::Completed);
        }
        if ERROR_MARKERS.iter().any(|marker| line.contains(marker)) {
            events.push(LogEvent::Errored(line.to_owned()));
        }

        events
    }

    fn apply(&mut self, event: LogEvent) -> bool {
        if matches!(self.state.status, ProgressStatus::Completed | ProgressStatus::Error) {
            return false;
        }

        match event {
            LogEvent::Duration(total_sec) => {
                // The engine prints the looped image input's duration
                // first; the second match is the audio input, which is the
                // authoritative one. A caller-seeded total wins over both.
                if self.duration_matches == 2 && self.state.total_time_sec == 0.0 {
                    self.state.total_time_sec = total_sec;
                    return true;
                }
                false
            }
            LogEvent::Progress { frame, fps, size_kb, time_sec, bitrate_kbps, speed } => {
                self.state.status = ProgressStatus::Processing;
                self.state.frame = frame;
                self.state.fps = fps;
                self.state.size_kb = size_kb;
                self.state.current_time_sec = time_sec;
                self.state.bitrate_kbps = bitrate_kbps;
                self.state.speed = speed;
                if self.state.total_time_sec > 0.0 {
                    let percent = (100.0 * time_sec / self.state.total_time_sec).min(100.0);
                    self.state.percent = self.state.percent.max(percent);
                }
                true
            }
            LogEvent::Completed => {
                self.state.status = ProgressStatus::Completed;
                self.state.percent = 100.0;
                tracing::debug!("transcode log reported completion");
                true
            }
            LogEvent::Errored(line) => {
                self.state.status = ProgressStatus::Error;
                self.state.error = Some(line);
                tracing::warn!(error = ?self.state.error, "transcode log reported an error");
                true
            }
        }
    }
}

fn parse_u32(digits: &str) -> u32 {
    digits.parse().unwrap_or(0)
}
