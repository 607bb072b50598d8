//! Start/end time selection over an audio waveform.
//!
//! [`BracketSelector`] maintains a `[start, end]` range with a minimum-span
//! invariant that is clamped on every mutation, never merely validated
//! afterwards. [`ViewLayout`] owns the pixel-to-time mapping so dragging
//! and drawing share one geometry.

use crate::foundation::error::{SyncError, SyncResult};
use crate::foundation::time::{format_mm_ss, parse_mm_ss};

/// Minimum selectable span in seconds (capped at the clip duration for
/// clips shorter than this).
pub const MIN_SPAN_SECS: f64 = 1.0;

/// A start/end marker pair over the audio duration.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BracketSelection {
    /// Selection start in seconds.
    pub start_sec: f64,
    /// Selection end in seconds.
    pub end_sec: f64,
}

impl BracketSelection {
    /// Selected span in seconds.
    pub fn span_sec(&self) -> f64 {
        self.end_sec - self.start_sec
    }
}

/// Which bracket edge an operation targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BracketEdge {
    /// The start (left) marker.
    Start,
    /// The end (right) marker.
    End,
}

/// Horizontal geometry for mapping pixel positions to times.
///
/// A symmetric padding margin is applied at both edges before the linear
/// map; edge hit-testing uses a fixed pixel tolerance independent of
/// width.
#[derive(Clone, Copy, Debug)]
pub struct ViewLayout {
    /// Total widget width in pixels.
    pub width_px: f64,
    /// Padding on each side of the waveform.
    pub padding_px: f64,
    /// Hit-test tolerance around a bracket edge.
    pub handle_tolerance_px: f64,
}

impl ViewLayout {
    /// Layout for a widget of `width_px` with the default padding (20 px)
    /// and handle tolerance (10 px).
    pub fn new(width_px: f64) -> Self {
        Self {
            width_px,
            padding_px: 20.0,
            handle_tolerance_px: 10.0,
        }
    }

    fn draw_width(&self) -> f64 {
        (self.width_px - self.padding_px * 2.0).max(1.0)
    }

    /// Pixel x of a time, given the clip duration.
    pub fn x_at_time(&self, time_sec: f64, duration_sec: f64) -> f64 {
        if duration_sec <= 0.0 {
            return self.padding_px;
        }
        self.padding_px + (time_sec / duration_sec) * self.draw_width()
    }

    /// Time at a pixel x, clamped into `[0, duration]`.
    pub fn time_at_x(&self, x: f64, duration_sec: f64) -> f64 {
        let normalized = ((x - self.padding_px) / self.draw_width()).clamp(0.0, 1.0);
        normalized * duration_sec.max(0.0)
    }

    /// Which edge handle, if any, the cursor at `x` is over. The start
    /// handle wins when both are in range.
    pub fn hit_test(&self, x: f64, selection: BracketSelection, duration_sec: f64) -> Option<BracketEdge> {
        if (x - self.x_at_time(selection.start_sec, duration_sec)).abs() < self.handle_tolerance_px {
            return Some(BracketEdge::Start);
        }
        if (x - self.x_at_time(selection.end_sec, duration_sec)).abs() < self.handle_tolerance_px {
            return Some(BracketEdge::End);
        }
        None
    }
}

impl Default for ViewLayout {
    fn default() -> Self {
        Self::new(800.0)
    }
}

type SelectionListener = Box<dyn FnMut(BracketSelection) + Send>;

/// Maintains the bracket selection and pushes every successful mutation to
/// registered listeners. The selector has no knowledge of its consumers.
pub struct BracketSelector {
    duration_sec: f64,
    selection: BracketSelection,
    listeners: Vec<SelectionListener>,
}

impl BracketSelector {
    /// Selector with no duration known yet; mutations are rejected until
    /// [`reset_to_full_range`](Self::reset_to_full_range) is called.
    pub fn new() -> Self {
        Self {
            duration_sec: 0.0,
            selection: BracketSelection { start_sec: 0.0, end_sec: 0.0 },
            listeners: Vec::new(),
        }
    }

    /// Initialize (or re-initialize) to the full `[0, duration]` range,
    /// e.g. when a new audio source's duration becomes known.
    pub fn reset_to_full_range(&mut self, duration_sec: f64) -> SyncResult<BracketSelection> {
        if !duration_sec.is_finite() || duration_sec <= 0.0 {
            return Err(SyncError::validation("audio duration must be positive"));
        }
        self.duration_sec = duration_sec;
        self.selection = BracketSelection { start_sec: 0.0, end_sec: duration_sec };
        self.notify();
        Ok(self.selection)
    }

    /// The effective span floor; never larger than the clip itself.
    fn min_span(&self) -> f64 {
        MIN_SPAN_SECS.min(self.duration_sec)
    }

    /// Move the start marker, clamped so the invariant holds: a start that
    /// would violate the span against the current end lands on
    /// `end - MIN_SPAN` instead of being rejected.
    pub fn set_start(&mut self, time_sec: f64) -> SyncResult<BracketSelection> {
        self.ensure_ready(time_sec)?;
        let limit = (self.selection.end_sec - self.min_span()).max(0.0);
        self.selection.start_sec = time_sec.clamp(0.0, limit);
        self.notify();
        Ok(self.selection)
    }

    /// Move the end marker, clamped symmetrically to `set_start`.
    pub fn set_end(&mut self, time_sec: f64) -> SyncResult<BracketSelection> {
        self.ensure_ready(time_sec)?;
        let limit = (self.selection.start_sec + self.min_span()).min(self.duration_sec);
        self.selection.end_sec = time_sec.clamp(limit, self.duration_sec);
        self.notify();
        Ok(self.selection)
    }

    /// Drag one edge to a normalized [0, 1] horizontal position.
    pub fn drag_to(&mut self, normalized_x: f64, edge: BracketEdge) -> SyncResult<BracketSelection> {
        self.ensure_ready(normalized_x)?;
        let time_sec = normalized_x.clamp(0.0, 1.0) * self.duration_sec;
        match edge {
            BracketEdge::Start => self.set_start(time_sec),
            BracketEdge::End => self.set_end(time_sec),
        }
    }

    /// Set the start from typed `MM:SS` input. Malformed input is rejected
    /// with no state mutation.
    pub fn set_start_text(&mut self, text: &str) -> SyncResult<BracketSelection> {
        let time_sec = parse_mm_ss(text)
            .ok_or_else(|| SyncError::validation(format!("invalid time '{text}' (want MM:SS)")))?;
        self.set_start(time_sec)
    }

    /// Set the end from typed `MM:SS` input. Malformed input is rejected
    /// with no state mutation.
    pub fn set_end_text(&mut self, text: &str) -> SyncResult<BracketSelection> {
        let time_sec = parse_mm_ss(text)
            .ok_or_else(|| SyncError::validation(format!("invalid time '{text}' (want MM:SS)")))?;
        self.set_end(time_sec)
    }

    /// Register a listener invoked with a selection snapshot after every
    /// successful mutation.
    pub fn subscribe(&mut self, listener: impl FnMut(BracketSelection) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Current selection snapshot.
    pub fn selection(&self) -> BracketSelection {
        self.selection
    }

    /// Known audio duration (0 before initialization).
    pub fn duration_sec(&self) -> f64 {
        self.duration_sec
    }

    /// The selected span as `MM:SS`.
    pub fn timespan(&self) -> String {
        format_mm_ss(self.selection.span_sec())
    }

    fn ensure_ready(&self, input: f64) -> SyncResult<()> {
        if self.duration_sec <= 0.0 {
            return Err(SyncError::validation("no audio duration set"));
        }
        if !input.is_finite() {
            return Err(SyncError::validation("time input must be finite"));
        }
        Ok(())
    }

    fn notify(&mut self) {
        let snapshot = self.selection;
        for listener in &mut self.listeners {
            listener(snapshot);
        }
    }
}

impl Default for BracketSelector {
    fn default() -> Self {
        Self::new()
    }
}
