//! Peak-normalized waveform envelopes for rendering.
//!
//! [`analyze`] is the bulk computation; [`WaveformAnalyzer`] runs it on a
//! worker thread with latest-request coalescing so rapid resizes never
//! queue overlapping full recomputations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use rayon::prelude::*;

/// Substituted for the global peak of an all-zero signal to avoid dividing
/// by zero.
const SILENCE_EPSILON: f32 = 1e-6;

/// Per-pixel-column (min, max) amplitude summary of an audio signal, each
/// value in [-1, 1], normalized against the loudest sample in the source.
#[derive(Clone, Debug, PartialEq)]
pub struct WaveformEnvelope {
    columns: Vec<(f32, f32)>,
}

impl WaveformEnvelope {
    /// Number of columns (the requested target width).
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// True when the envelope has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// All (min, max) pairs in column order.
    pub fn columns(&self) -> &[(f32, f32)] {
        &self.columns
    }

    /// One column's (min, max) pair.
    pub fn column(&self, index: usize) -> Option<(f32, f32)> {
        self.columns.get(index).copied()
    }
}

/// Compute a peak-normalized envelope over `samples` at `target_width_px`
/// columns.
///
/// Each column summarizes a contiguous window of
/// `ceil(samples.len() / target_width_px)` samples; windows past the end of
/// the signal produce a flat `(0, 0)` column. Full recomputation, O(n).
pub fn analyze(samples: &[f32], target_width_px: usize) -> WaveformEnvelope {
    if target_width_px == 0 || samples.is_empty() {
        return WaveformEnvelope { columns: Vec::new() };
    }

    let global_max = samples
        .par_iter()
        .map(|s| s.abs())
        .reduce(|| 0.0f32, f32::max);
    let global_max = if global_max == 0.0 { SILENCE_EPSILON } else { global_max };

    let window = samples.len().div_ceil(target_width_px);
    let columns = (0..target_width_px)
        .into_par_iter()
        .map(|col| {
            let start = col * window;
            if start >= samples.len() {
                return (0.0, 0.0);
            }
            let end = (start + window).min(samples.len());
            let mut min = 1.0f32;
            let mut max = -1.0f32;
            for &s in &samples[start..end] {
                let datum = s / global_max;
                if datum < min {
                    min = datum;
                }
                if datum > max {
                    max = datum;
                }
            }
            (min.clamp(-1.0, 1.0), max.clamp(-1.0, 1.0))
        })
        .collect();

    WaveformEnvelope { columns }
}

struct AnalysisRequest {
    samples: Arc<Vec<f32>>,
    target_width_px: usize,
    generation: u64,
}

#[derive(Default)]
struct Slot {
    pending: Mutex<SlotState>,
    ready: Condvar,
}

#[derive(Default)]
struct SlotState {
    request: Option<AnalysisRequest>,
    shutdown: bool,
}

/// Off-thread waveform analysis with latest-request coalescing.
///
/// `request` replaces any pending request; an in-flight computation whose
/// result is superseded by a newer request is dropped, never published.
/// Only the most recently requested width is ever honored.
pub struct WaveformAnalyzer {
    slot: Arc<Slot>,
    results: Receiver<WaveformEnvelope>,
    generation: AtomicU64,
    worker: Option<JoinHandle<()>>,
}

impl WaveformAnalyzer {
    /// Spawn the analysis worker.
    pub fn new() -> Self {
        let slot = Arc::new(Slot::default());
        let (tx, rx) = channel();
        let worker_slot = Arc::clone(&slot);
        let worker = std::thread::spawn(move || worker_loop(worker_slot, tx));
        Self {
            slot,
            results: rx,
            generation: AtomicU64::new(0),
            worker: Some(worker),
        }
    }

    /// Request an envelope for `samples` at `target_width_px` columns,
    /// superseding any request not yet completed.
    pub fn request(&self, samples: Arc<Vec<f32>>, target_width_px: usize) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let mut state = lock(&self.slot.pending);
        if state.request.is_some() {
            tracing::debug!(target_width_px, "superseding pending waveform request");
        }
        state.request = Some(AnalysisRequest {
            samples,
            target_width_px,
            generation,
        });
        drop(state);
        self.slot.ready.notify_one();
    }

    /// Drain completed envelopes, returning the newest one if any arrived
    /// since the last call.
    pub fn try_latest(&self) -> Option<WaveformEnvelope> {
        let mut latest = None;
        while let Ok(envelope) = self.results.try_recv() {
            latest = Some(envelope);
        }
        latest
    }

    /// Block until the next envelope arrives (newest if several queued).
    /// Returns `None` once the worker has shut down.
    pub fn recv_latest(&self) -> Option<WaveformEnvelope> {
        let mut latest = self.results.recv().ok()?;
        while let Ok(envelope) = self.results.try_recv() {
            latest = envelope;
        }
        Some(latest)
    }
}

impl Default for WaveformAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WaveformAnalyzer {
    fn drop(&mut self) {
        lock(&self.slot.pending).shutdown = true;
        self.slot.ready.notify_one();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn worker_loop(slot: Arc<Slot>, results: Sender<WaveformEnvelope>) {
    loop {
        let request = {
            let mut state = lock(&slot.pending);
            loop {
                if state.shutdown {
                    return;
                }
                if let Some(request) = state.request.take() {
                    break request;
                }
                state = match slot.ready.wait(state) {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
            }
        };

        let envelope = analyze(&request.samples, request.target_width_px);

        // A newer request arrived while computing: drop this result.
        let state = lock(&slot.pending);
        let superseded = state
            .request
            .as_ref()
            .is_some_and(|next| next.generation > request.generation);
        drop(state);
        if superseded {
            tracing::debug!(
                target_width_px = request.target_width_px,
                "dropping superseded waveform envelope"
            );
            continue;
        }
        if results.send(envelope).is_err() {
            return;
        }
    }
}

/// Locking helper: a poisoned analysis mutex still guards valid state.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
