//! Audio decode front-end and waveform analysis.
//!
//! Decoding shells out to the system `ffmpeg`/`ffprobe` (any format the
//! engine supports); analysis turns decoded PCM into a peak-normalized
//! per-pixel-column envelope for waveform rendering.

mod decode;
mod waveform;

pub use decode::{ANALYSIS_SAMPLE_RATE, AudioInfo, AudioPcm, decode_audio_pcm, probe_audio};
pub use waveform::{WaveformAnalyzer, WaveformEnvelope, analyze};
