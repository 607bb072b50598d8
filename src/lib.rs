//! Gifsync synchronizes a looping animated GIF with an audio clip into an
//! encoded MP4.
//!
//! The pipeline has three legs that meet in the transcode orchestrator:
//!
//! - Decode raw GIF bytes into a [`FrameStore`] and preview it with a
//!   [`CompositingPlayer`] at a user-chosen rate.
//! - Decode the audio clip, render a [`WaveformEnvelope`], and pick a time
//!   range with a [`BracketSelector`].
//! - Submit a [`TranscodeRequest`]; the job retimes the looped image
//!   stream against the trimmed audio, runs the system `ffmpeg`, surfaces
//!   typed [`ProgressState`] snapshots parsed from its log, and yields the
//!   encoded bytes.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

pub mod audio;
pub mod bracket;
pub mod gif;
pub mod player;
pub mod transcode;

pub use crate::foundation::error::{DecodeError, SyncError, SyncResult};
pub use crate::foundation::time::{format_mm_ss, hmsc_to_secs, parse_mm_ss};

pub use crate::audio::{
    ANALYSIS_SAMPLE_RATE, AudioInfo, AudioPcm, WaveformAnalyzer, WaveformEnvelope, analyze,
    decode_audio_pcm, probe_audio,
};
pub use crate::bracket::{
    BracketEdge, BracketSelection, BracketSelector, MIN_SPAN_SECS, ViewLayout,
};
pub use crate::gif::{Disposal, Frame, FrameRect, FrameStore};
pub use crate::player::{CanvasBuffer, CompositingPlayer, MAX_FPS, MIN_FPS, PlayerState};
pub use crate::transcode::{
    FILTER_GRAPH_FPS, GenerationParams, Job, ParamsPatch, ParamsStore, ProgressParser,
    ProgressState, ProgressStatus, TranscodeOpts, TranscodeOrchestrator, TranscodeRequest,
    build_transcode_args, is_engine_on_path, speed_factor,
};
