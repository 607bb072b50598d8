//! Generation parameters merged from the bracket selection and the speed
//! control.
//!
//! Both producers write through [`ParamsStore::apply`], which patches over
//! the current snapshot so neither can clobber the other's last write.

use std::path::PathBuf;

use crate::bracket::BracketSelection;

/// Snapshot of everything a transcode derives its command from.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GenerationParams {
    /// Audio trim start in seconds.
    pub start_sec: f64,
    /// Audio trim end in seconds.
    pub end_sec: f64,
    /// User-chosen GIF playback rate in frames per second.
    pub gif_speed_fps: f64,
    /// Audio resource the job reads from.
    pub audio: Option<PathBuf>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            start_sec: 0.0,
            end_sec: 0.0,
            gif_speed_fps: 30.0,
            audio: None,
        }
    }
}

impl GenerationParams {
    /// Trimmed audio span in seconds.
    pub fn span_sec(&self) -> f64 {
        self.end_sec - self.start_sec
    }
}

/// A partial update; unset fields preserve the current snapshot's values.
#[derive(Clone, Debug, Default)]
pub struct ParamsPatch {
    /// New trim start, if changing.
    pub start_sec: Option<f64>,
    /// New trim end, if changing.
    pub end_sec: Option<f64>,
    /// New playback rate, if changing.
    pub gif_speed_fps: Option<f64>,
    /// New audio resource, if changing.
    pub audio: Option<PathBuf>,
}

impl ParamsPatch {
    /// Patch carrying only a playback rate change.
    pub fn speed(gif_speed_fps: f64) -> Self {
        Self { gif_speed_fps: Some(gif_speed_fps), ..Self::default() }
    }

    /// Patch carrying only a trim range change.
    pub fn range(start_sec: f64, end_sec: f64) -> Self {
        Self {
            start_sec: Some(start_sec),
            end_sec: Some(end_sec),
            ..Self::default()
        }
    }

    /// Patch carrying a bracket selection.
    pub fn selection(selection: BracketSelection) -> Self {
        Self::range(selection.start_sec, selection.end_sec)
    }

    /// Patch carrying only an audio resource change.
    pub fn audio(path: impl Into<PathBuf>) -> Self {
        Self { audio: Some(path.into()), ..Self::default() }
    }
}

/// Holds the current [`GenerationParams`] snapshot.
#[derive(Clone, Debug, Default)]
pub struct ParamsStore {
    current: GenerationParams,
}

impl ParamsStore {
    /// Store with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a patch over the current snapshot (last writer wins per
    /// field) and return the merged result.
    pub fn apply(&mut self, patch: ParamsPatch) -> GenerationParams {
        if let Some(start_sec) = patch.start_sec {
            self.current.start_sec = start_sec;
        }
        if let Some(end_sec) = patch.end_sec {
            self.current.end_sec = end_sec;
        }
        if let Some(gif_speed_fps) = patch.gif_speed_fps {
            self.current.gif_speed_fps = gif_speed_fps;
        }
        if let Some(audio) = patch.audio {
            self.current.audio = Some(audio);
        }
        self.current.clone()
    }

    /// Current snapshot, by value.
    pub fn current(&self) -> GenerationParams {
        self.current.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patches_preserve_unspecified_fields() {
        let mut store = ParamsStore::new();
        store.apply(ParamsPatch::range(1.0, 9.0));
        store.apply(ParamsPatch::audio("/tmp/clip.mp3"));
        let merged = store.apply(ParamsPatch::speed(20.0));

        assert_eq!(merged.start_sec, 1.0);
        assert_eq!(merged.end_sec, 9.0);
        assert_eq!(merged.gif_speed_fps, 20.0);
        assert_eq!(merged.audio.as_deref(), Some(std::path::Path::new("/tmp/clip.mp3")));

        // A later range update keeps the speed write.
        let merged = store.apply(ParamsPatch::range(2.0, 8.0));
        assert_eq!(merged.gif_speed_fps, 20.0);
        assert_eq!(merged.span_sec(), 6.0);
    }

    #[test]
    fn defaults_match_initial_ui_state() {
        let params = GenerationParams::default();
        assert_eq!(params.gif_speed_fps, 30.0);
        assert!(params.audio.is_none());
    }
}
