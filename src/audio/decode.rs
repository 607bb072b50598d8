//! Audio decoding and probing through the system `ffmpeg`/`ffprobe`.

use std::path::Path;

use crate::foundation::error::{SyncError, SyncResult};

/// Sample rate used for waveform analysis PCM.
pub const ANALYSIS_SAMPLE_RATE: u32 = 48_000;

/// Decoded interleaved floating-point PCM.
#[derive(Clone, Debug)]
pub struct AudioPcm {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u16,
    /// Interleaved `f32` PCM samples.
    pub interleaved: Vec<f32>,
}

impl AudioPcm {
    /// Extract one channel from the interleaved buffer.
    pub fn channel(&self, index: u16) -> Vec<f32> {
        if index >= self.channels {
            return Vec::new();
        }
        self.interleaved
            .iter()
            .skip(usize::from(index))
            .step_by(usize::from(self.channels))
            .copied()
            .collect()
    }

    /// Duration implied by the sample count.
    pub fn duration_sec(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.interleaved.len() as f64 / f64::from(self.channels) / f64::from(self.sample_rate)
    }
}

/// Basic metadata about an audio source file.
#[derive(Clone, Copy, Debug)]
pub struct AudioInfo {
    /// Container duration in seconds.
    pub duration_sec: f64,
    /// Whether ffprobe detected at least one audio stream.
    pub has_audio: bool,
}

/// Probe audio metadata through `ffprobe`.
pub fn probe_audio(path: &Path) -> SyncResult<AudioInfo> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    if !path.exists() {
        return Err(SyncError::resource(format!(
            "audio file '{}' does not exist",
            path.display()
        )));
    }

    let out = std::process::Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path)
        .output()
        .map_err(|e| SyncError::engine(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(SyncError::resource(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| SyncError::engine(format!("ffprobe json parse failed: {e}")))?;
    let has_audio = parsed
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));
    let duration_sec = parsed
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    Ok(AudioInfo { duration_sec, has_audio })
}

/// Decode an audio file to stereo interleaved `f32` PCM at `sample_rate`.
///
/// Sources without an audio track decode to empty PCM rather than an error.
pub fn decode_audio_pcm(path: &Path, sample_rate: u32) -> SyncResult<AudioPcm> {
    if !path.exists() {
        return Err(SyncError::resource(format!(
            "audio file '{}' does not exist",
            path.display()
        )));
    }

    let out = std::process::Command::new("ffmpeg")
        .args(["-v", "error", "-i"])
        .arg(path)
        .args([
            "-vn",
            "-f",
            "f32le",
            "-acodec",
            "pcm_f32le",
            "-ac",
            "2",
            "-ar",
            &sample_rate.to_string(),
            "pipe:1",
        ])
        .output()
        .map_err(|e| SyncError::engine(format!("failed to run ffmpeg for audio decode: {e}")))?;

    if !out.status.success() {
        let msg = String::from_utf8_lossy(&out.stderr);
        if msg.contains("matches no streams")
            || msg.contains("Output file #0 does not contain any stream")
        {
            return Ok(AudioPcm {
                sample_rate,
                channels: 2,
                interleaved: Vec::new(),
            });
        }
        return Err(SyncError::resource(format!(
            "ffmpeg audio decode failed for '{}': {}",
            path.display(),
            msg.trim()
        )));
    }

    if !out.stdout.len().is_multiple_of(4) {
        return Err(SyncError::engine(
            "decoded audio byte length is not aligned to f32 samples",
        ));
    }
    let mut pcm = Vec::<f32>::with_capacity(out.stdout.len() / 4);
    for chunk in out.stdout.chunks_exact(4) {
        pcm.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }

    Ok(AudioPcm {
        sample_rate,
        channels: 2,
        interleaved: pcm,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_extraction_deinterleaves() {
        let pcm = AudioPcm {
            sample_rate: 4,
            channels: 2,
            interleaved: vec![0.1, -0.1, 0.2, -0.2, 0.3, -0.3],
        };
        assert_eq!(pcm.channel(0), vec![0.1, 0.2, 0.3]);
        assert_eq!(pcm.channel(1), vec![-0.1, -0.2, -0.3]);
        assert!(pcm.channel(2).is_empty());
    }

    #[test]
    fn duration_from_sample_count() {
        let pcm = AudioPcm {
            sample_rate: 4,
            channels: 2,
            interleaved: vec![0.0; 16],
        };
        assert_eq!(pcm.duration_sec(), 2.0);
    }

    #[test]
    fn missing_file_is_a_resource_error() {
        let err = probe_audio(Path::new("/nonexistent/clip.mp3")).unwrap_err();
        assert!(matches!(err, SyncError::Resource(_)));
        let err = decode_audio_pcm(Path::new("/nonexistent/clip.mp3"), 48_000).unwrap_err();
        assert!(matches!(err, SyncError::Resource(_)));
    }
}
