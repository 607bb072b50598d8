//! Retiming math and the transcoder argument list.

use std::path::Path;

use crate::foundation::error::{SyncError, SyncResult};

use super::params::GenerationParams;

/// Frame rate the filter chain samples the looped image stream at before
/// retiming.
pub const FILTER_GRAPH_FPS: u32 = 24;

/// Multiplier applied to the image stream's presentation timestamps so it
/// plays at `gif_speed_fps` relative to its native rate.
///
/// `source_fps = 1000 / base_frame_delay_ms`;
/// `speed_factor = source_fps / gif_speed_fps`.
pub fn speed_factor(base_frame_delay_ms: f64, gif_speed_fps: f64) -> SyncResult<f64> {
    if !(base_frame_delay_ms.is_finite() && base_frame_delay_ms > 0.0) {
        return Err(SyncError::validation(
            "base frame delay must be positive (the gif carries no usable timing)",
        ));
    }
    if !(gif_speed_fps.is_finite() && gif_speed_fps > 0.0) {
        return Err(SyncError::validation("gif speed must be a positive frame rate"));
    }
    let source_fps = 1000.0 / base_frame_delay_ms;
    Ok(source_fps / gif_speed_fps)
}

/// Build the ordered transcoder argument list for one job.
///
/// Loops the image input indefinitely, trims the audio to the selected
/// range, retimes the image's presentation timestamps, normalizes output
/// dimensions to even width/height, maps exactly one video and one audio
/// stream, and truncates the output to the shorter stream (the trimmed
/// audio, since the image loops forever).
pub fn build_transcode_args(
    gif_path: &Path,
    audio_path: &Path,
    out_path: &Path,
    params: &GenerationParams,
    base_frame_delay_ms: f64,
) -> SyncResult<Vec<String>> {
    let factor = speed_factor(base_frame_delay_ms, params.gif_speed_fps)?;

    let mut args: Vec<String> = vec![
        "-stream_loop".into(),
        "-1".into(),
        "-i".into(),
        gif_path.display().to_string(),
        "-i".into(),
        audio_path.display().to_string(),
    ];

    if params.span_sec() > 0.0 {
        args.push("-ss".into());
        args.push(params.start_sec.to_string());
        args.push("-t".into());
        args.push(params.span_sec().to_string());
    }

    args.push("-filter_complex".into());
    args.push(format!(
        "[0:v]fps={FILTER_GRAPH_FPS},setpts={factor}*PTS,scale=trunc(iw/2)*2:trunc(ih/2)*2[v]"
    ));
    args.extend(
        [
            "-map", "[v]", "-map", "1:a", "-c:v", "libx264", "-c:a", "aac", "-shortest",
            "-pix_fmt", "yuv420p",
        ]
        .map(String::from),
    );
    args.push(out_path.display().to_string());

    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_speed_factor_from_native_rate() {
        // 100 ms base delay -> 10 fps native; retimed to 20 fps -> 0.5.
        assert_eq!(speed_factor(100.0, 20.0).unwrap(), 0.5);
        assert_eq!(speed_factor(50.0, 10.0).unwrap(), 2.0);
    }

    #[test]
    fn rejects_unusable_timing() {
        assert!(matches!(speed_factor(0.0, 20.0), Err(SyncError::Validation(_))));
        assert!(matches!(speed_factor(-10.0, 20.0), Err(SyncError::Validation(_))));
        assert!(matches!(speed_factor(100.0, 0.0), Err(SyncError::Validation(_))));
        assert!(matches!(speed_factor(f64::NAN, 20.0), Err(SyncError::Validation(_))));
    }

    #[test]
    fn builds_the_full_argument_list_in_order() {
        let params = GenerationParams {
            start_sec: 1.5,
            end_sec: 9.5,
            gif_speed_fps: 20.0,
            audio: None,
        };
        let args = build_transcode_args(
            Path::new("in.gif"),
            Path::new("clip.mp3"),
            Path::new("out.mp4"),
            &params,
            100.0,
        )
        .unwrap();

        let expected: Vec<String> = [
            "-stream_loop",
            "-1",
            "-i",
            "in.gif",
            "-i",
            "clip.mp3",
            "-ss",
            "1.5",
            "-t",
            "8",
            "-filter_complex",
            "[0:v]fps=24,setpts=0.5*PTS,scale=trunc(iw/2)*2:trunc(ih/2)*2[v]",
            "-map",
            "[v]",
            "-map",
            "1:a",
            "-c:v",
            "libx264",
            "-c:a",
            "aac",
            "-shortest",
            "-pix_fmt",
            "yuv420p",
            "out.mp4",
        ]
        .map(String::from)
        .to_vec();
        assert_eq!(args, expected);
    }

    #[test]
    fn omits_trim_for_an_empty_range() {
        let params = GenerationParams::default();
        let args = build_transcode_args(
            Path::new("in.gif"),
            Path::new("clip.mp3"),
            Path::new("out.mp4"),
            &params,
            50.0,
        )
        .unwrap();
        assert!(!args.iter().any(|a| a == "-ss"));
        assert!(!args.iter().any(|a| a == "-t"));
    }
}
