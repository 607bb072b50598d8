//! Drives the progress parser with a realistic engine transcript, fed in
//! arbitrary chunks the way a pipe hands it over.

use gifsync::{ProgressParser, ProgressStatus};

const TRANSCRIPT: &str = "\
ffmpeg version 4.4.2 Copyright (c) 2000-2021 the FFmpeg developers\n\
Input #0, gif, from 'input.gif':\n\
  Duration: 00:00:01.20, start: 0.000000, bitrate: 1270 kb/s\n\
    Stream #0:0: Video: gif, bgra, 480x270, 10 fps, 10 tbr, 100 tbn\n\
Input #1, mp3, from 'clip.mp3':\n\
  Duration: 00:01:00.00, start: 0.025057, bitrate: 128 kb/s\n\
    Stream #1:0: Audio: mp3, 44100 Hz, stereo, fltp, 128 kb/s\n\
Stream mapping:\n\
  Stream #0:0 (gif) -> fps:default\n\
  Stream #1:0 -> #0:1 (mp3 (mp3float) -> aac (native))\n\
Press [q] to stop, [?] for help\n\
Output #0, mp4, to 'output.mp4':\n\
frame=  240 fps= 48 q=28.0 size=     512kB time=00:00:10.00 bitrate= 419.4kbits/s speed=1.99x\r\
frame=  720 fps= 47 q=28.0 size=    1536kB time=00:00:30.00 bitrate= 419.4kbits/s speed=1.98x\r\
frame= 1440 fps= 47 q=-1.0 Lsize=    3072kB time=00:01:00.00 bitrate= 419.4kbits/s speed=1.97x\n\
video:2900kB audio:160kB subtitle:0kB other streams:0kB global headers:0kB muxing overhead: 0.3%\n";

#[test]
fn transcript_walks_initializing_to_completed() {
    let mut parser = ProgressParser::new();
    let mut snapshots = Vec::new();

    // 13-byte chunks cross every line boundary somewhere.
    let bytes = TRANSCRIPT.as_bytes();
    for chunk in bytes.chunks(13) {
        let text = std::str::from_utf8(chunk).expect("ascii transcript");
        snapshots.extend(parser.push_chunk(text));
    }
    parser.finish();

    // The gif input's duration (first match) is ignored; the audio input's
    // (second match) is authoritative.
    assert_eq!(parser.state().total_time_sec, 60.0);

    let statuses: Vec<ProgressStatus> = snapshots.iter().map(|s| s.status).collect();
    assert!(statuses.contains(&ProgressStatus::Processing));
    assert_eq!(statuses.last(), Some(&ProgressStatus::Completed));

    // Percent walked 10s -> 30s -> completion.
    let percents: Vec<f64> = snapshots.iter().map(|s| s.percent).collect();
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "monotonic: {percents:?}");
    assert!(percents.iter().any(|p| (*p - 50.0).abs() < 1e-9));
    assert_eq!(parser.state().percent, 100.0);
    assert_eq!(parser.state().status, ProgressStatus::Completed);
    assert_eq!(parser.state().frame, 720);
}

#[test]
fn transcript_after_reset_parses_cleanly_again() {
    let mut parser = ProgressParser::new();
    parser.push_chunk(TRANSCRIPT);
    parser.finish();
    assert_eq!(parser.state().status, ProgressStatus::Completed);

    parser.reset();
    assert_eq!(parser.state().status, ProgressStatus::Initializing);
    assert_eq!(parser.state().percent, 0.0);
    assert_eq!(parser.state().total_time_sec, 0.0);
    assert_eq!(parser.state().frame, 0);

    parser.push_chunk(TRANSCRIPT);
    parser.finish();
    assert_eq!(parser.state().status, ProgressStatus::Completed);
    assert_eq!(parser.state().total_time_sec, 60.0);
}

#[test]
fn failing_transcript_lands_in_terminal_error() {
    let mut parser = ProgressParser::new();
    parser.push_chunk(
        "Input #0, gif, from 'input.gif':\n  Duration: 00:00:01.20, start: 0.000000\n",
    );
    parser.push_chunk("Error while opening encoder for output stream #0:0\n");
    assert_eq!(parser.state().status, ProgressStatus::Error);
    assert!(
        parser
            .state()
            .error
            .as_deref()
            .is_some_and(|line| line.contains("opening encoder"))
    );

    // Terminal until reset.
    parser.push_chunk(
        "frame=  240 fps= 48 q=28.0 size=     512kB time=00:00:10.00 bitrate= 419.4kbits/s speed=1.99x\n",
    );
    assert_eq!(parser.state().status, ProgressStatus::Error);
    assert_eq!(parser.state().frame, 0);
}
