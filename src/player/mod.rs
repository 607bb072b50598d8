//! Looping GIF playback onto a persistent canvas.
//!
//! [`CompositingPlayer`] drives a [`FrameStore`] at a user-chosen frame
//! rate, applying each frame's disposal method before drawing the next.
//! The canvas buffer has exactly one writer (the player); observers read
//! it between ticks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::foundation::error::{SyncError, SyncResult};
use crate::gif::{Disposal, Frame, FrameRect, FrameStore};

/// Lowest preview rate; slower inputs are clamped, not rejected.
pub const MIN_FPS: f64 = 1.0;
/// Highest preview rate; faster inputs are clamped, not rejected.
pub const MAX_FPS: f64 = 100.0;

/// Mutable RGBA raster owned exclusively by the player.
#[derive(Clone, Debug)]
pub struct CanvasBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl CanvasBuffer {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }

    /// Canvas width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Canvas height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Packed RGBA contents, row-major.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// One RGBA pixel, or `None` outside the canvas.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let o = (y as usize * self.width as usize + x as usize) * 4;
        Some([self.pixels[o], self.pixels[o + 1], self.pixels[o + 2], self.pixels[o + 3]])
    }

    /// Clear a sub-rectangle to fully transparent, clipped to the canvas.
    fn clear_rect(&mut self, rect: &FrameRect) {
        let x0 = rect.left.min(self.width) as usize;
        let y0 = rect.top.min(self.height) as usize;
        let x1 = (rect.left + rect.width).min(self.width) as usize;
        let y1 = (rect.top + rect.height).min(self.height) as usize;
        for y in y0..y1 {
            let row = (y * self.width as usize + x0) * 4;
            self.pixels[row..row + (x1 - x0) * 4].fill(0);
        }
    }

    /// Blit a frame's pixels at its offset, clipped to the canvas.
    ///
    /// GIF pixels are either fully opaque or fully transparent; transparent
    /// source pixels leave existing canvas content untouched.
    fn blit(&mut self, frame: &Frame) {
        let dims = &frame.dims;
        let x0 = dims.left.min(self.width) as usize;
        let y0 = dims.top.min(self.height) as usize;
        let x1 = (dims.left + dims.width).min(self.width) as usize;
        let y1 = (dims.top + dims.height).min(self.height) as usize;
        for y in y0..y1 {
            let src_row = ((y - dims.top as usize) * dims.width as usize) * 4;
            let dst_row = (y * self.width as usize) * 4;
            for x in x0..x1 {
                let s = src_row + (x - dims.left as usize) * 4;
                if frame.pixels[s + 3] == 0 {
                    continue;
                }
                let d = dst_row + x * 4;
                self.pixels[d..d + 4].copy_from_slice(&frame.pixels[s..s + 4]);
            }
        }
    }
}

/// Player lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerState {
    /// A store is loaded but playback has not started.
    Idle,
    /// Ticks are being applied.
    Playing,
    /// Playback halted; canvas contents are left as they were.
    Stopped,
}

/// Drives looping playback of a [`FrameStore`] onto a [`CanvasBuffer`].
///
/// The player holds a shared read reference to the store and tracks its
/// previous frame by index; it never owns a second copy of frame pixels.
pub struct CompositingPlayer {
    store: Option<Arc<FrameStore>>,
    canvas: CanvasBuffer,
    state: PlayerState,
    current: usize,
    previous: Option<usize>,
    period: Duration,
    next_tick: Option<Instant>,
}

impl CompositingPlayer {
    /// Create a player with no store loaded.
    pub fn new() -> Self {
        Self {
            store: None,
            canvas: CanvasBuffer::new(0, 0),
            state: PlayerState::Idle,
            current: 0,
            previous: None,
            period: Duration::from_millis(50),
            next_tick: None,
        }
    }

    /// Load a frame store, resetting the canvas to the first frame's
    /// declared dimensions and playback position to frame 0.
    pub fn load(&mut self, store: Arc<FrameStore>) {
        let dims = store.frame(0).map(|f| f.dims).unwrap_or(FrameRect {
            width: store.width(),
            height: store.height(),
            left: 0,
            top: 0,
        });
        self.canvas = CanvasBuffer::new(dims.width, dims.height);
        self.store = Some(store);
        self.state = PlayerState::Idle;
        self.current = 0;
        self.previous = None;
        self.next_tick = None;
        tracing::debug!(width = dims.width, height = dims.height, "player loaded store");
    }

    /// Begin playback at `fps`, clamped into [`MIN_FPS`]..=[`MAX_FPS`].
    ///
    /// The user-chosen rate overrides per-frame embedded delays for
    /// preview. Changing the rate requires `stop` + `play`.
    pub fn play(&mut self, fps: f64) -> SyncResult<()> {
        if self.store.is_none() {
            return Err(SyncError::validation("no frame store loaded"));
        }
        let fps = if fps.is_finite() { fps.clamp(MIN_FPS, MAX_FPS) } else { MIN_FPS };
        self.period = Duration::from_secs_f64(1.0 / fps);
        self.state = PlayerState::Playing;
        self.next_tick = Some(Instant::now());
        tracing::debug!(fps, "player playing");
        Ok(())
    }

    /// Halt playback without altering canvas contents. Idempotent.
    pub fn stop(&mut self) {
        if self.state == PlayerState::Playing {
            self.state = PlayerState::Stopped;
            self.next_tick = None;
            tracing::debug!("player stopped");
        }
    }

    /// Apply every tick whose deadline has passed; returns how many were
    /// applied. Call from the host's timer loop.
    pub fn run_due(&mut self, now: Instant) -> usize {
        let mut applied = 0;
        while self.state == PlayerState::Playing {
            let Some(deadline) = self.next_tick else { break };
            if deadline > now {
                break;
            }
            self.tick();
            self.next_tick = Some(deadline + self.period);
            applied += 1;
        }
        applied
    }

    /// Apply one playback step: dispose of the previous frame, draw the
    /// current one, and advance (looping past the last frame).
    pub fn tick(&mut self) {
        let Some(store) = self.store.clone() else { return };
        if store.is_empty() {
            return;
        }

        if let Some(prev) = self.previous.and_then(|i| store.frame(i)) {
            match prev.disposal {
                Disposal::None | Disposal::DoNotDispose => {}
                Disposal::RestoreBackground | Disposal::RestorePrevious | Disposal::Unknown(_) => {
                    self.canvas.clear_rect(&prev.dims);
                }
            }
        }

        if let Some(frame) = store.frame(self.current) {
            self.canvas.blit(frame);
        }
        self.previous = Some(self.current);
        self.current = (self.current + 1) % store.len();
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PlayerState {
        self.state
    }

    /// Read-only view of the composited canvas.
    pub fn canvas(&self) -> &CanvasBuffer {
        &self.canvas
    }

    /// Index of the next frame to be drawn.
    pub fn current_frame(&self) -> usize {
        self.current
    }

    /// Tick period derived from the active rate.
    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Default for CompositingPlayer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gif::Frame;

    fn solid_frame(index: usize, dims: FrameRect, rgba: [u8; 4], disposal: Disposal) -> Frame {
        Frame {
            index,
            dims,
            delay_ms: 100,
            disposal,
            pixels: rgba
                .iter()
                .copied()
                .cycle()
                .take(dims.width as usize * dims.height as usize * 4)
                .collect(),
        }
    }

    fn store(frames: Vec<Frame>, width: u32, height: u32) -> Arc<FrameStore> {
        Arc::new(FrameStore { width, height, frames })
    }

    #[test]
    fn restore_background_clears_previous_rect_before_next_draw() {
        // Frame 0 fills the 2x2 canvas and asks for RestoreBackground;
        // frame 1 only covers the right column. After a full cycle the
        // left column must be transparent again.
        let f0 = solid_frame(
            0,
            FrameRect { width: 2, height: 2, left: 0, top: 0 },
            [255, 0, 0, 255],
            Disposal::RestoreBackground,
        );
        let f1 = solid_frame(
            1,
            FrameRect { width: 1, height: 2, left: 1, top: 0 },
            [0, 255, 0, 255],
            Disposal::None,
        );

        let mut player = CompositingPlayer::new();
        player.load(store(vec![f0, f1], 2, 2));
        assert_eq!(player.canvas().width(), 2);

        player.tick();
        assert_eq!(player.canvas().pixel(0, 0), Some([255, 0, 0, 255]));
        assert_eq!(player.canvas().pixel(1, 1), Some([255, 0, 0, 255]));

        player.tick();
        assert_eq!(player.canvas().pixel(0, 0), Some([0, 0, 0, 0]));
        assert_eq!(player.canvas().pixel(1, 0), Some([0, 255, 0, 255]));
    }

    #[test]
    fn disposal_none_keeps_previous_content() {
        let f0 = solid_frame(
            0,
            FrameRect { width: 2, height: 2, left: 0, top: 0 },
            [9, 9, 9, 255],
            Disposal::None,
        );
        let mut f1 = solid_frame(
            1,
            FrameRect { width: 1, height: 1, left: 1, top: 1 },
            [7, 7, 7, 255],
            Disposal::None,
        );
        f1.pixels = vec![7, 7, 7, 255];

        let mut player = CompositingPlayer::new();
        player.load(store(vec![f0, f1], 2, 2));
        player.tick();
        player.tick();
        // Frame 0's content outside frame 1's rect survives.
        assert_eq!(player.canvas().pixel(0, 0), Some([9, 9, 9, 255]));
        assert_eq!(player.canvas().pixel(1, 1), Some([7, 7, 7, 255]));
    }

    #[test]
    fn transparent_source_pixels_leave_canvas_untouched() {
        let f0 = solid_frame(
            0,
            FrameRect { width: 1, height: 1, left: 0, top: 0 },
            [1, 2, 3, 255],
            Disposal::None,
        );
        let mut f1 = solid_frame(
            1,
            FrameRect { width: 1, height: 1, left: 0, top: 0 },
            [0, 0, 0, 0],
            Disposal::None,
        );
        f1.pixels = vec![0, 0, 0, 0];

        let mut player = CompositingPlayer::new();
        player.load(store(vec![f0, f1], 1, 1));
        player.tick();
        player.tick();
        assert_eq!(player.canvas().pixel(0, 0), Some([1, 2, 3, 255]));
    }

    #[test]
    fn playback_loops_past_last_frame() {
        let f0 = solid_frame(
            0,
            FrameRect { width: 1, height: 1, left: 0, top: 0 },
            [1, 1, 1, 255],
            Disposal::None,
        );
        let f1 = solid_frame(
            1,
            FrameRect { width: 1, height: 1, left: 0, top: 0 },
            [2, 2, 2, 255],
            Disposal::None,
        );
        let mut player = CompositingPlayer::new();
        player.load(store(vec![f0, f1], 1, 1));
        assert_eq!(player.current_frame(), 0);
        player.tick();
        assert_eq!(player.current_frame(), 1);
        player.tick();
        assert_eq!(player.current_frame(), 0);
    }

    #[test]
    fn play_clamps_rate_and_stop_is_idempotent() {
        let f0 = solid_frame(
            0,
            FrameRect { width: 1, height: 1, left: 0, top: 0 },
            [0, 0, 0, 255],
            Disposal::None,
        );
        let mut player = CompositingPlayer::new();
        assert!(player.play(30.0).is_err());

        player.load(store(vec![f0], 1, 1));
        player.play(1000.0).unwrap();
        assert_eq!(player.period(), Duration::from_secs_f64(1.0 / MAX_FPS));
        player.play(0.25).unwrap();
        assert_eq!(player.period(), Duration::from_secs_f64(1.0 / MIN_FPS));
        assert_eq!(player.state(), PlayerState::Playing);

        player.stop();
        assert_eq!(player.state(), PlayerState::Stopped);
        player.stop();
        assert_eq!(player.state(), PlayerState::Stopped);
    }

    #[test]
    fn run_due_applies_elapsed_ticks_only_while_playing() {
        let f0 = solid_frame(
            0,
            FrameRect { width: 1, height: 1, left: 0, top: 0 },
            [0, 0, 0, 255],
            Disposal::None,
        );
        let f1 = f0.clone();
        let mut player = CompositingPlayer::new();
        player.load(store(vec![f0, f1], 1, 1));
        player.play(100.0).unwrap();

        let later = Instant::now() + Duration::from_millis(35);
        let applied = player.run_due(later);
        assert!(applied >= 3, "expected at least 3 ticks, got {applied}");

        player.stop();
        assert_eq!(player.run_due(later + Duration::from_secs(1)), 0);
    }
}
