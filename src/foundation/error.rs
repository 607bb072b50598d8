/// Convenience result type used across gifsync.
pub type SyncResult<T> = Result<T, SyncError>;

/// Top-level error taxonomy used by pipeline APIs.
#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    /// Malformed or truncated animated-image input.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Invalid user-provided input or API arguments. Rejected locally, no
    /// state is mutated.
    #[error("validation error: {0}")]
    Validation(String),

    /// A transcode job is already running for this orchestrator.
    #[error("concurrency error: {0}")]
    Concurrency(String),

    /// The external transcoding engine failed to spawn or exited with an
    /// error. Never retried automatically.
    #[error("engine error: {0}")]
    Engine(String),

    /// A required audio or image resource is missing or unreadable.
    #[error("resource error: {0}")]
    Resource(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SyncError {
    /// Build a [`SyncError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`SyncError::Concurrency`] value.
    pub fn concurrency(msg: impl Into<String>) -> Self {
        Self::Concurrency(msg.into())
    }

    /// Build a [`SyncError::Engine`] value.
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    /// Build a [`SyncError::Resource`] value.
    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }
}

/// Errors produced while parsing a GIF byte stream.
///
/// Decoding is all-or-nothing: any of these aborts the load and no partial
/// frame store is returned.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The stream does not start with a `GIF87a`/`GIF89a` signature.
    #[error("not a GIF stream (bad signature)")]
    BadSignature,

    /// The stream ended in the middle of the named structure.
    #[error("truncated {0} (unexpected end of input)")]
    Truncated(&'static str),

    /// An image block has neither a local nor a global color table.
    #[error("frame {frame} has no color table")]
    MissingPalette {
        /// 0-based frame ordinal.
        frame: usize,
    },

    /// A decompressed pixel index points outside the active color table.
    #[error("frame {frame} references palette index {index} outside a {palette_len}-entry table")]
    BadPaletteIndex {
        /// 0-based frame ordinal.
        frame: usize,
        /// Offending pixel index.
        index: u8,
        /// Entries in the active color table.
        palette_len: usize,
    },

    /// A frame rectangle extends past the declared canvas.
    #[error(
        "frame {frame} rectangle {width}x{height}+{left}+{top} exceeds canvas {canvas_width}x{canvas_height}"
    )]
    FrameOutOfBounds {
        /// 0-based frame ordinal.
        frame: usize,
        /// Sub-rectangle width.
        width: u32,
        /// Sub-rectangle height.
        height: u32,
        /// Sub-rectangle left offset.
        left: u32,
        /// Sub-rectangle top offset.
        top: u32,
        /// Declared canvas width.
        canvas_width: u32,
        /// Declared canvas height.
        canvas_height: u32,
    },

    /// The LZW minimum code size is outside the 2..=8 range GIF allows.
    #[error("invalid LZW minimum code size {0}")]
    BadCodeSize(u8),

    /// The LZW stream is internally inconsistent.
    #[error("corrupt LZW stream: {0}")]
    CorruptLzw(&'static str),

    /// An image block decompressed to the wrong number of pixels.
    #[error("frame {frame} pixel data mismatch: got {got} indices, expected {expected}")]
    PixelCountMismatch {
        /// 0-based frame ordinal.
        frame: usize,
        /// Indices produced by decompression.
        got: usize,
        /// `width * height` of the frame rectangle.
        expected: usize,
    },

    /// A block introducer byte that is not an extension, image, or trailer.
    #[error("unexpected block introducer 0x{0:02x}")]
    UnexpectedBlock(u8),

    /// The stream carried no image blocks at all.
    #[error("stream contains no frames")]
    NoFrames,
}
