//! GIF87a/GIF89a container parsing.
//!
//! Walks the block structure (logical screen descriptor, color tables,
//! extensions, image descriptors, data sub-blocks), decompresses each image
//! block through [`lzw`], and expands palette indices to packed RGBA.

use crate::foundation::error::DecodeError;

use super::lzw;
use super::{Disposal, Frame, FrameRect, FrameStore};

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn u8(&mut self, what: &'static str) -> Result<u8, DecodeError> {
        let byte = *self.data.get(self.pos).ok_or(DecodeError::Truncated(what))?;
        self.pos += 1;
        Ok(byte)
    }

    fn u16_le(&mut self, what: &'static str) -> Result<u16, DecodeError> {
        let lo = self.u8(what)?;
        let hi = self.u8(what)?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    fn bytes(&mut self, len: usize, what: &'static str) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(len).ok_or(DecodeError::Truncated(what))?;
        let slice = self.data.get(self.pos..end).ok_or(DecodeError::Truncated(what))?;
        self.pos = end;
        Ok(slice)
    }
}

/// Contents of the graphic control extension preceding an image block.
#[derive(Clone, Copy, Default)]
struct GraphicControl {
    delay_ms: u32,
    disposal_code: u8,
    transparent_index: Option<u8>,
}

pub(super) fn parse(bytes: &[u8]) -> Result<FrameStore, DecodeError> {
    let mut r = Reader { data: bytes, pos: 0 };

    let signature = r.bytes(6, "header")?;
    if signature != b"GIF87a" && signature != b"GIF89a" {
        return Err(DecodeError::BadSignature);
    }

    let width = u32::from(r.u16_le("logical screen descriptor")?);
    let height = u32::from(r.u16_le("logical screen descriptor")?);
    let packed = r.u8("logical screen descriptor")?;
    let _background_index = r.u8("logical screen descriptor")?;
    let _aspect_ratio = r.u8("logical screen descriptor")?;

    let global_palette = if packed & 0x80 != 0 {
        let entries = 2usize << (packed & 0x07);
        Some(r.bytes(entries * 3, "global color table")?)
    } else {
        None
    };

    let mut frames: Vec<Frame> = Vec::new();
    let mut pending_control: Option<GraphicControl> = None;

    loop {
        match r.u8("block introducer")? {
            0x21 => {
                let label = r.u8("extension label")?;
                if label == 0xF9 {
                    pending_control = Some(parse_graphic_control(&mut r)?);
                } else {
                    // Comment, application (incl. loop count), plain text:
                    // playback loops unconditionally, so only the framing
                    // matters here.
                    skip_sub_blocks(&mut r)?;
                }
            }
            0x2C => {
                let frame = parse_image(
                    &mut r,
                    frames.len(),
                    width,
                    height,
                    global_palette,
                    pending_control.take(),
                )?;
                frames.push(frame);
            }
            0x3B => break,
            other => return Err(DecodeError::UnexpectedBlock(other)),
        }
    }

    if frames.is_empty() {
        return Err(DecodeError::NoFrames);
    }
    Ok(FrameStore { width, height, frames })
}

fn parse_graphic_control(r: &mut Reader<'_>) -> Result<GraphicControl, DecodeError> {
    let size = usize::from(r.u8("graphic control block")?);
    let body = r.bytes(size, "graphic control block")?;
    skip_sub_blocks(r)?;

    let mut control = GraphicControl::default();
    if size >= 4 {
        let packed = body[0];
        control.disposal_code = (packed >> 2) & 0x07;
        // Native unit is centiseconds.
        control.delay_ms = u32::from(u16::from_le_bytes([body[1], body[2]])) * 10;
        control.transparent_index = (packed & 0x01 != 0).then_some(body[3]);
    }
    Ok(control)
}

fn skip_sub_blocks(r: &mut Reader<'_>) -> Result<(), DecodeError> {
    loop {
        let len = usize::from(r.u8("sub-block size")?);
        if len == 0 {
            return Ok(());
        }
        r.bytes(len, "sub-block")?;
    }
}

fn parse_image<'a>(
    r: &mut Reader<'a>,
    index: usize,
    canvas_width: u32,
    canvas_height: u32,
    global_palette: Option<&'a [u8]>,
    control: Option<GraphicControl>,
) -> Result<Frame, DecodeError> {
    let left = u32::from(r.u16_le("image descriptor")?);
    let top = u32::from(r.u16_le("image descriptor")?);
    let width = u32::from(r.u16_le("image descriptor")?);
    let height = u32::from(r.u16_le("image descriptor")?);
    let packed = r.u8("image descriptor")?;

    if left + width > canvas_width || top + height > canvas_height {
        return Err(DecodeError::FrameOutOfBounds {
            frame: index,
            width,
            height,
            left,
            top,
            canvas_width,
            canvas_height,
        });
    }

    let local_palette = if packed & 0x80 != 0 {
        let entries = 2usize << (packed & 0x07);
        Some(r.bytes(entries * 3, "local color table")?)
    } else {
        None
    };
    let interlaced = packed & 0x40 != 0;
    let palette = local_palette
        .or(global_palette)
        .ok_or(DecodeError::MissingPalette { frame: index })?;

    let min_code_size = r.u8("image data")?;
    let mut compressed = Vec::new();
    loop {
        let len = usize::from(r.u8("image data sub-block")?);
        if len == 0 {
            break;
        }
        compressed.extend_from_slice(r.bytes(len, "image data sub-block")?);
    }

    let expected = width as usize * height as usize;
    let indices = lzw::decompress(min_code_size, &compressed, expected)?;
    if indices.len() != expected {
        return Err(DecodeError::PixelCountMismatch {
            frame: index,
            got: indices.len(),
            expected,
        });
    }
    let indices = if interlaced {
        deinterlace(&indices, width as usize, height as usize)
    } else {
        indices
    };

    let control = control.unwrap_or_default();
    let palette_len = palette.len() / 3;
    let mut pixels = vec![0u8; expected * 4];
    for (i, &idx) in indices.iter().enumerate() {
        if control.transparent_index == Some(idx) {
            // Stays fully transparent.
            continue;
        }
        if usize::from(idx) >= palette_len {
            return Err(DecodeError::BadPaletteIndex {
                frame: index,
                index: idx,
                palette_len,
            });
        }
        let p = usize::from(idx) * 3;
        let o = i * 4;
        pixels[o] = palette[p];
        pixels[o + 1] = palette[p + 1];
        pixels[o + 2] = palette[p + 2];
        pixels[o + 3] = 255;
    }

    Ok(Frame {
        index,
        dims: FrameRect { width, height, left, top },
        delay_ms: control.delay_ms,
        disposal: Disposal::from_code(control.disposal_code),
        pixels,
    })
}

/// Reorder interlaced rows into display order (four passes: every 8th row
/// from 0, every 8th from 4, every 4th from 2, every 2nd from 1).
fn deinterlace(indices: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut out = vec![0u8; indices.len()];
    let mut src_row = 0;
    for &(start, step) in &[(0usize, 8usize), (4, 8), (2, 4), (1, 2)] {
        let mut dst_row = start;
        while dst_row < height {
            out[dst_row * width..(dst_row + 1) * width]
                .copy_from_slice(&indices[src_row * width..(src_row + 1) * width]);
            src_row += 1;
            dst_row += step;
        }
    }
    out
}
