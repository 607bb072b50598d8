//! GIF-variant LZW decompression.
//!
//! Codes are packed LSB-first with a variable width that starts at
//! `min_code_size + 1` bits and grows up to 12 as the dictionary fills.

use crate::foundation::error::DecodeError;

const MAX_CODES: usize = 1 << 12;

/// Decompress a concatenated image data stream into pixel indices.
///
/// `expected_len` is `width * height` of the frame rectangle; decoding stops
/// once that many indices are produced even if the end code has not been
/// seen yet (trailing codes are discarded).
pub(crate) fn decompress(
    min_code_size: u8,
    data: &[u8],
    expected_len: usize,
) -> Result<Vec<u8>, DecodeError> {
    if !(2..=8).contains(&min_code_size) {
        return Err(DecodeError::BadCodeSize(min_code_size));
    }

    let clear: u16 = 1 << min_code_size;
    let end: u16 = clear + 1;

    let mut prefix = [0u16; MAX_CODES];
    let mut suffix = [0u8; MAX_CODES];
    for i in 0..clear {
        suffix[i as usize] = i as u8;
    }

    let mut out: Vec<u8> = Vec::with_capacity(expected_len);
    let mut stack: Vec<u8> = Vec::with_capacity(MAX_CODES);

    let initial_width = u32::from(min_code_size) + 1;
    let mut width = initial_width;
    let mut next_code = end + 1;
    let mut prev: Option<u16> = None;

    // LSB-first bit accumulator over the sub-block-joined byte stream.
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mut pos: usize = 0;

    while out.len() < expected_len {
        while bits < width {
            let Some(&byte) = data.get(pos) else {
                return Err(DecodeError::CorruptLzw("compressed stream ended early"));
            };
            acc |= u32::from(byte) << bits;
            bits += 8;
            pos += 1;
        }
        let code = (acc & ((1 << width) - 1)) as u16;
        acc >>= width;
        bits -= width;

        if code == clear {
            width = initial_width;
            next_code = end + 1;
            prev = None;
            continue;
        }
        if code == end {
            break;
        }

        // Walk the code chain onto the stack (last byte first); `first` is
        // the first byte of the decoded sequence.
        let first = if code < next_code {
            push_sequence(&mut stack, &prefix, &suffix, clear, code)?
        } else if code == next_code {
            // The one code the encoder may emit before the decoder has it:
            // its expansion is prev's sequence plus prev's first byte.
            let Some(prev_code) = prev else {
                return Err(DecodeError::CorruptLzw("first code is not in the dictionary"));
            };
            let first = push_sequence(&mut stack, &prefix, &suffix, clear, prev_code)?;
            // Emit the extra first byte after the sequence (stack pops in
            // sequence order, so it is appended below).
            stack.insert(0, first);
            first
        } else {
            return Err(DecodeError::CorruptLzw("code beyond dictionary bounds"));
        };

        while let Some(byte) = stack.pop() {
            out.push(byte);
        }

        if let Some(prev_code) = prev
            && next_code < MAX_CODES as u16
        {
            prefix[next_code as usize] = prev_code;
            suffix[next_code as usize] = first;
            next_code += 1;
            if u32::from(next_code) == (1 << width) && width < 12 {
                width += 1;
            }
        }
        prev = Some(code);
    }

    out.truncate(expected_len);
    Ok(out)
}

fn push_sequence(
    stack: &mut Vec<u8>,
    prefix: &[u16; MAX_CODES],
    suffix: &[u8; MAX_CODES],
    clear: u16,
    code: u16,
) -> Result<u8, DecodeError> {
    let mut c = code;
    while c >= clear {
        if stack.len() >= MAX_CODES {
            return Err(DecodeError::CorruptLzw("code chain exceeds dictionary size"));
        }
        stack.push(suffix[c as usize]);
        c = prefix[c as usize];
    }
    let first = suffix[c as usize];
    stack.push(first);
    Ok(first)
}

/// Pack codes LSB-first at fixed widths, mirroring the decoder's bit order.
/// Widths are supplied per code so tests control growth exactly.
#[cfg(test)]
pub(crate) fn pack_codes(codes: &[(u16, u32)]) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    for &(code, width) in codes {
        acc |= u32::from(code) << bits;
        bits += width;
        while bits >= 8 {
            bytes.push((acc & 0xff) as u8);
            acc >>= 8;
            bits -= 8;
        }
    }
    if bits > 0 {
        bytes.push((acc & 0xff) as u8);
    }
    bytes
}

/// Compress pixels with a clear code before every literal, so the stream
/// never grows the dictionary and stays at the initial code width.
#[cfg(test)]
pub(crate) fn compress_uncompressed(min_code_size: u8, pixels: &[u8]) -> Vec<u8> {
    let width = u32::from(min_code_size) + 1;
    let clear = 1u16 << min_code_size;
    let end = clear + 1;
    let mut codes: Vec<(u16, u32)> = Vec::new();
    for &p in pixels {
        codes.push((clear, width));
        codes.push((u16::from(p), width));
    }
    codes.push((end, width));
    pack_codes(&codes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pack(codes: &[(u16, u32)]) -> Vec<u8> {
        pack_codes(codes)
    }

    #[test]
    fn canonical_single_pixel_stream() {
        // clear(4), literal 0, end(5) at 3 bits packs to [0x44, 0x01].
        let data = pack(&[(4, 3), (0, 3), (5, 3)]);
        assert_eq!(data, vec![0x44, 0x01]);
        assert_eq!(decompress(2, &data, 1).unwrap(), vec![0]);
    }

    #[test]
    fn literal_run_with_interleaved_clears() {
        // Clears before every literal keep the dictionary empty, so the
        // stream stays at the initial width throughout.
        let pixels = [0u8, 1, 2, 3, 1, 0];
        let data = compress_uncompressed(2, &pixels);
        assert_eq!(decompress(2, &data, pixels.len()).unwrap(), pixels);
    }

    #[test]
    fn dictionary_growth_and_deferred_code() {
        // clear, 0, 1 adds entry 6 = [0,1]; code 6 emits [0,1] and adds
        // entry 7 = [1,0], which bumps next_code to 8 == 1<<3 so the width
        // grows to 4 bits. Code 8 is then the not-yet-added entry: it
        // expands to prev's sequence plus prev's first byte, [0,1] + 0.
        let codes = [(4u16, 3u32), (0, 3), (1, 3), (6, 3), (8, 4), (5, 4)];
        let data = pack(&codes);
        assert_eq!(decompress(2, &data, 7).unwrap(), vec![0, 1, 0, 1, 0, 1, 0]);
    }

    #[test]
    fn rejects_bad_code_size() {
        assert_eq!(decompress(1, &[0x44, 0x01], 1), Err(DecodeError::BadCodeSize(1)));
        assert_eq!(decompress(9, &[0x44, 0x01], 1), Err(DecodeError::BadCodeSize(9)));
    }

    #[test]
    fn rejects_truncated_stream() {
        assert_eq!(
            decompress(2, &[0x44], 4),
            Err(DecodeError::CorruptLzw("compressed stream ended early"))
        );
    }

    #[test]
    fn rejects_code_beyond_dictionary() {
        // clear, 0, then 7 while next_code is still 6.
        let data = pack(&[(4u16, 3u32), (0, 3), (7, 3)]);
        assert_eq!(
            decompress(2, &data, 4),
            Err(DecodeError::CorruptLzw("code beyond dictionary bounds"))
        );
    }
}
