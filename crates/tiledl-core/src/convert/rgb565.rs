//! RGB565 packing.
//!
//! Layout (v1): one `u16` per pixel, row-major, big-endian (high byte first),
//! `RRRRRGGG GGGBBBBB`, no header. Alpha is dropped.

use super::png8::Quantized;

pub fn pack_rgb565(r: u8, g: u8, b: u8) -> u16 {
    (((r & 0xF8) as u16) << 8) | (((g & 0xFC) as u16) << 3) | ((b >> 3) as u16)
}

/// Expand to 8-bit channels, reconstructing each channel at the midpoint of
/// its truncation bucket. Error against the packed input is at most 4 for red
/// and blue and 2 for green.
pub fn unpack_rgb565(v: u16) -> [u8; 3] {
    let r5 = ((v >> 11) & 0x1F) as u8;
    let g6 = ((v >> 5) & 0x3F) as u8;
    let b5 = (v & 0x1F) as u8;
    [(r5 << 3) | 0x04, (g6 << 2) | 0x02, (b5 << 3) | 0x04]
}

/// Pack every pixel of `q`; output is exactly `width * height * 2` bytes.
pub fn encode(q: &Quantized) -> Vec<u8> {
    let mut out = Vec::with_capacity(q.indices.len() * 2);
    for i in 0..q.indices.len() {
        let [r, g, b, _] = q.color_at(i);
        out.extend_from_slice(&pack_rgb565(r, g, b).to_be_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pure_red_is_f800() {
        assert_eq!(pack_rgb565(255, 0, 0), 0xF800);
        assert_eq!(pack_rgb565(0, 255, 0), 0x07E0);
        assert_eq!(pack_rgb565(0, 0, 255), 0x001F);
        assert_eq!(unpack_rgb565(0xF800), [252, 2, 4]);
    }

    #[test]
    fn round_trip_within_quantisation_loss() {
        for r in 0..=255u16 {
            for g in (0..=255u16).step_by(3) {
                for b in [0u16, 3, 64, 130, 201, 255] {
                    let [r2, g2, b2] = unpack_rgb565(pack_rgb565(r as u8, g as u8, b as u8));
                    assert!((r as i32 - r2 as i32).abs() <= 4, "r {r} -> {r2}");
                    assert!((g as i32 - g2 as i32).abs() <= 2, "g {g} -> {g2}");
                    assert!((b as i32 - b2 as i32).abs() <= 4, "b {b} -> {b2}");
                }
            }
        }
    }

    #[test]
    fn encode_is_big_endian_row_major() {
        let q = Quantized {
            width: 2,
            height: 1,
            palette: vec![[255, 0, 0, 255], [0, 0, 255, 0]],
            indices: vec![0, 1],
        };
        assert_eq!(encode(&q), vec![0xF8, 0x00, 0x00, 0x1F]);
    }
}
