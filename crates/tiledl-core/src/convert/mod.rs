//! Format conversion: raw passthrough, 8-bit palette PNG, packed RGB565.
//!
//! Conversion is pure CPU work and runs on the scheduler's convert pool.
//! Requesting `rgb565` forces the palette decode even when `png8` output was
//! not requested, so both artifacts come from the same ≤256-colour pixels.

mod decode;
mod format;
mod png8;
mod rgb565;

pub use decode::{decode_rgba, sniff_extension};
pub use format::{FormatSet, OutputFormat};
pub use png8::{encode_indexed, quantize, Quantized};
pub use rgb565::{pack_rgb565, unpack_rgb565};

use crate::coverage::TileCoordinate;
use crate::error::ConversionError;

/// One derived artifact for a tile.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionResult {
    pub coord: TileCoordinate,
    pub format: OutputFormat,
    pub bytes: Vec<u8>,
}

impl ConversionResult {
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// File extension of the artifact on disk.
    pub fn extension(&self) -> &'static str {
        match self.format {
            OutputFormat::Raw => sniff_extension(&self.bytes),
            OutputFormat::Png8 => "png",
            OutputFormat::Rgb565 => "bin",
        }
    }
}

/// Produce every artifact in `formats` for one tile, in `raw, png8, rgb565` order.
pub fn convert(
    coord: TileCoordinate,
    raw: &[u8],
    formats: &FormatSet,
) -> Result<Vec<ConversionResult>, ConversionError> {
    let mut out = Vec::with_capacity(formats.len());
    if formats.contains(OutputFormat::Raw) {
        out.push(ConversionResult {
            coord,
            format: OutputFormat::Raw,
            bytes: raw.to_vec(),
        });
    }
    if !formats.needs_palette() {
        return Ok(out);
    }

    let img = decode_rgba(raw)?;
    let q = quantize(&img);
    if formats.contains(OutputFormat::Png8) {
        out.push(ConversionResult {
            coord,
            format: OutputFormat::Png8,
            bytes: encode_indexed(&q)?,
        });
    }
    if formats.contains(OutputFormat::Rgb565) {
        out.push(ConversionResult {
            coord,
            format: OutputFormat::Rgb565,
            bytes: rgb565::encode(&q),
        });
    }
    Ok(out)
}
