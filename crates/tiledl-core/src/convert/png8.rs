//! Palette quantisation and indexed PNG encoding.

use color_quant::NeuQuant;
use image::RgbaImage;
use std::collections::HashMap;

use crate::error::ConversionError;

/// NeuQuant sampling factor (1 = best, 30 = fastest). Fixed so output is
/// deterministic for identical input.
const SAMPLE_FACTOR: i32 = 10;
const MAX_COLORS: usize = 256;

/// An image reduced to at most 256 RGBA colours.
#[derive(Debug, Clone)]
pub struct Quantized {
    pub width: u32,
    pub height: u32,
    pub palette: Vec<[u8; 4]>,
    pub indices: Vec<u8>,
}

impl Quantized {
    /// RGBA value of pixel `i` (row-major).
    pub fn color_at(&self, i: usize) -> [u8; 4] {
        self.palette[self.indices[i] as usize]
    }

    fn has_alpha(&self) -> bool {
        self.palette.iter().any(|c| c[3] != u8::MAX)
    }
}

/// Exact palette when the image has at most 256 distinct colours (first-seen
/// order), otherwise NeuQuant.
pub fn quantize(img: &RgbaImage) -> Quantized {
    let (width, height) = img.dimensions();
    if let Some(q) = exact_palette(img) {
        return q;
    }
    let raw = img.as_raw();
    let nq = NeuQuant::new(SAMPLE_FACTOR, MAX_COLORS, raw);
    let palette: Vec<[u8; 4]> = nq
        .color_map_rgba()
        .chunks_exact(4)
        .map(|c| [c[0], c[1], c[2], c[3]])
        .collect();
    let indices = raw.chunks_exact(4).map(|px| nq.index_of(px) as u8).collect();
    Quantized {
        width,
        height,
        palette,
        indices,
    }
}

fn exact_palette(img: &RgbaImage) -> Option<Quantized> {
    let mut lookup: HashMap<[u8; 4], u8> = HashMap::new();
    let mut palette = Vec::new();
    let mut indices = Vec::with_capacity((img.width() * img.height()) as usize);
    for px in img.pixels() {
        let idx = match lookup.get(&px.0) {
            Some(&i) => i,
            None => {
                if palette.len() == MAX_COLORS {
                    return None;
                }
                let i = palette.len() as u8;
                palette.push(px.0);
                lookup.insert(px.0, i);
                i
            }
        };
        indices.push(idx);
    }
    Some(Quantized {
        width: img.width(),
        height: img.height(),
        palette,
        indices,
    })
}

/// Encode as an 8-bit indexed PNG, with a tRNS chunk when any entry is translucent.
pub fn encode_indexed(q: &Quantized) -> Result<Vec<u8>, ConversionError> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, q.width, q.height);
        encoder.set_color(png::ColorType::Indexed);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_compression(png::Compression::Best);
        encoder.set_filter(png::FilterType::NoFilter);
        let rgb: Vec<u8> = q.palette.iter().flat_map(|c| [c[0], c[1], c[2]]).collect();
        encoder.set_palette(rgb);
        if q.has_alpha() {
            let alpha: Vec<u8> = q.palette.iter().map(|c| c[3]).collect();
            encoder.set_trns(alpha);
        }
        let mut writer = encoder
            .write_header()
            .map_err(|e| ConversionError::Encode(e.to_string()))?;
        writer
            .write_image_data(&q.indices)
            .map_err(|e| ConversionError::Encode(e.to_string()))?;
        writer
            .finish()
            .map_err(|e| ConversionError::Encode(e.to_string()))?;
    }
    Ok(out)
}
