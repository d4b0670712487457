//! Source tile decoding with colour-depth checks.

use image::{ColorType, ImageFormat, RgbaImage};
use std::io::Cursor;

use crate::error::ConversionError;

/// File extension for raw passthrough, from the leading magic bytes.
pub fn sniff_extension(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => "png",
        Ok(ImageFormat::Jpeg) => "jpg",
        Ok(ImageFormat::WebP) => "webp",
        _ => "bin",
    }
}

/// PNG sources that are already indexed or carry 16-bit samples are refused
/// rather than silently re-interpreted.
fn check_png_header(bytes: &[u8]) -> Result<(), ConversionError> {
    let decoder = png::Decoder::new(Cursor::new(bytes));
    let reader = decoder
        .read_info()
        .map_err(|e| ConversionError::Decode(e.to_string()))?;
    let info = reader.info();
    if info.color_type == png::ColorType::Indexed {
        return Err(ConversionError::UnsupportedColorDepth(
            "source PNG is already palette-indexed".into(),
        ));
    }
    if info.bit_depth == png::BitDepth::Sixteen {
        return Err(ConversionError::UnsupportedColorDepth(
            "source PNG has 16-bit channels".into(),
        ));
    }
    Ok(())
}

/// Decode a PNG, JPEG or WebP tile into 8-bit RGBA.
pub fn decode_rgba(bytes: &[u8]) -> Result<RgbaImage, ConversionError> {
    let format = image::guess_format(bytes)
        .map_err(|_| ConversionError::Decode("unrecognised image format".into()))?;
    if format == ImageFormat::Png {
        check_png_header(bytes)?;
    }
    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| ConversionError::Decode(e.to_string()))?;
    match img.color() {
        ColorType::L8 | ColorType::La8 | ColorType::Rgb8 | ColorType::Rgba8 => Ok(img.into_rgba8()),
        other => Err(ConversionError::UnsupportedColorDepth(format!("{other:?}"))),
    }
}
