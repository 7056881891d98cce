//! HEVC-coded HEIF pixels through libheif.
//!
//! The container probe has already read the primary item's `nclx` and ICC
//! properties; this only turns the coded image into a bitmap.

use hdrload_core::limits;
use image::{DynamicImage, ImageBuffer};
use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

use crate::error::DecodeError;
use crate::metadata::PixelInfo;

fn heif_error(err: libheif_rs::HeifError) -> DecodeError {
    DecodeError::CannotDecode(format!("HEIF: {}", err))
}

/// Decode the primary image of a HEIF file.
///
/// 8-bit sources decode to RGB(A)8. Deeper sources decode to RGB(A)16 with
/// samples scaled to the full `u16` range, and the returned [`PixelInfo`]
/// keeps the coded depth.
pub fn decode_primary(data: &[u8]) -> Result<(DynamicImage, PixelInfo), DecodeError> {
    let context = HeifContext::read_from_bytes(data).map_err(heif_error)?;
    let handle = context.primary_image_handle().map_err(heif_error)?;
    let (width, height) = (handle.width(), handle.height());
    if width as u64 * height as u64 > limits::MAX_TOTAL_PIXELS {
        return Err(DecodeError::CannotDecode(format!(
            "{}x{} exceeds the pixel limit",
            width, height
        )));
    }
    let alpha = handle.has_alpha_channel();
    let depth = u32::from(handle.luma_bits_per_pixel()).clamp(8, 16);
    let channels: u32 = if alpha { 4 } else { 3 };

    let chroma = match (depth > 8, alpha) {
        (false, false) => RgbChroma::Rgb,
        (false, true) => RgbChroma::Rgba,
        (true, false) => RgbChroma::HdrRgbLe,
        (true, true) => RgbChroma::HdrRgbaLe,
    };
    let image = LibHeif::new()
        .decode(&handle, ColorSpace::Rgb(chroma), None)
        .map_err(heif_error)?;
    let plane = image
        .planes()
        .interleaved
        .ok_or_else(|| DecodeError::CannotDecode("HEIF: no interleaved plane".into()))?;

    let row_samples = width as usize * channels as usize;
    let bitmap = if depth > 8 {
        let mut samples = Vec::new();
        samples
            .try_reserve_exact(row_samples * height as usize)
            .map_err(|e| DecodeError::ResourceExhausted(e.to_string()))?;
        for row in plane.data.chunks(plane.stride.max(1)).take(height as usize) {
            let row = row
                .get(..row_samples * 2)
                .ok_or_else(|| DecodeError::CannotDecode("HEIF: short row".into()))?;
            samples.extend(
                row.chunks_exact(2)
                    .map(|b| expand_to_u16(u16::from_le_bytes([b[0], b[1]]), depth)),
            );
        }
        if alpha {
            ImageBuffer::from_raw(width, height, samples).map(DynamicImage::ImageRgba16)
        } else {
            ImageBuffer::from_raw(width, height, samples).map(DynamicImage::ImageRgb16)
        }
    } else {
        let mut samples = Vec::new();
        samples
            .try_reserve_exact(row_samples * height as usize)
            .map_err(|e| DecodeError::ResourceExhausted(e.to_string()))?;
        for row in plane.data.chunks(plane.stride.max(1)).take(height as usize) {
            let row = row
                .get(..row_samples)
                .ok_or_else(|| DecodeError::CannotDecode("HEIF: short row".into()))?;
            samples.extend_from_slice(row);
        }
        if alpha {
            ImageBuffer::from_raw(width, height, samples).map(DynamicImage::ImageRgba8)
        } else {
            ImageBuffer::from_raw(width, height, samples).map(DynamicImage::ImageRgb8)
        }
    };
    let bitmap = bitmap
        .ok_or_else(|| DecodeError::CannotDecode("HEIF: plane smaller than image".into()))?;

    log::debug!("decoded {}x{} HEIF at {} bits", width, height, depth);
    Ok((bitmap, PixelInfo::new(depth, channels, false)))
}

/// Rescale a `depth`-bit code value to the full 16-bit range.
fn expand_to_u16(value: u16, depth: u32) -> u16 {
    if depth >= 16 {
        return value;
    }
    let max = (1u32 << depth) - 1;
    ((u32::from(value).min(max) * 65535 + max / 2) / max) as u16
}
