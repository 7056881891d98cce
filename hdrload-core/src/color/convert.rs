//! Conversion of stored pixels into the linear BT.709 working space.
//!
//! The working space is scRGB-style linear light: BT.709 primaries, 1.0 at
//! 80 nits / SDR reference white, values above 1.0 kept unclipped.

use alloc::format;
use alloc::vec::Vec;

use super::gamut::to_bt709_matrix;
use super::transfer::{to_scrgb, Scrgb16Lut, SrgbEotfLut};
use crate::types::{ColorGamut, ColorTransfer, Error, PixelFormat, RawImage, Result};

/// Decode `image` to linear-light `Rgba32F` in BT.709 primaries.
///
/// Alpha is carried through linearly.
pub fn to_linear_bt709(image: &RawImage) -> Result<RawImage> {
    let matrix = to_bt709_matrix(image.gamut);
    let pixel_count = image.width as usize * image.height as usize;
    let mut out = Vec::with_capacity(pixel_count * 16);

    let mut push = |rgb: [f32; 3], a: f32| {
        let rgb = matrix.transform(rgb);
        for v in [rgb[0], rgb[1], rgb[2], a] {
            out.extend_from_slice(&v.to_le_bytes());
        }
    };

    match image.format {
        PixelFormat::Rgba8 => {
            let srgb = SrgbEotfLut::new();
            let decode = |v: u8| match image.transfer {
                ColorTransfer::Srgb => srgb.lookup(v),
                other => to_scrgb(v as f32 / 255.0, other),
            };
            for y in 0..image.height {
                let row = row_bytes(image, y)?;
                for px in row.chunks_exact(4) {
                    push(
                        [decode(px[0]), decode(px[1]), decode(px[2])],
                        px[3] as f32 / 255.0,
                    );
                }
            }
        }
        PixelFormat::Rgba16 => {
            let lut = Scrgb16Lut::new(image.transfer);
            for y in 0..image.height {
                let row = row_bytes(image, y)?;
                for px in row.chunks_exact(8) {
                    let c = |i: usize| u16::from_le_bytes([px[i * 2], px[i * 2 + 1]]);
                    push(
                        [lut.lookup(c(0)), lut.lookup(c(1)), lut.lookup(c(2))],
                        c(3) as f32 / 65535.0,
                    );
                }
            }
        }
        PixelFormat::Rgba32F => {
            for y in 0..image.height {
                let row = row_bytes(image, y)?;
                for px in row.chunks_exact(16) {
                    let c = |i: usize| {
                        f32::from_le_bytes([px[i * 4], px[i * 4 + 1], px[i * 4 + 2], px[i * 4 + 3]])
                    };
                    push(
                        [
                            to_scrgb(c(0), image.transfer),
                            to_scrgb(c(1), image.transfer),
                            to_scrgb(c(2), image.transfer),
                        ],
                        c(3),
                    );
                }
            }
        }
        PixelFormat::Gray8 => return Err(Error::UnsupportedFormat(image.format)),
    }

    RawImage::from_data(
        image.width,
        image.height,
        PixelFormat::Rgba32F,
        ColorGamut::Bt709,
        ColorTransfer::Linear,
        out,
    )
}

fn row_bytes(image: &RawImage, y: u32) -> Result<&[u8]> {
    let start = y as usize * image.stride as usize;
    let len = image.width as usize * image.format.bytes_per_pixel();
    image.data.get(start..start + len).ok_or_else(|| {
        Error::InvalidPixelData(format!("row {} out of bounds ({} bytes)", y, image.data.len()))
    })
}
