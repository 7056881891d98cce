//! Gain map application for HDR reconstruction.

use alloc::boxed::Box;
use alloc::format;

use crate::color::convert::to_linear_bt709;
use crate::color::transfer::srgb_eotf;
use crate::types::{
    ColorGamut, ColorTransfer, Error, GainMap, GainMapEncoding, GainMapMetadata, PixelFormat,
    RawImage, Result,
};

/// Precomputed lookup table for gain map decoding.
///
/// Maps each 8-bit gain map sample to a linear multiplier so composition
/// does no transcendental math per pixel.
pub struct GainMapLut {
    /// 256 entries per channel. Layout: [R0..R255, G0..G255, B0..B255]
    table: Box<[f32; 256 * 3]>,
    offset_sdr: [f32; 3],
    offset_hdr: [f32; 3],
}

impl GainMapLut {
    /// Build the table for a gain map encoding at full HDR capacity.
    pub fn new(encoding: &GainMapEncoding) -> Self {
        match encoding {
            GainMapEncoding::Adaptive(metadata) => Self::adaptive(metadata),
            GainMapEncoding::Apple { headroom } => Self::apple(*headroom),
        }
    }

    fn adaptive(metadata: &GainMapMetadata) -> Self {
        let mut table = Box::new([0.0f32; 256 * 3]);

        for channel in 0..3 {
            let gamma = metadata.gamma[channel];
            let log_min = metadata.min_content_boost[channel].ln();
            let log_max = metadata.max_content_boost[channel].ln();
            let log_range = log_max - log_min;

            for i in 0..256 {
                let normalized = i as f32 / 255.0;
                let recovered = if gamma != 1.0 {
                    normalized.powf(1.0 / gamma)
                } else {
                    normalized
                };
                table[channel * 256 + i] = (log_min + recovered * log_range).exp();
            }
        }

        Self {
            table,
            offset_sdr: metadata.offset_sdr,
            offset_hdr: metadata.offset_hdr,
        }
    }

    fn apple(headroom: f32) -> Self {
        let mut table = Box::new([0.0f32; 256 * 3]);

        // Apple gain maps are stored with the sRGB curve.
        for i in 0..256 {
            let gain = 1.0 + (headroom - 1.0) * srgb_eotf(i as f32 / 255.0);
            for channel in 0..3 {
                table[channel * 256 + i] = gain;
            }
        }

        Self {
            table,
            offset_sdr: [0.0; 3],
            offset_hdr: [0.0; 3],
        }
    }

    /// Look up the gain multiplier for a single channel.
    #[inline(always)]
    pub fn lookup(&self, byte_value: u8, channel: usize) -> f32 {
        debug_assert!(channel < 3);
        self.table[channel * 256 + byte_value as usize]
    }

    /// Apply gain to a linear SDR pixel.
    #[inline(always)]
    fn apply(&self, sdr: [f32; 3], gain: [f32; 3]) -> [f32; 3] {
        [
            (sdr[0] + self.offset_sdr[0]) * gain[0] - self.offset_hdr[0],
            (sdr[1] + self.offset_sdr[1]) * gain[1] - self.offset_hdr[1],
            (sdr[2] + self.offset_sdr[2]) * gain[2] - self.offset_hdr[2],
        ]
    }
}

/// Output resolution for a composed HDR image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompositionTarget {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
}

impl CompositionTarget {
    /// Compose at the base image's own resolution.
    pub fn full(base: &RawImage) -> Self {
        Self {
            width: base.width,
            height: base.height,
        }
    }

    /// Compose for a viewport zoom factor.
    ///
    /// Zoom is clamped to `[1 / max(width, height), 1.0]`: composing above
    /// native resolution adds nothing, and the output never drops below one
    /// pixel on its long edge. Each dimension rounds up.
    pub fn scaled(base: &RawImage, zoom: f32) -> Self {
        Self::for_dimensions(base.width, base.height, zoom)
    }

    /// Same as [`CompositionTarget::scaled`] without needing the pixel data.
    pub fn for_dimensions(width: u32, height: u32, zoom: f32) -> Self {
        let long_edge = width.max(height).max(1) as f32;
        let zoom = if zoom.is_finite() { zoom } else { 1.0 };
        let zoom = zoom.clamp(1.0 / long_edge, 1.0);
        let scale = |dim: u32| ((dim as f32 * zoom).ceil() as u32).clamp(1, dim.max(1));
        Self {
            width: scale(width),
            height: scale(height),
        }
    }
}

/// Compose an SDR base with its gain map into linear HDR.
///
/// The base is decoded into the linear BT.709 working space first unless it
/// already is. Output is `Rgba32F`, linear, BT.709, 1.0 = SDR white, at the
/// target resolution; both inputs are bilinearly resampled to it. Alpha is
/// taken from the base.
pub fn compose_gainmap(
    base: &RawImage,
    gainmap: &GainMap,
    encoding: &GainMapEncoding,
    target: CompositionTarget,
) -> Result<RawImage> {
    encoding.validate()?;
    if target.width == 0 || target.height == 0 {
        return Err(Error::InvalidDimensions(target.width, target.height));
    }
    let expected = gainmap.width as usize * gainmap.height as usize * gainmap.channels as usize;
    if gainmap.data.len() < expected {
        return Err(Error::InvalidPixelData(format!(
            "gain map data is {} bytes, expected {}",
            gainmap.data.len(),
            expected
        )));
    }

    let converted;
    let linear = if is_working_space(base) {
        base
    } else {
        converted = to_linear_bt709(base)?;
        &converted
    };

    let lut = GainMapLut::new(encoding);
    let mut output = RawImage::new(target.width, target.height, PixelFormat::Rgba32F)?;
    output.gamut = ColorGamut::Bt709;
    output.transfer = ColorTransfer::Linear;

    for y in 0..target.height {
        for x in 0..target.width {
            let sdr = sample_base(linear, x, y, target);
            let gain = sample_gainmap_lut(gainmap, &lut, x, y, target);
            let hdr = lut.apply([sdr[0], sdr[1], sdr[2]], gain);
            output.set_pixel_f32(x, y, [hdr[0], hdr[1], hdr[2], sdr[3]]);
        }
    }

    Ok(output)
}

fn is_working_space(image: &RawImage) -> bool {
    image.format == PixelFormat::Rgba32F
        && image.transfer == ColorTransfer::Linear
        && image.gamut == ColorGamut::Bt709
}

/// Source coordinate and weights for a pixel-center aligned resample.
#[inline(always)]
fn source_coord(dst: u32, dst_len: u32, src_len: u32) -> (u32, u32, f32) {
    let s = ((dst as f32 + 0.5) * src_len as f32 / dst_len as f32 - 0.5).max(0.0);
    let i0 = (s.floor() as u32).min(src_len - 1);
    let i1 = (i0 + 1).min(src_len - 1);
    (i0, i1, s - s.floor())
}

/// Bilinear interpolation.
#[inline(always)]
fn bilinear(v00: f32, v10: f32, v01: f32, v11: f32, fx: f32, fy: f32) -> f32 {
    let top = v00 * (1.0 - fx) + v10 * fx;
    let bottom = v01 * (1.0 - fx) + v11 * fx;
    top * (1.0 - fy) + bottom * fy
}

fn sample_base(base: &RawImage, x: u32, y: u32, target: CompositionTarget) -> [f32; 4] {
    if base.width == target.width && base.height == target.height {
        return base.pixel_f32(x, y);
    }

    let (x0, x1, fx) = source_coord(x, target.width, base.width);
    let (y0, y1, fy) = source_coord(y, target.height, base.height);
    let p00 = base.pixel_f32(x0, y0);
    let p10 = base.pixel_f32(x1, y0);
    let p01 = base.pixel_f32(x0, y1);
    let p11 = base.pixel_f32(x1, y1);

    let mut out = [0.0f32; 4];
    for (c, v) in out.iter_mut().enumerate() {
        *v = bilinear(p00[c], p10[c], p01[c], p11[c], fx, fy);
    }
    out
}

/// Sample the gain map at an output pixel, looking gains up before interpolating.
#[inline]
#[allow(clippy::needless_range_loop)] // c is both index and channel
fn sample_gainmap_lut(
    gainmap: &GainMap,
    lut: &GainMapLut,
    x: u32,
    y: u32,
    target: CompositionTarget,
) -> [f32; 3] {
    let (x0, x1, fx) = source_coord(x, target.width, gainmap.width);
    let (y0, y1, fy) = source_coord(y, target.height, gainmap.height);
    let w = gainmap.width;

    if gainmap.channels == 1 {
        let g00 = lut.lookup(gainmap.data[(y0 * w + x0) as usize], 0);
        let g10 = lut.lookup(gainmap.data[(y0 * w + x1) as usize], 0);
        let g01 = lut.lookup(gainmap.data[(y1 * w + x0) as usize], 0);
        let g11 = lut.lookup(gainmap.data[(y1 * w + x1) as usize], 0);

        let gain = bilinear(g00, g10, g01, g11, fx, fy);
        [gain, gain, gain]
    } else {
        let mut gains = [0.0f32; 3];
        for c in 0..3 {
            let g00 = lut.lookup(gainmap.data[(y0 * w + x0) as usize * 3 + c], c);
            let g10 = lut.lookup(gainmap.data[(y0 * w + x1) as usize * 3 + c], c);
            let g01 = lut.lookup(gainmap.data[(y1 * w + x0) as usize * 3 + c], c);
            let g11 = lut.lookup(gainmap.data[(y1 * w + x1) as usize * 3 + c], c);

            gains[c] = bilinear(g00, g10, g01, g11, fx, fy);
        }
        gains
    }
}
