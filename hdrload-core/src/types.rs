//! Core types shared by the loader and its heuristics.

use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use thiserror::Error;

use crate::limits;

/// Errors raised by codec-free parsing and pixel math.
///
/// These are data errors: they describe malformed or unsupported input,
/// never misuse of an API.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Image dimensions are invalid (zero or too large).
    #[error("invalid image dimensions: {0}x{1}")]
    InvalidDimensions(u32, u32),

    /// The pixel format is not supported for this operation.
    #[error("unsupported pixel format: {0:?}")]
    UnsupportedFormat(PixelFormat),

    /// Gain map metadata is invalid or malformed.
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    /// XMP metadata parsing failed.
    #[error("XMP parsing error: {0}")]
    XmpParse(String),

    /// Multi-Picture Format parsing failed.
    #[error("MPF parsing error: {0}")]
    MpfParse(String),

    /// ICC profile header or tag table is malformed.
    #[error("ICC profile error: {0}")]
    IccParse(String),

    /// Input exceeds safety limits.
    #[error("input exceeds safety limit: {0}")]
    LimitExceeded(String),

    /// Pixel data is invalid or corrupted.
    #[error("invalid pixel data: {0}")]
    InvalidPixelData(String),
}

/// Result type for codec-free operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Color gamut / color space primaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ColorGamut {
    /// BT.709 / sRGB primaries
    #[default]
    Bt709,
    /// Display P3 primaries
    DisplayP3,
    /// BT.2100 / BT.2020 primaries (wide gamut for HDR)
    Bt2100,
}

/// Electro-optical transfer function (EOTF/OETF).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ColorTransfer {
    /// sRGB transfer function (gamma ~2.2)
    #[default]
    Srgb,
    /// Linear (gamma 1.0)
    Linear,
    /// Perceptual Quantizer (SMPTE ST 2084) - HDR
    Pq,
    /// Hybrid Log-Gamma (ITU-R BT.2100) - HDR
    Hlg,
}

impl ColorTransfer {
    /// Returns true for transfer functions that encode luminance above SDR white.
    pub fn is_hdr(&self) -> bool {
        matches!(self, Self::Pq | Self::Hlg)
    }
}

/// Pixel layout of a [`RawImage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PixelFormat {
    /// 8-bit RGBA
    Rgba8,
    /// 16-bit RGBA, little-endian `u16` per channel
    Rgba16,
    /// 32-bit float RGBA, little-endian `f32` per channel
    Rgba32F,
    /// 8-bit grayscale (gain maps)
    Gray8,
}

impl PixelFormat {
    /// Returns the number of bytes per pixel.
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Rgba8 => 4,
            Self::Rgba16 => 8,
            Self::Rgba32F => 16,
            Self::Gray8 => 1,
        }
    }
}

/// An uncompressed, tightly packed image.
#[derive(Debug, Clone, PartialEq)]
pub struct RawImage {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Pixel format.
    pub format: PixelFormat,
    /// Color gamut.
    pub gamut: ColorGamut,
    /// Transfer function.
    pub transfer: ColorTransfer,
    /// Pixel data (layout depends on format).
    pub data: Vec<u8>,
    /// Row stride in bytes.
    pub stride: u32,
}

impl RawImage {
    /// Create a zero-filled image with the given dimensions and format.
    ///
    /// Returns an error if dimensions exceed safety limits.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Result<Self> {
        validate_dimensions(width, height)?;
        let stride = row_stride(width, format)?;
        let data_size = data_size(height, stride)?;

        Ok(Self {
            width,
            height,
            format,
            gamut: ColorGamut::default(),
            transfer: ColorTransfer::default(),
            data: vec![0u8; data_size],
            stride,
        })
    }

    /// Create an image from existing pixel data.
    pub fn from_data(
        width: u32,
        height: u32,
        format: PixelFormat,
        gamut: ColorGamut,
        transfer: ColorTransfer,
        data: Vec<u8>,
    ) -> Result<Self> {
        validate_dimensions(width, height)?;
        let stride = row_stride(width, format)?;

        let expected_size = data_size(height, stride)?;
        if data.len() < expected_size {
            return Err(Error::InvalidPixelData(format!(
                "data too small: expected at least {} bytes, got {}",
                expected_size,
                data.len()
            )));
        }

        Ok(Self {
            width,
            height,
            format,
            gamut,
            transfer,
            data,
            stride,
        })
    }

    /// Read the RGBA channels of one pixel of an `Rgba32F` image.
    #[inline]
    pub fn pixel_f32(&self, x: u32, y: u32) -> [f32; 4] {
        debug_assert_eq!(self.format, PixelFormat::Rgba32F);
        let idx = (y * self.stride + x * 16) as usize;
        let mut out = [0.0f32; 4];
        for (c, v) in out.iter_mut().enumerate() {
            let at = idx + c * 4;
            *v = f32::from_le_bytes([
                self.data[at],
                self.data[at + 1],
                self.data[at + 2],
                self.data[at + 3],
            ]);
        }
        out
    }

    /// Write the RGBA channels of one pixel of an `Rgba32F` image.
    #[inline]
    pub fn set_pixel_f32(&mut self, x: u32, y: u32, rgba: [f32; 4]) {
        debug_assert_eq!(self.format, PixelFormat::Rgba32F);
        let idx = (y * self.stride + x * 16) as usize;
        for (c, v) in rgba.iter().enumerate() {
            let at = idx + c * 4;
            self.data[at..at + 4].copy_from_slice(&v.to_le_bytes());
        }
    }
}

/// Validate dimensions against safety limits.
pub(crate) fn validate_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidDimensions(width, height));
    }

    if width > limits::MAX_IMAGE_DIMENSION || height > limits::MAX_IMAGE_DIMENSION {
        return Err(Error::LimitExceeded(format!(
            "dimension {} exceeds maximum {}",
            width.max(height),
            limits::MAX_IMAGE_DIMENSION
        )));
    }

    let total_pixels = width as u64 * height as u64;
    if total_pixels > limits::MAX_TOTAL_PIXELS {
        return Err(Error::LimitExceeded(format!(
            "total pixels {} exceeds maximum {}",
            total_pixels,
            limits::MAX_TOTAL_PIXELS
        )));
    }

    Ok(())
}

fn row_stride(width: u32, format: PixelFormat) -> Result<u32> {
    width
        .checked_mul(format.bytes_per_pixel() as u32)
        .ok_or_else(|| Error::LimitExceeded(format!("stride overflow: {}x{:?}", width, format)))
}

fn data_size(height: u32, stride: u32) -> Result<usize> {
    let size = (height as u64) * (stride as u64);
    usize::try_from(size)
        .map_err(|_| Error::LimitExceeded(format!("data size {} exceeds address space", size)))
}

/// A gain map image (8-bit grayscale or per-channel).
#[derive(Debug, Clone, PartialEq)]
pub struct GainMap {
    /// Width of the gain map (may be smaller than base image).
    pub width: u32,
    /// Height of the gain map.
    pub height: u32,
    /// Number of channels (1 for luminance-only, 3 for per-channel RGB).
    pub channels: u8,
    /// Pixel data (u8 values 0-255).
    pub data: Vec<u8>,
}

impl GainMap {
    /// Create a new single-channel gain map.
    ///
    /// Returns an error if dimensions exceed safety limits.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        validate_dimensions(width, height)?;

        let size = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| Error::LimitExceeded("gain map size overflow".into()))?;

        Ok(Self {
            width,
            height,
            channels: 1,
            data: vec![0u8; size],
        })
    }

    /// Wrap decoded gain map samples, checking the buffer length.
    pub fn from_data(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Result<Self> {
        validate_dimensions(width, height)?;
        if channels != 1 && channels != 3 {
            return Err(Error::InvalidPixelData(format!(
                "gain map must have 1 or 3 channels, got {}",
                channels
            )));
        }

        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(Error::InvalidPixelData(format!(
                "gain map data is {} bytes, expected {}",
                data.len(),
                expected
            )));
        }

        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }
}

/// Adobe/Google `hdrgm` gain map metadata (linear scale values).
#[derive(Debug, Clone, PartialEq)]
pub struct GainMapMetadata {
    /// Maximum content boost per channel (HDR/SDR ratio).
    pub max_content_boost: [f32; 3],

    /// Minimum content boost per channel.
    pub min_content_boost: [f32; 3],

    /// Gamma applied to the gain map encoding.
    pub gamma: [f32; 3],

    /// Offset added to SDR values before gain computation.
    pub offset_sdr: [f32; 3],

    /// Offset added to HDR values before gain computation.
    pub offset_hdr: [f32; 3],

    /// Minimum display boost for full gain map effect.
    pub hdr_capacity_min: f32,

    /// Maximum display boost for full gain map effect.
    pub hdr_capacity_max: f32,

    /// Whether the base rendition is the HDR one (unsupported when true).
    pub base_rendition_is_hdr: bool,
}

impl Default for GainMapMetadata {
    fn default() -> Self {
        Self::new()
    }
}

impl GainMapMetadata {
    /// Create metadata with the `hdrgm` defaults.
    pub fn new() -> Self {
        Self {
            max_content_boost: [1.0; 3],
            min_content_boost: [1.0; 3],
            gamma: [1.0; 3],
            offset_sdr: [1.0 / 64.0; 3],
            offset_hdr: [1.0 / 64.0; 3],
            hdr_capacity_min: 1.0,
            hdr_capacity_max: 1.0,
            base_rendition_is_hdr: false,
        }
    }

    /// Validate metadata values are within reasonable bounds.
    pub fn validate(&self) -> Result<()> {
        for i in 0..3 {
            if !self.max_content_boost[i].is_finite() || self.max_content_boost[i] <= 0.0 {
                return Err(Error::InvalidMetadata(format!(
                    "max_content_boost[{}] must be positive finite",
                    i
                )));
            }
            if !self.min_content_boost[i].is_finite() || self.min_content_boost[i] <= 0.0 {
                return Err(Error::InvalidMetadata(format!(
                    "min_content_boost[{}] must be positive finite",
                    i
                )));
            }
            if !self.gamma[i].is_finite() || self.gamma[i] <= 0.0 {
                return Err(Error::InvalidMetadata(format!(
                    "gamma[{}] must be positive finite",
                    i
                )));
            }
            if !self.offset_sdr[i].is_finite() || !self.offset_hdr[i].is_finite() {
                return Err(Error::InvalidMetadata(format!(
                    "offsets[{}] must be finite",
                    i
                )));
            }
            if self.min_content_boost[i] > self.max_content_boost[i] {
                return Err(Error::InvalidMetadata(format!(
                    "min_content_boost[{}] ({}) > max_content_boost[{}] ({})",
                    i, self.min_content_boost[i], i, self.max_content_boost[i]
                )));
            }
        }

        if !self.hdr_capacity_min.is_finite() || self.hdr_capacity_min < 0.0 {
            return Err(Error::InvalidMetadata(
                "hdr_capacity_min must be non-negative finite".into(),
            ));
        }
        if !self.hdr_capacity_max.is_finite() || self.hdr_capacity_max < 1.0 {
            return Err(Error::InvalidMetadata(
                "hdr_capacity_max must be >= 1.0".into(),
            ));
        }
        if self.base_rendition_is_hdr {
            return Err(Error::InvalidMetadata(
                "HDR base renditions are not supported".into(),
            ));
        }

        Ok(())
    }
}

/// How a detected gain map encodes the HDR/SDR ratio.
#[derive(Debug, Clone, PartialEq)]
pub enum GainMapEncoding {
    /// Adobe/Google `hdrgm` logarithmic encoding.
    Adaptive(GainMapMetadata),
    /// Apple auxiliary HDR gain map: `scale = 1 + (headroom - 1) * gain`.
    Apple {
        /// Display headroom the gain map was authored for (linear, >= 1).
        headroom: f32,
    },
}

impl GainMapEncoding {
    /// Headroom used when an Apple gain map carries no explicit value.
    pub const APPLE_DEFAULT_HEADROOM: f32 = 4.0;

    /// Validate the encoding parameters.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Adaptive(metadata) => metadata.validate(),
            Self::Apple { headroom } => {
                if !headroom.is_finite() || *headroom < 1.0 {
                    return Err(Error::InvalidMetadata(format!(
                        "Apple gain map headroom must be >= 1.0, got {}",
                        headroom
                    )));
                }
                Ok(())
            }
        }
    }

    /// Peak boost over SDR white this encoding can express.
    pub fn peak_boost(&self) -> f32 {
        match self {
            Self::Adaptive(metadata) => metadata.hdr_capacity_max,
            Self::Apple { headroom } => *headroom,
        }
    }
}

/// Reference display luminance values (in nits).
pub mod luminance {
    /// scRGB reference: linear 1.0 equals this luminance.
    pub const SCRGB_WHITE_NITS: f32 = 80.0;

    /// PQ peak luminance
    pub const PQ_PEAK_NITS: f32 = 10000.0;
}
