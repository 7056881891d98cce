//! Image metadata model.
//!
//! [`ImageMetadata`] is a plain value describing a decoded image: pixel
//! layout, dynamic range classification and the color profile the renderer
//! should interpret the pixels with. It carries no behavior beyond small
//! constructors and predicates.

use std::sync::Arc;

use hdrload_core::metadata::Cicp;
use hdrload_core::{ColorGamut, ColorTransfer};

/// Dynamic range classification of a loaded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DynamicRange {
    /// Not classified; the metadata is invalid.
    #[default]
    Unknown,
    /// Standard dynamic range.
    Sdr,
    /// High dynamic range.
    Hdr,
}

/// Which classification route produced the dynamic range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HdrDetection {
    /// Embedded ICC profile matched the console HDR screen capture header.
    XboxScreenshot,
    /// Codec-reported transfer characteristics were PQ (HDR10).
    Hdr10Transfer,
    /// An SDR base carries an auxiliary gain map.
    GainMap,
    /// The embedded profile or codec metadata declared an HDR transfer.
    ProfileTransfer,
    /// Floating-point samples, interpreted as scene-linear HDR.
    FloatingPoint,
    /// No HDR signal was found.
    #[default]
    None,
}

/// Container format reported by the decode backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ContainerKind {
    /// JPEG / JFIF, including multi-picture JPEG.
    Jpeg,
    /// PNG.
    Png,
    /// TIFF.
    Tiff,
    /// HEIF with a non-AV1 primary item (usually HEVC).
    Heif,
    /// AVIF.
    Avif,
    /// Radiance RGBE (`.hdr`).
    Radiance,
    /// OpenEXR.
    OpenExr,
    /// DirectDraw Surface.
    Dds,
    /// Anything else the codec accepted.
    #[default]
    Other,
}

impl ContainerKind {
    /// Map a codec-detected format.
    pub fn from_format(format: image::ImageFormat) -> Self {
        match format {
            image::ImageFormat::Jpeg => ContainerKind::Jpeg,
            image::ImageFormat::Png => ContainerKind::Png,
            image::ImageFormat::Tiff => ContainerKind::Tiff,
            image::ImageFormat::Avif => ContainerKind::Avif,
            image::ImageFormat::Hdr => ContainerKind::Radiance,
            image::ImageFormat::OpenExr => ContainerKind::OpenExr,
            image::ImageFormat::Dds => ContainerKind::Dds,
            _ => ContainerKind::Other,
        }
    }
}

/// Canonical pixel layout of the codec's native output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PixelInfo {
    /// Bits per pixel across all channels.
    pub bits_per_pixel: u32,
    /// Bits per channel.
    pub bits_per_channel: u32,
    /// Channel count, including alpha.
    pub num_channels: u32,
    /// Floating-point rather than fixed-point channel storage.
    pub is_float: bool,
}

impl PixelInfo {
    pub(crate) const fn new(bits_per_channel: u32, num_channels: u32, is_float: bool) -> Self {
        Self {
            bits_per_pixel: bits_per_channel * num_channels,
            bits_per_channel,
            num_channels,
            is_float,
        }
    }
}

/// How the renderer should interpret the device-independent bitmap.
///
/// Shared read-only through `Arc` once exposed.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorProfile {
    /// Primaries of the bitmap's samples.
    pub gamut: ColorGamut,
    /// Transfer function of the bitmap's samples.
    pub transfer: ColorTransfer,
    /// Embedded ICC profile, when it was accepted.
    pub icc: Option<Arc<[u8]>>,
    /// Codec or profile CICP code points that informed the interpretation.
    pub cicp: Option<Cicp>,
}

impl ColorProfile {
    /// sRGB, the interpretation of untagged integer images.
    pub fn srgb() -> Self {
        Self {
            gamut: ColorGamut::Bt709,
            transfer: ColorTransfer::Srgb,
            icc: None,
            cicp: None,
        }
    }

    /// Linear BT.709 with 1.0 at SDR white (scRGB).
    pub fn scrgb() -> Self {
        Self {
            gamut: ColorGamut::Bt709,
            transfer: ColorTransfer::Linear,
            icc: None,
            cicp: None,
        }
    }

    /// PQ with BT.2100 primaries.
    pub fn hdr10() -> Self {
        Self {
            gamut: ColorGamut::Bt2100,
            transfer: ColorTransfer::Pq,
            icc: None,
            cicp: Some(Cicp::HDR10),
        }
    }

    /// Interpretation declared by CICP code points; unknown codes fall back
    /// to sRGB values.
    pub fn from_cicp(cicp: Cicp) -> Self {
        Self {
            gamut: cicp.gamut().unwrap_or_default(),
            transfer: cicp.transfer().unwrap_or_default(),
            icc: None,
            cicp: Some(cicp),
        }
    }

    /// Attach the raw embedded ICC profile.
    pub fn with_icc(mut self, icc: Arc<[u8]>) -> Self {
        self.icc = Some(icc);
        self
    }

    /// Returns true if the transfer function is PQ or HLG.
    pub fn is_hdr(&self) -> bool {
        self.transfer.is_hdr()
    }
}

impl Default for ColorProfile {
    fn default() -> Self {
        Self::srgb()
    }
}

/// Description of a loaded image.
///
/// When `is_valid` is false no other field is meaningful.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImageMetadata {
    /// Decode and classification succeeded.
    pub is_valid: bool,
    /// Primary image width.
    pub width: u32,
    /// Primary image height.
    pub height: u32,
    /// Codec-native pixel layout.
    pub pixel: PixelInfo,
    /// Container format.
    pub container: ContainerKind,
    /// Dynamic range classification.
    pub dynamic_range: DynamicRange,
    /// Which route produced `dynamic_range`.
    pub detection: HdrDetection,
    /// An auxiliary gain map was detected and retained.
    pub has_gain_map: bool,
    /// The file carried an ICC profile, whether or not it was accepted.
    pub has_embedded_profile: bool,
    /// Echo of [`ImageLoaderOptions::force_bt2100`](crate::ImageLoaderOptions).
    pub force_bt2100: bool,
    /// Color profile shared with the renderer.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub color_context: Option<Arc<ColorProfile>>,
}

impl ImageMetadata {
    /// The canonical record for an image that failed to load.
    pub fn invalid() -> Self {
        Self::default()
    }

    /// Returns true for a valid HDR classification.
    pub fn is_hdr(&self) -> bool {
        self.is_valid && self.dynamic_range == DynamicRange::Hdr
    }

    /// Bits per channel, for callers that only need the headline number.
    pub fn bits_per_channel(&self) -> u32 {
        self.pixel.bits_per_channel
    }
}
