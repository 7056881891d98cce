//! Decode backend adapter.
//!
//! Two paths produce a [`DecodedFrame`]:
//! - the general path ([`DecodeBackend::decode_stream`]) sniffs the format
//!   from the bytes and reports only what the codec itself surfaces;
//! - the still-image path ([`DecodeBackend::decode_file`]) additionally
//!   probes the container for CICP transfer metadata and honours the
//!   caller's extension hint.
//!
//! Both classify every failure as a [`DecodeError`], which the loader turns
//! into the `LoadingFailed` state.
//!
//! With the `heif` feature, HEVC-coded HEIF files on the still-image path
//! decode through libheif at their coded bit depth.

#[cfg(feature = "heif")]
mod heif;

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use hdrload_core::metadata::Cicp;
use hdrload_core::{limits, ColorGamut, ColorTransfer, PixelFormat, RawImage};
use image::{ColorType, DynamicImage, ImageDecoder, ImageFormat, ImageReader};

use crate::container::{self, container_from_extension};
use crate::error::DecodeError;
use crate::jpeg;
use crate::metadata::{ContainerKind, PixelInfo};

/// Which decoding path produced a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodePath {
    /// Format sniffed from the stream; codec metadata only.
    General,
    /// File with extension hint; container probes ran.
    StillImage,
}

/// Output of a decode backend.
#[derive(Debug)]
pub struct DecodedFrame {
    /// Decoded primary image.
    pub bitmap: DynamicImage,
    /// Codec-native pixel layout of `bitmap`.
    pub pixel: PixelInfo,
    /// Embedded ICC profile.
    pub icc_profile: Option<Vec<u8>>,
    /// Container format.
    pub container: ContainerKind,
    /// Codec-reported CICP code points (still-image path only).
    pub cicp: Option<Cicp>,
    /// Path that produced this frame.
    pub path: DecodePath,
    /// The encoded bytes, kept for container heuristics.
    pub encoded: Arc<[u8]>,
}

/// Seam between the loader and an image codec.
pub trait DecodeBackend {
    /// Decode an in-memory stream, format sniffed from its content.
    fn decode_stream(&self, data: Arc<[u8]>) -> Result<DecodedFrame, DecodeError>;

    /// Decode a file, using `extension` when the content does not identify
    /// the format.
    fn decode_file(&self, path: &Path, extension: &str) -> Result<DecodedFrame, DecodeError>;
}

impl<B: DecodeBackend + ?Sized> DecodeBackend for Box<B> {
    fn decode_stream(&self, data: Arc<[u8]>) -> Result<DecodedFrame, DecodeError> {
        (**self).decode_stream(data)
    }

    fn decode_file(&self, path: &Path, extension: &str) -> Result<DecodedFrame, DecodeError> {
        (**self).decode_file(path, extension)
    }
}

/// Decode backend built on the `image` crate.
#[derive(Debug, Clone)]
pub struct ImageCodecBackend {
    limits: image::Limits,
}

impl ImageCodecBackend {
    /// Backend with limits derived from [`hdrload_core::limits`].
    pub fn new() -> Self {
        let mut codec_limits = image::Limits::default();
        codec_limits.max_image_width = Some(limits::MAX_IMAGE_DIMENSION);
        codec_limits.max_image_height = Some(limits::MAX_IMAGE_DIMENSION);
        Self {
            limits: codec_limits,
        }
    }

    /// Backend with caller-supplied codec limits.
    pub fn with_limits(limits: image::Limits) -> Self {
        Self { limits }
    }

    fn decode_with(
        &self,
        data: &[u8],
        hint: Option<ImageFormat>,
    ) -> Result<(DynamicImage, Option<Vec<u8>>, ImageFormat), DecodeError> {
        let mut reader = ImageReader::new(Cursor::new(data)).with_guessed_format()?;
        if reader.format().is_none() {
            if let Some(format) = hint {
                reader.set_format(format);
            }
        }
        let format = reader
            .format()
            .ok_or_else(|| DecodeError::CannotDecode("unrecognised image format".into()))?;
        reader.limits(self.limits.clone());

        let mut decoder = reader.into_decoder()?;
        let (width, height) = decoder.dimensions();
        if width as u64 * height as u64 > limits::MAX_TOTAL_PIXELS {
            return Err(DecodeError::CannotDecode(format!(
                "{}x{} exceeds the pixel limit",
                width, height
            )));
        }

        let icc_profile = match decoder.icc_profile() {
            Ok(profile) => profile,
            Err(e) => {
                log::warn!("ignoring unreadable ICC profile: {}", e);
                None
            }
        };
        let bitmap = DynamicImage::from_decoder(decoder)?;
        Ok((bitmap, icc_profile, format))
    }
}

impl Default for ImageCodecBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DecodeBackend for ImageCodecBackend {
    fn decode_stream(&self, data: Arc<[u8]>) -> Result<DecodedFrame, DecodeError> {
        let (bitmap, icc_profile, format) = self.decode_with(&data, None)?;
        let container = ContainerKind::from_format(format);
        let icc_profile = icc_profile.or_else(|| match container {
            ContainerKind::Jpeg => jpeg::extract_icc_profile(&jpeg::scan_segments(&data)),
            _ => None,
        });

        Ok(DecodedFrame {
            pixel: translate_pixel_format(bitmap.color())?,
            bitmap,
            icc_profile,
            container,
            cicp: None,
            path: DecodePath::General,
            encoded: data,
        })
    }

    fn decode_file(&self, path: &Path, extension: &str) -> Result<DecodedFrame, DecodeError> {
        let data: Arc<[u8]> = std::fs::read(path)?.into();
        let probe = container::probe(&data);
        let container = probe
            .container
            .or_else(|| container_from_extension(extension))
            .unwrap_or_default();

        if let Some(cicp) = probe.cicp {
            log::debug!(
                "{}: container reports CICP {}/{}/{}",
                path.display(),
                cicp.color_primaries,
                cicp.transfer_characteristics,
                cicp.matrix_coefficients
            );
        }
        if let Some(reason) = probe.undecodable {
            log::warn!("{}: {} payloads cannot be decoded", path.display(), reason);
            return Err(DecodeError::CannotDecode(format!("{} is not supported", reason)));
        }

        #[cfg(feature = "heif")]
        if container == ContainerKind::Heif {
            let (bitmap, pixel) = heif::decode_primary(&data)?;
            return Ok(DecodedFrame {
                bitmap,
                pixel,
                icc_profile: probe.icc_profile,
                container,
                cicp: probe.cicp,
                path: DecodePath::StillImage,
                encoded: data,
            });
        }

        let hint = ImageFormat::from_extension(extension.trim_start_matches('.'));
        let (bitmap, icc_profile, format) = self.decode_with(&data, hint)?;
        let container = match container {
            ContainerKind::Other => ContainerKind::from_format(format),
            known => known,
        };

        Ok(DecodedFrame {
            pixel: translate_pixel_format(bitmap.color())?,
            bitmap,
            icc_profile: icc_profile.or(probe.icc_profile),
            container,
            cicp: probe.cicp,
            path: DecodePath::StillImage,
            encoded: data,
        })
    }
}

/// Translate a codec color type into canonical pixel fields.
pub fn translate_pixel_format(color: ColorType) -> Result<PixelInfo, DecodeError> {
    let info = match color {
        ColorType::L8 => PixelInfo::new(8, 1, false),
        ColorType::La8 => PixelInfo::new(8, 2, false),
        ColorType::Rgb8 => PixelInfo::new(8, 3, false),
        ColorType::Rgba8 => PixelInfo::new(8, 4, false),
        ColorType::L16 => PixelInfo::new(16, 1, false),
        ColorType::La16 => PixelInfo::new(16, 2, false),
        ColorType::Rgb16 => PixelInfo::new(16, 3, false),
        ColorType::Rgba16 => PixelInfo::new(16, 4, false),
        ColorType::Rgb32F => PixelInfo::new(32, 3, true),
        ColorType::Rgba32F => PixelInfo::new(32, 4, true),
        other => {
            return Err(DecodeError::UnsupportedPixelFormat(format!("{:?}", other)));
        }
    };
    Ok(info)
}

/// Convert a decoded bitmap into the loader's RGBA storage.
///
/// Float sources become `Rgba32F`, sources deeper than 8 bits `Rgba16`,
/// everything else `Rgba8`. Wide samples are stored little-endian.
pub fn into_raw_image(
    bitmap: DynamicImage,
    pixel: PixelInfo,
    gamut: ColorGamut,
    transfer: ColorTransfer,
) -> Result<RawImage, DecodeError> {
    let (width, height) = (bitmap.width(), bitmap.height());

    let (format, data) = if pixel.is_float {
        let samples = bitmap.into_rgba32f().into_raw();
        (PixelFormat::Rgba32F, widen(&samples, f32::to_le_bytes)?)
    } else if pixel.bits_per_channel > 8 {
        let samples = bitmap.into_rgba16().into_raw();
        (PixelFormat::Rgba16, widen(&samples, u16::to_le_bytes)?)
    } else {
        (PixelFormat::Rgba8, bitmap.into_rgba8().into_raw())
    };

    Ok(RawImage::from_data(
        width, height, format, gamut, transfer, data,
    )?)
}

/// Serialize samples into bytes, reporting allocation failure.
fn widen<T: Copy, const N: usize>(
    samples: &[T],
    to_bytes: fn(T) -> [u8; N],
) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::new();
    out.try_reserve_exact(samples.len() * N)
        .map_err(|e| DecodeError::ResourceExhausted(e.to_string()))?;
    for &s in samples {
        out.extend_from_slice(&to_bytes(s));
    }
    Ok(out)
}
