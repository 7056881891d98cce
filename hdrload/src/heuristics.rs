//! HDR classification heuristics.
//!
//! Run against a decoded frame in fixed order; the first match wins:
//!
//! 1. Console HDR screen capture, recognised by its embedded ICC header.
//! 2. HDR10: the still-image path reported a PQ transfer.
//! 3. Vendor gain map appended to an SDR JPEG.
//!
//! With no match, an HDR transfer in the embedded profile still classifies
//! the image as HDR, then floating-point samples do. Everything else is SDR.

use std::sync::Arc;

use hdrload_core::metadata::mpf::{find_jpeg_boundaries, parse_mpf};
use hdrload_core::metadata::xmp::gain_map_encoding;
use hdrload_core::metadata::{parse_icc, Cicp, IccHeaderSignature};
use hdrload_core::{GainMap, GainMapEncoding};
use image::{ColorType, ImageFormat};

use crate::decode::{DecodePath, DecodedFrame};
use crate::error::DecodeError;
use crate::jpeg;
use crate::metadata::{ColorProfile, ContainerKind, DynamicRange, HdrDetection};

/// A gain map retained alongside its SDR base.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedGainMap {
    /// Decoded gain map samples.
    pub gain_map: GainMap,
    /// How the samples map to a boost.
    pub encoding: GainMapEncoding,
}

/// Result of classifying a frame.
#[derive(Debug, Clone)]
pub struct Classification {
    /// Dynamic range of the image.
    pub dynamic_range: DynamicRange,
    /// Route that produced the dynamic range.
    pub detection: HdrDetection,
    /// How the device-independent bitmap is to be interpreted.
    pub profile: ColorProfile,
    /// Gain map, when one was detected.
    pub gain_map: Option<DetectedGainMap>,
}

impl Classification {
    fn hdr(detection: HdrDetection, profile: ColorProfile) -> Self {
        Self {
            dynamic_range: DynamicRange::Hdr,
            detection,
            profile,
            gain_map: None,
        }
    }
}

/// Classify a decoded frame.
///
/// `console_capture` identifies the embedded profile of console HDR screen
/// captures. Fails only when a detected gain map is unusable.
pub fn classify(
    frame: &DecodedFrame,
    console_capture: &IccHeaderSignature,
) -> Result<Classification, DecodeError> {
    let icc: Option<Arc<[u8]>> = frame.icc_profile.as_deref().map(Arc::from);

    if let Some(profile) = icc.as_ref().filter(|p| console_capture.matches(p)) {
        log::debug!("embedded profile matches the console HDR capture header");
        return Ok(Classification::hdr(
            HdrDetection::XboxScreenshot,
            ColorProfile::hdr10().with_icc(Arc::clone(profile)),
        ));
    }

    if let Some(cicp) = hdr10_transfer(frame) {
        log::debug!("codec reports PQ transfer (primaries {})", cicp.color_primaries);
        return Ok(Classification::hdr(
            HdrDetection::Hdr10Transfer,
            ColorProfile::from_cicp(cicp),
        ));
    }

    if frame.container == ContainerKind::Jpeg {
        if let Some(gain_map) = detect_gain_map(&frame.encoded)? {
            log::debug!(
                "gain map {}x{} ({} channel), peak boost {:.2}",
                gain_map.gain_map.width,
                gain_map.gain_map.height,
                gain_map.gain_map.channels,
                gain_map.encoding.peak_boost()
            );
            let mut classification =
                Classification::hdr(HdrDetection::GainMap, embedded_profile(icc, None));
            classification.gain_map = Some(gain_map);
            return Ok(classification);
        }
    }

    let profile = embedded_profile(icc, frame.cicp);
    if profile.is_hdr() {
        log::debug!("embedded profile declares {:?}", profile.transfer);
        return Ok(Classification::hdr(HdrDetection::ProfileTransfer, profile));
    }

    if frame.pixel.is_float {
        let profile = match profile.icc {
            Some(icc) => ColorProfile::scrgb().with_icc(icc),
            None => ColorProfile::scrgb(),
        };
        return Ok(Classification::hdr(HdrDetection::FloatingPoint, profile));
    }

    Ok(Classification {
        dynamic_range: DynamicRange::Sdr,
        detection: HdrDetection::None,
        profile,
        gain_map: None,
    })
}

/// PQ transfer reported by the still-image codec path.
pub fn hdr10_transfer(frame: &DecodedFrame) -> Option<Cicp> {
    if frame.path != DecodePath::StillImage {
        return None;
    }
    frame.cicp.filter(Cicp::is_pq)
}

/// Interpretation from codec CICP or the embedded ICC profile.
///
/// A profile that fails validation is dropped with a warning and the
/// image is treated as sRGB.
fn embedded_profile(icc: Option<Arc<[u8]>>, cicp: Option<Cicp>) -> ColorProfile {
    let accepted = icc.and_then(|bytes| match parse_icc(&bytes) {
        Ok(parsed) => Some((bytes, parsed.cicp)),
        Err(e) => {
            log::warn!("ignoring embedded ICC profile: {}", e);
            None
        }
    });

    let (icc, icc_cicp) = match accepted {
        Some((bytes, cicp)) => (Some(bytes), cicp),
        None => (None, None),
    };
    let mut profile = match cicp.or(icc_cicp) {
        Some(cicp) => ColorProfile::from_cicp(cicp),
        None => ColorProfile::srgb(),
    };
    profile.icc = icc;
    profile
}

/// Find and decode a gain map appended to a JPEG.
///
/// Candidates come from the MPF directory; without a usable directory the
/// stream is scanned for concatenated JPEGs, and those are only accepted
/// when their own XMP names them as a gain map.
pub fn detect_gain_map(encoded: &[u8]) -> Result<Option<DetectedGainMap>, DecodeError> {
    if !jpeg::is_jpeg(encoded) {
        return Ok(None);
    }
    let primary_xmp = jpeg::find_xmp(&jpeg::scan_segments(encoded));

    let (candidates, from_mpf) = match parse_mpf(encoded) {
        Ok(entries) if entries.len() > 1 => {
            let ranges: Vec<_> = entries[1..]
                .iter()
                .filter_map(|entry| entry.range(encoded.len()))
                .collect();
            (ranges, true)
        }
        result => {
            if let Err(e) = result {
                log::debug!("no usable MPF directory: {}", e);
            }
            let ranges: Vec<_> = find_jpeg_boundaries(encoded)
                .into_iter()
                .skip(1)
                .map(|(start, end)| start..end)
                .collect();
            (ranges, false)
        }
    };

    for range in candidates {
        let secondary = &encoded[range.clone()];
        let secondary_xmp = jpeg::find_xmp(&jpeg::scan_segments(secondary));
        let fallback_xmp = if from_mpf { primary_xmp.as_deref() } else { None };

        let encoding = gain_map_encoding(secondary_xmp.as_deref(), fallback_xmp)
            .map_err(|e| DecodeError::GainMap(e.to_string()))?;
        let Some(encoding) = encoding else {
            log::trace!("secondary image at {} is not a gain map", range.start);
            continue;
        };

        encoding
            .validate()
            .map_err(|e| DecodeError::GainMap(e.to_string()))?;
        let gain_map = decode_gain_map(secondary)?;
        return Ok(Some(DetectedGainMap { gain_map, encoding }));
    }

    Ok(None)
}

fn decode_gain_map(jpeg: &[u8]) -> Result<GainMap, DecodeError> {
    let image = image::load_from_memory_with_format(jpeg, ImageFormat::Jpeg)
        .map_err(|e| DecodeError::GainMap(format!("gain map image: {}", e)))?;
    let (width, height) = (image.width(), image.height());

    let (channels, data) = match image.color() {
        ColorType::L8 | ColorType::L16 | ColorType::La8 | ColorType::La16 => {
            (1, image.into_luma8().into_raw())
        }
        _ => (3, image.into_rgb8().into_raw()),
    };
    GainMap::from_data(width, height, channels, data).map_err(|e| DecodeError::GainMap(e.to_string()))
}
