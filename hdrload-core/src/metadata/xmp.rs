//! XMP gain map metadata.
//!
//! Two vendor encodings are recognised:
//! - the Adobe/Google HDR Gain Map namespace (`hdrgm`), and
//! - Apple's auxiliary HDR gain map (`HDRGainMap`), which marks the
//!   secondary image with an auxiliary-image URN.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::limits;
use crate::types::{Error, GainMapEncoding, GainMapMetadata, Result};

/// XMP namespace for HDR gain map metadata.
pub const HDRGM_NAMESPACE: &str = "http://ns.adobe.com/hdr-gain-map/1.0/";

/// Auxiliary image type URN Apple writes on HDR gain map images.
pub const APPLE_GAIN_MAP_URN: &str = "urn:com:apple:photo:2020:aux:hdrgainmap";

/// XMP namespace of Apple's gain map properties.
pub const APPLE_HDR_GAIN_MAP_NAMESPACE: &str = "http://ns.apple.com/HDRGainMap/1.0/";

/// Identifier prefix of an XMP APP1 segment.
pub const XMP_APP1_IDENTIFIER: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";

/// Returns true if the packet carries `hdrgm` gain map properties.
pub fn has_hdrgm(xmp: &str) -> bool {
    xmp.contains("hdrgm:Version") || xmp.contains("hdrgm:GainMapMax")
}

/// Returns true if the packet marks an Apple HDR gain map image.
pub fn is_apple_gain_map(xmp: &str) -> bool {
    xmp.contains(APPLE_GAIN_MAP_URN) || xmp.contains("HDRGainMap:HDRGainMapVersion")
}

/// Parse `hdrgm` metadata from an XMP packet.
///
/// Returns the metadata (linear values) and the gain map length advertised in
/// the container directory, if any.
pub fn parse_xmp(xmp_data: &str) -> Result<(GainMapMetadata, Option<usize>)> {
    if xmp_data.len() > limits::MAX_XMP_LENGTH {
        return Err(Error::LimitExceeded(format!(
            "XMP packet is {} bytes, maximum {}",
            xmp_data.len(),
            limits::MAX_XMP_LENGTH
        )));
    }
    if !has_hdrgm(xmp_data) {
        return Err(Error::XmpParse("no hdrgm properties".into()));
    }

    let mut metadata = GainMapMetadata::new();

    // Boost and capacity values are stored as log2.
    if let Some(val) = extract_attribute(xmp_data, "hdrgm:GainMapMin") {
        metadata.min_content_boost = parse_xmp_values(&val)?.map(|v| 2.0f32.powf(v));
    }
    if let Some(val) = extract_attribute(xmp_data, "hdrgm:GainMapMax") {
        metadata.max_content_boost = parse_xmp_values(&val)?.map(|v| 2.0f32.powf(v));
    }
    if let Some(val) = extract_attribute(xmp_data, "hdrgm:Gamma") {
        metadata.gamma = parse_xmp_values(&val)?;
    }
    if let Some(val) = extract_attribute(xmp_data, "hdrgm:OffsetSDR") {
        metadata.offset_sdr = parse_xmp_values(&val)?;
    }
    if let Some(val) = extract_attribute(xmp_data, "hdrgm:OffsetHDR") {
        metadata.offset_hdr = parse_xmp_values(&val)?;
    }
    if let Some(val) = extract_attribute(xmp_data, "hdrgm:HDRCapacityMin") {
        metadata.hdr_capacity_min = 2.0f32.powf(parse_scalar(&val)?);
    }
    if let Some(val) = extract_attribute(xmp_data, "hdrgm:HDRCapacityMax") {
        metadata.hdr_capacity_max = 2.0f32.powf(parse_scalar(&val)?);
    }
    if let Some(val) = extract_attribute(xmp_data, "hdrgm:BaseRenditionIsHDR") {
        metadata.base_rendition_is_hdr = val.eq_ignore_ascii_case("true");
    }

    let gainmap_length =
        extract_attribute(xmp_data, "Item:Length").and_then(|v| v.parse::<usize>().ok());

    Ok((metadata, gainmap_length))
}

/// Read Apple's gain map headroom (linear), if the packet carries one.
pub fn parse_apple_headroom(xmp_data: &str) -> Result<Option<f32>> {
    match extract_attribute(xmp_data, "HDRGainMap:HDRGainMapHeadroom") {
        Some(val) => Ok(Some(parse_scalar(&val)?)),
        None => Ok(None),
    }
}

/// Classify a secondary image's XMP into a gain map encoding.
///
/// `primary_xmp` is consulted for `hdrgm` values when the secondary packet
/// does not carry them. Returns `Ok(None)` when neither packet describes a
/// gain map.
pub fn gain_map_encoding(
    secondary_xmp: Option<&str>,
    primary_xmp: Option<&str>,
) -> Result<Option<GainMapEncoding>> {
    if let Some(xmp) = secondary_xmp {
        if has_hdrgm(xmp) {
            let (metadata, _) = parse_xmp(xmp)?;
            return Ok(Some(GainMapEncoding::Adaptive(metadata)));
        }
        if is_apple_gain_map(xmp) {
            let headroom =
                parse_apple_headroom(xmp)?.unwrap_or(GainMapEncoding::APPLE_DEFAULT_HEADROOM);
            return Ok(Some(GainMapEncoding::Apple { headroom }));
        }
    }

    // Older Ultra HDR writers put everything in the primary packet, but only
    // when it also names a gain map item.
    if let Some(xmp) = primary_xmp {
        if has_hdrgm(xmp) && xmp.contains("Semantic=\"GainMap\"") {
            let (metadata, _) = parse_xmp(xmp)?;
            return Ok(Some(GainMapEncoding::Adaptive(metadata)));
        }
    }

    Ok(None)
}

/// Extract an attribute value from XMP using simple string matching.
fn extract_attribute(xmp: &str, attr_name: &str) -> Option<String> {
    // Attribute form: attr="value"
    let pattern = format!("{}=\"", attr_name);
    if let Some(start) = xmp.find(&pattern) {
        let value_start = start + pattern.len();
        if let Some(end) = xmp[value_start..].find('"') {
            return Some(xmp[value_start..value_start + end].trim().to_string());
        }
    }

    // Element form: <attr>value</attr>, possibly wrapped in rdf:Seq
    let open_tag = format!("<{}>", attr_name);
    let close_tag = format!("</{}>", attr_name);
    if let Some(start) = xmp.find(&open_tag) {
        let value_start = start + open_tag.len();
        if let Some(end) = xmp[value_start..].find(&close_tag) {
            let inner = &xmp[value_start..value_start + end];
            return Some(strip_rdf_seq(inner));
        }
    }

    None
}

/// Flatten `<rdf:Seq><rdf:li>a</rdf:li>...</rdf:Seq>` into `a, b, c`.
fn strip_rdf_seq(inner: &str) -> String {
    if !inner.contains("<rdf:li>") {
        return inner.trim().to_string();
    }
    inner
        .split("<rdf:li>")
        .skip(1)
        .filter_map(|part| part.split("</rdf:li>").next())
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_scalar(value: &str) -> Result<f32> {
    value
        .trim()
        .parse::<f32>()
        .map_err(|_| Error::XmpParse(format!("not a number: {:?}", value)))
}

/// Parse one value or three comma-separated values.
///
/// A single value applies to all channels.
fn parse_xmp_values(value: &str) -> Result<[f32; 3]> {
    let parsed = value
        .split(',')
        .map(parse_scalar)
        .collect::<Result<Vec<f32>>>()?;

    match parsed.as_slice() {
        [v] => Ok([*v; 3]),
        [r, g, b] => Ok([*r, *g, *b]),
        _ => Err(Error::XmpParse(format!(
            "expected 1 or 3 values, got {}",
            parsed.len()
        ))),
    }
}
