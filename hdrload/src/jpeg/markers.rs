//! JPEG marker scanning.

use hdrload_core::metadata::mpf::MPF_IDENTIFIER;
use hdrload_core::metadata::xmp::XMP_APP1_IDENTIFIER;

use super::icc::ICC_IDENTIFIER;

/// Start of Image.
pub const SOI: u8 = 0xD8;
/// End of Image.
pub const EOI: u8 = 0xD9;
/// Start of Scan.
pub const SOS: u8 = 0xDA;

/// An APP segment borrowed from a JPEG stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppSegment<'a> {
    /// Marker number (0-15 for APP0-APP15).
    pub marker_num: u8,
    /// Segment payload (excluding marker and length bytes).
    pub data: &'a [u8],
    /// Offset of the marker in the stream.
    pub offset: usize,
}

impl AppSegment<'_> {
    /// APP2 with the `MPF\0` identifier.
    pub fn is_mpf(&self) -> bool {
        self.marker_num == 2 && self.data.starts_with(MPF_IDENTIFIER)
    }

    /// APP1 with the XMP namespace identifier.
    pub fn is_xmp(&self) -> bool {
        self.marker_num == 1 && self.data.starts_with(XMP_APP1_IDENTIFIER)
    }

    /// APP2 with the `ICC_PROFILE\0` identifier.
    pub fn is_icc(&self) -> bool {
        self.marker_num == 2 && self.data.starts_with(ICC_IDENTIFIER)
    }
}

/// Returns true if `data` starts with a JPEG SOI marker.
pub fn is_jpeg(data: &[u8]) -> bool {
    data.len() >= 4 && data[0] == 0xFF && data[1] == SOI
}

/// Collect the APP segments of the first image in `data`.
///
/// Scanning stops at SOS; entropy-coded data is never walked. A truncated
/// segment ends the scan with whatever was collected so far.
pub fn scan_segments(data: &[u8]) -> Vec<AppSegment<'_>> {
    let mut segments = Vec::new();
    if !is_jpeg(data) {
        return segments;
    }

    let mut pos = 2;
    while pos + 3 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        // Fill bytes
        if data[pos + 1] == 0xFF {
            pos += 1;
            continue;
        }

        let marker = data[pos + 1];
        if marker == SOS || marker == EOI {
            break;
        }
        if marker == SOI || (0xD0..=0xD7).contains(&marker) || marker == 0x01 || marker == 0x00 {
            pos += 2;
            continue;
        }

        let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        if length < 2 || pos + 2 + length > data.len() {
            log::trace!("truncated segment 0xFF{:02X} at {}", marker, pos);
            break;
        }

        if (0xE0..=0xEF).contains(&marker) {
            log::trace!("APP{} segment at {}, {} bytes", marker - 0xE0, pos, length - 2);
            segments.push(AppSegment {
                marker_num: marker - 0xE0,
                data: &data[pos + 4..pos + 2 + length],
                offset: pos,
            });
        }

        pos += 2 + length;
    }

    segments
}

/// Extract the XMP packet from an image's APP1 segments.
pub fn find_xmp(segments: &[AppSegment<'_>]) -> Option<String> {
    let segment = segments.iter().find(|s| s.is_xmp())?;
    let packet = &segment.data[XMP_APP1_IDENTIFIER.len()..];
    if packet.len() > hdrload_core::limits::MAX_XMP_LENGTH {
        log::warn!("ignoring oversized XMP packet ({} bytes)", packet.len());
        return None;
    }
    Some(String::from_utf8_lossy(packet).into_owned())
}
