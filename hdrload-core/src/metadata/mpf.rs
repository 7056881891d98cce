//! Multi-Picture Format (MPF) directory parsing.
//!
//! MPF is defined by CIPA DC-007 and stores several JPEG streams back to
//! back in one file; the APP2 `MPF\0` segment of the first stream indexes
//! the rest. Gain map JPEGs use it to locate the auxiliary image.

use alloc::format;
use alloc::vec::Vec;

use crate::limits;
use crate::types::{Error, Result};

/// MPF marker identifier.
pub const MPF_IDENTIFIER: &[u8] = b"MPF\0";

const TAG_NUMBER_OF_IMAGES: u16 = 0xB001;
const TAG_MP_ENTRY: u16 = 0xB002;

const MP_ENTRY_SIZE: usize = 16;

/// One image listed in an MPF directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MpEntry {
    /// Individual image attribute flags (type code in the low 24 bits).
    pub attribute: u32,
    /// Absolute byte offset of the image's SOI within the file.
    pub offset: usize,
    /// Image size in bytes.
    pub size: usize,
}

impl MpEntry {
    /// Byte range of this image, if it lies inside a buffer of `len` bytes.
    pub fn range(&self, len: usize) -> Option<core::ops::Range<usize>> {
        let end = self.offset.checked_add(self.size)?;
        (self.size > 0 && end <= len).then_some(self.offset..end)
    }
}

/// Endian-aware reader over the TIFF structure inside the MPF segment.
struct TiffReader<'a> {
    data: &'a [u8],
    big_endian: bool,
}

impl TiffReader<'_> {
    fn u16_at(&self, pos: usize) -> Result<u16> {
        let bytes: [u8; 2] = self
            .data
            .get(pos..pos + 2)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| Error::MpfParse(format!("read past end at {}", pos)))?;
        Ok(if self.big_endian {
            u16::from_be_bytes(bytes)
        } else {
            u16::from_le_bytes(bytes)
        })
    }

    fn u32_at(&self, pos: usize) -> Result<u32> {
        let bytes: [u8; 4] = self
            .data
            .get(pos..pos + 4)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| Error::MpfParse(format!("read past end at {}", pos)))?;
        Ok(if self.big_endian {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        })
    }
}

/// Locate the MPF segment in a JPEG file and return its image entries.
///
/// Offsets are resolved to absolute file positions. The first entry always
/// refers to the primary image at offset 0. Entries that lie outside `data`
/// are returned as listed and logged; [`MpEntry::range`] rejects them.
pub fn parse_mpf(data: &[u8]) -> Result<Vec<MpEntry>> {
    let (segment_start, payload) = find_mpf_segment(data)?;
    // Offsets are relative to the TIFF header, which follows the
    // 2-byte marker, 2-byte length and 4-byte identifier.
    let entries = parse_mpf_payload(payload, segment_start + 8)?;
    log::trace!("MPF directory at {} lists {} images", segment_start, entries.len());

    for (i, entry) in entries.iter().enumerate().skip(1) {
        if entry.range(data.len()).is_none() {
            log::warn!(
                "ignoring MPF entry {}: {}+{} lies outside the {}-byte file",
                i,
                entry.offset,
                entry.size,
                data.len()
            );
        }
    }
    Ok(entries)
}

/// Walk JPEG marker segments up to SOS looking for APP2 `MPF\0`.
fn find_mpf_segment(data: &[u8]) -> Result<(usize, &[u8])> {
    if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
        return Err(Error::MpfParse("not a JPEG stream".into()));
    }

    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return Err(Error::MpfParse(format!("expected marker at {}", pos)));
        }
        let marker = data[pos + 1];
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        if marker == 0xDA || marker == 0xD9 {
            break;
        }

        let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        if length < 2 || pos + 2 + length > data.len() {
            return Err(Error::MpfParse(format!("truncated segment at {}", pos)));
        }
        let payload = &data[pos + 4..pos + 2 + length];
        if marker == 0xE2 && payload.starts_with(MPF_IDENTIFIER) {
            return Ok((pos, &payload[MPF_IDENTIFIER.len()..]));
        }
        pos += 2 + length;
    }

    Err(Error::MpfParse("MPF marker not found".into()))
}

fn parse_mpf_payload(tiff: &[u8], tiff_start: usize) -> Result<Vec<MpEntry>> {
    if tiff.len() < 8 {
        return Err(Error::MpfParse("MPF data too short".into()));
    }

    let big_endian = match &tiff[0..2] {
        b"MM" => true,
        b"II" => false,
        _ => return Err(Error::MpfParse("invalid MPF endianness marker".into())),
    };
    let reader = TiffReader {
        data: tiff,
        big_endian,
    };

    let ifd_offset = reader.u32_at(4)? as usize;
    let num_entries = reader.u16_at(ifd_offset)? as usize;

    let mut image_count = 0usize;
    let mut entries_offset = None;
    for i in 0..num_entries {
        let at = ifd_offset + 2 + i * 12;
        let tag = reader.u16_at(at)?;
        let value = reader.u32_at(at + 8)?;
        match tag {
            TAG_NUMBER_OF_IMAGES => image_count = value as usize,
            TAG_MP_ENTRY => entries_offset = Some(value as usize),
            _ => {}
        }
    }

    let entries_offset =
        entries_offset.ok_or_else(|| Error::MpfParse("MP entry tag missing".into()))?;
    if image_count == 0 {
        return Err(Error::MpfParse("no images listed in MPF".into()));
    }
    if image_count > limits::MAX_MPF_ENTRIES {
        return Err(Error::LimitExceeded(format!(
            "MPF lists {} images, maximum {}",
            image_count,
            limits::MAX_MPF_ENTRIES
        )));
    }

    let mut images = Vec::with_capacity(image_count);
    for i in 0..image_count {
        let at = entries_offset + i * MP_ENTRY_SIZE;
        let attribute = reader.u32_at(at)?;
        let size = reader.u32_at(at + 4)? as usize;
        let offset = reader.u32_at(at + 8)? as usize;

        let absolute = if i == 0 || offset == 0 {
            if i > 0 {
                log::trace!("MPF entry {} has no offset", i);
            }
            0
        } else {
            tiff_start + offset
        };
        images.push(MpEntry {
            attribute,
            offset: absolute,
            size,
        });
    }

    Ok(images)
}

/// Find complete JPEG streams (SOI through EOI) in data.
///
/// Used when a file carries concatenated JPEGs without a readable MPF
/// directory.
pub fn find_jpeg_boundaries(data: &[u8]) -> Vec<(usize, usize)> {
    let mut boundaries = Vec::new();
    let mut pos = 0;

    while pos + 1 < data.len() {
        if data[pos] == 0xFF && data[pos + 1] == 0xD8 {
            let start = pos;
            pos += 2;
            while pos + 1 < data.len() {
                if data[pos] == 0xFF && data[pos + 1] == 0xD9 {
                    boundaries.push((start, pos + 2));
                    pos += 2;
                    break;
                }
                pos += 1;
            }
        } else {
            pos += 1;
        }
    }

    boundaries
}
