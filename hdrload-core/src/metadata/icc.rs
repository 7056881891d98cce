//! ICC profile inspection.
//!
//! Only what the loader needs: header validation, the tag table, and the
//! ICC v4.4 `cicp` tag that marks PQ/HLG profiles. Console HDR screenshots
//! are matched on their exact header before any of that runs, since their
//! profile does not survive generic parsing.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use super::cicp::Cicp;
use crate::limits;
use crate::types::{Error, Result};

/// Size of the fixed ICC profile header.
pub const ICC_HEADER_SIZE: usize = 128;

/// Declared size of the profile embedded in Xbox console HDR screen captures.
pub const XBOX_HDR_ICC_SIZE: usize = 3144;

/// Header of the profile embedded in Xbox console HDR screen captures.
///
/// Laid out from the profile's identifying fields (MSFT CMM and creator,
/// XBOX model, v4.3 RGB display class). The creation date and profile ID of
/// a shipped capture are not known here and are left zero, so real captures
/// match only once their header is configured through
/// [`IccHeaderSignature::from_profile`].
#[rustfmt::skip]
pub const XBOX_HDR_ICC_HEADER: [u8; ICC_HEADER_SIZE] = [
    // profile size, CMM type
    0x00, 0x00, 0x0C, 0x48, b'M', b'S', b'F', b'T',
    // version 4.3, device class, data color space
    0x04, 0x30, 0x00, 0x00, b'm', b'n', b't', b'r', b'R', b'G', b'B', b' ',
    // PCS, creation date (unknown)
    b'X', b'Y', b'Z', b' ', 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00,
    // signature, primary platform
    b'a', b'c', b's', b'p', b'M', b'S', b'F', b'T',
    // flags, manufacturer, model, attributes
    0x00, 0x00, 0x00, 0x00, b'M', b'S', b'F', b'T', b'X', b'B', b'O', b'X',
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    // rendering intent, PCS illuminant (D50)
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xF6, 0xD6, 0x00, 0x01, 0x00, 0x00,
    0x00, 0x00, 0xD3, 0x2D,
    // creator
    b'M', b'S', b'F', b'T',
    // profile ID (unknown)
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00,
    // reserved
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00,
];

/// An exact profile size and 128-byte header that identify one producer's
/// ICC profile.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct IccHeaderSignature {
    size: usize,
    header: [u8; ICC_HEADER_SIZE],
}

impl IccHeaderSignature {
    /// Built-in signature for Xbox console HDR screen captures.
    pub const XBOX_HDR_CAPTURE: Self = Self::new(XBOX_HDR_ICC_SIZE, XBOX_HDR_ICC_HEADER);

    /// Signature from a known profile size and header.
    pub const fn new(size: usize, header: [u8; ICC_HEADER_SIZE]) -> Self {
        Self { size, header }
    }

    /// Signature taken from a sample profile. `None` when the sample is
    /// shorter than a header.
    pub fn from_profile(profile: &[u8]) -> Option<Self> {
        let header = profile.get(..ICC_HEADER_SIZE)?.try_into().ok()?;
        Some(Self::new(profile.len(), header))
    }

    /// Profile size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The 128 header bytes.
    pub fn header(&self) -> &[u8; ICC_HEADER_SIZE] {
        &self.header
    }

    /// Compares the profile's length and all 128 header bytes exactly.
    pub fn matches(&self, profile: &[u8]) -> bool {
        if profile.len() != self.size {
            return false;
        }
        let matched = profile.get(..ICC_HEADER_SIZE) == Some(&self.header[..]);
        if !matched {
            log::trace!("ICC profile has the signature size {} but another header", self.size);
        }
        matched
    }
}

impl Default for IccHeaderSignature {
    fn default() -> Self {
        Self::XBOX_HDR_CAPTURE
    }
}

impl core::fmt::Debug for IccHeaderSignature {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IccHeaderSignature")
            .field("size", &self.size)
            .field("cmm", &String::from_utf8_lossy(&self.header[4..8]))
            .field("model", &String::from_utf8_lossy(&self.header[52..56]))
            .finish_non_exhaustive()
    }
}

/// Returns true if `profile` matches the built-in Xbox capture signature.
pub fn is_xbox_hdr_profile(profile: &[u8]) -> bool {
    IccHeaderSignature::XBOX_HDR_CAPTURE.matches(profile)
}

/// Data color space of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IccColorSpace {
    /// `RGB `
    Rgb,
    /// `GRAY`
    Gray,
}

/// One entry of the tag table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IccTag {
    /// Tag signature.
    pub signature: [u8; 4],
    /// Offset from the start of the profile.
    pub offset: usize,
    /// Element size in bytes.
    pub size: usize,
}

/// The parts of an ICC profile the loader inspects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IccProfile {
    /// Profile version as (major, minor).
    pub version: (u8, u8),
    /// Profile/device class signature (`mntr`, `scnr`, ...).
    pub device_class: [u8; 4],
    /// Data color space.
    pub color_space: IccColorSpace,
    /// Tag table.
    pub tags: Vec<IccTag>,
    /// Code points from a `cicp` tag, if present.
    pub cicp: Option<Cicp>,
}

impl IccProfile {
    /// Returns true if the profile declares an HDR transfer through `cicp`.
    pub fn has_hdr_transfer(&self) -> bool {
        self.cicp.is_some_and(|c| c.is_hdr())
    }
}

fn be_u32(data: &[u8], pos: usize) -> Result<u32> {
    data.get(pos..pos + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_be_bytes)
        .ok_or_else(|| Error::IccParse(format!("read past end at {}", pos)))
}

/// Validate a profile's header and tag table.
pub fn parse_icc(data: &[u8]) -> Result<IccProfile> {
    if data.len() > limits::MAX_ICC_PROFILE_SIZE {
        return Err(Error::LimitExceeded(format!(
            "ICC profile is {} bytes, maximum {}",
            data.len(),
            limits::MAX_ICC_PROFILE_SIZE
        )));
    }
    if data.len() < ICC_HEADER_SIZE + 4 {
        return Err(Error::IccParse(format!("profile too short: {} bytes", data.len())));
    }

    let declared = be_u32(data, 0)? as usize;
    if declared < ICC_HEADER_SIZE + 4 || declared > data.len() {
        return Err(Error::IccParse(format!(
            "declared size {} does not fit {} bytes",
            declared,
            data.len()
        )));
    }
    if declared < data.len() {
        log::debug!(
            "ignoring {} bytes after the declared ICC profile end",
            data.len() - declared
        );
    }
    let data = &data[..declared];

    if &data[36..40] != b"acsp" {
        return Err(Error::IccParse("missing acsp signature".into()));
    }

    let color_space = match &data[16..20] {
        b"RGB " => IccColorSpace::Rgb,
        b"GRAY" => IccColorSpace::Gray,
        other => {
            return Err(Error::IccParse(format!(
                "unsupported data color space {:?}",
                other
            )))
        }
    };

    let mut device_class = [0u8; 4];
    device_class.copy_from_slice(&data[12..16]);

    let tag_count = be_u32(data, ICC_HEADER_SIZE)? as usize;
    if tag_count > (declared - ICC_HEADER_SIZE - 4) / 12 {
        return Err(Error::IccParse(format!("tag count {} overruns profile", tag_count)));
    }

    let mut tags = Vec::with_capacity(tag_count);
    let mut cicp = None;
    for i in 0..tag_count {
        let at = ICC_HEADER_SIZE + 4 + i * 12;
        let mut signature = [0u8; 4];
        signature.copy_from_slice(&data[at..at + 4]);
        let offset = be_u32(data, at + 4)? as usize;
        let size = be_u32(data, at + 8)? as usize;

        let end = offset
            .checked_add(size)
            .filter(|&end| offset >= ICC_HEADER_SIZE && end <= declared)
            .ok_or_else(|| {
                Error::IccParse(format!(
                    "tag {:?} at {}+{} lies outside profile",
                    signature, offset, size
                ))
            })?;

        if &signature == b"cicp" {
            cicp = Some(parse_cicp_tag(&data[offset..end])?);
        }
        tags.push(IccTag {
            signature,
            offset,
            size,
        });
    }

    Ok(IccProfile {
        version: (data[8], data[9] >> 4),
        device_class,
        color_space,
        tags,
        cicp,
    })
}

/// `cicp` tag element: type signature, 4 reserved bytes, 4 code point bytes.
fn parse_cicp_tag(element: &[u8]) -> Result<Cicp> {
    if element.len() < 12 || &element[0..4] != b"cicp" {
        return Err(Error::IccParse("malformed cicp tag".into()));
    }
    Ok(Cicp::from_bytes([
        element[8],
        element[9],
        element[10],
        element[11],
    ]))
}
