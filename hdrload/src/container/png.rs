//! PNG chunk probe for the `cICP` color chunk.

use hdrload_core::metadata::Cicp;

/// PNG file signature.
pub const PNG_SIGNATURE: &[u8; 8] = b"\x89PNG\r\n\x1a\n";

/// Returns true if `data` starts with the PNG signature.
pub fn is_png(data: &[u8]) -> bool {
    data.starts_with(PNG_SIGNATURE)
}

/// Find the `cICP` chunk that precedes the image data.
///
/// Walks chunk headers only; CRCs are not verified since the pixel codec
/// validates the stream itself.
pub fn find_cicp(data: &[u8]) -> Option<Cicp> {
    if !is_png(data) {
        return None;
    }

    let mut pos = PNG_SIGNATURE.len();
    while pos + 8 <= data.len() {
        let length = u32::from_be_bytes(data[pos..pos + 4].try_into().ok()?) as usize;
        let kind = &data[pos + 4..pos + 8];
        let body_start = pos + 8;
        let body_end = body_start.checked_add(length)?;
        if body_end + 4 > data.len() {
            log::trace!("truncated PNG chunk {:?} at {}", kind, pos);
            return None;
        }

        match kind {
            b"cICP" if length == 4 => {
                let body = &data[body_start..body_end];
                return Some(Cicp::from_bytes([body[0], body[1], body[2], body[3]]));
            }
            b"IDAT" | b"IEND" => return None,
            _ => {}
        }

        pos = body_end + 4;
    }

    None
}
