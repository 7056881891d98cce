//! ICC profiles embedded in JPEG APP2 segments.

use super::markers::AppSegment;

/// ICC profile APP2 identifier.
pub const ICC_IDENTIFIER: &[u8] = b"ICC_PROFILE\0";

/// Reassemble an ICC profile from its APP2 chunks.
///
/// Large profiles are split across several segments, each tagged with a
/// 1-based sequence number. Chunks are joined in sequence order.
pub fn extract_icc_profile(segments: &[AppSegment<'_>]) -> Option<Vec<u8>> {
    let header = ICC_IDENTIFIER.len() + 2;
    let mut chunks: Vec<(u8, &[u8])> = segments
        .iter()
        .filter(|s| s.is_icc() && s.data.len() > header)
        .map(|s| (s.data[ICC_IDENTIFIER.len()], &s.data[header..]))
        .collect();

    if chunks.is_empty() {
        return None;
    }
    chunks.sort_by_key(|(seq, _)| *seq);

    let total: usize = chunks.iter().map(|(_, c)| c.len()).sum();
    if total > hdrload_core::limits::MAX_ICC_PROFILE_SIZE {
        log::warn!("ignoring oversized ICC profile ({} bytes)", total);
        return None;
    }

    let mut profile = Vec::with_capacity(total);
    for (_, chunk) in chunks {
        profile.extend_from_slice(chunk);
    }
    Some(profile)
}

/// Split `profile` into complete APP2 segments, marker bytes included.
pub fn icc_segments(profile: &[u8]) -> Vec<Vec<u8>> {
    let max_chunk = 0xFFFF - 2 - ICC_IDENTIFIER.len() - 2;
    let count = profile.chunks(max_chunk).len();

    profile
        .chunks(max_chunk)
        .enumerate()
        .map(|(i, chunk)| {
            let length = 2 + ICC_IDENTIFIER.len() + 2 + chunk.len();
            let mut segment = Vec::with_capacity(2 + length);
            segment.extend_from_slice(&[0xFF, 0xE2]);
            segment.extend_from_slice(&(length as u16).to_be_bytes());
            segment.extend_from_slice(ICC_IDENTIFIER);
            segment.push((i + 1) as u8);
            segment.push(count as u8);
            segment.extend_from_slice(chunk);
            segment
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::markers::scan_segments;
    use super::*;

    fn with_segments(segments: &[Vec<u8>]) -> Vec<u8> {
        let mut jpeg = vec![0xFF, 0xD8];
        for s in segments {
            jpeg.extend_from_slice(s);
        }
        jpeg.extend_from_slice(&[0xFF, 0xD9]);
        jpeg
    }

    #[test]
    fn test_single_chunk() {
        let profile: Vec<u8> = (0..3144u32).map(|i| (i % 251) as u8).collect();
        let jpeg = with_segments(&icc_segments(&profile));
        let extracted = extract_icc_profile(&scan_segments(&jpeg)).unwrap();
        assert_eq!(extracted, profile);
    }

    #[test]
    fn test_chunks_reassembled_in_sequence_order() {
        let profile: Vec<u8> = (0..150_000u32).map(|i| (i % 253) as u8).collect();
        let mut segments = icc_segments(&profile);
        assert_eq!(segments.len(), 3);
        segments.reverse();

        let jpeg = with_segments(&segments);
        let extracted = extract_icc_profile(&scan_segments(&jpeg)).unwrap();
        assert_eq!(extracted, profile);
    }

    #[test]
    fn test_no_profile() {
        let jpeg = with_segments(&[]);
        assert!(extract_icc_profile(&scan_segments(&jpeg)).is_none());
    }
}
