//! JPEG container access for metadata the pixel codec does not surface.

pub mod icc;
pub mod markers;

pub use icc::{extract_icc_profile, icc_segments};
pub use markers::{find_xmp, is_jpeg, scan_segments, AppSegment};
