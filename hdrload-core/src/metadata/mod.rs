//! Metadata carried alongside encoded pixels.
//!
//! - [`icc`]: ICC profile header and tag inspection
//! - [`cicp`]: H.273 code points shared by PNG, HEIF and ICC
//! - [`mpf`]: Multi-Picture Format directories in JPEG
//! - [`xmp`]: gain map XMP (Adobe/Google `hdrgm`, Apple `HDRGainMap`)

pub mod cicp;
pub mod icc;
pub mod mpf;
pub mod xmp;

pub use cicp::Cicp;
pub use icc::{is_xbox_hdr_profile, parse_icc, IccHeaderSignature, IccProfile};
