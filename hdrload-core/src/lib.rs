//! Codec-free building blocks for loading HDR still images.
//!
//! This crate holds the pieces of the HDR image loader that operate on bytes
//! and pixels but never on an encoded image codec:
//! - Transfer functions (sRGB, PQ, HLG) and gamut matrices
//! - ICC profile header inspection and CICP transfer codes
//! - Multi-Picture Format (MPF) directories and gain map XMP metadata
//! - Gain map composition (Adobe/Google `hdrgm` and Apple auxiliary gain maps)
//!
//! For decoding, HDR classification and the device-resource state machine,
//! use the `hdrload` crate, which re-exports everything here.
//!
//! # Example
//!
//! ```ignore
//! use hdrload_core::gainmap::{compose_gainmap, CompositionTarget};
//! use hdrload_core::metadata::xmp::parse_xmp;
//!
//! let (metadata, _len) = parse_xmp(&xmp_packet)?;
//! let encoding = GainMapEncoding::Adaptive(metadata);
//! let hdr = compose_gainmap(&base, &gain_map, &encoding, CompositionTarget::scaled(&base, 0.5))?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

pub mod color;
pub mod gainmap;
pub mod metadata;
mod types;

// Re-export core types
pub use types::{
    luminance, ColorGamut, ColorTransfer, Error, GainMap, GainMapEncoding, GainMapMetadata,
    PixelFormat, RawImage, Result,
};

// Re-export gain map composition types
pub use gainmap::apply::{compose_gainmap, CompositionTarget};

/// Safety limits for parsing and allocation.
pub mod limits {
    /// Maximum XMP string length to parse (16 MB).
    pub const MAX_XMP_LENGTH: usize = 16 * 1024 * 1024;

    /// Maximum embedded ICC profile size accepted for inspection (4 MB).
    pub const MAX_ICC_PROFILE_SIZE: usize = 4 * 1024 * 1024;

    /// Maximum image dimension (width or height).
    pub const MAX_IMAGE_DIMENSION: u32 = 65535;

    /// Maximum total pixels (width * height).
    pub const MAX_TOTAL_PIXELS: u64 = 500_000_000; // 500 megapixels

    /// Maximum number of MPF directory entries considered.
    pub const MAX_MPF_ENTRIES: usize = 64;
}
