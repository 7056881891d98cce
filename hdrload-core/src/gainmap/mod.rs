//! Gain map composition.
//!
//! A gain map stores the ratio between the HDR and SDR renditions of a
//! photo. Composition multiplies the linear SDR base by the decoded gain to
//! recover the HDR rendition at render time.

pub mod apply;

pub use apply::*;
