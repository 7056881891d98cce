//! Color handling: transfer functions, gamut matrices, working-space conversion.

pub mod convert;
pub mod gamut;
pub mod transfer;

pub use convert::*;
pub use gamut::*;
pub use transfer::*;
