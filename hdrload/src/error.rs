//! Error types for decoding, device access and the loader contract.

use thiserror::Error;

use crate::state::ImageLoaderState;

/// A decode backend could not produce a bitmap from the input.
///
/// Always an expected data condition; the loader records it as
/// [`ImageLoaderState::LoadingFailed`] instead of returning it.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// Malformed, truncated or unsupported encoded data.
    #[error("cannot decode: {0}")]
    CannotDecode(String),

    /// The codec produced a pixel layout the loader does not translate.
    #[error("unsupported pixel format: {0}")]
    UnsupportedPixelFormat(String),

    /// Reading the input failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A detected gain map could not be decoded or its metadata is invalid.
    #[error("gain map error: {0}")]
    GainMap(String),

    /// Metadata or pixel data failed validation.
    #[error(transparent)]
    Invalid(#[from] hdrload_core::Error),

    /// Allocation failed while converting decoded pixels.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
}

impl From<image::ImageError> for DecodeError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(io) => DecodeError::Io(io),
            other => DecodeError::CannotDecode(other.to_string()),
        }
    }
}

/// Failure reported by the GPU device boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DeviceError {
    /// The device was removed or reset.
    #[error("device lost")]
    DeviceLost,

    /// The device could not allocate the resource.
    #[error("device out of memory")]
    OutOfMemory,

    /// Backend-specific failure.
    #[error("device error: {0}")]
    Backend(String),
}

/// Error returned by [`ImageLoader`](crate::ImageLoader) operations.
///
/// `WrongState`, `InvalidArgument` and `StaleHandle` are contract violations
/// by the caller. `BadImage` means the loaded data was unusable and the
/// loader must be replaced.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum LoaderError {
    /// The operation is not legal in the current state.
    #[error("operation not allowed in state {actual:?} (allowed: {allowed:?})")]
    WrongState {
        /// State the loader was in.
        actual: ImageLoaderState,
        /// States the operation accepts.
        allowed: &'static [ImageLoaderState],
    },

    /// The image failed to load; the loader is terminally failed.
    #[error("bad or corrupt image")]
    BadImage,

    /// A view outlived the device resources it referred to.
    #[error("stale handle: device resources were released or recreated")]
    StaleHandle,

    /// An argument was out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Memory or another resource ran out while loading.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// CPU-side pixel work on an already loaded image failed.
    #[error("pixel processing failed: {0}")]
    Processing(String),

    /// The device failed while building device resources.
    #[error(transparent)]
    Device(#[from] DeviceError),
}

impl LoaderError {
    /// Returns true for the expected, user-facing bad image failure.
    pub fn is_bad_image(&self) -> bool {
        matches!(self, LoaderError::BadImage)
    }

    /// Returns true if the caller used the API incorrectly.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            LoaderError::WrongState { .. }
                | LoaderError::InvalidArgument(_)
                | LoaderError::StaleHandle
        )
    }
}

/// Result type for loader operations.
pub type Result<T, E = LoaderError> = std::result::Result<T, E>;
