//! Loader configuration.

use hdrload_core::metadata::IccHeaderSignature;

/// Options fixed for the lifetime of an [`ImageLoader`](crate::ImageLoader).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImageLoaderOptions {
    /// Build the GPU color context with BT.2100 primaries regardless of the
    /// image's own profile. Only consulted when device resources are built.
    pub force_bt2100: bool,
    /// Embedded ICC profile that marks a console HDR screen capture.
    /// Defaults to [`IccHeaderSignature::XBOX_HDR_CAPTURE`].
    #[cfg_attr(feature = "serde", serde(skip))]
    pub console_capture: IccHeaderSignature,
}

impl ImageLoaderOptions {
    /// Options with alternate-gamut mapping forced on.
    pub fn force_bt2100() -> Self {
        Self {
            force_bt2100: true,
            ..Self::default()
        }
    }

    /// Match console HDR captures against `signature` instead of the
    /// built-in header.
    pub fn with_console_capture(mut self, signature: IccHeaderSignature) -> Self {
        self.console_capture = signature;
        self
    }
}
