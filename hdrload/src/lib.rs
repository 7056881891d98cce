//! HDR still-image loader for image viewers.
//!
//! An [`ImageLoader`] decodes one image, decides whether it is HDR, and
//! keeps two groups of resources with independent lifetimes: a decoded
//! bitmap with its color profile, and the GPU objects built from them. The
//! GPU objects can be released and rebuilt around device loss without
//! decoding again.
//!
//! # Crate Structure
//!
//! - [`hdrload_core`] - Transfer functions, ICC/MPF/XMP parsing and gain map
//!   composition (no codec dependency)
//! - `hdrload` (this crate) - Decode backends, HDR heuristics and the loader
//!   state machine
//!
//! # HDR Detection
//!
//! Checked in order, first match wins:
//! - Console HDR screen captures, identified by their embedded ICC header
//! - HDR10: PQ transfer reported through the still-image decode path
//! - Gain maps appended to SDR JPEGs (`hdrgm` XMP or Apple auxiliary images)
//!
//! Failing those, an HDR transfer in the embedded profile or floating-point
//! samples still mark the image as HDR.
//!
//! # Features
//!
//! - `heif`: HEVC-coded HEIF through libheif, so PQ `.heic` files reach the
//!   HDR10 route
//! - `avif`: AVIF through the `image` crate's native decoder
//! - `serde`: `Serialize`/`Deserialize` on options and metadata
//!
//! # Example
//!
//! ```ignore
//! use hdrload::{ImageLoader, ImageLoaderOptions, ImageLoaderState};
//!
//! let mut loader = ImageLoader::new(provider, ImageLoaderOptions::default());
//! match loader.load_file("capture.png", "png")? {
//!     ImageLoaderState::LoadingSucceeded => {
//!         let meta = loader.metadata()?;
//!         println!("{}x{} {:?}", meta.width, meta.height, meta.dynamic_range);
//!         let image = loader.get_renderable_image(0.5, true)?;
//!         renderer.draw(&image.resolve()?, &loader.gpu_color_context()?.resolve()?);
//!     }
//!     ImageLoaderState::NeedDeviceResources => loader.create_device_dependent_resources()?,
//!     _ => show_bad_image_message(),
//! }
//! ```
//!
//! # Standards
//!
//! - [Ultra HDR Image Format v1.1](https://developer.android.com/media/platform/hdr-image-format)
//! - ITU-T H.273 (CICP code points)
//! - ITU-R BT.2100 (PQ and HLG)
//! - CIPA DC-007 (Multi-Picture Format)

#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export the codec-free building blocks
pub use hdrload_core::color;
pub use hdrload_core::gainmap;
pub use hdrload_core::metadata as embedded_metadata;
pub use hdrload_core::metadata::IccHeaderSignature;

pub use hdrload_core::{
    limits, ColorGamut, ColorTransfer, GainMap, GainMapEncoding, GainMapMetadata, PixelFormat,
    RawImage,
};

// This crate's additional modules
pub mod container;
pub mod decode;
pub mod device;
pub mod heuristics;
pub mod jpeg;

mod error;
mod loader;
mod metadata;
mod options;
mod state;

pub use decode::{DecodeBackend, ImageCodecBackend};
pub use device::{
    ColorContextDesc, ColorContextView, DeviceProvider, GpuColorContext, GpuColorContextId,
    GpuDevice, GpuImage, GpuImageId, ImageUpload, ImageView,
};
pub use error::{DecodeError, DeviceError, LoaderError, Result};
pub use loader::ImageLoader;
pub use metadata::{
    ColorProfile, ContainerKind, DynamicRange, HdrDetection, ImageMetadata, PixelInfo,
};
pub use options::ImageLoaderOptions;
pub use state::ImageLoaderState;
