//! GPU device boundary.
//!
//! The loader never creates or enumerates devices. It asks a
//! [`DeviceProvider`] for the current [`GpuDevice`] whenever it builds
//! device-dependent resources, and wraps what the device returns in owned
//! handles that release the device object on drop.
//!
//! Renderers receive [`ImageView`] and [`ColorContextView`], which hold weak
//! references. Once the loader releases or recreates its device resources,
//! old views resolve to [`LoaderError::StaleHandle`].

use std::fmt;
use std::sync::{Arc, Weak};

use hdrload_core::{ColorGamut, ColorTransfer, PixelFormat, RawImage};

use crate::error::{DeviceError, LoaderError};
use crate::metadata::ColorProfile;

/// Device-side identifier of an uploaded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuImageId(pub u64);

/// Device-side identifier of a color context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuColorContextId(pub u64);

/// Pixels handed to [`GpuDevice::create_image`].
#[derive(Debug, Clone, Copy)]
pub struct ImageUpload<'a> {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row stride in bytes.
    pub stride: u32,
    /// Sample layout.
    pub format: PixelFormat,
    /// Primaries of the samples.
    pub gamut: ColorGamut,
    /// Transfer function of the samples.
    pub transfer: ColorTransfer,
    /// Pixel bytes.
    pub data: &'a [u8],
}

impl<'a> ImageUpload<'a> {
    /// Borrow a raw image for upload.
    pub fn from_raw(image: &'a RawImage) -> Self {
        Self {
            width: image.width,
            height: image.height,
            stride: image.stride,
            format: image.format,
            gamut: image.gamut,
            transfer: image.transfer,
            data: &image.data,
        }
    }
}

/// Parameters for [`GpuDevice::create_color_context`].
#[derive(Debug, Clone, PartialEq)]
pub struct ColorContextDesc {
    /// Primaries the context declares.
    pub gamut: ColorGamut,
    /// Transfer function the context declares.
    pub transfer: ColorTransfer,
    /// ICC profile for devices that build contexts from profiles.
    pub icc_profile: Option<Arc<[u8]>>,
}

impl ColorContextDesc {
    /// Mirror a device-independent profile.
    ///
    /// `force_bt2100` replaces the primaries with BT.2100.
    pub fn from_profile(profile: &ColorProfile, force_bt2100: bool) -> Self {
        Self {
            gamut: if force_bt2100 {
                ColorGamut::Bt2100
            } else {
                profile.gamut
            },
            transfer: profile.transfer,
            icc_profile: profile.icc.clone(),
        }
    }
}

/// A GPU device able to hold images and color contexts.
///
/// Implementations use interior mutability; the loader only holds shared
/// references.
pub trait GpuDevice {
    /// Upload an image.
    fn create_image(&self, upload: &ImageUpload<'_>) -> Result<GpuImageId, DeviceError>;

    /// Free an image. Called exactly once per successful `create_image`.
    fn destroy_image(&self, id: GpuImageId);

    /// Create a color context.
    fn create_color_context(
        &self,
        desc: &ColorContextDesc,
    ) -> Result<GpuColorContextId, DeviceError>;

    /// Free a color context. Called exactly once per successful
    /// `create_color_context`.
    fn destroy_color_context(&self, id: GpuColorContextId);
}

/// Supplies the current device on demand.
pub trait DeviceProvider {
    /// The device resources should be built on now.
    fn current_device(&self) -> Result<Arc<dyn GpuDevice>, DeviceError>;
}

impl<P: DeviceProvider + ?Sized> DeviceProvider for Arc<P> {
    fn current_device(&self) -> Result<Arc<dyn GpuDevice>, DeviceError> {
        (**self).current_device()
    }
}

impl<P: DeviceProvider + ?Sized> DeviceProvider for Box<P> {
    fn current_device(&self) -> Result<Arc<dyn GpuDevice>, DeviceError> {
        (**self).current_device()
    }
}

/// An image resident on a device. Destroyed when dropped.
pub struct GpuImage {
    device: Arc<dyn GpuDevice>,
    id: GpuImageId,
    width: u32,
    height: u32,
    format: PixelFormat,
    gamut: ColorGamut,
    transfer: ColorTransfer,
}

impl GpuImage {
    /// Upload `upload` to `device`.
    pub fn create(device: &Arc<dyn GpuDevice>, upload: &ImageUpload<'_>) -> Result<Self, DeviceError> {
        let id = device.create_image(upload)?;
        Ok(Self {
            device: Arc::clone(device),
            id,
            width: upload.width,
            height: upload.height,
            format: upload.format,
            gamut: upload.gamut,
            transfer: upload.transfer,
        })
    }

    /// Device-side identifier.
    pub fn id(&self) -> GpuImageId {
        self.id
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Sample layout on the device.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Primaries of the uploaded samples.
    pub fn gamut(&self) -> ColorGamut {
        self.gamut
    }

    /// Transfer function of the uploaded samples.
    pub fn transfer(&self) -> ColorTransfer {
        self.transfer
    }
}

impl Drop for GpuImage {
    fn drop(&mut self) {
        self.device.destroy_image(self.id);
    }
}

impl fmt::Debug for GpuImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuImage")
            .field("id", &self.id)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

/// A color context resident on a device. Destroyed when dropped.
pub struct GpuColorContext {
    device: Arc<dyn GpuDevice>,
    id: GpuColorContextId,
    desc: ColorContextDesc,
}

impl GpuColorContext {
    /// Create a context on `device`.
    pub fn create(device: &Arc<dyn GpuDevice>, desc: ColorContextDesc) -> Result<Self, DeviceError> {
        let id = device.create_color_context(&desc)?;
        Ok(Self {
            device: Arc::clone(device),
            id,
            desc,
        })
    }

    /// Device-side identifier.
    pub fn id(&self) -> GpuColorContextId {
        self.id
    }

    /// What the context was created from.
    pub fn desc(&self) -> &ColorContextDesc {
        &self.desc
    }
}

impl Drop for GpuColorContext {
    fn drop(&mut self) {
        self.device.destroy_color_context(self.id);
    }
}

impl fmt::Debug for GpuColorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuColorContext")
            .field("id", &self.id)
            .field("desc", &self.desc)
            .finish_non_exhaustive()
    }
}

/// Renderer-side reference to a [`GpuImage`] owned by the loader.
#[derive(Debug, Clone)]
pub struct ImageView(Weak<GpuImage>);

impl ImageView {
    pub(crate) fn new(image: &Arc<GpuImage>) -> Self {
        Self(Arc::downgrade(image))
    }

    /// Access the image, or [`LoaderError::StaleHandle`] if the loader has
    /// released it. Holding the returned `Arc` delays destruction.
    pub fn resolve(&self) -> Result<Arc<GpuImage>, LoaderError> {
        self.0.upgrade().ok_or(LoaderError::StaleHandle)
    }

    /// Returns true once the image has been released.
    pub fn is_stale(&self) -> bool {
        self.0.strong_count() == 0
    }
}

/// Renderer-side reference to a [`GpuColorContext`] owned by the loader.
#[derive(Debug, Clone)]
pub struct ColorContextView(Weak<GpuColorContext>);

impl ColorContextView {
    pub(crate) fn new(context: &Arc<GpuColorContext>) -> Self {
        Self(Arc::downgrade(context))
    }

    /// Access the context, or [`LoaderError::StaleHandle`] if the loader has
    /// released it.
    pub fn resolve(&self) -> Result<Arc<GpuColorContext>, LoaderError> {
        self.0.upgrade().ok_or(LoaderError::StaleHandle)
    }

    /// Returns true once the context has been released.
    pub fn is_stale(&self) -> bool {
        self.0.strong_count() == 0
    }
}
