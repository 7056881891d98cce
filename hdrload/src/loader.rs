//! The image loader state machine.
//!
//! An [`ImageLoader`] owns two resource groups with separate lifetimes:
//!
//! - device-independent: the decoded bitmap, its color profile, any gain
//!   map, and the metadata. Built once by a successful load and kept until
//!   the loader is dropped.
//! - device-dependent: GPU images and the GPU color context. Released and
//!   rebuilt any number of times around device loss, never by re-decoding.
//!
//! Every public operation is gated on [`ImageLoaderState`]. A gate failure
//! is [`LoaderError::WrongState`], or [`LoaderError::BadImage`] when the
//! loader is in `LoadingFailed`.

use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use hdrload_core::color::convert::to_linear_bt709;
use hdrload_core::{compose_gainmap, CompositionTarget, RawImage};

use crate::decode::{self, DecodeBackend, DecodedFrame, ImageCodecBackend};
use crate::device::{
    ColorContextDesc, ColorContextView, DeviceProvider, GpuColorContext, GpuDevice, GpuImage,
    ImageUpload, ImageView,
};
use crate::error::{DecodeError, LoaderError, Result};
use crate::heuristics::{self, DetectedGainMap};
use crate::metadata::{ColorProfile, HdrDetection, ImageMetadata};
use crate::options::ImageLoaderOptions;
use crate::state::{allowed, enforce, ImageLoaderState};

// ============================================================================
// Device-independent resources
// ============================================================================

/// CPU-side HDR10 decode into the linear BT.709 working space.
///
/// Built at load time as an upload staging buffer. The first device
/// resource creation consumes it; later creations re-derive it from the
/// retained PQ bitmap.
struct Hdr10Intermediate {
    staging: Option<RawImage>,
    profile: ColorProfile,
}

impl Hdr10Intermediate {
    fn new(source: &RawImage, source_profile: &ColorProfile) -> Result<Self, DecodeError> {
        let mut profile = ColorProfile::scrgb();
        profile.cicp = source_profile.cicp;
        Ok(Self {
            staging: Some(to_linear_bt709(source)?),
            profile,
        })
    }

    fn take_or_derive(&mut self, source: &RawImage) -> Result<RawImage> {
        match self.staging.take() {
            Some(staged) => Ok(staged),
            None => {
                log::debug!("re-deriving HDR10 intermediate");
                to_linear_bt709(source).map_err(|e| LoaderError::Processing(e.to_string()))
            }
        }
    }
}

struct DeviceIndependentResources {
    bitmap: Arc<RawImage>,
    profile: Arc<ColorProfile>,
    gain_map: Option<DetectedGainMap>,
    hdr10: Option<Hdr10Intermediate>,
    /// Gain-map base in the linear working space, built by the first
    /// composition and shared by every zoom after it.
    linear_base: Option<Arc<RawImage>>,
}

impl DeviceIndependentResources {
    /// Run the post-decode pipeline on a frame.
    fn build(
        frame: DecodedFrame,
        options: ImageLoaderOptions,
    ) -> Result<(Self, ImageMetadata), DecodeError> {
        let classification = heuristics::classify(&frame, &options.console_capture)?;
        let DecodedFrame {
            bitmap,
            pixel,
            icc_profile,
            container,
            ..
        } = frame;

        let (width, height) = (bitmap.width(), bitmap.height());
        let profile = classification.profile;
        let bitmap = decode::into_raw_image(bitmap, pixel, profile.gamut, profile.transfer)?;

        let hdr10 = match classification.detection {
            HdrDetection::Hdr10Transfer => Some(Hdr10Intermediate::new(&bitmap, &profile)?),
            _ => None,
        };

        let profile = Arc::new(profile);
        let metadata = ImageMetadata {
            is_valid: true,
            width,
            height,
            pixel,
            container,
            dynamic_range: classification.dynamic_range,
            detection: classification.detection,
            has_gain_map: classification.gain_map.is_some(),
            has_embedded_profile: icc_profile.is_some(),
            force_bt2100: options.force_bt2100,
            color_context: Some(Arc::clone(&profile)),
        };

        let resources = Self {
            bitmap: Arc::new(bitmap),
            profile,
            gain_map: classification.gain_map,
            hdr10,
            linear_base: None,
        };
        Ok((resources, metadata))
    }

    /// The bitmap converted to the linear BT.709 working space, converted at
    /// most once per load.
    fn linear_base(&mut self) -> Result<Arc<RawImage>> {
        if let Some(linear) = &self.linear_base {
            return Ok(Arc::clone(linear));
        }
        log::debug!("linearizing gain map base");
        let linear = to_linear_bt709(&self.bitmap)
            .map_err(|e| LoaderError::Processing(e.to_string()))?;
        Ok(Arc::clone(self.linear_base.insert(Arc::new(linear))))
    }

    /// Profile of what gets uploaded for the base image.
    fn upload_profile(&self) -> &ColorProfile {
        match &self.hdr10 {
            Some(hdr10) => &hdr10.profile,
            None => &self.profile,
        }
    }
}

// ============================================================================
// Device-dependent resources
// ============================================================================

struct DeviceDependentResources {
    device: Arc<dyn GpuDevice>,
    image: Arc<GpuImage>,
    color_context: Arc<GpuColorContext>,
    /// Gain-map compositions keyed by output size.
    composed: HashMap<CompositionTarget, Arc<GpuImage>>,
    /// `apply_gain_map` of the last render request.
    last_apply_gain_map: Option<bool>,
}

impl DeviceDependentResources {
    fn create(
        device: Arc<dyn GpuDevice>,
        decoded: &mut DeviceIndependentResources,
        options: ImageLoaderOptions,
    ) -> Result<Self> {
        let desc = ColorContextDesc::from_profile(decoded.upload_profile(), options.force_bt2100);
        let color_context = GpuColorContext::create(&device, desc)?;

        let image = match decoded.hdr10.as_mut() {
            Some(hdr10) => {
                let intermediate = hdr10.take_or_derive(&decoded.bitmap)?;
                GpuImage::create(&device, &ImageUpload::from_raw(&intermediate))?
            }
            None => GpuImage::create(&device, &ImageUpload::from_raw(&decoded.bitmap))?,
        };

        log::debug!(
            "created device resources: image {:?}, color context {:?}",
            image.id(),
            color_context.id()
        );
        Ok(Self {
            device,
            image: Arc::new(image),
            color_context: Arc::new(color_context),
            composed: HashMap::new(),
            last_apply_gain_map: None,
        })
    }

    fn composed_image(
        &mut self,
        linear_base: &RawImage,
        gain_map: &DetectedGainMap,
        target: CompositionTarget,
    ) -> Result<Arc<GpuImage>> {
        if let Some(image) = self.composed.get(&target) {
            return Ok(Arc::clone(image));
        }

        log::debug!("composing gain map at {}x{}", target.width, target.height);
        let hdr = compose_gainmap(linear_base, &gain_map.gain_map, &gain_map.encoding, target)
            .map_err(|e| LoaderError::Processing(e.to_string()))?;
        let image = Arc::new(GpuImage::create(&self.device, &ImageUpload::from_raw(&hdr))?);

        self.composed.insert(target, Arc::clone(&image));
        Ok(image)
    }
}

// ============================================================================
// Loader
// ============================================================================

/// Loads one still image and manages its device resources.
///
/// Single-threaded and non-reentrant; callers serialize access. One loader
/// loads at most one image: after `LoadingFailed` a new loader is needed.
///
/// # Example
///
/// ```ignore
/// let mut loader = ImageLoader::new(provider, ImageLoaderOptions::default());
/// loader.load_file("photo.jpg", "jpg")?;
/// if loader.state() == ImageLoaderState::LoadingSucceeded {
///     let view = loader.get_renderable_image(1.0, true)?;
///     renderer.draw(view.resolve()?, loader.gpu_color_context()?);
/// }
///
/// // Around device loss:
/// loader.release_device_dependent_resources()?;
/// loader.create_device_dependent_resources()?;
/// ```
pub struct ImageLoader {
    state: ImageLoaderState,
    options: ImageLoaderOptions,
    provider: Box<dyn DeviceProvider>,
    backend: Box<dyn DecodeBackend>,
    metadata: ImageMetadata,
    decoded: Option<DeviceIndependentResources>,
    device: Option<DeviceDependentResources>,
}

impl ImageLoader {
    /// Create a loader that decodes with [`ImageCodecBackend`].
    pub fn new(provider: impl DeviceProvider + 'static, options: ImageLoaderOptions) -> Self {
        Self::with_backend(provider, options, ImageCodecBackend::new())
    }

    /// Create a loader with a custom decode backend.
    pub fn with_backend(
        provider: impl DeviceProvider + 'static,
        options: ImageLoaderOptions,
        backend: impl DecodeBackend + 'static,
    ) -> Self {
        Self {
            state: ImageLoaderState::NotInitialized,
            options,
            provider: Box::new(provider),
            backend: Box::new(backend),
            metadata: ImageMetadata::invalid(),
            decoded: None,
            device: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> ImageLoaderState {
        self.state
    }

    /// Options fixed at construction.
    pub fn options(&self) -> ImageLoaderOptions {
        self.options
    }

    /// Load from a byte stream, format sniffed from its content.
    ///
    /// Malformed or unsupported data is not an error: the loader moves to
    /// [`ImageLoaderState::LoadingFailed`] and that state is returned.
    pub fn load_stream<R: Read>(&mut self, mut reader: R) -> Result<ImageLoaderState> {
        enforce(self.state, allowed::LOAD)?;

        let mut data = Vec::new();
        let frame = match reader.read_to_end(&mut data) {
            Ok(_) => self.backend.decode_stream(data.into()),
            Err(e) => Err(DecodeError::Io(e)),
        };
        self.finish_load(frame)
    }

    /// Load from a file; `extension` names the format when the content does
    /// not.
    pub fn load_file(
        &mut self,
        path: impl AsRef<Path>,
        extension: &str,
    ) -> Result<ImageLoaderState> {
        enforce(self.state, allowed::LOAD)?;
        let frame = self.backend.decode_file(path.as_ref(), extension);
        self.finish_load(frame)
    }

    fn finish_load(
        &mut self,
        frame: Result<DecodedFrame, DecodeError>,
    ) -> Result<ImageLoaderState> {
        let options = self.options;
        let built = frame.and_then(|frame| DeviceIndependentResources::build(frame, options));

        let (decoded, metadata) = match built {
            Ok(built) => built,
            Err(DecodeError::ResourceExhausted(msg)) => {
                return Err(LoaderError::ResourceExhausted(msg));
            }
            Err(e) => {
                log::warn!("image failed to load: {}", e);
                self.metadata = ImageMetadata::invalid();
                self.transition(ImageLoaderState::LoadingFailed);
                return Ok(self.state);
            }
        };

        log::info!(
            "loaded {}x{} {:?} image: {} bpc x {}{}, {:?} via {:?}",
            metadata.width,
            metadata.height,
            metadata.container,
            metadata.pixel.bits_per_channel,
            metadata.pixel.num_channels,
            if metadata.pixel.is_float { " float" } else { "" },
            metadata.dynamic_range,
            metadata.detection
        );
        self.metadata = metadata;
        let decoded = self.decoded.insert(decoded);

        let device = self
            .provider
            .current_device()
            .map_err(LoaderError::from)
            .and_then(|device| DeviceDependentResources::create(device, decoded, options));
        match device {
            Ok(device) => {
                self.device = Some(device);
                self.transition(ImageLoaderState::LoadingSucceeded);
            }
            Err(e) => {
                log::warn!("device resources unavailable after load: {}", e);
                self.transition(ImageLoaderState::NeedDeviceResources);
            }
        }
        Ok(self.state)
    }

    /// GPU image for rendering, composed with the gain map at `zoom` when
    /// `apply_gain_map` is set and the image has one.
    ///
    /// Zoom is clamped to the image's native size, so every zoom at or above
    /// 1.0 shares one composition. Compositions are cached per output size;
    /// the cache is cleared whenever `apply_gain_map` differs from the
    /// previous call.
    pub fn get_renderable_image(&mut self, zoom: f32, apply_gain_map: bool) -> Result<ImageView> {
        enforce(self.state, allowed::RENDER)?;
        if !zoom.is_finite() || zoom <= 0.0 {
            return Err(LoaderError::InvalidArgument(format!(
                "zoom must be finite and positive, got {}",
                zoom
            )));
        }

        let state = self.state;
        let (Some(decoded), Some(device)) = (self.decoded.as_mut(), self.device.as_mut()) else {
            return Err(LoaderError::WrongState {
                actual: state,
                allowed: allowed::RENDER,
            });
        };

        if device.last_apply_gain_map != Some(apply_gain_map) {
            device.composed.clear();
            device.last_apply_gain_map = Some(apply_gain_map);
        }

        if !apply_gain_map || decoded.gain_map.is_none() {
            return Ok(ImageView::new(&device.image));
        }

        let linear_base = decoded.linear_base()?;
        let target = CompositionTarget::scaled(&decoded.bitmap, zoom);
        match decoded.gain_map.as_ref() {
            Some(gain_map) => {
                let image = device.composed_image(&linear_base, gain_map, target)?;
                Ok(ImageView::new(&image))
            }
            None => Ok(ImageView::new(&device.image)),
        }
    }

    /// Device-independent color profile.
    pub fn color_context(&self) -> Result<Arc<ColorProfile>> {
        enforce(self.state, allowed::DEVICE_INDEPENDENT)?;
        self.decoded_resources().map(|d| Arc::clone(&d.profile))
    }

    /// Metadata of the loaded image.
    pub fn metadata(&self) -> Result<&ImageMetadata> {
        enforce(self.state, allowed::DEVICE_INDEPENDENT)?;
        Ok(&self.metadata)
    }

    /// The retained device-independent bitmap.
    pub fn decoded_bitmap(&self) -> Result<Arc<RawImage>> {
        enforce(self.state, allowed::DEVICE_INDEPENDENT)?;
        self.decoded_resources().map(|d| Arc::clone(&d.bitmap))
    }

    /// Device-dependent color context for the base image.
    pub fn gpu_color_context(&self) -> Result<ColorContextView> {
        enforce(self.state, allowed::RENDER)?;
        self.device
            .as_ref()
            .map(|d| ColorContextView::new(&d.color_context))
            .ok_or(LoaderError::WrongState {
                actual: self.state,
                allowed: allowed::RENDER,
            })
    }

    /// Rebuild device resources from the retained bitmap.
    ///
    /// A no-op in `LoadingSucceeded`. On a device error the state stays
    /// `NeedDeviceResources` and the call can be retried.
    pub fn create_device_dependent_resources(&mut self) -> Result<()> {
        enforce(self.state, allowed::CREATE)?;
        if self.state == ImageLoaderState::LoadingSucceeded {
            return Ok(());
        }

        let options = self.options;
        let device = self.provider.current_device()?;
        let decoded = self.decoded.as_mut().ok_or(LoaderError::WrongState {
            actual: self.state,
            allowed: allowed::CREATE,
        })?;
        self.device = Some(DeviceDependentResources::create(device, decoded, options)?);
        self.transition(ImageLoaderState::LoadingSucceeded);
        Ok(())
    }

    /// Drop every device-dependent resource. Views handed out earlier
    /// become stale. Idempotent.
    pub fn release_device_dependent_resources(&mut self) -> Result<()> {
        enforce(self.state, allowed::RELEASE)?;
        if self.device.take().is_some() {
            log::debug!("released device resources");
        }
        if self.state != ImageLoaderState::NeedDeviceResources {
            self.transition(ImageLoaderState::NeedDeviceResources);
        }
        Ok(())
    }

    fn decoded_resources(&self) -> Result<&DeviceIndependentResources> {
        self.decoded.as_ref().ok_or(LoaderError::WrongState {
            actual: self.state,
            allowed: allowed::DEVICE_INDEPENDENT,
        })
    }

    fn transition(&mut self, to: ImageLoaderState) {
        debug_assert!(
            self.state.can_transition_to(to),
            "illegal transition {:?} -> {:?}",
            self.state,
            to
        );
        log::debug!("loader state {:?} -> {:?}", self.state, to);
        self.state = to;
    }
}

impl fmt::Debug for ImageLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageLoader")
            .field("state", &self.state)
            .field("options", &self.options)
            .field("metadata", &self.metadata)
            .field("has_device_resources", &self.device.is_some())
            .finish_non_exhaustive()
    }
}
