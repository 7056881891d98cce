//! Common test utilities: synthetic image fixtures and a recording device.
//!
//! Fixtures are generated programmatically, avoiding the need to include
//! binary test files in the repository.

#![allow(dead_code)]

use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use hdrload::embedded_metadata::icc::{XBOX_HDR_ICC_HEADER, XBOX_HDR_ICC_SIZE};
use hdrload::jpeg::icc_segments;
use hdrload::{
    ColorContextDesc, ColorGamut, ColorTransfer, ContainerKind, DecodeBackend, DecodeError,
    DeviceError, DeviceProvider, GpuColorContextId, GpuDevice, GpuImageId, ImageCodecBackend,
    ImageUpload, PixelFormat, PixelInfo,
};
use hdrload::decode::{DecodePath, DecodedFrame};
use image::{DynamicImage, ImageBuffer, ImageFormat, Luma, Rgb};

/// Route `log` output through the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Encoded fixtures
// ============================================================================

/// Encode a `DynamicImage` with the `image` crate.
pub fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, format).unwrap();
    out.into_inner()
}

/// Mid-grey SDR JPEG.
pub fn sdr_jpeg(width: u32, height: u32) -> Vec<u8> {
    let image = ImageBuffer::from_pixel(width, height, Rgb([128u8, 128, 128]));
    encode(&DynamicImage::ImageRgb8(image), ImageFormat::Jpeg)
}

/// Horizontal gradient SDR PNG.
pub fn sdr_png(width: u32, height: u32) -> Vec<u8> {
    let image = ImageBuffer::from_fn(width, height, |x, _| {
        let v = (x * 255 / (width - 1).max(1)) as u8;
        Rgb([v, v, v])
    });
    encode(&DynamicImage::ImageRgb8(image), ImageFormat::Png)
}

/// Single-channel JPEG used as gain map payload.
pub fn gain_map_jpeg(width: u32, height: u32, value: u8) -> Vec<u8> {
    let image = ImageBuffer::from_pixel(width, height, Luma([value]));
    encode(&DynamicImage::ImageLuma8(image), ImageFormat::Jpeg)
}

/// Floating-point OpenEXR image with values above SDR white.
pub fn float_exr(width: u32, height: u32) -> Vec<u8> {
    let image = ImageBuffer::from_pixel(width, height, Rgb([2.5f32, 1.0, 0.25]));
    encode(&DynamicImage::ImageRgb32F(image), ImageFormat::OpenExr)
}

/// 16-bit PNG carrying a `cICP` chunk for BT.2020 primaries with PQ.
///
/// Samples are half code value, roughly 92 nits under PQ.
pub fn pq_png(width: u32, height: u32) -> Vec<u8> {
    let image = ImageBuffer::from_pixel(width, height, Rgb([32768u16, 32768, 32768]));
    let png = encode(&DynamicImage::ImageRgb16(image), ImageFormat::Png);
    insert_png_chunk(&png, b"cICP", &[9, 16, 0, 1])
}

fn iso_box(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = ((body.len() + 8) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(kind);
    out.extend_from_slice(body);
    out
}

fn full_box(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut full = vec![0, 0, 0, 0];
    full.extend_from_slice(body);
    iso_box(kind, &full)
}

/// HEIF with one `hvc1` primary item tagged BT.2020 PQ through `nclx`.
///
/// The `mdat` payload is not a real HEVC stream; pair it with
/// [`HevcStubBackend`] to stand in for the codec.
pub fn pq_heic() -> Vec<u8> {
    let mut ftyp = b"heic".to_vec();
    ftyp.extend_from_slice(&0u32.to_be_bytes());
    ftyp.extend_from_slice(b"mif1heic");

    let pitm = full_box(b"pitm", &1u16.to_be_bytes());

    let mut infe = 1u16.to_be_bytes().to_vec();
    infe.extend_from_slice(&0u16.to_be_bytes());
    infe.extend_from_slice(b"hvc1");
    infe.push(0);
    let mut infe_box = vec![2, 0, 0, 0];
    infe_box.extend_from_slice(&infe);
    let mut iinf_body = 1u16.to_be_bytes().to_vec();
    iinf_body.extend_from_slice(&iso_box(b"infe", &infe_box));
    let iinf = full_box(b"iinf", &iinf_body);

    let mut nclx = b"nclx".to_vec();
    for code in [9u16, 16, 9] {
        nclx.extend_from_slice(&code.to_be_bytes());
    }
    nclx.push(0x80);
    let ipco = iso_box(b"ipco", &iso_box(b"colr", &nclx));

    let mut ipma_body = 1u32.to_be_bytes().to_vec();
    ipma_body.extend_from_slice(&1u16.to_be_bytes());
    ipma_body.extend_from_slice(&[1, 0x81]);
    let mut iprp_body = ipco;
    iprp_body.extend_from_slice(&full_box(b"ipma", &ipma_body));

    let mut meta_body = pitm;
    meta_body.extend_from_slice(&iinf);
    meta_body.extend_from_slice(&iso_box(b"iprp", &iprp_body));

    let mut file = iso_box(b"ftyp", &ftyp);
    file.extend_from_slice(&full_box(b"meta", &meta_body));
    file.extend_from_slice(&iso_box(b"mdat", &[0; 16]));
    file
}

/// Insert a chunk directly after IHDR.
pub fn insert_png_chunk(png: &[u8], kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    // signature (8) + IHDR length, type, 13 data bytes, CRC
    let after_ihdr = 8 + 4 + 4 + 13 + 4;
    let mut out = png[..after_ihdr].to_vec();
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    let crc_start = out.len();
    out.extend_from_slice(kind);
    out.extend_from_slice(payload);
    let crc = crc32(&out[crc_start..]);
    out.extend_from_slice(&crc.to_be_bytes());
    out.extend_from_slice(&png[after_ihdr..]);
    out
}

/// CRC-32 (ISO-HDLC) as used by PNG.
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ 0xEDB8_8320
            } else {
                crc >> 1
            };
        }
    }
    !crc
}

/// Build a complete JPEG marker segment.
pub fn jpeg_segment(marker: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0xFF, marker];
    out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// APP1 XMP segment.
pub fn xmp_segment(xmp: &str) -> Vec<u8> {
    let mut payload = b"http://ns.adobe.com/xap/1.0/\0".to_vec();
    payload.extend_from_slice(xmp.as_bytes());
    jpeg_segment(0xE1, &payload)
}

/// Insert complete segments directly after SOI.
pub fn insert_after_soi(jpeg: &[u8], segments: &[Vec<u8>]) -> Vec<u8> {
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    let mut out = jpeg[..2].to_vec();
    for segment in segments {
        out.extend_from_slice(segment);
    }
    out.extend_from_slice(&jpeg[2..]);
    out
}

/// A profile matching the console HDR capture header.
pub fn xbox_icc_profile() -> Vec<u8> {
    let mut profile = XBOX_HDR_ICC_HEADER.to_vec();
    profile.resize(XBOX_HDR_ICC_SIZE, 0);
    profile
}

/// SDR JPEG tagged with the console HDR capture profile.
pub fn xbox_screenshot_jpeg(width: u32, height: u32) -> Vec<u8> {
    insert_after_soi(&sdr_jpeg(width, height), &icc_segments(&xbox_icc_profile()))
}

/// `hdrgm` packet with a 4x maximum boost.
pub const HDRGM_XMP: &str = r#"<x:xmpmeta xmlns:x="adobe:ns:meta/">
  <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
    <rdf:Description rdf:about=""
        xmlns:hdrgm="http://ns.adobe.com/hdr-gain-map/1.0/"
        hdrgm:Version="1.0"
        hdrgm:GainMapMin="0"
        hdrgm:GainMapMax="2"
        hdrgm:Gamma="1"
        hdrgm:OffsetSDR="0.015625"
        hdrgm:OffsetHDR="0.015625"
        hdrgm:HDRCapacityMin="0"
        hdrgm:HDRCapacityMax="2"/>
  </rdf:RDF>
</x:xmpmeta>"#;

/// Apple auxiliary gain map packet with a 3x headroom.
pub const APPLE_XMP: &str = r#"<x:xmpmeta xmlns:x="adobe:ns:meta/">
  <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
    <rdf:Description rdf:about=""
        xmlns:HDRGainMap="http://ns.apple.com/HDRGainMap/1.0/"
        HDRGainMap:HDRGainMapVersion="65536"
        HDRGainMap:HDRGainMapHeadroom="3.0"/>
  </rdf:RDF>
</x:xmpmeta>"#;

/// Big-endian MPF APP2 segment listing a primary and one secondary image.
///
/// `secondary_offset` is relative to the TIFF header.
fn mpf_segment(primary_size: u32, secondary_offset: u32, secondary_size: u32) -> Vec<u8> {
    let mut payload = b"MPF\0".to_vec();
    payload.extend_from_slice(b"MM\x00\x2A");
    payload.extend_from_slice(&8u32.to_be_bytes());
    payload.extend_from_slice(&2u16.to_be_bytes());
    // NumberOfImages, LONG x 1
    payload.extend_from_slice(&0xB001u16.to_be_bytes());
    payload.extend_from_slice(&4u16.to_be_bytes());
    payload.extend_from_slice(&1u32.to_be_bytes());
    payload.extend_from_slice(&2u32.to_be_bytes());
    // MPEntry, UNDEFINED x 32, stored just past the IFD
    let entries_at = 8 + 2 + 2 * 12 + 4;
    payload.extend_from_slice(&0xB002u16.to_be_bytes());
    payload.extend_from_slice(&7u16.to_be_bytes());
    payload.extend_from_slice(&32u32.to_be_bytes());
    payload.extend_from_slice(&(entries_at as u32).to_be_bytes());
    // next IFD
    payload.extend_from_slice(&0u32.to_be_bytes());

    // primary: baseline MP primary image
    payload.extend_from_slice(&0x0003_0000u32.to_be_bytes());
    payload.extend_from_slice(&primary_size.to_be_bytes());
    payload.extend_from_slice(&0u32.to_be_bytes());
    payload.extend_from_slice(&[0; 4]);
    // secondary
    payload.extend_from_slice(&0u32.to_be_bytes());
    payload.extend_from_slice(&secondary_size.to_be_bytes());
    payload.extend_from_slice(&secondary_offset.to_be_bytes());
    payload.extend_from_slice(&[0; 4]);

    jpeg_segment(0xE2, &payload)
}

/// Primary JPEG with an MPF directory pointing at `secondary`, appended.
///
/// `primary_segments` go before the MPF segment.
pub fn with_mpf_secondary(
    primary: &[u8],
    primary_segments: &[Vec<u8>],
    secondary: &[u8],
) -> Vec<u8> {
    let mpf_pos = 2 + primary_segments.iter().map(Vec::len).sum::<usize>();

    let mut segments = primary_segments.to_vec();
    segments.push(mpf_segment(0, 0, 0));
    let primary_len = insert_after_soi(primary, &segments).len();

    let tiff_start = mpf_pos + 8;
    *segments.last_mut().unwrap() = mpf_segment(
        primary_len as u32,
        (primary_len - tiff_start) as u32,
        secondary.len() as u32,
    );

    let mut out = insert_after_soi(primary, &segments);
    assert_eq!(out.len(), primary_len);
    out.extend_from_slice(secondary);
    out
}

/// Ultra HDR style JPEG: SDR base, `hdrgm` gain map listed in MPF.
pub fn ultrahdr_jpeg(width: u32, height: u32, gain: u8) -> Vec<u8> {
    let secondary = insert_after_soi(
        &gain_map_jpeg(width / 2, height / 2, gain),
        &[xmp_segment(HDRGM_XMP)],
    );
    with_mpf_secondary(&sdr_jpeg(width, height), &[], &secondary)
}

/// Apple style JPEG: SDR base, auxiliary gain map listed in MPF.
pub fn apple_gain_map_jpeg(width: u32, height: u32, gain: u8) -> Vec<u8> {
    let secondary = insert_after_soi(
        &gain_map_jpeg(width / 2, height / 2, gain),
        &[xmp_segment(APPLE_XMP)],
    );
    with_mpf_secondary(&sdr_jpeg(width, height), &[], &secondary)
}

/// Two JPEGs concatenated without an MPF directory.
pub fn concatenated_jpeg(width: u32, height: u32, secondary_xmp: Option<&str>) -> Vec<u8> {
    let gain_map = gain_map_jpeg(width / 2, height / 2, 255);
    let secondary = match secondary_xmp {
        Some(xmp) => insert_after_soi(&gain_map, &[xmp_segment(xmp)]),
        None => gain_map,
    };
    let mut out = sdr_jpeg(width, height);
    out.extend_from_slice(&secondary);
    out
}

/// Bytes no codec recognises.
pub fn garbage() -> Vec<u8> {
    b"definitely not an image, just some text".to_vec()
}

/// PNG cut off right after its header chunk.
pub fn truncated_png() -> Vec<u8> {
    sdr_png(16, 16)[..40].to_vec()
}

/// Write `data` to a temporary directory under `name`.
pub fn write_temp(dir: &tempfile::TempDir, name: &str, data: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, data).unwrap();
    path
}

/// Decode an `Rgba32F` upload's first pixel.
pub fn first_pixel_f32(data: &[u8]) -> [f32; 4] {
    let mut px = [0.0; 4];
    for (i, v) in px.iter_mut().enumerate() {
        *v = f32::from_le_bytes(data[i * 4..i * 4 + 4].try_into().unwrap());
    }
    px
}

// ============================================================================
// Device doubles
// ============================================================================

/// What a recording device saw for one image upload.
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub id: u64,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub gamut: ColorGamut,
    pub transfer: ColorTransfer,
    pub data: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct Ledger {
    next: u64,
    pub uploads: Vec<RecordedUpload>,
    pub contexts: Vec<ColorContextDesc>,
    pub live_images: Vec<u64>,
    pub live_contexts: Vec<u64>,
    pub fail_with: Option<DeviceError>,
}

/// Device that records every call and tracks live objects.
#[derive(Debug, Default)]
pub struct RecordingDevice {
    pub ledger: Mutex<Ledger>,
}

impl RecordingDevice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn live_images(&self) -> usize {
        self.ledger.lock().unwrap().live_images.len()
    }

    pub fn live_contexts(&self) -> usize {
        self.ledger.lock().unwrap().live_contexts.len()
    }

    pub fn upload_count(&self) -> usize {
        self.ledger.lock().unwrap().uploads.len()
    }

    pub fn last_upload(&self) -> RecordedUpload {
        self.ledger.lock().unwrap().uploads.last().cloned().unwrap()
    }

    pub fn upload(&self, id: u64) -> RecordedUpload {
        let ledger = self.ledger.lock().unwrap();
        ledger.uploads.iter().find(|u| u.id == id).cloned().unwrap()
    }

    pub fn last_context(&self) -> ColorContextDesc {
        self.ledger.lock().unwrap().contexts.last().cloned().unwrap()
    }

    /// Make every subsequent create call fail.
    pub fn fail_with(&self, error: Option<DeviceError>) {
        self.ledger.lock().unwrap().fail_with = error;
    }
}

impl GpuDevice for RecordingDevice {
    fn create_image(&self, upload: &ImageUpload<'_>) -> Result<GpuImageId, DeviceError> {
        let mut ledger = self.ledger.lock().unwrap();
        if let Some(err) = ledger.fail_with.clone() {
            return Err(err);
        }
        ledger.next += 1;
        let id = ledger.next;
        ledger.live_images.push(id);
        ledger.uploads.push(RecordedUpload {
            id,
            width: upload.width,
            height: upload.height,
            format: upload.format,
            gamut: upload.gamut,
            transfer: upload.transfer,
            data: upload.data.to_vec(),
        });
        Ok(GpuImageId(id))
    }

    fn destroy_image(&self, id: GpuImageId) {
        let mut ledger = self.ledger.lock().unwrap();
        let before = ledger.live_images.len();
        ledger.live_images.retain(|&i| i != id.0);
        assert_eq!(ledger.live_images.len() + 1, before, "double destroy of image {}", id.0);
    }

    fn create_color_context(
        &self,
        desc: &ColorContextDesc,
    ) -> Result<GpuColorContextId, DeviceError> {
        let mut ledger = self.ledger.lock().unwrap();
        if let Some(err) = ledger.fail_with.clone() {
            return Err(err);
        }
        ledger.next += 1;
        let id = ledger.next;
        ledger.live_contexts.push(id);
        ledger.contexts.push(desc.clone());
        Ok(GpuColorContextId(id))
    }

    fn destroy_color_context(&self, id: GpuColorContextId) {
        let mut ledger = self.ledger.lock().unwrap();
        let before = ledger.live_contexts.len();
        ledger.live_contexts.retain(|&i| i != id.0);
        assert_eq!(ledger.live_contexts.len() + 1, before, "double destroy of context {}", id.0);
    }
}

/// Provider whose device can be lost and replaced.
#[derive(Debug)]
pub struct TestProvider {
    device: Mutex<Option<Arc<RecordingDevice>>>,
}

impl TestProvider {
    pub fn new(device: Arc<RecordingDevice>) -> Arc<Self> {
        Arc::new(Self {
            device: Mutex::new(Some(device)),
        })
    }

    /// Provider with no device available.
    pub fn lost() -> Arc<Self> {
        Arc::new(Self {
            device: Mutex::new(None),
        })
    }

    pub fn lose_device(&self) {
        *self.device.lock().unwrap() = None;
    }

    pub fn replace_device(&self, device: Arc<RecordingDevice>) {
        *self.device.lock().unwrap() = Some(device);
    }
}

impl DeviceProvider for TestProvider {
    fn current_device(&self) -> Result<Arc<dyn GpuDevice>, DeviceError> {
        match self.device.lock().unwrap().as_ref() {
            Some(device) => Ok(Arc::clone(device) as Arc<dyn GpuDevice>),
            None => Err(DeviceError::DeviceLost),
        }
    }
}

/// Decode backend that counts how often it is asked to decode.
#[derive(Debug, Clone, Default)]
pub struct CountingBackend {
    inner: ImageCodecBackend,
    pub calls: Arc<AtomicUsize>,
}

impl CountingBackend {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DecodeBackend for CountingBackend {
    fn decode_stream(&self, data: Arc<[u8]>) -> Result<DecodedFrame, DecodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.decode_stream(data)
    }

    fn decode_file(&self, path: &Path, extension: &str) -> Result<DecodedFrame, DecodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.decode_file(path, extension)
    }
}

/// Backend standing in for the HEVC codec: HEIF files decode to a flat
/// 10-bit frame carrying the container's metadata, the way the `heif`
/// feature's libheif path reports them. Other files use the `image` crate.
#[derive(Debug, Clone, Default)]
pub struct HevcStubBackend {
    inner: ImageCodecBackend,
}

impl HevcStubBackend {
    /// 10-bit code value of every decoded sample.
    pub const CODE_VALUE: u16 = 512;
}

impl DecodeBackend for HevcStubBackend {
    fn decode_stream(&self, data: Arc<[u8]>) -> Result<DecodedFrame, DecodeError> {
        self.inner.decode_stream(data)
    }

    fn decode_file(&self, path: &Path, extension: &str) -> Result<DecodedFrame, DecodeError> {
        let data: Arc<[u8]> = std::fs::read(path)?.into();
        let probe = hdrload::container::probe(&data);
        if probe.container != Some(ContainerKind::Heif) {
            return self.inner.decode_file(path, extension);
        }

        let sample = (u32::from(Self::CODE_VALUE) * 65535 / 1023) as u16;
        let bitmap = ImageBuffer::from_pixel(8, 4, Rgb([sample, sample, sample]));
        Ok(DecodedFrame {
            bitmap: DynamicImage::ImageRgb16(bitmap),
            pixel: PixelInfo {
                bits_per_pixel: 30,
                bits_per_channel: 10,
                num_channels: 3,
                is_float: false,
            },
            icc_profile: probe.icc_profile,
            container: ContainerKind::Heif,
            cicp: probe.cicp,
            path: DecodePath::StillImage,
            encoded: data,
        })
    }
}
