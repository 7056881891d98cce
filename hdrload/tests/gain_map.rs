//! Gain map detection and per-zoom composition.

mod common;

use std::sync::Arc;

use common::{
    apple_gain_map_jpeg, concatenated_jpeg, first_pixel_f32, init_logging, sdr_jpeg,
    ultrahdr_jpeg, RecordingDevice, TestProvider, HDRGM_XMP,
};
use hdrload::heuristics::detect_gain_map;
use hdrload::{
    ColorTransfer, DynamicRange, GainMapEncoding, HdrDetection, ImageLoader, ImageLoaderOptions,
    ImageLoaderState, PixelFormat,
};

fn load(data: &[u8]) -> (ImageLoader, Arc<RecordingDevice>) {
    init_logging();
    let device = RecordingDevice::new();
    let mut loader = ImageLoader::new(
        TestProvider::new(device.clone()),
        ImageLoaderOptions::default(),
    );
    assert_eq!(
        loader.load_stream(data).unwrap(),
        ImageLoaderState::LoadingSucceeded
    );
    (loader, device)
}

// ============================================================================
// Detection
// ============================================================================

#[test]
fn test_ultrahdr_mpf_gain_map_detected() {
    let (loader, _device) = load(&ultrahdr_jpeg(32, 32, 255));
    let meta = loader.metadata().unwrap();

    assert_eq!(meta.dynamic_range, DynamicRange::Hdr);
    assert_eq!(meta.detection, HdrDetection::GainMap);
    assert!(meta.has_gain_map);
    // The base itself is plain sRGB.
    assert_eq!(loader.color_context().unwrap().transfer, ColorTransfer::Srgb);
}

#[test]
fn test_hdrgm_encoding_values() {
    let detected = detect_gain_map(&ultrahdr_jpeg(16, 16, 128)).unwrap().unwrap();

    assert_eq!((detected.gain_map.width, detected.gain_map.height), (8, 8));
    assert_eq!(detected.gain_map.channels, 1);
    match detected.encoding {
        GainMapEncoding::Adaptive(metadata) => {
            assert!((metadata.max_content_boost[0] - 4.0).abs() < 1e-4);
            assert!((metadata.hdr_capacity_max - 4.0).abs() < 1e-4);
        }
        other => panic!("expected hdrgm encoding, got {:?}", other),
    }
}

#[test]
fn test_apple_gain_map_detected() {
    let detected = detect_gain_map(&apple_gain_map_jpeg(16, 16, 200)).unwrap().unwrap();
    assert_eq!(detected.encoding, GainMapEncoding::Apple { headroom: 3.0 });

    let (loader, _device) = load(&apple_gain_map_jpeg(16, 16, 200));
    assert_eq!(loader.metadata().unwrap().detection, HdrDetection::GainMap);
}

#[test]
fn test_concatenated_gain_map_without_mpf() {
    let (loader, _device) = load(&concatenated_jpeg(16, 16, Some(HDRGM_XMP)));
    assert_eq!(loader.metadata().unwrap().detection, HdrDetection::GainMap);
}

#[test]
fn test_concatenated_jpeg_without_xmp_is_sdr() {
    let (loader, _device) = load(&concatenated_jpeg(16, 16, None));
    let meta = loader.metadata().unwrap();
    assert_eq!(meta.dynamic_range, DynamicRange::Sdr);
    assert!(!meta.has_gain_map);
}

#[test]
fn test_broken_gain_map_fails_the_load() {
    // Headroom below 1.0 cannot describe a brighter rendition.
    let xmp = common::APPLE_XMP.replace("3.0", "0.5");
    let secondary = common::insert_after_soi(
        &common::gain_map_jpeg(8, 8, 255),
        &[common::xmp_segment(&xmp)],
    );
    let jpeg = common::with_mpf_secondary(&sdr_jpeg(16, 16), &[], &secondary);

    init_logging();
    let mut loader = ImageLoader::new(
        TestProvider::new(RecordingDevice::new()),
        ImageLoaderOptions::default(),
    );
    assert_eq!(
        loader.load_stream(&jpeg[..]).unwrap(),
        ImageLoaderState::LoadingFailed
    );
}

// ============================================================================
// Composition
// ============================================================================

#[test]
fn test_apply_gain_map_boosts_base() {
    let (mut loader, device) = load(&ultrahdr_jpeg(16, 16, 255));
    let base = loader.get_renderable_image(1.0, false).unwrap().resolve().unwrap();
    let hdr = loader.get_renderable_image(1.0, true).unwrap().resolve().unwrap();
    assert_ne!(base.id(), hdr.id());

    assert_eq!(base.format(), PixelFormat::Rgba8);
    assert_eq!(hdr.format(), PixelFormat::Rgba32F);
    assert_eq!(hdr.transfer(), ColorTransfer::Linear);

    let sdr_px = hdrload::color::transfer::srgb_eotf(128.0 / 255.0);
    let hdr_px = first_pixel_f32(&device.upload(hdr.id().0).data);
    assert!(
        hdr_px[1] > sdr_px * 2.0,
        "full gain should boost {} well above {}",
        hdr_px[1],
        sdr_px
    );
}

#[test]
fn test_composition_follows_zoom() {
    let (mut loader, _device) = load(&ultrahdr_jpeg(32, 16, 200));

    let half = loader.get_renderable_image(0.5, true).unwrap().resolve().unwrap();
    assert_eq!((half.width(), half.height()), (16, 8));

    // Zoom past native size composes at native size.
    let big = loader.get_renderable_image(4.0, true).unwrap().resolve().unwrap();
    assert_eq!((big.width(), big.height()), (32, 16));
}

#[test]
fn test_composition_cached_per_zoom() {
    let (mut loader, device) = load(&ultrahdr_jpeg(16, 16, 200));

    let first = loader.get_renderable_image(0.5, true).unwrap();
    let uploads = device.upload_count();
    let again = loader.get_renderable_image(0.5, true).unwrap();
    assert_eq!(device.upload_count(), uploads);
    assert_eq!(first.resolve().unwrap().id(), again.resolve().unwrap().id());

    loader.get_renderable_image(0.25, true).unwrap();
    assert_eq!(device.upload_count(), uploads + 1);
    assert!(!first.is_stale());
}

#[test]
fn test_zooms_past_native_share_one_composition() {
    let (mut loader, device) = load(&ultrahdr_jpeg(64, 64, 200));
    let uploads = device.upload_count();

    let first = loader.get_renderable_image(1.0, true).unwrap().resolve().unwrap();
    for i in 1..50 {
        let zoom = 1.0 + i as f32 * 0.1;
        let view = loader.get_renderable_image(zoom, true).unwrap();
        assert_eq!(view.resolve().unwrap().id(), first.id());
    }

    assert_eq!(device.upload_count(), uploads + 1);
    // Base image plus the one composition.
    assert_eq!(device.live_images(), 2);
}

#[test]
fn test_zooms_with_same_output_size_share_composition() {
    let (mut loader, device) = load(&ultrahdr_jpeg(16, 16, 200));

    // Both round up to 8x8.
    let a = loader.get_renderable_image(0.5, true).unwrap().resolve().unwrap();
    let b = loader.get_renderable_image(0.47, true).unwrap().resolve().unwrap();
    assert_eq!(a.id(), b.id());
    assert_eq!((b.width(), b.height()), (8, 8));
    assert_eq!(device.live_images(), 2);
}

#[test]
fn test_toggling_apply_clears_cache() {
    let (mut loader, device) = load(&ultrahdr_jpeg(16, 16, 200));

    let composed = loader.get_renderable_image(0.5, true).unwrap();
    let before = composed.resolve().unwrap().id();

    loader.get_renderable_image(0.5, false).unwrap();
    assert!(composed.is_stale());

    let recomposed = loader.get_renderable_image(0.5, true).unwrap();
    let after = recomposed.resolve().unwrap().id();
    assert_ne!(after, before);
    assert_eq!(device.upload(before.0).data, device.upload(after.0).data);
    // Base image plus the one live composition.
    assert_eq!(device.live_images(), 2);
}

#[test]
fn test_apply_without_gain_map_returns_base() {
    let (mut loader, device) = load(&sdr_jpeg(16, 16));

    let plain = loader.get_renderable_image(1.0, false).unwrap().resolve().unwrap();
    let applied = loader.get_renderable_image(0.5, true).unwrap().resolve().unwrap();
    assert_eq!(plain.id(), applied.id());
    assert_eq!(device.upload_count(), 1);
}
