//! Container probes for metadata the pixel codec does not report.
//!
//! The still-image decode path uses these to recover CICP transfer
//! characteristics (PNG `cICP`, HEIF/AVIF `nclx`) before handing the pixels
//! to the codec.

pub mod heif;
pub mod png;

use hdrload_core::metadata::Cicp;

use crate::jpeg;
use crate::metadata::ContainerKind;

/// Container-level facts gathered without decoding pixels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerProbe {
    /// Container identified from magic bytes, if recognised.
    pub container: Option<ContainerKind>,
    /// CICP code points declared by the container.
    pub cicp: Option<Cicp>,
    /// ICC profile found in the container structure.
    pub icc_profile: Option<Vec<u8>>,
    /// The primary image uses a codec no available backend decodes.
    pub undecodable: Option<&'static str>,
}

/// Inspect `data` by magic bytes.
pub fn probe(data: &[u8]) -> ContainerProbe {
    if png::is_png(data) {
        return ContainerProbe {
            container: Some(ContainerKind::Png),
            cicp: png::find_cicp(data),
            ..Default::default()
        };
    }

    if jpeg::is_jpeg(data) {
        return ContainerProbe {
            container: Some(ContainerKind::Jpeg),
            icc_profile: jpeg::extract_icc_profile(&jpeg::scan_segments(data)),
            ..Default::default()
        };
    }

    if let Some(info) = heif::probe(data) {
        let undecodable = match info.container() {
            ContainerKind::Heif if info.is_hevc() && !cfg!(feature = "heif") => {
                Some("HEVC-coded HEIF (built without `heif`)")
            }
            ContainerKind::Heif if info.is_hevc() => None,
            ContainerKind::Heif => Some("HEIF without a decodable primary item"),
            ContainerKind::Avif if !cfg!(feature = "avif") => Some("AVIF (built without `avif`)"),
            _ => None,
        };
        return ContainerProbe {
            container: Some(info.container()),
            cicp: info.nclx,
            icc_profile: info.icc_profile,
            undecodable,
        };
    }

    ContainerProbe::default()
}

/// Map a file extension to a container, ignoring case and a leading dot.
pub fn container_from_extension(extension: &str) -> Option<ContainerKind> {
    let ext = extension.trim_start_matches('.').to_ascii_lowercase();
    match ext.as_str() {
        "heic" | "heif" | "hif" => Some(ContainerKind::Heif),
        "avif" => Some(ContainerKind::Avif),
        _ => image::ImageFormat::from_extension(&ext).map(ContainerKind::from_format),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_png_cicp() {
        let mut data = png::PNG_SIGNATURE.to_vec();
        png::tests::push_chunk(&mut data, b"IHDR", &[0; 13]);
        png::tests::push_chunk(&mut data, b"cICP", &[9, 16, 0, 1]);
        png::tests::push_chunk(&mut data, b"IEND", &[]);

        let probe = probe(&data);
        assert_eq!(probe.container, Some(ContainerKind::Png));
        assert!(probe.cicp.is_some_and(|c| c.is_pq()));
        assert!(probe.undecodable.is_none());
    }

    #[test]
    fn test_hevc_heif_decodable_with_heif_feature() {
        let data = heif::tests::heif_file(b"heic", b"hvc1", 16);
        let probe = probe(&data);
        assert_eq!(probe.container, Some(ContainerKind::Heif));
        assert!(probe.cicp.is_some_and(|c| c.is_pq()));
        assert_eq!(probe.undecodable.is_none(), cfg!(feature = "heif"));
    }

    #[test]
    fn test_non_hevc_heif_is_undecodable() {
        let data = heif::tests::heif_file(b"heic", b"jpeg", 16);
        assert!(probe(&data).undecodable.is_some());
    }

    #[test]
    fn test_probe_unknown() {
        assert_eq!(probe(b"not an image"), ContainerProbe::default());
    }

    #[test]
    fn test_extension_mapping() {
        assert_eq!(container_from_extension(".HEIC"), Some(ContainerKind::Heif));
        assert_eq!(container_from_extension("jpg"), Some(ContainerKind::Jpeg));
        assert_eq!(container_from_extension("hdr"), Some(ContainerKind::Radiance));
        assert_eq!(container_from_extension("xyz"), None);
    }
}
