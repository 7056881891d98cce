//! HEIF / AVIF (ISO BMFF) metadata probe.
//!
//! Reads just enough of the box structure to learn the primary item's codec
//! and its `colr` property: either `nclx` code points or an embedded ICC
//! profile. Pixel payloads are never touched.

use hdrload_core::metadata::Cicp;

use crate::metadata::ContainerKind;

const HEIF_BRANDS: &[&[u8; 4]] = &[
    b"heic", b"heix", b"hevc", b"hevx", b"heim", b"heis", b"mif1", b"msf1", b"avif", b"avis",
];

/// Coding format of an image item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemCodec {
    /// `hvc1`
    Hevc,
    /// `av01`
    Av1,
    /// Any other item type.
    Other([u8; 4]),
}

impl ItemCodec {
    fn from_item_type(kind: [u8; 4]) -> Self {
        match &kind {
            b"hvc1" => ItemCodec::Hevc,
            b"av01" => ItemCodec::Av1,
            _ => ItemCodec::Other(kind),
        }
    }
}

/// What the probe learned about a HEIF family file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeifInfo {
    /// `ftyp` major brand.
    pub major_brand: [u8; 4],
    /// `ftyp` compatible brands.
    pub compatible_brands: Vec<[u8; 4]>,
    /// Codec of the primary item (of its tiles, for grid items).
    pub primary_codec: Option<ItemCodec>,
    /// `nclx` color property of the primary item.
    pub nclx: Option<Cicp>,
    /// ICC profile from a `prof` or `rICC` color property.
    pub icc_profile: Option<Vec<u8>>,
}

impl HeifInfo {
    /// Container kind: AVIF when the primary item is AV1 coded.
    pub fn container(&self) -> ContainerKind {
        match self.primary_codec {
            Some(ItemCodec::Av1) => ContainerKind::Avif,
            Some(_) => ContainerKind::Heif,
            None if &self.major_brand == b"avif" || &self.major_brand == b"avis" => {
                ContainerKind::Avif
            }
            None => ContainerKind::Heif,
        }
    }

    /// Returns true when the primary item is HEVC coded.
    pub fn is_hevc(&self) -> bool {
        self.primary_codec == Some(ItemCodec::Hevc)
    }
}

/// Returns true if `data` begins with an `ftyp` box naming a HEIF brand.
pub fn is_heif(data: &[u8]) -> bool {
    let Some(ftyp) = BoxIter::new(data).next() else {
        return false;
    };
    if &ftyp.kind != b"ftyp" || ftyp.body.len() < 8 {
        return false;
    }
    let (major, compatible) = parse_ftyp(ftyp.body);
    HEIF_BRANDS.contains(&&major) || compatible.iter().any(|b| HEIF_BRANDS.contains(&b))
}

/// Probe a HEIF/AVIF file. Returns `None` if it is not one.
pub fn probe(data: &[u8]) -> Option<HeifInfo> {
    if !is_heif(data) {
        return None;
    }

    let mut info = HeifInfo {
        major_brand: [0; 4],
        compatible_brands: Vec::new(),
        primary_codec: None,
        nclx: None,
        icc_profile: None,
    };

    for top in BoxIter::new(data) {
        match &top.kind {
            b"ftyp" => {
                let (major, compatible) = parse_ftyp(top.body);
                info.major_brand = major;
                info.compatible_brands = compatible;
            }
            b"meta" if top.body.len() >= 4 => {
                parse_meta(&top.body[4..], &mut info);
            }
            _ => {}
        }
    }

    log::debug!(
        "HEIF probe: brand {:?}, codec {:?}, nclx {:?}, icc {}",
        String::from_utf8_lossy(&info.major_brand),
        info.primary_codec,
        info.nclx,
        info.icc_profile.is_some()
    );
    Some(info)
}

fn parse_ftyp(body: &[u8]) -> ([u8; 4], Vec<[u8; 4]>) {
    let mut major = [0u8; 4];
    if body.len() >= 4 {
        major.copy_from_slice(&body[..4]);
    }
    let compatible = body
        .get(8..)
        .unwrap_or_default()
        .chunks_exact(4)
        .map(|c| [c[0], c[1], c[2], c[3]])
        .collect();
    (major, compatible)
}

/// A color property from `ipco`.
enum ColorProperty<'a> {
    Nclx(Cicp),
    Icc(&'a [u8]),
}

fn parse_meta(children: &[u8], info: &mut HeifInfo) {
    let mut primary_id = None;
    let mut item_types: Vec<(u32, [u8; 4])> = Vec::new();
    let mut properties: Vec<Option<ColorProperty<'_>>> = Vec::new();
    let mut associations: Vec<(u32, Vec<u16>)> = Vec::new();

    for child in BoxIter::new(children) {
        match &child.kind {
            b"pitm" => primary_id = parse_pitm(child.body),
            b"iinf" => item_types = parse_iinf(child.body),
            b"iprp" => {
                for sub in BoxIter::new(child.body) {
                    match &sub.kind {
                        b"ipco" => {
                            properties = BoxIter::new(sub.body).map(parse_color).collect();
                        }
                        b"ipma" => associations = parse_ipma(sub.body),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    let primary_type = primary_id
        .and_then(|id| item_types.iter().find(|(item, _)| *item == id))
        .map(|(_, kind)| *kind);
    info.primary_codec = match primary_type {
        Some(kind) if &kind == b"grid" => item_types
            .iter()
            .map(|(_, kind)| ItemCodec::from_item_type(*kind))
            .find(|codec| matches!(codec, ItemCodec::Hevc | ItemCodec::Av1)),
        Some(kind) => Some(ItemCodec::from_item_type(kind)),
        None => None,
    };

    let associated: Vec<&ColorProperty<'_>> = primary_id
        .and_then(|id| associations.iter().find(|(item, _)| *item == id))
        .map(|(_, indices)| {
            indices
                .iter()
                .filter_map(|&i| properties.get((i as usize).checked_sub(1)?)?.as_ref())
                .collect()
        })
        .unwrap_or_default();

    // Without an association (or for grid items without their own colr) use
    // the first color property in the file.
    let candidates: Vec<&ColorProperty<'_>> = if associated.is_empty() {
        properties.iter().flatten().collect()
    } else {
        associated
    };

    for property in candidates {
        match property {
            ColorProperty::Nclx(cicp) if info.nclx.is_none() => info.nclx = Some(*cicp),
            ColorProperty::Icc(profile) if info.icc_profile.is_none() => {
                info.icc_profile = Some(profile.to_vec());
            }
            _ => {}
        }
    }
}

fn parse_pitm(body: &[u8]) -> Option<u32> {
    match *body.first()? {
        0 => Some(read_u16(body, 4)? as u32),
        _ => read_u32(body, 4),
    }
}

fn parse_iinf(body: &[u8]) -> Vec<(u32, [u8; 4])> {
    let Some(&version) = body.first() else {
        return Vec::new();
    };
    let entries_at = if version == 0 { 6 } else { 8 };
    let Some(entries) = body.get(entries_at..) else {
        return Vec::new();
    };

    BoxIter::new(entries)
        .filter(|b| &b.kind == b"infe")
        .filter_map(|infe| {
            let body = infe.body;
            // item_type exists from infe version 2.
            let (id, type_at) = match *body.first()? {
                2 => (read_u16(body, 4)? as u32, 8),
                3 => (read_u32(body, 4)?, 10),
                _ => return None,
            };
            let kind = body.get(type_at..type_at + 4)?;
            Some((id, [kind[0], kind[1], kind[2], kind[3]]))
        })
        .collect()
}

fn parse_color(property: IsoBox<'_>) -> Option<ColorProperty<'_>> {
    if &property.kind != b"colr" || property.body.len() < 4 {
        return None;
    }
    let body = property.body;
    match &body[..4] {
        b"nclx" => Some(ColorProperty::Nclx(Cicp {
            color_primaries: read_u16(body, 4)?,
            transfer_characteristics: read_u16(body, 6)?,
            matrix_coefficients: read_u16(body, 8)?,
            full_range: body.get(10)? & 0x80 != 0,
        })),
        b"prof" | b"rICC" => Some(ColorProperty::Icc(&body[4..])),
        _ => None,
    }
}

fn parse_ipma(body: &[u8]) -> Vec<(u32, Vec<u16>)> {
    let mut out = Vec::new();
    let Some(&version) = body.first() else {
        return out;
    };
    let large_index = body.get(3).is_some_and(|flags| flags & 1 != 0);
    let Some(count) = read_u32(body, 4) else {
        return out;
    };

    let mut pos = 8;
    for _ in 0..count {
        let item = if version < 1 {
            let id = read_u16(body, pos).map(u32::from);
            pos += 2;
            id
        } else {
            let id = read_u32(body, pos);
            pos += 4;
            id
        };
        let (Some(item), Some(&n)) = (item, body.get(pos)) else {
            break;
        };
        pos += 1;

        let mut indices = Vec::with_capacity(n as usize);
        for _ in 0..n {
            let index = if large_index {
                let v = read_u16(body, pos).map(|v| v & 0x7FFF);
                pos += 2;
                v
            } else {
                let v = body.get(pos).map(|v| (v & 0x7F) as u16);
                pos += 1;
                v
            };
            match index {
                Some(i) => indices.push(i),
                None => return out,
            }
        }
        out.push((item, indices));
    }
    out
}

fn read_u16(data: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_be_bytes(data.get(at..at + 2)?.try_into().ok()?))
}

fn read_u32(data: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_be_bytes(data.get(at..at + 4)?.try_into().ok()?))
}

/// One ISO BMFF box.
#[derive(Debug, Clone, Copy)]
struct IsoBox<'a> {
    kind: [u8; 4],
    body: &'a [u8],
}

/// Iterator over sibling boxes; stops at the first malformed header.
struct BoxIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BoxIter<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl<'a> Iterator for BoxIter<'a> {
    type Item = IsoBox<'a>;

    fn next(&mut self) -> Option<IsoBox<'a>> {
        let start = self.pos;
        let size = read_u32(self.data, start)? as u64;
        let kind = self.data.get(start + 4..start + 8)?;
        let kind = [kind[0], kind[1], kind[2], kind[3]];

        let (header, size) = match size {
            0 => (8, (self.data.len() - start) as u64),
            1 => {
                let large = u64::from_be_bytes(self.data.get(start + 8..start + 16)?.try_into().ok()?);
                (16, large)
            }
            n => (8, n),
        };
        if size < header as u64 || start as u64 + size > self.data.len() as u64 {
            log::trace!("malformed box {:?} at {}", String::from_utf8_lossy(&kind), start);
            self.pos = self.data.len();
            return None;
        }

        let end = start + size as usize;
        self.pos = end;
        Some(IsoBox {
            kind,
            body: &self.data[start + header..end],
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn iso_box(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = ((body.len() + 8) as u32).to_be_bytes().to_vec();
        out.extend_from_slice(kind);
        out.extend_from_slice(body);
        out
    }

    fn full_box(kind: &[u8; 4], version: u8, flags: u32, body: &[u8]) -> Vec<u8> {
        let mut full = vec![version];
        full.extend_from_slice(&flags.to_be_bytes()[1..]);
        full.extend_from_slice(body);
        iso_box(kind, &full)
    }

    fn infe(id: u16, kind: &[u8; 4]) -> Vec<u8> {
        let mut body = id.to_be_bytes().to_vec();
        body.extend_from_slice(&0u16.to_be_bytes());
        body.extend_from_slice(kind);
        body.push(0);
        full_box(b"infe", 2, 0, &body)
    }

    fn nclx(primaries: u16, transfer: u16) -> Vec<u8> {
        let mut body = b"nclx".to_vec();
        body.extend_from_slice(&primaries.to_be_bytes());
        body.extend_from_slice(&transfer.to_be_bytes());
        body.extend_from_slice(&9u16.to_be_bytes());
        body.push(0x80);
        iso_box(b"colr", &body)
    }

    /// A HEIF skeleton: item 1 is the primary, item 2 a second image.
    /// Item 1 is associated with property 2, item 2 with property 1.
    pub(crate) fn heif_file(major: &[u8; 4], item_type: &[u8; 4], primary_transfer: u16) -> Vec<u8> {
        let mut ftyp = major.to_vec();
        ftyp.extend_from_slice(&0u32.to_be_bytes());
        ftyp.extend_from_slice(b"mif1");
        ftyp.extend_from_slice(major);

        let pitm = full_box(b"pitm", 0, 0, &1u16.to_be_bytes());

        let mut iinf_body = 2u16.to_be_bytes().to_vec();
        iinf_body.extend_from_slice(&infe(1, item_type));
        iinf_body.extend_from_slice(&infe(2, item_type));
        let iinf = full_box(b"iinf", 0, 0, &iinf_body);

        let mut ipco_body = nclx(1, 1);
        ipco_body.extend_from_slice(&nclx(9, primary_transfer));
        let ipco = iso_box(b"ipco", &ipco_body);

        let mut ipma_body = 2u32.to_be_bytes().to_vec();
        ipma_body.extend_from_slice(&1u16.to_be_bytes());
        ipma_body.extend_from_slice(&[1, 0x82]);
        ipma_body.extend_from_slice(&2u16.to_be_bytes());
        ipma_body.extend_from_slice(&[1, 0x01]);
        let ipma = full_box(b"ipma", 0, 0, &ipma_body);

        let mut iprp_body = ipco;
        iprp_body.extend_from_slice(&ipma);
        let iprp = iso_box(b"iprp", &iprp_body);

        let mut meta_body = pitm;
        meta_body.extend_from_slice(&iinf);
        meta_body.extend_from_slice(&iprp);

        let mut file = iso_box(b"ftyp", &ftyp);
        file.extend_from_slice(&full_box(b"meta", 0, 0, &meta_body));
        file.extend_from_slice(&iso_box(b"mdat", &[0; 16]));
        file
    }

    #[test]
    fn test_probe_hevc_hdr10() {
        let data = heif_file(b"heic", b"hvc1", 16);
        assert!(is_heif(&data));

        let info = probe(&data).unwrap();
        assert_eq!(&info.major_brand, b"heic");
        assert!(info.is_hevc());
        assert_eq!(info.container(), ContainerKind::Heif);

        let cicp = info.nclx.unwrap();
        assert!(cicp.is_pq());
        assert_eq!(cicp.color_primaries, 9);
        assert!(cicp.full_range);
    }

    #[test]
    fn test_probe_uses_primary_item_property() {
        // Property 1 (BT.709) belongs to the secondary item only.
        let data = heif_file(b"avif", b"av01", 18);
        let info = probe(&data).unwrap();
        assert_eq!(info.container(), ContainerKind::Avif);
        assert_eq!(info.nclx.unwrap().transfer_characteristics, 18);
    }

    #[test]
    fn test_not_heif() {
        assert!(!is_heif(b"\xFF\xD8\xFF\xE0\0\x10JFIF"));
        assert!(probe(b"\x89PNG\r\n\x1a\n").is_none());

        let mp4 = iso_box(b"ftyp", b"isom\0\0\0\0mp41");
        assert!(!is_heif(&mp4));
    }

    #[test]
    fn test_malformed_box_stops_iteration() {
        let mut data = heif_file(b"heic", b"hvc1", 16);
        // Corrupt the meta box size.
        let meta_at = u32::from_be_bytes(data[0..4].try_into().unwrap()) as usize;
        data[meta_at..meta_at + 4].copy_from_slice(&u32::MAX.to_be_bytes());

        let info = probe(&data).unwrap();
        assert!(info.nclx.is_none());
        assert!(info.primary_codec.is_none());
        assert_eq!(info.container(), ContainerKind::Heif);
    }
}
