//! Coding-independent code points (ITU-T H.273).
//!
//! Containers report color encoding as CICP quadruples: PNG `cICP` chunks,
//! HEIF/AVIF `nclx` color boxes and the ICC v4.4 `cicp` tag all share them.

use crate::types::{ColorGamut, ColorTransfer};

/// Transfer characteristics value for SMPTE ST 2084 (PQ / HDR10).
pub const TRANSFER_PQ: u16 = 16;

/// Transfer characteristics value for ARIB STD-B67 (HLG).
pub const TRANSFER_HLG: u16 = 18;

/// Color primaries value for BT.2020 / BT.2100.
pub const PRIMARIES_BT2020: u16 = 9;

/// A CICP quadruple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cicp {
    /// Color primaries (H.273 table 2).
    pub color_primaries: u16,
    /// Transfer characteristics (H.273 table 3).
    pub transfer_characteristics: u16,
    /// Matrix coefficients (H.273 table 4).
    pub matrix_coefficients: u16,
    /// Full-range sample values.
    pub full_range: bool,
}

impl Cicp {
    /// BT.2100 PQ, the HDR10 signal.
    pub const HDR10: Self = Self {
        color_primaries: PRIMARIES_BT2020,
        transfer_characteristics: TRANSFER_PQ,
        matrix_coefficients: 9,
        full_range: false,
    };

    /// Build from the 4-byte form used by PNG `cICP` and the ICC `cicp` tag.
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self {
            color_primaries: bytes[0] as u16,
            transfer_characteristics: bytes[1] as u16,
            matrix_coefficients: bytes[2] as u16,
            full_range: bytes[3] != 0,
        }
    }

    /// Returns true for the PQ (HDR10) transfer.
    pub fn is_pq(&self) -> bool {
        self.transfer_characteristics == TRANSFER_PQ
    }

    /// Returns true for either HDR transfer (PQ or HLG).
    pub fn is_hdr(&self) -> bool {
        matches!(self.transfer_characteristics, TRANSFER_PQ | TRANSFER_HLG)
    }

    /// Transfer function, if one we decode.
    pub fn transfer(&self) -> Option<ColorTransfer> {
        match self.transfer_characteristics {
            // BT.709, BT.601, BT.2020 10/12-bit and sRGB all decode with the sRGB curve.
            1 | 6 | 13 | 14 | 15 => Some(ColorTransfer::Srgb),
            8 => Some(ColorTransfer::Linear),
            TRANSFER_PQ => Some(ColorTransfer::Pq),
            TRANSFER_HLG => Some(ColorTransfer::Hlg),
            _ => None,
        }
    }

    /// Primaries, if one of the gamuts we convert from.
    pub fn gamut(&self) -> Option<ColorGamut> {
        match self.color_primaries {
            1 => Some(ColorGamut::Bt709),
            PRIMARIES_BT2020 => Some(ColorGamut::Bt2100),
            12 => Some(ColorGamut::DisplayP3),
            _ => None,
        }
    }
}
