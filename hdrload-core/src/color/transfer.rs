//! Electro-optical transfer functions.
//!
//! Decoding only ever needs the EOTF direction (stored code value to linear
//! light); the OETFs are kept for building test signals and LUT checks.
//!
//! Reference standards:
//! - sRGB: IEC 61966-2-1
//! - PQ: SMPTE ST 2084, ITU-R BT.2100
//! - HLG: ITU-R BT.2100, ARIB STD-B67

#![allow(clippy::excessive_precision)]

use alloc::boxed::Box;
use alloc::vec;

use crate::types::{luminance, ColorTransfer};

// ============================================================================
// sRGB (IEC 61966-2-1)
// ============================================================================

/// sRGB OETF: Linear `[0,1]` → sRGB encoded `[0,1]`
#[inline]
pub fn srgb_oetf(linear: f32) -> f32 {
    if linear <= 0.0031308 {
        linear * 12.92
    } else {
        1.055 * linear.powf(1.0 / 2.4) - 0.055
    }
}

/// sRGB EOTF: sRGB encoded `[0,1]` → Linear `[0,1]`
#[inline]
pub fn srgb_eotf(encoded: f32) -> f32 {
    if encoded <= 0.04045 {
        encoded / 12.92
    } else {
        ((encoded + 0.055) / 1.055).powf(2.4)
    }
}

// ============================================================================
// PQ (SMPTE ST 2084)
// ============================================================================

const PQ_M1: f32 = 2610.0 / 16384.0; // 0.1593017578125
const PQ_M2: f32 = 2523.0 / 4096.0 * 128.0; // 78.84375
const PQ_C1: f32 = 3424.0 / 4096.0; // 0.8359375
const PQ_C2: f32 = 2413.0 / 4096.0 * 32.0; // 18.8515625
const PQ_C3: f32 = 2392.0 / 4096.0 * 32.0; // 18.6875

/// PQ OETF: Linear `[0,1]` (1.0 = 10000 nits) → PQ encoded `[0,1]`
#[inline]
pub fn pq_oetf(linear: f32) -> f32 {
    if linear <= 0.0 {
        return 0.0;
    }

    let y_m1 = linear.powf(PQ_M1);
    let numerator = PQ_C1 + PQ_C2 * y_m1;
    let denominator = 1.0 + PQ_C3 * y_m1;
    (numerator / denominator).powf(PQ_M2)
}

/// PQ EOTF: PQ encoded `[0,1]` → Linear `[0,1]` (1.0 = 10000 nits)
#[inline]
pub fn pq_eotf(encoded: f32) -> f32 {
    if encoded <= 0.0 {
        return 0.0;
    }

    let e_inv_m2 = encoded.min(1.0).powf(1.0 / PQ_M2);
    let numerator = (e_inv_m2 - PQ_C1).max(0.0);
    let denominator = PQ_C2 - PQ_C3 * e_inv_m2;

    if denominator <= 0.0 {
        return 0.0;
    }

    (numerator / denominator).powf(1.0 / PQ_M1)
}

/// PQ encoded `[0,1]` → scRGB linear, where 1.0 is 80 nits.
#[inline]
pub fn pq_to_scrgb(encoded: f32) -> f32 {
    pq_eotf(encoded) * (luminance::PQ_PEAK_NITS / luminance::SCRGB_WHITE_NITS)
}

// ============================================================================
// HLG (ITU-R BT.2100 / ARIB STD-B67)
// ============================================================================

const HLG_A: f32 = 0.17883277;
const HLG_B: f32 = 0.28466892; // 1 - 4*a
const HLG_C: f32 = 0.55991073; // 0.5 - a*ln(4*a)

/// Nominal peak of an HLG reference display.
pub const HLG_REFERENCE_PEAK_NITS: f32 = 1000.0;

/// HLG OETF: Scene linear `[0,1]` → HLG encoded `[0,1]`
#[inline]
pub fn hlg_oetf(linear: f32) -> f32 {
    if linear <= 0.0 {
        return 0.0;
    }

    if linear <= 1.0 / 12.0 {
        (3.0 * linear).sqrt()
    } else {
        HLG_A * (12.0 * linear - HLG_B).ln() + HLG_C
    }
}

/// HLG inverse OETF: HLG encoded `[0,1]` → Scene linear `[0,1]`
#[inline]
pub fn hlg_oetf_inv(encoded: f32) -> f32 {
    if encoded <= 0.0 {
        return 0.0;
    }

    if encoded <= 0.5 {
        encoded * encoded / 3.0
    } else {
        ((encoded - HLG_C) / HLG_A).exp() / 12.0 + HLG_B / 12.0
    }
}

/// HLG EOTF for a single channel on the reference display, in nits.
///
/// Uses the channel value itself as the OOTF luminance term.
#[inline]
pub fn hlg_eotf(encoded: f32) -> f32 {
    let scene = hlg_oetf_inv(encoded);
    // System gamma is exactly 1.2 at the 1000 nit reference peak.
    scene.powf(0.2) * scene * HLG_REFERENCE_PEAK_NITS
}

// ============================================================================
// Working-space decode
// ============================================================================

/// Decode one stored sample to scRGB linear light (1.0 = 80 nits).
///
/// SDR curves map reference white to 1.0; PQ and HLG map to absolute
/// luminance over the 80 nit scRGB white.
#[inline]
pub fn to_scrgb(encoded: f32, transfer: ColorTransfer) -> f32 {
    match transfer {
        ColorTransfer::Srgb => srgb_eotf(encoded),
        ColorTransfer::Linear => encoded,
        ColorTransfer::Pq => pq_to_scrgb(encoded),
        ColorTransfer::Hlg => hlg_eotf(encoded) / luminance::SCRGB_WHITE_NITS,
    }
}

// ============================================================================
// LUTs
// ============================================================================

/// Precomputed sRGB EOTF for 8-bit input.
pub struct SrgbEotfLut {
    table: [f32; 256],
}

impl SrgbEotfLut {
    /// Build the table.
    pub fn new() -> Self {
        let mut table = [0.0f32; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            *entry = srgb_eotf(i as f32 / 255.0);
        }
        Self { table }
    }

    /// Linear value for an 8-bit sRGB code value.
    #[inline]
    pub fn lookup(&self, encoded_u8: u8) -> f32 {
        self.table[encoded_u8 as usize]
    }
}

impl Default for SrgbEotfLut {
    fn default() -> Self {
        Self::new()
    }
}

/// Full-range 16-bit lookup from stored code value to scRGB linear light.
///
/// Covers every `u16` code, so 10- and 12-bit content scaled up to 16 bits
/// decodes without interpolation.
pub struct Scrgb16Lut {
    table: Box<[f32]>,
}

impl Scrgb16Lut {
    /// Build the table for a transfer function.
    pub fn new(transfer: ColorTransfer) -> Self {
        let mut table = vec![0.0f32; 65536].into_boxed_slice();
        for (i, entry) in table.iter_mut().enumerate() {
            *entry = to_scrgb(i as f32 / 65535.0, transfer);
        }
        Self { table }
    }

    /// scRGB linear value for a 16-bit code value.
    #[inline]
    pub fn lookup(&self, encoded: u16) -> f32 {
        self.table[encoded as usize]
    }
}
