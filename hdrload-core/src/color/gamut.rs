//! Gamut matrices into the BT.709 working space.
//!
//! All matrices operate on linear light and share the D65 white point.

#![allow(clippy::excessive_precision)]

use crate::types::ColorGamut;

/// 3x3 matrix for color transformations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix3x3(pub [[f32; 3]; 3]);

impl Matrix3x3 {
    /// Identity matrix.
    pub const IDENTITY: Self = Self([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);

    /// Multiply matrix by RGB vector: [R', G', B'] = M * [R, G, B]
    #[inline]
    pub fn transform(&self, rgb: [f32; 3]) -> [f32; 3] {
        let m = &self.0;
        [
            m[0][0] * rgb[0] + m[0][1] * rgb[1] + m[0][2] * rgb[2],
            m[1][0] * rgb[0] + m[1][1] * rgb[1] + m[1][2] * rgb[2],
            m[2][0] * rgb[0] + m[2][1] * rgb[1] + m[2][2] * rgb[2],
        ]
    }
}

/// BT.709 to BT.2100
pub const BT709_TO_BT2100: Matrix3x3 = Matrix3x3([
    [0.6274039, 0.3292831, 0.0433130],
    [0.0690973, 0.9195404, 0.0113623],
    [0.0163914, 0.0880133, 0.8955953],
]);

/// BT.2100 to BT.709
pub const BT2100_TO_BT709: Matrix3x3 = Matrix3x3([
    [1.6604910, -0.5876411, -0.0728499],
    [-0.1245505, 1.1328999, -0.0083494],
    [-0.0181508, -0.1005789, 1.1187297],
]);

/// Display P3 to BT.709
pub const P3_TO_BT709: Matrix3x3 = Matrix3x3([
    [1.2249401, -0.2249401, 0.0000000],
    [-0.0420569, 1.0420569, 0.0000000],
    [-0.0196376, -0.0786361, 1.0982737],
]);

/// Luminance coefficients for BT.709 (Y = 0.2126R + 0.7152G + 0.0722B)
pub const BT709_LUMA: [f32; 3] = [0.2126, 0.7152, 0.0722];

/// Matrix taking linear RGB in `from` primaries to BT.709 primaries.
pub fn to_bt709_matrix(from: ColorGamut) -> Matrix3x3 {
    match from {
        ColorGamut::Bt709 => Matrix3x3::IDENTITY,
        ColorGamut::DisplayP3 => P3_TO_BT709,
        ColorGamut::Bt2100 => BT2100_TO_BT709,
    }
}

/// Luminance of linear BT.709 RGB.
#[inline]
pub fn bt709_luminance(rgb: [f32; 3]) -> f32 {
    BT709_LUMA[0] * rgb[0] + BT709_LUMA[1] * rgb[1] + BT709_LUMA[2] * rgb[2]
}
