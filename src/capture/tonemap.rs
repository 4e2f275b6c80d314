// CPU HDR tone-mapping (§4.1, §9 open question): applied to scene-referred
// linear R16G16B16A16_FLOAT samples before they are handed to the rest of
// the pipeline as 8-bit BGRA, so every downstream stage sees one format.
//
// Stages, each clamped to [0,1] before the next: linear saturation boost,
// a cool color shift, exposure scaling that maps reference white (1.0) to
// ~0.85, then piecewise sRGB gamma. The constants are empirical and kept
// named rather than derived (see DESIGN.md).

use half::f16;

pub const SATURATION_BOOST: f32 = 1.2;
pub const COOL_SHIFT_R: f32 = 0.96;
pub const COOL_SHIFT_B: f32 = 1.04;
pub const EXPOSURE_TARGET: f32 = 0.85;

fn clamp01(v: f32) -> f32 {
    v.clamp(0.0, 1.0)
}

fn srgb_gamma(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

/// Runs one pixel's linear RGB through saturation boost, cool shift,
/// exposure scaling, and sRGB gamma, returning 8-bit output.
fn tonemap_pixel(r: f32, g: f32, b: f32) -> (u8, u8, u8) {
    let luma = 0.2126 * r + 0.7152 * g + 0.0722 * b;
    let (mut r, mut g, mut b) = (
        clamp01(luma + (r - luma) * SATURATION_BOOST),
        clamp01(luma + (g - luma) * SATURATION_BOOST),
        clamp01(luma + (b - luma) * SATURATION_BOOST),
    );

    r = clamp01(r * COOL_SHIFT_R);
    b = clamp01(b * COOL_SHIFT_B);

    r = clamp01(r * EXPOSURE_TARGET);
    g = clamp01(g * EXPOSURE_TARGET);
    b = clamp01(b * EXPOSURE_TARGET);

    let r = (srgb_gamma(r) * 255.0).round().clamp(0.0, 255.0) as u8;
    let g = (srgb_gamma(g) * 255.0).round().clamp(0.0, 255.0) as u8;
    let b = (srgb_gamma(b) * 255.0).round().clamp(0.0, 255.0) as u8;
    (r, g, b)
}

/// Converts a row-stripped R16G16B16A16_FLOAT buffer (4 `u16` halves per
/// pixel, RGBA order) to 8-bit BGRA, applying the tone-map to each pixel.
/// Alpha is carried through as fully opaque, since desktop composition is
/// always opaque at the output stage.
pub fn hdr_to_bgra8(hdr: &[u16], width: u32, height: u32) -> Vec<u8> {
    let pixel_count = width as usize * height as usize;
    let mut out = vec![0u8; pixel_count * 4];

    for i in 0..pixel_count {
        let base = i * 4;
        if base + 3 >= hdr.len() {
            break;
        }
        let r = f16::from_bits(hdr[base]).to_f32();
        let g = f16::from_bits(hdr[base + 1]).to_f32();
        let b = f16::from_bits(hdr[base + 2]).to_f32();

        let (r8, g8, b8) = tonemap_pixel(r, g, b);
        let o = i * 4;
        out[o] = b8;
        out[o + 1] = g8;
        out[o + 2] = r8;
        out[o + 3] = 255;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_white_maps_below_full_scale() {
        // R=G=B=1.0 (reference white): saturation is a no-op on a neutral
        // pixel (component == luma), so the cool shift and exposure scale
        // are the only things that move it off full white.
        let (r, g, b) = tonemap_pixel(1.0, 1.0, 1.0);
        assert!(r < 255 || g < 255 || b < 255);
        // Green carries no cool shift, so it's a pure function of exposure
        // and gamma: srgb_gamma(0.85) * 255, rounded.
        let expected_g = (srgb_gamma(EXPOSURE_TARGET) * 255.0).round() as u8;
        assert_eq!(g, expected_g);
    }

    #[test]
    fn black_stays_black() {
        let (r, g, b) = tonemap_pixel(0.0, 0.0, 0.0);
        assert_eq!((r, g, b), (0, 0, 0));
    }

    #[test]
    fn output_is_clamped_to_valid_byte_range() {
        let (r, g, b) = tonemap_pixel(4.0, 4.0, 4.0);
        assert!(r <= 255 && g <= 255 && b <= 255);
    }

    #[test]
    fn hdr_to_bgra8_produces_expected_buffer_length() {
        let hdr = vec![0x3C00u16; 2 * 2 * 4]; // 2x2, all channels = 1.0
        let out = hdr_to_bgra8(&hdr, 2, 2);
        assert_eq!(out.len(), 2 * 2 * 4);
        assert_eq!(out[3], 255); // alpha opaque
    }
}
