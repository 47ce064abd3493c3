// SPDX-License-Identifier: MPL-2.0

//! Per-pixel color space conversions
//!
//! CPU converters between packed BGR24 and the spaces the filter chain
//! works in. Scaling follows the common 8-bit conventions: Lab stores
//! L * 255 / 100 with chroma offset by 128, hue is halved into 0..180,
//! Cr and Cb are offset by 128. All math runs in f32 and rounds to the
//! nearest 8-bit value at the end.

/// sRGB gamma expansion to linear light
#[inline]
fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Linear light back to sRGB gamma
#[inline]
fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        12.92 * c
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

#[inline]
fn lab_f(t: f32) -> f32 {
    if t > 0.008856 {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

#[inline]
fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// BGR to 8-bit Lab (D65 white point)
#[inline]
pub fn bgr_to_lab(b: u8, g: u8, r: u8) -> (u8, u8, u8) {
    let rl = srgb_to_linear(r as f32 / 255.0);
    let gl = srgb_to_linear(g as f32 / 255.0);
    let bl = srgb_to_linear(b as f32 / 255.0);

    let x = (0.412453 * rl + 0.357580 * gl + 0.180423 * bl) / 0.950456;
    let y = 0.212671 * rl + 0.715160 * gl + 0.072169 * bl;
    let z = (0.019334 * rl + 0.119193 * gl + 0.950227 * bl) / 1.088754;

    let l = if y > 0.008856 {
        116.0 * y.cbrt() - 16.0
    } else {
        903.3 * y
    };
    let a = 500.0 * (lab_f(x) - lab_f(y));
    let b_chroma = 200.0 * (lab_f(y) - lab_f(z));

    (
        clamp_u8(l * 255.0 / 100.0),
        clamp_u8(a + 128.0),
        clamp_u8(b_chroma + 128.0),
    )
}

/// 8-bit Lab back to BGR
#[inline]
pub fn lab_to_bgr(l: u8, a: u8, b: u8) -> (u8, u8, u8) {
    let l = l as f32 * 100.0 / 255.0;
    let a = a as f32 - 128.0;
    let b_chroma = b as f32 - 128.0;

    let fy = (l + 16.0) / 116.0;
    let fx = fy + a / 500.0;
    let fz = fy - b_chroma / 200.0;

    let inv_f = |t: f32| -> f32 {
        let t3 = t * t * t;
        if t3 > 0.008856 {
            t3
        } else {
            (t - 16.0 / 116.0) / 7.787
        }
    };

    let y = if l > 903.3 * 0.008856 {
        fy * fy * fy
    } else {
        l / 903.3
    };
    let x = inv_f(fx) * 0.950456;
    let z = inv_f(fz) * 1.088754;

    let rl = 3.240479 * x - 1.537150 * y - 0.498535 * z;
    let gl = -0.969256 * x + 1.875992 * y + 0.041556 * z;
    let bl = 0.055648 * x - 0.204043 * y + 1.057311 * z;

    (
        clamp_u8(linear_to_srgb(bl.clamp(0.0, 1.0)) * 255.0),
        clamp_u8(linear_to_srgb(gl.clamp(0.0, 1.0)) * 255.0),
        clamp_u8(linear_to_srgb(rl.clamp(0.0, 1.0)) * 255.0),
    )
}

/// BGR to YCrCb (BT.601, full range)
#[inline]
pub fn bgr_to_ycrcb(b: u8, g: u8, r: u8) -> (u8, u8, u8) {
    let r = r as f32;
    let g = g as f32;
    let b = b as f32;

    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let cr = (r - y) * 0.713 + 128.0;
    let cb = (b - y) * 0.564 + 128.0;

    (clamp_u8(y), clamp_u8(cr), clamp_u8(cb))
}

/// BGR to HSV with hue halved into 0..180
#[inline]
pub fn bgr_to_hsv(b: u8, g: u8, r: u8) -> (u8, u8, u8) {
    let rf = r as f32;
    let gf = g as f32;
    let bf = b as f32;

    let v = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = v - min;

    let s = if v > 0.0 { delta / v * 255.0 } else { 0.0 };

    let mut h = if delta > 0.0 {
        if v == rf {
            60.0 * (gf - bf) / delta
        } else if v == gf {
            120.0 + 60.0 * (bf - rf) / delta
        } else {
            240.0 + 60.0 * (rf - gf) / delta
        }
    } else {
        0.0
    };
    if h < 0.0 {
        h += 360.0;
    }

    (clamp_u8(h / 2.0), clamp_u8(s), clamp_u8(v))
}

/// BT.601 luminance of a BGR pixel
#[inline]
pub fn luminance_bt601(b: u8, g: u8, r: u8) -> u8 {
    clamp_u8(0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32)
}
