// SPDX-License-Identifier: MPL-2.0

//! CPU frame filters applied between capture and fan-out.
//!
//! All filters operate on packed BGR24 buffers and keep the frame
//! dimensions unchanged. The chain applies enabled stages in a fixed
//! order so that toggling them in any sequence yields the same image:
//!
//! 1. Vessel enhancement (multiscale Lab equalization plus chroma boost)
//! 2. Per-channel color CLAHE
//! 3. Luminance-only CLAHE
//! 4. Grayscale

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backends::capture::CameraFrame;
use crate::constants::{clahe as clahe_defaults, vessel};
use crate::media::clahe::Clahe;
use crate::media::color;

/// Which filter stages are enabled. Stage order is fixed by
/// [`apply_filters`]; this type only records the toggles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub vessel: bool,
    pub clahe_color: bool,
    pub clahe_luma: bool,
    pub grayscale: bool,
}

impl FilterConfig {
    pub fn any_enabled(&self) -> bool {
        self.vessel || self.clahe_color || self.clahe_luma || self.grayscale
    }
}

/// Tuning knobs for [`vessel_enhance`]. Defaults come from
/// [`crate::constants::vessel`].
#[derive(Debug, Clone, Copy)]
pub struct VesselParams {
    /// CLAHE clip limit shared by both equalization scales
    pub clahe_clip: f32,
    /// Tile grid for the fine equalization scale; the coarse scale doubles it
    pub grid: (u32, u32),
    /// Smoothing aperture applied to L before the fine equalization
    pub l_smooth_ksize: usize,
    /// Blend weight of the coarse scale in the combined luminance
    pub multiscale_weight: f32,
    /// Gain on the a* channel about the neutral point
    pub a_boost: f32,
    /// Gain on the b* channel about the neutral point
    pub b_boost: f32,
    /// Extra a* gain inside the vessel mask
    pub vessel_extra_boost: f32,
}

impl Default for VesselParams {
    fn default() -> Self {
        Self {
            clahe_clip: vessel::CLAHE_CLIP,
            grid: vessel::TILE_GRID,
            l_smooth_ksize: vessel::L_SMOOTH_KSIZE,
            multiscale_weight: vessel::MULTISCALE_WEIGHT,
            a_boost: vessel::A_BOOST,
            b_boost: vessel::B_BOOST,
            vessel_extra_boost: vessel::VESSEL_EXTRA_BOOST,
        }
    }
}

/// Runs the enabled filter stages over one frame.
///
/// With every stage disabled the input frame is returned as-is, sharing
/// the same pixel buffer.
pub fn apply_filters(frame: &CameraFrame, config: FilterConfig) -> CameraFrame {
    if !config.any_enabled() {
        return frame.clone();
    }

    let width = frame.width as usize;
    let height = frame.height as usize;
    let mut data = frame.data.to_vec();

    if config.vessel {
        data = vessel_enhance(&data, width, height, &VesselParams::default());
    }
    if config.clahe_color {
        data = clahe_bgr(&data, width, height);
    }
    if config.clahe_luma {
        data = clahe_luminance(&data, width, height);
    }
    if config.grayscale {
        data = grayscale(&data);
    }

    CameraFrame {
        width: frame.width,
        height: frame.height,
        data: Arc::from(data),
        captured_at: frame.captured_at,
    }
}

/// Multiscale Lab equalization with a reddish-chroma boost.
///
/// Luminance is equalized at two scales: a fine grid over the smoothed
/// plane and a doubled grid over the raw plane, blended by
/// `multiscale_weight`. The a* and b* channels are scaled about the
/// neutral point, then pixels matching the vessel mask receive one more
/// a* gain. The mask combines three cues computed from the stage input:
/// boosted a* over dark equalized luminance, a strong Cr component, and
/// a saturated hue in the red band.
pub fn vessel_enhance(data: &[u8], width: usize, height: usize, params: &VesselParams) -> Vec<u8> {
    let pixels = width * height;

    let mut l_plane = vec![0u8; pixels];
    let mut a_plane = vec![0u8; pixels];
    let mut b_plane = vec![0u8; pixels];
    for (i, px) in data.chunks_exact(3).enumerate() {
        let (l, a, b) = color::bgr_to_lab(px[0], px[1], px[2]);
        l_plane[i] = l;
        a_plane[i] = a;
        b_plane[i] = b;
    }

    let l_blur = gaussian_blur(&l_plane, width, height, params.l_smooth_ksize);
    let fine = Clahe::new(params.clahe_clip, params.grid);
    let l_eq = fine.apply(&l_blur, width, height);
    let coarse = Clahe::new(params.clahe_clip, (params.grid.0 * 2, params.grid.1 * 2));
    let l_large = coarse.apply(&l_plane, width, height);

    let w = params.multiscale_weight;
    let l_combined: Vec<u8> = l_eq
        .iter()
        .zip(&l_large)
        .map(|(&eq, &lg)| sat_u8(f32::from(eq) * (1.0 - w) + f32::from(lg) * w))
        .collect();

    let a_boosted: Vec<u8> = a_plane
        .iter()
        .map(|&a| boost_about_neutral(a, params.a_boost))
        .collect();
    let b_boosted: Vec<u8> = b_plane
        .iter()
        .map(|&b| boost_about_neutral(b, params.b_boost))
        .collect();

    let mut out = vec![0u8; data.len()];
    for (i, px) in data.chunks_exact(3).enumerate() {
        let (_, cr, _) = color::bgr_to_ycrcb(px[0], px[1], px[2]);
        let (h, s, _) = color::bgr_to_hsv(px[0], px[1], px[2]);

        let dark_red = a_boosted[i] > vessel::MASK_A_MIN && l_eq[i] < vessel::MASK_L_MAX;
        let strong_cr = cr > vessel::MASK_CR_MIN;
        let red_hue = (h < vessel::MASK_HUE_LOW || h > vessel::MASK_HUE_HIGH)
            && s > vessel::MASK_SAT_MIN;

        let a_final = if dark_red || strong_cr || red_hue {
            boost_about_neutral(a_boosted[i], params.vessel_extra_boost)
        } else {
            a_boosted[i]
        };

        let (b_out, g_out, r_out) = color::lab_to_bgr(l_combined[i], a_final, b_boosted[i]);
        out[i * 3] = b_out;
        out[i * 3 + 1] = g_out;
        out[i * 3 + 2] = r_out;
    }

    out
}

/// Per-channel CLAHE over B, G and R independently. Shifts color balance
/// along with contrast, a harsher look than the luminance-only variant.
pub fn clahe_bgr(data: &[u8], width: usize, height: usize) -> Vec<u8> {
    let pixels = width * height;
    let mut planes = [vec![0u8; pixels], vec![0u8; pixels], vec![0u8; pixels]];
    for (i, px) in data.chunks_exact(3).enumerate() {
        planes[0][i] = px[0];
        planes[1][i] = px[1];
        planes[2][i] = px[2];
    }

    let eq = Clahe::new(clahe_defaults::CLIP_LIMIT, clahe_defaults::TILE_GRID);
    for plane in &mut planes {
        *plane = eq.apply(plane, width, height);
    }

    let mut out = vec![0u8; data.len()];
    for i in 0..pixels {
        out[i * 3] = planes[0][i];
        out[i * 3 + 1] = planes[1][i];
        out[i * 3 + 2] = planes[2][i];
    }
    out
}

/// CLAHE on the Lab luminance channel only, leaving chroma untouched.
pub fn clahe_luminance(data: &[u8], width: usize, height: usize) -> Vec<u8> {
    let pixels = width * height;
    let mut l_plane = vec![0u8; pixels];
    let mut a_plane = vec![0u8; pixels];
    let mut b_plane = vec![0u8; pixels];
    for (i, px) in data.chunks_exact(3).enumerate() {
        let (l, a, b) = color::bgr_to_lab(px[0], px[1], px[2]);
        l_plane[i] = l;
        a_plane[i] = a;
        b_plane[i] = b;
    }

    let eq = Clahe::new(clahe_defaults::CLIP_LIMIT, clahe_defaults::TILE_GRID);
    let l_eq = eq.apply(&l_plane, width, height);

    let mut out = vec![0u8; data.len()];
    for i in 0..pixels {
        let (b, g, r) = color::lab_to_bgr(l_eq[i], a_plane[i], b_plane[i]);
        out[i * 3] = b;
        out[i * 3 + 1] = g;
        out[i * 3 + 2] = r;
    }
    out
}

/// BT.601 grayscale replicated across all three channels so the frame
/// stays BGR24 for the rest of the pipeline.
pub fn grayscale(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for px in data.chunks_exact(3) {
        let y = color::luminance_bt601(px[0], px[1], px[2]);
        out.extend_from_slice(&[y, y, y]);
    }
    out
}

/// Separable smoothing with fixed small-aperture taps. Borders mirror
/// without repeating the edge sample.
fn gaussian_blur(plane: &[u8], width: usize, height: usize, ksize: usize) -> Vec<u8> {
    let kernel: &[f32] = match ksize {
        0 | 1 => return plane.to_vec(),
        3 => &[0.25, 0.5, 0.25],
        7 => &[
            0.031_25, 0.109_375, 0.218_75, 0.281_25, 0.218_75, 0.109_375, 0.031_25,
        ],
        _ => &[0.0625, 0.25, 0.375, 0.25, 0.0625],
    };
    let radius = (kernel.len() / 2) as isize;

    let mut rows = vec![0.0f32; width * height];
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for (k, &tap) in kernel.iter().enumerate() {
                let sx = reflect(x as isize + k as isize - radius, width as isize);
                acc += f32::from(plane[y * width + sx]) * tap;
            }
            rows[y * width + x] = acc;
        }
    }

    let mut out = vec![0u8; width * height];
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for (k, &tap) in kernel.iter().enumerate() {
                let sy = reflect(y as isize + k as isize - radius, height as isize);
                acc += rows[sy * width + x] * tap;
            }
            out[y * width + x] = sat_u8(acc);
        }
    }
    out
}

/// Mirrors an out-of-range index back into `0..len` without repeating
/// the border sample.
#[inline]
fn reflect(i: isize, len: isize) -> usize {
    if len == 1 {
        return 0;
    }
    let mut i = i;
    while i < 0 || i >= len {
        if i < 0 {
            i = -i;
        }
        if i >= len {
            i = 2 * (len - 1) - i;
        }
    }
    i as usize
}

/// Scales a channel about the 128 neutral point and saturates back to u8.
#[inline]
fn boost_about_neutral(v: u8, gain: f32) -> u8 {
    sat_u8(gain * f32::from(v) + 128.0 * (1.0 - gain))
}

#[inline]
fn sat_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}
