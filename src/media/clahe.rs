// SPDX-License-Identifier: MPL-2.0

//! Contrast-limited adaptive histogram equalization on 8-bit planes
//!
//! The plane is divided into a grid of tiles; each tile gets its own
//! clip-limited equalization LUT and every pixel is mapped through a
//! bilinear blend of the four nearest tile LUTs. Planes that the grid
//! does not divide evenly are padded by mirroring without repeating the
//! edge row or column.

/// A reusable equalizer configured with clip limit and tile grid
#[derive(Debug, Clone)]
pub struct Clahe {
    clip_limit: f32,
    grid: (u32, u32),
}

impl Clahe {
    pub fn new(clip_limit: f32, grid: (u32, u32)) -> Self {
        Self {
            clip_limit,
            grid: (grid.0.max(1), grid.1.max(1)),
        }
    }

    /// Equalize one plane, returning a plane of the same size
    pub fn apply(&self, plane: &[u8], width: usize, height: usize) -> Vec<u8> {
        if width == 0 || height == 0 || plane.len() < width * height {
            return plane.to_vec();
        }

        let gx = self.grid.0 as usize;
        let gy = self.grid.1 as usize;
        let tile_w = width.div_ceil(gx);
        let tile_h = height.div_ceil(gy);
        let padded_w = tile_w * gx;
        let padded_h = tile_h * gy;

        // Tile LUTs are computed over the padded plane so edge tiles see
        // full-sized histograms.
        let padded;
        let lut_src: &[u8] = if padded_w == width && padded_h == height {
            plane
        } else {
            padded = pad_reflect(plane, width, height, padded_w, padded_h);
            &padded
        };

        let luts = self.build_tile_luts(lut_src, padded_w, tile_w, tile_h, gx, gy);

        // Interpolate over the original pixels
        let mut output = vec![0u8; width * height];
        let inv_tw = 1.0 / tile_w as f32;
        let inv_th = 1.0 / tile_h as f32;

        for y in 0..height {
            let tyf = y as f32 * inv_th - 0.5;
            let ty_floor = tyf.floor();
            let ya = tyf - ty_floor;
            let ty1 = (ty_floor as i32).clamp(0, gy as i32 - 1) as usize;
            let ty2 = (ty_floor as i32 + 1).clamp(0, gy as i32 - 1) as usize;

            for x in 0..width {
                let txf = x as f32 * inv_tw - 0.5;
                let tx_floor = txf.floor();
                let xa = txf - tx_floor;
                let tx1 = (tx_floor as i32).clamp(0, gx as i32 - 1) as usize;
                let tx2 = (tx_floor as i32 + 1).clamp(0, gx as i32 - 1) as usize;

                let v = plane[y * width + x] as usize;
                let top = luts[ty1 * gx + tx1][v] as f32 * (1.0 - xa)
                    + luts[ty1 * gx + tx2][v] as f32 * xa;
                let bottom = luts[ty2 * gx + tx1][v] as f32 * (1.0 - xa)
                    + luts[ty2 * gx + tx2][v] as f32 * xa;
                output[y * width + x] =
                    (top * (1.0 - ya) + bottom * ya).round().clamp(0.0, 255.0) as u8;
            }
        }

        output
    }

    fn build_tile_luts(
        &self,
        src: &[u8],
        src_w: usize,
        tile_w: usize,
        tile_h: usize,
        gx: usize,
        gy: usize,
    ) -> Vec<[u8; 256]> {
        let tile_area = tile_w * tile_h;
        let clip = ((self.clip_limit * tile_area as f32 / 256.0) as u32).max(1);
        let lut_scale = 255.0 / tile_area as f32;

        let mut luts = vec![[0u8; 256]; gx * gy];
        for ty in 0..gy {
            for tx in 0..gx {
                let mut hist = [0u32; 256];
                for y in ty * tile_h..(ty + 1) * tile_h {
                    let row = &src[y * src_w + tx * tile_w..y * src_w + (tx + 1) * tile_w];
                    for &v in row {
                        hist[v as usize] += 1;
                    }
                }

                // Clip the histogram and hand the excess back uniformly
                let mut excess = 0u32;
                for bin in hist.iter_mut() {
                    if *bin > clip {
                        excess += *bin - clip;
                        *bin = clip;
                    }
                }
                let batch = excess / 256;
                let mut residual = (excess % 256) as usize;
                if batch > 0 {
                    for bin in hist.iter_mut() {
                        *bin += batch;
                    }
                }
                if residual > 0 {
                    let step = (256 / residual).max(1);
                    let mut i = 0;
                    while i < 256 && residual > 0 {
                        hist[i] += 1;
                        residual -= 1;
                        i += step;
                    }
                }

                // Cumulative distribution becomes the tile's LUT
                let lut = &mut luts[ty * gx + tx];
                let mut sum = 0u32;
                for (i, &count) in hist.iter().enumerate() {
                    sum += count;
                    lut[i] = (sum as f32 * lut_scale).round().clamp(0.0, 255.0) as u8;
                }
            }
        }

        luts
    }
}

/// Mirror-pad a plane on the high sides without repeating the edge
fn pad_reflect(
    plane: &[u8],
    width: usize,
    height: usize,
    padded_w: usize,
    padded_h: usize,
) -> Vec<u8> {
    let mut padded = vec![0u8; padded_w * padded_h];
    for y in 0..padded_h {
        let sy = reflect_101(y, height);
        for x in 0..padded_w {
            let sx = reflect_101(x, width);
            padded[y * padded_w + x] = plane[sy * width + sx];
        }
    }
    padded
}

/// Reflected index for out-of-range positions, edge pixel not repeated
fn reflect_101(i: usize, n: usize) -> usize {
    if i < n {
        return i;
    }
    if n == 1 {
        return 0;
    }
    let period = 2 * (n - 1);
    let j = i % period;
    if j < n { j } else { period - j }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_equalization_with_single_tile() {
        // Two-value plane, no clipping: classic histogram equalization
        let mut plane = vec![50u8; 32];
        plane.extend(vec![200u8; 32]);
        let clahe = Clahe::new(1000.0, (1, 1));
        let out = clahe.apply(&plane, 8, 8);

        assert!(out[..32].iter().all(|&v| v == 128), "dark half maps to mid");
        assert!(out[32..].iter().all(|&v| v == 255), "bright half maps to top");
    }

    #[test]
    fn test_constant_plane_stays_near_constant() {
        let plane = vec![128u8; 36 * 24];
        let clahe = Clahe::new(2.0, (3, 3));
        let out = clahe.apply(&plane, 36, 24);

        let first = out[0];
        assert!(
            out.iter().all(|&v| v == first),
            "identical tiles interpolate to one value"
        );
        assert!(
            (120..=136).contains(&first),
            "clipped redistribution keeps the level near the input, got {}",
            first
        );
    }

    #[test]
    fn test_contrast_is_expanded() {
        // Narrow ramp occupying less than a quarter of the range
        let width = 32;
        let height = 16;
        let plane: Vec<u8> = (0..width * height)
            .map(|i| 100 + (i % width) as u8)
            .collect();
        let clahe = Clahe::new(4.0, (2, 2));
        let out = clahe.apply(&plane, width, height);

        let in_span = 31;
        let out_min = out.iter().copied().min().unwrap_or(0);
        let out_max = out.iter().copied().max().unwrap_or(0);
        assert!(
            out_max - out_min > in_span,
            "equalization must widen the value span: {}..{}",
            out_min,
            out_max
        );
    }

    #[test]
    fn test_uneven_dimensions() {
        // Grid does not divide the plane; padding path must hold size
        let plane: Vec<u8> = (0..10 * 7).map(|i| (i * 3 % 251) as u8).collect();
        let clahe = Clahe::new(2.0, (3, 3));
        let out = clahe.apply(&plane, 10, 7);
        assert_eq!(out.len(), 10 * 7);
    }

    #[test]
    fn test_reflect_101_indexing() {
        // n = 5: indexes 5, 6, 7 mirror to 3, 2, 1
        assert_eq!(reflect_101(4, 5), 4);
        assert_eq!(reflect_101(5, 5), 3);
        assert_eq!(reflect_101(6, 5), 2);
        assert_eq!(reflect_101(7, 5), 1);
        assert_eq!(reflect_101(3, 1), 0);
    }
}
