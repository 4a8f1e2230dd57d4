//! Group colour transforms (3D LUTs) derived from one before/after pair.
//!
//! A transform is a `levels^3` lattice over RGB space. Building it assigns
//! every source pixel to the eight lattice nodes around its colour, with the
//! same trilinear weights used at lookup time, and records the weighted mean
//! colour shift the enhancement applied there; a node's output is its own
//! position plus that mean shift. Nodes no pixel touched keep a zero shift
//! (identity), so untouched colour regions pass through unchanged. Applying
//! it interpolates trilinearly between the eight surrounding nodes to avoid
//! banding.
//!
//! Every frame of a group is mapped through the same table, so equal input
//! colours always produce equal output colours across the group.

use std::fmt::Write as _;

use image::RgbImage;
use rayon::prelude::*;

use lumen_models::config::MAX_LUT_LEVELS;

use crate::error::{MediaError, MediaResult};
use crate::frames::Frame;

/// Minimum pixels per parallel work unit while building.
const SPLAT_CHUNK_PIXELS: usize = 16 * 1024;

/// Per-node weighted shift sums and total weights.
type Accumulator = (Vec<[f64; 3]>, Vec<f64>);

/// Total sample weight below which a node counts as unobserved.
const MIN_NODE_WEIGHT: f64 = 1e-9;

/// Colour transform lattice.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorTransform {
    levels: usize,
    /// Output colour per node in 0..=255, red fastest: `r + g*L + b*L*L`
    table: Vec<[f32; 3]>,
    /// Nodes that received at least one sample while building
    observed: usize,
}

#[inline]
fn node_position(i: usize, levels: usize) -> f32 {
    i as f32 * 255.0 / (levels - 1) as f32
}

/// Lower lattice corner and fractional offset of `rgb` along each axis.
#[inline]
fn lattice_cell(rgb: [u8; 3], levels: usize) -> ([usize; 3], [f32; 3]) {
    let scale = (levels - 1) as f32 / 255.0;
    let mut base = [0usize; 3];
    let mut frac = [0.0f32; 3];
    for c in 0..3 {
        let coord = rgb[c] as f32 * scale;
        let lo = (coord as usize).min(levels - 2);
        base[c] = lo;
        frac[c] = coord - lo as f32;
    }
    (base, frac)
}

/// The eight lattice nodes around `rgb` with their trilinear weights.
#[inline]
fn lattice_corners(rgb: [u8; 3], levels: usize) -> [(usize, f32); 8] {
    let (base, frac) = lattice_cell(rgb, levels);
    let mut corners = [(0usize, 0.0f32); 8];
    for (i, corner) in corners.iter_mut().enumerate() {
        let (dr, dg, db) = (i & 1, (i >> 1) & 1, (i >> 2) & 1);
        let wr = if dr == 1 { frac[0] } else { 1.0 - frac[0] };
        let wg = if dg == 1 { frac[1] } else { 1.0 - frac[1] };
        let wb = if db == 1 { frac[2] } else { 1.0 - frac[2] };
        let node = (base[0] + dr) + (base[1] + dg) * levels + (base[2] + db) * levels * levels;
        *corner = (node, wr * wg * wb);
    }
    corners
}

fn empty_accumulator(nodes: usize) -> Accumulator {
    (vec![[0.0; 3]; nodes], vec![0.0; nodes])
}

/// Spread each pixel's shift over the 8 nodes around its source colour.
fn splat_chunk(src: &[u8], dst: &[u8], levels: usize, nodes: usize) -> Accumulator {
    let (mut sums, mut weights) = empty_accumulator(nodes);
    for (s, d) in src.chunks_exact(3).zip(dst.chunks_exact(3)) {
        let shift = [
            d[0] as f64 - s[0] as f64,
            d[1] as f64 - s[1] as f64,
            d[2] as f64 - s[2] as f64,
        ];
        for (node, w) in lattice_corners([s[0], s[1], s[2]], levels) {
            if w <= 0.0 {
                continue;
            }
            let w = w as f64;
            for c in 0..3 {
                sums[node][c] += w * shift[c];
            }
            weights[node] += w;
        }
    }
    (sums, weights)
}

fn merge_accumulators(a: Accumulator, b: Accumulator) -> Accumulator {
    let (mut sums, mut weights) = a;
    for (sum, other) in sums.iter_mut().zip(&b.0) {
        for c in 0..3 {
            sum[c] += other[c];
        }
    }
    for (weight, other) in weights.iter_mut().zip(&b.1) {
        *weight += other;
    }
    (sums, weights)
}

impl ColorTransform {
    /// Transform mapping every colour to itself.
    pub fn identity(levels: usize) -> Self {
        let levels = levels.clamp(2, MAX_LUT_LEVELS);
        let mut table = Vec::with_capacity(levels * levels * levels);
        for b in 0..levels {
            for g in 0..levels {
                for r in 0..levels {
                    table.push([
                        node_position(r, levels),
                        node_position(g, levels),
                        node_position(b, levels),
                    ]);
                }
            }
        }
        Self {
            levels,
            table,
            observed: 0,
        }
    }

    /// Derive the transform from pixel-aligned `before`/`after` buffers.
    ///
    /// Fails with [`MediaError::GeometryMismatch`] when the buffers differ
    /// in size, since the pairing is meaningless without alignment.
    pub fn build(before: &RgbImage, after: &RgbImage, levels: usize) -> MediaResult<Self> {
        if before.dimensions() != after.dimensions() {
            return Err(MediaError::geometry_mismatch(
                before.dimensions(),
                after.dimensions(),
            ));
        }

        let mut transform = Self::identity(levels);
        let levels = transform.levels;
        let nodes = transform.table.len();

        // Per-node weighted sum of (after - before) and total weight. One
        // accumulator per thread-sized chunk keeps memory at O(threads * nodes).
        let pixels = before.width() as usize * before.height() as usize;
        let chunk_pixels = pixels
            .div_ceil(rayon::current_num_threads().max(1))
            .max(SPLAT_CHUNK_PIXELS);
        let (shift_sums, weights) = before
            .as_raw()
            .par_chunks(chunk_pixels * 3)
            .zip(after.as_raw().par_chunks(chunk_pixels * 3))
            .map(|(src, dst)| splat_chunk(src, dst, levels, nodes))
            .reduce_with(merge_accumulators)
            .unwrap_or_else(|| empty_accumulator(nodes));

        for node in 0..nodes {
            let weight = weights[node];
            if weight <= MIN_NODE_WEIGHT {
                continue;
            }
            transform.observed += 1;
            for c in 0..3 {
                let shift = shift_sums[node][c] / weight;
                let out = transform.table[node][c] as f64 + shift;
                transform.table[node][c] = out.clamp(0.0, 255.0) as f32;
            }
        }

        Ok(transform)
    }

    /// Lattice points per channel.
    pub fn levels(&self) -> usize {
        self.levels
    }

    /// Nodes that received samples while building.
    pub fn observed_nodes(&self) -> usize {
        self.observed
    }

    /// Whether every node maps to its own position.
    pub fn is_identity(&self) -> bool {
        *self == Self {
            observed: self.observed,
            ..Self::identity(self.levels)
        }
    }

    /// Map one colour through the lattice with trilinear interpolation.
    pub fn map_color(&self, rgb: [u8; 3]) -> [u8; 3] {
        let l = self.levels;
        let (base, frac) = lattice_cell(rgb, l);

        let idx = |r: usize, g: usize, b: usize| -> usize { r + g * l + b * l * l };
        let (r0, g0, b0) = (base[0], base[1], base[2]);
        let (fr, fg, fb) = (frac[0], frac[1], frac[2]);

        let c000 = self.table[idx(r0, g0, b0)];
        let c100 = self.table[idx(r0 + 1, g0, b0)];
        let c010 = self.table[idx(r0, g0 + 1, b0)];
        let c110 = self.table[idx(r0 + 1, g0 + 1, b0)];
        let c001 = self.table[idx(r0, g0, b0 + 1)];
        let c101 = self.table[idx(r0 + 1, g0, b0 + 1)];
        let c011 = self.table[idx(r0, g0 + 1, b0 + 1)];
        let c111 = self.table[idx(r0 + 1, g0 + 1, b0 + 1)];

        let mut out = [0u8; 3];
        for c in 0..3 {
            let c00 = c000[c] * (1.0 - fr) + c100[c] * fr;
            let c10 = c010[c] * (1.0 - fr) + c110[c] * fr;
            let c01 = c001[c] * (1.0 - fr) + c101[c] * fr;
            let c11 = c011[c] * (1.0 - fr) + c111[c] * fr;
            let c0 = c00 * (1.0 - fg) + c10 * fg;
            let c1 = c01 * (1.0 - fg) + c11 * fg;
            out[c] = (c0 * (1.0 - fb) + c1 * fb).round().clamp(0.0, 255.0) as u8;
        }
        out
    }

    /// Map every pixel of `image`, in parallel.
    pub fn apply(&self, image: &RgbImage) -> RgbImage {
        let mut out = image.clone();
        let buf: &mut [u8] = &mut out;
        buf.par_chunks_mut(3).for_each(|px| {
            let mapped = self.map_color([px[0], px[1], px[2]]);
            px.copy_from_slice(&mapped);
        });
        out
    }

    /// Map a frame, keeping its index and timestamp.
    pub fn apply_frame(&self, frame: &Frame) -> Frame {
        Frame {
            index: frame.index,
            timestamp: frame.timestamp,
            pixels: self.apply(&frame.pixels),
        }
    }

    /// Render as an Adobe `.cube` 3D LUT (values normalised, red fastest).
    pub fn to_cube(&self, title: &str) -> String {
        let mut out = String::with_capacity(self.table.len() * 28 + 64);
        let _ = writeln!(out, "TITLE \"{}\"", title.replace('"', "'"));
        let _ = writeln!(out, "LUT_3D_SIZE {}", self.levels);
        let _ = writeln!(out, "DOMAIN_MIN 0.0 0.0 0.0");
        let _ = writeln!(out, "DOMAIN_MAX 1.0 1.0 1.0");
        for node in &self.table {
            let _ = writeln!(
                out,
                "{:.6} {:.6} {:.6}",
                node[0] / 255.0,
                node[1] / 255.0,
                node[2] / 255.0
            );
        }
        out
    }
}
