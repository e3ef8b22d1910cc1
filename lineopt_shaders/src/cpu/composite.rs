// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT OR Unlicense

use lineopt_encoding::{ConfigUniform, Fragment, HistogramMode, INVALID_INDEX};

use super::CpuBinding;
use super::util::{mix, pack4x8unorm, remap, unpack4x8unorm};

fn rgb(packed: u32) -> [f32; 3] {
    let [r, g, b, _] = unpack4x8unorm(packed);
    [r, g, b]
}

/// Samples a table of packed colors with linear interpolation, clamped to the edges.
pub fn sample_colormap(colormap: &[u32], len: u32, x: f32) -> [f32; 3] {
    let last = len.min(colormap.len() as u32).saturating_sub(1);
    let pos = x.clamp(0.0, 1.0) * last as f32;
    let i0 = (pos.floor() as u32).min(last);
    let i1 = (i0 + 1).min(last);
    let c0 = rgb(colormap[i0 as usize]);
    let c1 = rgb(colormap[i1 as usize]);
    let t = pos - i0 as f32;
    std::array::from_fn(|i| mix(c0[i], c1[i], t))
}

fn fragment_color(config: &ConfigUniform, frag: &Fragment, cdf: &[f32], colormap: &[u32]) -> [f32; 3] {
    if frag.is_halo() {
        return rgb(config.halo_color);
    }
    match config.histogram_mode {
        m if m == HistogramMode::None as u32 => rgb(frag.color),
        m if m == HistogramMode::ScalarColor as u32 => {
            sample_colormap(colormap, config.colormap_len, frag.scalar)
        }
        _ => sample_colormap(
            colormap,
            config.colormap_len,
            remap(cdf, frag.scalar, config.n_bins),
        ),
    }
}

pub fn composite_main(
    config: &ConfigUniform,
    heads: &[u32],
    pool: &[Fragment],
    cdf: &[f32],
    colormap: &[u32],
    pixels: &mut [u32],
) {
    let bg = unpack4x8unorm(config.background);
    let n_pixels = ((config.width * config.height) as usize).min(pixels.len());
    for pixel_ix in 0..n_pixels {
        let mut out = [0.0_f32; 3];
        let mut transmittance = 1.0;
        let mut ix = heads[pixel_ix];
        while ix != INVALID_INDEX {
            let frag = &pool[ix as usize];
            let a = frag.transparency;
            let c = fragment_color(config, frag, cdf, colormap);
            for i in 0..3 {
                out[i] += frag.transmittance * a * c[i];
            }
            transmittance = frag.transmittance * (1.0 - a);
            ix = frag.next;
        }
        for i in 0..3 {
            out[i] += transmittance * bg[3] * bg[i];
        }
        let alpha = 1.0 - transmittance * (1.0 - bg[3]);
        pixels[pixel_ix] = pack4x8unorm([out[0], out[1], out[2], alpha]);
    }
}

pub fn composite(_n_wg: u32, resources: &[CpuBinding<'_>]) {
    let config = resources[0].uniform();
    let heads = resources[1].slice();
    let pool = resources[2].slice();
    let cdf = resources[3].slice();
    let colormap = resources[4].slice();
    let mut pixels = resources[5].slice_mut();
    composite_main(&config, &heads, &pool, &cdf, &colormap, &mut pixels);
}
