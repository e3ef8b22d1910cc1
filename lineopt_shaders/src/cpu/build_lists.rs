// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT OR Unlicense

use lineopt_encoding::{
    ConfigUniform, Fragment, FragmentCounters, FragmentLowRes, HALO_FLAG, Mat4, Vertex,
};

use super::CpuBinding;
use super::util::{Vec2, mix, segment_param, setup_segment};

/// A covered pixel of a segment.
struct Coverage {
    pixel_ix: usize,
    dist: f32,
    depth: u32,
    /// Parameter along the original, unclipped segment.
    s: f32,
}

struct Target {
    width: u32,
    height: u32,
    half_width: f32,
    reach: f32,
    capacity: u32,
}

// Visits every pixel the segment starting at vertex `ix` is responsible for.
fn for_each_covered(
    config: &ConfigUniform,
    vertices: &[Vertex],
    ix: usize,
    target: &Target,
    mut f: impl FnMut(Coverage),
) {
    let n = vertices.len().min(config.n_vertices as usize);
    if ix + 1 >= n {
        return;
    }
    let va = &vertices[ix];
    let vb = &vertices[ix + 1];
    if va.line_id != vb.line_id {
        return;
    }
    // Joints are covered by exactly one of the two segments meeting there.
    let first = ix == 0 || vertices[ix - 1].line_id != va.line_id;
    let last = ix + 2 >= n || vertices[ix + 2].line_id != va.line_id;

    let size = Vec2::new(target.width as f32, target.height as f32);
    let view_proj = Mat4(config.view_proj);
    let Some(seg) = setup_segment(&view_proj, va.position, vb.position, size) else {
        return;
    };
    let reach = target.reach;
    let lo = (seg.a.min(seg.b) - Vec2::new(reach, reach)).max(Vec2::default());
    let hi = (seg.a.max(seg.b) + Vec2::new(reach, reach)).min(size);
    let (x0, y0) = (lo.x.floor() as u32, lo.y.floor() as u32);
    let (x1, y1) = (hi.x.ceil() as u32, hi.y.ceil() as u32);
    for y in y0..y1 {
        for x in x0..x1 {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let t = segment_param(p, seg.a, seg.b);
            if (t < 0.0 && !first) || (t >= 1.0 && !last) {
                continue;
            }
            let tc = t.clamp(0.0, 1.0);
            let dist = p.distance(seg.a.mix(seg.b, tc));
            if dist > reach {
                continue;
            }
            f(Coverage {
                pixel_ix: (y * target.width + x) as usize,
                dist,
                depth: mix(seg.depth_a, seg.depth_b, tc).to_bits(),
                s: mix(seg.t0, seg.t1, tc),
            });
        }
    }
}

// Reserves a pool slot, or counts a dropped fragment once the pool is full.
fn alloc_fragment(counters: &mut FragmentCounters, capacity: u32) -> Option<usize> {
    if counters.count >= capacity {
        counters.dropped += 1;
        return None;
    }
    counters.count += 1;
    Some(counters.count as usize - 1)
}

pub fn build_lists_low_main(
    config: &ConfigUniform,
    vertices: &[Vertex],
    counters: &mut FragmentCounters,
    heads: &mut [u32],
    pool: &mut [FragmentLowRes],
) {
    let target = Target {
        width: config.low_width,
        height: config.low_height,
        half_width: config.low_half_width,
        reach: config.low_half_width,
        capacity: config.low_capacity.min(pool.len() as u32),
    };
    for ix in 0..vertices.len() {
        let va = vertices[ix];
        let vb = vertices.get(ix + 1).copied().unwrap_or(va);
        for_each_covered(config, vertices, ix, &target, |c| {
            let Some(slot) = alloc_fragment(counters, target.capacity) else {
                return;
            };
            pool[slot] = FragmentLowRes {
                depth: c.depth,
                alpha_weight: mix(va.alpha_weight, vb.alpha_weight, c.s),
                importance: mix(va.importance, vb.importance, c.s),
                next: heads[c.pixel_ix],
            };
            heads[c.pixel_ix] = slot as u32;
        });
    }
}

pub fn build_lists_main(
    config: &ConfigUniform,
    vertices: &[Vertex],
    counters: &mut FragmentCounters,
    heads: &mut [u32],
    pool: &mut [Fragment],
    current_alpha: &[f32],
) {
    let half_width = config.half_width;
    let target = Target {
        width: config.width,
        height: config.height,
        half_width,
        // Antialiased edges extend half a pixel beyond the line.
        reach: half_width + 0.5,
        capacity: config.capacity.min(pool.len() as u32),
    };
    for ix in 0..vertices.len() {
        let va = vertices[ix];
        let vb = vertices.get(ix + 1).copied().unwrap_or(va);
        for_each_covered(config, vertices, ix, &target, |c| {
            let Some(slot) = alloc_fragment(counters, target.capacity) else {
                return;
            };
            let coverage = (target.reach - c.dist).clamp(0.0, 1.0);
            let mut coverage_bits = (coverage * 255.0).round() as u32;
            if c.dist > config.halo_portion * target.half_width {
                coverage_bits |= HALO_FLAG;
            }
            let alpha = mix(current_alpha[ix], current_alpha[ix + 1], c.s);
            pool[slot] = Fragment {
                color: config.line_color,
                depth: c.depth,
                coverage: coverage_bits,
                scalar: mix(va.scalar, vb.scalar, c.s),
                transparency: alpha * coverage,
                transmittance: 1.0,
                next: heads[c.pixel_ix],
                _padding: 0,
            };
            heads[c.pixel_ix] = slot as u32;
        });
    }
}

pub fn build_lists_low(_n_wg: u32, resources: &[CpuBinding<'_>]) {
    let config = resources[0].uniform();
    let vertices = resources[1].slice();
    let mut counters = resources[2].typed_mut();
    let mut heads = resources[3].slice_mut();
    let mut pool = resources[4].slice_mut();
    build_lists_low_main(&config, &vertices, &mut counters, &mut heads, &mut pool);
}

pub fn build_lists(_n_wg: u32, resources: &[CpuBinding<'_>]) {
    let config = resources[0].uniform();
    let vertices = resources[1].slice();
    let mut counters = resources[2].typed_mut();
    let mut heads = resources[3].slice_mut();
    let mut pool = resources[4].slice_mut();
    let current_alpha = resources[5].slice();
    build_lists_main(
        &config,
        &vertices,
        &mut counters,
        &mut heads,
        &mut pool,
        &current_alpha,
    );
}
