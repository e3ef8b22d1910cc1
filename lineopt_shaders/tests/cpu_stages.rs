// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CPU stage tests driven through the same bindings the engine uses.

use std::cell::RefCell;

use bytemuck::{bytes_of, cast_slice};
use lineopt_encoding::{
    CdfUniform, ConfigUniform, Fragment, FragmentCounters, FragmentLowRes, INVALID_INDEX, Mat4,
    Segments, SmoothUniform, Vertex,
};
use lineopt_shaders::cpu::{
    CpuBinding, build_lists_low, cdf, exponential_damping, min_gather, smooth_alpha, sort_lists,
};

fn rw<T: bytemuck::Pod>(data: &[T]) -> RefCell<Vec<u8>> {
    RefCell::new(cast_slice::<T, u8>(data).to_vec())
}

fn read<T: bytemuck::Pod>(buf: &RefCell<Vec<u8>>) -> Vec<T> {
    cast_slice::<u8, T>(&buf.borrow()).to_vec()
}

fn fragment(depth: f32, transparency: f32, next: u32) -> Fragment {
    Fragment {
        depth: depth.to_bits(),
        transparency,
        next,
        ..Default::default()
    }
}

fn walk(head: u32, pool: &[Fragment]) -> Vec<u32> {
    let mut out = vec![];
    let mut ix = head;
    while ix != INVALID_INDEX {
        out.push(ix);
        ix = pool[ix as usize].next;
    }
    out
}

#[test]
fn sort_orders_front_to_back_and_is_idempotent() {
    let config = ConfigUniform {
        width: 2,
        height: 1,
        ..Default::default()
    };
    // Pixel 0: 0 -> 1 -> 2 -> 3, pixel 1 is empty.
    let pool = vec![
        fragment(0.5, 0.5, 1),
        fragment(0.25, 0.5, 2),
        fragment(0.75, 0.5, 3),
        fragment(0.25, 0.5, INVALID_INDEX),
    ];
    let heads = rw(&[0_u32, INVALID_INDEX]);
    let pool = rw(&pool);
    let bindings = [
        CpuBinding::Buffer(bytes_of(&config)),
        CpuBinding::BufferRW(&heads),
        CpuBinding::BufferRW(&pool),
    ];
    sort_lists(1, &bindings);
    let first_heads: Vec<u32> = read(&heads);
    let first_pool: Vec<Fragment> = read(&pool);
    // Equal depths keep their list order.
    assert_eq!(walk(first_heads[0], &first_pool), vec![1, 3, 0, 2]);
    assert_eq!(first_heads[1], INVALID_INDEX);
    let transmittances: Vec<f32> = walk(first_heads[0], &first_pool)
        .iter()
        .map(|&ix| first_pool[ix as usize].transmittance)
        .collect();
    assert_eq!(transmittances, vec![1.0, 0.5, 0.25, 0.125]);

    sort_lists(1, &bindings);
    assert_eq!(read::<u32>(&heads), first_heads);
    assert_eq!(read::<Fragment>(&pool), first_pool);
}

fn run_cdf(bins: &[u32], segments: &Segments) -> Vec<f32> {
    let params = CdfUniform::new(bins.len() as u32, 0.001, segments);
    let histogram = rw(&vec![0.0_f32; bins.len()]);
    let out = rw(&vec![0.0_f32; bins.len()]);
    cdf(
        1,
        &[
            CpuBinding::Buffer(bytes_of(&params)),
            CpuBinding::Buffer(cast_slice(bins)),
            CpuBinding::BufferRW(&histogram),
            CpuBinding::BufferRW(&out),
        ],
    );
    read(&out)
}

#[test]
fn equalization_cdf_is_monotone_and_ends_at_one() {
    let bins = [0, 5, 1, 0, 0, 9, 3, 0, 0, 2, 0, 0, 7, 0, 0, 1];
    let values = run_cdf(&bins, &Segments::full());
    assert!(values.windows(2).all(|w| w[0] <= w[1]));
    assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
    assert!((values[15] - 1.0).abs() < 1e-6);
}

#[test]
fn bi_equalization_halves_are_independent() {
    let bins = [1, 2, 3, 4, 0, 0, 0, 9];
    let values = run_cdf(&bins, &Segments::bi());
    // The first half reaches its local maximum at bin k - 1.
    assert!((values[3] - 0.5).abs() < 1e-6);
    assert!(values[4] >= 0.5);
    assert!((values[7] - 1.0).abs() < 1e-6);
    assert!(values.windows(2).all(|w| w[0] <= w[1]));

    let segmented = run_cdf(&bins, &Segments::new(&[0.0, 0.5, 1.0]).unwrap());
    assert_eq!(values, segmented);
}

#[test]
fn segments_are_equalized_between_their_breakpoints() {
    // With 13 bins the breakpoints 0.2 and 0.7 land on the rounded bins 3 and 9.
    let bins = [4, 0, 2, 1, 3, 0, 5, 2, 1, 0, 6, 1, 2];
    let values = run_cdf(&bins, &Segments::new(&[0.0, 0.2, 0.7, 1.0]).unwrap());
    assert!(values.windows(2).all(|w| w[0] <= w[1]));
    assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));

    let segments = [(0.0_f32, 0.2_f32, 0..3), (0.2, 0.7, 3..9), (0.7, 1.0, 9..13)];
    for (b0, b1, range) in segments {
        // Every segment reaches its upper breakpoint at its own last bin.
        assert!((values[range.end - 1] - b1).abs() < 1e-6);
        let total: f32 = bins[range.clone()].iter().map(|&b| b as f32 + 0.001).sum();
        let mut acc = 0.0;
        for i in range {
            acc += bins[i] as f32 + 0.001;
            let local = (values[i] - b0) / (b1 - b0);
            assert!((local - acc / total).abs() < 1e-5, "bin {i}");
            assert!(values[i] > b0 && values[i] <= b1 + 1e-6);
        }
    }
}

#[test]
fn smoothing_relaxes_along_each_line() {
    let config = ConfigUniform {
        n_control_points: 7,
        ..Default::default()
    };
    let params = SmoothUniform::new(0.25);
    // Line 0 has four control points, line 1 two and line 2 a single one.
    let lines = [0_u32, 0, 0, 0, 1, 1, 2];
    let alpha_in: Vec<u32> = [0.2_f32, 0.6, 0.4, 1.0, 0.3, 0.9, 0.5]
        .iter()
        .map(|a| a.to_bits())
        .collect();
    let alpha_out = rw(&[0_u32; 7]);
    smooth_alpha(
        1,
        &[
            CpuBinding::Buffer(bytes_of(&config)),
            CpuBinding::Buffer(bytes_of(&params)),
            CpuBinding::Buffer(cast_slice(&lines)),
            CpuBinding::Buffer(cast_slice(&alpha_in)),
            CpuBinding::BufferRW(&alpha_out),
        ],
    );
    let out: Vec<f32> = read::<u32>(&alpha_out)
        .into_iter()
        .map(f32::from_bits)
        .collect();
    let expected = [
        // One-sided at the start of a line.
        0.2 + 0.25 * (0.6 - 0.2),
        // Interior points see both neighbours.
        0.6 + 0.25 * (0.2 + 0.4 - 2.0 * 0.6),
        0.4 + 0.25 * (0.6 + 1.0 - 2.0 * 0.4),
        // Line ends ignore the first point of the next line.
        1.0 + 0.25 * (0.4 - 1.0),
        0.3 + 0.25 * (0.9 - 0.3),
        0.9 + 0.25 * (0.3 - 0.9),
        // A lone control point is copied.
        0.5,
    ];
    for (i, (&got, &want)) in out.iter().zip(&expected).enumerate() {
        assert!((got - want).abs() < 1e-6, "control point {i}: {got} != {want}");
    }
}

#[test]
fn untouched_control_points_smooth_as_opaque() {
    let config = ConfigUniform {
        n_control_points: 3,
        ..Default::default()
    };
    let params = SmoothUniform::new(0.5);
    let lines = [0_u32; 3];
    let alpha_in = [0.0_f32.to_bits(), INVALID_INDEX, INVALID_INDEX];
    let alpha_out = rw(&[0_u32; 3]);
    smooth_alpha(
        1,
        &[
            CpuBinding::Buffer(bytes_of(&config)),
            CpuBinding::Buffer(bytes_of(&params)),
            CpuBinding::Buffer(cast_slice(&lines)),
            CpuBinding::Buffer(cast_slice(&alpha_in)),
            CpuBinding::BufferRW(&alpha_out),
        ],
    );
    let out: Vec<f32> = read::<u32>(&alpha_out)
        .into_iter()
        .map(f32::from_bits)
        .collect();
    assert_eq!(out, [0.5, 0.5, 1.0]);
}

#[test]
fn degenerate_histogram_falls_back_to_identity() {
    let values = run_cdf(&[0, 0, 12, 0], &Segments::full());
    assert_eq!(values, vec![0.25, 0.5, 0.75, 1.0]);
    let empty = run_cdf(&[0; 4], &Segments::full());
    assert_eq!(empty, vec![0.25, 0.5, 0.75, 1.0]);
}

#[test]
fn damping_converges_and_decays_geometrically() {
    let config = ConfigUniform {
        n_bins: 2,
        damping: 0.5,
        ..Default::default()
    };
    let target = [0.25_f32, 1.0];
    let damped = rw(&[1.0_f32, 0.0]);
    for _ in 0..40 {
        exponential_damping(
            1,
            &[
                CpuBinding::Buffer(bytes_of(&config)),
                CpuBinding::Buffer(cast_slice(&target)),
                CpuBinding::BufferRW(&damped),
            ],
        );
    }
    let converged: Vec<f32> = read(&damped);
    assert!((converged[0] - 0.25).abs() < 1e-6);
    assert!((converged[1] - 1.0).abs() < 1e-6);

    // A one frame impulse halves every frame.
    let zero = [0.0_f32; 2];
    let damped = rw(&[1.0_f32, 1.0]);
    let mut expected = 1.0;
    for _ in 0..5 {
        exponential_damping(
            1,
            &[
                CpuBinding::Buffer(bytes_of(&config)),
                CpuBinding::Buffer(cast_slice(&zero)),
                CpuBinding::BufferRW(&damped),
            ],
        );
        expected *= 0.5;
        assert_eq!(read::<f32>(&damped)[0], expected);
    }
}

#[test]
fn zero_penalties_leave_alpha_opaque() {
    let config = ConfigUniform {
        low_width: 1,
        low_height: 1,
        n_control_points: 3,
        lambda: 1.0,
        ..Default::default()
    };
    let pool = [
        FragmentLowRes {
            depth: 0.1_f32.to_bits(),
            alpha_weight: 0.5,
            importance: 0.2,
            next: 1,
        },
        FragmentLowRes {
            depth: 0.2_f32.to_bits(),
            alpha_weight: 1.5,
            importance: 0.9,
            next: INVALID_INDEX,
        },
    ];
    let heads = [0_u32];
    let lines = [0_u32, 0, 0];
    let alpha = rw(&[INVALID_INDEX; 3]);
    min_gather(
        1,
        &[
            CpuBinding::Buffer(bytes_of(&config)),
            CpuBinding::Buffer(cast_slice(&heads)),
            CpuBinding::Buffer(cast_slice(&pool)),
            CpuBinding::Buffer(cast_slice(&lines)),
            CpuBinding::BufferRW(&alpha),
        ],
    );
    let alpha: Vec<u32> = read(&alpha);
    assert!(alpha.iter().all(|&a| f32::from_bits(a) == 1.0));
}

#[test]
fn pool_overflow_saturates_and_keeps_lists_well_formed() {
    // A horizontal line across a 16x4 target, three pixels wide.
    let vertices = [
        Vertex {
            position: [-1.0, 0.0, 0.5],
            ..Default::default()
        },
        Vertex {
            position: [1.0, 0.0, 0.5],
            ..Default::default()
        },
    ];
    let capacity = 10;
    let config = ConfigUniform {
        view_proj: Mat4::IDENTITY.0,
        low_width: 16,
        low_height: 4,
        low_half_width: 1.5,
        low_capacity: capacity,
        n_vertices: 2,
        ..Default::default()
    };
    let counters = rw(&[FragmentCounters::default()]);
    let heads = rw(&[INVALID_INDEX; 64]);
    let pool = rw(&vec![FragmentLowRes::default(); capacity as usize]);
    build_lists_low(
        1,
        &[
            CpuBinding::Buffer(bytes_of(&config)),
            CpuBinding::Buffer(cast_slice(&vertices)),
            CpuBinding::BufferRW(&counters),
            CpuBinding::BufferRW(&heads),
            CpuBinding::BufferRW(&pool),
        ],
    );
    let counters: Vec<FragmentCounters> = read(&counters);
    assert_eq!(counters[0].count, capacity);
    assert!(counters[0].dropped > 0);

    let heads: Vec<u32> = read(&heads);
    let pool: Vec<FragmentLowRes> = read(&pool);
    let mut seen = vec![false; capacity as usize];
    for &head in &heads {
        let mut ix = head;
        while ix != INVALID_INDEX {
            assert!(ix < capacity);
            assert!(!seen[ix as usize], "fragment linked twice");
            seen[ix as usize] = true;
            ix = pool[ix as usize].next;
        }
    }
    assert!(seen.iter().all(|&s| s));
}
