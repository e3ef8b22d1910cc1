// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Data layout shared between the host and the lineopt compute stages.
//!
//! Every `#[repr(C)]` type in this crate has a twin declared in the WGSL sources of
//! `lineopt_shaders`; the two must be kept in sync.

// LINEBENDER LINT SET - lib.rs - v2
// See https://linebender.org/wiki/canonical-lints/
// These lints aren't included in Cargo.toml because they
// shouldn't apply to examples and tests
#![warn(unused_crate_dependencies)]
#![warn(clippy::print_stdout, clippy::print_stderr)]
// Targeting e.g. 32-bit means structs containing usize can give false positives for 64-bit.
#![cfg_attr(target_pointer_width = "64", warn(clippy::trivially_copy_pass_by_ref))]
// END LINEBENDER LINT SET
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![allow(missing_docs, reason = "We have many as-yet undocumented items.")]
#![allow(
    missing_debug_implementations,
    clippy::cast_possible_truncation,
    clippy::missing_panics_doc,
    reason = "Deferred"
)]

mod config;
mod fragment;
mod histogram;
mod line_set;
pub mod math;

pub use config::{
    BufferSize, BufferSizes, CdfUniform, ConfigUniform, EXPECTED_OVERDRAW, FillUniform,
    FragmentCounters, IndirectCount, MAX_POOL_BYTES, RenderConfig, SmoothUniform, WORKGROUP_SIZE,
    WorkgroupCounts, WorkgroupSize,
};
pub use fragment::{
    COVERAGE_MASK, Fragment, FragmentLowRes, HALO_FLAG, INVALID_INDEX, Vertex, depth_to_bits,
    pack_color,
};
pub use histogram::{
    DEFAULT_BINS, HISTOGRAM_SEGMENTS_MAX, HistogramMode, MAX_BINS, MIN_BINS, SegmentError,
    Segments,
};
pub use line_set::{LineSet, LineSetError, alpha_weights, distribute_control_points};
pub use math::Mat4;
