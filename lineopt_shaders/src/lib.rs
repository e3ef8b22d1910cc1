// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The compute shaders of the lineopt renderer, together with the metadata needed to
//! build pipelines for them on any GPU API.
//!
//! The WGSL sources under `shader/` are preprocessed and reflected with naga at build
//! time. Your first choice should be the generated [`SHADERS`] table. The [`compile`]
//! module exposes the same step at runtime behind the `compile` feature, and the
//! [`cpu`] module holds a CPU implementation of every stage behind the `cpu` feature.

// LINEBENDER LINT SET - lib.rs - v2
// See https://linebender.org/wiki/canonical-lints/
// These lints aren't included in Cargo.toml because they
// shouldn't apply to examples and tests
#![warn(unused_crate_dependencies)]
#![warn(clippy::print_stdout, clippy::print_stderr)]
// Targeting e.g. 32-bit means structs containing usize can give false positives for 64-bit.
#![cfg_attr(target_pointer_width = "64", warn(clippy::trivially_copy_pass_by_ref))]
// END LINEBENDER LINT SET
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs, reason = "We have many as-yet undocumented items.")]
#![allow(
    missing_debug_implementations,
    unnameable_types,
    clippy::cast_possible_truncation,
    reason = "Deferred, only apply in some feature sets so not expect"
)]

mod types;

#[cfg(feature = "compile")]
pub mod compile;
#[cfg(feature = "cpu")]
pub mod cpu;

pub use types::{BindType, BindingInfo};

use std::borrow::Cow;

#[derive(Clone, Debug)]
pub struct ComputeShader<'a> {
    pub name: Cow<'a, str>,
    pub workgroup_size: [u32; 3],
    pub bindings: Cow<'a, [BindType]>,

    #[cfg(feature = "wgsl")]
    pub wgsl: WgslSource<'a>,
}

#[cfg(feature = "wgsl")]
#[derive(Clone, Debug)]
pub struct WgslSource<'a> {
    pub code: Cow<'a, str>,

    /// Contains the binding index of each resource listed in `ComputeShader::bindings`.
    /// This is guaranteed to have the same element count as `ComputeShader::bindings`.
    ///
    /// Each index is the value of the corresponding `@binding(..)` declaration in the
    /// shader source. The bind group index is always 0.
    pub binding_indices: Cow<'a, [u8]>,
}

include!(concat!(env!("OUT_DIR"), "/shaders.rs"));

pub use generated::SHADERS;
