// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Binding metadata, shared between the build script and the crate.

/// How a shader accesses one of its bindings.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum BindType {
    /// `var<uniform>`
    Uniform,
    /// `var<storage, read>`
    ReadOnly,
    /// `var<storage, read_write>`, possibly with atomics.
    Storage,
    /// The `rgba8unorm` write-only storage texture a frame ends in.
    Target,
}

/// A reflected binding of bind group `group`.
#[derive(Clone, Debug)]
pub struct BindingInfo {
    pub name: Option<String>,
    pub group: u32,
    pub binding: u32,
    pub ty: BindType,
}
