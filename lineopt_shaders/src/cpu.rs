// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CPU implementations of the compute stages.
//!
//! Every stage is available in two forms: `stage(n_wg, resources)`, which takes
//! the same bindings as the WGSL entry point and is what the engine dispatches in
//! CPU mode, and `stage_main(...)`, which takes typed slices. A dispatch runs the
//! whole grid sequentially, so atomics become plain loads and stores.
//!
//! The output texture copy (`write_target`) has no CPU implementation.

// Allow un-idiomatic Rust to more closely match shaders
#![expect(
    clippy::needless_range_loop,
    reason = "Keeps code easily comparable to GPU shaders"
)]

mod build_lists;
mod cdf;
mod composite;
mod exponential_damping;
mod fade_alpha;
mod fill;
mod histogram;
mod histogram_setup;
mod min_gather;
mod normalize_scalars;
mod smooth_alpha;
mod sort_lists;
pub mod util;

pub use build_lists::{build_lists, build_lists_low, build_lists_low_main, build_lists_main};
pub use cdf::{cdf, cdf_main};
pub use composite::{composite, composite_main, sample_colormap};
pub use exponential_damping::{exponential_damping, exponential_damping_main};
pub use fade_alpha::{fade_alpha, fade_alpha_main};
pub use fill::{fill, fill_main};
pub use histogram::{histogram, histogram_main};
pub use histogram_setup::{histogram_setup, histogram_setup_main};
pub use min_gather::{min_gather, min_gather_main, opacity_target};
pub use normalize_scalars::{normalize_scalars, normalize_scalars_main};
pub use smooth_alpha::{smooth_alpha, smooth_alpha_main};
pub use sort_lists::{sort_lists, sort_lists_low, sort_lists_low_main, sort_lists_main};

use std::cell::{Ref, RefCell, RefMut};
use std::ops::Deref;

use bytemuck::Pod;

/// A buffer bound to a CPU stage.
#[derive(Clone, Copy)]
pub enum CpuBinding<'a> {
    /// Uniform data, read only.
    Buffer(&'a [u8]),
    /// A storage buffer owned by the engine.
    BufferRW(&'a RefCell<Vec<u8>>),
}

/// A read-only typed view of a [`CpuBinding`].
pub enum BindingRef<'a, T: ?Sized> {
    Bytes(&'a T),
    Cell(Ref<'a, T>),
}

impl<T: ?Sized> Deref for BindingRef<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self {
            Self::Bytes(value) => value,
            Self::Cell(value) => value,
        }
    }
}

impl CpuBinding<'_> {
    /// Reads a `T` from the start of the buffer.
    ///
    /// Uniform buffers may be padded, only the leading `size_of::<T>()` bytes are used.
    pub fn uniform<T: Pod>(&self) -> T {
        let size = size_of::<T>();
        match self {
            Self::Buffer(bytes) => bytemuck::pod_read_unaligned(&bytes[..size]),
            Self::BufferRW(cell) => bytemuck::pod_read_unaligned(&cell.borrow()[..size]),
        }
    }

    /// Borrows the start of a storage buffer as a single `T`.
    pub fn typed_mut<T: Pod>(&self) -> RefMut<'_, T> {
        RefMut::map(self.cell(), |bytes| {
            bytemuck::from_bytes_mut(&mut bytes[..size_of::<T>()])
        })
    }

    pub fn slice<T: Pod>(&self) -> BindingRef<'_, [T]> {
        match self {
            Self::Buffer(bytes) => BindingRef::Bytes(bytemuck::cast_slice(*bytes)),
            Self::BufferRW(cell) => {
                BindingRef::Cell(Ref::map(cell.borrow(), |bytes| bytemuck::cast_slice(bytes)))
            }
        }
    }

    pub fn slice_mut<T: Pod>(&self) -> RefMut<'_, [T]> {
        RefMut::map(self.cell(), |bytes| bytemuck::cast_slice_mut(bytes))
    }

    fn cell(&self) -> RefMut<'_, Vec<u8>> {
        match self {
            Self::Buffer(_) => panic!("uniform buffers can't be written"),
            Self::BufferRW(cell) => cell.borrow_mut(),
        }
    }
}
