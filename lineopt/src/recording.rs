// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Command lists recorded by the renderer and executed by an engine.
//!
//! Resources are named by proxies. A buffer proxy refers to nothing until the first
//! command that needs it runs, and it stays alive across recordings until a
//! [`Command::Free`] for it has run. This is how the solved opacities and the damped
//! CDF carry over from one frame to the next.

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

pub use lineopt_shaders::BindType;

/// Index of a shader registered with an engine.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug)]
pub struct ShaderId(pub usize);

/// Identity of a proxied resource, unique for the lifetime of the process.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ResourceId(pub NonZeroU64);

impl ResourceId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NonZeroU64::MIN.saturating_add(NEXT.fetch_add(1, Ordering::Relaxed)))
    }
}

/// Handle to a buffer of `size` bytes.
#[derive(Clone, Copy, Debug)]
pub struct BufferProxy {
    pub size: u64,
    pub id: ResourceId,
    pub name: &'static str,
}

impl BufferProxy {
    pub fn new(size: u64, name: &'static str) -> Self {
        debug_assert!(size > 0, "buffer '{name}' is empty");
        Self {
            size,
            id: ResourceId::next(),
            name,
        }
    }
}

/// Handle to the `Rgba8Unorm` storage texture a frame is written to.
///
/// The texture belongs to the caller and is bound when the recording runs.
#[derive(Clone, Copy, Debug)]
pub struct ImageProxy {
    pub width: u32,
    pub height: u32,
    pub id: ResourceId,
}

impl ImageProxy {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            id: ResourceId::next(),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub enum ResourceProxy {
    Buffer(BufferProxy),
    Image(ImageProxy),
}

impl From<BufferProxy> for ResourceProxy {
    fn from(buf: BufferProxy) -> Self {
        Self::Buffer(buf)
    }
}

impl From<ImageProxy> for ResourceProxy {
    fn from(image: ImageProxy) -> Self {
        Self::Image(image)
    }
}

/// How many workgroups a [`Dispatch`] launches.
#[derive(Clone, Copy, Debug)]
pub enum DispatchSize {
    Workgroups(u32, u32, u32),
    /// Three `u32` counts written by an earlier dispatch, starting at `offset` bytes.
    Indirect { buf: BufferProxy, offset: u64 },
}

#[derive(Clone, Debug)]
pub struct Dispatch {
    pub shader: ShaderId,
    pub size: DispatchSize,
    /// One resource per binding of the shader, in binding order.
    pub bindings: Vec<ResourceProxy>,
}

/// A single step of a [`Recording`].
#[derive(Clone, Debug)]
pub enum Command {
    /// Creates a storage buffer holding the data.
    Upload(BufferProxy, Vec<u8>),
    /// Creates a uniform buffer holding the data.
    Uniform(BufferProxy, Vec<u8>),
    Dispatch(Dispatch),
    /// Sets every byte of the buffer to zero, creating it if needed.
    Zero(BufferProxy),
    /// Copies the whole of `src` into `dst`, creating `dst` if needed.
    Copy { src: BufferProxy, dst: BufferProxy },
    /// Snapshots the buffer for reading on the host once the recording ran.
    Download(BufferProxy),
    /// Releases the buffer after the recording ran.
    Free(BufferProxy),
    /// Opens a named timer scope around the following commands, nested in the open one.
    PushScope(&'static str),
    /// Closes the innermost timer scope.
    PopScope,
}

/// Commands for an engine to execute in order.
#[derive(Clone, Debug, Default)]
pub struct Recording {
    commands: Vec<Command>,
}

impl Recording {
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Records the upload of `data` into a new storage buffer.
    pub fn upload(&mut self, name: &'static str, data: impl Into<Vec<u8>>) -> BufferProxy {
        let data = data.into();
        let buf = BufferProxy::new(data.len() as u64, name);
        self.commands.push(Command::Upload(buf, data));
        buf
    }

    /// Records the upload of `data` into a new uniform buffer.
    pub fn upload_uniform(&mut self, name: &'static str, data: impl Into<Vec<u8>>) -> BufferProxy {
        let data = data.into();
        let buf = BufferProxy::new(data.len() as u64, name);
        self.commands.push(Command::Uniform(buf, data));
        buf
    }

    pub fn dispatch<R>(&mut self, shader: ShaderId, wg_counts: (u32, u32, u32), resources: R)
    where
        R: IntoIterator,
        R::Item: Into<ResourceProxy>,
    {
        let (x, y, z) = wg_counts;
        self.push_dispatch(shader, DispatchSize::Workgroups(x, y, z), resources);
    }

    /// Records a dispatch whose workgroup counts are read from `buf` at `offset`.
    pub fn dispatch_indirect<R>(
        &mut self,
        shader: ShaderId,
        buf: BufferProxy,
        offset: u64,
        resources: R,
    ) where
        R: IntoIterator,
        R::Item: Into<ResourceProxy>,
    {
        self.push_dispatch(shader, DispatchSize::Indirect { buf, offset }, resources);
    }

    fn push_dispatch<R>(&mut self, shader: ShaderId, size: DispatchSize, resources: R)
    where
        R: IntoIterator,
        R::Item: Into<ResourceProxy>,
    {
        let bindings = resources.into_iter().map(Into::into).collect();
        self.commands.push(Command::Dispatch(Dispatch {
            shader,
            size,
            bindings,
        }));
    }

    /// Records a download. The buffer may be freed right after.
    pub fn download(&mut self, buf: BufferProxy) {
        self.commands.push(Command::Download(buf));
    }

    pub fn clear_all(&mut self, buf: BufferProxy) {
        self.commands.push(Command::Zero(buf));
    }

    /// Records a copy between two buffers of the same size.
    pub fn copy_buffer(&mut self, src: BufferProxy, dst: BufferProxy) {
        debug_assert_eq!(src.size, dst.size, "copy from '{}' to '{}'", src.name, dst.name);
        self.commands.push(Command::Copy { src, dst });
    }

    pub fn free_buffer(&mut self, buf: BufferProxy) {
        self.commands.push(Command::Free(buf));
    }

    /// Times the commands up to the matching [`pop_scope`](Self::pop_scope) as `label`.
    ///
    /// Scopes only have an effect with the `wgpu-profiler` feature.
    pub fn push_scope(&mut self, label: &'static str) {
        self.commands.push(Command::PushScope(label));
    }

    pub fn pop_scope(&mut self) {
        self.commands.push(Command::PopScope);
    }
}
