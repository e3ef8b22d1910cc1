// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Executes [`Recording`]s on a wgpu device.
//!
//! With `use_cpu`, every stage that has a host version runs on the CPU and its buffers
//! stay in host memory. Data only moves from the host to the GPU: a host buffer bound by
//! a GPU stage is uploaded and stays on the GPU until it is freed. In practice this only
//! happens for the final image, which is written to the target texture on the GPU.

use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::num::NonZeroU64;

use wgpu::{
    BindGroupLayout, BindGroupLayoutEntry, Buffer, BufferUsages, CommandEncoder, ComputePipeline,
    Device, PipelineCache, Queue, TextureView,
};

use crate::recording::{
    BindType, BufferProxy, Command, Dispatch, DispatchSize, ImageProxy, Recording, ResourceId,
    ResourceProxy, ShaderId,
};
use crate::{Error, Result};
use lineopt_shaders::cpu::CpuBinding;

/// A stage implementation that runs on the host, see [`lineopt_shaders::cpu`].
pub(crate) type HostStage = fn(u32, &[CpuBinding<'_>]);

/// Every storage buffer gets the same usages, so recycled buffers fit any role.
const STORAGE: BufferUsages = BufferUsages::STORAGE
    .union(BufferUsages::COPY_SRC)
    .union(BufferUsages::COPY_DST)
    .union(BufferUsages::INDIRECT);
const UNIFORM: BufferUsages = BufferUsages::UNIFORM.union(BufferUsages::COPY_DST);

/// Smallest buffer handed out, large enough for any uniform.
const MIN_BUFFER_SIZE: u64 = 16;

struct Pipeline {
    pipeline: ComputePipeline,
    layout: BindGroupLayout,
}

struct Kernel {
    label: &'static str,
    gpu: Option<Pipeline>,
    host: Option<HostStage>,
}

/// A pipeline whose creation waits for [`WgpuEngine::build_shaders_if_needed`].
#[cfg(not(target_arch = "wasm32"))]
struct PipelineRequest {
    shader: ShaderId,
    label: &'static str,
    wgsl: Cow<'static, str>,
    entries: Vec<BindGroupLayoutEntry>,
}

enum Storage {
    Device(Buffer),
    Host(RefCell<Vec<u8>>),
}

/// Buffers that are alive between recordings.
#[derive(Default)]
struct Residents {
    buffers: HashMap<ResourceId, Storage>,
    /// Buffers zeroed before anything created them.
    zeroed: HashSet<ResourceId>,
}

/// Freed device buffers, bucketed by size and usage.
#[derive(Default)]
struct Recycler {
    free: HashMap<(u64, BufferUsages), Vec<Buffer>>,
}

/// Resources that only live while one recording runs.
struct RecordingScope<'r> {
    uniforms: HashMap<ResourceId, &'r [u8]>,
    /// Uniforms bound by a GPU stage.
    uniform_buffers: HashMap<ResourceId, Buffer>,
    images: HashMap<ResourceId, &'r TextureView>,
    freed: Vec<BufferProxy>,
}

/// Timer queries of one recording: the recording itself, then every open scope.
#[cfg(feature = "wgpu-profiler")]
struct Timers<'p> {
    profiler: &'p mut wgpu_profiler::GpuProfiler,
    scopes: Vec<wgpu_profiler::GpuProfilerQuery>,
}

#[cfg(feature = "wgpu-profiler")]
impl<'p> Timers<'p> {
    fn new(
        profiler: &'p mut wgpu_profiler::GpuProfiler,
        label: &str,
        encoder: &mut CommandEncoder,
    ) -> Self {
        let root = profiler.begin_query(label, encoder);
        Self {
            profiler,
            scopes: vec![root],
        }
    }

    fn open(&mut self, label: &str, encoder: &mut CommandEncoder) {
        let query = self
            .profiler
            .begin_query(label, encoder)
            .with_parent(self.scopes.last());
        self.scopes.push(query);
    }

    fn close(&mut self, encoder: &mut CommandEncoder) {
        // The recording's own query is closed by `finish`.
        if self.scopes.len() > 1
            && let Some(query) = self.scopes.pop()
        {
            self.profiler.end_query(encoder, query);
        }
    }

    fn finish(mut self, encoder: &mut CommandEncoder) {
        while let Some(query) = self.scopes.pop() {
            self.profiler.end_query(encoder, query);
        }
        self.profiler.resolve_queries(encoder);
    }
}

pub(crate) enum ExternalResource<'a> {
    Image(ImageProxy, &'a TextureView),
}

/// The snapshot taken by a [`Command::Download`].
pub(crate) enum Download {
    /// A `MAP_READ` buffer, readable once mapped.
    Device(Buffer),
    Host(Vec<u8>),
}

#[derive(Default)]
pub(crate) struct WgpuEngine {
    kernels: Vec<Kernel>,
    residents: Residents,
    recycler: Recycler,
    downloads: HashMap<ResourceId, Download>,
    #[cfg(not(target_arch = "wasm32"))]
    deferred: Option<Vec<PipelineRequest>>,
    use_cpu: bool,
    pipeline_cache: Option<PipelineCache>,
}

impl WgpuEngine {
    pub fn new(use_cpu: bool, pipeline_cache: Option<PipelineCache>) -> Self {
        Self {
            use_cpu,
            pipeline_cache,
            ..Default::default()
        }
    }

    /// Defers pipeline creation of shaders added from now on to
    /// [`build_shaders_if_needed`](Self::build_shaders_if_needed).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn use_parallel_initialisation(&mut self) {
        self.deferred.get_or_insert_with(Vec::new);
    }

    /// Creates the deferred pipelines on `num_threads` threads, the calling thread included.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn build_shaders_if_needed(
        &mut self,
        device: &Device,
        num_threads: Option<std::num::NonZeroUsize>,
    ) {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let Some(requests) = self.deferred.take() else {
            return;
        };
        if requests.is_empty() {
            return;
        }
        let threads = num_threads
            .map_or_else(
                // Leave a couple of cores to the rest of the application.
                || std::thread::available_parallelism().map_or(2, |n| n.get().max(4) - 2),
                |n| n.get(),
            )
            .min(requests.len());
        log::info!(
            "Creating {} compute pipelines on {threads} threads",
            requests.len()
        );

        let next = AtomicUsize::new(0);
        let cache = self.pipeline_cache.as_ref();
        let requests = &requests;
        let next = &next;
        let work = move || {
            let mut built = Vec::new();
            while let Some(request) = requests.get(next.fetch_add(1, Ordering::Relaxed)) {
                let pipeline = Pipeline::new(
                    device,
                    request.label,
                    request.wgsl.clone(),
                    &request.entries,
                    cache,
                );
                built.push((request.shader, pipeline));
            }
            built
        };
        let built = std::thread::scope(|scope| {
            let workers: Vec<_> = (1..threads)
                .filter_map(|_| {
                    std::thread::Builder::new()
                        .name("lineopt pipeline worker".into())
                        .spawn_scoped(scope, work)
                        .inspect_err(|e| log::warn!("Could not spawn a pipeline worker: {e}"))
                        .ok()
                })
                .collect();
            let mut built = work();
            for worker in workers {
                match worker.join() {
                    Ok(more) => built.extend(more),
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            }
            built
        });
        for (shader, pipeline) in built {
            self.kernels[shader.0].gpu = Some(pipeline);
        }
    }

    /// Registers a compute shader with a single bind group.
    ///
    /// In CPU mode, `host` replaces the GPU pipeline when present.
    pub fn add_compute_shader(
        &mut self,
        device: &Device,
        label: &'static str,
        wgsl: Cow<'static, str>,
        layout: &[BindType],
        host: Option<HostStage>,
    ) -> ShaderId {
        let shader = ShaderId(self.kernels.len());
        let mut kernel = Kernel {
            label,
            gpu: None,
            host: host.filter(|_| self.use_cpu),
        };
        if kernel.host.is_none() {
            let entries = layout_entries(layout);
            #[cfg(not(target_arch = "wasm32"))]
            if let Some(deferred) = self.deferred.as_mut() {
                deferred.push(PipelineRequest {
                    shader,
                    label,
                    wgsl,
                    entries,
                });
                self.kernels.push(kernel);
                return shader;
            }
            kernel.gpu = Some(Pipeline::new(
                device,
                label,
                wgsl,
                &entries,
                self.pipeline_cache.as_ref(),
            ));
        }
        self.kernels.push(kernel);
        shader
    }

    pub fn run_recording(
        &mut self,
        device: &Device,
        queue: &Queue,
        recording: &Recording,
        external_resources: &[ExternalResource<'_>],
        label: &'static str,
        #[cfg(feature = "wgpu-profiler")] profiler: &mut wgpu_profiler::GpuProfiler,
    ) -> Result<()> {
        let mut scope = RecordingScope {
            uniforms: HashMap::new(),
            uniform_buffers: HashMap::new(),
            images: external_resources
                .iter()
                .map(|ExternalResource::Image(image, view)| (image.id, *view))
                .collect(),
            freed: Vec::new(),
        };
        let mut encoder =
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        #[cfg(feature = "wgpu-profiler")]
        let mut timers = Timers::new(profiler, label, &mut encoder);
        for command in recording.commands() {
            match command {
                Command::Upload(buf, data) => self.upload(device, queue, buf, data),
                Command::Uniform(buf, data) => {
                    scope.uniforms.insert(buf.id, data.as_slice());
                }
                Command::Dispatch(dispatch) => {
                    self.dispatch(
                        device,
                        queue,
                        &mut encoder,
                        &mut scope,
                        dispatch,
                        #[cfg(feature = "wgpu-profiler")]
                        &mut timers,
                    )?;
                }
                Command::Zero(buf) => self.zero(&mut encoder, buf),
                Command::Copy { src, dst } => self.copy(device, &mut encoder, src, dst)?,
                Command::Download(buf) => self.download(device, &mut encoder, buf)?,
                Command::Free(buf) => scope.freed.push(*buf),
                #[cfg_attr(
                    not(feature = "wgpu-profiler"),
                    expect(unused_variables, reason = "Scopes are only used for timing")
                )]
                Command::PushScope(scope_label) => {
                    #[cfg(feature = "wgpu-profiler")]
                    timers.open(scope_label, &mut encoder);
                }
                Command::PopScope => {
                    #[cfg(feature = "wgpu-profiler")]
                    timers.close(&mut encoder);
                }
            }
        }
        #[cfg(feature = "wgpu-profiler")]
        timers.finish(&mut encoder);
        queue.submit(Some(encoder.finish()));

        for buffer in scope.uniform_buffers.into_values() {
            self.recycler.give(buffer);
        }
        for buf in scope.freed {
            self.residents.zeroed.remove(&buf.id);
            if let Some(Storage::Device(buffer)) = self.residents.buffers.remove(&buf.id) {
                self.recycler.give(buffer);
            }
        }
        log::trace!(
            "Ran {label} with {} commands, {} buffers resident",
            recording.commands().len(),
            self.residents.buffers.len()
        );
        Ok(())
    }

    /// Removes the snapshot taken by the last download of `buf`.
    pub fn take_download(&mut self, buf: BufferProxy) -> Option<Download> {
        self.downloads.remove(&buf.id)
    }

    fn upload(&mut self, device: &Device, queue: &Queue, buf: &BufferProxy, data: &[u8]) {
        let storage = if self.use_cpu {
            Storage::Host(RefCell::new(data.to_vec()))
        } else {
            let buffer = self.recycler.take(device, buf.name, buf.size, STORAGE);
            queue.write_buffer(&buffer, 0, data);
            Storage::Device(buffer)
        };
        self.residents.zeroed.remove(&buf.id);
        self.residents.buffers.insert(buf.id, storage);
    }

    fn dispatch<'r>(
        &mut self,
        device: &Device,
        queue: &Queue,
        encoder: &mut CommandEncoder,
        scope: &mut RecordingScope<'r>,
        dispatch: &Dispatch,
        #[cfg(feature = "wgpu-profiler")] timers: &mut Timers<'_>,
    ) -> Result<()> {
        let kernel = &self.kernels[dispatch.shader.0];
        if let Some(stage) = kernel.host {
            // Host stages run right away, the GPU work recorded so far cannot affect them.
            let n_wg = match dispatch.size {
                DispatchSize::Workgroups(x, _, _) => x,
                DispatchSize::Indirect { buf, offset } => self.residents.host_word(&buf, offset)?,
            };
            let bindings =
                self.residents
                    .host_bindings(&scope.uniforms, &dispatch.bindings, kernel.label)?;
            stage(n_wg, &bindings);
            return Ok(());
        }
        let pipeline = kernel.gpu.as_ref().ok_or(Error::MissingPipeline(kernel.label))?;
        if let DispatchSize::Workgroups(x, y, z) = dispatch.size
            && (x == 0 || y == 0 || z == 0)
        {
            // Some backends reject empty dispatches.
            return Ok(());
        }

        for resource in &dispatch.bindings {
            let ResourceProxy::Buffer(buf) = resource else {
                continue;
            };
            if let Some(&data) = scope.uniforms.get(&buf.id) {
                if !scope.uniform_buffers.contains_key(&buf.id) {
                    let buffer = self.recycler.take(device, buf.name, buf.size, UNIFORM);
                    queue.write_buffer(&buffer, 0, data);
                    scope.uniform_buffers.insert(buf.id, buffer);
                }
            } else {
                self.residents
                    .ensure_device(buf, device, queue, encoder, &mut self.recycler);
            }
        }
        let indirect = match dispatch.size {
            DispatchSize::Indirect { buf, offset } => {
                self.residents
                    .ensure_device(&buf, device, queue, encoder, &mut self.recycler);
                Some((self.residents.device(&buf, kernel.label)?, offset))
            }
            DispatchSize::Workgroups(..) => None,
        };

        let entries = dispatch
            .bindings
            .iter()
            .zip(0..)
            .map(|(resource, binding)| {
                let resource = match resource {
                    ResourceProxy::Buffer(buf) => {
                        let buffer = match scope.uniform_buffers.get(&buf.id) {
                            Some(buffer) => buffer,
                            None => self.residents.device(buf, kernel.label)?,
                        };
                        wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                            buffer,
                            offset: 0,
                            size: NonZeroU64::new(buf.size),
                        })
                    }
                    ResourceProxy::Image(image) => wgpu::BindingResource::TextureView(
                        scope
                            .images
                            .get(&image.id)
                            .copied()
                            .ok_or(Error::MissingImage(kernel.label))?,
                    ),
                };
                Ok(wgpu::BindGroupEntry { binding, resource })
            })
            .collect::<Result<Vec<_>>>()?;
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(kernel.label),
            layout: &pipeline.layout,
            entries: &entries,
        });
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(kernel.label),
            timestamp_writes: None,
        });
        #[cfg(feature = "wgpu-profiler")]
        let query = timers
            .profiler
            .begin_query(kernel.label, &mut pass)
            .with_parent(timers.scopes.last());
        pass.set_pipeline(&pipeline.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        match (dispatch.size, indirect) {
            (_, Some((buffer, offset))) => pass.dispatch_workgroups_indirect(buffer, offset),
            (DispatchSize::Workgroups(x, y, z), None) => pass.dispatch_workgroups(x, y, z),
            (DispatchSize::Indirect { .. }, None) => unreachable!("indirect buffer resolved above"),
        }
        #[cfg(feature = "wgpu-profiler")]
        timers.profiler.end_query(&mut pass, query);
        Ok(())
    }

    fn zero(&mut self, encoder: &mut CommandEncoder, buf: &BufferProxy) {
        match self.residents.buffers.get(&buf.id) {
            Some(Storage::Device(buffer)) => encoder.clear_buffer(buffer, 0, None),
            Some(Storage::Host(bytes)) => bytes.borrow_mut().fill(0),
            None => {
                self.residents.zeroed.insert(buf.id);
            }
        }
    }

    fn copy(
        &mut self,
        device: &Device,
        encoder: &mut CommandEncoder,
        src: &BufferProxy,
        dst: &BufferProxy,
    ) -> Result<()> {
        let size = src.size.min(dst.size);
        match self.residents.buffers.get(&src.id) {
            Some(Storage::Host(_)) => {
                self.residents.ensure_host(dst, "copy")?;
                let (Some(Storage::Host(from)), Some(Storage::Host(to))) = (
                    self.residents.buffers.get(&src.id),
                    self.residents.buffers.get(&dst.id),
                ) else {
                    return Err(Error::UnavailableBufferUsed(dst.name, "copy"));
                };
                let size = size as usize;
                to.borrow_mut()[..size].copy_from_slice(&from.borrow()[..size]);
            }
            Some(Storage::Device(_)) => {
                if !self.residents.buffers.contains_key(&dst.id) {
                    let buffer = self.recycler.take(device, dst.name, dst.size, STORAGE);
                    self.residents.zeroed.remove(&dst.id);
                    self.residents.buffers.insert(dst.id, Storage::Device(buffer));
                }
                let from = self.residents.device(src, "copy")?;
                let to = self.residents.device(dst, "copy")?;
                encoder.copy_buffer_to_buffer(from, 0, to, 0, size);
            }
            None => return Err(Error::UnavailableBufferUsed(src.name, "copy")),
        }
        Ok(())
    }

    fn download(
        &mut self,
        device: &Device,
        encoder: &mut CommandEncoder,
        buf: &BufferProxy,
    ) -> Result<()> {
        let download = match self.residents.buffers.get(&buf.id) {
            Some(Storage::Host(bytes)) => {
                Download::Host(bytes.borrow()[..buf.size as usize].to_vec())
            }
            Some(Storage::Device(buffer)) => {
                let readback = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("download"),
                    size: buf.size,
                    usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                encoder.copy_buffer_to_buffer(buffer, 0, &readback, 0, buf.size);
                Download::Device(readback)
            }
            None => return Err(Error::UnavailableBufferUsed(buf.name, "download")),
        };
        self.downloads.insert(buf.id, download);
        Ok(())
    }
}

impl Residents {
    fn device(&self, buf: &BufferProxy, user: &'static str) -> Result<&Buffer> {
        match self.buffers.get(&buf.id) {
            Some(Storage::Device(buffer)) => Ok(buffer),
            _ => Err(Error::UnavailableBufferUsed(buf.name, user)),
        }
    }

    /// Creates the buffer on the device, or moves it there from host memory.
    fn ensure_device(
        &mut self,
        buf: &BufferProxy,
        device: &Device,
        queue: &Queue,
        encoder: &mut CommandEncoder,
        recycler: &mut Recycler,
    ) {
        match self.buffers.get_mut(&buf.id) {
            Some(storage) => {
                if let Storage::Host(bytes) = storage {
                    let buffer = recycler.take(device, buf.name, buf.size, STORAGE);
                    queue.write_buffer(&buffer, 0, &bytes.borrow());
                    *storage = Storage::Device(buffer);
                }
            }
            None => {
                let buffer = recycler.take(device, buf.name, buf.size, STORAGE);
                if self.zeroed.remove(&buf.id) {
                    encoder.clear_buffer(&buffer, 0, None);
                }
                self.buffers.insert(buf.id, Storage::Device(buffer));
            }
        }
    }

    /// Creates the buffer in host memory, zeroed.
    fn ensure_host(&mut self, buf: &BufferProxy, user: &'static str) -> Result<()> {
        match self.buffers.get(&buf.id) {
            Some(Storage::Host(_)) => Ok(()),
            Some(Storage::Device(_)) => Err(Error::UnavailableBufferUsed(buf.name, user)),
            None => {
                self.zeroed.remove(&buf.id);
                let bytes = RefCell::new(vec![0; buf.size as usize]);
                self.buffers.insert(buf.id, Storage::Host(bytes));
                Ok(())
            }
        }
    }

    /// Reads the `u32` at byte `offset` of a host buffer.
    fn host_word(&self, buf: &BufferProxy, offset: u64) -> Result<u32> {
        let Some(Storage::Host(bytes)) = self.buffers.get(&buf.id) else {
            return Err(Error::UnavailableBufferUsed(buf.name, "indirect dispatch"));
        };
        let start = offset as usize;
        let bytes = bytes.borrow();
        let word = bytes
            .get(start..start + 4)
            .ok_or(Error::UnavailableBufferUsed(buf.name, "indirect dispatch"))?;
        Ok(bytemuck::pod_read_unaligned(word))
    }

    fn host_bindings<'a>(
        &'a mut self,
        uniforms: &HashMap<ResourceId, &'a [u8]>,
        bindings: &[ResourceProxy],
        user: &'static str,
    ) -> Result<Vec<CpuBinding<'a>>> {
        for resource in bindings {
            match resource {
                ResourceProxy::Buffer(buf) if !uniforms.contains_key(&buf.id) => {
                    self.ensure_host(buf, user)?;
                }
                ResourceProxy::Buffer(_) => {}
                ResourceProxy::Image(_) => return Err(Error::MissingImage(user)),
            }
        }
        let residents: &'a Self = self;
        bindings
            .iter()
            .map(|resource| match resource {
                ResourceProxy::Buffer(buf) => {
                    if let Some(&data) = uniforms.get(&buf.id) {
                        return Ok(CpuBinding::Buffer(data));
                    }
                    match residents.buffers.get(&buf.id) {
                        Some(Storage::Host(bytes)) => Ok(CpuBinding::BufferRW(bytes)),
                        _ => Err(Error::UnavailableBufferUsed(buf.name, user)),
                    }
                }
                ResourceProxy::Image(_) => Err(Error::MissingImage(user)),
            })
            .collect()
    }
}

impl Recycler {
    fn take(
        &mut self,
        device: &Device,
        name: &'static str,
        size: u64,
        usage: BufferUsages,
    ) -> Buffer {
        let size = bucket_size(size);
        if let Some(buffer) = self.free.get_mut(&(size, usage)).and_then(Vec::pop) {
            return buffer;
        }
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(name),
            size,
            usage,
            mapped_at_creation: false,
        })
    }

    fn give(&mut self, buffer: Buffer) {
        self.free
            .entry((buffer.size(), buffer.usage()))
            .or_default()
            .push(buffer);
    }
}

/// Rounds up to the next power of two or three quarters of one, so that buffers
/// of similar size share a bucket.
fn bucket_size(size: u64) -> u64 {
    let size = size.max(MIN_BUFFER_SIZE);
    let power = size.next_power_of_two();
    let three_quarters = power / 4 * 3;
    if size <= three_quarters {
        three_quarters
    } else {
        power
    }
}

fn layout_entries(layout: &[BindType]) -> Vec<BindGroupLayoutEntry> {
    let buffer = |ty| wgpu::BindingType::Buffer {
        ty,
        has_dynamic_offset: false,
        min_binding_size: None,
    };
    layout
        .iter()
        .zip(0..)
        .map(|(bind_type, binding)| BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: match bind_type {
                BindType::Uniform => buffer(wgpu::BufferBindingType::Uniform),
                BindType::ReadOnly => buffer(wgpu::BufferBindingType::Storage { read_only: true }),
                BindType::Storage => buffer(wgpu::BufferBindingType::Storage { read_only: false }),
                BindType::Target => wgpu::BindingType::StorageTexture {
                    access: wgpu::StorageTextureAccess::WriteOnly,
                    format: wgpu::TextureFormat::Rgba8Unorm,
                    view_dimension: wgpu::TextureViewDimension::D2,
                },
            },
            count: None,
        })
        .collect()
}

impl Pipeline {
    fn new(
        device: &Device,
        label: &str,
        wgsl: Cow<'_, str>,
        entries: &[BindGroupLayoutEntry],
        cache: Option<&PipelineCache>,
    ) -> Self {
        // SAFETY: Only called with the shaders of `lineopt_shaders`, which never index
        // out of bounds and always terminate.
        let module = unsafe {
            device.create_shader_module_trusted(
                wgpu::ShaderModuleDescriptor {
                    label: Some(label),
                    source: wgpu::ShaderSource::Wgsl(wgsl),
                },
                wgpu::ShaderRuntimeChecks::unchecked(),
            )
        };
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries,
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: None,
            compilation_options: wgpu::PipelineCompilationOptions {
                zero_initialize_workgroup_memory: false,
                ..Default::default()
            },
            cache,
        });
        Self { pipeline, layout }
    }
}
