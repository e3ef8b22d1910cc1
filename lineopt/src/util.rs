// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Helpers for rendering without a window: device setup, render targets and readback.

use std::future::Future;

use wgpu::{Adapter, Device, Instance, Queue, Texture, TextureView};

use crate::{Error, Result};

/// Owns the wgpu instance and lazily requests a single device from it.
pub struct RenderContext {
    pub instance: Instance,
    device: Option<DeviceHandle>,
}

pub struct DeviceHandle {
    pub adapter: Adapter,
    pub device: Device,
    pub queue: Queue,
}

impl RenderContext {
    /// Creates an instance configured by the `WGPU_*` environment variables.
    #[expect(
        clippy::new_without_default,
        reason = "Creating a wgpu Instance is something which should only be done rarely"
    )]
    pub fn new() -> Self {
        let instance = Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::from_env().unwrap_or_default(),
            flags: wgpu::InstanceFlags::from_build_config().with_env(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::from_env_or_default(),
        });
        Self {
            instance,
            device: None,
        }
    }

    /// The device, requested on first use.
    pub async fn device(&mut self) -> Result<&DeviceHandle> {
        if self.device.is_none() {
            self.device = Some(DeviceHandle::request(&self.instance).await?);
        }
        self.device.as_ref().ok_or(Error::NoCompatibleDevice)
    }
}

impl DeviceHandle {
    async fn request(instance: &Instance) -> Result<Self> {
        let adapter = wgpu::util::initialize_adapter_from_env_or_default(instance, None)
            .await
            .map_err(|_| Error::NoCompatibleDevice)?;
        let info = adapter.get_info();
        log::info!("Using {} ({:?})", info.name, info.backend);
        // Pipeline caches are used when available, nothing else is optional.
        let wanted = wgpu::Features::PIPELINE_CACHE;
        #[cfg(feature = "wgpu-profiler")]
        let wanted = wanted | wgpu_profiler::GpuProfiler::ALL_WGPU_TIMER_FEATURES;
        let features = adapter.features() & wanted;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("lineopt"),
                required_features: features,
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            })
            .await
            .map_err(|_| Error::NoCompatibleDevice)?;
        Ok(Self {
            adapter,
            device,
            queue,
        })
    }
}

/// An `Rgba8Unorm` texture the renderer can draw into and which can be read back.
pub struct RenderTarget {
    pub texture: Texture,
    pub view: TextureView,
}

impl RenderTarget {
    pub fn new(device: &Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("lineopt.target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&Default::default());
        Self { texture, view }
    }

    /// Copies the target into host memory as tightly packed RGBA8 rows.
    pub async fn read_rgba8(&self, device: &Device, queue: &Queue) -> Result<Vec<u8>> {
        let extent = self.texture.size();
        let row_bytes = extent.width * 4;
        let padded_row_bytes = row_bytes.next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lineopt.target_readback"),
            size: u64::from(padded_row_bytes) * u64::from(extent.height),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("lineopt.copy_target"),
        });
        encoder.copy_texture_to_buffer(
            self.texture.as_image_copy(),
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row_bytes),
                    rows_per_image: None,
                },
            },
            extent,
        );
        queue.submit([encoder.finish()]);

        let slice = readback.slice(..);
        let (sender, receiver) = futures_intrusive::channel::shared::oneshot_channel();
        slice.map_async(wgpu::MapMode::Read, move |v| sender.send(v).unwrap());
        receiver
            .receive()
            .await
            .ok_or(Error::DownloadError("target"))??;
        let mapped = slice.get_mapped_range();
        Ok(mapped
            .chunks_exact(padded_row_bytes as usize)
            .flat_map(|row| &row[..row_bytes as usize])
            .copied()
            .collect())
    }
}

struct NullWake;

impl std::task::Wake for NullWake {
    fn wake(self: std::sync::Arc<Self>) {}
}

/// Block on a future, polling the device as needed.
///
/// This will deadlock if the future is awaiting anything other than GPU progress.
#[cfg_attr(docsrs, doc(hidden))]
pub fn block_on_wgpu<F: Future>(device: &Device, fut: F) -> F::Output {
    if cfg!(target_arch = "wasm32") {
        panic!("Blocking can't work on WASM, so don't try");
    }
    let waker = std::task::Waker::from(std::sync::Arc::new(NullWake));
    let mut context = std::task::Context::from_waker(&waker);
    let mut fut = std::pin::pin!(fut);
    loop {
        if let std::task::Poll::Ready(item) = fut.as_mut().poll(&mut context) {
            return item;
        }
        device
            .poll(wgpu::PollType::wait_indefinitely())
            .expect("device lost while waiting for GPU work");
    }
}
