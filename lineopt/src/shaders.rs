// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Load the compute shaders of the frame pipeline.

#[cfg(feature = "wgpu")]
use wgpu::Device;

use crate::recording::ShaderId;

#[cfg(feature = "wgpu")]
use crate::wgpu_engine::WgpuEngine;

/// Shaders for the full pipeline.
///
/// The list builders and sorters exist in a low resolution and a full resolution
/// variant, compiled from the same source.
pub struct FullShaders {
    pub fill: ShaderId,
    pub build_lists_low: ShaderId,
    pub sort_lists_low: ShaderId,
    pub min_gather: ShaderId,
    pub smooth_alpha: ShaderId,
    pub fade_alpha: ShaderId,
    pub build_lists: ShaderId,
    pub sort_lists: ShaderId,
    pub histogram_setup: ShaderId,
    pub histogram: ShaderId,
    pub cdf: ShaderId,
    pub exponential_damping: ShaderId,
    pub composite: ShaderId,
    pub normalize_scalars: ShaderId,
    pub write_target: ShaderId,
}

#[cfg(feature = "wgpu")]
pub(crate) fn full_shaders(device: &Device, engine: &mut WgpuEngine) -> FullShaders {
    use crate::wgpu_engine::HostStage;

    let shaders = &lineopt_shaders::SHADERS;

    macro_rules! add_shader {
        ($name:ident, $host:expr) => {{
            let shader = &shaders.$name;
            engine.add_compute_shader(
                device,
                concat!("lineopt.", stringify!($name)),
                shader.wgsl.code.clone(),
                &shader.bindings,
                $host,
            )
        }};
        ($name:ident) => {
            add_shader!($name, Some(lineopt_shaders::cpu::$name as HostStage))
        };
    }

    FullShaders {
        fill: add_shader!(fill),
        build_lists_low: add_shader!(build_lists_low),
        sort_lists_low: add_shader!(sort_lists_low),
        min_gather: add_shader!(min_gather),
        smooth_alpha: add_shader!(smooth_alpha),
        fade_alpha: add_shader!(fade_alpha),
        build_lists: add_shader!(build_lists),
        sort_lists: add_shader!(sort_lists),
        histogram_setup: add_shader!(histogram_setup),
        histogram: add_shader!(histogram),
        cdf: add_shader!(cdf),
        exponential_damping: add_shader!(exponential_damping),
        composite: add_shader!(composite),
        normalize_scalars: add_shader!(normalize_scalars),
        // Writing the storage texture always happens on the GPU.
        write_target: add_shader!(write_target, None),
    }
}
