// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The generated shader table holds valid WGSL with consistent binding metadata.

use lineopt_shaders::{BindType, ComputeShader, SHADERS};
use naga::valid::{Capabilities, ValidationFlags, Validator};

fn all_shaders() -> Vec<&'static ComputeShader<'static>> {
    vec![
        &SHADERS.build_lists,
        &SHADERS.build_lists_low,
        &SHADERS.cdf,
        &SHADERS.composite,
        &SHADERS.exponential_damping,
        &SHADERS.fade_alpha,
        &SHADERS.fill,
        &SHADERS.histogram,
        &SHADERS.histogram_setup,
        &SHADERS.min_gather,
        &SHADERS.normalize_scalars,
        &SHADERS.smooth_alpha,
        &SHADERS.sort_lists,
        &SHADERS.sort_lists_low,
        &SHADERS.write_target,
    ]
}

#[test]
fn every_module_validates() {
    for shader in all_shaders() {
        let module = naga::front::wgsl::parse_str(&shader.wgsl.code).unwrap_or_else(|e| {
            panic!("{}: {}", shader.name, e.emit_to_string(&shader.wgsl.code))
        });
        Validator::new(
            ValidationFlags::all() & !ValidationFlags::CONTROL_FLOW_UNIFORMITY,
            Capabilities::all(),
        )
            .validate(&module)
            .unwrap_or_else(|e| panic!("{}: {e:?}", shader.name));
        assert_eq!(shader.bindings.len(), shader.wgsl.binding_indices.len());
    }
}

#[test]
fn workgroup_sizes() {
    assert_eq!(SHADERS.sort_lists.workgroup_size, [16, 16, 1]);
    assert_eq!(SHADERS.composite.workgroup_size, [16, 16, 1]);
    assert_eq!(SHADERS.build_lists.workgroup_size, [256, 1, 1]);
    assert_eq!(SHADERS.cdf.workgroup_size, [1, 1, 1]);
}

#[test]
fn variants_differ_in_bindings() {
    use BindType::*;
    assert_eq!(
        &*SHADERS.build_lists_low.bindings,
        &[Uniform, ReadOnly, Storage, Storage, Storage]
    );
    assert_eq!(
        &*SHADERS.build_lists.bindings,
        &[Uniform, ReadOnly, Storage, Storage, Storage, ReadOnly]
    );
    assert_eq!(&*SHADERS.write_target.bindings, &[Uniform, ReadOnly, Target]);
}
