// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT OR Unlicense

use lineopt_encoding::FillUniform;

use super::CpuBinding;

pub fn fill_main(params: &FillUniform, data: &mut [u32]) {
    let len = (params.len as usize).min(data.len());
    data[..len].fill(params.value);
}

pub fn fill(_n_wg: u32, resources: &[CpuBinding<'_>]) {
    let params = resources[0].uniform();
    let mut data = resources[1].slice_mut();
    fill_main(&params, &mut data);
}
