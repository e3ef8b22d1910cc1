// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sets `skip_gpu_tests` when `LINEOPT_CI_GPU_SUPPORT` says no GPU is available.

const GPU_SUPPORT: &str = "LINEOPT_CI_GPU_SUPPORT";

fn main() {
    println!("cargo:rerun-if-env-changed={GPU_SUPPORT}");
    println!("cargo:rustc-check-cfg=cfg(skip_gpu_tests)");
    let Ok(value) = std::env::var(GPU_SUPPORT) else {
        return;
    };
    match value.to_ascii_lowercase().as_str() {
        "no" | "n" => println!("cargo:rustc-cfg=skip_gpu_tests"),
        "yes" | "y" => {}
        other => println!("cargo:warning={GPU_SUPPORT}={other:?}, expected yes/y or no/n"),
    }
}
