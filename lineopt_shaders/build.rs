// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Generates the `SHADERS` table from the WGSL sources.

// These modules are also included in the main crate, where the items are reachable
#[allow(warnings, reason = "Checked elsewhere")]
#[path = "src/compile/mod.rs"]
mod compile;
#[allow(warnings, reason = "Checked elsewhere")]
#[path = "src/types.rs"]
mod types;

use std::fmt::{self, Write};
use std::path::PathBuf;

use compile::ShaderInfo;

fn main() {
    println!("cargo:rerun-if-changed={}", compile::shader_dir().display());
    let shaders = match ShaderInfo::from_default() {
        Ok(shaders) => shaders,
        Err(err) => {
            for line in err.to_string().lines() {
                println!("cargo:warning={line}");
            }
            panic!("shader compilation failed");
        }
    };
    // Sorted, so the generated file does not depend on hash order.
    let mut shaders: Vec<_> = shaders.into_iter().collect();
    shaders.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));

    let mut table = String::new();
    generate(&mut table, &shaders).expect("writing to a String cannot fail");
    let out_dir = PathBuf::from(std::env::var_os("OUT_DIR").expect("set by cargo"));
    std::fs::write(out_dir.join("shaders.rs"), table).expect("OUT_DIR is writable");
}

fn generate(out: &mut String, shaders: &[(String, ShaderInfo)]) -> fmt::Result {
    writeln!(out, "pub struct Shaders<'a> {{")?;
    for (name, _) in shaders {
        writeln!(out, "    pub {name}: ComputeShader<'a>,")?;
    }
    writeln!(out, "}}\n")?;

    writeln!(out, "mod generated {{")?;
    writeln!(out, "    use super::*;\n")?;
    writeln!(out, "    pub const SHADERS: Shaders<'static> = Shaders {{")?;
    for (name, info) in shaders {
        let bindings = info
            .bindings
            .iter()
            .map(|b| format!("BindType::{:?}", b.ty))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(out, "        {name}: ComputeShader {{")?;
        writeln!(out, "            name: Cow::Borrowed({name:?}),")?;
        writeln!(out, "            workgroup_size: {:?},", info.workgroup_size)?;
        writeln!(out, "            bindings: Cow::Borrowed(&[{bindings}]),")?;
        if cfg!(feature = "wgsl") {
            let indices: Vec<u8> = info.bindings.iter().map(|b| b.binding as u8).collect();
            writeln!(out, "            wgsl: WgslSource {{")?;
            writeln!(out, "                code: Cow::Borrowed({:?}),", info.source)?;
            writeln!(out, "                binding_indices: Cow::Borrowed(&{indices:?}),")?;
            writeln!(out, "            }},")?;
        }
        writeln!(out, "        }},")?;
    }
    writeln!(out, "    }};")?;
    writeln!(out, "}}")
}
