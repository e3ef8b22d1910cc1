// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Preprocessing and reflection of the WGSL sources under `shader/`.

use naga::{
    AddressSpace, GlobalVariable, ImageClass, Module, StorageAccess, TypeInner, WithSpan,
    front::wgsl,
    valid::{Capabilities, ModuleInfo, ValidationError, ValidationFlags},
};

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

pub mod permutations;
pub mod preprocess;

use crate::types::{BindType, BindingInfo};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("parse error: {0}")]
    Parse(#[from] wgsl::ParseError),
    #[error("validation error: {0}")]
    Validate(#[from] WithSpan<ValidationError>),
    #[error("entry point `main` not found")]
    EntryPointNotFound,
    #[error("binding `{0}` is neither a buffer nor a write-only storage texture")]
    UnsupportedBinding(String),
    #[error("failed to read shader sources: {0}")]
    Io(#[from] std::io::Error),
    #[error("in shader `{name}`: {source}")]
    Shader { name: String, source: Box<Error> },
}

#[derive(Debug)]
pub struct ShaderInfo {
    pub source: String,
    pub module: Module,
    pub module_info: ModuleInfo,
    pub workgroup_size: [u32; 3],
    pub bindings: Vec<BindingInfo>,
}

fn classify(module: &Module, var: &GlobalVariable) -> Result<BindType, Error> {
    let writes = |access: StorageAccess| access.contains(StorageAccess::STORE);
    match (&module.types[var.ty].inner, var.space) {
        (
            TypeInner::Image {
                class: ImageClass::Storage { access, .. },
                ..
            },
            _,
        ) if writes(*access) => Ok(BindType::Target),
        (TypeInner::Image { .. }, _) => Err(Error::UnsupportedBinding(
            var.name.clone().unwrap_or_default(),
        )),
        (_, AddressSpace::Uniform) => Ok(BindType::Uniform),
        (_, AddressSpace::Storage { access }) if writes(access) => Ok(BindType::Storage),
        _ => Ok(BindType::ReadOnly),
    }
}

/// Directory holding the shader sources of this crate.
pub fn shader_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("shader")
}

impl ShaderInfo {
    pub fn new(source: String, entry_point: &str) -> Result<Self, Error> {
        let module = wgsl::parse_str(&source)?;
        let module_info = naga::valid::Validator::new(
            ValidationFlags::all() & !ValidationFlags::CONTROL_FLOW_UNIFORMITY,
            Capabilities::all(),
        )
        .validate(&module)?;
        let (entry_index, entry) = module
            .entry_points
            .iter()
            .enumerate()
            .find(|(_, entry)| entry.name.as_str() == entry_point)
            .ok_or(Error::EntryPointNotFound)?;
        let entry_info = module_info.get_entry_point(entry_index);
        let mut bindings = module
            .global_variables
            .iter()
            .filter(|(handle, _)| !entry_info[*handle].is_empty())
            .filter_map(|(_, var)| Some((var, var.binding.as_ref()?)))
            .map(|(var, binding)| {
                Ok(BindingInfo {
                    name: var.name.clone(),
                    group: binding.group,
                    binding: binding.binding,
                    ty: classify(&module, var)?,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;
        bindings.sort_by_key(|b| (b.group, b.binding));
        let workgroup_size = entry.workgroup_size;
        Ok(Self {
            source,
            module,
            module_info,
            workgroup_size,
            bindings,
        })
    }

    /// Preprocesses and reflects every shader in [`shader_dir`].
    pub fn from_default() -> Result<HashMap<String, Self>, Error> {
        Self::from_dir(shader_dir())
    }

    /// Preprocesses and reflects every `*.wgsl` file in `shader_dir`.
    ///
    /// Files listed in `shader_dir/permutations` produce one shader per
    /// permutation, all others one shader named after the file.
    pub fn from_dir(shader_dir: impl AsRef<Path>) -> Result<HashMap<String, Self>, Error> {
        let shader_dir = shader_dir.as_ref();
        let permutation_map = match std::fs::read_to_string(shader_dir.join("permutations")) {
            Ok(source) => permutations::parse(&source),
            Err(_) => HashMap::default(),
        };
        let imports = preprocess::get_imports(shader_dir)?;
        let mut info = HashMap::default();
        for entry in shader_dir.read_dir()? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(shader_name) = file_name.to_str().and_then(|n| n.strip_suffix(".wgsl")) else {
                continue;
            };
            let contents = std::fs::read_to_string(entry.path())?;
            let variants = match permutation_map.get(shader_name) {
                Some(permutations) => permutations
                    .iter()
                    .map(|p| (p.name.clone(), p.defines.iter().cloned().collect()))
                    .collect(),
                None => vec![(shader_name.to_string(), HashSet::new())],
            };
            for (name, defines) in variants {
                let source = preprocess::preprocess(&contents, &name, &defines, &imports);
                let shader_info = Self::new(source, "main").map_err(|e| Error::Shader {
                    name: name.clone(),
                    source: Box::new(e),
                })?;
                info.insert(name, shader_info);
            }
        }
        Ok(info)
    }
}
