// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::collections::HashMap;

/// A named variant of a shader source compiled with extra defines.
#[derive(Debug)]
pub struct Permutation {
    pub name: String,
    pub defines: Vec<String>,
}

/// Parses a permutations file.
///
/// A line naming a source file is followed by one `+ name: define define`
/// line per variant. Blank lines and lines starting with `#` are ignored.
pub fn parse(source: &str) -> HashMap<String, Vec<Permutation>> {
    let mut map: HashMap<String, Vec<Permutation>> = HashMap::default();
    let mut current: Option<&str> = None;
    for line in source.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(variant) = line.strip_prefix('+') else {
            current = Some(line);
            continue;
        };
        let Some(source_name) = current else {
            continue;
        };
        let (name, defines) = variant.split_once(':').unwrap_or((variant, ""));
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        map.entry(source_name.to_string())
            .or_default()
            .push(Permutation {
                name: name.to_string(),
                defines: defines.split_whitespace().map(str::to_string).collect(),
            });
    }
    map
}
