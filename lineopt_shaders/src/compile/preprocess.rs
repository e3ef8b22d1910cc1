// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A small line based preprocessor for WGSL.
//!
//! Supported directives, each on its own line:
//! `#import name` (pastes `shared/name.wgsl`), `#ifdef define`, `#ifndef define`,
//! `#else` and `#endif`.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

/// Reads every `shared/*.wgsl` file, keyed by file stem.
pub fn get_imports(shader_dir: &Path) -> std::io::Result<HashMap<String, String>> {
    let mut imports = HashMap::new();
    for entry in shader_dir.join("shared").read_dir()? {
        let path = entry?.path();
        if path.extension().is_none_or(|e| e != "wgsl") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            imports.insert(stem.to_owned(), fs::read_to_string(&path)?);
        }
    }
    Ok(imports)
}

struct Conditional {
    active: bool,
    else_seen: bool,
}

pub fn preprocess(
    input: &str,
    shader_name: &str,
    defines: &HashSet<String>,
    imports: &HashMap<String, String>,
) -> String {
    let mut output = String::with_capacity(input.len());
    let mut stack: Vec<Conditional> = vec![];
    for (line_number, line) in input.lines().enumerate() {
        let line_number = line_number + 1;
        let active = stack.iter().all(|c| c.active);
        let Some(directive) = line.trim_start().strip_prefix('#') else {
            if active {
                output.push_str(line);
                output.push('\n');
            }
            continue;
        };
        let (name, argument) = directive
            .split_once(char::is_whitespace)
            .unwrap_or((directive, ""));
        // Everything after a `//` is a comment.
        let argument = argument.split("//").next().unwrap_or("").trim();
        match name {
            "ifdef" | "ifndef" => {
                let defined = defines.contains(argument);
                stack.push(Conditional {
                    active: defined == (name == "ifdef"),
                    else_seen: false,
                });
            }
            "else" => match stack.last_mut() {
                Some(top) if !top.else_seen => {
                    top.else_seen = true;
                    top.active = !top.active;
                }
                Some(_) => log::warn!(
                    "Second #else for the same condition (line {line_number} of {shader_name}.wgsl)"
                ),
                None => log::warn!("Mismatched #else (line {line_number} of {shader_name}.wgsl)"),
            },
            "endif" => {
                if stack.pop().is_none() {
                    log::warn!("Mismatched #endif (line {line_number} of {shader_name}.wgsl)");
                }
            }
            "import" => {
                if !active {
                    continue;
                }
                match imports.get(argument) {
                    Some(import) => {
                        output.push_str(&preprocess(import, shader_name, defines, imports));
                    }
                    None => log::warn!(
                        "Unknown import `{argument}` (line {line_number} of {shader_name}.wgsl)"
                    ),
                }
            }
            other => log::warn!(
                "Unknown preprocessor directive `{other}` (line {line_number} of {shader_name}.wgsl)"
            ),
        }
    }
    if !stack.is_empty() {
        log::warn!("Unterminated #ifdef in {shader_name}.wgsl");
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conditionals_and_imports() {
        let imports = HashMap::from([("common".to_string(), "const A = 1u;\n".to_string())]);
        let source = "#import common\n\
                      #ifdef low_res\n\
                      const B = 2u;\n\
                      #else\n\
                      const B = 3u;\n\
                      #endif\n\
                      fn main() {}\n";
        let defines = HashSet::from(["low_res".to_string()]);
        let low = preprocess(source, "test", &defines, &imports);
        assert_eq!(low, "const A = 1u;\nconst B = 2u;\nfn main() {}\n");
        let full = preprocess(source, "test", &HashSet::new(), &imports);
        assert_eq!(full, "const A = 1u;\nconst B = 3u;\nfn main() {}\n");
    }
}
