// This module assembles the per-surface output units. It takes the rendered dispatch
// functions of one surface, in name order, and produces a definition unit (fixed includes,
// the functions, then one registration function attaching every public name) and the
// matching declaration unit. Public names follow the host conventions: a trailing `_`
// becomes `!`, an `is_` prefix becomes a trailing `?`, names that collide with the host
// layer's own methods get a leading `_`, and linear-algebra names lose their `linalg_`
// prefix. No dispatch decisions are made here. Writing goes through a UnitSink and only
// happens once every surface has been generated.

//! Surface unit assembly.

use crate::core::{GenResult, GeneratorConfig, UnitSink};
use crate::filter::Surface;

const GENERATED_BANNER: &str = "// generated by funcgen\n// do not edit by hand\n";

/// Public names reserved by the host binding layer.
const RESERVED_NAMES: [&str; 4] = ["size", "stride", "random!", "stft"];

const INCLUDES: &str = "#include <torch/torch.h>
#include <rice/rice.hpp>

#include \"ruby_arg_parser.h\"
#include \"templates.h\"
#include \"wrap_outputs.h\"
";

/// Cast required by hosts older than Ruby 2.7.
const LEGACY_METHOD_CAST: &str = "(VALUE (*)(...)) ";

/// One dispatch function ready for assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMethod {
    /// Base name of the bound function.
    pub name: String,
    /// C symbol of the dispatch function.
    pub symbol: String,
    pub code: String,
}

/// The two units generated for one surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSurface {
    pub surface: Surface,
    pub header: String,
    pub body: String,
}

impl GeneratedSurface {
    pub fn header_name(&self) -> String {
        format!("{}_functions.h", self.surface.name())
    }

    pub fn body_name(&self) -> String {
        format!("{}_functions.cpp", self.surface.name())
    }
}

/// Public name under which `name` is bound on `surface`.
pub fn ruby_name(name: &str, surface: Surface) -> String {
    let mut ruby = if let Some(stem) = name.strip_suffix('_') {
        format!("{}!", stem)
    } else if let Some(predicate) = name.strip_prefix("is_") {
        format!("{}?", predicate)
    } else {
        name.to_string()
    };

    if RESERVED_NAMES.contains(&ruby.as_str()) {
        ruby.insert(0, '_');
    }
    if surface == Surface::Linalg {
        if let Some(stripped) = ruby.strip_prefix("linalg_") {
            ruby = stripped.to_string();
        }
    }
    ruby
}

/// Registration call attaching `method` to the module `m`.
pub fn registration_line(method: &RenderedMethod, surface: Surface, config: &GeneratorConfig) -> String {
    let cast = if config.legacy_method_cast { LEGACY_METHOD_CAST } else { "" };
    format!(
        "rb_{}(m, \"{}\", {}{}, -1);",
        surface.define_method(),
        ruby_name(&method.name, surface),
        cast,
        method.symbol
    )
}

pub fn emit_header(surface: Surface, config: &GeneratorConfig) -> String {
    format!(
        "{}\n#pragma once\n\nvoid {}(Rice::Module& m);\n",
        GENERATED_BANNER,
        config.registration_fn(surface)
    )
}

pub fn emit_body(surface: Surface, methods: &[RenderedMethod], config: &GeneratorConfig) -> String {
    let mut body = format!("{}\n{}\n", GENERATED_BANNER, INCLUDES);
    for method in methods {
        body.push_str(&method.code);
        body.push('\n');
    }

    body.push_str(&format!("void {}(Rice::Module& m) {{\n", config.registration_fn(surface)));
    for method in methods {
        body.push_str("  ");
        body.push_str(&registration_line(method, surface, config));
        body.push('\n');
    }
    body.push_str("}\n");
    body
}

/// Assemble both units of `surface`.
pub fn emit_surface(surface: Surface, methods: &[RenderedMethod], config: &GeneratorConfig) -> GeneratedSurface {
    GeneratedSurface {
        surface,
        header: emit_header(surface, config),
        body: emit_body(surface, methods, config),
    }
}

/// Hand every unit to `sink`, header first.
pub fn write_surfaces(surfaces: &[GeneratedSurface], sink: &mut dyn UnitSink) -> GenResult<()> {
    for surface in surfaces {
        sink.write_unit(&surface.header_name(), &surface.header)?;
        sink.write_unit(&surface.body_name(), &surface.body)?;
        log::info!("Wrote {} and {}", surface.header_name(), surface.body_name());
    }
    Ok(())
}
