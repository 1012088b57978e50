// This module renders the textual overload signatures consumed by the runtime argument
// parser, e.g. `add(Tensor input, Tensor other, *, Scalar alpha=1, Tensor out=None)`. The
// same renderer produces the grouping key used by the overload grouper (out parameters
// elided), so equivalent plain and out overloads merge exactly when their signatures agree
// character for character. Rendering drops `self` on the method surface, renames it to
// `input` elsewhere, folds multiple tensor outputs into one `TensorList[N] out` keyword,
// and spells defaults the way the parser expects them.

//! Argument parser signature rendering.

use crate::core::GenResult;
use crate::descriptor::{Function, Param};
use crate::filter::Surface;
use crate::types::TypeKind;

/// Whether out parameters are kept or elided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutParams {
    Keep,
    Elide,
}

/// A rendered signature and the number of parser slots it declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub text: String,
    pub arity: usize,
}

/// Parameters in parser order: positional ones, then keyword-only ones.
///
/// Out parameters are elided or collapsed per `out`, and `self` is dropped
/// on method surfaces. Each returned parameter carries its parser slot.
pub fn signature_params(function: &Function, surface: Surface, out: OutParams) -> Vec<Param> {
    let mut params = function.params.clone();
    if let Some(range) = function.out_range() {
        match out {
            OutParams::Elide => {
                params.drain(range);
            }
            OutParams::Keep if function.collapses_out() => {
                let size = range.len();
                let start = range.start;
                params.drain(range);
                params.insert(start, collapsed_out_param(size));
            }
            OutParams::Keep => {}
        }
    }

    let (keyword_only, positional): (Vec<Param>, Vec<Param>) = params
        .into_iter()
        .filter(|p| !(surface.is_method() && p.name == "self"))
        .partition(|p| p.keyword_only);
    positional
        .into_iter()
        .chain(keyword_only)
        .enumerate()
        .map(|(slot, mut param)| {
            param.position = Some(slot);
            param
        })
        .collect()
}

fn collapsed_out_param(size: usize) -> Param {
    Param {
        name: "out".to_string(),
        ty: format!("Tensor[{}]", size),
        optional: false,
        default: None,
        modifier: None,
        keyword_only: true,
        list_size: Some(size),
        position: None,
    }
}

pub fn generate_signature(function: &Function, surface: Surface, out: OutParams) -> GenResult<Signature> {
    let params = signature_params(function, surface, out);
    let mut parts = Vec::with_capacity(params.len() + 1);
    let mut in_keyword_only = false;

    for param in &params {
        if param.keyword_only && !in_keyword_only {
            parts.push("*".to_string());
            in_keyword_only = true;
        }
        parts.push(signature_param(param, function)?);
    }

    Ok(Signature {
        text: format!("{}({})", function.base_name, parts.join(", ")),
        arity: params.len(),
    })
}

fn signature_param(param: &Param, function: &Function) -> GenResult<String> {
    let name = if param.name == "self" { "input" } else { param.name.as_str() };
    let mut sig = format!("{} {}", signature_type(param, function)?, name);

    match param.default.as_deref() {
        None if param.name == "out" => sig.push_str("=None"),
        None => {}
        Some("[]") => sig.push_str("=None"),
        Some("Mean") => sig.push_str("=at::Reduction::Mean"),
        Some(default) => {
            sig.push('=');
            sig.push_str(default);
        }
    }

    Ok(sig)
}

fn signature_type(param: &Param, function: &Function) -> GenResult<String> {
    let mut ty = TypeKind::of(param, function)?.signature_name().to_string();
    if let Some(size) = param.list_size {
        ty.push_str(&format!("[{}]", size));
    }
    if param.optional {
        ty.push('?');
    }
    Ok(ty)
}
