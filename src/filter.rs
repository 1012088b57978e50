// This module implements the filter and partition stages. The filter drops descriptors the
// bindings never expose: private operators (leading underscore), autograd backward/forward
// helpers, a few names that are bound by hand in the extension, and anything whose raw
// signature needs a type feature the generated code cannot express yet. Partitioning then
// routes every surviving descriptor to its binding surfaces: python_module tags select the
// neural-net and linear-algebra namespaces, untagged descriptors go to the top-level
// namespace and/or the tensor method surface according to their declared variants. Tags
// outside the allow-list abort the run, because a new module means the surface table needs
// a deliberate update rather than a silent guess.

//! Filter and partition.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::core::{GenError, GenResult, GenerationSession};
use crate::descriptor::Function;

const EXCLUDED_PREFIX: &str = "_";
const LIFECYCLE_MARKERS: [&str; 2] = ["_backward", "_forward"];
/// Bound by hand in the extension, or not bindable yet.
const EXCLUDED_NAMES: [&str; 5] = ["to", "record_stream", "index", "index_put_", "index_put"];
const UNSUPPORTED_TOKENS: [&str; 2] = ["Dimname", "ConstQuantizerPtr"];

/// A generation target with its own registration unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Surface {
    /// Top-level `Torch` namespace.
    Torch,
    /// Per-instance tensor methods.
    Tensor,
    /// `Torch::NN` namespace.
    Nn,
    /// `Torch::Linalg` namespace.
    Linalg,
}

impl Surface {
    pub const ALL: [Surface; 4] = [Surface::Torch, Surface::Tensor, Surface::Nn, Surface::Linalg];

    pub fn name(self) -> &'static str {
        match self {
            Surface::Torch => "torch",
            Surface::Tensor => "tensor",
            Surface::Nn => "nn",
            Surface::Linalg => "linalg",
        }
    }

    /// Whether functions are bound as instance methods with `self` as receiver.
    pub fn is_method(self) -> bool {
        matches!(self, Surface::Tensor)
    }

    /// The Ruby C API used to attach generated functions.
    pub fn define_method(self) -> &'static str {
        if self.is_method() {
            "define_method"
        } else {
            "define_singleton_method"
        }
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Surface {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Surface::ALL
            .into_iter()
            .find(|surface| surface.name() == s)
            .ok_or_else(|| format!("unknown surface '{}' (expected torch, tensor, nn or linalg)", s))
    }
}

/// Recognised `python_module` tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleAffinity {
    Nn,
    Linalg,
    Fft,
    Special,
}

impl ModuleAffinity {
    /// Classify `function`'s tag, failing on tags outside the allow-list.
    pub fn classify(function: &Function) -> GenResult<Option<Self>> {
        let Some(module) = function.python_module.as_deref() else {
            return Ok(None);
        };
        let affinity = match module {
            "nn" => ModuleAffinity::Nn,
            "linalg" => ModuleAffinity::Linalg,
            "fft" => ModuleAffinity::Fft,
            "special" => ModuleAffinity::Special,
            other => {
                return Err(GenError::UnexpectedModule {
                    module: other.to_string(),
                    function: function.name.clone(),
                })
            }
        };
        Ok(Some(affinity))
    }

    /// Dedicated surface, or `None` for recognised modules that are not bound.
    pub fn surface(self) -> Option<Surface> {
        match self {
            ModuleAffinity::Nn => Some(Surface::Nn),
            ModuleAffinity::Linalg => Some(Surface::Linalg),
            ModuleAffinity::Fft | ModuleAffinity::Special => None,
        }
    }
}

/// Why `function` is out of scope, if it is.
pub fn exclusion_reason(function: &Function) -> Option<&'static str> {
    let name = function.base_name.as_str();
    if name.starts_with(EXCLUDED_PREFIX) {
        Some("private")
    } else if LIFECYCLE_MARKERS.iter().any(|marker| name.contains(marker)) {
        Some("autograd helper")
    } else if EXCLUDED_NAMES.contains(&name) {
        Some("bound by hand")
    } else if UNSUPPORTED_TOKENS.iter().any(|token| function.func.contains(token)) {
        Some("unsupported type")
    } else {
        None
    }
}

/// Drop descriptors outside the bindings' scope.
pub fn filter_functions(functions: Vec<Function>, session: &GenerationSession) -> Vec<Function> {
    functions
        .into_iter()
        .filter(|function| match exclusion_reason(function) {
            Some(reason) => {
                log::trace!("Skipping {}: {}", function.name, reason);
                session.record_filtered(reason);
                false
            }
            None => true,
        })
        .collect()
}

/// Route functions to surfaces. Input order is preserved within each surface.
pub fn partition<'f>(
    functions: &'f [Function],
    session: &GenerationSession,
) -> GenResult<BTreeMap<Surface, Vec<&'f Function>>> {
    let mut surfaces: BTreeMap<Surface, Vec<&'f Function>> = BTreeMap::new();

    for function in functions {
        let mut targets = Vec::with_capacity(2);
        match ModuleAffinity::classify(function)? {
            Some(affinity) => match affinity.surface() {
                Some(surface) => targets.push(surface),
                None => log::debug!("Not binding {} ({:?} module)", function.name, affinity),
            },
            None => {
                if function.variants.function {
                    targets.push(Surface::Torch);
                }
                if function.variants.method {
                    targets.push(Surface::Tensor);
                }
            }
        }

        for surface in targets {
            session.record_surface_function(surface);
            surfaces.entry(surface).or_default().push(function);
        }
    }

    Ok(surfaces)
}
