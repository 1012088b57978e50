// This module implements the descriptor model: the validated, strongly typed view of one
// operator record. Function::from_record parses the `func` signature string, splits the
// name into base name and overload discriminator, resolves the variant set, and computes
// the out-parameter index (first written parameter of a non-mutator function that returns
// something). It also applies the table-level conventions the rest of the pipeline relies
// on: tensor-option parameters are never optional, a requires_grad keyword is synthesised
// for full tensor-option clusters, and a handful of integer-producing factories default
// their dtype to int64. Types are kept as declarative strings here; mapping them onto the
// closed native vocabulary is the type mapper's job and fails there, naming the function.

//! Descriptor model.
//!
//! # Signature Format
//!
//! ```text
//! add.out(Tensor self, Tensor other, *, Scalar alpha=1, Tensor(a!) out) -> Tensor(a!)
//! ^^^ base name                                          ^^^^ written (out) parameter
//!     ^^^ overload discriminator     ^ keyword-only marker
//! ```

use std::ops::Range;

use crate::core::{DescriptorSource, GenError, GenResult, RawRecord};

pub mod parser;

pub use parser::{parse_signature, ParsedSignature, RawParam, RawRetval};

/// Parameter names folded into a tensor-options aggregate.
pub const TENSOR_OPTION_NAMES: [&str; 5] = ["dtype", "device", "layout", "requires_grad", "pin_memory"];

/// Options whose `?` marker is ignored; the aggregate always supplies them.
const NON_OPTIONAL_OPTION_NAMES: [&str; 4] = ["dtype", "device", "layout", "pin_memory"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    /// Declarative type, e.g. `Tensor`, `int[2]`, `Scalar[]`.
    pub ty: String,
    pub optional: bool,
    pub default: Option<String>,
    /// Alias annotation such as `a!`.
    pub modifier: Option<String>,
    pub keyword_only: bool,
    pub list_size: Option<usize>,
    /// Argument parser slot. Unset on a descriptor; assigned by
    /// [`signature_params`](crate::signature::signature_params) once the surface is known.
    pub position: Option<usize>,
}

impl Param {
    /// Marked writable by its alias annotation.
    pub fn is_written(&self) -> bool {
        self.modifier.as_deref().is_some_and(|m| m.contains('!'))
    }

    pub fn is_tensor_option(&self) -> bool {
        TENSOR_OPTION_NAMES.contains(&self.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retval {
    pub name: Option<String>,
    pub ty: String,
    pub modifier: Option<String>,
}

/// Call surfaces a descriptor declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Variants {
    pub function: bool,
    pub method: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    /// Full name including the overload discriminator, e.g. `add.out`.
    pub name: String,
    pub base_name: String,
    /// The raw `func` signature.
    pub func: String,
    pub params: Vec<Param>,
    pub retvals: Vec<Retval>,
    pub variants: Variants,
    pub python_module: Option<String>,
    pub out_index: Option<usize>,
}

impl Function {
    /// Build a function from record `index` of the table.
    pub fn from_record(index: usize, record: &RawRecord) -> GenResult<Self> {
        let func = record
            .func
            .as_deref()
            .ok_or_else(|| GenError::descriptor(format!("#{}", index), "func", "missing"))?;
        let record_id = || format!("#{} ({})", index, func);

        let parsed = parse_signature(func).map_err(|e| GenError::descriptor(record_id(), "func", e))?;
        let base_name = parsed
            .name
            .split('.')
            .next()
            .unwrap_or_default()
            .to_string();

        let variants = match &record.variants {
            None => Variants {
                function: true,
                method: false,
            },
            Some(raw) => {
                let mut variants = Variants::default();
                for name in raw.names() {
                    match name {
                        "function" => variants.function = true,
                        "method" => variants.method = true,
                        other => {
                            return Err(GenError::descriptor(
                                record_id(),
                                "variants",
                                format!("unknown variant '{}'", other),
                            ))
                        }
                    }
                }
                variants
            }
        };

        if let Some(module) = &record.python_module {
            if module.trim().is_empty() {
                return Err(GenError::descriptor(record_id(), "python_module", "empty module tag"));
            }
        }

        let params = build_params(&base_name, parsed.params);
        let retvals: Vec<Retval> = parsed
            .retvals
            .into_iter()
            .map(|r| Retval {
                name: r.name,
                ty: r.ty,
                modifier: r.modifier,
            })
            .collect();

        let out_index = if base_name.ends_with('_') || retvals.is_empty() {
            None
        } else {
            params.iter().position(Param::is_written)
        };

        Ok(Function {
            name: parsed.name,
            base_name,
            func: func.to_string(),
            params,
            retvals,
            variants,
            python_module: record.python_module.clone(),
            out_index,
        })
    }

    pub fn is_out(&self) -> bool {
        self.out_index.is_some()
    }

    /// Parameters receiving the results of an out variant, one per return value.
    pub fn out_range(&self) -> Option<Range<usize>> {
        let start = self.out_index?;
        let end = (start + self.retvals.len()).min(self.params.len());
        Some(start..end)
    }

    pub fn out_params(&self) -> &[Param] {
        match self.out_range() {
            Some(range) => &self.params[range],
            None => &[],
        }
    }

    /// Whether the out parameters fold into one `Tensor[N] out` keyword.
    pub fn collapses_out(&self) -> bool {
        self.is_out()
            && self.retvals.len() > 1
            && self.out_params().iter().all(|p| p.ty == "Tensor")
            && self.retvals.iter().all(|r| r.ty == "Tensor")
    }
}

fn build_params(base_name: &str, raw: Vec<RawParam>) -> Vec<Param> {
    let mut params: Vec<Param> = raw
        .into_iter()
        .map(|p| {
            let optional = p.optional && !NON_OPTIONAL_OPTION_NAMES.contains(&p.name.as_str());
            let default = if p.name == "dtype" && has_int64_dtype_default(base_name) {
                Some("torch.int64".to_string())
            } else {
                p.default
            };
            Param {
                name: p.name,
                ty: p.ty,
                optional,
                default,
                modifier: p.modifier,
                keyword_only: p.keyword_only,
                list_size: p.list_size,
                position: None,
            }
        })
        .collect();

    let cluster = params
        .iter()
        .filter(|p| NON_OPTIONAL_OPTION_NAMES.contains(&p.name.as_str()))
        .count();
    if cluster == NON_OPTIONAL_OPTION_NAMES.len() && !params.iter().any(|p| p.name == "requires_grad") {
        params.push(Param {
            name: "requires_grad".to_string(),
            ty: "bool".to_string(),
            optional: false,
            default: Some("False".to_string()),
            modifier: None,
            keyword_only: true,
            list_size: None,
            position: None,
        });
    }

    params
}

fn has_int64_dtype_default(base_name: &str) -> bool {
    base_name.starts_with("randperm") || base_name == "tril_indices" || base_name == "triu_indices"
}

/// Load every record of `source`, ordered by full name.
pub fn load_functions(source: &dyn DescriptorSource) -> GenResult<Vec<Function>> {
    let records = source.records()?;
    let mut functions = records
        .iter()
        .enumerate()
        .map(|(index, record)| Function::from_record(index, record))
        .collect::<GenResult<Vec<_>>>()?;

    functions.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.func.cmp(&b.func)));
    log::info!("Loaded {} descriptors", functions.len());
    Ok(functions)
}
