// This module builds the emission plan for one public name: every decision the generated
// dispatch function embodies, captured as data before any text is produced. For each
// descriptor it settles the typed lambda signature (self kept as the receiver on the method
// surface, tensor-option clusters replaced by one TensorOptions value), the single native
// call inside the lambda (plain or `_out` name, `self.`/`torch::`/`at::` qualifier, out
// arguments moved first), and where each argument comes from at the call site (receiver,
// synthesised options, an element of the collapsed `out` list, or a parser accessor at a
// parser position). Groups with a plain and an out member become a branch on whether
// `out` was omitted; names with several groups become a switch on the resolved overload.

//! Emission plan construction.

use std::fmt;

use crate::core::{GenResult, GenerationSession};
use crate::descriptor::{Function, TENSOR_OPTION_NAMES};
use crate::filter::Surface;
use crate::overload::OverloadGroup;
use crate::signature::{signature_params, OutParams};
use crate::types::{map_param, ReturnShape};

/// Minimum number of tensor-option parameters that form an aggregate.
const OPTIONS_AGGREGATE_THRESHOLD: usize = 4;

/// Base names whose dtype option may be left unset.
const OPTIONAL_DTYPE_NAMES: [&str; 1] = ["arange"];

/// Where a dispatch lambda argument comes from at the call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgSource {
    /// The method receiver.
    Receiver,
    /// The synthesised `TensorOptions` value.
    Options,
    /// Element of the collapsed `out` tensor list.
    OutElement(usize),
    /// Argument parser accessor at a parser position.
    Parsed { accessor: String, position: usize },
}

impl fmt::Display for ArgSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgSource::Receiver => f.write_str("self"),
            ArgSource::Options => f.write_str("options"),
            ArgSource::OutElement(index) => write!(f, "out[{}]", index),
            ArgSource::Parsed { accessor, position } => write!(f, "_r.{}({})", accessor, position),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LambdaParam {
    pub native_type: String,
    pub name: String,
}

/// One `.setter(_r.accessor(position))` link of the options builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionSetter {
    pub setter: &'static str,
    pub accessor: &'static str,
    pub position: usize,
}

/// Extraction of a collapsed `out` keyword as a fixed-size tensor list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutList {
    pub size: usize,
    pub position: usize,
}

/// A single native call and its argument materialisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallPlan {
    /// The descriptor's `func` text, emitted as a comment.
    pub descriptor: String,
    pub lambda: String,
    pub params: Vec<LambdaParam>,
    pub returns: ReturnShape,
    /// Qualified native callee, e.g. `at::add_out`.
    pub callee: String,
    /// Lambda parameter names in native argument order.
    pub call_args: Vec<String>,
    /// Empty unless the call takes an options aggregate.
    pub options: Vec<OptionSetter>,
    pub out_list: Option<OutList>,
    /// One source per lambda parameter.
    pub args: Vec<ArgSource>,
}

impl CallPlan {
    /// Whether rendering this call reads the parse result.
    pub fn reads_parse_result(&self) -> bool {
        !self.options.is_empty()
            || self.out_list.is_some()
            || self.args.iter().any(|a| matches!(a, ArgSource::Parsed { .. }))
    }
}

/// Dispatch of one overload group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupPlan {
    Direct(CallPlan),
    /// Plain call when the argument at `out_position` is omitted, out call otherwise.
    OutBranch {
        out_position: usize,
        base: CallPlan,
        out: CallPlan,
    },
}

impl GroupPlan {
    fn reads_parse_result(&self) -> bool {
        match self {
            GroupPlan::Direct(call) => call.reads_parse_result(),
            GroupPlan::OutBranch { .. } => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchBody {
    Single(GroupPlan),
    /// One arm per overload group, indexed by the parser's resolved overload.
    Switch(Vec<GroupPlan>),
}

/// Everything needed to render one public name's dispatch function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodPlan {
    pub name: String,
    /// C symbol of the generated function.
    pub symbol: String,
    pub surface: Surface,
    /// Parser signatures in overload priority order.
    pub signatures: Vec<String>,
    /// Capacity of the parsed argument buffer.
    pub max_args: usize,
    pub body: DispatchBody,
}

impl MethodPlan {
    pub fn reads_parse_result(&self) -> bool {
        match &self.body {
            DispatchBody::Single(group) => group.reads_parse_result(),
            DispatchBody::Switch(_) => true,
        }
    }

    pub fn group_count(&self) -> usize {
        match &self.body {
            DispatchBody::Single(_) => 1,
            DispatchBody::Switch(groups) => groups.len(),
        }
    }
}

/// C symbol for `name` on `surface`.
pub fn symbol_name(name: &str, surface: Surface) -> String {
    if surface == Surface::Linalg && name.starts_with("linalg_") {
        name.to_string()
    } else {
        format!("{}_{}", surface.name(), name)
    }
}

/// Plan the dispatch function for `name` from its ordered overload groups.
pub fn plan_method(
    name: &str,
    groups: &[OverloadGroup<'_>],
    surface: Surface,
    session: &GenerationSession,
) -> GenResult<MethodPlan> {
    let mut plans = groups
        .iter()
        .map(|group| plan_group(group, surface, session))
        .collect::<GenResult<Vec<_>>>()?;

    let body = if plans.len() == 1 {
        DispatchBody::Single(plans.remove(0))
    } else {
        DispatchBody::Switch(plans)
    };

    let max_args = groups
        .iter()
        .map(|g| g.signature.arity)
        .max()
        .unwrap_or(0)
        .max(1);

    session.record_name_emitted(surface, groups.len());
    Ok(MethodPlan {
        name: name.to_string(),
        symbol: symbol_name(name, surface),
        surface,
        signatures: groups.iter().map(|g| g.signature.text.clone()).collect(),
        max_args,
        body,
    })
}

fn plan_group(group: &OverloadGroup<'_>, surface: Surface, session: &GenerationSession) -> GenResult<GroupPlan> {
    match (group.base, group.out) {
        (Some(base), Some(out)) => {
            session.record_out_branch();
            // The parser matches the out member's signature; both branches read from it.
            let out_plan = plan_call_in(out, out, surface, session)?;
            let out_position = parser_positions(out, out, surface)
                .out
                .unwrap_or_default();
            Ok(GroupPlan::OutBranch {
                out_position,
                base: plan_call_in(base, out, surface, session)?,
                out: out_plan,
            })
        }
        _ => Ok(GroupPlan::Direct(plan_call(group.primary(), surface, session)?)),
    }
}

/// Parser positions of a function's parameters on one surface.
struct Positions {
    /// Indexed like `Function::params`; `None` for a dropped receiver.
    params: Vec<Option<usize>>,
    /// Position of the first out parameter, or of the collapsed `out` keyword.
    out: Option<usize>,
}

/// Positions of `function`'s parameters, matched by name against the parser
/// signature rendered from `layout`.
fn parser_positions(function: &Function, layout: &Function, surface: Surface) -> Positions {
    let order = signature_params(layout, surface, OutParams::Keep);
    let position_of = |name: &str| order.iter().find(|p| p.name == name).and_then(|p| p.position);
    let out_range = function.out_range();
    let collapsed = function.collapses_out();

    let params = function
        .params
        .iter()
        .enumerate()
        .map(|(index, param)| {
            let in_out = out_range.as_ref().is_some_and(|r| r.contains(&index));
            if collapsed && in_out {
                position_of("out")
            } else {
                position_of(&param.name)
            }
        })
        .collect::<Vec<_>>();

    let out = out_range.and_then(|r| params[r.start]);
    Positions { params, out }
}

/// Plan the native call for one descriptor parsed against its own signature.
pub fn plan_call(function: &Function, surface: Surface, session: &GenerationSession) -> GenResult<CallPlan> {
    plan_call_in(function, function, surface, session)
}

/// Plan the native call for `function` when the parser matched `layout`'s signature.
fn plan_call_in(
    function: &Function,
    layout: &Function,
    surface: Surface,
    session: &GenerationSession,
) -> GenResult<CallPlan> {
    let receiver = surface.is_method();
    let positions = parser_positions(function, layout, surface);
    let option_count = function.params.iter().filter(|p| p.is_tensor_option()).count();
    let aggregate = option_count >= OPTIONS_AGGREGATE_THRESHOLD;
    let out_range = function.out_range();
    let collapsed = function.collapses_out();

    let mut params = Vec::new();
    let mut args = Vec::new();
    let mut call_args = Vec::new();
    let mut out_args = Vec::new();
    let mut options_placed = false;

    for (index, param) in function.params.iter().enumerate() {
        if aggregate && param.is_tensor_option() {
            if !options_placed {
                params.push(LambdaParam {
                    native_type: "const TensorOptions &".to_string(),
                    name: "options".to_string(),
                });
                args.push(ArgSource::Options);
                call_args.push("options".to_string());
                options_placed = true;
            }
            continue;
        }

        let mapped = map_param(param, function)?;
        params.push(LambdaParam {
            native_type: mapped.native_type,
            name: param.name.clone(),
        });

        let is_receiver = receiver && param.name == "self";
        let in_out = out_range.as_ref().is_some_and(|r| r.contains(&index));
        let source = if is_receiver {
            ArgSource::Receiver
        } else if collapsed && in_out {
            ArgSource::OutElement(index - out_range.as_ref().map_or(0, |r| r.start))
        } else {
            ArgSource::Parsed {
                accessor: mapped.accessor,
                position: positions.params[index].unwrap_or(index),
            }
        };
        args.push(source);

        if is_receiver {
            continue;
        }
        if in_out {
            out_args.push(param.name.clone());
        } else {
            call_args.push(param.name.clone());
        }
    }

    // Native `_out` functions take their outputs first.
    out_args.extend(call_args);
    let call_args = out_args;

    let options = if aggregate {
        session.record_options_aggregate();
        option_setters(function, &positions)
    } else {
        Vec::new()
    };

    let cpp_name = if function.is_out() {
        format!("{}_out", function.base_name)
    } else {
        function.base_name.clone()
    };
    let prefix = if receiver {
        "self."
    } else if aggregate {
        "torch::"
    } else {
        "at::"
    };

    let out_list = if collapsed {
        positions.out.map(|position| OutList {
            size: function.retvals.len(),
            position,
        })
    } else {
        None
    };

    log::trace!("Planned {} as {}{}", function.name, prefix, cpp_name);
    Ok(CallPlan {
        descriptor: function.func.clone(),
        lambda: format!("dispatch_{}", cpp_name),
        params,
        returns: ReturnShape::of(function)?,
        callee: format!("{}{}", prefix, cpp_name),
        call_args,
        options,
        out_list,
        args,
    })
}

fn option_setters(function: &Function, positions: &Positions) -> Vec<OptionSetter> {
    let mut setters: Vec<(usize, OptionSetter)> = function
        .params
        .iter()
        .enumerate()
        .filter(|(_, p)| p.is_tensor_option())
        .filter_map(|(index, param)| {
            let order = TENSOR_OPTION_NAMES.iter().position(|n| *n == param.name)?;
            let (setter, accessor) = match param.name.as_str() {
                "dtype" if OPTIONAL_DTYPE_NAMES.contains(&function.base_name.as_str()) => {
                    ("dtype", "scalartypeOptional")
                }
                "dtype" => ("dtype", "scalartype"),
                "device" => ("device", "device"),
                "layout" => ("layout", "layoutOptional"),
                "requires_grad" => ("requires_grad", "toBool"),
                "pin_memory" => ("pinned_memory", "toBool"),
                _ => return None,
            };
            let position = positions.params[index].unwrap_or(index);
            Some((order, OptionSetter { setter, accessor, position }))
        })
        .collect();

    setters.sort_by_key(|(order, _)| *order);
    setters.into_iter().map(|(_, setter)| setter).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{GeneratorConfig, RawRecord};

    fn function(func: &str) -> Function {
        Function::from_record(0, &RawRecord::new(func)).unwrap()
    }

    fn session() -> GenerationSession {
        GenerationSession::new(GeneratorConfig::default())
    }

    #[test]
    fn test_plain_function_call() {
        let f = function("add.Tensor(Tensor self, Tensor other, *, Scalar alpha=1) -> Tensor");
        let plan = plan_call(&f, Surface::Torch, &session()).unwrap();

        assert_eq!(plan.lambda, "dispatch_add");
        assert_eq!(plan.callee, "at::add");
        assert_eq!(plan.call_args, vec!["self", "other", "alpha"]);
        let args: Vec<String> = plan.args.iter().map(|a| a.to_string()).collect();
        assert_eq!(args, vec!["_r.tensor(0)", "_r.tensor(1)", "_r.scalar(2)"]);
        assert_eq!(plan.returns, ReturnShape::Tensor);
        assert!(plan.options.is_empty());
    }

    #[test]
    fn test_method_call_uses_receiver() {
        let f = function("add.Tensor(Tensor self, Tensor other, *, Scalar alpha=1) -> Tensor");
        let plan = plan_call(&f, Surface::Tensor, &session()).unwrap();

        assert_eq!(plan.callee, "self.add");
        assert_eq!(plan.call_args, vec!["other", "alpha"]);
        assert_eq!(plan.params[0].name, "self");
        let args: Vec<String> = plan.args.iter().map(|a| a.to_string()).collect();
        assert_eq!(args, vec!["self", "_r.tensor(0)", "_r.scalar(1)"]);
    }

    #[test]
    fn test_out_call_moves_outputs_first() {
        let f = function("add.out(Tensor self, Tensor other, *, Scalar alpha=1, Tensor(a!) out) -> Tensor(a!)");
        let plan = plan_call(&f, Surface::Torch, &session()).unwrap();

        assert_eq!(plan.callee, "at::add_out");
        assert_eq!(plan.lambda, "dispatch_add_out");
        assert_eq!(plan.call_args, vec!["out", "self", "other", "alpha"]);
        assert_eq!(plan.args[3].to_string(), "_r.tensor(3)");
        assert!(plan.out_list.is_none());
    }

    #[test]
    fn test_collapsed_out_elements() {
        let f = function(
            "max.dim_max(Tensor self, int dim, bool keepdim=False, *, Tensor(a!) max, Tensor(b!) max_values) -> (Tensor(a!) values, Tensor(b!) indices)",
        );
        let plan = plan_call(&f, Surface::Torch, &session()).unwrap();

        let args: Vec<String> = plan.args.iter().map(|a| a.to_string()).collect();
        assert_eq!(args, vec!["_r.tensor(0)", "_r.toInt64(1)", "_r.toBool(2)", "out[0]", "out[1]"]);
        assert_eq!(plan.out_list, Some(OutList { size: 2, position: 3 }));
        assert_eq!(plan.call_args, vec!["max", "max_values", "self", "dim", "keepdim"]);
        assert_eq!(plan.params[3].native_type, "Tensor &");
    }

    #[test]
    fn test_tensor_options_aggregate() {
        let f = function(
            "empty.memory_format(int[] size, *, ScalarType? dtype=None, Layout? layout=None, Device? device=None, bool? pin_memory=None, MemoryFormat? memory_format=None) -> Tensor",
        );
        let session = session();
        let plan = plan_call(&f, Surface::Torch, &session).unwrap();

        assert_eq!(plan.callee, "torch::empty");
        let names: Vec<&str> = plan.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["size", "options", "memory_format"]);
        assert_eq!(plan.call_args, vec!["size", "options", "memory_format"]);
        let args: Vec<String> = plan.args.iter().map(|a| a.to_string()).collect();
        assert_eq!(args, vec!["_r.intlist(0)", "options", "_r.memoryformatOptional(5)"]);

        let setters: Vec<(&str, usize)> = plan.options.iter().map(|s| (s.setter, s.position)).collect();
        assert_eq!(
            setters,
            vec![("dtype", 1), ("device", 3), ("layout", 2), ("requires_grad", 6), ("pinned_memory", 4)]
        );
        assert_eq!(session.stats().options_aggregates, 1);
    }

    #[test]
    fn test_arange_dtype_is_optional() {
        let f = function(
            "arange(Scalar end, *, ScalarType? dtype=None, Layout? layout=None, Device? device=None, bool? pin_memory=None) -> Tensor",
        );
        let plan = plan_call(&f, Surface::Torch, &session()).unwrap();
        assert_eq!(plan.options[0].accessor, "scalartypeOptional");
    }

    #[test]
    fn test_plain_branch_reads_out_signature_slots() {
        let session = session();
        let functions = [
            function("foo(Tensor self, *, int k=1) -> Tensor"),
            function("foo.out(Tensor self, *, Tensor(a!) out, int k=1) -> Tensor(a!)"),
        ];
        let refs: Vec<&Function> = functions.iter().collect();
        let groups = crate::overload::group_overloads("foo", &refs, Surface::Torch, &session).unwrap();
        assert_eq!(groups[0].signature.text, "foo(Tensor input, *, Tensor out=None, int64_t k=1)");

        let plan = plan_method("foo", &groups, Surface::Torch, &session).unwrap();
        let (out_position, base, out) = match plan.body {
            DispatchBody::Single(GroupPlan::OutBranch { out_position, base, out }) => (out_position, base, out),
            other => panic!("expected an out branch, got {other:?}"),
        };
        assert_eq!(out_position, 1);
        let base_args: Vec<String> = base.args.iter().map(|a| a.to_string()).collect();
        assert_eq!(base_args, vec!["_r.tensor(0)", "_r.toInt64(2)"]);
        let out_args: Vec<String> = out.args.iter().map(|a| a.to_string()).collect();
        assert_eq!(out_args, vec!["_r.tensor(0)", "_r.tensor(1)", "_r.toInt64(2)"]);
    }

    #[test]
    fn test_symbol_names() {
        assert_eq!(symbol_name("add", Surface::Torch), "torch_add");
        assert_eq!(symbol_name("linalg_det", Surface::Linalg), "linalg_det");
        assert_eq!(symbol_name("det", Surface::Linalg), "linalg_det");
        assert_eq!(symbol_name("relu6", Surface::Nn), "nn_relu6");
    }

    #[test]
    fn test_unknown_return_shape_fails() {
        let f = function("weird(Tensor self) -> (Tensor a, bool b)");
        assert!(plan_call(&f, Surface::Torch, &session()).is_err());
    }
}
