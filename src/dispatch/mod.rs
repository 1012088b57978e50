// This module turns ordered overload groups into the C++ dispatch function for one public
// name. Planning and rendering are separate stages: `plan` decides every lambda type, call
// target, argument source and branch, and `render` prints a plan without making choices
// of its own. Tests can then assert on decisions without string matching, and the text
// layout can change without touching dispatch semantics.

//! Dispatch code generation.

pub mod plan;
pub mod render;

pub use plan::{
    plan_call, plan_method, symbol_name, ArgSource, CallPlan, DispatchBody, GroupPlan, LambdaParam, MethodPlan,
    OptionSetter, OutList,
};
pub use render::{c_string_literal, render_method};
