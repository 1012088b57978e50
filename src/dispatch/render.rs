//! Rendering of emission plans into C++ source.
//!
//! Rendering makes no decisions; everything it prints comes from a
//! [`MethodPlan`]. Output for a name with one plain and one out overload:
//!
//! ```text
//! // add
//! static VALUE torch_add(int argc, VALUE* argv, VALUE self_)
//! {
//!   HANDLE_TH_ERRORS
//!   static RubyArgParser parser({
//!     "add(Tensor input, Tensor other, *, Scalar alpha=1, Tensor out=None)"
//!   });
//!   ParsedArgs<4> parsed_args;
//!   auto _r = parser.parse(self_, argc, argv, parsed_args);
//!   if (_r.isNone(3)) {
//!     ...plain call...
//!   } else {
//!     ...out call...
//!   }
//!   END_HANDLE_TH_ERRORS
//! }
//! ```

use super::plan::{CallPlan, DispatchBody, GroupPlan, MethodPlan};

const INDENT: &str = "  ";

/// Line-oriented writer with indentation.
#[derive(Default)]
struct CodeWriter {
    out: String,
    depth: usize,
}

impl CodeWriter {
    fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.depth {
                self.out.push_str(INDENT);
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    fn open(&mut self, text: impl AsRef<str>) {
        self.line(text);
        self.depth += 1;
    }

    fn close(&mut self, text: impl AsRef<str>) {
        self.depth = self.depth.saturating_sub(1);
        self.line(text);
    }

    fn finish(self) -> String {
        self.out
    }
}

/// Quote `text` as a C string literal.
pub fn c_string_literal(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for ch in text.chars() {
        match ch {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            _ => quoted.push(ch),
        }
    }
    quoted.push('"');
    quoted
}

/// Render the complete dispatch function for one public name.
pub fn render_method(plan: &MethodPlan) -> String {
    let mut w = CodeWriter::default();
    w.line(format!("// {}", plan.name));
    w.line(format!("static VALUE {}(int argc, VALUE* argv, VALUE self_)", plan.symbol));
    w.open("{");
    w.line("HANDLE_TH_ERRORS");
    if plan.surface.is_method() {
        w.line("Tensor& self = Rice::detail::From_Ruby<Tensor&>().convert(self_);");
    }

    w.open("static RubyArgParser parser({");
    let count = plan.signatures.len();
    for (i, signature) in plan.signatures.iter().enumerate() {
        let separator = if i + 1 < count { "," } else { "" };
        w.line(format!("{}{}", c_string_literal(signature), separator));
    }
    w.close("});");

    w.line(format!("ParsedArgs<{}> parsed_args;", plan.max_args));
    let result = if plan.reads_parse_result() { "auto _r = " } else { "" };
    w.line(format!("{}parser.parse(self_, argc, argv, parsed_args);", result));

    match &plan.body {
        DispatchBody::Single(group) => render_group(&mut w, group),
        DispatchBody::Switch(groups) => {
            w.open("switch (_r.idx) {");
            for (i, group) in groups.iter().enumerate() {
                w.open(format!("case {}: {{", i));
                render_group(&mut w, group);
                w.close("}");
            }
            w.close("}");
            w.line("RETURN_NIL");
        }
    }

    w.line("END_HANDLE_TH_ERRORS");
    w.close("}");
    w.finish()
}

fn render_group(w: &mut CodeWriter, group: &GroupPlan) {
    match group {
        GroupPlan::Direct(call) => render_call(w, call),
        GroupPlan::OutBranch { out_position, base, out } => {
            w.open(format!("if (_r.isNone({})) {{", out_position));
            render_call(w, base);
            w.close("} else {");
            w.depth += 1;
            render_call(w, out);
            w.close("}");
        }
    }
}

fn render_call(w: &mut CodeWriter, call: &CallPlan) {
    w.line(format!("// {}", call.descriptor));

    if !call.options.is_empty() {
        w.open("const auto options = TensorOptions()");
        w.depth += 1;
        let last = call.options.len() - 1;
        for (i, option) in call.options.iter().enumerate() {
            let end = if i == last { ";" } else { "" };
            w.line(format!(".{}(_r.{}({})){}", option.setter, option.accessor, option.position, end));
        }
        w.depth -= 2;
    }

    if let Some(out_list) = call.out_list {
        w.line(format!("auto out = _r.tensorlist_n<{}>({});", out_list.size, out_list.position));
    }

    let params: Vec<String> = call
        .params
        .iter()
        .map(|p| format!("{} {}", p.native_type, p.name))
        .collect();
    w.open(format!(
        "auto {} = []({}) -> {} {{",
        call.lambda,
        params.join(", "),
        call.returns
    ));
    w.line("// in future, release GVL");
    let native = format!("{}({});", call.callee, call.call_args.join(", "));
    if call.returns.is_void() {
        w.line(native);
    } else {
        w.line(format!("return {}", native));
    }
    w.close("};");

    let args: Vec<String> = call.args.iter().map(|a| a.to_string()).collect();
    let invoke = format!("{}({})", call.lambda, args.join(", "));
    if call.returns.is_void() {
        w.line(format!("{};", invoke));
        w.line("RETURN_NIL");
    } else {
        w.line(format!("return wrap({});", invoke));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{GenerationSession, GeneratorConfig, RawRecord};
    use crate::descriptor::Function;
    use crate::dispatch::plan::plan_method;
    use crate::filter::Surface;
    use crate::overload::group_overloads;

    fn render(funcs: &[&str], surface: Surface) -> String {
        let session = GenerationSession::new(GeneratorConfig::default());
        let functions: Vec<Function> = funcs
            .iter()
            .enumerate()
            .map(|(i, func)| Function::from_record(i, &RawRecord::new(func)).unwrap())
            .collect();
        let refs: Vec<&Function> = functions.iter().collect();
        let name = functions[0].base_name.clone();
        let groups = group_overloads(&name, &refs, surface, &session).unwrap();
        render_method(&plan_method(&name, &groups, surface, &session).unwrap())
    }

    #[test]
    fn test_c_string_literal() {
        assert_eq!(c_string_literal("a(str x=\"y\")"), r#""a(str x=\"y\")""#);
        assert_eq!(c_string_literal(r"a\b"), r#""a\\b""#);
    }

    #[test]
    fn test_render_single_overload() {
        let code = render(&["abs(Tensor self) -> Tensor"], Surface::Torch);
        let expected = r#"// abs
static VALUE torch_abs(int argc, VALUE* argv, VALUE self_)
{
  HANDLE_TH_ERRORS
  static RubyArgParser parser({
    "abs(Tensor input)"
  });
  ParsedArgs<1> parsed_args;
  auto _r = parser.parse(self_, argc, argv, parsed_args);
  // abs(Tensor self) -> Tensor
  auto dispatch_abs = [](const Tensor & self) -> Tensor {
    // in future, release GVL
    return at::abs(self);
  };
  return wrap(dispatch_abs(_r.tensor(0)));
  END_HANDLE_TH_ERRORS
}
"#;
        assert_eq!(code, expected);
    }

    #[test]
    fn test_render_out_branch() {
        let code = render(
            &[
                "abs(Tensor self) -> Tensor",
                "abs.out(Tensor self, *, Tensor(a!) out) -> Tensor(a!)",
            ],
            Surface::Torch,
        );
        assert!(code.contains("    \"abs(Tensor input, *, Tensor out=None)\"\n"), "{code}");
        assert!(code.contains("  if (_r.isNone(1)) {\n    // abs(Tensor self) -> Tensor\n"), "{code}");
        assert!(code.contains("  } else {\n    // abs.out("), "{code}");
        assert!(code.contains("    return at::abs_out(out, self);\n"), "{code}");
        assert!(code.contains("    return wrap(dispatch_abs_out(_r.tensor(0), _r.tensor(1)));\n"), "{code}");
        assert_eq!(code.matches("_r.isNone(").count(), 1);
    }

    #[test]
    fn test_render_void_method() {
        let code = render(&["set_flag_(Tensor(a!) self, bool flag) -> ()"], Surface::Tensor);
        assert!(code.contains("  Tensor& self = Rice::detail::From_Ruby<Tensor&>().convert(self_);\n"));
        assert!(code.contains("auto dispatch_set_flag_ = [](Tensor self, bool flag) -> void {"), "{code}");
        assert!(code.contains("    self.set_flag_(flag);\n"), "{code}");
        assert!(code.contains("  dispatch_set_flag_(self, _r.toBool(0));\n  RETURN_NIL\n"), "{code}");
    }

    #[test]
    fn test_render_switch() {
        let code = render(
            &[
                "pow.Tensor_Scalar(Tensor self, Scalar exponent) -> Tensor",
                "pow.Tensor_Tensor(Tensor self, Tensor exponent) -> Tensor",
            ],
            Surface::Torch,
        );
        assert!(code.contains("  switch (_r.idx) {\n    case 0: {\n"), "{code}");
        assert!(code.contains("    case 1: {\n"), "{code}");
        assert!(code.contains("  }\n  RETURN_NIL\n  END_HANDLE_TH_ERRORS\n"), "{code}");
        assert_eq!(code.matches("case ").count(), 2);
    }

    #[test]
    fn test_render_options_builder() {
        let code = render(
            &["zeros(int[] size, *, ScalarType? dtype=None, Layout? layout=None, Device? device=None, bool? pin_memory=None) -> Tensor"],
            Surface::Torch,
        );
        let expected = "  const auto options = TensorOptions()
      .dtype(_r.scalartype(1))
      .device(_r.device(3))
      .layout(_r.layoutOptional(2))
      .requires_grad(_r.toBool(5))
      .pinned_memory(_r.toBool(4));
  auto dispatch_zeros = [](IntArrayRef size, const TensorOptions & options) -> Tensor {
    // in future, release GVL
    return torch::zeros(size, options);
  };
  return wrap(dispatch_zeros(_r.intlist(0), options));
";
        assert!(code.contains(expected), "{code}");
    }

    #[test]
    fn test_no_parse_result_without_arguments() {
        let code = render(&["seed() -> ()"], Surface::Torch);
        assert!(code.contains("  parser.parse(self_, argc, argv, parsed_args);\n"), "{code}");
        assert!(!code.contains("auto _r"));
    }
}
