// This module implements the type mapper: the single table translating declarative
// descriptor types into the three spellings the generated code needs. For parameters that
// is the native lambda parameter type, the accessor name on the runtime argument parser,
// and the type token used in the parser's textual signature. For return values it is the
// native return type of the dispatch lambda. The vocabulary is closed: TypeKind enumerates
// every supported parameter type and ReturnShape every supported return shape, and all
// mappings are exhaustive matches, so adding a kind forces every spelling to be decided.
// Anything outside the vocabulary fails the run with the offending type and function.

//! Declarative type vocabulary and its native spellings.

use std::fmt;

use crate::core::{GenError, GenResult};
use crate::descriptor::{Function, Param};

/// Supported parameter types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Tensor,
    TensorList,
    Scalar,
    ScalarList,
    Int,
    IntList,
    Float,
    FloatList,
    Str,
    Bool,
    ScalarType,
    Layout,
    Device,
    Storage,
    Generator,
    MemoryFormat,
}

impl TypeKind {
    /// Parse a declarative type with optional marker and alias annotation removed.
    pub fn parse(ty: &str) -> Option<TypeKind> {
        let kind = match ty {
            "Tensor" => TypeKind::Tensor,
            "Scalar" => TypeKind::Scalar,
            "Scalar[]" => TypeKind::ScalarList,
            "int" => TypeKind::Int,
            "float" => TypeKind::Float,
            "float[]" => TypeKind::FloatList,
            "str" => TypeKind::Str,
            "bool" => TypeKind::Bool,
            "ScalarType" => TypeKind::ScalarType,
            "Layout" => TypeKind::Layout,
            "Device" => TypeKind::Device,
            "Storage" => TypeKind::Storage,
            "Generator" => TypeKind::Generator,
            "MemoryFormat" => TypeKind::MemoryFormat,
            list => {
                let (element, size) = list.strip_suffix(']')?.split_once('[')?;
                if !size.chars().all(|c| c.is_ascii_digit()) {
                    return None;
                }
                match element {
                    "Tensor" => TypeKind::TensorList,
                    "int" => TypeKind::IntList,
                    _ => return None,
                }
            }
        };
        Some(kind)
    }

    /// Kind of `param`, failing with the owning function's name.
    pub fn of(param: &Param, function: &Function) -> GenResult<TypeKind> {
        TypeKind::parse(&param.ty).ok_or_else(|| GenError::UnknownType {
            ty: param.ty.clone(),
            function: function.name.clone(),
        })
    }

    /// Token used in the argument parser's signature strings.
    pub fn signature_name(self) -> &'static str {
        match self {
            TypeKind::Tensor => "Tensor",
            TypeKind::TensorList => "TensorList",
            TypeKind::Scalar => "Scalar",
            TypeKind::ScalarList => "ScalarList",
            TypeKind::Int => "int64_t",
            TypeKind::IntList => "IntArrayRef",
            TypeKind::Float => "double",
            TypeKind::FloatList => "ArrayRef<double>",
            TypeKind::Str => "std::string",
            TypeKind::Bool => "bool",
            TypeKind::ScalarType => "ScalarType",
            TypeKind::Layout => "Layout",
            TypeKind::Device => "Device",
            TypeKind::Storage => "Storage",
            TypeKind::Generator => "Generator",
            TypeKind::MemoryFormat => "MemoryFormat",
        }
    }

    /// Native type of a required, non-tensor parameter.
    fn native_name(self) -> &'static str {
        match self {
            TypeKind::Tensor => "const Tensor &",
            TypeKind::TensorList => "TensorList",
            TypeKind::Scalar => "Scalar",
            TypeKind::ScalarList => "ScalarList",
            TypeKind::Int => "int64_t",
            TypeKind::IntList => "IntArrayRef",
            TypeKind::Float => "double",
            TypeKind::FloatList => "ArrayRef<double>",
            TypeKind::Str => "std::string",
            TypeKind::Bool => "bool",
            TypeKind::ScalarType => "ScalarType",
            TypeKind::Layout => "Layout",
            TypeKind::Device => "Device",
            TypeKind::Storage => "Storage",
            TypeKind::Generator => "Generator",
            TypeKind::MemoryFormat => "MemoryFormat",
        }
    }

    /// Argument parser accessor for a required parameter.
    fn accessor_name(self) -> &'static str {
        match self {
            TypeKind::Tensor => "tensor",
            TypeKind::TensorList => "tensorlist",
            TypeKind::Scalar => "scalar",
            TypeKind::ScalarList => "scalarlist",
            TypeKind::Int => "toInt64",
            TypeKind::IntList => "intlist",
            TypeKind::Float => "toDouble",
            TypeKind::FloatList => "doublelist",
            TypeKind::Str => "string",
            TypeKind::Bool => "toBool",
            TypeKind::ScalarType => "scalartype",
            TypeKind::Layout => "layout",
            TypeKind::Device => "device",
            TypeKind::Storage => "storage",
            TypeKind::Generator => "generator",
            TypeKind::MemoryFormat => "memoryformat",
        }
    }
}

/// The native spellings of one parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedParam {
    pub kind: TypeKind,
    pub native_type: String,
    pub accessor: String,
}

/// Map `param` of `function` onto its lambda type and parser accessor.
pub fn map_param(param: &Param, function: &Function) -> GenResult<MappedParam> {
    let kind = TypeKind::of(param, function)?;
    Ok(MappedParam {
        kind,
        native_type: native_param_type(kind, param, function),
        accessor: accessor(kind, param, function),
    })
}

fn native_param_type(kind: TypeKind, param: &Param, function: &Function) -> String {
    if kind == TypeKind::Tensor {
        let ty = if param.optional {
            if function.is_out() {
                "const Tensor &"
            } else {
                "const OptionalTensor &"
            }
        } else if param.modifier.is_some() {
            if param.is_written() && function.retvals.len() > 1 {
                "Tensor &"
            } else {
                "Tensor"
            }
        } else {
            "const Tensor &"
        };
        return ty.to_string();
    }

    if param.optional {
        format!("c10::optional<{}>", kind.native_name())
    } else {
        kind.native_name().to_string()
    }
}

fn accessor(kind: TypeKind, param: &Param, function: &Function) -> String {
    let base = kind.accessor_name();
    if !param.optional {
        return base.to_string();
    }
    match kind {
        TypeKind::Tensor if function.is_out() => base.to_string(),
        TypeKind::Tensor => "optionalTensor".to_string(),
        // Already accept None at runtime.
        TypeKind::Generator | TypeKind::TensorList | TypeKind::IntList => base.to_string(),
        _ => format!("{}Optional", base),
    }
}

/// Supported return value shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnShape {
    Void,
    Bool,
    Int,
    Float,
    Scalar,
    ScalarType,
    QScheme,
    Tensor,
    TensorList,
    /// Two to five tensors.
    TensorTuple(usize),
    /// `(Tensor, Tensor, float, int)`.
    TensorPairFloatInt,
    /// `(float, float)`.
    FloatPair,
}

impl ReturnShape {
    pub fn of(function: &Function) -> GenResult<ReturnShape> {
        let types: Vec<&str> = function.retvals.iter().map(|r| r.ty.as_str()).collect();
        let shape = match types.as_slice() {
            [] => ReturnShape::Void,
            ["bool"] => ReturnShape::Bool,
            ["int"] => ReturnShape::Int,
            ["float"] => ReturnShape::Float,
            ["Scalar"] => ReturnShape::Scalar,
            ["ScalarType"] => ReturnShape::ScalarType,
            ["QScheme"] => ReturnShape::QScheme,
            ["Tensor"] => ReturnShape::Tensor,
            ["Tensor[]"] => ReturnShape::TensorList,
            ["Tensor", "Tensor", "float", "int"] => ReturnShape::TensorPairFloatInt,
            ["float", "float"] => ReturnShape::FloatPair,
            tensors if (2..=5).contains(&tensors.len()) && tensors.iter().all(|t| *t == "Tensor") => {
                ReturnShape::TensorTuple(tensors.len())
            }
            other => {
                return Err(GenError::UnknownReturn {
                    shape: other.join(", "),
                    function: function.name.clone(),
                })
            }
        };
        Ok(shape)
    }

    pub fn is_void(self) -> bool {
        self == ReturnShape::Void
    }
}

impl fmt::Display for ReturnShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnShape::Void => f.write_str("void"),
            ReturnShape::Bool => f.write_str("bool"),
            ReturnShape::Int => f.write_str("int64_t"),
            ReturnShape::Float => f.write_str("double"),
            ReturnShape::Scalar => f.write_str("Scalar"),
            ReturnShape::ScalarType => f.write_str("ScalarType"),
            ReturnShape::QScheme => f.write_str("QScheme"),
            ReturnShape::Tensor => f.write_str("Tensor"),
            ReturnShape::TensorList => f.write_str("std::vector<Tensor>"),
            ReturnShape::TensorTuple(n) => write!(f, "std::tuple<{}>", vec!["Tensor"; *n].join(",")),
            ReturnShape::TensorPairFloatInt => f.write_str("std::tuple<Tensor,Tensor,double,int64_t>"),
            ReturnShape::FloatPair => f.write_str("std::tuple<double,double>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RawRecord;
    use crate::filter::Surface;
    use crate::signature::{generate_signature, OutParams};

    fn function(func: &str) -> Function {
        Function::from_record(0, &RawRecord::new(func)).unwrap()
    }

    #[test]
    fn test_parse_vocabulary() {
        assert_eq!(TypeKind::parse("Tensor"), Some(TypeKind::Tensor));
        assert_eq!(TypeKind::parse("Tensor[]"), Some(TypeKind::TensorList));
        assert_eq!(TypeKind::parse("int[2]"), Some(TypeKind::IntList));
        assert_eq!(TypeKind::parse("int[]"), Some(TypeKind::IntList));
        assert_eq!(TypeKind::parse("float[]"), Some(TypeKind::FloatList));
        assert_eq!(TypeKind::parse("Dimname"), None);
        assert_eq!(TypeKind::parse("Dimname[]"), None);
        assert_eq!(TypeKind::parse("int[n]"), None);
        assert_eq!(TypeKind::parse("QScheme"), None);
    }

    #[test]
    fn test_map_plain_params() {
        let f = function(
            "clamp(Tensor self, Scalar? min=None, Scalar? max=None, int[] dims=[], Generator? generator=None) -> Tensor",
        );
        let mapped: Vec<_> = f.params.iter().map(|p| map_param(p, &f).unwrap()).collect();

        assert_eq!(mapped[0].native_type, "const Tensor &");
        assert_eq!(mapped[0].accessor, "tensor");
        assert_eq!(mapped[1].native_type, "c10::optional<Scalar>");
        assert_eq!(mapped[1].accessor, "scalarOptional");
        assert_eq!(mapped[3].native_type, "IntArrayRef");
        assert_eq!(mapped[3].accessor, "intlist");
        assert_eq!(mapped[4].native_type, "c10::optional<Generator>");
        assert_eq!(mapped[4].accessor, "generator");
    }

    #[test]
    fn test_every_type_maps() {
        // (declared type, native type, accessor, signature token)
        let cases = [
            ("Tensor", "const Tensor &", "tensor", "Tensor"),
            ("Tensor?", "const OptionalTensor &", "optionalTensor", "Tensor?"),
            ("Tensor[]", "TensorList", "tensorlist", "TensorList"),
            ("Tensor?[]", "c10::optional<TensorList>", "tensorlist", "TensorList?"),
            ("Scalar", "Scalar", "scalar", "Scalar"),
            ("Scalar?", "c10::optional<Scalar>", "scalarOptional", "Scalar?"),
            ("Scalar[]", "ScalarList", "scalarlist", "ScalarList"),
            ("int", "int64_t", "toInt64", "int64_t"),
            ("int?", "c10::optional<int64_t>", "toInt64Optional", "int64_t?"),
            ("int[]", "IntArrayRef", "intlist", "IntArrayRef"),
            ("int[2]", "IntArrayRef", "intlist", "IntArrayRef[2]"),
            ("int[1]?", "c10::optional<IntArrayRef>", "intlist", "IntArrayRef[1]?"),
            ("float", "double", "toDouble", "double"),
            ("float?", "c10::optional<double>", "toDoubleOptional", "double?"),
            ("float[]", "ArrayRef<double>", "doublelist", "ArrayRef<double>"),
            ("float[]?", "c10::optional<ArrayRef<double>>", "doublelistOptional", "ArrayRef<double>?"),
            ("str", "std::string", "string", "std::string"),
            ("str?", "c10::optional<std::string>", "stringOptional", "std::string?"),
            ("bool", "bool", "toBool", "bool"),
            ("bool?", "c10::optional<bool>", "toBoolOptional", "bool?"),
            ("ScalarType", "ScalarType", "scalartype", "ScalarType"),
            ("ScalarType?", "c10::optional<ScalarType>", "scalartypeOptional", "ScalarType?"),
            ("Layout", "Layout", "layout", "Layout"),
            ("Layout?", "c10::optional<Layout>", "layoutOptional", "Layout?"),
            ("Device", "Device", "device", "Device"),
            ("Device?", "c10::optional<Device>", "deviceOptional", "Device?"),
            ("Storage", "Storage", "storage", "Storage"),
            ("Generator", "Generator", "generator", "Generator"),
            ("Generator?", "c10::optional<Generator>", "generator", "Generator?"),
            ("MemoryFormat", "MemoryFormat", "memoryformat", "MemoryFormat"),
            ("MemoryFormat?", "c10::optional<MemoryFormat>", "memoryformatOptional", "MemoryFormat?"),
        ];

        for (ty, native, accessor, token) in cases {
            let f = function(&format!("f(Tensor self, {ty} x) -> Tensor"));
            let mapped = map_param(&f.params[1], &f).unwrap_or_else(|e| panic!("{ty}: {e}"));
            assert_eq!(mapped.native_type, native, "{ty}");
            assert_eq!(mapped.accessor, accessor, "{ty}");

            let sig = generate_signature(&f, Surface::Torch, OutParams::Keep).unwrap_or_else(|e| panic!("{ty}: {e}"));
            assert_eq!(sig.text, format!("f(Tensor input, {token} x)"), "{ty}");
        }
    }

    #[test]
    fn test_map_tensor_variants() {
        let f = function("addcmul(Tensor self, Tensor? weight=None) -> Tensor");
        let weight = map_param(&f.params[1], &f).unwrap();
        assert_eq!(weight.native_type, "const OptionalTensor &");
        assert_eq!(weight.accessor, "optionalTensor");

        let f = function("addcmul.out(Tensor self, Tensor? weight=None, *, Tensor(a!) out) -> Tensor(a!)");
        let weight = map_param(&f.params[1], &f).unwrap();
        assert_eq!(weight.native_type, "const Tensor &");
        assert_eq!(weight.accessor, "tensor");
        assert_eq!(map_param(&f.params[2], &f).unwrap().native_type, "Tensor");

        let f = function(
            "sort.values(Tensor self, *, Tensor(a!) values, Tensor(b!) indices) -> (Tensor(a!) values, Tensor(b!) indices)",
        );
        assert_eq!(map_param(&f.params[1], &f).unwrap().native_type, "Tensor &");
    }

    #[test]
    fn test_unknown_param_type() {
        let f = function("rename(Tensor self, Dimname name) -> Tensor");
        let err = map_param(&f.params[1], &f).unwrap_err();
        assert_eq!(err.to_string(), "Unknown type: Dimname (rename)");
    }

    #[test]
    fn test_return_shapes() {
        let cases = [
            ("f(Tensor self) -> ()", "void"),
            ("f(Tensor self) -> bool", "bool"),
            ("f(Tensor self) -> int", "int64_t"),
            ("f(Tensor self) -> float", "double"),
            ("f(Tensor self) -> QScheme", "QScheme"),
            ("f(Tensor self) -> Tensor[]", "std::vector<Tensor>"),
            ("f(Tensor self) -> (Tensor a, Tensor b, Tensor c)", "std::tuple<Tensor,Tensor,Tensor>"),
            ("f(Tensor self) -> (Tensor a, Tensor b, float c, int d)", "std::tuple<Tensor,Tensor,double,int64_t>"),
            ("f(Tensor self) -> (float a, float b)", "std::tuple<double,double>"),
        ];
        for (func, expected) in cases {
            let shape = ReturnShape::of(&function(func)).unwrap();
            assert_eq!(shape.to_string(), expected, "{func}");
        }
    }

    #[test]
    fn test_unknown_return_shape() {
        let err = ReturnShape::of(&function("f(Tensor self) -> (Tensor a, int b)")).unwrap_err();
        assert_eq!(err.to_string(), "Unknown retvals: [Tensor, int] (f)");

        let err = ReturnShape::of(&function(
            "f(Tensor self) -> (Tensor a, Tensor b, Tensor c, Tensor d, Tensor e, Tensor f)",
        ))
        .unwrap_err();
        assert!(matches!(err, GenError::UnknownReturn { .. }));
    }
}
