// This module defines error types for the binding generator using the thiserror crate for
// idiomatic Rust error handling. GenError is the main error enum covering every failure
// that halts a generation run: malformed descriptor records, YAML loading failures, types
// outside the closed type vocabulary, unsupported return shapes, python_module tags outside
// the allow-list, out-variant overload groups without a plain base, and I/O failures while
// reading the table or persisting generated units. Each variant carries the offending
// record, function, or type so the message points straight at the descriptor to fix. The
// module also provides GenResult<T> as a convenience alias for Result<T, GenError>.

//! Error types for the binding generator.
//!
//! Every error is fatal to the whole run. Nothing is written until all
//! surfaces have been generated successfully.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for a generation run.
#[derive(Error, Debug)]
pub enum GenError {
    #[error("Invalid descriptor record {record}: field `{field}`: {reason}")]
    Descriptor {
        record: String,
        field: &'static str,
        reason: String,
    },

    #[error("Failed to load descriptor table: {0}")]
    Load(#[from] serde_yaml::Error),

    #[error("Unknown type: {ty} ({function})")]
    UnknownType {
        ty: String,
        function: String,
    },

    #[error("Unknown retvals: [{shape}] ({function})")]
    UnknownReturn {
        shape: String,
        function: String,
    },

    #[error("Unexpected module: {module} ({function})")]
    UnexpectedModule {
        module: String,
        function: String,
    },

    #[error("Missing base: {name} has an out variant without a plain overload for {signature}")]
    MissingBase {
        name: String,
        signature: String,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl GenError {
    pub(crate) fn descriptor(record: impl Into<String>, field: &'static str, reason: impl Into<String>) -> Self {
        GenError::Descriptor {
            record: record.into(),
            field,
            reason: reason.into(),
        }
    }
}

/// Result type alias for generation operations.
pub type GenResult<T> = Result<T, GenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_offender() {
        let err = GenError::UnknownType {
            ty: "Dimname".to_string(),
            function: "sum.dim_DimnameList".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown type: Dimname (sum.dim_DimnameList)");

        let err = GenError::descriptor("#3 (foo(Tensor self)", "func", "unbalanced parentheses");
        assert!(err.to_string().contains("field `func`"));
        assert!(err.to_string().contains("#3"));
    }
}
