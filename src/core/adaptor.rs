// This module defines the DescriptorSource trait, the bridge between the generator and
// whatever loads the operator descriptor table. The generator itself never touches the
// filesystem on the input side: a source hands over an ordered list of RawRecord values,
// each carrying the `func` signature string, the optional `python_module` tag, and the
// optional `variants` declaration. YamlSource reads the table from a YAML document (the
// format of the upstream native_functions.yaml) and validates every record individually so
// a malformed entry is reported with its index and offending field. RecordSource wraps an
// in-memory list and is used by tests and by callers that already hold parsed records.

//! Descriptor sources.
//!
//! A source only has to produce raw records in table order. Interpretation of
//! the `func` grammar happens in [`crate::descriptor`].

use serde::Deserialize;

use super::error::{GenError, GenResult};

/// `variants` as written in the table: either `"function, method"` or a list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawVariants {
    Joined(String),
    List(Vec<String>),
}

impl RawVariants {
    /// Individual variant names, trimmed.
    pub fn names(&self) -> Vec<&str> {
        match self {
            RawVariants::Joined(joined) => joined
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .collect(),
            RawVariants::List(list) => list.iter().map(|name| name.trim()).collect(),
        }
    }
}

/// One unvalidated descriptor record.
///
/// Fields other than these three (dispatch tables, tags, ...) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub func: Option<String>,
    #[serde(default)]
    pub python_module: Option<String>,
    #[serde(default)]
    pub variants: Option<RawVariants>,
}

impl RawRecord {
    pub fn new(func: &str) -> Self {
        Self {
            func: Some(func.to_string()),
            python_module: None,
            variants: None,
        }
    }

    pub fn with_module(mut self, module: &str) -> Self {
        self.python_module = Some(module.to_string());
        self
    }

    pub fn with_variants(mut self, variants: &str) -> Self {
        self.variants = Some(RawVariants::Joined(variants.to_string()));
        self
    }
}

/// Producer of the raw descriptor table.
pub trait DescriptorSource {
    /// All records, in table order.
    fn records(&self) -> GenResult<Vec<RawRecord>>;
}

/// Descriptor table held in a YAML document.
pub struct YamlSource<'a> {
    text: &'a str,
}

impl<'a> YamlSource<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text }
    }
}

impl DescriptorSource for YamlSource<'_> {
    fn records(&self) -> GenResult<Vec<RawRecord>> {
        let document: serde_yaml::Value = serde_yaml::from_str(self.text)?;
        let entries = match document {
            serde_yaml::Value::Sequence(entries) => entries,
            serde_yaml::Value::Null => Vec::new(),
            _ => {
                return Err(GenError::descriptor(
                    "<document>",
                    "record",
                    "descriptor table must be a sequence of records",
                ))
            }
        };

        entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                serde_yaml::from_value::<RawRecord>(entry)
                    .map_err(|e| GenError::descriptor(format!("#{}", index), "record", e.to_string()))
            })
            .collect()
    }
}

/// Descriptor table already in memory.
pub struct RecordSource {
    records: Vec<RawRecord>,
}

impl RecordSource {
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self { records }
    }
}

impl DescriptorSource for RecordSource {
    fn records(&self) -> GenResult<Vec<RawRecord>> {
        Ok(self.records.clone())
    }
}
