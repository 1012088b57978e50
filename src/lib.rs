//! torch-funcgen - binding generator for the Ruby tensor library.
//!
//! Reads the native operator descriptor table and emits, per binding surface,
//! the Rice/C++ dispatch functions that parse Ruby arguments, pick an overload
//! and call into the native library.
//!
//! # Primary Usage
//!
//! ```ignore
//! use torch_funcgen::{DirectorySink, Generator, GeneratorConfig, YamlSource};
//!
//! let yaml = std::fs::read_to_string("native_functions.yaml")?;
//! let generator = Generator::new(GeneratorConfig::default());
//! let stats = generator.run(&YamlSource::new(&yaml), &mut DirectorySink::new("ext/torch"))?;
//! println!("{}", stats);
//! ```
//!
//! # Architecture
//!
//! - [`core`] - Shared infrastructure (errors, config, session, I/O seams)
//! - [`descriptor`] - Validated operator descriptors
//! - [`filter`] - Exclusion rules and surface partitioning
//! - [`types`] - Declarative to native type mapping
//! - [`signature`] - Argument parser signatures
//! - [`overload`] - Overload grouping
//! - [`dispatch`] - Emission plans and their C++ rendering
//! - [`emitter`] - Per-surface unit assembly
//! - [`generator`] - The end-to-end pipeline

pub mod core;
pub mod descriptor;
pub mod dispatch;
pub mod emitter;
pub mod filter;
pub mod generator;
pub mod overload;
pub mod signature;
pub mod types;

pub use crate::core::{
    // I/O seams
    DescriptorSource, DirectorySink, MemorySink, RawRecord, RecordSource, UnitSink, YamlSource,
    // Configuration and session
    GenError, GenResult, GenerationSession, GenerationStats, GeneratorConfig, MissingBasePolicy,
};
pub use descriptor::Function;
pub use emitter::GeneratedSurface;
pub use filter::Surface;
pub use generator::{Generation, Generator};
