// This module serves as the central hub for the generator's shared infrastructure, the
// pieces every pipeline stage depends on but none of them owns. It exports and organizes
// the error type used to halt a run, the configuration of a run, the session that carries
// configuration and statistics through all stages, and the two I/O seams: DescriptorSource
// on the input side and UnitSink on the output side. Keeping the I/O behind traits lets the
// generation algorithm stay pure and lets tests drive it entirely in memory.

//! Core generator infrastructure
//!
//! # Key Components
//!
//! ## Errors (`error`)
//! - One fatal error enum for the whole run, naming the offending record
//!
//! ## Configuration (`config`)
//! - Missing-base policy, registration naming, surfaces to emit
//!
//! ## Session (`session`)
//! - Configuration plus run statistics, threaded through every stage
//!
//! ## I/O seams (`adaptor`, `sink`)
//! - `DescriptorSource` produces raw records
//! - `UnitSink` receives generated units after a successful run

pub mod adaptor;
pub mod config;
pub mod error;
pub mod session;
pub mod sink;

pub use adaptor::{DescriptorSource, RawRecord, RawVariants, RecordSource, YamlSource};
pub use config::{GeneratorConfig, MissingBasePolicy};
pub use error::{GenError, GenResult};
pub use session::{GenerationSession, GenerationStats, SurfaceStats};
pub use sink::{DirectorySink, MemorySink, UnitSink};
