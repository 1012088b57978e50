// This module defines the UnitSink trait, the output-side counterpart of DescriptorSource.
// Generated declaration and definition units are handed to a sink as (file name, contents)
// pairs once the whole run has succeeded. DirectorySink persists them into a directory on
// disk, creating it if needed and mapping I/O failures onto GenError::Io with the full path.
// MemorySink keeps them in an ordered map so tests and dry runs can inspect the exact text.

//! Sinks for generated units.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::error::{GenError, GenResult};

/// Consumer of generated units.
pub trait UnitSink {
    fn write_unit(&mut self, name: &str, contents: &str) -> GenResult<()>;
}

/// Writes each unit into a directory.
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl UnitSink for DirectorySink {
    fn write_unit(&mut self, name: &str, contents: &str) -> GenResult<()> {
        fs::create_dir_all(&self.dir).map_err(|source| GenError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.dir.join(name);
        fs::write(&path, contents).map_err(|source| GenError::Io { path: path.clone(), source })?;
        log::debug!("Wrote {} ({} bytes)", path.display(), contents.len());
        Ok(())
    }
}

/// Collects units in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub units: BTreeMap<String, String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.units.get(name).map(String::as_str)
    }
}

impl UnitSink for MemorySink {
    fn write_unit(&mut self, name: &str, contents: &str) -> GenResult<()> {
        self.units.insert(name.to_string(), contents.to_string());
        Ok(())
    }
}
