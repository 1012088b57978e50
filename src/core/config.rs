// This module holds the run-time configuration of a generation run. GeneratorConfig gathers
// the knobs a caller may legitimately change between runs: how strictly out-only overload
// groups are treated, the prefix of the per-surface registration entry point, whether the
// registration calls carry the function pointer cast needed by older Ruby hosts, and which
// surfaces to emit. Fixed lookup tables (exclusion rules, type vocabulary, renaming rules)
// are not configurable and live as constants beside the code that uses them.

//! Generator configuration.

use crate::filter::Surface;

/// How to treat an overload group whose only member is an out variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingBasePolicy {
    /// Fail the run with [`GenError::MissingBase`](crate::core::GenError::MissingBase).
    #[default]
    Error,
    /// Log a warning and dispatch the out variant in place of the missing base.
    Warn,
}

/// Options for one generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    pub missing_base: MissingBasePolicy,

    /// Prefix of the registration entry point, `<prefix>_<surface>_functions`.
    pub registration_prefix: String,

    /// Emit `(VALUE (*)(...))` casts in registration calls (Ruby < 2.7 hosts).
    pub legacy_method_cast: bool,

    /// Surfaces to emit, in output order.
    pub surfaces: Vec<Surface>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            missing_base: MissingBasePolicy::default(),
            registration_prefix: "add".to_string(),
            legacy_method_cast: false,
            surfaces: Surface::ALL.to_vec(),
        }
    }
}

impl GeneratorConfig {
    /// Name of the registration entry point for `surface`.
    pub fn registration_fn(&self, surface: Surface) -> String {
        format!("{}_{}_functions", self.registration_prefix, surface.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GeneratorConfig::default();
        assert_eq!(config.missing_base, MissingBasePolicy::Error);
        assert_eq!(config.surfaces.len(), 4);
        assert_eq!(config.registration_fn(Surface::Linalg), "add_linalg_functions");
    }
}
