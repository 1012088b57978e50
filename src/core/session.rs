// This module provides the generation session: the single owner of configuration and the
// run statistics for one pass over the descriptor table. GenerationSession is threaded
// through every pipeline stage so filters, groupers and emitters can record what they did
// without sharing mutable globals. GenerationStats tracks how many records were loaded and
// filtered (broken down by reason), how many functions, names, and overload groups each
// surface received, how many groups needed an out/plain branch, how many fell back to an
// out-only base, and how many tensor-options aggregates were synthesised. The statistics
// implement Display so the funcgen binary can print a summary after a run.

//! Generation session and statistics.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;

use super::config::GeneratorConfig;
use crate::filter::Surface;

/// State shared by all stages of one generation run.
pub struct GenerationSession {
    config: GeneratorConfig,
    stats: RefCell<GenerationStats>,
}

impl GenerationSession {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            config,
            stats: RefCell::new(GenerationStats::default()),
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Record that the descriptor table held `count` records.
    pub fn record_loaded(&self, count: usize) {
        self.stats.borrow_mut().records_loaded += count;
    }

    /// Record a descriptor dropped by the filter.
    pub fn record_filtered(&self, reason: &'static str) {
        let mut stats = self.stats.borrow_mut();
        stats.records_filtered += 1;
        *stats.filter_reasons.entry(reason).or_insert(0) += 1;
    }

    /// Record a function routed to a surface.
    pub fn record_surface_function(&self, surface: Surface) {
        self.stats
            .borrow_mut()
            .surfaces
            .entry(surface)
            .or_default()
            .functions += 1;
    }

    /// Record one emitted public name and its overload group count.
    pub fn record_name_emitted(&self, surface: Surface, groups: usize) {
        let mut stats = self.stats.borrow_mut();
        let entry = stats.surfaces.entry(surface).or_default();
        entry.names += 1;
        entry.overload_groups += groups;
    }

    /// Record an overload group that branches between plain and out calls.
    pub fn record_out_branch(&self) {
        self.stats.borrow_mut().out_branches += 1;
    }

    /// Record an overload group dispatched through the out-only fallback.
    pub fn record_fallback_base(&self) {
        self.stats.borrow_mut().fallback_bases += 1;
    }

    /// Record a synthesised tensor-options aggregate.
    pub fn record_options_aggregate(&self) {
        self.stats.borrow_mut().options_aggregates += 1;
    }

    /// Get generation statistics.
    pub fn stats(&self) -> GenerationStats {
        self.stats.borrow().clone()
    }
}

/// Per-surface counters.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SurfaceStats {
    pub functions: usize,
    pub names: usize,
    pub overload_groups: usize,
}

/// Generation run statistics.
#[derive(Debug, Default, Clone)]
pub struct GenerationStats {
    /// Records read from the descriptor table.
    pub records_loaded: usize,

    /// Records rejected by the filter.
    pub records_filtered: usize,

    /// Rejections by reason.
    pub filter_reasons: BTreeMap<&'static str, usize>,

    pub surfaces: BTreeMap<Surface, SurfaceStats>,

    /// Overload groups with both a plain and an out member.
    pub out_branches: usize,

    /// Overload groups with an out member and no plain base.
    pub fallback_bases: usize,

    /// Tensor-options aggregates synthesised.
    pub options_aggregates: usize,
}

impl fmt::Display for GenerationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Generation Statistics:")?;
        writeln!(f, "  Records loaded: {}", self.records_loaded)?;
        writeln!(f, "  Records filtered: {}", self.records_filtered)?;
        for (reason, count) in &self.filter_reasons {
            writeln!(f, "    {}: {}", reason, count)?;
        }

        for (surface, stats) in &self.surfaces {
            writeln!(
                f,
                "  Surface {}: {} functions, {} names, {} overload groups",
                surface.name(),
                stats.functions,
                stats.names,
                stats.overload_groups
            )?;
        }

        writeln!(f, "  Out/plain branches: {}", self.out_branches)?;
        writeln!(f, "  Tensor options aggregates: {}", self.options_aggregates)?;
        if self.fallback_bases > 0 {
            writeln!(f, "  Out-only fallback bases: {}", self.fallback_bases)?;
        }

        Ok(())
    }
}
